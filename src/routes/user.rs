use axum::{extract::State, routing::get, Json, Router};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::{json, Value};
use serde_with::{serde_as, NoneAsEmptyString, PickFirst};

use crate::{
    auth::CurrentSession,
    error::AppError,
    models::{
        college::is_known_college,
        user::{ProfileUpdate, UserRole},
    },
    state::AppState,
};

use super::normalize_optional;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user", get(current_user).put(update_profile))
        .route("/user/role", get(current_role))
}

async fn current_user(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Json<Value>, AppError> {
    let user = current.require_user()?;
    let profile = state
        .users
        .find_by_id(user.id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    Ok(Json(json!({ "user": profile })))
}

/// Lets the admin page decide whether to offer switching to the user view.
async fn current_role(current: CurrentSession) -> Json<Value> {
    let session = current.session();
    let role = session.and_then(|s| s.role());
    let can_switch =
        session.is_some_and(|s| s.user_id.is_some()) && role == Some(UserRole::Admin);
    Json(json!({ "role": role, "canSwitch": can_switch }))
}

#[serde_as]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    college: String,
    #[serde(default)]
    gender: Option<String>,
    #[serde_as(as = "PickFirst<(Option<_>, NoneAsEmptyString)>")]
    #[serde(default)]
    graduation_year: Option<i64>,
}

async fn update_profile(
    State(state): State<AppState>,
    current: CurrentSession,
    WithRejection(Json(req), _): WithRejection<Json<ProfileRequest>, AppError>,
) -> Result<Json<Value>, AppError> {
    let user = current.require_user()?;
    let name = req.name.trim().to_string();
    if name.is_empty() || req.college.is_empty() {
        return Err(AppError::bad_request("Name and college are required"));
    }
    if !is_known_college(&req.college) {
        return Err(AppError::bad_request("Unknown college"));
    }
    let update = ProfileUpdate {
        name,
        college: req.college,
        gender: normalize_optional(req.gender),
        graduation_year: req.graduation_year,
    };
    state.users.update_profile(user.id, &update).await?;
    Ok(Json(json!({ "success": true })))
}
