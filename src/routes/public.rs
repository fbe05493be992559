use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::{PrivateCookieJar, WithRejection};
use serde::Deserialize;
use serde_json::{json, Value};
use serde_with::{serde_as, NoneAsEmptyString, PickFirst};
use tracing::info;

use crate::{
    auth::{self, CurrentSession},
    error::AppError,
    models::{college::COLLEGES, user::NewUser},
    state::AppState,
};

use super::normalize_optional;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/colleges", get(colleges))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

async fn colleges() -> Json<Value> {
    Json(json!({ "colleges": COLLEGES }))
}

#[serde_as]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
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

async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, AppError>,
) -> Result<Json<Value>, AppError> {
    auth::register_user(
        &state,
        NewUser {
            email: req.email,
            password: req.password,
            name: req.name,
            college: req.college,
            gender: normalize_optional(req.gender),
            graduation_year: req.graduation_year,
        },
    )
    .await?;
    Ok(Json(json!({ "success": true, "message": "Registration successful" })))
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

async fn login(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<(PrivateCookieJar, Json<Value>), AppError> {
    let user = auth::authenticate_user(&state, &req.email, &req.password).await?;

    // A fresh login replaces whatever session the browser carried before.
    if let Some(cookie) = jar.get(auth::SESSION_COOKIE) {
        auth::destroy_session(&state, cookie.value()).await?;
    }
    let session_id = auth::create_user_session(&state, &user).await?;
    let role = user.role();
    info!(user_id = user.id, role = %role, "user logged in");

    Ok((
        auth::apply_session_cookie(jar, &session_id),
        Json(json!({
            "success": true,
            "user": {
                "id": user.id,
                "name": user.name,
                "college": user.college,
                "role": role,
            }
        })),
    ))
}

async fn logout(
    State(state): State<AppState>,
    current: CurrentSession,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Json<Value>), AppError> {
    if let Some(session) = current.session() {
        auth::destroy_session(&state, &session.id).await?;
    }
    Ok((
        auth::clear_session_cookie(jar),
        Json(json!({ "success": true })),
    ))
}
