use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::{PrivateCookieJar, WithRejection};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    auth::{self, CurrentSession},
    error::AppError,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/login", post(admin_login))
        .route("/admin/logout", post(admin_logout))
        .route("/admin/users", get(users_list))
        .route("/admin/rides", get(rides_list))
}

#[derive(Deserialize)]
struct AdminLoginRequest {
    #[serde(default)]
    password: String,
}

async fn admin_login(
    State(state): State<AppState>,
    current: CurrentSession,
    jar: PrivateCookieJar,
    WithRejection(Json(req), _): WithRejection<Json<AdminLoginRequest>, AppError>,
) -> Result<(PrivateCookieJar, Json<Value>), AppError> {
    if !auth::check_admin_password(&state, &req.password) {
        warn!("admin login with wrong password");
        return Err(AppError::InvalidCredentials("Invalid admin password"));
    }

    let jar = match current.session() {
        Some(session) => {
            auth::grant_admin(&state, &session.id).await?;
            jar
        }
        None => {
            let session_id = auth::create_admin_session(&state).await?;
            auth::apply_session_cookie(jar, &session_id)
        }
    };
    info!("admin session unlocked");
    Ok((jar, Json(json!({ "success": true }))))
}

async fn admin_logout(
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

async fn users_list(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Json<Value>, AppError> {
    current.require_admin()?;
    let users = state
        .users
        .list_all()
        .await
        .map_err(|err| AppError::Admin {
            message: "Failed to fetch users",
            details: err.to_string(),
        })?;
    info!(count = users.len(), "admin listed users");
    Ok(Json(json!({ "users": users })))
}

async fn rides_list(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Json<Value>, AppError> {
    current.require_admin()?;
    let rides = state
        .rides
        .list_all()
        .await
        .map_err(|err| AppError::Admin {
            message: "Failed to fetch rides",
            details: err.to_string(),
        })?;
    info!(count = rides.len(), "admin listed rides");
    Ok(Json(json!({ "rides": rides })))
}
