pub mod admin;
pub mod pages;
pub mod public;
pub mod rides;
pub mod user;

use axum::Router;
use tower_http::services::ServeDir;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(public::router())
        .merge(user::router())
        .merge(rides::router())
        .merge(admin::router());

    Router::new()
        .nest("/api", api)
        .merge(pages::router())
        .fallback_service(ServeDir::new(state.config.static_root.clone()))
        .with_state(state)
}

/// Trims optional form input; blank values become `None`.
pub(crate) fn normalize_optional(input: Option<String>) -> Option<String> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
