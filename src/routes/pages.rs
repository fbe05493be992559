use axum::{
    extract::{Query, Request, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use axum_extra::extract::{PrivateCookieJar, WithRejection};
use serde::Deserialize;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::{
    auth::{self, CurrentSession},
    error::AppError,
    state::AppState,
};

/// Pages that require a logged-in user.
const PROTECTED_PAGES: &[&str] = &[
    "dashboard.html",
    "plan-ride.html",
    "view-rides.html",
    "profile.html",
];

pub fn router() -> Router<AppState> {
    let router = Router::new()
        .route("/", get(home))
        .route("/admin.html", get(admin_page));
    PROTECTED_PAGES.iter().fold(router, |router, page| {
        router.route(&format!("/{page}"), get(protected_page))
    })
}

async fn serve_page(state: &AppState, page: &str, request: Request) -> Response {
    let path = state.config.static_root.join(page);
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

fn is_logged_in(current: &CurrentSession) -> bool {
    current.session().is_some_and(|s| s.user_id.is_some())
}

async fn home(
    State(state): State<AppState>,
    current: CurrentSession,
    request: Request,
) -> Response {
    if is_logged_in(&current) {
        return Redirect::to("/dashboard.html").into_response();
    }
    serve_page(&state, "index.html", request).await
}

async fn protected_page(
    State(state): State<AppState>,
    current: CurrentSession,
    request: Request,
) -> Response {
    if !is_logged_in(&current) {
        return Redirect::to("/login.html").into_response();
    }
    let page = request.uri().path().trim_start_matches('/').to_string();
    serve_page(&state, &page, request).await
}

#[derive(Deserialize)]
struct AdminPageParams {
    logout: Option<String>,
}

async fn admin_page(
    State(state): State<AppState>,
    current: CurrentSession,
    WithRejection(Query(params), _): WithRejection<Query<AdminPageParams>, AppError>,
    jar: PrivateCookieJar,
    request: Request,
) -> Result<(PrivateCookieJar, Response), AppError> {
    if params.logout.as_deref() == Some("true") {
        if let Some(session) = current.session() {
            auth::destroy_session(&state, &session.id).await?;
        }
        let page = serve_page(&state, "admin-login.html", request).await;
        return Ok((auth::clear_session_cookie(jar), page));
    }

    let page = match current.session() {
        Some(session) if session.grants_admin() => "admin.html",
        _ => "admin-login.html",
    };
    Ok((jar, serve_page(&state, page, request).await))
}
