use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    PrivateCookieJar,
};
use chrono::{Duration, Utc};
use sha2::{Digest, Sha512};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        college::is_known_college,
        session::Session,
        user::{NewUser, User, UserRole},
    },
    services::users::verify_password,
    state::AppState,
};

pub const SESSION_COOKIE: &str = "uniride_session";
pub const SESSION_TTL_HOURS: i64 = 24;
const INVALID_LOGIN: &str = "Invalid email or password";

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub email: String,
    pub role: UserRole,
}

/// The caller's session, if the request carries a valid, unexpired one.
#[derive(Debug, Clone, Default)]
pub struct CurrentSession(pub Option<Session>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = PrivateCookieJar::from_headers(&parts.headers, state.cookie_key.clone());
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Ok(Self(None));
        };
        Ok(Self(load_session(state, cookie.value()).await?))
    }
}

impl CurrentSession {
    pub fn session(&self) -> Option<&Session> {
        self.0.as_ref()
    }

    pub fn require_user(&self) -> Result<AuthenticatedUser, AppError> {
        let session = self.0.as_ref().ok_or(AppError::Unauthorized)?;
        let id = session.user_id.ok_or(AppError::Unauthorized)?;
        Ok(AuthenticatedUser {
            id,
            email: session.user_email.clone().unwrap_or_default(),
            role: session.role().unwrap_or_default(),
        })
    }

    /// Admin access comes from either the admin-password flag or an admin role.
    pub fn require_admin(&self) -> Result<&Session, AppError> {
        match self.0.as_ref() {
            Some(session) if session.grants_admin() => Ok(session),
            _ => Err(AppError::Forbidden),
        }
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Validates a registration and creates the account.
///
/// The address configured as `ADMIN_EMAIL` is given the admin role.
pub async fn register_user(
    state: &AppState,
    mut new_user: NewUser,
) -> Result<AuthenticatedUser, AppError> {
    new_user.email = normalize_email(&new_user.email);
    new_user.name = new_user.name.trim().to_string();
    if new_user.email.is_empty()
        || new_user.password.is_empty()
        || new_user.name.is_empty()
        || new_user.college.is_empty()
    {
        return Err(AppError::bad_request("Missing required fields"));
    }
    if !new_user.email.contains('@') {
        return Err(AppError::bad_request("Invalid email address"));
    }
    if !is_known_college(&new_user.college) {
        return Err(AppError::bad_request("Unknown college"));
    }

    if state.users.find_by_email(&new_user.email).await?.is_some() {
        warn!(email = %new_user.email, "email already registered");
        return Err(AppError::bad_request("Email already registered"));
    }

    let role = if state.config.is_admin_email(&new_user.email) {
        UserRole::Admin
    } else {
        UserRole::User
    };
    let id = state.users.create(&new_user, role).await?;
    info!(user_id = id, role = %role, "user registered");
    Ok(AuthenticatedUser {
        id,
        email: new_user.email,
        role,
    })
}

pub async fn authenticate_user(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let email = normalize_email(email);
    let Some(user) = state.users.find_by_email(&email).await? else {
        debug!(email = %email, "login for unknown email");
        return Err(AppError::InvalidCredentials(INVALID_LOGIN));
    };
    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = user.id, "login with wrong password");
        return Err(AppError::InvalidCredentials(INVALID_LOGIN));
    }
    Ok(user)
}

/// Constant-time comparison of SHA-512 digests, so the secret's length does
/// not leak through timing.
pub fn check_admin_password(state: &AppState, candidate: &str) -> bool {
    let expected = Sha512::digest(state.config.admin_password.as_bytes());
    let given = Sha512::digest(candidate.as_bytes());
    expected
        .iter()
        .zip(given.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

pub async fn create_user_session(state: &AppState, user: &User) -> Result<String, AppError> {
    insert_session(state, Some(user), false).await
}

pub async fn create_admin_session(state: &AppState) -> Result<String, AppError> {
    insert_session(state, None, true).await
}

async fn insert_session(
    state: &AppState,
    user: Option<&User>,
    is_admin: bool,
) -> Result<String, AppError> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        r#"INSERT INTO sessions (id, user_id, user_email, role, is_admin, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
    )
    .bind(&id)
    .bind(user.map(|u| u.id))
    .bind(user.map(|u| u.email.as_str()))
    .bind(user.map(|u| u.role().as_str()))
    .bind(is_admin)
    .bind(now)
    .bind(now + Duration::hours(SESSION_TTL_HOURS))
    .execute(&state.db)
    .await?;
    Ok(id)
}

/// Unlocks the admin panel on an existing session.
pub async fn grant_admin(state: &AppState, session_id: &str) -> Result<(), AppError> {
    sqlx::query("UPDATE sessions SET is_admin = 1 WHERE id = ?1")
        .bind(session_id)
        .execute(&state.db)
        .await?;
    Ok(())
}

pub async fn load_session(state: &AppState, session_id: &str) -> Result<Option<Session>, AppError> {
    let session = sqlx::query_as::<_, Session>(
        r#"SELECT id, user_id, user_email, role, is_admin, created_at, expires_at
           FROM sessions WHERE id = ?1"#,
    )
    .bind(session_id)
    .fetch_optional(&state.db)
    .await?;

    match session {
        Some(session) if session.is_expired(Utc::now()) => {
            destroy_session(state, &session.id).await?;
            Ok(None)
        }
        other => Ok(other),
    }
}

pub async fn destroy_session(state: &AppState, session_id: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM sessions WHERE id = ?1")
        .bind(session_id)
        .execute(&state.db)
        .await?;
    Ok(())
}

pub fn apply_session_cookie(jar: PrivateCookieJar, session_id: &str) -> PrivateCookieJar {
    let cookie = Cookie::build((SESSION_COOKIE, session_id.to_owned()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(SESSION_TTL_HOURS));
    jar.add(cookie)
}

pub fn clear_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}
