use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::user::UserRole;

/// Server-side session referenced by the private session cookie.
///
/// A session either belongs to a logged-in user (`user_id` set), to an admin
/// who unlocked the panel with the admin password (`is_admin` set), or both.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: Option<i64>,
    pub user_email: Option<String>,
    pub role: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn role(&self) -> Option<UserRole> {
        self.role.as_deref().map(UserRole::from_stored)
    }

    pub fn grants_admin(&self) -> bool {
        self.is_admin || self.role() == Some(UserRole::Admin)
    }
}
