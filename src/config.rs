use std::{env, net::SocketAddr, path::PathBuf};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub static_root: PathBuf,
    pub cookie_secret: String,
    pub admin_password: String,
    /// Accounts registered with this address receive the admin role.
    pub admin_email: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://uni-ride.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let static_root = env::var("STATIC_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("public"));

        let cookie_secret = env::var("COOKIE_SECRET")
            .unwrap_or_else(|_| "uni-ride-secret-key-change-in-production".to_string());

        let admin_password = env::var("ADMIN_PASSWORD")
            .ok()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                AppError::Config("ADMIN_PASSWORD must be set (e.g. in .env)".to_string())
            })?;

        let admin_email = env::var("ADMIN_EMAIL")
            .ok()
            .map(|value| value.trim().to_lowercase())
            .filter(|value| !value.is_empty());

        Ok(Self {
            database_url,
            listen_addr,
            static_root,
            cookie_secret,
            admin_password,
            admin_email,
        })
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_email.as_deref() == Some(email)
    }
}
