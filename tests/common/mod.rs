#![allow(dead_code)]

use std::{fmt, net::SocketAddr};

use anyhow::Context;
use tempfile::TempDir;
use uniride::{
    auth::{self, AuthenticatedUser},
    config::AppConfig,
    db::{init_pool, run_migrations},
    models::user::NewUser,
    state::AppState,
};

pub const ADMIN_EMAIL: &str = "admin@nd.edu";
pub const ADMIN_PASSWORD: &str = "let-me-in";
pub const PASSWORD: &str = "password123";

/// An application state backed by a throwaway SQLite file and static root.
pub struct TestApp {
    pub state: AppState,
    _root: TempDir,
}

impl fmt::Debug for TestApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestApp").finish()
    }
}

impl TestApp {
    pub async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for test app")?;
        let static_root = root.path().join("public");
        std::fs::create_dir_all(&static_root)?;
        for page in [
            "index.html",
            "login.html",
            "dashboard.html",
            "admin.html",
            "admin-login.html",
        ] {
            std::fs::write(static_root.join(page), format!("<html>{page}</html>"))?;
        }

        let db_path = root.path().join("test.sqlite");
        let config = AppConfig {
            database_url: format!("sqlite://{}", db_path.to_string_lossy()),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            static_root,
            cookie_secret: "test-cookie-secret".into(),
            admin_password: ADMIN_PASSWORD.into(),
            admin_email: Some(ADMIN_EMAIL.into()),
        };

        let db = init_pool(&config.database_url).await?;
        run_migrations(&db).await?;

        Ok(Self {
            state: AppState::new(config, db),
            _root: root,
        })
    }

    pub async fn register(&self, email: &str, college: &str) -> anyhow::Result<AuthenticatedUser> {
        let user = auth::register_user(
            &self.state,
            NewUser {
                email: email.into(),
                password: PASSWORD.into(),
                name: email.split('@').next().unwrap_or(email).into(),
                college: college.into(),
                gender: None,
                graduation_year: Some(2027),
            },
        )
        .await?;
        Ok(user)
    }
}
