use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use rand::rngs::OsRng;
use tracing::{debug, error};

use crate::{
    db::{is_unique_violation, DbPool},
    error::AppError,
    models::user::{NewUser, ProfileUpdate, User, UserProfile, UserRole},
};

const PROFILE_COLUMNS: &str =
    "id, email, name, college, gender, graduation_year, role, created_at";

#[derive(Clone)]
pub struct UserDirectory {
    db: DbPool,
}

impl UserDirectory {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Inserts a user with a freshly hashed password and returns its id.
    pub async fn create(&self, new_user: &NewUser, role: UserRole) -> Result<i64, AppError> {
        let hash = hash_password(&new_user.password)?;
        let result = sqlx::query(
            r#"INSERT INTO users (email, password_hash, name, college, gender, graduation_year, role, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
        )
        .bind(&new_user.email)
        .bind(&hash)
        .bind(&new_user.name)
        .bind(&new_user.college)
        .bind(&new_user.gender)
        .bind(new_user.graduation_year)
        .bind(role.as_str())
        .bind(Utc::now())
        .execute(&self.db)
        .await;

        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(err) if is_unique_violation(&err) => {
                debug!(email = %new_user.email, "duplicate email rejected by constraint");
                Err(AppError::bad_request("Email already registered"))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, email, password_hash, name, college, gender, graduation_year, role, created_at
               FROM users WHERE email = ?1"#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<UserProfile>, AppError> {
        let profile = sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM users WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(profile)
    }

    pub async fn update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"UPDATE users SET name = ?1, college = ?2, gender = ?3, graduation_year = ?4
               WHERE id = ?5"#,
        )
        .bind(&update.name)
        .bind(&update.college)
        .bind(&update.gender)
        .bind(update.graduation_year)
        .bind(id)
        .execute(&self.db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("user"));
        }
        Ok(())
    }

    pub async fn list_all(&self) -> Result<Vec<UserProfile>, AppError> {
        let users = sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }
}

pub fn hash_password(plain: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|err| {
            error!(error = %err, "argon2 hash_password error");
            AppError::Other(anyhow::anyhow!(err.to_string()))
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash).map_err(|err| {
        error!(error = %err, "argon2 parse hash error");
        AppError::Other(anyhow::anyhow!(err.to_string()))
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_never_contains_plaintext() {
        let hash = hash_password("hunter22").expect("hash");
        assert!(!hash.contains("hunter22"));
        assert!(hash.starts_with("$argon2"));
    }

    #[test]
    fn verify_accepts_only_the_original_password() {
        let hash = hash_password("correct-horse").expect("hash");
        assert!(verify_password("correct-horse", &hash).expect("verify"));
        assert!(!verify_password("wrong-horse", &hash).expect("verify"));
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("anything", "not-a-hash").is_err());
    }
}
