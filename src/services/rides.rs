use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    db::DbPool,
    error::AppError,
    matching::{MatchQuery, MatchWindow},
    models::ride::{Flexibility, RideFields, RideListing, RideStatus},
};

const LISTING_SELECT: &str = r#"SELECT r.id, r.user_id, r.location, r.direction, r.departure_time,
       r.flexibility, r.status, r.created_at,
       u.name, u.college, u.gender, u.graduation_year
FROM rides r
JOIN users u ON r.user_id = u.id"#;

/// Persistence for ride postings.
///
/// Mutations take the acting user and only touch rows that user owns; a miss
/// is reported as `NotFound` or `Forbidden` depending on whether the ride
/// exists at all.
#[derive(Clone)]
pub struct RideStore {
    db: DbPool,
}

impl RideStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, owner_id: i64, fields: &RideFields) -> Result<i64, AppError> {
        let result = sqlx::query(
            r#"INSERT INTO rides (user_id, location, direction, departure_time, flexibility, status, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
        )
        .bind(owner_id)
        .bind(&fields.location)
        .bind(&fields.direction)
        .bind(fields.departure_time)
        .bind(fields.flexibility.as_str())
        .bind(RideStatus::Active.as_str())
        .bind(Utc::now())
        .execute(&self.db)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<RideListing>, AppError> {
        let rides = sqlx::query_as::<_, RideListing>(&format!(
            "{LISTING_SELECT} WHERE r.user_id = ?1 AND r.status = 'active' ORDER BY r.departure_time ASC"
        ))
        .bind(owner_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rides)
    }

    pub async fn list_by_college(&self, college: &str) -> Result<Vec<RideListing>, AppError> {
        let rides = sqlx::query_as::<_, RideListing>(&format!(
            "{LISTING_SELECT} WHERE u.college = ?1 AND r.status = 'active' ORDER BY r.departure_time ASC"
        ))
        .bind(college)
        .fetch_all(&self.db)
        .await?;
        Ok(rides)
    }

    pub async fn get(&self, id: i64) -> Result<RideListing, AppError> {
        sqlx::query_as::<_, RideListing>(&format!("{LISTING_SELECT} WHERE r.id = ?1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::NotFound("ride"))
    }

    /// Active rides on a route whose owner belongs to `college`.
    pub async fn candidates(
        &self,
        college: &str,
        location: &str,
        direction: &str,
    ) -> Result<Vec<RideListing>, AppError> {
        let rides = sqlx::query_as::<_, RideListing>(&format!(
            r#"{LISTING_SELECT}
               WHERE u.college = ?1 AND r.location = ?2 AND r.direction = ?3 AND r.status = 'active'
               ORDER BY r.departure_time ASC"#
        ))
        .bind(college)
        .bind(location)
        .bind(direction)
        .fetch_all(&self.db)
        .await?;
        Ok(rides)
    }

    /// Tolerance-based matches for a ride the requester would take.
    ///
    /// An unknown requester yields no matches rather than an error.
    pub async fn matches_around(
        &self,
        requester_id: i64,
        location: &str,
        direction: &str,
        departure_time: DateTime<Utc>,
        flexibility: Flexibility,
    ) -> Result<Vec<RideListing>, AppError> {
        let college: Option<String> =
            sqlx::query_scalar("SELECT college FROM users WHERE id = ?1")
                .bind(requester_id)
                .fetch_optional(&self.db)
                .await?;
        let Some(college) = college else {
            debug!(requester_id, "match lookup for unknown requester");
            return Ok(Vec::new());
        };
        let window = MatchWindow::around(departure_time, flexibility);
        self.matches_in(requester_id, &college, location, direction, window)
            .await
    }

    /// Matches whose departure falls inside an explicit window.
    pub async fn matches_in(
        &self,
        requester_id: i64,
        college: &str,
        location: &str,
        direction: &str,
        window: MatchWindow,
    ) -> Result<Vec<RideListing>, AppError> {
        let query = MatchQuery {
            requester_id,
            college,
            location,
            direction,
            window,
        };
        let pool = self.candidates(college, location, direction).await?;
        let matches = query.select(pool);
        debug!(
            requester_id,
            location,
            direction,
            start = %window.start(),
            end = %window.end(),
            found = matches.len(),
            "ride matches computed"
        );
        Ok(matches)
    }

    pub async fn update_fields(
        &self,
        id: i64,
        owner_id: i64,
        fields: &RideFields,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"UPDATE rides SET location = ?1, direction = ?2, departure_time = ?3, flexibility = ?4
               WHERE id = ?5 AND user_id = ?6"#,
        )
        .bind(&fields.location)
        .bind(&fields.direction)
        .bind(fields.departure_time)
        .bind(fields.flexibility.as_str())
        .bind(id)
        .bind(owner_id)
        .execute(&self.db)
        .await?;
        self.expect_owned_row(id, result.rows_affected()).await
    }

    pub async fn update_status(
        &self,
        id: i64,
        owner_id: i64,
        status: RideStatus,
    ) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE rides SET status = ?1 WHERE id = ?2 AND user_id = ?3")
            .bind(status.as_str())
            .bind(id)
            .bind(owner_id)
            .execute(&self.db)
            .await?;
        self.expect_owned_row(id, result.rows_affected()).await
    }

    pub async fn delete(&self, id: i64, owner_id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM rides WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.db)
            .await?;
        self.expect_owned_row(id, result.rows_affected()).await
    }

    /// Every ride regardless of status, newest first, with the owner's email.
    pub async fn list_all(&self) -> Result<Vec<RideListing>, AppError> {
        let rides = sqlx::query_as::<_, RideListing>(
            r#"SELECT r.id, r.user_id, r.location, r.direction, r.departure_time,
                      r.flexibility, r.status, r.created_at,
                      u.name, u.college, u.gender, u.graduation_year, u.email
               FROM rides r
               JOIN users u ON r.user_id = u.id
               ORDER BY r.created_at DESC, r.id DESC"#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rides)
    }

    async fn expect_owned_row(&self, id: i64, rows_affected: u64) -> Result<(), AppError> {
        if rows_affected > 0 {
            return Ok(());
        }
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM rides WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        match exists {
            Some(_) => Err(AppError::Forbidden),
            None => Err(AppError::NotFound("ride")),
        }
    }
}
