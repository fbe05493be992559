use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::{
    auth::CurrentSession,
    error::AppError,
    matching::{parse_instant, Bound, MatchWindow},
    models::ride::{Flexibility, RideFields, RideStatus},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rides", post(create_ride))
        .route("/rides/my-rides", get(my_rides))
        .route("/rides/matches", get(range_matches))
        .route("/rides/college", get(college_rides))
        .route(
            "/rides/:id",
            get(get_ride).put(update_ride).delete(delete_ride),
        )
        .route("/rides/:id/status", put(update_status))
        .route("/rides/:id/matches", get(ride_matches))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RideRequest {
    #[serde(default)]
    location: String,
    #[serde(default)]
    direction: String,
    #[serde(default)]
    departure_time: String,
    #[serde(default)]
    flexibility: String,
}

impl RideRequest {
    fn into_fields(self) -> Result<RideFields, AppError> {
        let location = self.location.trim().to_string();
        let direction = self.direction.trim().to_string();
        if location.is_empty()
            || direction.is_empty()
            || self.departure_time.trim().is_empty()
            || self.flexibility.is_empty()
        {
            return Err(AppError::bad_request("Missing required fields"));
        }
        let flexibility = Flexibility::parse(&self.flexibility).ok_or_else(|| {
            AppError::bad_request("Flexibility must be strict, moderate or flexible")
        })?;
        Ok(RideFields {
            location,
            direction,
            departure_time: parse_instant(&self.departure_time, Bound::Start)?,
            flexibility,
        })
    }
}

async fn create_ride(
    State(state): State<AppState>,
    current: CurrentSession,
    WithRejection(Json(req), _): WithRejection<Json<RideRequest>, AppError>,
) -> Result<Json<Value>, AppError> {
    let user = current.require_user()?;
    let fields = req.into_fields()?;
    let ride_id = state.rides.create(user.id, &fields).await?;
    info!(user_id = user.id, ride_id, "ride created");
    Ok(Json(json!({ "success": true, "rideId": ride_id })))
}

async fn my_rides(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Json<Value>, AppError> {
    let user = current.require_user()?;
    let rides = state.rides.list_by_owner(user.id).await?;
    Ok(Json(json!({ "rides": rides })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeParams {
    location: Option<String>,
    direction: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

fn required(value: Option<String>) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Missing required search parameters"))
}

async fn range_matches(
    State(state): State<AppState>,
    current: CurrentSession,
    WithRejection(Query(params), _): WithRejection<Query<RangeParams>, AppError>,
) -> Result<Json<Value>, AppError> {
    let user = current.require_user()?;
    let location = required(params.location)?;
    let direction = required(params.direction)?;
    let start_date = required(params.start_date)?;
    let end_date = required(params.end_date)?;

    let profile = state
        .users
        .find_by_id(user.id)
        .await?
        .ok_or(AppError::NotFound("user"))?;

    let window = MatchWindow::between(
        parse_instant(&start_date, Bound::Start)?,
        parse_instant(&end_date, Bound::End)?,
    )?;
    let matches = state
        .rides
        .matches_in(user.id, &profile.college, &location, &direction, window)
        .await?;
    Ok(Json(json!({ "matches": matches })))
}

async fn college_rides(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Json<Value>, AppError> {
    let user = current.require_user()?;
    let profile = state
        .users
        .find_by_id(user.id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    let rides = state.rides.list_by_college(&profile.college).await?;
    Ok(Json(json!({ "rides": rides })))
}

async fn get_ride(
    State(state): State<AppState>,
    current: CurrentSession,
    WithRejection(Path(ride_id), _): WithRejection<Path<i64>, AppError>,
) -> Result<Json<Value>, AppError> {
    current.require_user()?;
    let ride = state.rides.get(ride_id).await?;
    Ok(Json(json!({ "ride": ride })))
}

/// Tolerance-based matches around one of the caller's own rides.
async fn ride_matches(
    State(state): State<AppState>,
    current: CurrentSession,
    WithRejection(Path(ride_id), _): WithRejection<Path<i64>, AppError>,
) -> Result<Json<Value>, AppError> {
    let user = current.require_user()?;
    let ride = state.rides.get(ride_id).await?;
    if ride.user_id != user.id {
        return Err(AppError::Forbidden);
    }
    if !ride.is_active() {
        return Err(AppError::bad_request("Only active rides can be matched"));
    }
    let matches = state
        .rides
        .matches_around(
            user.id,
            &ride.location,
            &ride.direction,
            ride.departure_time,
            ride.flexibility(),
        )
        .await?;
    Ok(Json(json!({ "matches": matches })))
}

#[derive(Deserialize)]
struct StatusRequest {
    #[serde(default)]
    status: String,
}

async fn update_status(
    State(state): State<AppState>,
    current: CurrentSession,
    WithRejection(Path(ride_id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Json(req), _): WithRejection<Json<StatusRequest>, AppError>,
) -> Result<Json<Value>, AppError> {
    let user = current.require_user()?;
    let status = RideStatus::parse(&req.status)
        .ok_or_else(|| AppError::bad_request("Status must be active or cancelled"))?;
    state.rides.update_status(ride_id, user.id, status).await?;
    info!(user_id = user.id, ride_id, status = %status, "ride status changed");
    Ok(Json(json!({ "success": true })))
}

async fn update_ride(
    State(state): State<AppState>,
    current: CurrentSession,
    WithRejection(Path(ride_id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Json(req), _): WithRejection<Json<RideRequest>, AppError>,
) -> Result<Json<Value>, AppError> {
    let user = current.require_user()?;
    let fields = req.into_fields()?;
    state.rides.update_fields(ride_id, user.id, &fields).await?;
    Ok(Json(json!({ "success": true })))
}

async fn delete_ride(
    State(state): State<AppState>,
    current: CurrentSession,
    WithRejection(Path(ride_id), _): WithRejection<Path<i64>, AppError>,
) -> Result<Json<Value>, AppError> {
    let user = current.require_user()?;
    state.rides.delete(ride_id, user.id).await?;
    info!(user_id = user.id, ride_id, "ride deleted");
    Ok(Json(json!({ "success": true })))
}
