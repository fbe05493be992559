//! Ride matching: time-window construction and the candidate predicate.
//!
//! The store supplies the candidate pool (active rides whose owner studies at
//! the requester's college, on the same location and direction). Everything
//! that decides whether a candidate is a match, and in which order matches are
//! returned, lives here and does no I/O.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::{
    error::AppError,
    models::ride::{Flexibility, RideListing},
};

/// Tolerance in hours for a raw flexibility value as stored on a ride.
pub fn tolerance_hours(flexibility: &str) -> i64 {
    Flexibility::from_stored(flexibility).tolerance_hours()
}

/// Inclusive departure-time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl MatchWindow {
    /// `reference ± tolerance(flexibility)`.
    pub fn around(reference: DateTime<Utc>, flexibility: Flexibility) -> Self {
        let tolerance = flexibility.tolerance();
        Self {
            start: reference - tolerance,
            end: reference + tolerance,
        }
    }

    /// Explicit range. An inverted range is a caller error, not an empty window.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, AppError> {
        if start > end {
            return Err(AppError::bad_request(
                "Start date must be before or equal to end date",
            ));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// Everything a candidate ride is compared against.
#[derive(Debug, Clone)]
pub struct MatchQuery<'a> {
    pub requester_id: i64,
    pub college: &'a str,
    pub location: &'a str,
    pub direction: &'a str,
    pub window: MatchWindow,
}

impl MatchQuery<'_> {
    pub fn admits(&self, ride: &RideListing) -> bool {
        ride.user_id != self.requester_id
            && ride.is_active()
            && ride.college == self.college
            && ride.location == self.location
            && ride.direction == self.direction
            && self.window.contains(ride.departure_time)
    }

    /// Filters the candidate pool and orders matches by departure time.
    pub fn select(&self, candidates: Vec<RideListing>) -> Vec<RideListing> {
        let mut matches: Vec<RideListing> = candidates
            .into_iter()
            .filter(|ride| self.admits(ride))
            .collect();
        matches.sort_by(|a, b| {
            a.departure_time
                .cmp(&b.departure_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches
    }
}

/// Which end of a range a date-only value stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parses a client-supplied instant.
///
/// Accepts RFC 3339, naive date-times (taken as UTC), and bare dates. A bare
/// date covers the whole day: the start of it for [`Bound::Start`], its last
/// instant for [`Bound::End`].
pub fn parse_instant(raw: &str, bound: Bound) -> Result<DateTime<Utc>, AppError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    let invalid = || AppError::bad_request(format!("Invalid date: {raw}"));
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid())?;
    match bound {
        Bound::Start => Ok(date.and_time(NaiveTime::MIN).and_utc()),
        // Last instant of the day: the following midnight minus one nanosecond.
        Bound::End => date
            .succ_opt()
            .map(|next| next.and_time(NaiveTime::MIN).and_utc() - Duration::nanoseconds(1))
            .ok_or_else(invalid),
    }
}
