use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// How far around its departure time a ride is willing to move.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Flexibility {
    Strict,
    Moderate,
    Flexible,
}

impl Flexibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flexibility::Strict => "strict",
            Flexibility::Moderate => "moderate",
            Flexibility::Flexible => "flexible",
        }
    }

    /// Strict parse used for request validation.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "strict" => Some(Flexibility::Strict),
            "moderate" => Some(Flexibility::Moderate),
            "flexible" => Some(Flexibility::Flexible),
            _ => None,
        }
    }

    /// Lenient parse for stored values: anything unrecognised is treated as
    /// the widest setting.
    pub fn from_stored(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Flexibility::Flexible)
    }

    pub fn tolerance_hours(&self) -> i64 {
        match self {
            Flexibility::Strict => 1,
            Flexibility::Moderate => 3,
            Flexibility::Flexible => 6,
        }
    }

    pub fn tolerance(&self) -> Duration {
        Duration::hours(self.tolerance_hours())
    }
}

impl fmt::Display for Flexibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Active,
    Cancelled,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Active => "active",
            RideStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(RideStatus::Active),
            "cancelled" => Some(RideStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ride joined with its owner's public profile.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RideListing {
    pub id: i64,
    pub user_id: i64,
    pub location: String,
    pub direction: String,
    pub departure_time: DateTime<Utc>,
    pub flexibility: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub college: String,
    pub gender: Option<String>,
    pub graduation_year: Option<i64>,
    /// Only selected by the administrative listing.
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl RideListing {
    pub fn flexibility(&self) -> Flexibility {
        Flexibility::from_stored(&self.flexibility)
    }

    pub fn is_active(&self) -> bool {
        RideStatus::parse(&self.status) == Some(RideStatus::Active)
    }
}

/// The owner-editable fields of a ride, used both for creation and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RideFields {
    pub location: String,
    pub direction: String,
    pub departure_time: DateTime<Utc>,
    pub flexibility: Flexibility,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerance_hours_per_setting() {
        assert_eq!(Flexibility::Strict.tolerance_hours(), 1);
        assert_eq!(Flexibility::Moderate.tolerance_hours(), 3);
        assert_eq!(Flexibility::Flexible.tolerance_hours(), 6);
    }

    #[test]
    fn unknown_stored_flexibility_gets_widest_window() {
        assert_eq!(Flexibility::from_stored("whenever"), Flexibility::Flexible);
        assert_eq!(Flexibility::from_stored(""), Flexibility::Flexible);
        assert_eq!(Flexibility::from_stored("strict"), Flexibility::Strict);
    }

    #[test]
    fn request_parse_rejects_unknown_values() {
        assert_eq!(Flexibility::parse("Strict"), None);
        assert_eq!(RideStatus::parse("deleted"), None);
        assert_eq!(RideStatus::parse("cancelled"), Some(RideStatus::Cancelled));
    }
}
