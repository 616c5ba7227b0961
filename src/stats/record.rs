//! Counter record types and ranking fields.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::StatsError;

/// User id recorded for downloads by anonymous visitors.
pub const ANONYMOUS_USER_ID: i64 = 0;

/// Download counters for a single resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CounterRecord {
    /// The downloadable resource these counters belong to.
    pub resource_id: i64,
    /// Lifetime downloads.
    pub total_count: i64,
    /// Downloads since the last daily reset.
    pub day_count: i64,
    /// Unix time of the most recent recorded download.
    pub last_timestamp: i64,
    /// User who triggered the most recent download (0 = anonymous).
    pub last_user_id: i64,
}

impl CounterRecord {
    /// Returns true when the last download was made by an anonymous visitor.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.last_user_id == ANONYMOUS_USER_ID
    }

    /// Returns the value of the given ranking field.
    #[must_use]
    pub fn value_of(&self, field: OrderField) -> i64 {
        match field {
            OrderField::TotalCount => self.total_count,
            OrderField::DayCount => self.day_count,
            OrderField::LastTimestamp => self.last_timestamp,
        }
    }
}

/// Counter column used to rank resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderField {
    /// Lifetime downloads.
    #[default]
    TotalCount,
    /// Downloads since the last daily reset.
    DayCount,
    /// Most recent download time.
    LastTimestamp,
}

impl OrderField {
    /// All ranking fields.
    pub const ALL: [Self; 3] = [Self::TotalCount, Self::DayCount, Self::LastTimestamp];

    /// Returns the database column name.
    #[must_use]
    pub fn column(&self) -> &'static str {
        match self {
            Self::TotalCount => "total_count",
            Self::DayCount => "day_count",
            Self::LastTimestamp => "last_timestamp",
        }
    }
}

impl fmt::Display for OrderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column())
    }
}

impl std::str::FromStr for OrderField {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total_count" | "totalcount" => Ok(Self::TotalCount),
            "day_count" | "daycount" => Ok(Self::DayCount),
            "last_timestamp" | "timestamp" => Ok(Self::LastTimestamp),
            _ => Err(StatsError::InvalidOrderField(s.to_string())),
        }
    }
}

/// Ranked resource joined with its filename and the last downloading user.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct FilenameEntry {
    /// The downloadable resource.
    pub resource_id: i64,
    /// Display name of the resource.
    pub filename: String,
    /// User who triggered the most recent download.
    pub user_id: i64,
    /// Name of that user, empty when the user has no account row.
    pub username: String,
}
