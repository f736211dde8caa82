//! Typed instants and node expiry
//!
//! A [`DateInstant`] is either date-only or date-and-time. Date-only instants
//! always sit at midnight and their time of day is never merged. Field-wise
//! merges rebuild the instant from the previous value plus the changed
//! component, so setting a date never truncates a time and vice versa.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CofferError, CofferResult};

/// Whether an instant carries a meaningful time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstantKind {
    /// Date only, time fixed at 00:00:00
    Date,
    /// Date and time of day
    DateTime,
}

#[derive(Deserialize)]
struct RawInstant {
    value: NaiveDateTime,
    kind: InstantKind,
}

impl From<RawInstant> for DateInstant {
    fn from(raw: RawInstant) -> Self {
        Self::new(raw.value, raw.kind)
    }
}

/// A point in time tagged as date-only or date-and-time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawInstant")]
pub struct DateInstant {
    value: NaiveDateTime,
    kind: InstantKind,
}

impl DateInstant {
    /// Build an instant, dropping the time of day for date-only instants
    pub fn new(value: NaiveDateTime, kind: InstantKind) -> Self {
        let value = match kind {
            InstantKind::Date => value.date().and_time(NaiveTime::MIN),
            InstantKind::DateTime => value,
        };
        Self { value, kind }
    }

    /// Date-only instant
    pub fn date(date: NaiveDate) -> Self {
        Self::new(date.and_time(NaiveTime::MIN), InstantKind::Date)
    }

    /// Date-and-time instant
    pub fn date_time(value: NaiveDateTime) -> Self {
        Self::new(value, InstantKind::DateTime)
    }

    /// Current UTC time, truncated to the minute
    pub fn now() -> Self {
        let now = Utc::now().naive_utc();
        let truncated = now
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(now);
        Self::date_time(truncated)
    }

    /// The full value (midnight for date-only instants)
    pub fn value(&self) -> NaiveDateTime {
        self.value
    }

    /// Instant kind
    pub fn kind(&self) -> InstantKind {
        self.kind
    }

    /// Date component
    pub fn date_part(&self) -> NaiveDate {
        self.value.date()
    }

    /// Time component; `None` for date-only instants
    pub fn time_part(&self) -> Option<NaiveTime> {
        match self.kind {
            InstantKind::Date => None,
            InstantKind::DateTime => Some(self.value.time()),
        }
    }

    /// Same instant with another kind
    pub fn with_kind(self, kind: InstantKind) -> Self {
        Self::new(self.value, kind)
    }
}

impl Default for DateInstant {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for DateInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            InstantKind::Date => write!(f, "{}", self.value.format("%Y-%m-%d")),
            InstantKind::DateTime => write!(f, "{}", self.value.format("%Y-%m-%d %H:%M")),
        }
    }
}

/// Replace year, month and day; time of day and kind are preserved
pub fn merge_date_components(
    previous: DateInstant,
    year: i32,
    month: u32,
    day: u32,
) -> CofferResult<DateInstant> {
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        CofferError::Validation(format!("Invalid date: {:04}-{:02}-{:02}", year, month, day))
    })?;
    Ok(DateInstant::new(date.and_time(previous.value.time()), previous.kind))
}

/// Replace hour and minute; date, seconds and kind are preserved
///
/// Date-only instants have no meaningful time, so they come back unchanged.
pub fn merge_time_components(previous: DateInstant, hour: u32, minute: u32) -> CofferResult<DateInstant> {
    if previous.kind == InstantKind::Date {
        return Ok(previous);
    }
    let time = previous
        .value
        .time()
        .with_hour(hour)
        .and_then(|t| t.with_minute(minute))
        .ok_or_else(|| CofferError::Validation(format!("Invalid time: {:02}:{:02}", hour, minute)))?;
    Ok(DateInstant::new(previous.value.date().and_time(time), previous.kind))
}

/// Expiry settings of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Expiry {
    /// Whether the node expires at all
    #[serde(default)]
    pub enabled: bool,

    /// When it expires
    pub instant: DateInstant,
}

impl Expiry {
    /// Expiry that is switched off
    pub fn never() -> Self {
        Self::default()
    }

    /// Expiry at the given instant
    pub fn at(instant: DateInstant) -> Self {
        Self {
            enabled: true,
            instant,
        }
    }

    /// Whether the node has expired at `now`
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.enabled && self.instant.value <= now
    }
}
