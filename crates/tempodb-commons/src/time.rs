//! Time primitives shared across the scheduler crates.
//!
//! All wall-clock values are Unix timestamps in milliseconds. Dimension
//! values on integer-partitioned hypertables are opaque i64s supplied by
//! the storage layer's "integer now" resolver and never mix with these
//! types.

use bincode::{Decode, Encode};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::errors::TempoDbError;

/// A point in time as Unix milliseconds, with an explicit "unset" sentinel.
///
/// `Timestamp::UNSET` plays the role of the catalog's "no value" marker:
/// a freshly created job statistics row carries it in every field, and the
/// runtime executor clears `next_start` to it at the start of each run so
/// that an explicit value written during the run (fast restart) survives
/// the post-run bookkeeping.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Encode, Decode,
)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The unset sentinel. Sorts before every real timestamp.
    pub const UNSET: Timestamp = Timestamp(i64::MIN);

    pub fn from_millis(millis: i64) -> Self {
        Timestamp(millis)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn is_unset(&self) -> bool {
        self.0 == i64::MIN
    }

    /// Add an interval, propagating the unset sentinel.
    ///
    /// An unset timestamp stays unset no matter the interval; this mirrors
    /// the "last_finish + interval on a job that never finished is still
    /// unset" rule in the alter path.
    pub fn plus(&self, interval: Interval) -> Timestamp {
        if self.is_unset() {
            Timestamp::UNSET
        } else {
            Timestamp(self.0.saturating_add(interval.as_millis()))
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unset() {
            write!(f, "unset")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// A duration in milliseconds.
///
/// Parses from compact strings such as `"30d"`, `"12h"`, `"90m"`, `"45s"`
/// and `"500ms"`; weeks (`"2w"`) are accepted as well.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Encode, Decode,
)]
pub struct Interval(i64);

const MILLIS_PER_SECOND: i64 = 1_000;
const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;
const MILLIS_PER_WEEK: i64 = 7 * MILLIS_PER_DAY;

impl Interval {
    pub const ZERO: Interval = Interval(0);

    pub fn from_millis(millis: i64) -> Self {
        Interval(millis)
    }

    pub fn from_secs(secs: i64) -> Self {
        Interval(secs * MILLIS_PER_SECOND)
    }

    pub fn from_minutes(minutes: i64) -> Self {
        Interval(minutes * MILLIS_PER_MINUTE)
    }

    pub fn from_hours(hours: i64) -> Self {
        Interval(hours * MILLIS_PER_HOUR)
    }

    pub fn from_days(days: i64) -> Self {
        Interval(days * MILLIS_PER_DAY)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl FromStr for Interval {
    type Err = TempoDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit() && c != '-')
            .ok_or_else(|| {
                TempoDbError::invalid_parameter(format!("interval \"{}\" is missing a unit", s))
            })?;
        let (num, unit) = s.split_at(split);
        let value: i64 = num.parse().map_err(|_| {
            TempoDbError::invalid_parameter(format!("interval \"{}\" has an invalid magnitude", s))
        })?;
        let factor = match unit.trim() {
            "ms" => 1,
            "s" => MILLIS_PER_SECOND,
            "m" | "min" => MILLIS_PER_MINUTE,
            "h" => MILLIS_PER_HOUR,
            "d" => MILLIS_PER_DAY,
            "w" => MILLIS_PER_WEEK,
            other => {
                return Err(TempoDbError::invalid_parameter(format!(
                    "unknown interval unit \"{}\"",
                    other
                )))
            }
        };
        Ok(Interval(value.saturating_mul(factor)))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.0;
        if ms != 0 && ms % MILLIS_PER_DAY == 0 {
            write!(f, "{}d", ms / MILLIS_PER_DAY)
        } else if ms != 0 && ms % MILLIS_PER_HOUR == 0 {
            write!(f, "{}h", ms / MILLIS_PER_HOUR)
        } else if ms != 0 && ms % MILLIS_PER_MINUTE == 0 {
            write!(f, "{}m", ms / MILLIS_PER_MINUTE)
        } else if ms != 0 && ms % MILLIS_PER_SECOND == 0 {
            write!(f, "{}s", ms / MILLIS_PER_SECOND)
        } else {
            write!(f, "{}ms", ms)
        }
    }
}

/// A lag relative to "now", as it appears in policy config documents.
///
/// Integer-partitioned dimensions take a plain integer lag; time-partitioned
/// dimensions take an interval. Which one is legal is only known once the
/// target hypertable has been resolved, so both shapes deserialize here and
/// the mismatch is rejected at boundary computation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offset {
    Integer(i64),
    Interval(Interval),
}

impl<'de> Deserialize<'de> for Offset {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Offset::Integer)
                .ok_or_else(|| D::Error::custom("integer lag must be a whole number")),
            serde_json::Value::String(s) => s
                .parse::<Interval>()
                .map(Offset::Interval)
                .map_err(|e| D::Error::custom(e.to_string())),
            other => Err(D::Error::custom(format!(
                "lag must be an integer or a duration string, got {}",
                other
            ))),
        }
    }
}

impl Serialize for Offset {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Offset::Integer(n) => serializer.serialize_i64(*n),
            Offset::Interval(iv) => serializer.serialize_str(&iv.to_string()),
        }
    }
}

/// Wall-clock source.
///
/// Threaded through the application context so that boundary computations
/// and job statistics are testable against a manual clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Production clock backed by the system time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(chrono::Utc::now().timestamp_millis())
    }
}
