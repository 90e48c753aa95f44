//! Date/time utilities for filedrop.

use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDate, SecondsFormat, Utc};
use chrono_tz::Tz;

use crate::{FiledropError, Result};

/// Calendar in which bucket dates are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketZone {
    /// The server's local time zone.
    Local,
    /// A named IANA time zone.
    Named(Tz),
}

impl BucketZone {
    /// Parse a zone setting: `"local"` (or empty) or an IANA name such as `"UTC"`.
    pub fn parse(name: &str) -> Result<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("local") {
            return Ok(BucketZone::Local);
        }
        trimmed
            .parse::<Tz>()
            .map(BucketZone::Named)
            .map_err(|_| FiledropError::Config(format!("unknown timezone: {trimmed}")))
    }

    /// Calendar date of an instant in this zone.
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            BucketZone::Local => instant.with_timezone(&Local).date_naive(),
            BucketZone::Named(tz) => instant.with_timezone(tz).date_naive(),
        }
    }

    /// Format an instant in this zone.
    pub fn format(&self, instant: DateTime<Utc>, format: &str) -> String {
        match self {
            BucketZone::Local => instant.with_timezone(&Local).format(format).to_string(),
            BucketZone::Named(tz) => instant.with_timezone(tz).format(format).to_string(),
        }
    }
}

/// Format a UTC instant as RFC3339 with second precision (e.g., "2024-03-01T12:00:00Z").
pub fn to_rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Convert a filesystem timestamp to a UTC instant.
pub fn from_system_time(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}
