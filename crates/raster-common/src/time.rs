//! Time handling utilities for scene acquisition times.

use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};

/// Parse an ISO 8601 timestamp, assuming UTC when no offset is given.
///
/// Accepts full RFC 3339 strings, naive `YYYY-MM-DDTHH:MM:SS` and bare dates.
pub fn parse_datetime(s: &str) -> CommonResult<DateTime<Utc>> {
    let s = s.trim();

    // Try full datetime with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Try without timezone (assume UTC)
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    // Try date only
    if let Ok(ndt) =
        NaiveDateTime::parse_from_str(&format!("{}T00:00:00", s), "%Y-%m-%dT%H:%M:%S")
    {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(CommonError::InvalidTime(s.to_string()))
}

/// An inclusive time range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// A range covering a single instant.
    pub fn instant(at: DateTime<Utc>) -> Self {
        Self { start: at, end: at }
    }

    /// The whole calendar year `year`, from Jan 1 00:00:00 to Dec 31 23:59:59.
    pub fn year(year: i32) -> CommonResult<Self> {
        let start = Utc
            .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| CommonError::InvalidTime(format!("year {}", year)))?;
        let end = Utc
            .with_ymd_and_hms(year, 12, 31, 23, 59, 59)
            .single()
            .ok_or_else(|| CommonError::InvalidTime(format!("year {}", year)))?;
        Ok(Self { start, end })
    }

    /// Parse a `start/end` interval string.
    ///
    /// Supports:
    /// - Closed interval: "2024-01-15T00:00:00Z/2024-01-16T00:00:00Z"
    /// - Date interval: "2020-01-01/2020-12-31"
    /// - Single time: "2024-01-15T12:00:00Z" (start == end)
    pub fn from_interval(s: &str) -> CommonResult<Self> {
        if let Some((start, end)) = s.split_once('/') {
            let range = Self::new(parse_datetime(start)?, parse_datetime(end)?);
            if range.start > range.end {
                return Err(CommonError::InvalidTime(format!(
                    "interval start after end: {}",
                    s
                )));
            }
            return Ok(range);
        }

        Ok(Self::instant(parse_datetime(s)?))
    }

    /// Smallest range covering every timestamp, or `None` for no input.
    pub fn spanning<I>(times: I) -> Option<Self>
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        times.into_iter().fold(None, |acc, t| match acc {
            None => Some(Self::instant(t)),
            Some(range) => Some(Self::new(range.start.min(t), range.end.max(t))),
        })
    }

    /// Inclusive containment check.
    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        dt >= &self.start && dt <= &self.end
    }

    /// Calendar year of the range start.
    pub fn start_year(&self) -> i32 {
        self.start.year()
    }

    /// Format as a catalog `datetime` interval parameter.
    pub fn to_interval_string(&self) -> String {
        format!(
            "{}/{}",
            self.start.format("%Y-%m-%dT%H:%M:%SZ"),
            self.end.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_interval_string())
    }
}
