//! Absolute evaluation time windows.
//!
//! Bounds arrive as strings from the triggering request and are accepted
//! either as RFC 3339 date-times or as base-10 epoch seconds.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WindowError;

/// A resolved `[start, end]` window with its span rounded up to whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// `ceil(end - start)` in seconds.
    pub duration_seconds: u64,
}

impl TimeWindow {
    /// Parse a start/end pair into an absolute window.
    ///
    /// Fails when either bound is neither RFC 3339 nor an integer epoch, or
    /// when `end` precedes `start`.
    pub fn parse(start: &str, end: &str) -> Result<Self, WindowError> {
        let start_at = parse_timestamp("start", start)?;
        let end_at = parse_timestamp("end", end)?;
        Self::new(start_at, end_at).ok_or_else(|| WindowError::Inverted {
            start: start.to_string(),
            end: end.to_string(),
        })
    }

    /// Build a window from already-resolved instants. `None` if `end < start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        if end < start {
            return None;
        }
        Some(Self {
            start,
            end,
            duration_seconds: ceil_seconds(end - start),
        })
    }
}

/// Parse one bound: RFC 3339 first, then integer epoch seconds.
pub fn parse_timestamp(bound: &'static str, value: &str) -> Result<DateTime<Utc>, WindowError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    value
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .ok_or_else(|| WindowError::Unparseable {
            bound,
            value: value.to_string(),
        })
}

fn ceil_seconds(span: TimeDelta) -> u64 {
    let whole = span.num_seconds();
    let rounded = if span > TimeDelta::seconds(whole) {
        whole + 1
    } else {
        whole
    };
    rounded.max(0) as u64
}
