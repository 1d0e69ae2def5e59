use chrono::{DateTime, SecondsFormat, Utc};

/// Time primitives
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct Time(pub f64); // seconds since the unix epoch

impl Time {
    /// Parses an ISO-8601 / RFC 3339 timestamp.
    pub fn from_iso8601(s: &str) -> Option<Time> {
        let dt = DateTime::parse_from_rfc3339(s.trim()).ok()?;
        let secs = dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) * 1e-9;
        Some(Time(secs))
    }

    /// Formats as RFC 3339 in UTC with millisecond precision.
    ///
    /// Returns `None` for non-finite or out-of-range times.
    pub fn to_iso8601(self) -> Option<String> {
        if !self.0.is_finite() {
            return None;
        }
        let millis = (self.0 * 1000.0).round() as i64;
        let dt = DateTime::<Utc>::from_timestamp_millis(millis)?;
        Some(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn seconds_until(self, later: Time) -> f64 {
        later.0 - self.0
    }

    pub fn add_seconds(self, s: f64) -> Time {
        Time(self.0 + s)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimeSpan {
    pub start: Time,
    pub end: Time,
}

impl TimeSpan {
    pub fn new(start: Time, end: Time) -> Self {
        Self { start, end }
    }

    pub fn forever() -> Self {
        Self {
            start: Time(f64::NEG_INFINITY),
            end: Time(f64::INFINITY),
        }
    }

    pub fn instant(t: Time) -> Self {
        Self { start: t, end: t }
    }

    pub fn duration(&self) -> f64 {
        (self.end.0 - self.start.0).max(0.0)
    }

    pub fn contains(&self, t: Time) -> bool {
        t.0 >= self.start.0 && t.0 <= self.end.0
    }

    pub fn clamp(&self, t: Time) -> Time {
        Time(t.0.max(self.start.0).min(self.end.0))
    }
}
