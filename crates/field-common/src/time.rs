//! Time search modes and time formatting for archive reads.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// File-stem format used for archive entries (`20240501_120000`).
pub const STORAGE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// How a read request picks a data time from an archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TimeSelector {
    /// Exactly this time.
    Exact { time: DateTime<Utc> },
    /// Nearest available time within `margin_secs` either side.
    Closest {
        time: DateTime<Utc>,
        margin_secs: i64,
    },
    /// Latest time at or before `time`, no earlier than `time - margin_secs`.
    FirstBefore {
        time: DateTime<Utc>,
        margin_secs: i64,
    },
    /// Earliest time at or after `time`, no later than `time + margin_secs`.
    FirstAfter {
        time: DateTime<Utc>,
        margin_secs: i64,
    },
    /// Most recent time in the archive.
    Latest,
    /// An explicit archive entry, bypassing time search.
    Path { path: String },
}

impl TimeSelector {
    /// Reference time of a time-based search.
    pub fn search_time(&self) -> Option<DateTime<Utc>> {
        match self {
            TimeSelector::Exact { time }
            | TimeSelector::Closest { time, .. }
            | TimeSelector::FirstBefore { time, .. }
            | TimeSelector::FirstAfter { time, .. } => Some(*time),
            TimeSelector::Latest | TimeSelector::Path { .. } => None,
        }
    }

    /// True if the request names an explicit archive entry.
    pub fn is_path_based(&self) -> bool {
        matches!(self, TimeSelector::Path { .. })
    }

    /// Same search mode with the reference time moved by `offset`.
    ///
    /// Returns `None` for modes without a reference time.
    pub fn shifted(&self, offset: Duration) -> Option<TimeSelector> {
        let shifted = match self {
            TimeSelector::Exact { time } => TimeSelector::Exact {
                time: *time + offset,
            },
            TimeSelector::Closest { time, margin_secs } => TimeSelector::Closest {
                time: *time + offset,
                margin_secs: *margin_secs,
            },
            TimeSelector::FirstBefore { time, margin_secs } => TimeSelector::FirstBefore {
                time: *time + offset,
                margin_secs: *margin_secs,
            },
            TimeSelector::FirstAfter { time, margin_secs } => TimeSelector::FirstAfter {
                time: *time + offset,
                margin_secs: *margin_secs,
            },
            TimeSelector::Latest | TimeSelector::Path { .. } => return None,
        };
        Some(shifted)
    }

    /// Same search mode with a different reference time. Path and latest
    /// searches become exact searches at `time`.
    pub fn at_time(&self, time: DateTime<Utc>) -> TimeSelector {
        match self {
            TimeSelector::Closest { margin_secs, .. } => TimeSelector::Closest {
                time,
                margin_secs: *margin_secs,
            },
            TimeSelector::FirstBefore { margin_secs, .. } => TimeSelector::FirstBefore {
                time,
                margin_secs: *margin_secs,
            },
            TimeSelector::FirstAfter { margin_secs, .. } => TimeSelector::FirstAfter {
                time,
                margin_secs: *margin_secs,
            },
            _ => TimeSelector::Exact { time },
        }
    }

    /// Pick a time from the available archive times.
    pub fn select(&self, available: &[DateTime<Utc>]) -> Option<DateTime<Utc>> {
        match self {
            TimeSelector::Exact { time } => available.iter().copied().find(|t| t == time),
            TimeSelector::Closest { time, margin_secs } => available
                .iter()
                .copied()
                .filter(|t| (*t - *time).num_seconds().abs() <= *margin_secs)
                .min_by_key(|t| (*t - *time).num_seconds().abs()),
            TimeSelector::FirstBefore { time, margin_secs } => available
                .iter()
                .copied()
                .filter(|t| t <= time && (*time - *t).num_seconds() <= *margin_secs)
                .max(),
            TimeSelector::FirstAfter { time, margin_secs } => available
                .iter()
                .copied()
                .filter(|t| t >= time && (*t - *time).num_seconds() <= *margin_secs)
                .min(),
            TimeSelector::Latest => available.iter().copied().max(),
            TimeSelector::Path { .. } => None,
        }
    }

    /// Short description for logs and error messages.
    pub fn describe(&self) -> String {
        match self {
            TimeSelector::Exact { time } => format_time(time),
            TimeSelector::Closest { time, margin_secs } => {
                format!("{} (closest, ±{}s)", format_time(time), margin_secs)
            }
            TimeSelector::FirstBefore { time, margin_secs } => {
                format!("{} (first before, {}s)", format_time(time), margin_secs)
            }
            TimeSelector::FirstAfter { time, margin_secs } => {
                format!("{} (first after, {}s)", format_time(time), margin_secs)
            }
            TimeSelector::Latest => "latest".to_string(),
            TimeSelector::Path { path } => format!("path {}", path),
        }
    }
}

/// An inclusive time interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSpan {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Interval of `margin_secs` either side of `center`.
    pub fn around(center: DateTime<Utc>, margin_secs: i64) -> Self {
        Self {
            start: center - Duration::seconds(margin_secs),
            end: center + Duration::seconds(margin_secs),
        }
    }

    pub fn contains(&self, t: &DateTime<Utc>) -> bool {
        *t >= self.start && *t <= self.end
    }
}

/// Parse an ISO 8601 time, assuming UTC when no zone is given.
pub fn parse_time(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

/// Format a time the way errors and logs report it.
pub fn format_time(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Archive file stem for a data time.
pub fn storage_stamp(t: &DateTime<Utc>) -> String {
    t.format(STORAGE_STAMP_FORMAT).to_string()
}

/// Parse an archive file stem back into a data time.
pub fn parse_storage_stamp(stem: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(stem, STORAGE_STAMP_FORMAT)
        .ok()
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_select_modes() {
        let available = vec![t(0), t(300), t(600)];

        let exact = TimeSelector::Exact { time: t(300) };
        assert_eq!(exact.select(&available), Some(t(300)));
        assert_eq!(TimeSelector::Exact { time: t(301) }.select(&available), None);

        let closest = TimeSelector::Closest {
            time: t(420),
            margin_secs: 200,
        };
        assert_eq!(closest.select(&available), Some(t(300)));

        let before = TimeSelector::FirstBefore {
            time: t(599),
            margin_secs: 600,
        };
        assert_eq!(before.select(&available), Some(t(300)));

        let after = TimeSelector::FirstAfter {
            time: t(301),
            margin_secs: 100,
        };
        assert_eq!(after.select(&available), None);

        assert_eq!(TimeSelector::Latest.select(&available), Some(t(600)));
    }

    #[test]
    fn test_shifted_keeps_mode() {
        let sel = TimeSelector::Closest {
            time: t(0),
            margin_secs: 60,
        };
        let shifted = sel.shifted(Duration::seconds(-3600)).unwrap();
        assert_eq!(shifted.search_time(), Some(t(-3600)));
        assert!(matches!(shifted, TimeSelector::Closest { margin_secs: 60, .. }));

        let path = TimeSelector::Path {
            path: "/data/x.json".into(),
        };
        assert!(path.shifted(Duration::seconds(10)).is_none());
        assert!(path.is_path_based());
    }

    #[test]
    fn test_storage_stamp_roundtrip() {
        let stamp = storage_stamp(&t(0));
        assert_eq!(parse_storage_stamp(&stamp), Some(t(0)));
        assert_eq!(parse_storage_stamp("not-a-time"), None);
    }

    #[test]
    fn test_parse_time() {
        let a = parse_time("2024-05-01T12:00:00Z").unwrap();
        let b = parse_time("2024-05-01T12:00:00").unwrap();
        assert_eq!(a, b);
        assert!(parse_time("yesterday").is_err());
    }
}
