//! Normalized read requests.
//!
//! A `RequestContext` is built once per incoming request and never mutated
//! afterwards; every re-targeted read (another URL, another time, other
//! fields) is a new value produced by one of the `with_*` builders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bbox::LatLonBox;
use crate::encoding::OutputFormat;
use crate::time::{TimeSelector, TimeSpan};

/// Kind of request, classified by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadKind {
    AllHeaders,
    Volume,
    Vsection,
    TimeList,
    TimeHeight,
}

impl ReadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllHeaders => "all_headers",
            Self::Volume => "volume",
            Self::Vsection => "vsection",
            Self::TimeList => "time_list",
            Self::TimeHeight => "time_height",
        }
    }
}

/// Vertical level limits, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerticalLimits {
    pub min: f64,
    pub max: f64,
}

impl VerticalLimits {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, level: f64) -> bool {
        level >= self.min && level <= self.max
    }
}

/// A vertical-section path vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lon: f64,
}

impl Waypoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// A point resampled along a waypoint path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub lat: f64,
    pub lon: f64,
    /// Index of the path segment this point lies on.
    pub segment: usize,
    /// Distance along the path from the first waypoint, km.
    pub distance_km: f64,
}

/// The normalized read request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    pub kind: ReadKind,
    /// Archive URL. Replaced per candidate when routing across sources.
    pub url: String,
    /// Requested field names, in response order.
    #[serde(default)]
    pub field_names: Vec<String>,
    pub time: TimeSelector,
    /// Horizontal limits. `None` reads the whole domain.
    #[serde(default)]
    pub limits: Option<LatLonBox>,
    #[serde(default)]
    pub vertical: Option<VerticalLimits>,
    /// Collapse the vertical dimension by column maximum.
    #[serde(default)]
    pub composite: bool,
    #[serde(default)]
    pub output: OutputFormat,
    /// Vertical-section path; a single waypoint asks for a point profile.
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
    /// Try a measured RHI scan before reconstructing a cross-section.
    #[serde(default)]
    pub rhi_mode: bool,
    /// Interval searched by time-list and time-height requests.
    #[serde(default)]
    pub time_span: Option<TimeSpan>,
    /// Explicit time-height times; overrides `time_span` when non-empty.
    #[serde(default)]
    pub times: Vec<DateTime<Utc>>,
}

impl RequestContext {
    /// A volume request for `fields` at `url`.
    pub fn volume(url: impl Into<String>, fields: &[&str], time: TimeSelector) -> Self {
        Self {
            kind: ReadKind::Volume,
            url: url.into(),
            field_names: fields.iter().map(|f| f.to_string()).collect(),
            time,
            limits: None,
            vertical: None,
            composite: false,
            output: OutputFormat::asis(),
            waypoints: Vec::new(),
            rhi_mode: false,
            time_span: None,
            times: Vec::new(),
        }
    }

    /// A vertical-section request along `waypoints`.
    pub fn vsection(
        url: impl Into<String>,
        fields: &[&str],
        time: TimeSelector,
        waypoints: Vec<Waypoint>,
    ) -> Self {
        Self {
            kind: ReadKind::Vsection,
            waypoints,
            ..Self::volume(url, fields, time)
        }
    }

    pub fn with_kind(&self, kind: ReadKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }

    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..self.clone()
        }
    }

    pub fn with_fields<S: AsRef<str>>(&self, fields: &[S]) -> Self {
        Self {
            field_names: fields.iter().map(|f| f.as_ref().to_string()).collect(),
            ..self.clone()
        }
    }

    pub fn with_time(&self, time: TimeSelector) -> Self {
        Self {
            time,
            ..self.clone()
        }
    }

    pub fn with_vertical(&self, vertical: Option<VerticalLimits>) -> Self {
        Self {
            vertical,
            ..self.clone()
        }
    }

    pub fn with_composite(&self, composite: bool) -> Self {
        Self {
            composite,
            ..self.clone()
        }
    }

    pub fn with_waypoints(&self, waypoints: Vec<Waypoint>) -> Self {
        Self {
            waypoints,
            ..self.clone()
        }
    }

    /// The region used to pick a domain: the horizontal limits, or nothing
    /// for point / unlimited requests.
    pub fn routing_region(&self) -> Option<LatLonBox> {
        match self.kind {
            ReadKind::TimeHeight => None,
            ReadKind::Vsection if self.waypoints.len() < 2 => None,
            ReadKind::Vsection => {
                let mut region = LatLonBox::point(self.waypoints[0].lat, self.waypoints[0].lon);
                for wp in &self.waypoints[1..] {
                    region.min_lat = region.min_lat.min(wp.lat);
                    region.max_lat = region.max_lat.max(wp.lat);
                    region.min_lon = region.min_lon.min(wp.lon);
                    region.max_lon = region.max_lon.max(wp.lon);
                }
                Some(region)
            }
            _ => self.limits,
        }
    }

    /// Short description for logs and error messages.
    pub fn describe(&self) -> String {
        format!("{} @ {}", self.url, self.time.describe())
    }
}
