//! Measured-RHI selection for vertical-section requests.
//!
//! A vertical section that starts near a radar and runs along one azimuth
//! can be answered by a stored RHI scan instead of a section reconstructed
//! from a volume. Selection either produces the measured section or a
//! fallback signal; it never modifies the original request, and a fallback
//! is a normal outcome.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use field_common::{
    FieldHeader, FieldResult, FieldVolume, ProjectionType, ReadKind, RequestContext, SamplePoint,
    TimeSelector, TimeSpan, VerticalLimits, Waypoint,
};

use crate::config::RhiConfig;
use crate::geo;
use crate::store::GridStore;
use crate::vsection::compute_sample_points;

/// One stored beam of an RHI scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RhiAzimuthSample {
    pub time: DateTime<Utc>,
    pub azimuth_deg: f64,
}

/// Why the measured path was abandoned.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    DerivedFields,
    NoSearchTime,
    NoScans,
    AzimuthReadFailed(String),
    NoAzimuths,
    WaypointCount(usize),
    TooFarFromRadar { offset: f64 },
    NotOutbound,
    PathNotRadial { error_deg: f64 },
    RangeCoverage { coverage: f64 },
    AzimuthTooFar { error_deg: f64 },
    ScanReadFailed(String),
    ProjectionMismatch(ProjectionType),
}

impl FallbackReason {
    /// Short label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DerivedFields => "derived_fields",
            Self::NoSearchTime => "no_search_time",
            Self::NoScans => "no_scans",
            Self::AzimuthReadFailed(_) => "azimuth_read_failed",
            Self::NoAzimuths => "no_azimuths",
            Self::WaypointCount(_) => "waypoint_count",
            Self::TooFarFromRadar { .. } => "too_far_from_radar",
            Self::NotOutbound => "not_outbound",
            Self::PathNotRadial { .. } => "path_not_radial",
            Self::RangeCoverage { .. } => "range_coverage",
            Self::AzimuthTooFar { .. } => "azimuth_too_far",
            Self::ScanReadFailed(_) => "scan_read_failed",
            Self::ProjectionMismatch(_) => "projection_mismatch",
        }
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WaypointCount(n) => write!(f, "need 2 waypoints, got {}", n),
            Self::TooFarFromRadar { offset } => {
                write!(f, "first waypoint {:.1} km from radar", offset)
            }
            Self::PathNotRadial { error_deg } => {
                write!(f, "path is {:.1} deg off radial", error_deg)
            }
            Self::RangeCoverage { coverage } => {
                write!(f, "scan covers {:.0}% of requested range", coverage * 100.0)
            }
            Self::AzimuthTooFar { error_deg } => {
                write!(f, "nearest scan azimuth {:.1} deg off", error_deg)
            }
            Self::AzimuthReadFailed(msg) | Self::ScanReadFailed(msg) => {
                write!(f, "{}: {}", self.as_str(), msg)
            }
            Self::ProjectionMismatch(p) => write!(f, "scan projection {}", p),
            _ => write!(f, "{}", self.as_str()),
        }
    }
}

/// A vertical section answered from a measured scan.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredRhi {
    pub fields: Vec<FieldVolume>,
    pub time: DateTime<Utc>,
    pub azimuth_deg: f64,
    /// Radar to end of the scan (or the user's end point) along the azimuth.
    pub waypoints: Vec<Waypoint>,
    pub points: Vec<SamplePoint>,
}

/// Outcome of RHI selection.
#[derive(Debug, Clone, PartialEq)]
pub enum RhiSelection {
    Measured(MeasuredRhi),
    Fallback(FallbackReason),
}

impl RhiSelection {
    pub fn used_measured(&self) -> bool {
        matches!(self, Self::Measured(_))
    }
}

/// Requested-path geometry relative to the radar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestedRay {
    pub azimuth_deg: f64,
    pub start_km: f64,
    pub end_km: f64,
}

/// Check the two waypoints describe an outbound radial from the radar that
/// the scan's range envelope mostly covers, and return the requested
/// azimuth (radar to midpoint).
pub fn requested_ray(
    radar: (f64, f64),
    waypoints: &[Waypoint],
    range_envelope: (f64, f64),
    config: &RhiConfig,
) -> Result<RequestedRay, FallbackReason> {
    let [start, end] = waypoints else {
        return Err(FallbackReason::WaypointCount(waypoints.len()));
    };
    let (rlat, rlon) = radar;

    let start_km = geo::distance_km(rlat, rlon, start.lat, start.lon);
    if start_km > config.max_radar_offset {
        return Err(FallbackReason::TooFarFromRadar { offset: start_km });
    }
    let end_km = geo::distance_km(rlat, rlon, end.lat, end.lon);
    if end_km <= start_km {
        return Err(FallbackReason::NotOutbound);
    }

    let path_az = geo::bearing_deg(start.lat, start.lon, end.lat, end.lon);
    let end_az = geo::bearing_deg(rlat, rlon, end.lat, end.lon);
    let error_deg = geo::azimuth_diff(path_az, end_az);
    if error_deg > config.azimuth_tolerance_deg {
        return Err(FallbackReason::PathNotRadial { error_deg });
    }

    let (lo, hi) = range_envelope;
    let overlap = (end_km.min(hi) - start_km.max(lo)).max(0.0);
    let coverage = overlap / (end_km - start_km);
    if coverage < config.min_range_coverage {
        return Err(FallbackReason::RangeCoverage { coverage });
    }

    let (mlat, mlon) = geo::midpoint(start.lat, start.lon, end.lat, end.lon);
    Ok(RequestedRay {
        azimuth_deg: geo::normalize_deg(geo::bearing_deg(rlat, rlon, mlat, mlon)),
        start_km,
        end_km,
    })
}

/// Score of one beam: azimuth error plus the time error as a fraction of
/// the margin, weighted. Lower is better.
pub fn score_sample(
    sample: &RhiAzimuthSample,
    azimuth_deg: f64,
    time: DateTime<Utc>,
    margin_secs: i64,
    time_weight: f64,
) -> f64 {
    let az_error = geo::azimuth_diff(sample.azimuth_deg, azimuth_deg);
    let time_term = if margin_secs > 0 {
        (sample.time - time).num_seconds().abs() as f64 / margin_secs as f64 * time_weight
    } else {
        0.0
    };
    az_error + time_term
}

/// Lowest-scoring beam, if any.
pub fn best_sample(
    samples: &[RhiAzimuthSample],
    azimuth_deg: f64,
    time: DateTime<Utc>,
    margin_secs: i64,
    time_weight: f64,
) -> Option<RhiAzimuthSample> {
    samples
        .iter()
        .map(|s| (s, score_sample(s, azimuth_deg, time, margin_secs, time_weight)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(s, _)| *s)
}

/// Picks between a measured RHI scan and reconstruction.
pub struct RhiSelector<'s, S: GridStore + ?Sized> {
    store: &'s S,
    config: &'s RhiConfig,
    spacing_km: f64,
}

impl<'s, S: GridStore + ?Sized> RhiSelector<'s, S> {
    pub fn new(store: &'s S, config: &'s RhiConfig, spacing_km: f64) -> Self {
        Self {
            store,
            config,
            spacing_km,
        }
    }

    /// Try to answer `request` from a measured scan.
    ///
    /// Only an unreachable RHI archive while reading azimuths is an error;
    /// every other problem yields [`RhiSelection::Fallback`].
    pub async fn select(&self, request: &RequestContext) -> FieldResult<RhiSelection> {
        let Some(time) = request.time.search_time() else {
            return Ok(RhiSelection::Fallback(FallbackReason::NoSearchTime));
        };
        let margin = self.config.time_margin_secs;
        let url = self.config.url.as_str();

        let scan_times = match self.store.list_times(url, &TimeSpan::around(time, margin)).await {
            Ok(t) if !t.is_empty() => t,
            Ok(_) => return Ok(RhiSelection::Fallback(FallbackReason::NoScans)),
            Err(e) => {
                warn!(url = %url, error = %e, "Cannot list RHI scans");
                return Ok(RhiSelection::Fallback(FallbackReason::NoScans));
            }
        };

        let (samples, first_header) = match self.read_azimuths(request, &scan_times).await {
            Ok(found) => found,
            Err(e) if e.is_source_unreachable() => return Err(e),
            Err(e) => {
                return Ok(RhiSelection::Fallback(FallbackReason::AzimuthReadFailed(
                    e.to_string(),
                )))
            }
        };
        let Some(first_header) = first_header else {
            return Ok(RhiSelection::Fallback(FallbackReason::NoAzimuths));
        };
        if samples.is_empty() {
            return Ok(RhiSelection::Fallback(FallbackReason::NoAzimuths));
        }

        let radar = self
            .config
            .radar_position()
            .unwrap_or((first_header.proj.origin_lat, first_header.proj.origin_lon));
        let envelope = (first_header.minx, first_header.max_x());
        let ray = match requested_ray(radar, &request.waypoints, envelope, self.config) {
            Ok(ray) => ray,
            Err(reason) => return Ok(RhiSelection::Fallback(reason)),
        };

        let Some(best) = best_sample(
            &samples,
            ray.azimuth_deg,
            time,
            margin,
            self.config.time_weight,
        ) else {
            return Ok(RhiSelection::Fallback(FallbackReason::NoAzimuths));
        };
        let error_deg = geo::azimuth_diff(best.azimuth_deg, ray.azimuth_deg);
        if error_deg > self.config.max_azimuth_error_deg {
            return Ok(RhiSelection::Fallback(FallbackReason::AzimuthTooFar { error_deg }));
        }

        debug!(
            time = %best.time,
            azimuth = best.azimuth_deg,
            requested = ray.azimuth_deg,
            "Selected measured RHI beam"
        );
        Ok(self.read_scan(request, radar, &ray, best).await)
    }

    /// Beams of every candidate scan, plus the first scan's header. A
    /// failure on any scan time fails the whole read.
    async fn read_azimuths(
        &self,
        request: &RequestContext,
        scan_times: &[DateTime<Utc>],
    ) -> FieldResult<(Vec<RhiAzimuthSample>, Option<FieldHeader>)> {
        let mut samples = Vec::new();
        let mut first_header = None;

        for &time in scan_times {
            let scan = request
                .with_kind(ReadKind::AllHeaders)
                .with_url(self.config.url.as_str())
                .with_time(TimeSelector::Exact { time });
            let headers = self.store.read_all_headers(&scan).await?;
            let Some(header) = headers.into_iter().next() else {
                continue;
            };
            samples.extend(header.vlevels.iter().map(|&azimuth_deg| RhiAzimuthSample {
                time,
                azimuth_deg,
            }));
            if first_header.is_none() {
                first_header = Some(header);
            }
        }
        Ok((samples, first_header))
    }

    async fn read_scan(
        &self,
        request: &RequestContext,
        radar: (f64, f64),
        ray: &RequestedRay,
        beam: RhiAzimuthSample,
    ) -> RhiSelection {
        let scan = request
            .with_kind(ReadKind::Volume)
            .with_url(self.config.url.as_str())
            .with_time(TimeSelector::Exact { time: beam.time })
            .with_vertical(Some(VerticalLimits::new(beam.azimuth_deg, beam.azimuth_deg)));

        let fields = match self.store.read_volume(&scan).await {
            Ok(f) if !f.is_empty() => f,
            Ok(_) => {
                return RhiSelection::Fallback(FallbackReason::ScanReadFailed(
                    "no fields returned".to_string(),
                ))
            }
            Err(e) => return RhiSelection::Fallback(FallbackReason::ScanReadFailed(e.to_string())),
        };

        if let Some(bad) = fields.iter().map(|f| f.header.proj_type).find(|p| {
            !matches!(p, ProjectionType::RhiRadar | ProjectionType::Vsection)
        }) {
            return RhiSelection::Fallback(FallbackReason::ProjectionMismatch(bad));
        }

        let max_range = fields[0].header.max_x();
        let end_km = if self.config.respect_user_distance {
            max_range.min(ray.end_km)
        } else {
            max_range
        };
        let (rlat, rlon) = radar;
        let (elat, elon) = geo::destination(rlat, rlon, end_km, beam.azimuth_deg);
        let waypoints = vec![Waypoint::new(rlat, rlon), Waypoint::new(elat, elon)];
        let points = compute_sample_points(&waypoints, self.spacing_km);

        RhiSelection::Measured(MeasuredRhi {
            fields,
            time: beam.time,
            azimuth_deg: beam.azimuth_deg,
            waypoints,
            points,
        })
    }
}
