//! Request handling.
//!
//! The `FieldServer` answers normalized requests: it resolves base fields,
//! routes the base read across candidate sources, derives fields, and
//! converts the results to the client's output format. All configuration is
//! read-only and shared; every request is handled independently.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = Arc::new(FileGridStore::new("/data/archives"));
//! let server = FieldServer::new(store, ServerConfig::from_file("server.yaml")?)?;
//!
//! let request = RequestContext::volume("mdv/radar", &["DBZ", "SPEED"], TimeSelector::Latest);
//! let fields = server.handle_read_volume(&request).await?;
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{debug, info, instrument};

use field_common::time::format_time;
use field_common::{
    FieldError, FieldHeader, FieldResult, FieldVolume, OutputFormat, ReadKind, RequestContext,
    SamplePoint, Waypoint,
};

use crate::config::ServerConfig;
use crate::derive::{FieldDeriver, ReadAction};
use crate::derived::DerivedFieldSpec;
use crate::resolver::{resolve, ResolvedFields};
use crate::rhi::{FallbackReason, RhiSelection, RhiSelector};
use crate::router::{try_each, DomainRouter};
use crate::store::{ClimoFileFinder, GridStore, MonthlyClimoFinder};
use crate::time_height::{assemble, ProfileRead};
use crate::vsection::compute_sample_points;

/// A vertical section with the path it was actually sampled along.
///
/// A measured RHI section runs from the radar along the scan azimuth, so its
/// path usually differs from the requested one.
#[derive(Debug, Clone, PartialEq)]
pub struct VsectionResult {
    pub fields: Vec<FieldVolume>,
    pub waypoints: Vec<Waypoint>,
    pub points: Vec<SamplePoint>,
    pub measured: bool,
}

/// Answers field requests against one grid store.
pub struct FieldServer<S: GridStore> {
    store: Arc<S>,
    config: Arc<ServerConfig>,
    specs: Vec<DerivedFieldSpec>,
    router: DomainRouter,
    climo: Option<Arc<dyn ClimoFileFinder>>,
}

impl<S: GridStore> FieldServer<S> {
    /// Validate `config` and build a server over `store`.
    pub fn new(store: Arc<S>, config: ServerConfig) -> FieldResult<Self> {
        config.validate().map_err(FieldError::InvalidConfig)?;
        let specs = config.derived_specs()?;
        let router = config.router();
        let climo = config.climo.as_ref().map(|c| {
            Arc::new(MonthlyClimoFinder::new(c.base_url.as_str())) as Arc<dyn ClimoFileFinder>
        });

        Ok(Self {
            store,
            config: Arc::new(config),
            specs,
            router,
            climo,
        })
    }

    /// Replace the climatology path lookup.
    pub fn with_climo_finder(mut self, finder: Arc<dyn ClimoFileFinder>) -> Self {
        self.climo = Some(finder);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn derived_specs(&self) -> &[DerivedFieldSpec] {
        &self.specs
    }

    /// Fill in the default URL and, in climatology mode, the archive
    /// covering the search time.
    fn normalize(&self, request: &RequestContext) -> RequestContext {
        counter!("field_requests_total", "kind" => request.kind.as_str()).increment(1);

        let mut url = if request.url.is_empty() {
            self.config.url.clone()
        } else {
            request.url.clone()
        };
        if let (Some(finder), Some(time)) = (&self.climo, request.time.search_time()) {
            url = finder.resolve_path(time);
            debug!(url = %url, "Resolved climatology archive");
        }
        request.with_url(url)
    }

    fn candidates(&self, request: &RequestContext) -> Vec<String> {
        self.router
            .candidates(request.routing_region().as_ref(), &request.url)
    }

    fn convert(&self, field: &FieldVolume, output: &OutputFormat) -> FieldVolume {
        self.store
            .convert_encoding(field, &output.resolved_for(field))
    }

    /// Headers of every field at the routed source.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn handle_read_all_headers(
        &self,
        request: &RequestContext,
    ) -> FieldResult<Vec<FieldHeader>> {
        let request = self.normalize(request);
        let store = self.store.as_ref();
        let (_, headers) = try_each(&self.candidates(&request), move |url| {
            let attempt = request.with_url(url);
            async move { store.read_all_headers(&attempt).await }
        })
        .await?;
        Ok(headers)
    }

    /// Requested fields as volumes, derived fields included, in request order.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn handle_read_volume(
        &self,
        request: &RequestContext,
    ) -> FieldResult<Vec<FieldVolume>> {
        let request = self.normalize(request);
        let resolved = resolve(&request.field_names, &self.specs);
        let base_request = request.with_fields(&resolved.base_list());

        let store = self.store.as_ref();
        let (url, base) = try_each(&self.candidates(&request), move |url| {
            let attempt = base_request.with_url(url);
            async move { store.read_volume(&attempt).await }
        })
        .await?;

        let routed = request.with_url(url);
        self.build_response(&routed, &resolved, &base, ReadAction::Volume)
            .await
    }

    /// Requested fields along the request's waypoints, from a measured RHI
    /// scan when allowed and suitable, otherwise reconstructed.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn handle_read_vsection(
        &self,
        request: &RequestContext,
    ) -> FieldResult<VsectionResult> {
        let request = self.normalize(request);
        if request.waypoints.is_empty() {
            return Err(FieldError::invalid_request(
                "vertical section needs at least one waypoint",
            ));
        }
        let resolved = resolve(&request.field_names, &self.specs);

        if request.rhi_mode && self.config.rhi.enabled {
            let selection = if resolved.has_derived() {
                RhiSelection::Fallback(FallbackReason::DerivedFields)
            } else {
                RhiSelector::new(
                    self.store.as_ref(),
                    &self.config.rhi,
                    self.config.vsection.sample_spacing_km,
                )
                .select(&request)
                .await?
            };

            match selection {
                RhiSelection::Measured(measured) => {
                    info!(
                        time = %format_time(&measured.time),
                        azimuth = measured.azimuth_deg,
                        "Answered vertical section from measured RHI"
                    );
                    return Ok(VsectionResult {
                        fields: measured
                            .fields
                            .iter()
                            .map(|f| self.convert(f, &request.output))
                            .collect(),
                        waypoints: measured.waypoints,
                        points: measured.points,
                        measured: true,
                    });
                }
                RhiSelection::Fallback(reason) => {
                    counter!("rhi_fallback_total", "reason" => reason.as_str()).increment(1);
                    info!(reason = %reason, "Falling back to reconstructed vertical section");
                }
            }
        }

        let points = compute_sample_points(&request.waypoints, self.config.vsection.sample_spacing_km);
        let (url, base) = self
            .read_section_base(&request, &resolved, &points, self.candidates(&request))
            .await?;
        let routed = request.with_url(url);
        let fields = self
            .build_response(&routed, &resolved, &base, ReadAction::Vsection(&points))
            .await?;
        Ok(VsectionResult {
            fields,
            waypoints: routed.waypoints,
            points,
            measured: false,
        })
    }

    /// Data times available at the routed source within the request's span.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn handle_time_list(
        &self,
        request: &RequestContext,
    ) -> FieldResult<Vec<DateTime<Utc>>> {
        let request = self.normalize(request);
        let span = request
            .time_span
            .ok_or_else(|| FieldError::invalid_request("time list needs a time_span"))?;

        let store = self.store.as_ref();
        let (_, times) = try_each(&self.candidates(&request), move |url| async move {
            store.list_times(&url, &span).await
        })
        .await?;
        Ok(times)
    }

    /// Time-height grids for one point: one profile per time, stitched
    /// into an nx = times, ny = 1 grid per field.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn handle_compile_time_height(
        &self,
        request: &RequestContext,
    ) -> FieldResult<Vec<FieldVolume>> {
        let request = self.normalize(request);
        if request.waypoints.len() != 1 {
            return Err(FieldError::invalid_request(format!(
                "time-height needs exactly one waypoint, got {}",
                request.waypoints.len()
            )));
        }
        let candidates = self.candidates(&request);
        let request = &request;
        let (_, grids) = try_each(&candidates, move |url| {
            self.time_height_at(request.with_url(url))
        })
        .await?;

        Ok(grids
            .iter()
            .map(|g| self.convert(g, &request.output))
            .collect())
    }

    async fn time_height_at(&self, request: RequestContext) -> FieldResult<Vec<FieldVolume>> {
        let times = if !request.times.is_empty() {
            request.times.clone()
        } else {
            let span = request.time_span.ok_or_else(|| {
                FieldError::invalid_request("time-height needs times or a time_span")
            })?;
            self.store.list_times(&request.url, &span).await?
        };

        // Profiles stay float until the assembled grids are converted once.
        let profile_request = RequestContext {
            output: OutputFormat::float32(),
            ..request.with_kind(ReadKind::Vsection).with_vertical(None)
        };
        let points = compute_sample_points(&request.waypoints, self.config.vsection.sample_spacing_km);
        let resolved = resolve(&request.field_names, &self.specs);

        let profile_request = &profile_request;
        let points = points.as_slice();
        let resolved = &resolved;
        assemble(&times, &request.url, move |time| {
            let at = profile_request.with_time(profile_request.time.at_time(time));
            self.profile_at(at, points, resolved)
        })
        .await
    }

    async fn profile_at(
        &self,
        request: RequestContext,
        points: &[SamplePoint],
        resolved: &ResolvedFields<'_>,
    ) -> FieldResult<ProfileRead> {
        let (url, base) = self
            .read_section_base(&request, resolved, points, vec![request.url.clone()])
            .await?;
        let routed = request.with_url(url);
        let fields = self
            .build_response(&routed, resolved, &base, ReadAction::Vsection(points))
            .await?;
        Ok(ProfileRead {
            path: routed.describe(),
            fields,
        })
    }

    /// Base-field vertical-section read, retried across `candidates`.
    async fn read_section_base(
        &self,
        request: &RequestContext,
        resolved: &ResolvedFields<'_>,
        points: &[SamplePoint],
        candidates: Vec<String>,
    ) -> FieldResult<(String, Vec<FieldVolume>)> {
        let base_request = request.with_fields(&resolved.base_list());
        let store = self.store.as_ref();
        try_each(&candidates, move |url| {
            let attempt = base_request.with_url(url);
            async move { store.read_vertical_section(&attempt, points).await }
        })
        .await
    }

    /// Requested fields in request order: normal fields from the base read,
    /// derived fields computed against the routed source. Any failure fails
    /// the whole response.
    async fn build_response(
        &self,
        routed: &RequestContext,
        resolved: &ResolvedFields<'_>,
        base: &[FieldVolume],
        action: ReadAction<'_>,
    ) -> FieldResult<Vec<FieldVolume>> {
        if routed.field_names.is_empty() {
            return Ok(base.iter().map(|f| self.convert(f, &routed.output)).collect());
        }

        let deriver = FieldDeriver::new(self.store.as_ref());
        let mut out = Vec::with_capacity(routed.field_names.len());
        for name in &routed.field_names {
            if let Some(spec) = resolved.derived.iter().find(|s| &s.name == name) {
                out.push(deriver.derive(spec, base, routed, action).await?);
                continue;
            }
            let field = base.iter().find(|f| f.name() == name).ok_or_else(|| {
                FieldError::not_found(format!("field '{}' not returned by {}", name, routed.url))
            })?;
            out.push(self.convert(field, &routed.output));
        }
        Ok(out)
    }
}
