//! Field read handlers.
//!
//! Every endpoint takes a JSON [`RequestContext`]; the endpoint decides the
//! request kind, so a `kind` in the body is overridden.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use field_common::{FieldHeader, FieldVolume, ReadKind, RequestContext, SamplePoint, Waypoint};
use field_engine::VsectionResult;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct FieldsResponse {
    pub fields: Vec<FieldVolume>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HeadersResponse {
    pub headers: Vec<FieldHeader>,
}

/// Section fields plus the path they were sampled along, which differs from
/// the requested path when a measured RHI scan answered.
#[derive(Debug, Serialize, Deserialize)]
pub struct VsectionResponse {
    pub fields: Vec<FieldVolume>,
    pub waypoints: Vec<Waypoint>,
    pub points: Vec<SamplePoint>,
    pub measured: bool,
}

impl From<VsectionResult> for VsectionResponse {
    fn from(result: VsectionResult) -> Self {
        Self {
            fields: result.fields,
            waypoints: result.waypoints,
            points: result.points,
            measured: result.measured,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimesResponse {
    pub times: Vec<DateTime<Utc>>,
}

fn observe(kind: ReadKind, started: Instant, ok: bool) {
    let elapsed = started.elapsed().as_secs_f64();
    metrics::histogram!("field_request_duration_seconds", "kind" => kind.as_str()).record(elapsed);
    info!(
        kind = kind.as_str(),
        ok,
        duration_ms = (elapsed * 1000.0) as u64,
        "Handled field request"
    );
}

/// POST /fields/headers - Headers of every field at the routed source
pub async fn headers_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<RequestContext>,
) -> ApiResult<Json<HeadersResponse>> {
    let started = Instant::now();
    let request = request.with_kind(ReadKind::AllHeaders);
    let result = state.server.handle_read_all_headers(&request).await;
    observe(request.kind, started, result.is_ok());
    Ok(Json(HeadersResponse { headers: result? }))
}

/// POST /fields/volume - Requested fields as volumes
pub async fn volume_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<RequestContext>,
) -> ApiResult<Json<FieldsResponse>> {
    let started = Instant::now();
    let request = request.with_kind(ReadKind::Volume);
    let result = state.server.handle_read_volume(&request).await;
    observe(request.kind, started, result.is_ok());
    Ok(Json(FieldsResponse { fields: result? }))
}

/// POST /fields/vsection - Requested fields along a waypoint path
pub async fn vsection_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<RequestContext>,
) -> ApiResult<Json<VsectionResponse>> {
    let started = Instant::now();
    let request = request.with_kind(ReadKind::Vsection);
    let result = state.server.handle_read_vsection(&request).await;
    observe(request.kind, started, result.is_ok());
    Ok(Json(result?.into()))
}

/// POST /fields/time-list - Data times within the request's span
pub async fn time_list_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<RequestContext>,
) -> ApiResult<Json<TimesResponse>> {
    let started = Instant::now();
    let request = request.with_kind(ReadKind::TimeList);
    let result = state.server.handle_time_list(&request).await;
    observe(request.kind, started, result.is_ok());
    Ok(Json(TimesResponse { times: result? }))
}

/// POST /fields/time-height - Time-height grids at one point
pub async fn time_height_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<RequestContext>,
) -> ApiResult<Json<FieldsResponse>> {
    let started = Instant::now();
    let request = request.with_kind(ReadKind::TimeHeight);
    let result = state.server.handle_compile_time_height(&request).await;
    observe(request.kind, started, result.is_ok());
    Ok(Json(FieldsResponse { fields: result? }))
}
