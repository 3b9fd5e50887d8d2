//! In-memory grid store for engine integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use field_common::time::storage_stamp;
use field_common::{
    FieldError, FieldHeader, FieldResult, FieldVolume, RequestContext, SamplePoint, TimeSelector,
    TimeSpan,
};
use field_engine::store::sampling;
use field_engine::GridStore;

type Archive = BTreeMap<DateTime<Utc>, Vec<FieldVolume>>;

/// Scripted store: archives keyed by URL, with configurable failures and a
/// log of every call as `"<op> <url>"`.
#[derive(Default)]
pub struct MemoryStore {
    archives: BTreeMap<String, Archive>,
    unreachable: HashSet<String>,
    unreachable_headers: HashSet<String>,
    failing_times: HashSet<(String, DateTime<Utc>)>,
    calls: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, url: &str, time: DateTime<Utc>, fields: Vec<FieldVolume>) -> Self {
        self.archives
            .entry(url.to_string())
            .or_default()
            .insert(time, fields);
        self
    }

    /// Every call against `url` fails as if the archive were down.
    pub fn with_unreachable(mut self, url: &str) -> Self {
        self.unreachable.insert(url.to_string());
        self
    }

    /// Header reads against `url` fail as if the archive were down.
    pub fn with_unreachable_headers(mut self, url: &str) -> Self {
        self.unreachable_headers.insert(url.to_string());
        self
    }

    /// Reads of the entry at `time` fail.
    pub fn with_failing_time(mut self, url: &str, time: DateTime<Utc>) -> Self {
        self.failing_times.insert((url.to_string(), time));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, op: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(op))
            .collect()
    }

    fn record(&self, op: &str, url: &str) {
        self.calls.lock().unwrap().push(format!("{} {}", op, url));
    }

    fn check_reachable(&self, url: &str) -> FieldResult<&Archive> {
        if self.unreachable.contains(url) {
            return Err(FieldError::source_unavailable(url, "connection refused"));
        }
        self.archives
            .get(url)
            .ok_or_else(|| FieldError::source_unavailable(url, "no such archive"))
    }

    fn entry(&self, request: &RequestContext) -> FieldResult<Vec<FieldVolume>> {
        let archive = self.check_reachable(&request.url)?;
        let time = match &request.time {
            TimeSelector::Path { path } => archive
                .keys()
                .copied()
                .find(|t| format!("{}/{}", request.url, storage_stamp(t)) == *path),
            selector => {
                let times: Vec<_> = archive.keys().copied().collect();
                selector.select(&times)
            }
        }
        .ok_or_else(|| {
            FieldError::not_found(format!(
                "no data at {} for {}",
                request.url,
                request.time.describe()
            ))
        })?;

        if self.failing_times.contains(&(request.url.clone(), time)) {
            return Err(FieldError::read_failed(format!(
                "corrupt entry {}/{}",
                request.url,
                storage_stamp(&time)
            )));
        }

        let entry = archive.get(&time).cloned().unwrap_or_default();
        if request.field_names.is_empty() {
            return Ok(entry);
        }
        request
            .field_names
            .iter()
            .map(|name| {
                entry
                    .iter()
                    .find(|f| f.name() == name)
                    .cloned()
                    .ok_or_else(|| {
                        FieldError::not_found(format!("field '{}' not at {}", name, request.url))
                    })
            })
            .collect()
    }
}

#[async_trait]
impl GridStore for MemoryStore {
    async fn read_all_headers(&self, request: &RequestContext) -> FieldResult<Vec<FieldHeader>> {
        self.record("headers", &request.url);
        if self.unreachable_headers.contains(&request.url) {
            return Err(FieldError::source_unavailable(&request.url, "connection reset"));
        }
        let fields = self.entry(&request.with_fields::<&str>(&[]))?;
        Ok(fields.into_iter().map(|f| f.header).collect())
    }

    async fn read_volume(&self, request: &RequestContext) -> FieldResult<Vec<FieldVolume>> {
        self.record("volume", &request.url);
        self.entry(request)?
            .iter()
            .map(|f| {
                let mut out = match &request.limits {
                    Some(limits) => sampling::crop_to_box(f, limits)?,
                    None => f.clone(),
                };
                if let Some(v) = &request.vertical {
                    out = sampling::limit_vertical(&out, v)?;
                }
                if request.composite {
                    out = sampling::composite(&out)?;
                }
                Ok(out)
            })
            .collect()
    }

    async fn read_vertical_section(
        &self,
        request: &RequestContext,
        points: &[SamplePoint],
    ) -> FieldResult<Vec<FieldVolume>> {
        self.record("vsection", &request.url);
        self.entry(request)?
            .iter()
            .map(|f| {
                let limited = match &request.vertical {
                    Some(v) => sampling::limit_vertical(f, v)?,
                    None => f.clone(),
                };
                sampling::vertical_section(&limited, points)
            })
            .collect()
    }

    async fn list_times(&self, url: &str, span: &TimeSpan) -> FieldResult<Vec<DateTime<Utc>>> {
        self.record("times", url);
        let archive = self.check_reachable(url)?;
        Ok(archive.keys().copied().filter(|t| span.contains(t)).collect())
    }
}
