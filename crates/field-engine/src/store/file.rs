//! File-backed grid store.
//!
//! Layout: `<root>/<url>/<YYYYMMDD_HHMMSS>.json`, each entry holding the
//! JSON-serialized list of field volumes valid at that time. Path-based
//! requests name an entry relative to `<root>`.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use field_common::time::{parse_storage_stamp, storage_stamp};
use field_common::{
    FieldError, FieldHeader, FieldResult, FieldVolume, RequestContext, SamplePoint, TimeSelector,
    TimeSpan,
};

use super::sampling;
use super::GridStore;

const ENTRY_EXTENSION: &str = "json";

/// A [`GridStore`] over a directory tree of JSON entries.
#[derive(Debug, Clone)]
pub struct FileGridStore {
    root: PathBuf,
}

impl FileGridStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `relative` under the root. Paths that climb out of the root are
    /// rejected.
    fn under_root(&self, relative: &str) -> FieldResult<PathBuf> {
        let relative = Path::new(relative.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(FieldError::invalid_request(format!(
                "'{}' is not a path inside the archive root",
                relative.display()
            )));
        }
        Ok(self.root.join(relative))
    }

    fn source_dir(&self, url: &str) -> FieldResult<PathBuf> {
        self.under_root(url)
    }

    /// Path of the entry for `url` at `time`.
    pub fn entry_path(&self, url: &str, time: DateTime<Utc>) -> FieldResult<PathBuf> {
        Ok(self
            .source_dir(url)?
            .join(format!("{}.{}", storage_stamp(&time), ENTRY_EXTENSION)))
    }

    /// Write `fields` as the entry for `url` at `time`, replacing any
    /// existing entry.
    pub async fn write_entry(
        &self,
        url: &str,
        time: DateTime<Utc>,
        fields: &[FieldVolume],
    ) -> FieldResult<PathBuf> {
        let path = self.entry_path(url, time)?;
        let dir = self.source_dir(url)?;
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            FieldError::InternalError(format!("cannot create {}: {}", dir.display(), e))
        })?;

        let bytes = serde_json::to_vec(fields)
            .map_err(|e| FieldError::InternalError(format!("cannot serialize entry: {}", e)))?;
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            FieldError::InternalError(format!("cannot write {}: {}", path.display(), e))
        })?;

        debug!(path = %path.display(), fields = fields.len(), "Wrote archive entry");
        Ok(path)
    }

    /// All entry times at `url`, ascending.
    async fn available_times(&self, url: &str) -> FieldResult<Vec<DateTime<Utc>>> {
        let dir = self.source_dir(url)?;
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                FieldError::source_unavailable(url, format!("no archive at {}", dir.display()))
            }
            _ => FieldError::source_unavailable(url, e.to_string()),
        })?;

        let mut times = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FieldError::source_unavailable(url, e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            if let Some(t) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(parse_storage_stamp)
            {
                times.push(t);
            }
        }
        times.sort();
        Ok(times)
    }

    /// Entry file selected by the request's URL and time search.
    async fn resolve_entry(&self, request: &RequestContext) -> FieldResult<PathBuf> {
        if let TimeSelector::Path { path } = &request.time {
            return self.under_root(path);
        }

        let times = self.available_times(&request.url).await?;
        let time = request.time.select(&times).ok_or_else(|| {
            FieldError::not_found(format!(
                "no data at {} for {}",
                request.url,
                request.time.describe()
            ))
        })?;
        self.entry_path(&request.url, time)
    }

    async fn load_entry(&self, path: &Path) -> FieldResult<Vec<FieldVolume>> {
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => FieldError::not_found(format!("no entry {}", path.display())),
            _ => FieldError::read_failed(format!("{}: {}", path.display(), e)),
        })?;
        let stored: Vec<FieldVolume> = serde_json::from_slice(&bytes)
            .map_err(|e| FieldError::read_failed(format!("{}: {}", path.display(), e)))?;

        // Deserialization bypasses the sample-count check.
        stored
            .into_iter()
            .map(|v| {
                let (header, data) = v.into_parts();
                FieldVolume::new(header, data)
            })
            .collect()
    }

    /// Requested fields from an entry, in request order. An empty request
    /// list selects every field.
    async fn read_fields(&self, request: &RequestContext) -> FieldResult<Vec<FieldVolume>> {
        let path = self.resolve_entry(request).await?;
        let entry = self.load_entry(&path).await?;
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
                        FieldError::not_found(format!(
                            "field '{}' not in {}",
                            name,
                            path.display()
                        ))
                    })
            })
            .collect()
    }
}

#[async_trait]
impl GridStore for FileGridStore {
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn read_all_headers(&self, request: &RequestContext) -> FieldResult<Vec<FieldHeader>> {
        let path = self.resolve_entry(request).await?;
        let entry = self.load_entry(&path).await?;
        Ok(entry.into_iter().map(|f| f.into_parts().0).collect())
    }

    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn read_volume(&self, request: &RequestContext) -> FieldResult<Vec<FieldVolume>> {
        let fields = self.read_fields(request).await?;
        fields
            .iter()
            .map(|field| {
                let mut out = match &request.limits {
                    Some(limits) => sampling::crop_to_box(field, limits)?,
                    None => field.clone(),
                };
                if let Some(vertical) = &request.vertical {
                    out = sampling::limit_vertical(&out, vertical)?;
                }
                if request.composite {
                    out = sampling::composite(&out)?;
                }
                Ok(out)
            })
            .collect()
    }

    #[instrument(skip(self, request, points), fields(url = %request.url, points = points.len()))]
    async fn read_vertical_section(
        &self,
        request: &RequestContext,
        points: &[SamplePoint],
    ) -> FieldResult<Vec<FieldVolume>> {
        let fields = self.read_fields(request).await?;
        fields
            .iter()
            .map(|field| {
                let limited = match &request.vertical {
                    Some(vertical) => sampling::limit_vertical(field, vertical)?,
                    None => field.clone(),
                };
                sampling::vertical_section(&limited, points)
            })
            .collect()
    }

    async fn list_times(&self, url: &str, span: &TimeSpan) -> FieldResult<Vec<DateTime<Utc>>> {
        let times = self.available_times(url).await?;
        Ok(times.into_iter().filter(|t| span.contains(t)).collect())
    }
}
