//! Grid store abstraction.
//!
//! The engine reads archives only through [`GridStore`]; the on-disk format
//! behind it is not the engine's concern.

mod file;
pub mod sampling;

pub use file::FileGridStore;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};

use field_common::{
    convert_encoding, FieldHeader, FieldResult, FieldVolume, OutputFormat, RequestContext,
    SamplePoint, TimeSpan,
};

/// Read access to archives of gridded fields.
#[async_trait]
pub trait GridStore: Send + Sync {
    /// Headers of every field in the entry selected by the request's URL and
    /// time search.
    async fn read_all_headers(&self, request: &RequestContext) -> FieldResult<Vec<FieldHeader>>;

    /// The requested fields, cropped to the request's horizontal and
    /// vertical limits and collapsed when `composite` is set. Returned in
    /// request order.
    async fn read_volume(&self, request: &RequestContext) -> FieldResult<Vec<FieldVolume>>;

    /// The requested fields sampled along `points`: one column per point,
    /// ny = 1. A single point yields a vertical profile.
    async fn read_vertical_section(
        &self,
        request: &RequestContext,
        points: &[SamplePoint],
    ) -> FieldResult<Vec<FieldVolume>>;

    /// Data times available at `url` within `span`, ascending.
    async fn list_times(&self, url: &str, span: &TimeSpan) -> FieldResult<Vec<DateTime<Utc>>>;

    /// Pure encoding transform, no I/O.
    fn convert_encoding(&self, field: &FieldVolume, format: &OutputFormat) -> FieldVolume {
        convert_encoding(field, format)
    }
}

/// Maps a search time to the climatology archive that covers it.
pub trait ClimoFileFinder: Send + Sync {
    fn resolve_path(&self, search_time: DateTime<Utc>) -> String;
}

/// Climatology archives split by calendar month: `<base_url>/<MM>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyClimoFinder {
    base_url: String,
}

impl MonthlyClimoFinder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl ClimoFileFinder for MonthlyClimoFinder {
    fn resolve_path(&self, search_time: DateTime<Utc>) -> String {
        format!(
            "{}/{:02}",
            self.base_url.trim_end_matches('/'),
            search_time.month()
        )
    }
}
