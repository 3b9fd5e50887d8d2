//! Common test fixtures for field-server tests.
//!
//! This module provides pre-defined test data that represents common
//! scenarios in gridded-field serving.

/// Common bounding box definitions for testing, as
/// `(min_lat, min_lon, max_lat, max_lon)`.
pub mod bbox {
    /// Small inner domain around Denver
    pub const INNER: (f64, f64, f64, f64) = (39.0, -106.0, 41.0, -104.0);

    /// Regional domain covering Colorado
    pub const REGIONAL: (f64, f64, f64, f64) = (37.0, -109.0, 41.0, -102.0);

    /// Continental United States
    pub const CONUS: (f64, f64, f64, f64) = (20.0, -130.0, 55.0, -60.0);

    /// A region inside INNER
    pub const DENVER: (f64, f64, f64, f64) = (39.5, -105.5, 40.0, -104.5);

    /// A region inside REGIONAL but outside INNER
    pub const PUEBLO: (f64, f64, f64, f64) = (38.0, -105.0, 38.5, -104.0);

    /// A region outside every configured domain
    pub const EUROPE: (f64, f64, f64, f64) = (35.0, -15.0, 72.0, 45.0);
}

/// Common archive URLs for testing.
pub mod urls {
    pub const INNER: &str = "mdv/inner";
    pub const REGIONAL: &str = "mdv/regional";
    pub const CONUS: &str = "mdv/conus";
    pub const RHI: &str = "mdv/rhi";
    pub const SECONDARY: &str = "mdv/secondary";
}

/// Common times for testing.
pub mod times {
    use chrono::{DateTime, TimeZone, Utc};

    /// Reference time as text
    pub const REFERENCE_TIME: &str = "2024-05-01T12:00:00Z";

    /// Reference time as a value (2024-05-01 12:00:00 UTC)
    pub fn reference_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .single()
            .unwrap_or_default()
    }

    /// Time at `secs` seconds past the unix epoch
    pub fn epoch_secs(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
    }
}

/// Creates a temporary archive root.
///
/// The directory is automatically cleaned up when the returned `TempDir` is dropped.
pub fn temp_archive_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("field_archive_")
        .tempdir()
        .expect("Failed to create temporary archive directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_time_parses() {
        let parsed: chrono::DateTime<chrono::Utc> = times::REFERENCE_TIME.parse().unwrap();
        assert_eq!(parsed, times::reference_time());
    }

    #[test]
    fn test_nested_boxes() {
        let (a, b, c, d) = bbox::DENVER;
        let (e, f, g, h) = bbox::INNER;
        assert!(a >= e && b >= f && c <= g && d <= h);
    }

    #[test]
    fn test_temp_archive_dir() {
        let dir = temp_archive_dir();
        assert!(dir.path().exists());
        assert!(dir.path().to_string_lossy().contains("field_archive_"));
    }
}
