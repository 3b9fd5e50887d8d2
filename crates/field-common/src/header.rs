//! Field header: the semantic grid metadata of one field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Map projection / grid type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionType {
    /// x = longitude, y = latitude, degrees.
    Latlon,
    /// Flat earth, x/y in km from the projection origin.
    Flat,
    Lambert,
    PolarStereo,
    Mercator,
    /// Measured radar RHI: x = range (km), z = azimuth (deg), vlevels = azimuths.
    RhiRadar,
    /// Cross-section sampled along a waypoint path: x = sample index.
    Vsection,
    /// Assembled time-height profile: x = time (unix seconds).
    TimeHeight,
}

impl ProjectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latlon => "latlon",
            Self::Flat => "flat",
            Self::Lambert => "lambert",
            Self::PolarStereo => "polar_stereo",
            Self::Mercator => "mercator",
            Self::RhiRadar => "rhi_radar",
            Self::Vsection => "vsection",
            Self::TimeHeight => "time_height",
        }
    }
}

impl std::fmt::Display for ProjectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Projection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectionParams {
    pub origin_lat: f64,
    pub origin_lon: f64,
    #[serde(default)]
    pub rotation: f64,
}

/// Vertical level type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VlevelType {
    /// Height above mean sea level, km.
    #[default]
    Z,
    Pressure,
    /// Radar elevation angle, degrees.
    Elevation,
    /// Radar azimuth angle, degrees (RHI scans).
    Azimuth,
    Surface,
    /// Column maximum collapsed to one level.
    Composite,
}

/// Sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// Keep whatever the input field uses.
    Asis,
    Int8,
    Int16,
    #[default]
    Float32,
}

/// Sample compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    /// Keep whatever the input field uses.
    Asis,
    #[default]
    None,
    Zlib,
    Gzip,
    Bzip,
}

/// Scaling used when packing floats into integer encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scaling {
    /// Derive scale and bias from the data range.
    #[default]
    Dynamic,
    /// Dynamic, with the scale rounded to a "nice" value.
    Rounded,
    /// Use the requested scale and bias.
    Specified,
}

/// Semantic grid metadata for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldHeader {
    pub name: String,
    #[serde(default)]
    pub long_name: String,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub transform: String,

    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub minx: f64,
    pub miny: f64,
    pub minz: f64,

    pub proj_type: ProjectionType,
    #[serde(default)]
    pub proj: ProjectionParams,

    #[serde(default)]
    pub vlevel_type: VlevelType,
    /// One value per z level.
    #[serde(default)]
    pub vlevels: Vec<f64>,

    pub missing_value: f32,
    pub bad_value: f32,

    #[serde(default)]
    pub encoding: Encoding,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default)]
    pub scaling: Scaling,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub bias: f64,

    #[serde(default)]
    pub min_value: f32,
    #[serde(default)]
    pub max_value: f32,

    pub time: DateTime<Utc>,
}

fn default_scale() -> f64 {
    1.0
}

impl FieldHeader {
    /// Total number of samples described by the header.
    pub fn n_points(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// Samples per horizontal plane.
    pub fn plane_size(&self) -> usize {
        self.nx * self.ny
    }

    /// Flat index for (x, y, z), z slowest.
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        z * self.plane_size() + y * self.nx + x
    }

    /// x coordinate of the last column.
    pub fn max_x(&self) -> f64 {
        self.minx + self.nx.saturating_sub(1) as f64 * self.dx
    }

    /// y coordinate of the last row.
    pub fn max_y(&self) -> f64 {
        self.miny + self.ny.saturating_sub(1) as f64 * self.dy
    }

    /// Level value for z index, from the vlevel list or the regular spacing.
    pub fn level(&self, z: usize) -> f64 {
        self.vlevels
            .get(z)
            .copied()
            .unwrap_or(self.minz + z as f64 * self.dz)
    }

    /// True if `v` is this field's missing or bad sentinel.
    pub fn is_missing(&self, v: f32) -> bool {
        v == self.missing_value || v == self.bad_value || v.is_nan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn header() -> FieldHeader {
        FieldHeader {
            name: "DBZ".into(),
            long_name: String::new(),
            units: "dBZ".into(),
            transform: String::new(),
            nx: 4,
            ny: 3,
            nz: 2,
            dx: 1.0,
            dy: 1.0,
            dz: 0.5,
            minx: -2.0,
            miny: 0.0,
            minz: 1.0,
            proj_type: ProjectionType::Flat,
            proj: ProjectionParams::default(),
            vlevel_type: VlevelType::Z,
            vlevels: vec![],
            missing_value: -999.0,
            bad_value: -998.0,
            encoding: Encoding::Int8,
            compression: Compression::Zlib,
            scaling: Scaling::Dynamic,
            scale: 1.0,
            bias: 0.0,
            min_value: 0.0,
            max_value: 0.0,
            time: Utc.timestamp_opt(0, 0).unwrap(),
        }
    }

    #[test]
    fn test_indexing() {
        let h = header();
        assert_eq!(h.n_points(), 24);
        assert_eq!(h.index(0, 0, 1), 12);
        assert_eq!(h.index(3, 2, 0), 11);
        assert_eq!(h.max_x(), 1.0);
    }

    #[test]
    fn test_level_fallback() {
        let mut h = header();
        assert_eq!(h.level(1), 1.5);
        h.vlevels = vec![0.5, 2.0];
        assert_eq!(h.level(1), 2.0);
    }

    #[test]
    fn test_is_missing() {
        let h = header();
        assert!(h.is_missing(-999.0));
        assert!(h.is_missing(-998.0));
        assert!(h.is_missing(f32::NAN));
        assert!(!h.is_missing(0.0));
    }
}
