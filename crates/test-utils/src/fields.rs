//! Field header and volume builders.
//!
//! Headers built here share one geometry unless a test changes it, so two
//! fields from the same builder always pass a geometry comparison.

use chrono::{DateTime, Utc};
use field_common::{
    Compression, Encoding, FieldHeader, FieldVolume, ProjectionParams, ProjectionType, Scaling,
    VlevelType,
};

use crate::fixtures::times::reference_time;

/// Missing-value sentinel used by every test header.
pub const MISSING: f32 = -999.0;

/// Bad-value sentinel used by every test header.
pub const BAD: f32 = -998.0;

/// A flat-projection header centred on (40N, 105W) with 1 km spacing and
/// levels at 0, 1, 2, ... km.
pub fn flat_header(name: &str, nx: usize, ny: usize, nz: usize) -> FieldHeader {
    FieldHeader {
        name: name.to_string(),
        long_name: name.to_string(),
        units: String::new(),
        transform: String::new(),
        nx,
        ny,
        nz,
        dx: 1.0,
        dy: 1.0,
        dz: 1.0,
        minx: -(nx as f64 - 1.0) / 2.0,
        miny: -(ny as f64 - 1.0) / 2.0,
        minz: 0.0,
        proj_type: ProjectionType::Flat,
        proj: ProjectionParams {
            origin_lat: 40.0,
            origin_lon: -105.0,
            rotation: 0.0,
        },
        vlevel_type: VlevelType::Z,
        vlevels: (0..nz).map(|z| z as f64).collect(),
        missing_value: MISSING,
        bad_value: BAD,
        encoding: Encoding::Float32,
        compression: Compression::None,
        scaling: Scaling::Dynamic,
        scale: 1.0,
        bias: 0.0,
        min_value: 0.0,
        max_value: 0.0,
        time: reference_time(),
    }
}

/// A lat/lon header whose grid starts at (`min_lat`, `min_lon`) with `step`
/// degree spacing.
pub fn latlon_header(
    name: &str,
    min_lat: f64,
    min_lon: f64,
    step: f64,
    nx: usize,
    ny: usize,
    nz: usize,
) -> FieldHeader {
    FieldHeader {
        dx: step,
        dy: step,
        minx: min_lon,
        miny: min_lat,
        proj_type: ProjectionType::Latlon,
        proj: ProjectionParams::default(),
        ..flat_header(name, nx, ny, nz)
    }
}

/// Volume on `header`. Panics if `data` does not fit the header.
pub fn volume(header: FieldHeader, data: Vec<f32>) -> FieldVolume {
    FieldVolume::new(header, data).expect("test volume data must match its header")
}

/// Flat volume filled with `value`.
pub fn constant_volume(name: &str, nx: usize, ny: usize, nz: usize, value: f32) -> FieldVolume {
    volume(flat_header(name, nx, ny, nz), vec![value; nx * ny * nz])
}

/// Flat 1x1x1 volume holding one sample.
pub fn single_value(name: &str, value: f32) -> FieldVolume {
    constant_volume(name, 1, 1, 1, value)
}

/// Copy of `field` stamped with `time`.
pub fn at_time(field: &FieldVolume, time: DateTime<Utc>) -> FieldVolume {
    let mut header = field.header.clone();
    header.time = time;
    volume(header, field.data().to_vec())
}

/// Copy of `field` carrying a different name.
pub fn renamed(field: &FieldVolume, name: &str) -> FieldVolume {
    let mut header = field.header.clone();
    header.name = name.to_string();
    header.long_name = name.to_string();
    volume(header, field.data().to_vec())
}

/// A single-column profile volume (1x1xnz) with the given level values.
pub fn profile(name: &str, values: &[f32]) -> FieldVolume {
    volume(flat_header(name, 1, 1, values.len()), values.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_header_is_centred() {
        let h = flat_header("DBZ", 5, 3, 2);
        assert_eq!(h.minx, -2.0);
        assert_eq!(h.max_x(), 2.0);
        assert_eq!(h.miny, -1.0);
        assert_eq!(h.vlevels, vec![0.0, 1.0]);
    }

    #[test]
    fn test_constant_volume() {
        let v = constant_volume("T", 2, 2, 3, 7.0);
        assert_eq!(v.data().len(), 12);
        assert!(v.data().iter().all(|&x| x == 7.0));
    }

    #[test]
    fn test_profile() {
        let p = profile("T", &[1.0, 2.0, 3.0]);
        assert_eq!(p.header.nz, 3);
        assert_eq!(p.get(0, 0, 2), Some(3.0));
    }
}
