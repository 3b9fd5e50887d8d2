//! Grid geometry comparison.

use field_common::FieldHeader;

/// Absolute tolerance for origin, spacing and projection parameters, in grid
/// units or degrees.
pub const GEOMETRY_TOLERANCE: f64 = 1.0e-4;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= GEOMETRY_TOLERANCE
}

/// True when two fields sit on the same grid: identical dimensions and
/// projection type, and origin/spacing/projection parameters equal within
/// [`GEOMETRY_TOLERANCE`].
pub fn same_geometry(a: &FieldHeader, b: &FieldHeader) -> bool {
    a.nx == b.nx
        && a.ny == b.ny
        && a.nz == b.nz
        && a.proj_type == b.proj_type
        && close(a.minx, b.minx)
        && close(a.miny, b.miny)
        && close(a.minz, b.minz)
        && close(a.dx, b.dx)
        && close(a.dy, b.dy)
        && close(a.dz, b.dz)
        && close(a.proj.origin_lat, b.proj.origin_lat)
        && close(a.proj.origin_lon, b.proj.origin_lon)
        && close(a.proj.rotation, b.proj.rotation)
}
