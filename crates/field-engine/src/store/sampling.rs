//! Grid subsetting used by the file-backed store: horizontal crops,
//! vertical limits, column-max composites and nearest-neighbour sampling
//! along a vertical-section path.

use field_common::{
    FieldError, FieldHeader, FieldResult, FieldVolume, LatLonBox, ProjectionType, SamplePoint, VerticalLimits,
    VlevelType,
};

use crate::geo;

/// Fractional grid position (x, y) of a lat/lon point, if the projection
/// supports it.
fn grid_position(field: &FieldVolume, lat: f64, lon: f64) -> Option<(f64, f64)> {
    let h = &field.header;
    match h.proj_type {
        ProjectionType::Latlon => {
            let y = (lat - h.miny) / h.dy;
            // Archive longitudes may use either 0..360 or -180..180.
            [0.0, 360.0, -360.0].iter().find_map(|shift| {
                let x = (lon + shift - h.minx) / h.dx;
                (x >= -0.5 && x <= h.nx as f64 - 0.5).then_some((x, y))
            })
        }
        ProjectionType::Flat | ProjectionType::Lambert | ProjectionType::PolarStereo => {
            let (xkm, ykm) = geo::latlon_to_xy_km(h.proj.origin_lat, h.proj.origin_lon, lat, lon);
            Some(((xkm - h.minx) / h.dx, (ykm - h.miny) / h.dy))
        }
        _ => None,
    }
}

/// Nearest grid cell to a lat/lon point.
fn nearest_cell(field: &FieldVolume, lat: f64, lon: f64) -> Option<(usize, usize)> {
    let (x, y) = grid_position(field, lat, lon)?;
    let (ix, iy) = (x.round(), y.round());
    let h = &field.header;
    if ix < 0.0 || iy < 0.0 || ix >= h.nx as f64 || iy >= h.ny as f64 {
        return None;
    }
    Some((ix as usize, iy as usize))
}

/// Fractional x/y extent `(min_x, max_x, min_y, max_y)` of `limits` on a
/// lat/lon grid, in whichever longitude framing overlaps the grid. Corners
/// off the grid are left unclamped.
fn latlon_extent(h: &FieldHeader, limits: &LatLonBox) -> (f64, f64, f64, f64) {
    let y0 = (limits.min_lat - h.miny) / h.dy;
    let y1 = (limits.max_lat - h.miny) / h.dy;
    let xs = |shift: f64| {
        (
            (limits.min_lon + shift - h.minx) / h.dx,
            (limits.max_lon + shift - h.minx) / h.dx,
        )
    };
    let (x0, x1) = [0.0, 360.0, -360.0]
        .iter()
        .map(|shift| xs(*shift))
        .find(|(a, b)| a.max(*b) >= -0.5 && a.min(*b) <= h.nx as f64 - 0.5)
        .unwrap_or_else(|| xs(0.0));
    (x0.min(x1), x0.max(x1), y0.min(y1), y0.max(y1))
}

/// Fractional grid extent of `limits` from its corners, for projections
/// with a lat/lon mapping.
fn projected_extent(field: &FieldVolume, limits: &LatLonBox) -> Option<(f64, f64, f64, f64)> {
    let corners = [
        (limits.min_lat, limits.min_lon),
        (limits.min_lat, limits.max_lon),
        (limits.max_lat, limits.min_lon),
        (limits.max_lat, limits.max_lon),
    ];
    let positions: Option<Vec<(f64, f64)>> = corners
        .iter()
        .map(|(lat, lon)| grid_position(field, *lat, *lon))
        .collect();
    let positions = positions?;
    Some((
        positions.iter().map(|p| p.0).fold(f64::INFINITY, f64::min),
        positions.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max),
        positions.iter().map(|p| p.1).fold(f64::INFINITY, f64::min),
        positions.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max),
    ))
}

/// Crop `field` to the grid cells inside `limits`.
///
/// A box that only partly overlaps the grid is clamped to the grid edges.
/// Projections without a lat/lon mapping are returned whole.
pub fn crop_to_box(field: &FieldVolume, limits: &LatLonBox) -> FieldResult<FieldVolume> {
    let h = &field.header;
    let extent = match h.proj_type {
        ProjectionType::Latlon => Some(latlon_extent(h, limits)),
        _ => projected_extent(field, limits),
    };
    let Some((min_x, max_x, min_y, max_y)) = extent else {
        return Ok(field.clone());
    };

    let lo_x = min_x.ceil().max(0.0);
    let hi_x = max_x.floor().min(h.nx as f64 - 1.0);
    let lo_y = min_y.ceil().max(0.0);
    let hi_y = max_y.floor().min(h.ny as f64 - 1.0);

    if hi_x < lo_x || hi_y < lo_y {
        return Err(FieldError::not_found(format!(
            "field '{}' has no grid points inside [{}, {}, {}, {}]",
            h.name, limits.min_lat, limits.min_lon, limits.max_lat, limits.max_lon
        )));
    }

    let (x0, x1, y0, y1) = (lo_x as usize, hi_x as usize, lo_y as usize, hi_y as usize);
    let mut header = h.clone();
    header.nx = x1 - x0 + 1;
    header.ny = y1 - y0 + 1;
    header.minx = h.minx + x0 as f64 * h.dx;
    header.miny = h.miny + y0 as f64 * h.dy;

    let mut data = Vec::with_capacity(header.n_points());
    for z in 0..h.nz {
        for y in y0..=y1 {
            let row = h.index(x0, y, z);
            data.extend_from_slice(&field.data()[row..=row + (x1 - x0)]);
        }
    }
    FieldVolume::new(header, data)
}

/// Keep only the levels inside `limits`.
pub fn limit_vertical(field: &FieldVolume, limits: &VerticalLimits) -> FieldResult<FieldVolume> {
    let h = &field.header;
    let keep: Vec<usize> = (0..h.nz).filter(|z| limits.contains(h.level(*z))).collect();
    if keep.is_empty() {
        return Err(FieldError::not_found(format!(
            "field '{}' has no levels within [{}, {}]",
            h.name, limits.min, limits.max
        )));
    }
    if keep.len() == h.nz {
        return Ok(field.clone());
    }

    let plane = h.plane_size();
    let mut header = h.clone();
    header.nz = keep.len();
    header.vlevels = keep.iter().map(|z| h.level(*z)).collect();
    header.minz = header.vlevels[0];

    let mut data = Vec::with_capacity(plane * keep.len());
    for z in &keep {
        data.extend_from_slice(&field.data()[z * plane..(z + 1) * plane]);
    }
    FieldVolume::new(header, data)
}

/// Column maximum over all levels. Columns with no valid sample stay missing.
pub fn composite(field: &FieldVolume) -> FieldResult<FieldVolume> {
    let h = &field.header;
    let plane = h.plane_size();
    let mut data = vec![h.missing_value; plane];

    for z in 0..h.nz {
        let level = &field.data()[z * plane..(z + 1) * plane];
        for (out, &v) in data.iter_mut().zip(level) {
            if field.is_missing(v) {
                continue;
            }
            if h.is_missing(*out) || v > *out {
                *out = v;
            }
        }
    }

    let mut header = h.clone();
    header.nz = 1;
    header.minz = 0.0;
    header.vlevels = vec![0.0];
    header.vlevel_type = VlevelType::Composite;
    FieldVolume::new(header, data)
}

/// Sample `field` along `points`, one column per point. Points off the grid
/// are filled with the missing value.
pub fn vertical_section(field: &FieldVolume, points: &[SamplePoint]) -> FieldResult<FieldVolume> {
    let h = &field.header;
    if points.is_empty() {
        return Err(FieldError::invalid_request(
            "vertical section needs at least one sample point",
        ));
    }

    let n = points.len();
    let mut data = vec![h.missing_value; n * h.nz];
    for (i, p) in points.iter().enumerate() {
        let Some((x, y)) = nearest_cell(field, p.lat, p.lon) else {
            continue;
        };
        for z in 0..h.nz {
            data[z * n + i] = field.data()[h.index(x, y, z)];
        }
    }

    let mut header = h.clone();
    header.nx = n;
    header.ny = 1;
    header.minx = 0.0;
    header.miny = 0.0;
    header.dx = if n > 1 {
        points[n - 1].distance_km / (n - 1) as f64
    } else {
        0.0
    };
    header.dy = 1.0;
    header.proj_type = ProjectionType::Vsection;
    header.proj.origin_lat = points[0].lat;
    header.proj.origin_lon = points[0].lon;
    FieldVolume::new(header, data)
}
