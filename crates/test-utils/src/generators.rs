//! Test data generators for creating synthetic gridded fields.
//!
//! These generators create predictable, verifiable sample arrays in the
//! row-major, z-slowest layout used by `FieldVolume`.

/// Creates a test volume with predictable values.
///
/// Each cell value is calculated as: `z * 100000 + col * 1000 + row`
///
/// This makes it easy to verify that cropping, compositing and sampling
/// picked the right cells.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5, 2);
/// assert_eq!(grid.len(), 100);
/// assert_eq!(grid[1], 1000.0);   // col=1, row=0, z=0
/// assert_eq!(grid[10], 1.0);     // col=0, row=1, z=0
/// assert_eq!(grid[50], 100000.0); // col=0, row=0, z=1
/// ```
pub fn create_test_grid(nx: usize, ny: usize, nz: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(nx * ny * nz);
    for z in 0..nz {
        for row in 0..ny {
            for col in 0..nx {
                data.push((z * 100_000 + col * 1000 + row) as f32);
            }
        }
    }
    data
}

/// Creates a U-component wind volume (west-east component).
///
/// U varies by row, simulating a jet, and strengthens 2 m/s per level.
pub fn create_u_wind_grid(nx: usize, ny: usize, nz: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(nx * ny * nz);
    for z in 0..nz {
        for row in 0..ny {
            for _col in 0..nx {
                let lat_factor = (row as f32 / ny.max(1) as f32 - 0.5) * 2.0; // -1 to 1
                data.push(lat_factor * 20.0 + z as f32 * 2.0);
            }
        }
    }
    data
}

/// Creates a V-component wind volume (south-north component).
///
/// V varies by column and is constant with height.
pub fn create_v_wind_grid(nx: usize, ny: usize, nz: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(nx * ny * nz);
    for _z in 0..nz {
        for _row in 0..ny {
            for col in 0..nx {
                let lon_factor = (col as f32 / nx.max(1) as f32 - 0.5) * 2.0; // -1 to 1
                data.push(lon_factor * 15.0);
            }
        }
    }
    data
}

/// Creates a reflectivity-like volume that decreases with height.
///
/// Values peak at 50 dBZ in the lowest level and lose 5 dBZ per level.
pub fn create_reflectivity_grid(nx: usize, ny: usize, nz: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(nx * ny * nz);
    for z in 0..nz {
        for row in 0..ny {
            for col in 0..nx {
                let base = 50.0 - z as f32 * 5.0;
                let ripple = ((col + row) % 3) as f32;
                data.push(base - ripple);
            }
        }
    }
    data
}

/// Creates a volume with all values set to a constant.
pub fn create_constant_grid(nx: usize, ny: usize, nz: usize, value: f32) -> Vec<f32> {
    vec![value; nx * ny * nz]
}

/// Replaces the samples at the given flat indices with `missing`.
pub fn with_missing(mut data: Vec<f32>, indices: &[usize], missing: f32) -> Vec<f32> {
    for &i in indices {
        if let Some(v) = data.get_mut(i) {
            *v = missing;
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_grid() {
        let grid = create_test_grid(10, 5, 1);
        assert_eq!(grid.len(), 50);
        assert_eq!(grid[0], 0.0); // col=0, row=0
        assert_eq!(grid[1], 1000.0); // col=1, row=0
        assert_eq!(grid[10], 1.0); // col=0, row=1
        assert_eq!(grid[11], 1001.0); // col=1, row=1
    }

    #[test]
    fn test_wind_grids_match_shape() {
        let u = create_u_wind_grid(8, 6, 3);
        let v = create_v_wind_grid(8, 6, 3);
        assert_eq!(u.len(), 144);
        assert_eq!(v.len(), 144);
        assert!(u.iter().all(|x| x.abs() <= 24.0));
        assert!(v.iter().all(|x| x.abs() <= 15.0));
    }

    #[test]
    fn test_reflectivity_decreases_with_height() {
        let grid = create_reflectivity_grid(4, 4, 3);
        let plane = 16;
        assert!(grid[0] > grid[plane]);
        assert!(grid[plane] > grid[2 * plane]);
    }

    #[test]
    fn test_with_missing() {
        let grid = with_missing(create_constant_grid(2, 2, 1, 1.0), &[1, 3, 99], -999.0);
        assert_eq!(grid, vec![1.0, -999.0, 1.0, -999.0]);
    }
}
