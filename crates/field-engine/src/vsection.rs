//! Vertical-section path geometry: resampling a waypoint polyline at fixed
//! spacing.

use field_common::{SamplePoint, Waypoint};

use crate::geo;

/// Total great-circle length of a waypoint path, km.
pub fn path_length_km(waypoints: &[Waypoint]) -> f64 {
    waypoints
        .windows(2)
        .map(|w| geo::distance_km(w[0].lat, w[0].lon, w[1].lat, w[1].lon))
        .sum()
}

/// Resample `waypoints` into evenly spaced points about `spacing_km` apart.
///
/// The first and last waypoints are always included. A single waypoint (or a
/// zero-length path) yields one point, which is how point profiles are read.
pub fn compute_sample_points(waypoints: &[Waypoint], spacing_km: f64) -> Vec<SamplePoint> {
    let Some(first) = waypoints.first() else {
        return Vec::new();
    };

    let total = path_length_km(waypoints);
    if waypoints.len() == 1 || total <= 0.0 {
        return vec![SamplePoint {
            lat: first.lat,
            lon: first.lon,
            segment: 0,
            distance_km: 0.0,
        }];
    }

    let spacing = if spacing_km > 0.0 { spacing_km } else { total };
    let n_points = ((total / spacing).round() as usize).max(1) + 1;
    let step = total / (n_points - 1) as f64;

    let seg_lengths: Vec<f64> = waypoints
        .windows(2)
        .map(|w| geo::distance_km(w[0].lat, w[0].lon, w[1].lat, w[1].lon))
        .collect();

    let mut points = Vec::with_capacity(n_points);
    let mut segment = 0;
    let mut seg_start = 0.0;

    for k in 0..n_points {
        let s = if k == n_points - 1 { total } else { k as f64 * step };

        while segment + 1 < seg_lengths.len() && s > seg_start + seg_lengths[segment] {
            seg_start += seg_lengths[segment];
            segment += 1;
        }

        let a = waypoints[segment];
        let b = waypoints[segment + 1];
        let along = (s - seg_start).clamp(0.0, seg_lengths[segment]);
        let (lat, lon) = if along <= 0.0 {
            (a.lat, a.lon)
        } else {
            let az = geo::bearing_deg(a.lat, a.lon, b.lat, b.lon);
            geo::destination(a.lat, a.lon, along, az)
        };

        points.push(SamplePoint {
            lat,
            lon,
            segment,
            distance_km: s,
        });
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::assert_approx_eq;

    #[test]
    fn test_empty_and_single() {
        assert!(compute_sample_points(&[], 1.0).is_empty());
        let pts = compute_sample_points(&[Waypoint::new(40.0, -105.0)], 1.0);
        assert_eq!(pts.len(), 1);
        assert_eq!(pts[0].lat, 40.0);
    }

    #[test]
    fn test_even_spacing_single_segment() {
        let wps = [Waypoint::new(40.0, -105.0), Waypoint::new(41.0, -105.0)];
        let total = path_length_km(&wps);
        let pts = compute_sample_points(&wps, 10.0);

        assert_eq!(pts.len(), (total / 10.0).round() as usize + 1);
        assert_approx_eq!(pts[0].lat, 40.0, 1e-9);
        assert_approx_eq!(pts.last().unwrap().lat, 41.0, 1e-6);
        let step = pts[1].distance_km - pts[0].distance_km;
        assert_approx_eq!(step, total / (pts.len() - 1) as f64, 1e-9);
    }

    #[test]
    fn test_multi_segment_tracks_segment_index() {
        let wps = [
            Waypoint::new(40.0, -105.0),
            Waypoint::new(40.5, -105.0),
            Waypoint::new(40.5, -104.0),
        ];
        let pts = compute_sample_points(&wps, 5.0);
        assert_eq!(pts.first().unwrap().segment, 0);
        assert_eq!(pts.last().unwrap().segment, 1);
        assert_approx_eq!(pts.last().unwrap().lon, -104.0, 1e-6);
    }
}
