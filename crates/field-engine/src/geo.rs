//! Great-circle helpers on a spherical earth.

/// Mean earth radius in km.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Normalize an angle into [0, 360).
pub fn normalize_deg(deg: f64) -> f64 {
    let d = deg % 360.0;
    if d < 0.0 {
        d + 360.0
    } else {
        d
    }
}

/// Absolute difference between two azimuths, wrapped into [0, 180].
pub fn azimuth_diff(a: f64, b: f64) -> f64 {
    let d = normalize_deg(a - b);
    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}

/// Great-circle distance in km (haversine).
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Initial bearing from point 1 to point 2, degrees clockwise from north in
/// [0, 360).
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let y = dlambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlambda.cos();
    normalize_deg(y.atan2(x).to_degrees())
}

/// Point reached travelling `range_km` from (lat, lon) along `azimuth_deg`.
pub fn destination(lat: f64, lon: f64, range_km: f64, azimuth_deg: f64) -> (f64, f64) {
    let delta = range_km / EARTH_RADIUS_KM;
    let theta = azimuth_deg.to_radians();
    let phi1 = lat.to_radians();
    let lambda1 = lon.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    let mut lon2 = lambda2.to_degrees();
    if lon2 > 180.0 {
        lon2 -= 360.0;
    } else if lon2 < -180.0 {
        lon2 += 360.0;
    }
    (phi2.to_degrees(), lon2)
}

/// Great-circle midpoint of two points.
pub fn midpoint(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> (f64, f64) {
    let half = distance_km(lat1, lon1, lat2, lon2) / 2.0;
    let az = bearing_deg(lat1, lon1, lat2, lon2);
    destination(lat1, lon1, half, az)
}

/// Flat-earth (x, y) km offsets of a point from a projection origin.
pub fn latlon_to_xy_km(origin_lat: f64, origin_lon: f64, lat: f64, lon: f64) -> (f64, f64) {
    let range = distance_km(origin_lat, origin_lon, lat, lon);
    let az = bearing_deg(origin_lat, origin_lon, lat, lon).to_radians();
    (range * az.sin(), range * az.cos())
}
