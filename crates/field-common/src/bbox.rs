//! Lat/lon bounding box types and operations.

use serde::{Deserialize, Serialize};

/// A geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLonBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl LatLonBox {
    /// Create a new box from corner coordinates.
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    /// A degenerate box around a single point.
    pub fn point(lat: f64, lon: f64) -> Self {
        Self::new(lat, lon, lat, lon)
    }

    /// Parse a "minlat,minlon,maxlat,maxlon" string.
    pub fn from_str_list(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let mut values = [0.0_f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| BboxParseError::InvalidNumber(part.to_string()))?;
        }

        Ok(Self::new(values[0], values[1], values[2], values[3]))
    }

    /// Copy of this box with longitudes offset by `degrees`.
    pub fn lon_shifted(&self, degrees: f64) -> Self {
        Self {
            min_lon: self.min_lon + degrees,
            max_lon: self.max_lon + degrees,
            ..*self
        }
    }

    /// True when `other` lies entirely inside this box (edges inclusive).
    pub fn contains_box(&self, other: &LatLonBox) -> bool {
        other.min_lat >= self.min_lat
            && other.min_lon >= self.min_lon
            && other.max_lat <= self.max_lat
            && other.max_lon <= self.max_lon
    }

    /// Check if a point is contained within this box.
    pub fn contains_point(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    /// Area in square degrees, used to order domains by extent.
    pub fn area(&self) -> f64 {
        (self.max_lat - self.min_lat).max(0.0) * (self.max_lon - self.min_lon).max(0.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid box format: {0}. Expected 'minlat,minlon,maxlat,maxlon'")]
    InvalidFormat(String),

    #[error("Invalid number in box: {0}")]
    InvalidNumber(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_box() {
        let b = LatLonBox::from_str_list("24.0, -125.0, 50.0, -66.0").unwrap();
        assert_eq!(b.min_lat, 24.0);
        assert_eq!(b.min_lon, -125.0);
        assert_eq!(b.max_lat, 50.0);
        assert_eq!(b.max_lon, -66.0);

        assert!(LatLonBox::from_str_list("1,2,3").is_err());
        assert!(LatLonBox::from_str_list("1,2,x,4").is_err());
    }

    #[test]
    fn test_contains_box_inclusive() {
        let outer = LatLonBox::new(30.0, -110.0, 45.0, -90.0);
        assert!(outer.contains_box(&LatLonBox::new(30.0, -110.0, 45.0, -90.0)));
        assert!(outer.contains_box(&LatLonBox::new(35.0, -100.0, 40.0, -95.0)));
        assert!(!outer.contains_box(&LatLonBox::new(29.9, -100.0, 40.0, -95.0)));
    }

    #[test]
    fn test_lon_shifted() {
        let b = LatLonBox::new(10.0, 250.0, 20.0, 260.0).lon_shifted(-360.0);
        assert_eq!(b.min_lon, -110.0);
        assert_eq!(b.max_lon, -100.0);
        assert_eq!(b.min_lat, 10.0);
    }
}
