//! Field volumes: a header plus its dense sample array.

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, FieldResult};
use crate::header::FieldHeader;

/// A header plus `nx*ny*nz` samples, row-major with z slowest.
///
/// Volumes are values: transforms return new volumes and never touch the
/// input, so one fetched base field can feed several derivations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldVolume {
    pub header: FieldHeader,
    data: Vec<f32>,
}

impl FieldVolume {
    /// Build a volume, checking the sample count against the header.
    pub fn new(header: FieldHeader, data: Vec<f32>) -> FieldResult<Self> {
        let expected = header.n_points();
        if data.len() != expected {
            return Err(FieldError::SampleCountMismatch {
                field: header.name.clone(),
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { header, data })
    }

    /// Volume on `header` with every sample set to the header's missing value.
    pub fn filled_missing(header: FieldHeader) -> Self {
        let data = vec![header.missing_value; header.n_points()];
        Self { header, data }
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_parts(self) -> (FieldHeader, Vec<f32>) {
        (self.header, self.data)
    }

    pub fn is_missing(&self, v: f32) -> bool {
        self.header.is_missing(v)
    }

    /// Sample at (x, y, z), if in range.
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<f32> {
        let h = &self.header;
        if x >= h.nx || y >= h.ny || z >= h.nz {
            return None;
        }
        self.data.get(h.index(x, y, z)).copied()
    }

    /// New volume with the same header and replacement samples.
    pub fn with_data(&self, data: Vec<f32>) -> FieldResult<Self> {
        Self::new(self.header.clone(), data)
    }

    /// New volume with `header` and this volume's samples, re-validating the
    /// sample count against the rewritten dimensions.
    pub fn with_header(&self, header: FieldHeader) -> FieldResult<Self> {
        Self::new(header, self.data.clone())
    }

    /// Apply `v * multiplier + constant` to every non-missing sample.
    pub fn rescaled(&self, multiplier: f64, constant: f64) -> Self {
        let data = self
            .data
            .iter()
            .map(|&v| {
                if self.is_missing(v) {
                    v
                } else {
                    (v as f64 * multiplier + constant) as f32
                }
            })
            .collect();
        Self {
            header: self.header.clone(),
            data,
        }
    }

    /// Min/max over non-missing samples.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|v| !self.is_missing(*v))
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Copy of this volume with min/max statistics recomputed.
    pub fn with_stats(mut self) -> Self {
        let (lo, hi) = self.value_range().unwrap_or((0.0, 0.0));
        self.header.min_value = lo;
        self.header.max_value = hi;
        self
    }

    /// Number of non-missing samples.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !self.is_missing(**v)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{ProjectionParams, ProjectionType};
    use chrono::{TimeZone, Utc};

    fn header(nx: usize, ny: usize, nz: usize) -> FieldHeader {
        FieldHeader {
            name: "T".into(),
            long_name: "temperature".into(),
            units: "C".into(),
            transform: String::new(),
            nx,
            ny,
            nz,
            dx: 1.0,
            dy: 1.0,
            dz: 1.0,
            minx: 0.0,
            miny: 0.0,
            minz: 0.0,
            proj_type: ProjectionType::Latlon,
            proj: ProjectionParams::default(),
            vlevel_type: Default::default(),
            vlevels: vec![],
            missing_value: -9999.0,
            bad_value: -9998.0,
            encoding: Default::default(),
            compression: Default::default(),
            scaling: Default::default(),
            scale: 1.0,
            bias: 0.0,
            min_value: 0.0,
            max_value: 0.0,
            time: Utc.timestamp_opt(0, 0).unwrap(),
        }
    }

    #[test]
    fn test_sample_count_checked() {
        assert!(FieldVolume::new(header(2, 2, 1), vec![0.0; 4]).is_ok());
        let err = FieldVolume::new(header(2, 2, 2), vec![0.0; 4]).unwrap_err();
        assert!(matches!(
            err,
            FieldError::SampleCountMismatch {
                expected: 8,
                actual: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_with_header_revalidates() {
        let vol = FieldVolume::new(header(2, 2, 2), vec![1.0; 8]).unwrap();
        let mut flat = vol.header.clone();
        flat.nz = 1;
        assert!(vol.with_header(flat).is_err());
    }

    #[test]
    fn test_rescaled_skips_missing() {
        let vol = FieldVolume::new(header(3, 1, 1), vec![1.0, -9999.0, -9998.0]).unwrap();
        let out = vol.rescaled(2.0, 1.0);
        assert_eq!(out.data(), &[3.0, -9999.0, -9998.0]);
        // input untouched
        assert_eq!(vol.data()[0], 1.0);
    }

    #[test]
    fn test_stats() {
        let vol = FieldVolume::new(header(4, 1, 1), vec![5.0, -9999.0, -2.0, 3.0]).unwrap();
        let vol = vol.with_stats();
        assert_eq!(vol.header.min_value, -2.0);
        assert_eq!(vol.header.max_value, 5.0);
        assert_eq!(vol.valid_count(), 3);
    }
}
