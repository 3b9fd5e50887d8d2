//! Derived-field computation.
//!
//! Each derivation takes the already-fetched base fields (never modified)
//! and builds a new volume, then applies the shared post-step: linear
//! rescale, rename to the derived definition, statistics and output encoding.

use chrono::Duration;
use metrics::counter;
use tracing::debug;

use field_common::{
    FieldError, FieldResult, FieldVolume, OutputFormat, RequestContext, SamplePoint,
    TimeSelector, VlevelType,
};

use crate::derived::{DerivedFieldSpec, DerivedFunction};
use crate::geometry::same_geometry;
use crate::store::GridStore;

/// How the request that fetched the base fields reads data, so secondary
/// reads use the same shape.
#[derive(Debug, Clone, Copy)]
pub enum ReadAction<'p> {
    Volume,
    Vsection(&'p [SamplePoint]),
}

/// Wind direction in degrees, meteorological "from" convention, in [0, 360).
pub fn wind_direction(u: f32, v: f32) -> f32 {
    if u == 0.0 && v == 0.0 {
        return 0.0;
    }
    let dir = (-(u as f64)).atan2(-(v as f64)).to_degrees().rem_euclid(360.0) as f32;
    // Angles just below 360 round up to it in f32.
    if dir >= 360.0 {
        0.0
    } else {
        dir
    }
}

pub fn wind_speed(u: f32, v: f32) -> f32 {
    (u as f64).hypot(v as f64) as f32
}

/// Apply `op` cell by cell. The output takes `a`'s header, including its
/// missing value; a cell missing in either input is missing in the output.
fn combine(
    derived: &str,
    a: &FieldVolume,
    b: &FieldVolume,
    op: impl Fn(f32, f32) -> f32,
) -> FieldResult<FieldVolume> {
    if !same_geometry(&a.header, &b.header) {
        return Err(FieldError::GeometryMismatch {
            derived: derived.to_string(),
            field1: a.name().to_string(),
            field2: b.name().to_string(),
        });
    }

    let missing = a.header.missing_value;
    let data = a
        .data()
        .iter()
        .zip(b.data())
        .map(|(&x, &y)| {
            if a.is_missing(x) || b.is_missing(y) {
                missing
            } else {
                op(x, y)
            }
        })
        .collect();
    a.with_data(data)
}

/// Base field `name`, or a MissingBaseField error naming it.
fn base_field<'b>(
    spec: &DerivedFieldSpec,
    base: &'b [FieldVolume],
    name: &str,
) -> FieldResult<&'b FieldVolume> {
    base.iter()
        .find(|f| f.name() == name)
        .ok_or_else(|| FieldError::MissingBaseField {
            derived: spec.name.clone(),
            missing: vec![name.to_string()],
        })
}

/// Two base fields, reporting every one that is absent.
fn base_pair<'b>(
    spec: &DerivedFieldSpec,
    base: &'b [FieldVolume],
    first: &str,
    second: &str,
) -> FieldResult<(&'b FieldVolume, &'b FieldVolume)> {
    let a = base.iter().find(|f| f.name() == first);
    let b = base.iter().find(|f| f.name() == second);
    match (a, b) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => {
            let missing = [(first, a.is_none()), (second, b.is_none())]
                .iter()
                .filter(|(_, absent)| *absent)
                .map(|(n, _)| n.to_string())
                .collect();
            Err(FieldError::MissingBaseField {
                derived: spec.name.clone(),
                missing,
            })
        }
    }
}

/// Computes derived fields against one store.
pub struct FieldDeriver<'s, S: GridStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: GridStore + ?Sized> FieldDeriver<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Derive `spec` from `base`, the fields read for `request`.
    ///
    /// `request` must already point at the source the base fields came from.
    pub async fn derive(
        &self,
        spec: &DerivedFieldSpec,
        base: &[FieldVolume],
        request: &RequestContext,
        action: ReadAction<'_>,
    ) -> FieldResult<FieldVolume> {
        let input = base_field(spec, base, spec.function.field1())?;
        let raw = self.compute(spec, base, request, action).await?;
        let out = self.finish(spec, raw, input, &request.output)?;

        counter!("derived_fields_total", "function" => spec.function.kind().as_str())
            .increment(1);
        debug!(
            derived = %spec.name,
            function = %spec.function.kind(),
            url = %request.url,
            valid = out.valid_count(),
            "Computed derived field"
        );
        Ok(out)
    }

    async fn compute(
        &self,
        spec: &DerivedFieldSpec,
        base: &[FieldVolume],
        request: &RequestContext,
        action: ReadAction<'_>,
    ) -> FieldResult<FieldVolume> {
        match &spec.function {
            DerivedFunction::Linear { field } => Ok(base_field(spec, base, field)?.clone()),

            DerivedFunction::SpeedFromUV { u, v } => {
                let (u, v) = base_pair(spec, base, u, v)?;
                combine(&spec.name, u, v, wind_speed)
            }

            DerivedFunction::DirnFromUV { u, v } => {
                let (u, v) = base_pair(spec, base, u, v)?;
                combine(&spec.name, u, v, wind_direction)
            }

            DerivedFunction::DiffFieldsSameFile { field1, field2 } => {
                let (a, b) = base_pair(spec, base, field1, field2)?;
                combine(&spec.name, a, b, |x, y| x - y)
            }

            DerivedFunction::DiffFields {
                field1,
                field2,
                secondary_url,
            } => {
                let a = base_field(spec, base, field1)?;
                let secondary = request
                    .with_url(secondary_url.as_str())
                    .with_fields(&[field2.as_str()]);
                let b = self.read_one(spec, &secondary, field2, action).await?;
                combine(&spec.name, a, &b, |x, y| x - y)
            }

            DerivedFunction::DiffInTime {
                field,
                time_offset_secs,
            } => {
                if let TimeSelector::Path { path } = &request.time {
                    return Err(FieldError::UnsupportedTimeSearchMode {
                        derived: spec.name.clone(),
                        path: path.clone(),
                    });
                }
                let a = base_field(spec, base, field)?;
                let offset = Duration::seconds(*time_offset_secs);
                // Latest searches have no reference time; offset from the data time.
                let time = request.time.shifted(offset).unwrap_or(TimeSelector::Exact {
                    time: a.header.time + offset,
                });
                let earlier = request.with_time(time).with_fields(&[field.as_str()]);
                let b = self.read_one(spec, &earlier, field, action).await?;
                combine(&spec.name, a, &b, |x, y| x - y)
            }

            DerivedFunction::VertComposite { field, limits } => match action {
                ReadAction::Vsection(_) => Ok(base_field(spec, base, field)?.clone()),
                ReadAction::Volume => {
                    let composite_request = request
                        .with_fields(&[field.as_str()])
                        .with_vertical(*limits)
                        .with_composite(true);
                    let collapsed = self
                        .read_one(spec, &composite_request, field, ReadAction::Volume)
                        .await?;
                    let mut header = collapsed.header.clone();
                    header.vlevel_type = VlevelType::Composite;
                    header.nz = 1;
                    header.minz = 0.0;
                    header.vlevels = vec![0.0];
                    collapsed.with_header(header)
                }
            },
        }
    }

    /// Secondary read of a single field; failures name the derived field,
    /// the URL and the time searched.
    async fn read_one(
        &self,
        spec: &DerivedFieldSpec,
        request: &RequestContext,
        field: &str,
        action: ReadAction<'_>,
    ) -> FieldResult<FieldVolume> {
        let result = match action {
            ReadAction::Volume => self.store.read_volume(request).await,
            ReadAction::Vsection(points) => self.store.read_vertical_section(request, points).await,
        };
        let failure = |message: String| FieldError::SecondaryReadFailure {
            derived: spec.name.clone(),
            field: field.to_string(),
            url: request.url.clone(),
            time: request.time.describe(),
            message,
        };

        result
            .map_err(|e| failure(e.to_string()))?
            .into_iter()
            .find(|f| f.name() == field)
            .ok_or_else(|| failure("field not returned".to_string()))
    }

    /// Shared post-step: rescale, rename, recompute stats and pick the output
    /// encoding (ASIS follows `input`).
    fn finish(
        &self,
        spec: &DerivedFieldSpec,
        raw: FieldVolume,
        input: &FieldVolume,
        output: &OutputFormat,
    ) -> FieldResult<FieldVolume> {
        let (mut header, data) = raw.rescaled(spec.multiplier, spec.constant).into_parts();
        header.name = spec.name.clone();
        header.long_name = spec.long_name.clone();
        header.units = spec.units.clone();
        header.transform = spec.transform.clone();

        let out = FieldVolume::new(header, data)?.with_stats();
        Ok(self.store.convert_encoding(&out, &output.resolved_for(input)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wind_speed() {
        assert_eq!(wind_speed(3.0, 4.0), 5.0);
        assert_eq!(wind_speed(-3.0, -4.0), 5.0);
        assert_eq!(wind_speed(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_wind_direction_from_convention() {
        assert_eq!(wind_direction(0.0, 0.0), 0.0);
        assert!((wind_direction(-1.0, 0.0) - 90.0).abs() < 1e-4);
        assert!((wind_direction(0.0, -1.0) - 0.0).abs() < 1e-4);
        assert!((wind_direction(1.0, 0.0) - 270.0).abs() < 1e-4);
        assert!((wind_direction(0.0, 1.0) - 180.0).abs() < 1e-4);
    }

    #[test]
    fn test_wind_direction_range() {
        for u in -5..=5 {
            for v in -5..=5 {
                let d = wind_direction(u as f32 * 0.7, v as f32 * 1.3);
                assert!((0.0..360.0).contains(&d), "u={} v={} gave {}", u, v, d);
            }
        }
    }

    #[test]
    fn test_wind_direction_near_north_stays_below_360() {
        let d = wind_direction(1.0e-7, -1.0);
        assert!((0.0..360.0).contains(&d), "gave {}", d);
        assert_eq!(d, 0.0);
    }
}
