//! Time-height profile assembly.
//!
//! One single-point profile is read per requested time, in time order, and
//! the profiles are stitched into a time x height grid per field. Any
//! failed read or inconsistent profile fails the whole assembly.

use std::future::Future;

use chrono::{DateTime, Utc};
use tracing::info;

use field_common::time::format_time;
use field_common::{FieldError, FieldResult, FieldVolume, ProjectionType};

/// Missing marker in assembled grids, regardless of the source encoding.
pub const TIME_HEIGHT_MISSING: f32 = -9999.0;

/// Fields returned by one single-point profile read.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRead {
    /// Where the profile came from, for error messages.
    pub path: String,
    pub fields: Vec<FieldVolume>,
}

/// Column values of a profile field (the first column of a section).
fn column(field: &FieldVolume) -> Vec<f32> {
    (0..field.header.nz)
        .map(|z| match field.get(0, 0, z) {
            Some(v) if !field.is_missing(v) => v,
            _ => TIME_HEIGHT_MISSING,
        })
        .collect()
}

/// Read one profile per time via `read_one` and assemble a grid per field.
///
/// `source` names the archive in read-failure errors.
pub async fn assemble<F, Fut>(
    times: &[DateTime<Utc>],
    source: &str,
    mut read_one: F,
) -> FieldResult<Vec<FieldVolume>>
where
    F: FnMut(DateTime<Utc>) -> Fut,
    Fut: Future<Output = FieldResult<ProfileRead>>,
{
    if times.is_empty() {
        return Err(FieldError::not_found(format!(
            "no times to assemble at {}",
            source
        )));
    }

    let mut profiles = Vec::with_capacity(times.len());
    for &time in times {
        let read = read_one(time)
            .await
            .map_err(|e| FieldError::ProfileReadFailure {
                time: format_time(&time),
                path: source.to_string(),
                message: e.to_string(),
            })?;
        profiles.push(read);
    }

    let first = &profiles[0];
    for (index, template) in first.fields.iter().enumerate() {
        let expected = template.header.nz;
        for read in &profiles[1..] {
            let actual = read.fields.get(index).map_or(0, |f| f.header.nz);
            if actual != expected {
                return Err(FieldError::InconsistentProfileShape {
                    path: read.path.clone(),
                    field: template.name().to_string(),
                    expected,
                    actual,
                });
            }
        }
    }

    let n = times.len();
    let t0 = times[0].timestamp() as f64;
    let dx = if n > 1 {
        (times[n - 1].timestamp() as f64 - t0) / (n - 1) as f64
    } else {
        0.0
    };

    let mut grids = Vec::with_capacity(first.fields.len());
    for (index, template) in first.fields.iter().enumerate() {
        let nz = template.header.nz;
        let mut data = vec![TIME_HEIGHT_MISSING; n * nz];
        for (i, read) in profiles.iter().enumerate() {
            for (z, v) in column(&read.fields[index]).into_iter().enumerate() {
                data[z * n + i] = v;
            }
        }

        let mut header = template.header.clone();
        header.nx = n;
        header.ny = 1;
        header.minx = t0;
        header.dx = dx;
        header.miny = 0.0;
        header.dy = 1.0;
        header.proj_type = ProjectionType::TimeHeight;
        header.missing_value = TIME_HEIGHT_MISSING;
        header.bad_value = TIME_HEIGHT_MISSING;
        header.time = times[0];
        grids.push(FieldVolume::new(header, data)?.with_stats());
    }

    info!(
        source = %source,
        times = n,
        fields = grids.len(),
        "Assembled time-height grids"
    );
    Ok(grids)
}
