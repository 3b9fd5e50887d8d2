//! Output encoding conversion.
//!
//! Samples are always held as `f32`; converting to an integer encoding
//! quantizes them onto the `bias + n * scale` lattice the packed
//! representation can express, and records the packing in the header.

use serde::{Deserialize, Serialize};

use crate::header::{Compression, Encoding, Scaling};
use crate::volume::FieldVolume;

/// Encoding, compression and scaling a client wants its fields delivered in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputFormat {
    #[serde(default = "asis_encoding")]
    pub encoding: Encoding,
    #[serde(default = "asis_compression")]
    pub compression: Compression,
    #[serde(default)]
    pub scaling: Scaling,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub bias: f64,
}

fn asis_encoding() -> Encoding {
    Encoding::Asis
}

fn asis_compression() -> Compression {
    Compression::Asis
}

fn default_scale() -> f64 {
    1.0
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::asis()
    }
}

impl OutputFormat {
    /// Keep every field's own encoding and compression.
    pub fn asis() -> Self {
        Self {
            encoding: Encoding::Asis,
            compression: Compression::Asis,
            scaling: Scaling::Dynamic,
            scale: 1.0,
            bias: 0.0,
        }
    }

    pub fn float32() -> Self {
        Self {
            encoding: Encoding::Float32,
            compression: Compression::None,
            ..Self::asis()
        }
    }

    /// Format to use for a field derived from `input`: ASIS requests take the
    /// input field's encoding and compression, anything else is used as-is.
    pub fn resolved_for(&self, input: &FieldVolume) -> OutputFormat {
        let mut out = *self;
        if self.encoding == Encoding::Asis {
            out.encoding = input.header.encoding;
            out.compression = input.header.compression;
        }
        if out.compression == Compression::Asis {
            out.compression = input.header.compression;
        }
        out
    }
}

/// Number of representable data levels for an integer encoding. The lowest
/// code is reserved for missing data.
fn data_levels(encoding: Encoding) -> Option<f64> {
    match encoding {
        Encoding::Int8 => Some(254.0),
        Encoding::Int16 => Some(65534.0),
        Encoding::Float32 | Encoding::Asis => None,
    }
}

/// Round a positive scale up to 1, 2 or 5 times a power of ten.
fn round_scale(scale: f64) -> f64 {
    if scale <= 0.0 || !scale.is_finite() {
        return 1.0;
    }
    let exp = scale.log10().floor();
    let base = 10f64.powf(exp);
    let mantissa = scale / base;
    let nice = if mantissa <= 1.0 {
        1.0
    } else if mantissa <= 2.0 {
        2.0
    } else if mantissa <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * base
}

/// Whether converting `field` to `format` keeps its existing packing: same
/// encoding, and no scaling the field does not already use. Specified
/// scaling always repacks.
fn keeps_packing(field: &FieldVolume, format: &OutputFormat) -> bool {
    let resolved = format.resolved_for(field);
    if resolved.encoding != field.header.encoding {
        return false;
    }
    match format.scaling {
        Scaling::Specified => false,
        // Dynamic is the ASIS default, not a request to repack.
        scaling => {
            scaling == field.header.scaling
                || (format.encoding == Encoding::Asis && scaling == Scaling::Dynamic)
        }
    }
}

/// Convert a field to the requested encoding, compression and scaling.
///
/// A field already in the requested encoding keeps its samples, scale and
/// bias. Pure: the input is left unchanged.
pub fn convert_encoding(field: &FieldVolume, format: &OutputFormat) -> FieldVolume {
    let resolved = format.resolved_for(field);
    let mut header = field.header.clone();
    header.compression = resolved.compression;
    if keeps_packing(field, format) {
        return match FieldVolume::new(header, field.data().to_vec()) {
            Ok(vol) => vol.with_stats(),
            Err(_) => field.clone(),
        };
    }
    header.encoding = resolved.encoding;
    header.scaling = resolved.scaling;

    let Some(levels) = data_levels(resolved.encoding) else {
        header.scale = 1.0;
        header.bias = 0.0;
        return match FieldVolume::new(header, field.data().to_vec()) {
            Ok(vol) => vol.with_stats(),
            Err(_) => field.clone(),
        };
    };

    let (lo, hi) = field.value_range().unwrap_or((0.0, 0.0));
    let (scale, bias) = match resolved.scaling {
        Scaling::Specified if resolved.scale > 0.0 => (resolved.scale, resolved.bias),
        Scaling::Specified | Scaling::Dynamic => {
            let range = (hi - lo) as f64;
            let scale = if range > 0.0 { range / (levels - 1.0) } else { 1.0 };
            (scale, lo as f64)
        }
        Scaling::Rounded => {
            let range = (hi - lo) as f64;
            let scale = if range > 0.0 {
                round_scale(range / (levels - 1.0))
            } else {
                1.0
            };
            (scale, (lo as f64 / scale).floor() * scale)
        }
    };
    header.scale = scale;
    header.bias = bias;

    let data = field
        .data()
        .iter()
        .map(|&v| {
            if field.is_missing(v) {
                v
            } else {
                let code = ((v as f64 - bias) / scale).round().clamp(0.0, levels - 1.0);
                (bias + code * scale) as f32
            }
        })
        .collect();

    match FieldVolume::new(header, data) {
        Ok(vol) => vol.with_stats(),
        Err(_) => field.clone(),
    }
}
