//! Derived-field specifications.
//!
//! Configuration arrives as flat records ([`DerivedFieldConfig`]); each is
//! converted into a [`DerivedFieldSpec`] whose [`DerivedFunction`] variant
//! carries exactly the inputs that function needs, so a spec missing e.g. its
//! secondary URL is rejected at load time rather than at derive time.

use serde::{Deserialize, Serialize};

use field_common::{FieldError, FieldResult, VerticalLimits};

/// Derivation function names as they appear in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunctionKind {
    Linear,
    #[serde(rename = "SPEED_FROM_U_V")]
    SpeedFromUV,
    #[serde(rename = "DIRN_FROM_U_V")]
    DirnFromUV,
    DiffFieldsSameFile,
    DiffFields,
    DiffInTime,
    VertComposite,
}

impl FunctionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "LINEAR",
            Self::SpeedFromUV => "SPEED_FROM_U_V",
            Self::DirnFromUV => "DIRN_FROM_U_V",
            Self::DiffFieldsSameFile => "DIFF_FIELDS_SAME_FILE",
            Self::DiffFields => "DIFF_FIELDS",
            Self::DiffInTime => "DIFF_IN_TIME",
            Self::VertComposite => "VERT_COMPOSITE",
        }
    }
}

impl std::fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One derived field as written in the server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedFieldConfig {
    pub name: String,
    #[serde(default)]
    pub long_name: String,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub transform: String,
    pub function: FunctionKind,
    #[serde(default)]
    pub field_name1: String,
    #[serde(default)]
    pub field_name2: String,
    #[serde(default)]
    pub secondary_url: String,
    /// Seconds added to the search time for DIFF_IN_TIME.
    #[serde(default)]
    pub time_offset_secs: i64,
    #[serde(default)]
    pub vlevel_min: f64,
    #[serde(default)]
    pub vlevel_max: f64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default)]
    pub constant: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

/// A derivation function with its required inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum DerivedFunction {
    /// Copy `field`; the shared post-step applies the scale and offset.
    Linear { field: String },
    SpeedFromUV { u: String, v: String },
    DirnFromUV { u: String, v: String },
    /// `field1 - field2`, both from the base read.
    DiffFieldsSameFile { field1: String, field2: String },
    /// `field1 - field2`, with `field2` read from `secondary_url`.
    DiffFields {
        field1: String,
        field2: String,
        secondary_url: String,
    },
    /// `field(t) - field(t + time_offset_secs)`.
    DiffInTime { field: String, time_offset_secs: i64 },
    /// Column maximum of `field`, optionally over a level range.
    VertComposite {
        field: String,
        limits: Option<VerticalLimits>,
    },
}

impl DerivedFunction {
    pub fn kind(&self) -> FunctionKind {
        match self {
            Self::Linear { .. } => FunctionKind::Linear,
            Self::SpeedFromUV { .. } => FunctionKind::SpeedFromUV,
            Self::DirnFromUV { .. } => FunctionKind::DirnFromUV,
            Self::DiffFieldsSameFile { .. } => FunctionKind::DiffFieldsSameFile,
            Self::DiffFields { .. } => FunctionKind::DiffFields,
            Self::DiffInTime { .. } => FunctionKind::DiffInTime,
            Self::VertComposite { .. } => FunctionKind::VertComposite,
        }
    }

    /// The primary input field.
    pub fn field1(&self) -> &str {
        match self {
            Self::Linear { field }
            | Self::DiffInTime { field, .. }
            | Self::VertComposite { field, .. } => field,
            Self::SpeedFromUV { u, .. } | Self::DirnFromUV { u, .. } => u,
            Self::DiffFieldsSameFile { field1, .. } | Self::DiffFields { field1, .. } => field1,
        }
    }

    /// Base fields this function needs from the request's own base read.
    ///
    /// DIFF_FIELDS reads its second field from another source and
    /// DIFF_IN_TIME from another time, so only their first field counts.
    pub fn base_fields(&self) -> Vec<&str> {
        match self {
            Self::SpeedFromUV { u, v } | Self::DirnFromUV { u, v } => vec![u.as_str(), v.as_str()],
            Self::DiffFieldsSameFile { field1, field2 } => vec![field1.as_str(), field2.as_str()],
            _ => vec![self.field1()],
        }
    }
}

/// A validated derived-field specification.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFieldSpec {
    pub name: String,
    pub long_name: String,
    pub units: String,
    pub transform: String,
    pub function: DerivedFunction,
    pub multiplier: f64,
    pub constant: f64,
}

impl DerivedFieldSpec {
    pub fn new(name: impl Into<String>, function: DerivedFunction) -> Self {
        let name = name.into();
        Self {
            long_name: name.clone(),
            name,
            units: String::new(),
            transform: String::new(),
            function,
            multiplier: 1.0,
            constant: 0.0,
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    pub fn with_linear(mut self, multiplier: f64, constant: f64) -> Self {
        self.multiplier = multiplier;
        self.constant = constant;
        self
    }
}

fn require(name: &str, what: &str, value: &str) -> FieldResult<String> {
    if value.trim().is_empty() {
        return Err(FieldError::InvalidConfig(format!(
            "derived field '{}' needs {}",
            name, what
        )));
    }
    Ok(value.to_string())
}

impl TryFrom<DerivedFieldConfig> for DerivedFieldSpec {
    type Error = FieldError;

    fn try_from(cfg: DerivedFieldConfig) -> FieldResult<Self> {
        let name = require("<unnamed>", "a name", &cfg.name)?;
        let f1 = || require(&name, "field_name1", &cfg.field_name1);
        let f2 = || require(&name, "field_name2", &cfg.field_name2);

        let function = match cfg.function {
            FunctionKind::Linear => DerivedFunction::Linear { field: f1()? },
            FunctionKind::SpeedFromUV => DerivedFunction::SpeedFromUV { u: f1()?, v: f2()? },
            FunctionKind::DirnFromUV => DerivedFunction::DirnFromUV { u: f1()?, v: f2()? },
            FunctionKind::DiffFieldsSameFile => DerivedFunction::DiffFieldsSameFile {
                field1: f1()?,
                field2: f2()?,
            },
            FunctionKind::DiffFields => DerivedFunction::DiffFields {
                field1: f1()?,
                field2: f2()?,
                secondary_url: require(&name, "secondary_url", &cfg.secondary_url)?,
            },
            FunctionKind::DiffInTime => {
                if cfg.time_offset_secs == 0 {
                    return Err(FieldError::InvalidConfig(format!(
                        "derived field '{}' needs a non-zero time_offset_secs",
                        name
                    )));
                }
                DerivedFunction::DiffInTime {
                    field: f1()?,
                    time_offset_secs: cfg.time_offset_secs,
                }
            }
            FunctionKind::VertComposite => {
                let bounded = cfg.vlevel_min <= cfg.vlevel_max
                    && !(cfg.vlevel_min == 0.0 && cfg.vlevel_max == 0.0);
                DerivedFunction::VertComposite {
                    field: f1()?,
                    limits: bounded.then(|| VerticalLimits::new(cfg.vlevel_min, cfg.vlevel_max)),
                }
            }
        };

        Ok(Self {
            long_name: if cfg.long_name.is_empty() {
                name.clone()
            } else {
                cfg.long_name
            },
            name,
            units: cfg.units,
            transform: cfg.transform,
            function,
            multiplier: cfg.multiplier,
            constant: cfg.constant,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(function: FunctionKind) -> DerivedFieldConfig {
        DerivedFieldConfig {
            name: "DERIVED".into(),
            long_name: String::new(),
            units: String::new(),
            transform: String::new(),
            function,
            field_name1: "A".into(),
            field_name2: "B".into(),
            secondary_url: String::new(),
            time_offset_secs: 0,
            vlevel_min: 0.0,
            vlevel_max: 0.0,
            multiplier: 1.0,
            constant: 0.0,
        }
    }

    #[test]
    fn test_base_fields_per_function() {
        let speed = DerivedFunction::SpeedFromUV {
            u: "U".into(),
            v: "V".into(),
        };
        assert_eq!(speed.base_fields(), vec!["U", "V"]);

        let diff = DerivedFunction::DiffFields {
            field1: "A".into(),
            field2: "B".into(),
            secondary_url: "/other".into(),
        };
        assert_eq!(diff.base_fields(), vec!["A"]);

        let comp = DerivedFunction::VertComposite {
            field: "DBZ".into(),
            limits: None,
        };
        assert_eq!(comp.base_fields(), vec!["DBZ"]);
    }

    #[test]
    fn test_diff_fields_requires_secondary_url() {
        let err = DerivedFieldSpec::try_from(config(FunctionKind::DiffFields)).unwrap_err();
        assert!(err.to_string().contains("secondary_url"));

        let mut cfg = config(FunctionKind::DiffFields);
        cfg.secondary_url = "/data/other".into();
        let spec = DerivedFieldSpec::try_from(cfg).unwrap();
        assert_eq!(spec.function.kind(), FunctionKind::DiffFields);
        assert_eq!(spec.long_name, "DERIVED");
    }

    #[test]
    fn test_speed_requires_both_components() {
        let mut cfg = config(FunctionKind::SpeedFromUV);
        cfg.field_name2.clear();
        assert!(DerivedFieldSpec::try_from(cfg).is_err());
    }

    #[test]
    fn test_diff_in_time_requires_offset() {
        assert!(DerivedFieldSpec::try_from(config(FunctionKind::DiffInTime)).is_err());
        let mut cfg = config(FunctionKind::DiffInTime);
        cfg.time_offset_secs = -3600;
        let spec = DerivedFieldSpec::try_from(cfg).unwrap();
        assert_eq!(
            spec.function,
            DerivedFunction::DiffInTime {
                field: "A".into(),
                time_offset_secs: -3600
            }
        );
    }

    #[test]
    fn test_composite_limits() {
        let spec = DerivedFieldSpec::try_from(config(FunctionKind::VertComposite)).unwrap();
        assert!(matches!(
            spec.function,
            DerivedFunction::VertComposite { limits: None, .. }
        ));

        let mut cfg = config(FunctionKind::VertComposite);
        cfg.vlevel_min = 1.0;
        cfg.vlevel_max = 5.0;
        let spec = DerivedFieldSpec::try_from(cfg).unwrap();
        assert!(matches!(
            spec.function,
            DerivedFunction::VertComposite {
                limits: Some(VerticalLimits { min, max }),
                ..
            } if min == 1.0 && max == 5.0
        ));
    }

    #[test]
    fn test_function_names_parse() {
        let yaml = "SPEED_FROM_U_V";
        let kind: FunctionKind = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(kind, FunctionKind::SpeedFromUV);
        let kind: FunctionKind = serde_yaml::from_str("DIFF_FIELDS_SAME_FILE").unwrap();
        assert_eq!(kind, FunctionKind::DiffFieldsSameFile);
    }
}
