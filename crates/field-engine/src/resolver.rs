//! Base-field resolution: which on-disk fields a request must fetch.

use std::collections::BTreeSet;

use crate::derived::DerivedFieldSpec;

/// Requested names split into on-disk and derived fields, plus the
/// deduplicated set of base fields to read in one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFields<'a> {
    /// Requested names read verbatim from the store.
    pub normal: BTreeSet<String>,
    /// Specs of the requested derived fields, in request order.
    pub derived: Vec<&'a DerivedFieldSpec>,
    /// Everything the base read must return.
    pub base: BTreeSet<String>,
}

impl ResolvedFields<'_> {
    pub fn has_derived(&self) -> bool {
        !self.derived.is_empty()
    }

    /// Base set as a list, for building the batched read.
    pub fn base_list(&self) -> Vec<String> {
        self.base.iter().cloned().collect()
    }
}

/// Partition `requested` and compute the base-field set.
///
/// A name matching a derived spec is treated as derived even if a field of
/// the same name exists on disk.
pub fn resolve<'a, S: AsRef<str>>(
    requested: &[S],
    specs: &'a [DerivedFieldSpec],
) -> ResolvedFields<'a> {
    let mut normal = BTreeSet::new();
    let mut derived: Vec<&DerivedFieldSpec> = Vec::new();

    for name in requested {
        let name = name.as_ref();
        match specs.iter().find(|s| s.name == name) {
            Some(spec) => {
                if !derived.iter().any(|d| d.name == spec.name) {
                    derived.push(spec);
                }
            }
            None => {
                normal.insert(name.to_string());
            }
        }
    }

    let mut base = normal.clone();
    for spec in &derived {
        for field in spec.function.base_fields() {
            base.insert(field.to_string());
        }
    }

    ResolvedFields {
        normal,
        derived,
        base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derived::DerivedFunction;

    fn specs() -> Vec<DerivedFieldSpec> {
        vec![
            DerivedFieldSpec::new(
                "SPEED",
                DerivedFunction::SpeedFromUV {
                    u: "U".into(),
                    v: "V".into(),
                },
            ),
            DerivedFieldSpec::new(
                "DIR",
                DerivedFunction::DirnFromUV {
                    u: "U".into(),
                    v: "V".into(),
                },
            ),
            DerivedFieldSpec::new(
                "DBZ_DIFF",
                DerivedFunction::DiffFields {
                    field1: "DBZ".into(),
                    field2: "DBZ_OTHER".into(),
                    secondary_url: "/data/other".into(),
                },
            ),
            DerivedFieldSpec::new(
                "DBZ_TREND",
                DerivedFunction::DiffInTime {
                    field: "DBZ".into(),
                    time_offset_secs: -600,
                },
            ),
            DerivedFieldSpec::new(
                "COMP",
                DerivedFunction::VertComposite {
                    field: "DBZ".into(),
                    limits: None,
                },
            ),
            DerivedFieldSpec::new(
                "T_F",
                DerivedFunction::Linear { field: "T".into() },
            )
            .with_linear(1.8, 32.0),
            DerivedFieldSpec::new(
                "SHEAR",
                DerivedFunction::DiffFieldsSameFile {
                    field1: "U".into(),
                    field2: "U_LOW".into(),
                },
            ),
            // Shadows an on-disk field of the same name.
            DerivedFieldSpec::new(
                "VEL",
                DerivedFunction::Linear {
                    field: "VEL_RAW".into(),
                },
            ),
        ]
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normal_only() {
        let specs = specs();
        let r = resolve(&["DBZ", "ZDR"], &specs);
        assert_eq!(r.normal, set(&["DBZ", "ZDR"]));
        assert!(!r.has_derived());
        assert_eq!(r.base, set(&["DBZ", "ZDR"]));
    }

    #[test]
    fn test_uv_pairs_dedup() {
        let specs = specs();
        let r = resolve(&["SPEED", "DIR", "U"], &specs);
        assert_eq!(r.derived.len(), 2);
        assert_eq!(r.base, set(&["U", "V"]));
    }

    #[test]
    fn test_field2_excluded_for_remote_and_single_input() {
        let specs = specs();
        let r = resolve(&["DBZ_DIFF", "DBZ_TREND", "COMP", "T_F"], &specs);
        assert_eq!(r.base, set(&["DBZ", "T"]));
        assert!(r.normal.is_empty());
    }

    #[test]
    fn test_same_file_diff_adds_field2() {
        let specs = specs();
        let r = resolve(&["SHEAR"], &specs);
        assert_eq!(r.base, set(&["U", "U_LOW"]));
    }

    #[test]
    fn test_derived_takes_precedence() {
        let specs = specs();
        let r = resolve(&["VEL"], &specs);
        assert!(r.normal.is_empty());
        assert_eq!(r.derived[0].name, "VEL");
        assert_eq!(r.base, set(&["VEL_RAW"]));
    }

    #[test]
    fn test_idempotent_and_closed() {
        let specs = specs();
        let req = ["SPEED", "DBZ_DIFF", "ZDR", "SPEED"];
        let a = resolve(&req, &specs);
        let b = resolve(&req, &specs);
        assert_eq!(a.base, b.base);
        assert_eq!(a.derived.len(), 2);

        let mut allowed: BTreeSet<String> = req.iter().map(|s| s.to_string()).collect();
        for spec in &a.derived {
            for f in spec.function.base_fields() {
                allowed.insert(f.to_string());
            }
        }
        assert!(a.base.is_subset(&allowed));
    }
}
