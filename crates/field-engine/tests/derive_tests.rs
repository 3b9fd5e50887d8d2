//! Derived-field computation against a scripted store.

mod common;

use chrono::Duration;

use common::MemoryStore;
use field_common::time::storage_stamp;
use field_common::{
    Encoding, FieldError, OutputFormat, RequestContext, TimeSelector, VerticalLimits, VlevelType,
};
use field_engine::{DerivedFieldSpec, DerivedFunction, FieldDeriver, ReadAction};
use test_utils::fields::{constant_volume, flat_header, volume, MISSING};
use test_utils::times::reference_time;
use test_utils::urls::{INNER, SECONDARY};
use test_utils::{assert_approx_eq, assert_samples_approx_eq, create_test_grid, with_missing};

fn exact_request(fields: &[&str]) -> RequestContext {
    RequestContext::volume(
        INNER,
        fields,
        TimeSelector::Exact {
            time: reference_time(),
        },
    )
}

fn speed_spec() -> DerivedFieldSpec {
    DerivedFieldSpec::new(
        "SPEED",
        DerivedFunction::SpeedFromUV {
            u: "U".into(),
            v: "V".into(),
        },
    )
    .with_units("m/s")
}

#[tokio::test]
async fn test_speed_from_components() {
    let store = MemoryStore::new();
    let base = vec![
        constant_volume("U", 2, 2, 1, 3.0),
        constant_volume("V", 2, 2, 1, 4.0),
    ];

    let out = FieldDeriver::new(&store)
        .derive(&speed_spec(), &base, &exact_request(&["SPEED"]), ReadAction::Volume)
        .await
        .unwrap();

    assert_eq!(out.name(), "SPEED");
    assert_eq!(out.header.units, "m/s");
    assert!(out.data().iter().all(|&v| v == 5.0));
    assert_eq!(out.header.min_value, 5.0);
    assert_eq!(out.header.max_value, 5.0);
    assert!(store.calls().is_empty(), "same-file derivations read nothing");
}

#[tokio::test]
async fn test_missing_in_either_input_stays_missing() {
    let store = MemoryStore::new();
    let u = volume(
        flat_header("U", 2, 2, 1),
        with_missing(vec![3.0; 4], &[1], MISSING),
    );
    let v = volume(
        flat_header("V", 2, 2, 1),
        with_missing(vec![4.0; 4], &[2], MISSING),
    );

    let out = FieldDeriver::new(&store)
        .derive(&speed_spec(), &[u, v], &exact_request(&["SPEED"]), ReadAction::Volume)
        .await
        .unwrap();

    assert_eq!(out.data(), &[5.0, MISSING, MISSING, 5.0]);
    assert_eq!(out.valid_count(), 2);
}

#[tokio::test]
async fn test_direction_uses_from_convention() {
    let store = MemoryStore::new();
    let spec = DerivedFieldSpec::new(
        "DIR",
        DerivedFunction::DirnFromUV {
            u: "U".into(),
            v: "V".into(),
        },
    );
    let u = volume(flat_header("U", 2, 1, 1), vec![0.0, -1.0]);
    let v = volume(flat_header("V", 2, 1, 1), vec![0.0, 0.0]);

    let out = FieldDeriver::new(&store)
        .derive(&spec, &[u, v], &exact_request(&["DIR"]), ReadAction::Volume)
        .await
        .unwrap();

    assert_approx_eq!(out.data()[0], 0.0, 1e-4);
    assert_approx_eq!(out.data()[1], 90.0, 1e-4);
}

#[tokio::test]
async fn test_speed_rejects_mismatched_geometry() {
    let store = MemoryStore::new();
    let base = vec![
        constant_volume("U", 2, 2, 1, 3.0),
        constant_volume("V", 3, 3, 1, 4.0),
    ];

    let err = FieldDeriver::new(&store)
        .derive(&speed_spec(), &base, &exact_request(&["SPEED"]), ReadAction::Volume)
        .await
        .unwrap_err();

    match err {
        FieldError::GeometryMismatch {
            derived,
            field1,
            field2,
        } => {
            assert_eq!(derived, "SPEED");
            assert_eq!(field1, "U");
            assert_eq!(field2, "V");
        }
        other => panic!("expected geometry mismatch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_base_field_is_named() {
    let store = MemoryStore::new();
    let base = vec![constant_volume("U", 2, 2, 1, 3.0)];

    let err = FieldDeriver::new(&store)
        .derive(&speed_spec(), &base, &exact_request(&["SPEED"]), ReadAction::Volume)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FieldError::MissingBaseField { ref missing, .. } if missing == &vec!["V".to_string()]
    ));
}

#[tokio::test]
async fn test_linear_round_trip() {
    let store = MemoryStore::new();
    let celsius = volume(flat_header("T", 3, 1, 1), vec![-40.0, 0.0, 37.5]);
    let to_f = DerivedFieldSpec::new("T_F", DerivedFunction::Linear { field: "T".into() })
        .with_linear(1.8, 32.0);
    let to_c = DerivedFieldSpec::new("T_C", DerivedFunction::Linear { field: "T_F".into() })
        .with_linear(1.0 / 1.8, -32.0 / 1.8);
    let deriver = FieldDeriver::new(&store);
    let request = exact_request(&["T_F"]);

    let fahrenheit = deriver
        .derive(&to_f, &[celsius.clone()], &request, ReadAction::Volume)
        .await
        .unwrap();
    assert_samples_approx_eq!(fahrenheit.data(), &[-40.0_f32, 32.0, 99.5], 1e-4);

    let back = deriver
        .derive(&to_c, &[fahrenheit], &request, ReadAction::Volume)
        .await
        .unwrap();
    assert_samples_approx_eq!(back.data(), celsius.data(), 1e-4);
}

#[tokio::test]
async fn test_diff_fields_reads_secondary_source() {
    let store = MemoryStore::new().with_entry(
        SECONDARY,
        reference_time(),
        vec![constant_volume("DBZ", 2, 2, 1, 10.0)],
    );
    let spec = DerivedFieldSpec::new(
        "DBZ_DIFF",
        DerivedFunction::DiffFields {
            field1: "DBZ".into(),
            field2: "DBZ".into(),
            secondary_url: SECONDARY.into(),
        },
    );
    let base = vec![constant_volume("DBZ", 2, 2, 1, 30.0)];

    let out = FieldDeriver::new(&store)
        .derive(&spec, &base, &exact_request(&["DBZ_DIFF"]), ReadAction::Volume)
        .await
        .unwrap();

    assert!(out.data().iter().all(|&v| v == 20.0));
    assert_eq!(store.calls(), vec![format!("volume {}", SECONDARY)]);
}

#[tokio::test]
async fn test_diff_fields_secondary_failure_names_source() {
    let store = MemoryStore::new().with_unreachable(SECONDARY);
    let spec = DerivedFieldSpec::new(
        "DBZ_DIFF",
        DerivedFunction::DiffFields {
            field1: "DBZ".into(),
            field2: "DBZ".into(),
            secondary_url: SECONDARY.into(),
        },
    );
    let base = vec![constant_volume("DBZ", 2, 2, 1, 30.0)];

    let err = FieldDeriver::new(&store)
        .derive(&spec, &base, &exact_request(&["DBZ_DIFF"]), ReadAction::Volume)
        .await
        .unwrap_err();

    match err {
        FieldError::SecondaryReadFailure {
            derived, url, field, ..
        } => {
            assert_eq!(derived, "DBZ_DIFF");
            assert_eq!(url, SECONDARY);
            assert_eq!(field, "DBZ");
        }
        other => panic!("expected secondary read failure, got {:?}", other),
    }
}

fn tendency_spec() -> DerivedFieldSpec {
    DerivedFieldSpec::new(
        "DBZ_TREND",
        DerivedFunction::DiffInTime {
            field: "DBZ".into(),
            time_offset_secs: -600,
        },
    )
}

#[tokio::test]
async fn test_diff_in_time_reads_earlier_entry() {
    let earlier = reference_time() - Duration::seconds(600);
    let store = MemoryStore::new()
        .with_entry(INNER, reference_time(), vec![constant_volume("DBZ", 2, 2, 1, 30.0)])
        .with_entry(INNER, earlier, vec![constant_volume("DBZ", 2, 2, 1, 25.0)]);
    let base = vec![constant_volume("DBZ", 2, 2, 1, 30.0)];

    let out = FieldDeriver::new(&store)
        .derive(&tendency_spec(), &base, &exact_request(&["DBZ_TREND"]), ReadAction::Volume)
        .await
        .unwrap();

    assert!(out.data().iter().all(|&v| v == 5.0));
}

#[tokio::test]
async fn test_diff_in_time_with_latest_offsets_from_data_time() {
    let earlier = reference_time() - Duration::seconds(600);
    let store = MemoryStore::new()
        .with_entry(INNER, earlier, vec![constant_volume("DBZ", 2, 2, 1, 28.0)]);
    let base = vec![constant_volume("DBZ", 2, 2, 1, 30.0)];
    let request = exact_request(&["DBZ_TREND"]).with_time(TimeSelector::Latest);

    let out = FieldDeriver::new(&store)
        .derive(&tendency_spec(), &base, &request, ReadAction::Volume)
        .await
        .unwrap();

    assert!(out.data().iter().all(|&v| v == 2.0));
}

#[tokio::test]
async fn test_diff_in_time_rejects_path_requests() {
    let store = MemoryStore::new();
    let base = vec![constant_volume("DBZ", 2, 2, 1, 30.0)];
    let path = format!("{}/{}", INNER, storage_stamp(&reference_time()));
    let request = exact_request(&["DBZ_TREND"]).with_time(TimeSelector::Path { path: path.clone() });

    let err = FieldDeriver::new(&store)
        .derive(&tendency_spec(), &base, &request, ReadAction::Volume)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FieldError::UnsupportedTimeSearchMode { ref derived, path: ref p }
            if derived == "DBZ_TREND" && p == &path
    ));
    assert!(store.calls().is_empty());
}

fn composite_spec(limits: Option<VerticalLimits>) -> DerivedFieldSpec {
    DerivedFieldSpec::new(
        "DBZ_MAX",
        DerivedFunction::VertComposite {
            field: "DBZ".into(),
            limits,
        },
    )
}

#[tokio::test]
async fn test_vert_composite_relabels_single_level() {
    let grid = create_test_grid(2, 2, 3);
    let dbz = volume(flat_header("DBZ", 2, 2, 3), grid.clone());
    let store = MemoryStore::new().with_entry(INNER, reference_time(), vec![dbz.clone()]);
    let spec = composite_spec(Some(VerticalLimits::new(0.0, 1.0)));

    let out = FieldDeriver::new(&store)
        .derive(&spec, &[dbz], &exact_request(&["DBZ_MAX"]), ReadAction::Volume)
        .await
        .unwrap();

    assert_eq!(out.header.nz, 1);
    assert_eq!(out.header.vlevels, vec![0.0]);
    assert_eq!(out.header.vlevel_type, VlevelType::Composite);
    // Levels 0..=1 only; the grid increases with height.
    assert_eq!(out.data(), &grid[4..8]);
}

#[tokio::test]
async fn test_vert_composite_in_section_passes_through() {
    let store = MemoryStore::new();
    let dbz = volume(flat_header("DBZ", 4, 1, 3), create_test_grid(4, 1, 3));

    let out = FieldDeriver::new(&store)
        .derive(
            &composite_spec(None),
            &[dbz.clone()],
            &exact_request(&["DBZ_MAX"]),
            ReadAction::Vsection(&[]),
        )
        .await
        .unwrap();

    assert_eq!(out.name(), "DBZ_MAX");
    assert_eq!(out.header.nz, 3);
    assert_eq!(out.data(), dbz.data());
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_identity_linear_reproduces_packed_input() {
    let store = MemoryStore::new();
    let mut header = flat_header("DBZ", 21, 1, 1);
    header.encoding = Encoding::Int8;
    header.scale = 0.5;
    let dbz = volume(header, (0..21).map(|i| i as f32 * 0.5).collect());
    let copy = DerivedFieldSpec::new("DBZ_COPY", DerivedFunction::Linear { field: "DBZ".into() })
        .with_linear(1.0, 0.0);

    let out = FieldDeriver::new(&store)
        .derive(&copy, &[dbz.clone()], &exact_request(&["DBZ_COPY"]), ReadAction::Volume)
        .await
        .unwrap();

    assert_eq!(out.data(), dbz.data());
    assert_eq!(out.header.encoding, Encoding::Int8);
    assert_eq!(out.header.scale, 0.5);
    assert_eq!(out.header.bias, 0.0);
}

#[tokio::test]
async fn test_asis_output_follows_input_encoding() {
    let store = MemoryStore::new();
    let mut header = flat_header("T", 2, 1, 1);
    header.encoding = Encoding::Int16;
    let t = volume(header, vec![1.0, 2.0]);
    let spec = DerivedFieldSpec::new("T2", DerivedFunction::Linear { field: "T".into() })
        .with_linear(2.0, 0.0);

    let asis = FieldDeriver::new(&store)
        .derive(&spec, &[t.clone()], &exact_request(&["T2"]), ReadAction::Volume)
        .await
        .unwrap();
    assert_eq!(asis.header.encoding, Encoding::Int16);

    let mut request = exact_request(&["T2"]);
    request.output = OutputFormat {
        encoding: Encoding::Float32,
        ..OutputFormat::float32()
    };
    let float = FieldDeriver::new(&store)
        .derive(&spec, &[t], &request, ReadAction::Volume)
        .await
        .unwrap();
    assert_eq!(float.header.encoding, Encoding::Float32);
    assert_eq!(float.data(), &[2.0, 4.0]);
}
