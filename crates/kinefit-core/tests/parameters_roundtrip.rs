use kinefit_core::{
    GalaxyParameters, ParameterBounds, ParameterMask, ParameterName, PARAMETER_COUNT,
};
use proptest::prelude::*;

fn value_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        4 => -1.0e6..1.0e6f64,
        1 => Just(f64::NAN),
    ]
}

proptest! {
    #[test]
    fn from_slice_reproduces_as_array(values in prop::collection::vec(value_strategy(), PARAMETER_COUNT)) {
        let params = GalaxyParameters::from_slice(&values).unwrap();
        let again = GalaxyParameters::from_slice(&params.as_array()).unwrap();
        prop_assert!(again.bitwise_eq(&params));
        for (name, value) in params.iter() {
            prop_assert_eq!(value.to_bits(), values[name.index()].to_bits());
        }
    }

    #[test]
    fn json_keeps_set_fields_and_nan_for_unset(values in prop::collection::vec(value_strategy(), PARAMETER_COUNT)) {
        let params = GalaxyParameters::from_slice(&values).unwrap();
        let json = serde_json::to_string(&params).unwrap();
        let back: GalaxyParameters = serde_json::from_str(&json).unwrap();
        for name in ParameterName::ALL {
            if params[name].is_nan() {
                prop_assert!(back[name].is_nan());
            } else {
                let scale = params[name].abs().max(1.0);
                prop_assert!((back[name] - params[name]).abs() <= 1e-12 * scale);
            }
        }
    }
}

#[test]
fn named_access_follows_vector_order() {
    let params = GalaxyParameters::from_array([0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
    assert_eq!(params.pa, 6.0);
    assert_eq!(params.get(ParameterName::TurnoverRadius), 7.0);
    assert_eq!(params[ParameterName::VelocityDispersion], 9.0);
    assert_eq!(ParameterName::from_index(8), Some(ParameterName::MaximumVelocity));
    assert_eq!(ParameterName::from_index(10), None);
}

#[test]
fn from_slice_rejects_wrong_length() {
    let err = GalaxyParameters::from_slice(&[1.0, 2.0]).unwrap_err();
    assert_eq!(err.info().code, "parameter-length");
}

#[test]
fn merge_where_nan_prefers_set_fields() {
    let mut partial = GalaxyParameters::nan();
    partial.flux = 12.0;
    let merged = partial.merge_where_nan(&GalaxyParameters::splat(1.0));
    assert_eq!(merged.flux, 12.0);
    assert_eq!(merged.radius, 1.0);
    assert!(!merged.has_nan());
}

#[test]
fn partial_documents_leave_unset_fields_nan() {
    let params: GalaxyParameters = serde_json::from_str(r#"{"pa": 45.0, "inclination": 30.0}"#).unwrap();
    assert_eq!(params.pa, 45.0);
    assert_eq!(params.inclination, 30.0);
    assert!(params.x.is_nan());
    assert!(serde_json::from_str::<GalaxyParameters>(r#"{"sugar": 1.0}"#).is_err());
}

#[test]
fn bounds_reject_inverted_pairs() {
    let mut max = GalaxyParameters::splat(10.0);
    max.radius = -1.0;
    let err = ParameterBounds::new(GalaxyParameters::splat(0.0), max).unwrap_err();
    assert_eq!(err.info().code, "invalid-boundaries");
    assert_eq!(err.info().context.get("parameter").map(String::as_str), Some("radius"));
}

#[test]
fn bounds_reject_unset_entries() {
    let mut min = GalaxyParameters::splat(0.0);
    min.flux = f64::NAN;
    let err = ParameterBounds::new(min, GalaxyParameters::splat(1.0)).unwrap_err();
    assert_eq!(err.info().code, "missing-boundary");
}

#[test]
fn bounds_reject_infinite_entries() {
    let mut max = GalaxyParameters::splat(1.0);
    max.maximum_velocity = f64::INFINITY;
    let err = ParameterBounds::new(GalaxyParameters::splat(0.0), max).unwrap_err();
    assert_eq!(err.family(), "config");
    assert_eq!(err.info().code, "infinite-boundary");
    assert_eq!(
        err.info().context.get("parameter").map(String::as_str),
        Some("maximum_velocity")
    );

    let mut min = GalaxyParameters::splat(0.0);
    min.pa = f64::NEG_INFINITY;
    let err = ParameterBounds::new(min, GalaxyParameters::splat(1.0)).unwrap_err();
    assert_eq!(err.info().code, "infinite-boundary");
}

#[test]
fn bounds_contain_is_inclusive_and_rejects_nan() {
    let bounds =
        ParameterBounds::new(GalaxyParameters::splat(0.0), GalaxyParameters::splat(1.0)).unwrap();
    assert!(bounds.contains(&GalaxyParameters::splat(1.0)));
    assert!(bounds.contains(&GalaxyParameters::splat(0.0)));
    let mut outside = GalaxyParameters::splat(0.5);
    outside.velocity_dispersion = 1.5;
    assert_eq!(bounds.first_violation(&outside), Some(ParameterName::VelocityDispersion));
    assert!(!bounds.contains(&GalaxyParameters::nan()));
    assert_eq!(bounds.mean().x, 0.5);
}

#[test]
fn mask_serializes_as_name_list() {
    let mask = ParameterMask::from_names([ParameterName::Z, ParameterName::Inclination]);
    assert_eq!(mask.count(), 2);
    assert_eq!(mask.free_count(), 8);
    let json = serde_json::to_string(&mask).unwrap();
    assert_eq!(json, r#"["z","inclination"]"#);
    let back: ParameterMask = serde_json::from_str(&json).unwrap();
    assert_eq!(back, mask);
}
