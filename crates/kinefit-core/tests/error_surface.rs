use kinefit_core::errors::{ErrorInfo, KineError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("parameter", "pa")
        .with_context("reason", "example")
}

#[test]
fn config_error_surface() {
    let err = KineError::Config(sample_info("invalid-boundaries", "min exceeds max"));
    assert_eq!(err.info().code, "invalid-boundaries");
    assert_eq!(err.family(), "config");
    assert!(err.info().context.contains_key("parameter"));
}

#[test]
fn model_error_surface() {
    let err = KineError::Model(sample_info("zero-flux", "total flux is zero"));
    assert_eq!(err.info().code, "zero-flux");
    assert_eq!(err.family(), "model");
}

#[test]
fn convolution_error_surface() {
    let err = KineError::Convolution(sample_info("rank-mismatch", "kernel rank differs"));
    assert_eq!(err.info().code, "rank-mismatch");
}

#[test]
fn sampler_error_surface() {
    let err = KineError::Sampler(sample_info("no-useful-iteration", "nothing accepted"));
    assert_eq!(err.info().code, "no-useful-iteration");
}

#[test]
fn serde_error_surface_roundtrips_through_json() {
    let err = KineError::Serde(sample_info("manifest-write", "disk full").with_hint("free space"));
    let json = serde_json::to_string(&err).unwrap();
    assert!(json.contains("\"family\":\"Serde\""));
    let back: KineError = serde_json::from_str(&json).unwrap();
    assert_eq!(back, err);
}

#[test]
fn display_includes_context_and_hint() {
    let err = KineError::Config(sample_info("C001", "bad").with_hint("fix it"));
    let text = err.to_string();
    assert!(text.starts_with("config error: bad [C001] ("));
    assert!(text.contains("parameter=pa"));
    assert!(text.ends_with("hint: fix it"));
}

#[test]
fn context_can_be_added_after_the_fact() {
    let err = KineError::Sampler(ErrorInfo::new("initial-chi", "not finite"))
        .with_context("path", "fit.yaml");
    assert_eq!(err.family(), "sampler");
    assert_eq!(err.info().context["path"], "fit.yaml");
}
