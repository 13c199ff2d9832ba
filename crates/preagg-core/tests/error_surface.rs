use preagg_core::errors::{ErrorInfo, PreaggError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("entity", "a")
        .with_hint("run base-resources first")
}

#[test]
fn registry_error_surface() {
    let err = PreaggError::Registry(sample_info("campaign-missing", "no base campaign"));
    assert_eq!(err.code(), "campaign-missing");
    assert!(err.info().context.contains_key("entity"));
    let rendered = err.to_string();
    assert!(rendered.starts_with("registry error: no base campaign"));
    assert!(rendered.contains("hint: run base-resources first"));
}

#[test]
fn errors_roundtrip_through_json() {
    let err = PreaggError::Coordinate(sample_info("identifier-unmapped", "missing key"));
    let json = serde_json::to_string(&err).unwrap();
    assert!(json.contains("\"family\":\"Coordinate\""));
    let restored: PreaggError = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, err);
}
