use super::*;

#[test]
fn defaults_match_documented_values() {
    let opts = SessionOpts::default();
    assert_eq!(opts.max_attempts, 2);
    assert_eq!(opts.advisory_delay(), Duration::from_millis(2600));
    assert_eq!(opts.depth_step, 0.001);
    assert_eq!(opts.asset_budget_bytes, 12 * 1024 * 1024);
    opts.validate().unwrap();
}

#[test]
fn partial_json_keeps_other_defaults() {
    let opts = SessionOpts::from_json_str(r#"{ "max_attempts": 4, "engine_start_timeout_ms": null }"#)
        .unwrap();
    assert_eq!(opts.max_attempts, 4);
    assert_eq!(opts.engine_start_timeout(), None);
    assert_eq!(opts.advisory_delay_ms, DEFAULT_ADVISORY_DELAY_MS);
}

#[test]
fn invalid_values_are_config_errors() {
    let err = SessionOpts::from_json_str(r#"{ "max_attempts": 0 }"#).unwrap_err();
    assert!(matches!(err, GalleryError::Config(_)));

    let err = SessionOpts::from_json_str(r#"{ "depth_step": -1.0 }"#).unwrap_err();
    assert!(err.to_string().contains("depth_step"));

    let err = SessionOpts::from_json_str(r#"{ "unknown": 1 }"#).unwrap_err();
    assert!(matches!(err, GalleryError::Config(_)));
}

#[test]
fn missing_file_reports_path() {
    let err = SessionOpts::from_json_file("/definitely/not/here.json").unwrap_err();
    assert!(err.to_string().contains("/definitely/not/here.json"));
}
