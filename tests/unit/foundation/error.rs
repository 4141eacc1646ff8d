use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        GalleryError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(GalleryError::config("x").to_string().contains("config error:"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = GalleryError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn not_found_carries_status() {
    let err = ManifestError::not_found(404);
    assert_eq!(err.kind, ManifestErrorKind::NotFound);
    assert_eq!(err.status, Some(404));
    assert!(err.is_missing_artwork());
    assert!(err.to_string().contains("HTTP 404"));

    let err = ManifestError::not_found(500);
    assert_eq!(err.kind, ManifestErrorKind::NotFound);
    assert!(!err.is_missing_artwork());
}

#[test]
fn engine_errors_classify_permission_denial() {
    assert!(EngineStartError::classify("NotAllowedError", "").is_permission_denied());
    assert!(EngineStartError::classify("Error", "Permission denied by user").is_permission_denied());
    assert!(EngineStartError::classify("SecurityPermissionError", "nope").is_permission_denied());

    let other = EngineStartError::classify("NotReadableError", "camera busy");
    assert_eq!(other, EngineStartError::Failed("camera busy".to_string()));
}

#[test]
fn unsupported_lists_reasons() {
    let err = GalleryError::Unsupported {
        reasons: vec!["a.".to_string(), "b.".to_string()],
    };
    assert_eq!(err.to_string(), "capability unsupported: a. b.");
}
