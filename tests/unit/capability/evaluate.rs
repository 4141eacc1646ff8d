use std::cell::Cell;

use super::*;

fn capable() -> CapabilityVector {
    CapabilityVector {
        platform_family: PlatformFamily::Ios,
        platform_version: Some(16.4),
        has_graphics_context: true,
        has_camera_api: true,
        animated_png_support: true,
    }
}

#[test]
fn capable_device_is_supported() {
    let eval = evaluate(&capable(), &SupportOverrides::default());
    assert!(eval.supported);
    assert!(eval.reasons.is_empty());
}

#[test]
fn failures_accumulate_in_order() {
    let v = CapabilityVector {
        platform_version: Some(14.2),
        has_graphics_context: false,
        has_camera_api: false,
        ..capable()
    };
    let eval = evaluate(&v, &SupportOverrides::default());
    assert!(!eval.supported);
    assert_eq!(
        eval.reasons,
        vec![REASON_IOS, REASON_GRAPHICS, REASON_CAMERA]
    );
}

#[test]
fn unknown_version_does_not_fail_family_check() {
    for family in [PlatformFamily::Ios, PlatformFamily::Android] {
        let v = CapabilityVector {
            platform_family: family,
            platform_version: None,
            ..capable()
        };
        assert!(evaluate(&v, &SupportOverrides::default()).supported);
    }
}

#[test]
fn android_threshold_only_applies_to_android() {
    let old_android = CapabilityVector {
        platform_family: PlatformFamily::Android,
        platform_version: Some(8.1),
        ..capable()
    };
    assert_eq!(
        evaluate(&old_android, &SupportOverrides::default()).reasons,
        vec![REASON_ANDROID]
    );

    let desktop = CapabilityVector {
        platform_family: PlatformFamily::Other,
        platform_version: Some(1.0),
        ..capable()
    };
    assert!(evaluate(&desktop, &SupportOverrides::default()).supported);
}

#[test]
fn forced_override_skips_other_checks() {
    let v = CapabilityVector {
        has_camera_api: false,
        ..capable()
    };
    let overrides = SupportOverrides {
        force_unsupported: true,
    };
    let eval = evaluate(&v, &overrides);
    assert!(!eval.supported);
    assert!(eval.is_forced());
    assert_eq!(eval.reasons, vec![REASON_FORCED]);
}

#[test]
fn evaluate_is_deterministic() {
    let families = [PlatformFamily::Ios, PlatformFamily::Android, PlatformFamily::Other];
    let versions = [None, Some(8.0), Some(9.0), Some(15.0), Some(17.1)];
    for family in families {
        for version in versions {
            for bits in 0..8u8 {
                let v = CapabilityVector {
                    platform_family: family,
                    platform_version: version,
                    has_graphics_context: bits & 1 != 0,
                    has_camera_api: bits & 2 != 0,
                    animated_png_support: bits & 4 != 0,
                };
                let a = evaluate(&v, &SupportOverrides::default());
                let b = evaluate(&v, &SupportOverrides::default());
                assert_eq!(a, b);
                assert_eq!(a.supported, a.reasons.is_empty());
            }
        }
    }
}

struct CountingProbe {
    calls: Cell<u32>,
}

impl CapabilityProbe for CountingProbe {
    fn probe(&self) -> CapabilityVector {
        self.calls.set(self.calls.get() + 1);
        capable()
    }
}

#[test]
fn cached_probe_runs_once() {
    let cached = CachedProbe::new(CountingProbe {
        calls: Cell::new(0),
    });
    assert_eq!(cached.probe(), capable());
    assert_eq!(cached.probe(), capable());
    assert_eq!(cached.inner.calls.get(), 1);
}

#[test]
fn process_vector_is_first_writer_wins() {
    let first = process_capabilities(&FixedProbe(capable()));
    let other = CapabilityVector {
        has_camera_api: false,
        ..capable()
    };
    assert_eq!(process_capabilities(&FixedProbe(other)), first);
}
