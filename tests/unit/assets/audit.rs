use std::sync::Arc;

use url::Url;

use super::*;
use crate::{
    assets::preload::{ByteStats, EncodingKind, FailedOverlay, OverlayResource},
    foundation::{core::Vec3, error::AssetLoadError},
    manifest::model::{Overlay, SourceSet},
};

fn overlay(id: &str) -> Overlay {
    Overlay {
        id: id.to_string(),
        sources: SourceSet {
            preferred_animated: None,
            animated_fallback: None,
            static_image: Some(format!("{id}.png")),
            original: format!("{id}.png"),
        },
        depth_index: 0.0,
        position: Vec3::ZERO,
        scale: Vec3::ONE,
        loop_playback: true,
    }
}

fn resource(id: &str, dims: Option<(u32, u32)>, bytes: usize) -> OverlayResource {
    OverlayResource {
        overlay: overlay(id),
        encoding: EncodingKind::Static,
        decoded: None,
        byte_length: bytes,
        dimensions: dims,
        url: Url::parse(&format!("https://g.test/{id}.png")).unwrap(),
    }
}

fn result(resources: Vec<OverlayResource>, failed: Vec<&str>, target: usize) -> PreloadResult {
    let overlays: usize = resources.iter().map(|r| r.byte_length).sum();
    PreloadResult {
        target_url: Url::parse("https://g.test/t.mind").unwrap(),
        target_buffer: Arc::new(vec![0; target]),
        overlay_resources: resources,
        failed_overlays: failed
            .into_iter()
            .map(|id| FailedOverlay {
                overlay: overlay(id),
                error: AssetLoadError::Status {
                    url: format!("https://g.test/{id}.png"),
                    status: 404,
                },
            })
            .collect(),
        stats: ByteStats {
            total: target + overlays,
            target,
            overlays,
            ..ByteStats::default()
        },
    }
}

#[test]
fn clean_preload_has_no_findings() {
    let r = result(vec![resource("a", Some((512, 512)), 100)], vec![], 10);
    assert_eq!(audit_preload(&r, &SessionOpts::default()), PreloadAudit::default());
}

#[test]
fn failures_oversize_and_budget_are_reported() {
    let opts = SessionOpts {
        asset_budget_bytes: 1_000,
        ..SessionOpts::default()
    };
    let r = result(
        vec![
            resource("huge", Some((4096, 100)), 900),
            resource("blind", None, 50),
        ],
        vec!["bird"],
        200,
    );
    let audit = audit_preload(&r, &opts);
    assert_eq!(
        audit.warnings,
        vec!["Overlay “bird” is unavailable.".to_string(), BUDGET_WARNING.to_string()]
    );
    assert_eq!(audit.oversized, vec!["huge".to_string()]);
    assert!(audit.over_budget);
}
