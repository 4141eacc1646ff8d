use std::io::Cursor;

use super::*;
use crate::{
    fetch::memory::MemorySource,
    manifest::validate::{ValidationContext, validate_manifest},
};

fn png() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn manifest(doc: serde_json::Value) -> Manifest {
    let url = Url::parse("https://g.test/ar/demo/manifest.json").unwrap();
    validate_manifest(
        &doc,
        ValidationContext {
            identifier: "demo",
            source_url: &url,
        },
    )
    .unwrap()
    .manifest
}

fn asset(path: &str) -> Url {
    Url::parse("https://g.test/ar/demo/").unwrap().join(path).unwrap()
}

fn opts(animated: bool) -> PreloadOpts {
    PreloadOpts {
        animated_support: animated,
        retry_delay: Duration::ZERO,
        ..PreloadOpts::default()
    }
}

#[test]
fn encoding_chain_honours_animated_flag() {
    let m = manifest(serde_json::json!({
        "title": "T", "target": "t.mind",
        "overlays": [
            {"id": "a", "url": {"apng": "a.apng", "gif": "a.gif"}},
            {"id": "s", "url": {"static": "s.png"}},
            {"id": "o", "url": {"url": "o.webp"}}
        ]
    }));
    assert_eq!(select_encoding(&m.overlays[0], true), (EncodingKind::Apng, "a.apng"));
    assert_eq!(select_encoding(&m.overlays[0], false), (EncodingKind::Gif, "a.gif"));
    assert_eq!(select_encoding(&m.overlays[1], true), (EncodingKind::Static, "s.png"));
    assert_eq!(select_encoding(&m.overlays[2], true), (EncodingKind::Original, "o.webp"));
}

#[tokio::test]
async fn exhausted_overlay_is_recorded_not_fatal() {
    let m = manifest(serde_json::json!({
        "title": "T", "target": "t.mind",
        "overlays": [
            {"id": "bird", "url": "bird.png"},
            {"id": "cloud", "url": "cloud.png"}
        ]
    }));
    let src = MemorySource::new();
    src.insert(&asset("t.mind"), vec![7u8; 64])
        .insert(&asset("cloud.png"), png());

    let mut events = Vec::new();
    let result = preload(&src, &m, &opts(false), |e| events.push(e)).await.unwrap();

    assert!(result.has_usable_target());
    assert_eq!(result.overlay_resources.len(), 1);
    assert_eq!(result.overlay_resources[0].overlay.id, "cloud");
    assert_eq!(result.overlay_resources[0].encoding, EncodingKind::Static);
    assert_eq!(result.failed_overlays.len(), 1);
    assert_eq!(result.failed_overlays[0].overlay.id, "bird");
    assert!(matches!(
        result.failed_overlays[0].error,
        AssetLoadError::Exhausted { attempts: 2, .. }
    ));
    assert_eq!(src.request_count(&asset("bird.png")), 2);

    let bird: Vec<&ProgressStatus> = events
        .iter()
        .filter(|e| e.label == "Overlay bird (static)")
        .map(|e| &e.status)
        .collect();
    assert_eq!(bird.len(), 3);
    assert_eq!(bird[0], &ProgressStatus::Start);
    assert!(matches!(bird[1], ProgressStatus::Retry { attempt: 2, .. }));
    assert!(matches!(bird[2], ProgressStatus::Failed { .. }));

    let last = events.last().unwrap();
    assert_eq!(last.status, ProgressStatus::Loaded);
    assert_eq!((last.completed, last.total), (2, 3));
    assert_eq!(result.stats.target, 64);
    assert_eq!(result.stats.total, 64 + result.stats.overlays);
}

#[tokio::test]
async fn target_is_requested_first_and_is_fatal() {
    let m = manifest(serde_json::json!({
        "title": "T", "target": "t.mind",
        "overlays": [{"id": "bird", "url": "bird.png"}]
    }));
    let src = MemorySource::new();
    src.insert(&asset("bird.png"), png());

    let err = preload(&src, &m, &opts(false), |_| {}).await.unwrap_err();
    assert!(matches!(err, AssetLoadError::Exhausted { ref label, .. } if label == TARGET_LABEL));
    assert_eq!(src.request_count(&asset("bird.png")), 0);
    assert!(src.requests().iter().all(|(u, _)| *u == asset("t.mind")));
}

#[tokio::test]
async fn transient_failure_recovers_on_retry() {
    let m = manifest(serde_json::json!({"title": "T", "target": "t.mind"}));
    let src = MemorySource::new();
    src.insert(&asset("t.mind"), vec![1u8; 8])
        .fail_transport(&asset("t.mind"), 1, "reset");

    let mut events = Vec::new();
    let result = preload(&src, &m, &opts(false), |e| events.push(e)).await.unwrap();
    assert_eq!(result.target_buffer.len(), 8);
    let statuses: Vec<_> = events.iter().map(|e| e.status.clone()).collect();
    assert_eq!(statuses.len(), 3);
    assert!(matches!(statuses[1], ProgressStatus::Retry { attempt: 2, .. }));
    assert_eq!(statuses[2], ProgressStatus::Loaded);
    assert_eq!(events[2].percent(), 100);
}

#[tokio::test]
async fn unresolvable_overlay_is_excluded_from_total() {
    let m = manifest(serde_json::json!({
        "title": "T", "target": "t.mind",
        "overlays": [
            {"id": "broken", "url": "http://[::1"},
            {"id": "ok", "url": "ok.png"}
        ]
    }));
    let src = MemorySource::new();
    src.insert(&asset("t.mind"), vec![1u8; 4])
        .insert(&asset("ok.png"), png());

    let mut totals = Vec::new();
    let result = preload(&src, &m, &opts(true), |e| totals.push(e.total)).await.unwrap();
    assert!(totals.iter().all(|t| *t == 2));
    assert_eq!(result.failed_overlays.len(), 1);
    assert!(matches!(
        result.failed_overlays[0].error,
        AssetLoadError::Unresolvable { .. }
    ));
}

#[tokio::test]
async fn undecodable_body_is_retried_then_failed() {
    let m = manifest(serde_json::json!({
        "title": "T", "target": "t.mind",
        "overlays": [{"id": "junk", "url": "junk.png"}]
    }));
    let src = MemorySource::new();
    src.insert(&asset("t.mind"), vec![1u8; 4])
        .insert(&asset("junk.png"), b"definitely not pixels".to_vec());

    let o = opts(false);
    let result = preload(&src, &m, &o, |_| {}).await.unwrap();
    assert_eq!(src.request_count(&asset("junk.png")), 2);
    match &result.failed_overlays[0].error {
        AssetLoadError::Exhausted { last, .. } => {
            assert!(matches!(**last, AssetLoadError::Undecodable { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(o.staging.live_handles(), 0);
}

#[tokio::test]
async fn served_content_type_decodes_unsniffable_overlays() {
    let m = manifest(serde_json::json!({
        "title": "T", "target": "t.mind",
        "overlays": [{"id": "plate", "url": "plate.tga"}]
    }));
    let img = image::RgbaImage::from_pixel(3, 3, image::Rgba([90, 90, 90, 255]));
    let mut tga = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut tga), image::ImageFormat::Tga)
        .unwrap();
    let src = MemorySource::new();
    src.insert(&asset("t.mind"), vec![1u8; 4])
        .insert_typed(&asset("plate.tga"), "image/x-tga", tga);

    let result = preload(&src, &m, &opts(false), |_| {}).await.unwrap();
    assert!(result.failed_overlays.is_empty());
    assert_eq!(result.overlay_resources[0].dimensions, Some((3, 3)));
    assert_eq!(src.request_count(&asset("plate.tga")), 1);
}

#[test]
fn zero_total_reports_complete() {
    let e = ProgressEvent {
        status: ProgressStatus::Start,
        label: TARGET_LABEL.to_string(),
        completed: 0,
        total: 0,
    };
    assert_eq!(e.percent(), 100);
}
