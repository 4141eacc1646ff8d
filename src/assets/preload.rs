use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use url::Url;

use crate::{
    assets::decode::{DecodedImage, StagingArea, decode_overlay},
    fetch::source::{AssetSource, CachePolicy, FetchedBody},
    foundation::{config::SessionOpts, error::AssetLoadError},
    manifest::model::{Manifest, Overlay},
};

/// Label used for the target descriptor in progress events.
pub const TARGET_LABEL: &str = "Target descriptor";

/// Encoding picked for an overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingKind {
    Apng,
    Gif,
    Static,
    Original,
}

impl EncodingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Apng => "apng",
            Self::Gif => "gif",
            Self::Static => "static",
            Self::Original => "original",
        }
    }
}

/// Options for [`preload`].
#[derive(Clone, Debug)]
pub struct PreloadOpts {
    /// The device plays animated PNG.
    pub animated_support: bool,
    /// Attempts per asset, including the first.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Staging handles for decoding.
    pub staging: StagingArea,
}

impl Default for PreloadOpts {
    fn default() -> Self {
        Self::from_session(&SessionOpts::default(), false)
    }
}

impl PreloadOpts {
    pub fn from_session(opts: &SessionOpts, animated_support: bool) -> Self {
        Self {
            animated_support,
            max_attempts: opts.max_attempts.max(1),
            retry_delay: opts.retry_delay(),
            staging: StagingArea::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProgressStatus {
    Start,
    /// `attempt` is the number of the attempt about to run (2 for the first retry).
    Retry {
        attempt: u32,
        error: String,
    },
    Loaded,
    Failed {
        error: String,
    },
}

/// One progress notification. `completed` counts loaded assets; failures do not advance it.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ProgressEvent {
    #[serde(flatten)]
    pub status: ProgressStatus,
    pub label: String,
    pub completed: usize,
    pub total: usize,
}

impl ProgressEvent {
    /// Share of loaded assets, 0 to 100.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let pct = (self.completed as f64 / self.total as f64 * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }
}

/// A successfully loaded overlay.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayResource {
    pub overlay: Overlay,
    pub encoding: EncodingKind,
    /// `None` when the body loaded but could not be decoded.
    pub decoded: Option<DecodedImage>,
    pub byte_length: usize,
    pub dimensions: Option<(u32, u32)>,
    pub url: Url,
}

/// An overlay that could not be loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct FailedOverlay {
    pub overlay: Overlay,
    pub error: AssetLoadError,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct ByteStats {
    pub total: usize,
    pub target: usize,
    pub overlays: usize,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u128(d.as_millis())
}

/// Everything fetched for one manifest.
#[derive(Clone, Debug, PartialEq)]
pub struct PreloadResult {
    pub target_url: Url,
    pub target_buffer: Arc<Vec<u8>>,
    /// Loaded overlays, in manifest order.
    pub overlay_resources: Vec<OverlayResource>,
    pub failed_overlays: Vec<FailedOverlay>,
    pub stats: ByteStats,
}

impl PreloadResult {
    pub fn has_usable_target(&self) -> bool {
        !self.target_buffer.is_empty()
    }
}

/// Pick the encoding to load for `overlay`.
///
/// Animated PNG is only considered with `animated_support`; otherwise the chain is GIF, still
/// image, then the display reference.
pub fn select_encoding(overlay: &Overlay, animated_support: bool) -> (EncodingKind, &str) {
    let s = &overlay.sources;
    let animated = s
        .preferred_animated
        .as_deref()
        .filter(|_| animated_support)
        .map(|u| (EncodingKind::Apng, u));
    animated
        .or_else(|| s.animated_fallback.as_deref().map(|u| (EncodingKind::Gif, u)))
        .or_else(|| s.static_image.as_deref().map(|u| (EncodingKind::Static, u)))
        .unwrap_or((EncodingKind::Original, s.original.as_str()))
}

struct Tracker<F> {
    total: usize,
    completed: usize,
    on_progress: F,
}

impl<F: FnMut(ProgressEvent)> Tracker<F> {
    fn emit(&mut self, label: &str, status: ProgressStatus) {
        if matches!(status, ProgressStatus::Loaded) {
            self.completed += 1;
        }
        (self.on_progress)(ProgressEvent {
            status,
            label: label.to_string(),
            completed: self.completed,
            total: self.total,
        });
    }
}

/// Load the target descriptor and every overlay of `manifest`.
///
/// The target is loaded first and is the only fatal failure. Overlays load one after another in
/// manifest order; each failure is recorded in [`PreloadResult::failed_overlays`]. Every asset
/// reports `start`, then `retry` per extra attempt, then `loaded` or `failed`.
#[tracing::instrument(skip_all, fields(identifier = %manifest.identifier))]
pub async fn preload<S, F>(
    source: &S,
    manifest: &Manifest,
    opts: &PreloadOpts,
    on_progress: F,
) -> Result<PreloadResult, AssetLoadError>
where
    S: AssetSource,
    F: FnMut(ProgressEvent),
{
    let started = Instant::now();

    let mut failed_overlays = Vec::new();
    let mut tasks = Vec::new();
    for overlay in &manifest.overlays {
        let (encoding, reference) = select_encoding(overlay, opts.animated_support);
        let label = format!("Overlay {} ({})", overlay.id, encoding.as_str());
        match manifest.source_url.join(reference) {
            Ok(url) => tasks.push((overlay, encoding, label, url)),
            Err(e) => {
                tracing::warn!(overlay = %overlay.id, reference, "overlay skipped: unresolvable source");
                failed_overlays.push(FailedOverlay {
                    overlay: overlay.clone(),
                    error: AssetLoadError::Unresolvable {
                        label,
                        reason: e.to_string(),
                    },
                });
            }
        }
    }

    let mut tracker = Tracker {
        total: 1 + tasks.len(),
        completed: 0,
        on_progress,
    };

    let target_url = manifest
        .source_url
        .join(&manifest.target)
        .map_err(|e| AssetLoadError::Unresolvable {
            label: TARGET_LABEL.to_string(),
            reason: e.to_string(),
        })?;
    let target_ref = &target_url;
    let target_buffer = load_with_retry(&mut tracker, TARGET_LABEL, target_ref, opts, || {
        async move { Ok::<_, AssetLoadError>(fetch_body(source, target_ref).await?.bytes) }
    })
    .await?;

    let mut overlay_resources = Vec::with_capacity(tasks.len());
    let mut overlay_bytes = 0;
    for (overlay, encoding, label, url) in tasks {
        let loaded = load_with_retry(&mut tracker, &label, &url, opts, || {
            let url = &url;
            async move {
                let body = fetch_body(source, url).await?;
                let outcome = decode_overlay(
                    &body.bytes,
                    body.content_type.as_deref(),
                    url.as_str(),
                    &opts.staging,
                )
                .await?;
                Ok::<_, AssetLoadError>((body.bytes.len(), outcome))
            }
        })
        .await;
        match loaded {
            Ok((byte_length, outcome)) => {
                overlay_bytes += byte_length;
                overlay_resources.push(OverlayResource {
                    overlay: overlay.clone(),
                    encoding,
                    decoded: outcome.image,
                    byte_length,
                    dimensions: outcome.dimensions,
                    url,
                });
            }
            Err(error) => {
                tracing::warn!(overlay = %overlay.id, kind = encoding.as_str(), %error, "overlay skipped after retries");
                failed_overlays.push(FailedOverlay {
                    overlay: overlay.clone(),
                    error,
                });
            }
        }
    }

    let stats = ByteStats {
        total: target_buffer.len() + overlay_bytes,
        target: target_buffer.len(),
        overlays: overlay_bytes,
        duration: started.elapsed(),
    };
    tracing::info!(
        total_assets = tracker.total,
        overlays = overlay_resources.len(),
        failed = failed_overlays.len(),
        bytes = stats.total,
        duration_ms = stats.duration.as_millis() as u64,
        "assets ready"
    );

    Ok(PreloadResult {
        target_url,
        target_buffer: Arc::new(target_buffer),
        overlay_resources,
        failed_overlays,
        stats,
    })
}

async fn load_with_retry<T, F, Fut, P>(
    tracker: &mut Tracker<P>,
    label: &str,
    url: &Url,
    opts: &PreloadOpts,
    mut attempt_once: F,
) -> Result<T, AssetLoadError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AssetLoadError>>,
    P: FnMut(ProgressEvent),
{
    let max_attempts = opts.max_attempts.max(1);
    tracker.emit(label, ProgressStatus::Start);

    let mut attempt = 0;
    loop {
        attempt += 1;
        match attempt_once().await {
            Ok(v) => {
                tracker.emit(label, ProgressStatus::Loaded);
                return Ok(v);
            }
            Err(e) => {
                tracing::warn!(label, url = %url, attempt, max_attempts, error = %e, "asset attempt failed");
                if attempt >= max_attempts {
                    tracker.emit(
                        label,
                        ProgressStatus::Failed {
                            error: e.to_string(),
                        },
                    );
                    return Err(AssetLoadError::Exhausted {
                        label: label.to_string(),
                        url: url.to_string(),
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                tracker.emit(
                    label,
                    ProgressStatus::Retry {
                        attempt: attempt + 1,
                        error: e.to_string(),
                    },
                );
                if !opts.retry_delay.is_zero() {
                    tokio::time::sleep(opts.retry_delay).await;
                }
            }
        }
    }
}

async fn fetch_body<S: AssetSource>(source: &S, url: &Url) -> Result<FetchedBody, AssetLoadError> {
    let body = source
        .fetch(url, CachePolicy::Default)
        .await
        .map_err(|e| AssetLoadError::Transport {
            url: url.to_string(),
            source: e,
        })?;
    if !body.is_success() {
        return Err(AssetLoadError::Status {
            url: url.to_string(),
            status: body.status,
        });
    }
    Ok(body)
}

#[cfg(test)]
#[path = "../../tests/unit/assets/preload.rs"]
mod tests;
