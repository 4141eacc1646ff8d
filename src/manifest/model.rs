use url::Url;

use crate::foundation::core::Vec3;

#[derive(Clone, Debug, PartialEq)]
/// Canonical set of encodings declared for one overlay.
///
/// Built once during validation from either a single URL or a per-encoding object; nothing
/// downstream looks at the declared JSON shape again.
pub struct SourceSet {
    /// Animated PNG, used only when the device plays APNG.
    pub preferred_animated: Option<String>,
    /// GIF, the animation every device can play.
    pub animated_fallback: Option<String>,
    /// Still image.
    pub static_image: Option<String>,
    /// Display reference; always present after validation.
    pub original: String,
}

#[derive(Clone, Debug, PartialEq)]
/// A positioned decoration shown on top of the tracked artwork.
pub struct Overlay {
    /// Unique within the manifest; `overlay-<index>` when not declared.
    pub id: String,
    /// Available encodings.
    pub sources: SourceSet,
    /// Declared stacking order (`zIndex`), lower first.
    pub depth_index: f64,
    /// Position relative to the target, in target units.
    pub position: Vec3,
    /// Plane scale.
    pub scale: Vec3,
    /// Whether animated encodings loop.
    pub loop_playback: bool,
}

#[derive(Clone, Debug, PartialEq)]
/// Validated description of one artwork's AR assets.
///
/// Immutable once built; a new identifier produces a new manifest.
pub struct Manifest {
    /// Identifier the manifest was resolved for.
    pub identifier: String,
    /// Display title, non-empty.
    pub title: String,
    /// Reference to the tracking target descriptor, relative to `source_url`.
    pub target: String,
    /// Overlays in declaration order.
    pub overlays: Vec<Overlay>,
    /// Optional "about this artwork" link.
    pub about_link: Option<String>,
    /// Optional video offered when the camera cannot be used.
    pub fallback_video: Option<String>,
    /// Where the manifest was fetched from; relative references resolve against it.
    pub source_url: Url,
}

impl Manifest {
    /// Resolve a manifest-relative reference.
    pub fn resolve(&self, reference: &str) -> Option<Url> {
        match self.source_url.join(reference) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(reference, error = %e, "failed to resolve manifest asset url");
                None
            }
        }
    }

    pub fn target_url(&self) -> Option<Url> {
        self.resolve(&self.target)
    }

    pub fn fallback_video_url(&self) -> Option<Url> {
        self.fallback_video.as_deref().and_then(|v| self.resolve(v))
    }

    pub fn overlay(&self, id: &str) -> Option<&Overlay> {
        self.overlays.iter().find(|o| o.id == id)
    }

    /// Serialize back into the manifest JSON shape.
    ///
    /// Validating the result yields an equal manifest.
    pub fn to_document(&self) -> serde_json::Value {
        let doc = ManifestDocument {
            title: &self.title,
            target: &self.target,
            overlays: self
                .overlays
                .iter()
                .map(|o| OverlayDocument {
                    id: &o.id,
                    url: SourceDocument {
                        apng: o.sources.preferred_animated.as_deref(),
                        gif: o.sources.animated_fallback.as_deref(),
                        png: o.sources.static_image.as_deref(),
                        url: &o.sources.original,
                    },
                    z_index: o.depth_index,
                    position: o.position,
                    scale: o.scale,
                    loop_playback: o.loop_playback,
                })
                .collect(),
            about_link: self.about_link.as_deref(),
            fallback_video: self.fallback_video.as_deref(),
        };
        serde_json::to_value(doc).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestDocument<'a> {
    title: &'a str,
    target: &'a str,
    overlays: Vec<OverlayDocument<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    about_link: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback_video: Option<&'a str>,
}

#[derive(serde::Serialize)]
struct OverlayDocument<'a> {
    id: &'a str,
    url: SourceDocument<'a>,
    #[serde(rename = "zIndex")]
    z_index: f64,
    position: Vec3,
    scale: Vec3,
    #[serde(rename = "loop")]
    loop_playback: bool,
}

#[derive(serde::Serialize)]
struct SourceDocument<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    apng: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gif: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    png: Option<&'a str>,
    url: &'a str,
}
