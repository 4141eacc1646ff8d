use std::collections::HashSet;

use serde_json::Value;
use url::Url;

use crate::{
    foundation::{core::Vec3, error::ManifestError},
    manifest::model::{Manifest, Overlay, SourceSet},
};

/// Where a manifest document came from.
#[derive(Clone, Copy, Debug)]
pub struct ValidationContext<'a> {
    pub identifier: &'a str,
    pub source_url: &'a Url,
}

/// A manifest that passed validation, plus the findings that were tolerated on the way.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedManifest {
    pub manifest: Manifest,
    /// One entry per dropped overlay (malformed, sourceless or duplicated).
    pub diagnostics: Vec<String>,
}

/// Declared `url` field of an overlay: one reference or one per encoding.
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum SourceDecl {
    Single(String),
    Encodings(EncodingDecl),
}

#[derive(Debug, Default, serde::Deserialize)]
struct EncodingDecl {
    #[serde(default)]
    apng: Option<Value>,
    #[serde(default)]
    gif: Option<Value>,
    #[serde(default)]
    png: Option<Value>,
    #[serde(default, rename = "static")]
    still: Option<Value>,
    #[serde(default)]
    url: Option<Value>,
}

impl SourceDecl {
    fn into_source_set(self) -> Option<SourceSet> {
        match self {
            SourceDecl::Single(s) => {
                let s = non_empty(&s)?;
                Some(SourceSet {
                    preferred_animated: None,
                    animated_fallback: None,
                    static_image: Some(s.clone()),
                    original: s,
                })
            }
            SourceDecl::Encodings(decl) => {
                let apng = ensure_string(decl.apng.as_ref());
                let gif = ensure_string(decl.gif.as_ref());
                let png = ensure_string(decl.png.as_ref())
                    .or_else(|| ensure_string(decl.still.as_ref()));
                let original = ensure_string(decl.url.as_ref())
                    .or_else(|| apng.clone())
                    .or_else(|| gif.clone())
                    .or_else(|| png.clone())?;
                Some(SourceSet {
                    preferred_animated: apng,
                    animated_fallback: gif,
                    static_image: png,
                    original,
                })
            }
        }
    }
}

/// Validate a parsed manifest document.
///
/// Structural findings on the document itself are collected and reported together as one
/// [`ManifestError`] of kind `Validation`. Overlays are normalized one by one; a bad overlay is
/// dropped and noted in [`ValidatedManifest::diagnostics`] instead of failing the manifest.
pub fn validate_manifest(
    doc: &Value,
    ctx: ValidationContext<'_>,
) -> Result<ValidatedManifest, ManifestError> {
    let Some(root) = doc.as_object() else {
        return Err(ManifestError::validation("Manifest must be a JSON object."));
    };

    let mut errors = Vec::new();

    let title = ensure_string(root.get("title"));
    if title.is_none() {
        errors.push("`title` must be a non-empty string.".to_string());
    }

    let target = ensure_string(root.get("target"));
    match &target {
        None => errors.push(
            "`target` is required and must point to a MindAR descriptor file.".to_string(),
        ),
        Some(t) if ctx.source_url.join(t).is_err() => {
            errors.push(format!("`target` \"{t}\" is not a resolvable reference."));
        }
        Some(_) => {}
    }

    let mut diagnostics = Vec::new();
    let overlays = match root.get("overlays") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => normalize_overlays(items, &mut diagnostics),
        Some(_) => {
            errors.push("`overlays` must be an array.".to_string());
            Vec::new()
        }
    };

    if !errors.is_empty() {
        return Err(ManifestError::validation(errors.join(" ")));
    }
    let (Some(title), Some(target)) = (title, target) else {
        return Err(ManifestError::validation("Manifest is incomplete."));
    };

    for d in &diagnostics {
        tracing::warn!(identifier = ctx.identifier, "{d}");
    }

    Ok(ValidatedManifest {
        manifest: Manifest {
            identifier: ctx.identifier.to_string(),
            title,
            target,
            overlays,
            about_link: ensure_string(root.get("aboutLink")),
            fallback_video: ensure_string(root.get("fallbackVideo")),
            source_url: ctx.source_url.clone(),
        },
        diagnostics,
    })
}

fn normalize_overlays(items: &[Value], diagnostics: &mut Vec<String>) -> Vec<Overlay> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Some(overlay) = normalize_overlay(item, index, diagnostics) else {
            continue;
        };
        if !seen.insert(overlay.id.clone()) {
            diagnostics.push(format!(
                "Overlay {index} reuses id \"{}\" and was skipped.",
                overlay.id
            ));
            continue;
        }
        out.push(overlay);
    }
    out
}

fn normalize_overlay(item: &Value, index: usize, diagnostics: &mut Vec<String>) -> Option<Overlay> {
    let Some(obj) = item.as_object() else {
        diagnostics.push(format!("Overlay at index {index} must be an object."));
        return None;
    };

    let sources = match obj.get("url") {
        None | Some(Value::Null) => None,
        Some(raw) => match serde_json::from_value::<SourceDecl>(raw.clone()) {
            Ok(decl) => decl.into_source_set(),
            Err(_) => {
                diagnostics.push(format!("Overlay {index} missing url definitions."));
                return None;
            }
        },
    };
    let Some(sources) = sources else {
        diagnostics.push(format!("Overlay {index} requires at least one asset url."));
        return None;
    };

    Some(Overlay {
        id: ensure_string(obj.get("id")).unwrap_or_else(|| format!("overlay-{index}")),
        sources,
        // `+ 0.0` folds a declared `-0` into `0`.
        depth_index: obj.get("zIndex").and_then(Value::as_f64).unwrap_or(0.0) + 0.0,
        position: normalize_vector(obj.get("position"), Vec3::ZERO),
        scale: normalize_vector(obj.get("scale"), Vec3::ONE),
        loop_playback: !matches!(obj.get("loop"), Some(Value::Bool(false))),
    })
}

/// First three components of an array of at least three entries; components that do not read as
/// numbers take the matching `fallback` component. Anything else yields `fallback` whole.
pub(crate) fn normalize_vector(value: Option<&Value>, fallback: Vec3) -> Vec3 {
    let Some(Value::Array(items)) = value else {
        return fallback;
    };
    if items.len() < 3 {
        return fallback;
    }
    let c = |i: usize| coerce_number(&items[i]).unwrap_or(fallback.component(i));
    Vec3::new(c(0), c(1), c(2))
}

// Loose numeric reading: numeric strings, booleans and null count; non-finite values do not.
fn coerce_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().ok()?
            }
        }
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => 0.0,
        Value::Array(_) | Value::Object(_) => return None,
    };
    n.is_finite().then_some(n)
}

fn ensure_string(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str).and_then(non_empty)
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

#[cfg(test)]
#[path = "../../tests/unit/manifest/validate.rs"]
mod tests;
