use url::Url;

use crate::{
    fetch::source::{AssetSource, CachePolicy},
    foundation::error::{ManifestError, ManifestErrorKind},
    manifest::{
        model::Manifest,
        validate::{ValidationContext, validate_manifest},
    },
    routing::identifier::manifest_url,
};

/// Fetch, parse and validate the manifest of `identifier` below `base`.
///
/// The request bypasses caches. Non-2xx answers map to [`ManifestErrorKind::NotFound`] with the
/// status attached, transport failures to `Network`, unparsable bodies to `InvalidJson`.
#[tracing::instrument(skip(source, base), fields(base = %base))]
pub async fn fetch_manifest<S: AssetSource>(
    source: &S,
    base: &Url,
    identifier: &str,
) -> Result<Manifest, ManifestError> {
    if identifier.is_empty() {
        return Err(ManifestError::validation(
            "Cannot load manifest without an identifier.",
        ));
    }
    let url = manifest_url(base, identifier).map_err(|e| ManifestError::validation(e.to_string()))?;

    let body = source.fetch(&url, CachePolicy::NoCache).await.map_err(|e| {
        tracing::warn!(url = %url, error = %e, "manifest request failed");
        ManifestError::new(
            ManifestErrorKind::Network,
            "Network error while fetching the artwork manifest.",
        )
    })?;
    if !body.is_success() {
        return Err(ManifestError::not_found(body.status));
    }

    let doc: serde_json::Value = serde_json::from_slice(&body.bytes).map_err(|e| {
        tracing::warn!(url = %url, error = %e, "manifest body is not json");
        ManifestError::new(
            ManifestErrorKind::InvalidJson,
            "Manifest file is not valid JSON.",
        )
    })?;

    let validated = validate_manifest(
        &doc,
        ValidationContext {
            identifier,
            source_url: &url,
        },
    )?;
    tracing::info!(
        title = %validated.manifest.title,
        overlays = validated.manifest.overlays.len(),
        dropped = validated.diagnostics.len(),
        "manifest resolved"
    );
    Ok(validated.manifest)
}

#[cfg(test)]
#[path = "../../tests/unit/manifest/resolve.rs"]
mod tests;
