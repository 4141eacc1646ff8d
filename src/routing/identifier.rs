use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use url::Url;

use crate::foundation::error::{GalleryError, GalleryResult};

/// Path segment that precedes the identifier in gallery URLs.
pub const MARKER_SEGMENT: &str = "ar";
/// Query parameter consulted when the path carries no identifier.
pub const QUERY_PARAM: &str = "slug";

// `encodeURIComponent` leaves these unescaped.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Extract the artwork identifier from a page location.
///
/// Looks for the segment after `/ar/`, then for a `slug` query parameter. The raw value is
/// percent-decoded, stripped of a trailing `.html` and every character outside
/// `[A-Za-z0-9-_]` becomes `-`.
pub fn extract_identifier(location: &Url) -> Option<String> {
    let from_path = location.path_segments().and_then(|segments| {
        let segments: Vec<&str> = segments.filter(|s| !s.is_empty()).collect();
        let marker = segments.iter().position(|s| *s == MARKER_SEGMENT)?;
        segments
            .get(marker + 1)
            .map(|raw| percent_decode_str(raw).decode_utf8_lossy().into_owned())
    });

    let raw = from_path.or_else(|| {
        location
            .query_pairs()
            .find(|(k, v)| k == QUERY_PARAM && !v.is_empty())
            .map(|(_, v)| v.into_owned())
    })?;

    let sanitized = sanitize_identifier(&raw);
    if sanitized.is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// Strip a trailing `.html` (any case) and replace characters outside `[A-Za-z0-9-_]` with `-`.
pub fn sanitize_identifier(raw: &str) -> String {
    let trimmed = match raw.len().checked_sub(5) {
        Some(cut) if raw.is_char_boundary(cut) && raw[cut..].eq_ignore_ascii_case(".html") => {
            &raw[..cut]
        }
        _ => raw,
    };
    trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Percent-encode an identifier for use as a single path segment.
pub fn encode_identifier(identifier: &str) -> String {
    utf8_percent_encode(identifier, COMPONENT).to_string()
}

/// Canonical site-relative path of an artwork page: `/ar/<identifier>/`.
pub fn canonical_path(identifier: &str) -> String {
    format!("/{MARKER_SEGMENT}/{}/", encode_identifier(identifier))
}

/// Rewrite `location` into the canonical page URL for `identifier`.
///
/// Any path prefix in front of the marker segment is kept (galleries hosted below the origin
/// root); without a marker, `ar/<identifier>/` is appended to the current path. The
/// `slug` query parameter is dropped, other parameters and the fragment survive. Returns
/// `None` when `location` is already canonical.
pub fn canonical_location(location: &Url, identifier: &str) -> Option<Url> {
    let segments: Vec<&str> = location
        .path_segments()
        .map(|s| s.collect())
        .unwrap_or_default();

    let mut base: Vec<&str> = match segments.iter().position(|s| *s == MARKER_SEGMENT) {
        Some(marker) => segments[..marker].to_vec(),
        None => segments.clone(),
    };
    base.retain(|s| !s.is_empty());

    let mut path = String::from("/");
    for seg in &base {
        path.push_str(seg);
        path.push('/');
    }
    path.push_str(MARKER_SEGMENT);
    path.push('/');
    path.push_str(&encode_identifier(identifier));
    path.push('/');

    let had_slug_param = location.query_pairs().any(|(k, _)| k == QUERY_PARAM);
    if location.path() == path && !had_slug_param {
        return None;
    }

    let kept: Vec<(String, String)> = location
        .query_pairs()
        .filter(|(k, _)| k != QUERY_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut out = location.clone();
    out.set_path(&path);
    if kept.is_empty() {
        out.set_query(None);
    } else {
        out.query_pairs_mut().clear().extend_pairs(kept);
    }
    Some(out)
}

/// Manifest location for `identifier` below `base`: `<base>/ar/<identifier>/manifest.json`.
pub fn manifest_url(base: &Url, identifier: &str) -> GalleryResult<Url> {
    if identifier.is_empty() {
        return Err(GalleryError::validation("identifier must be non-empty"));
    }
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| GalleryError::validation(format!("'{base}' cannot be a base url")))?;
        segments
            .pop_if_empty()
            .extend([MARKER_SEGMENT, identifier, "manifest.json"]);
    }
    Ok(url)
}

#[cfg(test)]
#[path = "../../tests/unit/routing/identifier.rs"]
mod tests;
