use std::path::{Path, PathBuf};

use anyhow::Context;
use percent_encoding::percent_decode_str;
use url::Url;

use crate::{
    fetch::source::{AssetSource, CachePolicy, FetchedBody},
    foundation::error::{FetchError, GalleryResult},
};

/// Origin under which [`DirSource`] serves its directory.
pub const LOCAL_ORIGIN: &str = "http://gallery.local/";

/// [`AssetSource`] serving a gallery laid out on disk.
///
/// With [`DirSource::local`], `http://gallery.local/ar/demo/manifest.json` maps to
/// `<root>/ar/demo/manifest.json`.
/// Missing files answer `404`; paths escaping the root answer `403`.
#[derive(Clone, Debug)]
pub struct DirSource {
    root: PathBuf,
    origin: Url,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>, origin: Url) -> Self {
        Self {
            root: root.into(),
            origin,
        }
    }

    /// Serve `root` under [`LOCAL_ORIGIN`].
    pub fn local(root: impl Into<PathBuf>) -> GalleryResult<Self> {
        let origin = Url::parse(LOCAL_ORIGIN).context("parse local gallery origin")?;
        Ok(Self::new(root, origin))
    }

    /// Base URL to resolve manifests against.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn local_path(&self, url: &Url) -> Result<Option<PathBuf>, FetchError> {
        if url.origin() != self.origin.origin() {
            return Err(FetchError::Unsupported(url.to_string()));
        }
        let mut path = self.root.clone();
        for raw in url.path_segments().into_iter().flatten() {
            if raw.is_empty() {
                continue;
            }
            let seg = percent_decode_str(raw).decode_utf8_lossy();
            if seg == "." || seg == ".." || seg.contains(['/', '\\']) {
                return Ok(None);
            }
            path.push(seg.as_ref());
        }
        Ok(Some(path))
    }
}

impl AssetSource for DirSource {
    async fn fetch(&self, url: &Url, _cache: CachePolicy) -> Result<FetchedBody, FetchError> {
        let Some(path) = self.local_path(url)? else {
            return Ok(FetchedBody::status(403));
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(FetchedBody {
                status: 200,
                content_type: content_type_for(&path).map(str::to_string),
                bytes,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FetchedBody::status(404)),
            Err(e) if e.kind() == std::io::ErrorKind::IsADirectory => Ok(FetchedBody::status(404)),
            Err(e) => Err(FetchError::Transport(format!(
                "read '{}': {e}",
                path.display()
            ))),
        }
    }
}

fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "json" => "application/json",
        "png" | "apng" => "image/png",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "tga" => "image/x-tga",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    })
}

#[cfg(test)]
#[path = "../../tests/unit/fetch/dir.rs"]
mod tests;
