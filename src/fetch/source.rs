use std::rc::Rc;

use url::Url;

use crate::foundation::error::FetchError;

/// Cache behaviour requested for a single retrieval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CachePolicy {
    /// Any cached copy is acceptable.
    Default,
    /// Revalidate with the origin (manifests).
    NoCache,
}

/// Response to a retrieval. Non-2xx statuses are responses, not errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedBody {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header, when present.
    pub content_type: Option<String>,
    /// Full body.
    pub bytes: Vec<u8>,
}

impl FetchedBody {
    pub fn ok(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            bytes: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Byte source for manifests and assets.
///
/// Implementations only report transport failures as errors; the caller decides what a given
/// status means.
#[allow(async_fn_in_trait)]
pub trait AssetSource {
    /// Retrieve `url` under `cache`.
    async fn fetch(&self, url: &Url, cache: CachePolicy) -> Result<FetchedBody, FetchError>;
}

impl<T: AssetSource> AssetSource for Rc<T> {
    async fn fetch(&self, url: &Url, cache: CachePolicy) -> Result<FetchedBody, FetchError> {
        (**self).fetch(url, cache).await
    }
}

impl<T: AssetSource> AssetSource for &T {
    async fn fetch(&self, url: &Url, cache: CachePolicy) -> Result<FetchedBody, FetchError> {
        (**self).fetch(url, cache).await
    }
}
