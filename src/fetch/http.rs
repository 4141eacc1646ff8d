use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use url::Url;

use crate::{
    fetch::source::{AssetSource, CachePolicy, FetchedBody},
    foundation::error::FetchError,
};

/// [`AssetSource`] backed by a `reqwest` HTTP client.
#[derive(Clone, Debug, Default)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse an existing client (connection pool, proxies, TLS roots).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl AssetSource for HttpSource {
    async fn fetch(&self, url: &Url, cache: CachePolicy) -> Result<FetchedBody, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::Unsupported(url.to_string()));
        }

        let mut req = self.client.get(url.clone());
        if cache == CachePolicy::NoCache {
            req = req.header(CACHE_CONTROL, "no-cache").header(PRAGMA, "no-cache");
        }

        let resp = req
            .send()
            .await
            .map_err(|e| FetchError::Transport(format_reqwest_error(e)))?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(format_reqwest_error(e)))?;

        Ok(FetchedBody {
            status,
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}

// Credentials embedded in asset URLs must not reach the logs.
fn format_reqwest_error(err: reqwest::Error) -> String {
    let mut msg = err.to_string();
    if let Some(url) = err.url() {
        let mut redacted = url.clone();
        let _ = redacted.set_username("");
        let _ = redacted.set_password(None);
        redacted.set_query(None);
        msg = msg.replace(url.as_str(), redacted.as_str());
    }
    msg
}
