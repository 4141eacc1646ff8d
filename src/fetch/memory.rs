use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
    time::Duration,
};

use url::Url;

use crate::{
    fetch::source::{AssetSource, CachePolicy, FetchedBody},
    foundation::error::FetchError,
};

#[derive(Clone, Debug)]
enum Reply {
    Body(FetchedBody),
    Transport(String),
}

#[derive(Debug, Default)]
struct Routes {
    // Queued one-shot replies are served before the standing reply.
    queued: HashMap<String, VecDeque<Reply>>,
    standing: HashMap<String, Reply>,
    latency: HashMap<String, Duration>,
    log: Vec<(Url, CachePolicy)>,
}

/// In-memory [`AssetSource`] with scripted replies and a request log.
///
/// Unknown URLs answer `404`.
#[derive(Debug, Default)]
pub struct MemorySource {
    routes: Mutex<Routes>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` with status 200 for every request to `url`.
    pub fn insert(&self, url: &Url, bytes: impl Into<Vec<u8>>) -> &Self {
        self.insert_reply(url, Reply::Body(FetchedBody::ok(bytes)))
    }

    /// Serve `bytes` with an explicit content type.
    pub fn insert_typed(&self, url: &Url, content_type: &str, bytes: impl Into<Vec<u8>>) -> &Self {
        let body = FetchedBody {
            content_type: Some(content_type.to_string()),
            ..FetchedBody::ok(bytes)
        };
        self.insert_reply(url, Reply::Body(body))
    }

    /// Answer every request to `url` with an empty body and `status`.
    pub fn insert_status(&self, url: &Url, status: u16) -> &Self {
        self.insert_reply(url, Reply::Body(FetchedBody::status(status)))
    }

    /// Fail the next `times` requests to `url` at the transport level.
    pub fn fail_transport(&self, url: &Url, times: usize, message: &str) -> &Self {
        let mut routes = self.lock();
        let queue = routes.queued.entry(url.to_string()).or_default();
        for _ in 0..times {
            queue.push_back(Reply::Transport(message.to_string()));
        }
        drop(routes);
        self
    }

    /// Hold every reply for `url` back by `latency`.
    pub fn delay(&self, url: &Url, latency: Duration) -> &Self {
        self.lock().latency.insert(url.to_string(), latency);
        self
    }

    /// Every request seen so far, in arrival order.
    pub fn requests(&self) -> Vec<(Url, CachePolicy)> {
        self.lock().log.clone()
    }

    /// Number of requests seen for `url`.
    pub fn request_count(&self, url: &Url) -> usize {
        self.lock().log.iter().filter(|(u, _)| u == url).count()
    }

    fn insert_reply(&self, url: &Url, reply: Reply) -> &Self {
        self.lock().standing.insert(url.to_string(), reply);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Routes> {
        // A panic while holding the lock only happens in a failing test; keep serving.
        self.routes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl AssetSource for MemorySource {
    async fn fetch(&self, url: &Url, cache: CachePolicy) -> Result<FetchedBody, FetchError> {
        let (reply, latency) = {
            let mut routes = self.lock();
            routes.log.push((url.clone(), cache));
            let key = url.to_string();
            let queued = routes.queued.get_mut(&key).and_then(VecDeque::pop_front);
            let reply = queued.or_else(|| routes.standing.get(&key).cloned());
            (reply, routes.latency.get(&key).copied())
        };
        match latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
        match reply {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Transport(msg)) => Err(FetchError::Transport(msg)),
            None => Ok(FetchedBody::status(404)),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/fetch/memory.rs"]
mod tests;
