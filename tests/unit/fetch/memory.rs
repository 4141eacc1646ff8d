use super::*;

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

#[tokio::test]
async fn unknown_urls_are_not_found() {
    let src = MemorySource::new();
    let body = src
        .fetch(&url("https://g.test/missing"), CachePolicy::Default)
        .await
        .unwrap();
    assert_eq!(body.status, 404);
    assert!(!body.is_success());
}

#[tokio::test]
async fn queued_failures_precede_standing_reply() {
    let src = MemorySource::new();
    let u = url("https://g.test/a.png");
    src.insert(&u, b"abc".to_vec())
        .fail_transport(&u, 1, "reset by peer");

    let first = src.fetch(&u, CachePolicy::Default).await;
    assert_eq!(first, Err(FetchError::Transport("reset by peer".to_string())));

    let second = src.fetch(&u, CachePolicy::Default).await.unwrap();
    assert_eq!(second.bytes, b"abc");
    assert_eq!(src.request_count(&u), 2);
}

#[tokio::test]
async fn request_log_records_cache_policy() {
    let src = MemorySource::new();
    let u = url("https://g.test/ar/x/manifest.json");
    src.insert_typed(&u, "application/json", "{}");
    let body = src.fetch(&u, CachePolicy::NoCache).await.unwrap();
    assert_eq!(body.content_type.as_deref(), Some("application/json"));
    assert_eq!(src.requests(), vec![(u, CachePolicy::NoCache)]);
}

#[tokio::test(start_paused = true)]
async fn delayed_replies_wait_for_their_latency() {
    let src = MemorySource::new();
    let u = url("https://g.test/slow.png");
    src.insert(&u, b"x".to_vec())
        .delay(&u, std::time::Duration::from_millis(400));

    let t0 = tokio::time::Instant::now();
    let body = src.fetch(&u, CachePolicy::Default).await.unwrap();
    assert_eq!(body.bytes, b"x");
    assert_eq!(t0.elapsed(), std::time::Duration::from_millis(400));
}
