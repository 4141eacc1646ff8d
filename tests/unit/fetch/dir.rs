use super::*;

fn gallery() -> (tempfile::TempDir, DirSource) {
    let dir = tempfile::tempdir().unwrap();
    let art = dir.path().join("ar").join("demo");
    std::fs::create_dir_all(&art).unwrap();
    std::fs::write(art.join("manifest.json"), br#"{"title":"Demo"}"#).unwrap();
    let src = DirSource::local(dir.path()).unwrap();
    (dir, src)
}

#[tokio::test]
async fn serves_files_below_root() {
    let (_dir, src) = gallery();
    let url = src.origin().join("ar/demo/manifest.json").unwrap();
    let body = src.fetch(&url, CachePolicy::NoCache).await.unwrap();
    assert_eq!(body.status, 200);
    assert_eq!(body.content_type.as_deref(), Some("application/json"));
    assert_eq!(body.bytes, br#"{"title":"Demo"}"#);
}

#[tokio::test]
async fn missing_files_and_directories_are_not_found() {
    let (_dir, src) = gallery();
    let missing = src.origin().join("ar/nope/manifest.json").unwrap();
    assert_eq!(src.fetch(&missing, CachePolicy::Default).await.unwrap().status, 404);

    let dir_url = src.origin().join("ar/demo/").unwrap();
    assert_eq!(src.fetch(&dir_url, CachePolicy::Default).await.unwrap().status, 404);
}

#[tokio::test]
async fn encoded_traversal_is_refused() {
    let (_dir, src) = gallery();
    let url = src.origin().join("ar/..%2F..%2Fetc%2Fpasswd").unwrap();
    assert_eq!(src.fetch(&url, CachePolicy::Default).await.unwrap().status, 403);
}

#[tokio::test]
async fn foreign_origins_are_unsupported() {
    let (_dir, src) = gallery();
    let url = Url::parse("https://elsewhere.test/ar/demo/manifest.json").unwrap();
    assert!(matches!(
        src.fetch(&url, CachePolicy::Default).await,
        Err(FetchError::Unsupported(_))
    ));
}
