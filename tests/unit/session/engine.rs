use super::*;

fn target() -> TargetConfig {
    TargetConfig {
        target_url: Url::parse("https://g.test/ar/x/target.mind").unwrap(),
        descriptor: Arc::new(vec![1, 2, 3]),
    }
}

#[test]
fn script_parsing() {
    let steps = parse_script(
        "lost@1200, found@500,ready@0,fault:camera unplugged@2000,overlay-failed:bird@2500",
    )
    .unwrap();
    let signals: Vec<_> = steps.iter().map(|s| s.signal.clone()).collect();
    assert_eq!(
        signals,
        vec![
            TrackingSignal::Ready,
            TrackingSignal::TargetFound,
            TrackingSignal::TargetLost,
            TrackingSignal::Fault("camera unplugged".to_string()),
            TrackingSignal::OverlayFailed("bird".to_string()),
        ]
    );
    assert_eq!(steps[1].after, Duration::from_millis(500));
    assert!(parse_script("").unwrap().is_empty());
    assert!(parse_script("found").is_err());
    assert!(parse_script("wave@10").is_err());
    assert!(parse_script("found@soon").is_err());
}

#[test]
fn source_config_names_the_target() {
    assert_eq!(
        target().source_config(),
        "autoStart: true; imageTargetSrc: https://g.test/ar/x/target.mind"
    );
}

#[tokio::test(start_paused = true)]
async fn replays_signals_on_schedule() {
    let engine: ReplayEngine = "found@500,lost@1200".parse().unwrap();
    let mut events = engine.start(&target()).await.unwrap();
    let t0 = tokio::time::Instant::now();

    assert_eq!(events.recv().await, Some(TrackingSignal::TargetFound));
    assert_eq!(t0.elapsed(), Duration::from_millis(500));
    assert_eq!(events.recv().await, Some(TrackingSignal::TargetLost));
    assert_eq!(t0.elapsed(), Duration::from_millis(1200));
    assert_eq!(events.recv().await, None);
}

#[tokio::test(start_paused = true)]
async fn stop_closes_the_stream() {
    let engine: ReplayEngine = "found@500".parse().unwrap();
    let mut events = engine.start(&target()).await.unwrap();
    assert!(engine.is_running());
    engine.stop();
    assert_eq!(events.recv().await, None);
    assert_eq!(engine.calls().last(), Some(&EngineCall::Stop));
}

#[tokio::test]
async fn rejection_is_classified() {
    let engine = ReplayEngine::new(Vec::new()).with_behavior(StartBehavior::Reject {
        name: "NotAllowedError".to_string(),
        message: "Permission denied".to_string(),
    });
    let err = engine.start(&target()).await.unwrap_err();
    assert!(err.is_permission_denied());
}

#[tokio::test(start_paused = true)]
async fn stalled_start_never_settles() {
    let engine = ReplayEngine::new(Vec::new()).with_behavior(StartBehavior::Stall);
    let res = tokio::time::timeout(Duration::from_secs(60), engine.start(&target())).await;
    assert!(res.is_err());
}

#[tokio::test(start_paused = true)]
async fn delayed_start_settles_after_the_wait() {
    let engine = ReplayEngine::new(Vec::new())
        .with_behavior(StartBehavior::Delay(Duration::from_millis(750)));
    let t0 = tokio::time::Instant::now();
    let mut events = engine.start(&target()).await.unwrap();
    assert_eq!(t0.elapsed(), Duration::from_millis(750));
    assert_eq!(events.recv().await, None);
}
