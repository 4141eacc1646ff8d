use std::time::Duration;

use super::*;
use crate::foundation::error::ManifestErrorKind;

fn run(mut phase: SessionPhase, events: &[SessionEvent]) -> (SessionPhase, Vec<Effect>) {
    let mut effects = Vec::new();
    for e in events {
        let t = phase.on(e);
        phase = t.next;
        effects.extend(t.effects);
    }
    (phase, effects)
}

fn not_found() -> ManifestError {
    ManifestError {
        kind: ManifestErrorKind::NotFound,
        status: Some(404),
        message: "Manifest not found (HTTP 404).".to_string(),
    }
}

#[test]
fn happy_path_reaches_tracking_lost() {
    let (phase, effects) = run(
        SessionPhase::Idle,
        &[
            SessionEvent::Boot,
            SessionEvent::CapabilityEvaluated {
                supported: true,
                has_identifier: true,
            },
            SessionEvent::ManifestResolved,
            SessionEvent::PreloadFinished {
                usable_target: true,
            },
            SessionEvent::EngineStarted,
        ],
    );
    assert_eq!(phase, SessionPhase::Tracking(TrackingState::Lost));
    assert_eq!(
        effects,
        vec![
            Effect::EvaluateCapabilities,
            Effect::FetchManifest,
            Effect::Preload,
            Effect::ComposeAndStart,
            Effect::SetOverlayVisibility(false),
            Effect::AnnounceTracking,
        ]
    );
}

#[test]
fn unsupported_is_terminal_until_recheck() {
    let (phase, _) = run(
        SessionPhase::Idle,
        &[
            SessionEvent::Boot,
            SessionEvent::CapabilityEvaluated {
                supported: false,
                has_identifier: true,
            },
        ],
    );
    assert_eq!(phase, SessionPhase::Unsupported);

    for e in [
        SessionEvent::IdentifierChanged { present: true },
        SessionEvent::ManifestResolved,
        SessionEvent::TargetFound,
    ] {
        assert!(phase.on(&e).is_noop(phase), "{e:?} should be ignored");
    }

    let t = phase.on(&SessionEvent::Recheck);
    assert_eq!(t.next, SessionPhase::Evaluating);
    assert_eq!(t.effects, vec![Effect::TearDown, Effect::EvaluateCapabilities]);
}

#[test]
fn missing_identifier_waits_passively() {
    let (phase, effects) = run(
        SessionPhase::Evaluating,
        &[SessionEvent::CapabilityEvaluated {
            supported: true,
            has_identifier: false,
        }],
    );
    assert_eq!(phase, SessionPhase::AwaitingIdentifier);
    assert_eq!(effects, vec![Effect::AwaitIdentifier]);

    let t = phase.on(&SessionEvent::IdentifierChanged { present: true });
    assert_eq!(t.next, SessionPhase::ResolvingManifest);
    assert_eq!(t.effects, vec![Effect::TearDown, Effect::FetchManifest]);
}

#[test]
fn new_identifier_tears_down_from_every_active_phase() {
    for phase in [
        SessionPhase::AwaitingIdentifier,
        SessionPhase::ResolvingManifest,
        SessionPhase::Preloading,
        SessionPhase::StartingEngine,
        SessionPhase::Tracking(TrackingState::Found),
        SessionPhase::Tracking(TrackingState::Lost),
        SessionPhase::Error(SessionFault::ArtworkNotFound),
    ] {
        let t = phase.on(&SessionEvent::IdentifierChanged { present: true });
        assert_eq!(t.next, SessionPhase::ResolvingManifest, "from {phase:?}");
        assert_eq!(t.effects[0], Effect::TearDown);
    }
}

#[test]
fn manifest_not_found_is_distinguished() {
    let t = SessionPhase::ResolvingManifest.on(&SessionEvent::ManifestFailed(not_found()));
    assert_eq!(t.next, SessionPhase::Error(SessionFault::ArtworkNotFound));

    let mut other = not_found();
    other.status = Some(500);
    let t = SessionPhase::ResolvingManifest.on(&SessionEvent::ManifestFailed(other));
    assert_eq!(t.next, SessionPhase::Error(SessionFault::Manifest));
}

#[test]
fn unusable_target_never_starts_engine() {
    let t = SessionPhase::Preloading.on(&SessionEvent::PreloadFinished {
        usable_target: false,
    });
    assert_eq!(t.next, SessionPhase::Error(SessionFault::Preload));
    assert!(!t.effects.contains(&Effect::ComposeAndStart));
}

#[test]
fn engine_failures_are_classified() {
    let cases = [
        (
            EngineStartError::classify("NotAllowedError", "Permission denied"),
            SessionFault::PermissionDenied,
        ),
        (
            EngineStartError::Failed("no webgl".into()),
            SessionFault::EngineStart,
        ),
        (
            EngineStartError::TimedOut(Duration::from_secs(20)),
            SessionFault::EngineTimeout,
        ),
    ];
    for (err, fault) in cases {
        let t = SessionPhase::StartingEngine.on(&SessionEvent::EngineFailed(err));
        assert_eq!(t.next, SessionPhase::Error(fault));
        assert_eq!(t.effects, vec![Effect::StopEngine, Effect::ReportFault(fault)]);
    }
}

#[test]
fn found_lost_found_cancels_advisory() {
    let (phase, effects) = run(
        SessionPhase::Tracking(TrackingState::Lost),
        &[
            SessionEvent::TargetFound,
            SessionEvent::TargetLost,
            SessionEvent::TargetFound,
        ],
    );
    assert_eq!(phase, SessionPhase::Tracking(TrackingState::Found));
    assert_eq!(
        effects,
        vec![
            Effect::CancelAdvisory,
            Effect::SetOverlayVisibility(true),
            Effect::SetOverlayVisibility(false),
            Effect::ScheduleAdvisory,
            Effect::CancelAdvisory,
            Effect::SetOverlayVisibility(true),
        ]
    );
}

#[test]
fn repeated_signals_do_not_stack() {
    let lost = SessionPhase::Tracking(TrackingState::Lost);
    assert!(lost.on(&SessionEvent::TargetLost).is_noop(lost));
    let found = SessionPhase::Tracking(TrackingState::Found);
    assert!(found.on(&SessionEvent::TargetFound).is_noop(found));
    assert!(found.on(&SessionEvent::AdvisoryDue).is_noop(found));
    assert_eq!(
        lost.on(&SessionEvent::AdvisoryDue).effects,
        vec![Effect::ShowAdvisory]
    );
}

#[test]
fn runtime_fault_stops_the_engine() {
    let t = SessionPhase::Tracking(TrackingState::Found)
        .on(&SessionEvent::EngineFault("context lost".into()));
    assert_eq!(t.next, SessionPhase::Error(SessionFault::EngineRuntime));
    assert!(t.effects.contains(&Effect::StopEngine));
    assert!(t.effects.contains(&Effect::SetOverlayVisibility(false)));
}
