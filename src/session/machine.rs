use crate::foundation::error::{AssetLoadError, EngineStartError, ManifestError};

/// Tracking sub-state while the engine runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingState {
    Found,
    Lost,
}

/// Why a session ended in [`SessionPhase::Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionFault {
    /// The manifest request answered 404.
    ArtworkNotFound,
    /// Any other manifest failure.
    Manifest,
    /// The target descriptor could not be loaded.
    Preload,
    /// Camera access was refused.
    PermissionDenied,
    /// The engine rejected its start call.
    EngineStart,
    /// The engine did not settle its start call in time.
    EngineTimeout,
    /// The engine reported an error while tracking.
    EngineRuntime,
}

impl SessionFault {
    pub fn from_engine_error(e: &EngineStartError) -> Self {
        match e {
            EngineStartError::PermissionDenied(_) => Self::PermissionDenied,
            EngineStartError::Failed(_) => Self::EngineStart,
            EngineStartError::TimedOut(_) => Self::EngineTimeout,
        }
    }
}

/// Lifecycle phase of a session.
///
/// ```text
/// Idle -> Evaluating -> Unsupported
///                    -> AwaitingIdentifier -> ResolvingManifest
///                    -> ResolvingManifest -> Preloading -> StartingEngine -> Tracking(Lost|Found)
/// any of the last five, or Error, -> ResolvingManifest on a new identifier
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "phase", content = "detail", rename_all = "camelCase")]
pub enum SessionPhase {
    Idle,
    Evaluating,
    /// Terminal until a capability re-check.
    Unsupported,
    AwaitingIdentifier,
    ResolvingManifest,
    Preloading,
    StartingEngine,
    Tracking(TrackingState),
    Error(SessionFault),
}

/// Input to [`SessionPhase::on`].
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    Boot,
    CapabilityEvaluated { supported: bool, has_identifier: bool },
    IdentifierChanged { present: bool },
    ManifestResolved,
    ManifestFailed(ManifestError),
    PreloadFinished { usable_target: bool },
    PreloadFailed(AssetLoadError),
    EngineStarted,
    EngineFailed(EngineStartError),
    TargetFound,
    TargetLost,
    AdvisoryDue,
    EngineFault(String),
    Recheck,
}

/// Work the controller performs for a transition, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    EvaluateCapabilities,
    ReportUnsupported,
    /// Drop everything belonging to the previous identifier.
    TearDown,
    AwaitIdentifier,
    FetchManifest,
    Preload,
    ComposeAndStart,
    AnnounceTracking,
    SetOverlayVisibility(bool),
    ScheduleAdvisory,
    CancelAdvisory,
    ShowAdvisory,
    StopEngine,
    ReportFault(SessionFault),
}

/// Result of applying one event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub next: SessionPhase,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: SessionPhase, effects: impl Into<Vec<Effect>>) -> Self {
        Self {
            next,
            effects: effects.into(),
        }
    }

    fn stay(phase: SessionPhase) -> Self {
        Self::to(phase, Vec::new())
    }

    /// True when the event changed neither the phase nor caused work.
    pub fn is_noop(&self, from: SessionPhase) -> bool {
        self.next == from && self.effects.is_empty()
    }
}

impl SessionPhase {
    /// Apply `event`. Pure; events that do not apply in this phase leave it unchanged with no
    /// effects.
    pub fn on(self, event: &SessionEvent) -> Transition {
        use Effect as E;
        use SessionEvent as Ev;
        use SessionPhase as P;

        match (self, event) {
            (_, Ev::Recheck) => Transition::to(P::Evaluating, [E::TearDown, E::EvaluateCapabilities]),

            // Before a verdict exists the identifier is only recorded.
            (P::Idle | P::Evaluating | P::Unsupported, Ev::IdentifierChanged { .. }) => {
                Transition::stay(self)
            }
            (_, Ev::IdentifierChanged { present: true }) => {
                Transition::to(P::ResolvingManifest, [E::TearDown, E::FetchManifest])
            }
            (_, Ev::IdentifierChanged { present: false }) => {
                Transition::to(P::AwaitingIdentifier, [E::TearDown, E::AwaitIdentifier])
            }

            (P::Idle, Ev::Boot) => Transition::to(P::Evaluating, [E::EvaluateCapabilities]),

            (P::Evaluating, Ev::CapabilityEvaluated { supported: false, .. }) => {
                Transition::to(P::Unsupported, [E::ReportUnsupported])
            }
            (P::Evaluating, Ev::CapabilityEvaluated { has_identifier: true, .. }) => {
                Transition::to(P::ResolvingManifest, [E::FetchManifest])
            }
            (P::Evaluating, Ev::CapabilityEvaluated { .. }) => {
                Transition::to(P::AwaitingIdentifier, [E::AwaitIdentifier])
            }

            (P::ResolvingManifest, Ev::ManifestResolved) => Transition::to(P::Preloading, [E::Preload]),
            (P::ResolvingManifest, Ev::ManifestFailed(e)) => {
                let fault = if e.is_missing_artwork() {
                    SessionFault::ArtworkNotFound
                } else {
                    SessionFault::Manifest
                };
                Transition::to(P::Error(fault), [E::ReportFault(fault)])
            }

            (P::Preloading, Ev::PreloadFinished { usable_target: true }) => {
                Transition::to(P::StartingEngine, [E::ComposeAndStart])
            }
            (P::Preloading, Ev::PreloadFinished { usable_target: false } | Ev::PreloadFailed(_)) => {
                let fault = SessionFault::Preload;
                Transition::to(P::Error(fault), [E::ReportFault(fault)])
            }

            (P::StartingEngine, Ev::EngineStarted) => Transition::to(
                P::Tracking(TrackingState::Lost),
                [E::SetOverlayVisibility(false), E::AnnounceTracking],
            ),
            (P::StartingEngine, Ev::EngineFailed(e)) => {
                let fault = SessionFault::from_engine_error(e);
                Transition::to(P::Error(fault), [E::StopEngine, E::ReportFault(fault)])
            }

            (P::Tracking(TrackingState::Lost), Ev::TargetFound) => Transition::to(
                P::Tracking(TrackingState::Found),
                [E::CancelAdvisory, E::SetOverlayVisibility(true)],
            ),
            (P::Tracking(TrackingState::Found), Ev::TargetLost) => Transition::to(
                P::Tracking(TrackingState::Lost),
                [E::SetOverlayVisibility(false), E::ScheduleAdvisory],
            ),
            (P::Tracking(TrackingState::Lost), Ev::AdvisoryDue) => Transition::to(self, [E::ShowAdvisory]),
            (P::Tracking(_), Ev::EngineFault(_)) => {
                let fault = SessionFault::EngineRuntime;
                Transition::to(
                    P::Error(fault),
                    [
                        E::CancelAdvisory,
                        E::SetOverlayVisibility(false),
                        E::StopEngine,
                        E::ReportFault(fault),
                    ],
                )
            }

            _ => Transition::stay(self),
        }
    }

    pub fn is_tracking(self) -> bool {
        matches!(self, Self::Tracking(_))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Evaluating => "evaluating",
            Self::Unsupported => "unsupported",
            Self::AwaitingIdentifier => "awaiting_identifier",
            Self::ResolvingManifest => "resolving_manifest",
            Self::Preloading => "preloading",
            Self::StartingEngine => "starting_engine",
            Self::Tracking(TrackingState::Found) => "tracking_found",
            Self::Tracking(TrackingState::Lost) => "tracking_lost",
            Self::Error(_) => "error",
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/machine.rs"]
mod tests;
