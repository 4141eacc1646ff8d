use std::{cell::Cell, collections::VecDeque, rc::Rc, sync::Arc};

use futures_util::{
    FutureExt, StreamExt,
    future::LocalBoxFuture,
    stream::FuturesUnordered,
};
use tokio::{
    sync::mpsc,
    time::Instant,
};
use url::Url;

use crate::{
    assets::{
        audit::{audit_preload, unavailable_overlay_warning},
        decode::StagingArea,
        preload::{ByteStats, PreloadOpts, PreloadResult, ProgressEvent, preload},
    },
    capability::evaluate::{CapabilityVector, SupportEvaluation, SupportOverrides, evaluate},
    compose::compositor::{OverlayDisplayEntry, compose, planes, set_visibility},
    fetch::source::AssetSource,
    foundation::{
        config::SessionOpts,
        error::{AssetLoadError, EngineStartError, ManifestError},
    },
    manifest::{model::Manifest, resolve::fetch_manifest},
    routing::identifier::sanitize_identifier,
    session::{
        engine::{TargetConfig, TrackingEngine, TrackingEvents, TrackingSignal},
        machine::{Effect, SessionEvent, SessionFault, SessionPhase},
        signals::{self, REACQUIRE_ADVISORY, SessionSignal, WarningSet},
    },
};

/// External input to [`SessionController::run`].
#[derive(Clone, Debug, PartialEq)]
pub enum SessionInput {
    /// The current identifier changed (`None` when the location carries none).
    Navigate(Option<String>),
    /// Re-run the capability check with new overrides.
    Recheck(SupportOverrides),
    Shutdown,
}

/// Serializable view of a session, for debugging.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub identifier: Option<String>,
    pub evaluation: Option<SupportEvaluation>,
    pub title: Option<String>,
    pub tracking_started: bool,
    /// Overlay ids in display order.
    pub overlays: Vec<String>,
    pub failed_overlays: Vec<String>,
    pub warnings: Vec<String>,
    pub byte_stats: Option<ByteStats>,
}

enum StageResult {
    Manifest(Result<Manifest, ManifestError>),
    Preload(Result<PreloadResult, AssetLoadError>),
    Engine(Result<TrackingEvents, EngineStartError>),
}

struct StageOutcome {
    epoch: u64,
    result: StageResult,
}

enum Wake {
    Stage(StageOutcome),
    Tracking(Option<TrackingSignal>),
    Advisory,
}

// Everything tied to the current identifier; replaced wholesale on teardown.
#[derive(Default)]
struct SessionState {
    manifest: Option<Manifest>,
    preload: Option<PreloadResult>,
    entries: Vec<OverlayDisplayEntry>,
    warnings: WarningSet,
    engine_engaged: bool,
    tracking_started: bool,
    tracking: Option<TrackingEvents>,
    advisory_deadline: Option<Instant>,
    advisory_shown: bool,
    last_error: Option<String>,
}

/// Drives one AR session: capability gate, manifest, preload, engine start and tracking.
///
/// Single-threaded. Stage work (manifest fetch, preload, engine start) runs as local futures
/// tagged with the epoch they were started in; each teardown bumps the epoch, so results and
/// progress from an earlier identifier are dropped instead of touching the current state.
pub struct SessionController<S, E> {
    source: Rc<S>,
    engine: Rc<E>,
    base_url: Url,
    vector: CapabilityVector,
    overrides: SupportOverrides,
    evaluation: Option<SupportEvaluation>,
    opts: SessionOpts,
    staging: StagingArea,
    identifier: Option<String>,
    phase: SessionPhase,
    state: SessionState,
    epoch: Rc<Cell<u64>>,
    stages: FuturesUnordered<LocalBoxFuture<'static, StageOutcome>>,
    signals: mpsc::UnboundedSender<SessionSignal>,
}

impl<S, E> SessionController<S, E>
where
    S: AssetSource + 'static,
    E: TrackingEngine + 'static,
{
    /// Create an idle controller and the receiving end of its signal channel.
    pub fn new(
        source: Rc<S>,
        engine: Rc<E>,
        base_url: Url,
        vector: CapabilityVector,
        opts: SessionOpts,
    ) -> (Self, mpsc::UnboundedReceiver<SessionSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            source,
            engine,
            base_url,
            vector,
            overrides: SupportOverrides::default(),
            evaluation: None,
            opts,
            staging: StagingArea::new(),
            identifier: None,
            phase: SessionPhase::Idle,
            state: SessionState::default(),
            epoch: Rc::new(Cell::new(0)),
            stages: FuturesUnordered::new(),
            signals: tx,
        };
        (controller, rx)
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn evaluation(&self) -> Option<&SupportEvaluation> {
        self.evaluation.as_ref()
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.state.manifest.as_ref()
    }

    pub fn preload_result(&self) -> Option<&PreloadResult> {
        self.state.preload.as_ref()
    }

    /// Active display entries, in display order.
    pub fn display_entries(&self) -> &[OverlayDisplayEntry] {
        &self.state.entries
    }

    pub fn warnings(&self) -> &[String] {
        self.state.warnings.as_slice()
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// True while the reacquire advisory is armed.
    pub fn advisory_pending(&self) -> bool {
        self.state.advisory_deadline.is_some()
    }

    /// Nothing is in flight: no stage, no tracking stream, no armed advisory.
    pub fn is_quiescent(&self) -> bool {
        self.stages.is_empty()
            && self.state.tracking.is_none()
            && self.state.advisory_deadline.is_none()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            identifier: self.identifier.clone(),
            evaluation: self.evaluation.clone(),
            title: self.state.manifest.as_ref().map(|m| m.title.clone()),
            tracking_started: self.state.tracking_started,
            overlays: self
                .state
                .entries
                .iter()
                .map(|e| e.overlay.id.clone())
                .collect(),
            failed_overlays: self
                .state
                .preload
                .as_ref()
                .map(|p| p.failed_overlays.iter().map(|f| f.overlay.id.clone()).collect())
                .unwrap_or_default(),
            warnings: self.state.warnings.to_vec(),
            byte_stats: self.state.preload.as_ref().map(|p| p.stats),
        }
    }

    /// Start the session: evaluate capabilities, then resolve `identifier` if there is one.
    pub fn boot(&mut self, overrides: SupportOverrides, identifier: Option<String>) {
        self.overrides = overrides;
        self.identifier = clean_identifier(identifier);
        self.dispatch(SessionEvent::Boot);
    }

    /// Make `identifier` current. Re-navigating to the current identifier only retries after
    /// an error.
    pub fn navigate(&mut self, identifier: Option<String>) {
        let identifier = clean_identifier(identifier);
        if identifier == self.identifier && !matches!(self.phase, SessionPhase::Error(_)) {
            tracing::debug!(?identifier, "identifier unchanged");
            return;
        }
        let present = identifier.is_some();
        self.identifier = identifier;
        self.dispatch(SessionEvent::IdentifierChanged { present });
    }

    /// Re-run the capability check under `overrides`, restarting the session.
    pub fn recheck(&mut self, overrides: SupportOverrides) {
        self.overrides = overrides;
        self.dispatch(SessionEvent::Recheck);
    }

    /// Stop the engine and drop everything in flight.
    pub fn shutdown(&mut self) {
        self.epoch.set(self.epoch.get() + 1);
        self.stop_engine();
        self.stages = FuturesUnordered::new();
        tracing::info!(phase = self.phase.name(), "session shut down");
    }

    /// Feed one tracking signal, as if delivered by the engine stream.
    pub fn on_tracking(&mut self, signal: TrackingSignal) {
        match signal {
            TrackingSignal::Ready => tracing::debug!("tracking engine ready"),
            TrackingSignal::TargetFound => self.dispatch(SessionEvent::TargetFound),
            TrackingSignal::TargetLost => self.dispatch(SessionEvent::TargetLost),
            TrackingSignal::OverlayFailed(id) => {
                tracing::warn!(overlay = %id, "engine could not display overlay");
                if self.state.warnings.insert(unavailable_overlay_warning(&id)) {
                    self.emit_warnings();
                }
            }
            TrackingSignal::Fault(detail) => {
                tracing::error!(%detail, "tracking engine fault");
                self.state.last_error = Some(detail.clone());
                self.dispatch(SessionEvent::EngineFault(detail));
            }
        }
    }

    /// Wait for the next stage completion, tracking signal or advisory deadline and handle it.
    /// Returns false when nothing is pending.
    pub async fn step(&mut self) -> bool {
        match self.next_wake().await {
            Some(wake) => {
                self.handle_wake(wake);
                true
            }
            None => false,
        }
    }

    /// Handle everything pending until the session is quiescent.
    ///
    /// With an open tracking stream this returns only once the engine closes it.
    pub async fn drive_until_idle(&mut self) {
        while self.step().await {}
    }

    /// Event loop: external inputs, stage completions, tracking signals and the advisory timer.
    ///
    /// Returns on [`SessionInput::Shutdown`], or once `inputs` is closed and the session is
    /// quiescent.
    pub async fn run(&mut self, mut inputs: mpsc::UnboundedReceiver<SessionInput>) {
        let mut inputs_open = true;
        loop {
            let quiescent = self.is_quiescent();
            if quiescent && !inputs_open {
                break;
            }
            tokio::select! {
                input = inputs.recv(), if inputs_open => match input {
                    Some(SessionInput::Navigate(id)) => self.navigate(id),
                    Some(SessionInput::Recheck(overrides)) => self.recheck(overrides),
                    Some(SessionInput::Shutdown) => {
                        self.shutdown();
                        break;
                    }
                    None => inputs_open = false,
                },
                wake = self.next_wake(), if !quiescent => {
                    if let Some(wake) = wake {
                        self.handle_wake(wake);
                    }
                }
            }
        }
    }

    async fn next_wake(&mut self) -> Option<Wake> {
        let has_stages = !self.stages.is_empty();
        let deadline = self.state.advisory_deadline;
        let tracking = self.state.tracking.as_mut();
        let has_tracking = tracking.is_some();
        tokio::select! {
            Some(outcome) = self.stages.next(), if has_stages => Some(Wake::Stage(outcome)),
            signal = recv_tracking(tracking), if has_tracking => Some(Wake::Tracking(signal)),
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                Some(Wake::Advisory)
            }
            else => None,
        }
    }

    fn handle_wake(&mut self, wake: Wake) {
        match wake {
            Wake::Stage(outcome) => self.on_stage(outcome),
            Wake::Tracking(Some(signal)) => self.on_tracking(signal),
            Wake::Tracking(None) => {
                tracing::debug!("tracking stream closed");
                self.state.tracking = None;
            }
            Wake::Advisory => {
                self.state.advisory_deadline = None;
                self.dispatch(SessionEvent::AdvisoryDue);
            }
        }
    }

    fn on_stage(&mut self, outcome: StageOutcome) {
        if outcome.epoch != self.epoch.get() {
            tracing::debug!(
                stale = outcome.epoch,
                current = self.epoch.get(),
                "dropping stale stage result"
            );
            if let StageResult::Engine(Ok(_)) = outcome.result {
                if !matches!(self.phase, SessionPhase::StartingEngine | SessionPhase::Tracking(_)) {
                    self.engine.stop();
                }
            }
            return;
        }

        match outcome.result {
            StageResult::Manifest(Ok(manifest)) => {
                self.emit(SessionSignal::Title {
                    title: manifest.title.clone(),
                });
                self.emit(SessionSignal::ErrorView { view: None });
                self.emit(SessionSignal::Footer {
                    about_link: manifest.about_link.as_deref().and_then(|l| manifest.resolve(l)),
                });
                self.emit(SessionSignal::FallbackVideo {
                    url: manifest.fallback_video_url(),
                });
                self.state.manifest = Some(manifest);
                self.dispatch(SessionEvent::ManifestResolved);
            }
            StageResult::Manifest(Err(e)) => {
                tracing::error!(identifier = ?self.identifier, error = %e, "manifest load failed");
                self.state.last_error = Some(e.message.clone());
                self.dispatch(SessionEvent::ManifestFailed(e));
            }
            StageResult::Preload(Ok(result)) => {
                let audit = audit_preload(&result, &self.opts);
                let mut changed = false;
                for w in audit.warnings {
                    changed |= self.state.warnings.insert(w);
                }
                if changed {
                    self.emit_warnings();
                }
                let usable_target = result.has_usable_target();
                if usable_target {
                    if let Some(m) = &self.state.manifest {
                        self.emit(signals::assets_ready(&m.title));
                    }
                } else {
                    self.state.last_error = Some("Target descriptor is empty.".to_string());
                }
                self.state.preload = Some(result);
                self.dispatch(SessionEvent::PreloadFinished { usable_target });
            }
            StageResult::Preload(Err(e)) => {
                tracing::error!(error = %e, "preload failed");
                self.state.last_error = Some(e.to_string());
                self.dispatch(SessionEvent::PreloadFailed(e));
            }
            StageResult::Engine(Ok(events)) => {
                self.state.tracking = Some(events);
                self.dispatch(SessionEvent::EngineStarted);
            }
            StageResult::Engine(Err(e)) => {
                tracing::error!(error = %e, "tracking engine failed to start");
                self.state.last_error = Some(match &e {
                    EngineStartError::PermissionDenied(d) | EngineStartError::Failed(d) => {
                        d.clone()
                    }
                    EngineStartError::TimedOut(_) => e.to_string(),
                });
                self.dispatch(SessionEvent::EngineFailed(e));
            }
        }
    }

    fn dispatch(&mut self, event: SessionEvent) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let from = self.phase;
            let transition = from.on(&event);
            if transition.is_noop(from) {
                tracing::debug!(phase = from.name(), ?event, "event ignored");
                continue;
            }
            if transition.next != from {
                tracing::info!(from = from.name(), to = transition.next.name(), "session phase");
                self.emit(SessionSignal::Phase {
                    phase: transition.next,
                });
            }
            self.phase = transition.next;
            for effect in transition.effects {
                if let Some(follow_up) = self.apply(effect) {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    fn apply(&mut self, effect: Effect) -> Option<SessionEvent> {
        match effect {
            Effect::EvaluateCapabilities => {
                let evaluation = evaluate(&self.vector, &self.overrides);
                tracing::info!(
                    supported = evaluation.supported,
                    reasons = evaluation.reasons.len(),
                    "capabilities evaluated"
                );
                self.emit(SessionSignal::Capability {
                    evaluation: evaluation.clone(),
                });
                let supported = evaluation.supported;
                self.evaluation = Some(evaluation);
                return Some(SessionEvent::CapabilityEvaluated {
                    supported,
                    has_identifier: self.identifier.is_some(),
                });
            }
            Effect::ReportUnsupported => {
                if let Some(evaluation) = &self.evaluation {
                    for s in signals::unsupported(evaluation) {
                        self.emit(s);
                    }
                }
            }
            Effect::TearDown => self.tear_down(),
            Effect::AwaitIdentifier => self.emit(signals::awaiting_identifier()),
            Effect::FetchManifest => return self.start_manifest_stage(),
            Effect::Preload => self.start_preload_stage(),
            Effect::ComposeAndStart => self.start_engine_stage(),
            Effect::AnnounceTracking => {
                self.state.tracking_started = true;
                if let Some(m) = &self.state.manifest {
                    self.emit(signals::camera_active(&m.title));
                }
                self.emit(SessionSignal::default_instructions());
            }
            Effect::SetOverlayVisibility(visible) => {
                set_visibility(&mut self.state.entries, visible);
                self.engine.set_overlays_visible(visible);
                let overlays = self
                    .state
                    .entries
                    .iter()
                    .map(|e| e.overlay.id.clone())
                    .collect();
                self.emit(SessionSignal::OverlayVisibility { visible, overlays });
            }
            Effect::ScheduleAdvisory => {
                self.state.advisory_deadline = Some(Instant::now() + self.opts.advisory_delay());
            }
            Effect::CancelAdvisory => {
                self.state.advisory_deadline = None;
                if std::mem::take(&mut self.state.advisory_shown) {
                    self.emit(SessionSignal::default_instructions());
                }
            }
            Effect::ShowAdvisory => {
                self.state.advisory_deadline = None;
                self.state.advisory_shown = true;
                self.emit(SessionSignal::instructions(REACQUIRE_ADVISORY, true, None));
            }
            Effect::StopEngine => self.stop_engine(),
            Effect::ReportFault(fault) => self.report_fault(fault),
        }
        None
    }

    fn tear_down(&mut self) {
        self.epoch.set(self.epoch.get() + 1);
        self.stop_engine();
        self.state = SessionState::default();
        tracing::debug!(epoch = self.epoch.get(), "session state reset");

        self.emit_warnings();
        self.emit(SessionSignal::ErrorView { view: None });
        self.emit(SessionSignal::Footer { about_link: None });
        self.emit(SessionSignal::FallbackVideo { url: None });
        self.emit(SessionSignal::default_instructions());
    }

    fn stop_engine(&mut self) {
        if std::mem::take(&mut self.state.engine_engaged) {
            self.engine.stop();
        }
        self.state.tracking_started = false;
        self.state.tracking = None;
        self.state.advisory_deadline = None;
    }

    fn start_manifest_stage(&mut self) -> Option<SessionEvent> {
        let Some(identifier) = self.identifier.clone() else {
            return Some(SessionEvent::ManifestFailed(ManifestError::validation(
                "Cannot load manifest without an identifier.",
            )));
        };
        self.emit(signals::loading_manifest(&identifier));

        let source = Rc::clone(&self.source);
        let base = self.base_url.clone();
        let epoch = self.epoch.get();
        self.stages.push(
            async move {
                let result = fetch_manifest(&*source, &base, &identifier).await;
                StageOutcome {
                    epoch,
                    result: StageResult::Manifest(result),
                }
            }
            .boxed_local(),
        );
        None
    }

    fn start_preload_stage(&mut self) {
        let Some(manifest) = self.state.manifest.clone() else {
            return;
        };
        self.emit(signals::preloading(&manifest.title));
        self.emit(SessionSignal::Progress {
            percent: Some(0),
            detail: "Starting asset downloads…".to_string(),
        });

        let opts = PreloadOpts {
            staging: self.staging.clone(),
            ..PreloadOpts::from_session(&self.opts, self.vector.animated_png_support)
        };
        let source = Rc::clone(&self.source);
        let epoch = self.epoch.get();
        let current = Rc::clone(&self.epoch);
        let tx = self.signals.clone();
        let on_progress = move |event: ProgressEvent| {
            if current.get() == epoch {
                let _ = tx.send(signals::progress_signal(&event));
            }
        };
        self.stages.push(
            async move {
                let result = preload(&*source, &manifest, &opts, on_progress).await;
                StageOutcome {
                    epoch,
                    result: StageResult::Preload(result),
                }
            }
            .boxed_local(),
        );
    }

    fn start_engine_stage(&mut self) {
        let Some(result) = &self.state.preload else {
            return;
        };
        let config = TargetConfig {
            target_url: result.target_url.clone(),
            descriptor: Arc::clone(&result.target_buffer),
        };
        let mut entries = compose(&result.overlay_resources, self.opts.depth_step);
        set_visibility(&mut entries, false);
        self.engine.present_overlays(&planes(&entries));
        tracing::info!(
            overlays = entries.len(),
            target = %config.target_url,
            "overlays composed; starting engine"
        );
        self.state.entries = entries;
        self.state.engine_engaged = true;
        self.emit(SessionSignal::default_instructions());

        let engine = Rc::clone(&self.engine);
        let limit = self.opts.engine_start_timeout();
        let epoch = self.epoch.get();
        self.stages.push(
            async move {
                let result = match limit {
                    Some(limit) => tokio::time::timeout(limit, engine.start(&config))
                        .await
                        .unwrap_or(Err(EngineStartError::TimedOut(limit))),
                    None => engine.start(&config).await,
                };
                StageOutcome {
                    epoch,
                    result: StageResult::Engine(result),
                }
            }
            .boxed_local(),
        );
    }

    fn report_fault(&mut self, fault: SessionFault) {
        let detail = self.state.last_error.take().unwrap_or_default();
        let identifier = self.identifier.clone().unwrap_or_default();
        let fallback = self
            .state
            .manifest
            .as_ref()
            .and_then(Manifest::fallback_video_url);
        tracing::warn!(?fault, %detail, "session fault");

        match fault {
            SessionFault::ArtworkNotFound => {
                for s in signals::artwork_not_found(&identifier) {
                    self.emit(s);
                }
            }
            SessionFault::Manifest => {
                self.state.manifest = None;
                self.emit(signals::manifest_failed(&identifier, &detail));
            }
            SessionFault::Preload => {
                self.state.preload = None;
                self.state.entries.clear();
                for s in signals::preload_failed(&detail) {
                    self.emit(s);
                }
            }
            SessionFault::PermissionDenied => {
                let (sigs, warning) = signals::permission_denied(fallback.as_ref());
                for s in sigs {
                    self.emit(s);
                }
                if self.state.warnings.insert(warning) {
                    self.emit_warnings();
                }
            }
            SessionFault::EngineStart | SessionFault::EngineTimeout => {
                self.emit(SessionSignal::Progress {
                    percent: Some(100),
                    detail: "Camera initialization failed.".to_string(),
                });
                self.emit(signals::engine_failed(&detail));
                if let Some(link) = signals::fallback_link(fallback.as_ref()) {
                    self.emit(SessionSignal::instructions(
                        signals::CAMERA_REQUIRED,
                        true,
                        Some(link),
                    ));
                }
            }
            SessionFault::EngineRuntime => self.emit(signals::engine_stopped(&detail)),
        }
    }

    fn emit_warnings(&self) {
        self.emit(SessionSignal::Warnings {
            warnings: self.state.warnings.to_vec(),
        });
    }

    fn emit(&self, signal: SessionSignal) {
        if self.signals.send(signal).is_err() {
            tracing::trace!("signal receiver dropped");
        }
    }
}

fn clean_identifier(identifier: Option<String>) -> Option<String> {
    identifier
        .map(|raw| sanitize_identifier(raw.trim()))
        .filter(|id| !id.is_empty())
}

async fn recv_tracking(rx: Option<&mut TrackingEvents>) -> Option<TrackingSignal> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/controller.rs"]
mod tests;
