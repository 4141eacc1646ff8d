use std::{cell::RefCell, str::FromStr, sync::Arc, time::Duration};

use tokio::{sync::mpsc, task::JoinHandle};
use url::Url;

use crate::{
    compose::compositor::OverlayPlane,
    foundation::error::{EngineStartError, GalleryError},
};

/// Signal delivered by a running tracking engine.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum TrackingSignal {
    Ready,
    TargetFound,
    TargetLost,
    /// The engine could not display the overlay with this id.
    OverlayFailed(String),
    Fault(String),
}

/// Subscribed stream of tracking signals, in delivery order.
pub type TrackingEvents = mpsc::UnboundedReceiver<TrackingSignal>;

/// What the engine needs to recognize the artwork.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetConfig {
    pub target_url: Url,
    pub descriptor: Arc<Vec<u8>>,
}

impl TargetConfig {
    /// Engine source attribute for this target.
    pub fn source_config(&self) -> String {
        format!("autoStart: true; imageTargetSrc: {}", self.target_url)
    }
}

/// Camera tracking engine.
///
/// `start` resolves once the camera runs; tracking signals then arrive on the returned stream
/// until the engine stops.
#[allow(async_fn_in_trait)]
pub trait TrackingEngine {
    /// Anchor `planes` to the target. Called before `start`, hidden.
    fn present_overlays(&self, planes: &[OverlayPlane]) {
        let _ = planes;
    }

    /// Toggle every presented plane.
    fn set_overlays_visible(&self, visible: bool) {
        let _ = visible;
    }

    async fn start(&self, target: &TargetConfig) -> Result<TrackingEvents, EngineStartError>;

    fn stop(&self);
}

/// One scripted signal, delivered `after` the engine started.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptStep {
    pub after: Duration,
    pub signal: TrackingSignal,
}

/// How [`ReplayEngine::start`] settles.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum StartBehavior {
    #[default]
    Succeed,
    /// Reject with an engine-reported `(name, message)` pair.
    Reject { name: String, message: String },
    /// Succeed once this much time has passed.
    Delay(Duration),
    /// Never settle.
    Stall,
}

/// Record of a call made on a [`ReplayEngine`].
#[derive(Clone, Debug, PartialEq)]
pub enum EngineCall {
    Present(Vec<String>),
    Visible(bool),
    Start(String),
    Stop,
}

/// Headless engine replaying a scripted signal timeline.
///
/// Script syntax: comma-separated `signal@millis`, where signal is `ready`, `found`, `lost`,
/// `overlay-failed:<id>` or `fault:<detail>`; e.g. `ready@0,found@500,lost@1200`.
#[derive(Debug, Default)]
pub struct ReplayEngine {
    script: Vec<ScriptStep>,
    behavior: StartBehavior,
    task: RefCell<Option<JoinHandle<()>>>,
    calls: RefCell<Vec<EngineCall>>,
}

impl ReplayEngine {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    pub fn with_behavior(mut self, behavior: StartBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.task
            .borrow()
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    fn record(&self, call: EngineCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl FromStr for ReplayEngine {
    type Err = GalleryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(parse_script(s)?))
    }
}

/// Parse a replay script (see [`ReplayEngine`]).
pub fn parse_script(s: &str) -> Result<Vec<ScriptStep>, GalleryError> {
    let mut steps = Vec::new();
    for raw in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, at) = raw
            .rsplit_once('@')
            .ok_or_else(|| GalleryError::validation(format!("script step '{raw}' lacks '@millis'")))?;
        let millis: u64 = at
            .trim()
            .parse()
            .map_err(|_| GalleryError::validation(format!("script step '{raw}' has a bad delay")))?;
        let signal = match name.trim() {
            "ready" => TrackingSignal::Ready,
            "found" => TrackingSignal::TargetFound,
            "lost" => TrackingSignal::TargetLost,
            other => {
                if let Some(detail) = other.strip_prefix("fault:") {
                    TrackingSignal::Fault(detail.to_string())
                } else if let Some(id) = other.strip_prefix("overlay-failed:") {
                    TrackingSignal::OverlayFailed(id.to_string())
                } else {
                    return Err(GalleryError::validation(format!(
                        "unknown tracking signal '{other}'"
                    )));
                }
            }
        };
        steps.push(ScriptStep {
            after: Duration::from_millis(millis),
            signal,
        });
    }
    steps.sort_by_key(|s| s.after);
    Ok(steps)
}

impl TrackingEngine for ReplayEngine {
    fn present_overlays(&self, planes: &[OverlayPlane]) {
        self.record(EngineCall::Present(
            planes.iter().map(|p| p.overlay_id.clone()).collect(),
        ));
    }

    fn set_overlays_visible(&self, visible: bool) {
        self.record(EngineCall::Visible(visible));
    }

    async fn start(&self, target: &TargetConfig) -> Result<TrackingEvents, EngineStartError> {
        self.record(EngineCall::Start(target.source_config()));
        match &self.behavior {
            StartBehavior::Succeed => {}
            StartBehavior::Reject { name, message } => {
                return Err(EngineStartError::classify(name, message));
            }
            StartBehavior::Delay(wait) => tokio::time::sleep(*wait).await,
            StartBehavior::Stall => std::future::pending::<()>().await,
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let script = self.script.clone();
        let handle = tokio::spawn(async move {
            let started = tokio::time::Instant::now();
            for step in script {
                tokio::time::sleep_until(started + step.after).await;
                if tx.send(step.signal).is_err() {
                    return;
                }
            }
        });
        if let Some(old) = self.task.borrow_mut().replace(handle) {
            old.abort();
        }
        Ok(rx)
    }

    fn stop(&self) {
        self.record(EngineCall::Stop);
        if let Some(task) = self.task.borrow_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/engine.rs"]
mod tests;
