use url::Url;

use crate::{
    assets::preload::{ProgressEvent, ProgressStatus},
    capability::evaluate::SupportEvaluation,
    session::machine::SessionPhase,
};

pub const DEFAULT_INSTRUCTIONS: &str = "Point your camera at the artwork to begin.";
pub const REACQUIRE_ADVISORY: &str =
    "Move closer to the artwork or adjust the lighting to regain tracking.";
pub const CAMERA_REQUIRED: &str = "Camera access is required to view this experience.";
pub const FALLBACK_LINK_TEXT: &str = "Watch the fallback video";

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTone {
    Info,
    Loading,
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct InstructionLink {
    pub href: Url,
    pub text: String,
}

/// Blocking error view shown instead of the camera.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ErrorView {
    pub title: String,
    pub description: String,
}

/// Observable output of a session, consumed by presentation code.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "signal", rename_all = "camelCase")]
pub enum SessionSignal {
    Phase {
        phase: SessionPhase,
    },
    Capability {
        evaluation: SupportEvaluation,
    },
    /// Guidance shown when the device is unsupported.
    Fallback {
        description: String,
        reasons: Vec<String>,
    },
    Status {
        tone: StatusTone,
        message: String,
        detail: Option<String>,
    },
    /// `percent` is absent for events that do not move the bar.
    Progress {
        percent: Option<u8>,
        detail: String,
    },
    /// Full warning list after a change.
    Warnings {
        warnings: Vec<String>,
    },
    ErrorView {
        view: Option<ErrorView>,
    },
    Footer {
        about_link: Option<Url>,
    },
    Title {
        title: String,
    },
    FallbackVideo {
        url: Option<Url>,
    },
    OverlayVisibility {
        visible: bool,
        overlays: Vec<String>,
    },
    Instructions {
        message: String,
        active: bool,
        link: Option<InstructionLink>,
    },
}

impl SessionSignal {
    pub fn status(tone: StatusTone, message: impl Into<String>, detail: Option<String>) -> Self {
        Self::Status {
            tone,
            message: message.into(),
            detail,
        }
    }

    pub fn instructions(message: &str, active: bool, link: Option<InstructionLink>) -> Self {
        Self::Instructions {
            message: message.to_string(),
            active,
            link,
        }
    }

    pub fn default_instructions() -> Self {
        Self::instructions(DEFAULT_INSTRUCTIONS, false, None)
    }
}

/// Warnings without duplicates, in first-insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct WarningSet(Vec<String>);

impl WarningSet {
    /// Add `message`; returns false when it was already present or empty.
    pub fn insert(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        if message.is_empty() || self.0.contains(&message) {
            return false;
        }
        self.0.push(message);
        true
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.clone()
    }
}

/// Map a preload progress event to the progress bar update.
pub fn progress_signal(event: &ProgressEvent) -> SessionSignal {
    let label = &event.label;
    let (percent, detail) = match &event.status {
        ProgressStatus::Start => (None, format!("Loading {label}…")),
        ProgressStatus::Retry { attempt, .. } => {
            (None, format!("Retrying {label} (attempt {attempt})…"))
        }
        ProgressStatus::Loaded => {
            let detail = if event.completed >= event.total {
                "All assets loaded.".to_string()
            } else {
                format!("Loaded {label}. ({}/{})", event.completed, event.total)
            };
            (Some(event.percent()), detail)
        }
        ProgressStatus::Failed { .. } => (Some(100), format!("Failed to load {label}.")),
    };
    SessionSignal::Progress { percent, detail }
}

pub(crate) fn awaiting_identifier() -> SessionSignal {
    SessionSignal::status(
        StatusTone::Info,
        "Device ready. Append “/ar/<slug>” to load an artwork.",
        Some("Tip: try /ar/demo while developing locally.".to_string()),
    )
}

pub(crate) fn unsupported(evaluation: &SupportEvaluation) -> [SessionSignal; 2] {
    let description = if evaluation.is_forced() {
        "Fallback view enabled manually for debugging. Replace the query parameter to return to normal mode."
    } else {
        "Your browser doesn't support the full augmented reality experience yet. Watch the short demo below and try again on a compatible device."
    };
    let reasons = if evaluation.reasons.is_empty() {
        vec!["Unknown capability issue prevented the AR experience.".to_string()]
    } else {
        evaluation.reasons.clone()
    };
    [
        SessionSignal::status(
            StatusTone::Error,
            "This device cannot run the full augmented reality view yet. See guidance below.",
            None,
        ),
        SessionSignal::Fallback {
            description: description.to_string(),
            reasons,
        },
    ]
}

pub(crate) fn loading_manifest(identifier: &str) -> SessionSignal {
    SessionSignal::status(
        StatusTone::Loading,
        format!("Loading artwork manifest for “{identifier}”…"),
        None,
    )
}

pub(crate) fn artwork_not_found(identifier: &str) -> [SessionSignal; 2] {
    [
        SessionSignal::ErrorView {
            view: Some(ErrorView {
                title: "Artwork not found".to_string(),
                description: format!(
                    "We couldn’t find an artwork called “{identifier}”. Double-check the QR code or contact the curator."
                ),
            }),
        },
        SessionSignal::status(
            StatusTone::Error,
            "Artwork not found.",
            Some(format!(
                "We couldn’t locate an artwork called “{identifier}”. Check the QR code or try again later."
            )),
        ),
    ]
}

pub(crate) fn manifest_failed(identifier: &str, message: &str) -> SessionSignal {
    SessionSignal::status(
        StatusTone::Error,
        "Unable to load artwork manifest.",
        Some(format!(
            "{message} (looked for /ar/{identifier}/manifest.json)"
        )),
    )
}

pub(crate) fn preloading(title: &str) -> SessionSignal {
    SessionSignal::status(
        StatusTone::Loading,
        format!("Preloading assets for “{title}”…"),
        Some("Ensuring all overlays are ready before activating the camera.".to_string()),
    )
}

pub(crate) fn assets_ready(title: &str) -> SessionSignal {
    SessionSignal::status(
        StatusTone::Loading,
        format!("Assets ready for “{title}”."),
        Some("Initializing camera…".to_string()),
    )
}

pub(crate) fn preload_failed(message: &str) -> [SessionSignal; 2] {
    [
        SessionSignal::Progress {
            percent: Some(100),
            detail: message.to_string(),
        },
        SessionSignal::status(
            StatusTone::Error,
            "Failed to preload AR assets.",
            Some(message.to_string()),
        ),
    ]
}

pub(crate) fn camera_active(title: &str) -> SessionSignal {
    SessionSignal::status(
        StatusTone::Success,
        format!("Camera active for “{title}”."),
        Some("Point the device at the artwork to begin tracking.".to_string()),
    )
}

pub(crate) fn fallback_link(fallback: Option<&Url>) -> Option<InstructionLink> {
    fallback.map(|href| InstructionLink {
        href: href.clone(),
        text: FALLBACK_LINK_TEXT.to_string(),
    })
}

/// Status for a denied camera plus the warning to record.
pub(crate) fn permission_denied(fallback: Option<&Url>) -> ([SessionSignal; 2], &'static str) {
    let detail = if fallback.is_some() {
        "Enable camera access in your browser settings or watch the fallback video instead."
    } else {
        "Enable camera access in your browser settings and reload the page."
    };
    let warning = if fallback.is_some() {
        "Camera access denied — showing fallback video link."
    } else {
        "Camera access denied."
    };
    (
        [
            SessionSignal::status(
                StatusTone::Error,
                "Camera permission required.",
                Some(detail.to_string()),
            ),
            SessionSignal::instructions(CAMERA_REQUIRED, true, fallback_link(fallback)),
        ],
        warning,
    )
}

pub(crate) fn engine_failed(detail: &str) -> SessionSignal {
    let detail = if detail.is_empty() {
        "Check camera permissions and reload the page."
    } else {
        detail
    };
    SessionSignal::status(
        StatusTone::Error,
        "Unable to start the AR camera.",
        Some(detail.to_string()),
    )
}

pub(crate) fn engine_stopped(detail: &str) -> SessionSignal {
    SessionSignal::status(
        StatusTone::Error,
        "The AR camera stopped unexpectedly.",
        Some(detail.to_string()),
    )
}

#[cfg(test)]
#[path = "../../tests/unit/session/signals.rs"]
mod tests;
