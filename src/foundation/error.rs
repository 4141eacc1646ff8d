use std::time::Duration;

/// Convenience result type used across the gallery pipeline.
pub type GalleryResult<T> = Result<T, GalleryError>;

/// Top-level error taxonomy used by pipeline APIs.
#[derive(thiserror::Error, Debug)]
pub enum GalleryError {
    /// Invalid user-provided input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Invalid session configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The device cannot run the AR session.
    #[error("capability unsupported: {}", reasons.join(" "))]
    Unsupported {
        /// Human-readable reasons, in evaluation order.
        reasons: Vec<String>,
    },

    /// Manifest retrieval or validation failure.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Fatal asset failure (the target descriptor).
    #[error(transparent)]
    Asset(#[from] AssetLoadError),

    /// Tracking engine refused or failed to start.
    #[error(transparent)]
    Engine(#[from] EngineStartError),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GalleryError {
    /// Build a [`GalleryError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`GalleryError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Classification of a [`ManifestError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum ManifestErrorKind {
    /// The origin answered with a non-2xx status.
    NotFound,
    /// The request never produced a response.
    Network,
    /// The body was not JSON.
    InvalidJson,
    /// The JSON did not describe a usable artwork.
    Validation,
}

/// Failure to resolve an artwork manifest.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
#[error("{message}")]
pub struct ManifestError {
    /// Failure class.
    pub kind: ManifestErrorKind,
    /// HTTP status for [`ManifestErrorKind::NotFound`].
    pub status: Option<u16>,
    /// Human-readable description (validation findings are joined).
    pub message: String,
}

impl ManifestError {
    pub(crate) fn new(kind: ManifestErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::new(ManifestErrorKind::Validation, message)
    }

    pub(crate) fn not_found(status: u16) -> Self {
        Self {
            kind: ManifestErrorKind::NotFound,
            status: Some(status),
            message: format!("Manifest not found (HTTP {status})."),
        }
    }

    /// True when the origin explicitly reported that the artwork does not exist.
    pub fn is_missing_artwork(&self) -> bool {
        self.kind == ManifestErrorKind::NotFound && self.status == Some(404)
    }
}

/// Transport-level failure reported by an [`crate::AssetSource`].
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum FetchError {
    /// Connection, TLS or body read failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// The source cannot serve this URL at all.
    #[error("unsupported url '{0}'")]
    Unsupported(String),
}

/// Failure to load a single asset.
///
/// Overlay failures are recorded and degrade the session; a target failure is fatal.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum AssetLoadError {
    /// No usable URL could be derived for the asset.
    #[error("{label}: no resolvable source ({reason})")]
    Unresolvable {
        /// Progress label of the asset.
        label: String,
        /// Why resolution failed.
        reason: String,
    },
    /// The origin answered with a non-2xx status.
    #[error("request for {url} failed with status {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status.
        status: u16,
    },
    /// The request never produced a response.
    #[error("request for {url} failed: {source}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying transport failure.
        source: FetchError,
    },
    /// The bytes are not a recognizable image.
    #[error("image at {url} failed to load")]
    Undecodable {
        /// Requested URL.
        url: String,
    },
    /// Every attempt failed.
    #[error("{label} failed to load after {attempts} attempt(s): {last}")]
    Exhausted {
        /// Progress label of the asset.
        label: String,
        /// Requested URL.
        url: String,
        /// Attempts made.
        attempts: u32,
        /// Last attempt's error.
        last: Box<AssetLoadError>,
    },
}

/// Failure to start the tracking engine.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum EngineStartError {
    /// The user or platform refused camera access.
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    /// Any other start failure.
    #[error("{0}")]
    Failed(String),
    /// The engine did not settle its start call in time.
    #[error("tracking engine did not start within {}ms", .0.as_millis())]
    TimedOut(Duration),
}

impl EngineStartError {
    /// Classify an engine-reported error by its name and message.
    pub fn classify(name: &str, message: &str) -> Self {
        let name_lc = name.to_ascii_lowercase();
        let message_lc = message.to_ascii_lowercase();
        let denied = name_lc.contains("notallowederror")
            || name_lc.contains("permission")
            || name_lc.contains("denied")
            || message_lc.contains("denied");
        let detail = if message.is_empty() {
            name.to_string()
        } else {
            message.to_string()
        };
        if denied {
            Self::PermissionDenied(detail)
        } else {
            Self::Failed(detail)
        }
    }

    /// True for the permission-denied sub-case.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
