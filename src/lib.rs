//! Per-artwork augmented-reality session pipeline.
//!
//! A session turns an artwork identifier into a running tracking experience:
//!
//! - Gate on device capabilities ([`evaluate`])
//! - Resolve and validate the artwork [`Manifest`]
//! - Preload the target descriptor and overlay images ([`preload`])
//! - Compose overlays onto the target plane ([`compose`])
//! - Start a [`TrackingEngine`] and follow found/lost signals
//!
//! [`SessionController`] drives all of it and reports progress as [`SessionSignal`]s.
#![forbid(unsafe_code)]

pub mod assets;
pub mod capability;
pub mod compose;
pub mod fetch;
pub mod foundation;
pub mod manifest;
pub mod routing;
pub mod session;

pub use crate::foundation::config::SessionOpts;
pub use crate::foundation::core::Vec3;
pub use crate::foundation::error::{
    AssetLoadError, EngineStartError, FetchError, GalleryError, GalleryResult, ManifestError,
    ManifestErrorKind,
};

pub use crate::assets::audit::{PreloadAudit, audit_preload};
pub use crate::assets::preload::{
    ByteStats, EncodingKind, PreloadOpts, PreloadResult, ProgressEvent, ProgressStatus, preload,
};
pub use crate::capability::evaluate::{
    CachedProbe, CapabilityProbe, CapabilityVector, FixedProbe, PlatformFamily, SupportEvaluation,
    SupportOverrides, evaluate,
};
pub use crate::compose::compositor::{OverlayDisplayEntry, OverlayPlane, compose};
pub use crate::fetch::dir::DirSource;
pub use crate::fetch::http::HttpSource;
pub use crate::fetch::memory::MemorySource;
pub use crate::fetch::source::{AssetSource, CachePolicy, FetchedBody};
pub use crate::manifest::model::{Manifest, Overlay, SourceSet};
pub use crate::manifest::resolve::fetch_manifest;
pub use crate::manifest::validate::{ValidatedManifest, ValidationContext, validate_manifest};
pub use crate::routing::identifier::{canonical_location, extract_identifier, manifest_url};
pub use crate::session::controller::{SessionController, SessionInput, SessionSnapshot};
pub use crate::session::engine::{ReplayEngine, TargetConfig, TrackingEngine, TrackingSignal};
pub use crate::session::machine::{SessionFault, SessionPhase, TrackingState};
pub use crate::session::signals::SessionSignal;
