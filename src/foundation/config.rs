use std::{path::Path, time::Duration};

use anyhow::Context;

use crate::foundation::error::{GalleryError, GalleryResult};

/// Default delay before the "tracking lost" advisory is shown.
pub const DEFAULT_ADVISORY_DELAY_MS: u64 = 2600;
/// Default z spacing between coplanar overlays.
pub const DEFAULT_DEPTH_STEP: f64 = 0.001;

/// Options controlling preload retries, advisories and compositing for a session.
///
/// Every field has a default, so partial JSON documents are accepted.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionOpts {
    /// Attempts per asset, including the first one.
    pub max_attempts: u32,
    /// Pause between attempts of the same asset.
    pub retry_delay_ms: u64,
    /// Delay between losing the target and showing the reacquire advisory.
    pub advisory_delay_ms: u64,
    /// Z spacing added per overlay in display order.
    pub depth_step: f64,
    /// Overlays larger than this on either axis are reported as oversized.
    pub oversized_dimension_px: u32,
    /// Total preload size above which an advisory warning is raised.
    pub asset_budget_bytes: u64,
    /// Upper bound for the engine start call; `None` waits indefinitely.
    pub engine_start_timeout_ms: Option<u64>,
}

impl Default for SessionOpts {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_delay_ms: 150,
            advisory_delay_ms: DEFAULT_ADVISORY_DELAY_MS,
            depth_step: DEFAULT_DEPTH_STEP,
            oversized_dimension_px: 1920,
            asset_budget_bytes: 12 * 1024 * 1024,
            engine_start_timeout_ms: Some(20_000),
        }
    }
}

impl SessionOpts {
    /// Parse options from a JSON document and validate them.
    pub fn from_json_str(s: &str) -> GalleryResult<Self> {
        let opts: Self = serde_json::from_str(s)
            .map_err(|e| GalleryError::config(format!("invalid session options: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    /// Read options from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> GalleryResult<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read session options from '{}'", path.display()))?;
        Self::from_json_str(&s)
    }

    pub fn validate(&self) -> GalleryResult<()> {
        if self.max_attempts == 0 {
            return Err(GalleryError::config("max_attempts must be >= 1"));
        }
        if !self.depth_step.is_finite() || self.depth_step <= 0.0 {
            return Err(GalleryError::config("depth_step must be finite and > 0"));
        }
        if self.engine_start_timeout_ms == Some(0) {
            return Err(GalleryError::config(
                "engine_start_timeout_ms must be > 0 (omit it to disable the timeout)",
            ));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn advisory_delay(&self) -> Duration {
        Duration::from_millis(self.advisory_delay_ms)
    }

    pub fn engine_start_timeout(&self) -> Option<Duration> {
        self.engine_start_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
