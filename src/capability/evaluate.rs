use std::sync::OnceLock;

/// Minimum iOS version able to grant WebAR camera access.
pub const IOS_MIN_VERSION: f64 = 15.0;
/// Minimum Android version able to run the tracking engine.
pub const ANDROID_MIN_VERSION: f64 = 9.0;

const REASON_FORCED: &str = "Forced unsupported mode (testing override).";
const REASON_IOS: &str = "iOS 15 or newer is required for WebAR camera access.";
const REASON_ANDROID: &str = "Android 9 (Pie) or newer is required for WebAR.";
const REASON_GRAPHICS: &str = "WebGL support is required to render augmented overlays.";
const REASON_CAMERA: &str = "A compatible rear camera is required to start the AR experience.";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
/// Platform family detected by the capability probe.
pub enum PlatformFamily {
    /// iPhone, iPad or iPod.
    Ios,
    /// Android phones and tablets.
    Android,
    /// Anything else (desktop, unknown).
    #[default]
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// Immutable snapshot of the device signals relevant to the AR session.
pub struct CapabilityVector {
    /// Detected platform family.
    pub platform_family: PlatformFamily,
    /// Parsed platform version (`major.minor`), when the probe could read one.
    pub platform_version: Option<f64>,
    /// A 3D graphics context could be created.
    pub has_graphics_context: bool,
    /// A camera capture API is exposed.
    pub has_camera_api: bool,
    /// Animated PNG frames are decoded and played back.
    pub animated_png_support: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
/// Manual overrides applied on top of the probed vector.
pub struct SupportOverrides {
    /// Treat the device as unsupported regardless of its signals.
    pub force_unsupported: bool,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
/// Verdict derived from a [`CapabilityVector`] and [`SupportOverrides`].
pub struct SupportEvaluation {
    /// True iff `reasons` is empty.
    pub supported: bool,
    /// Failed checks in evaluation order.
    pub reasons: Vec<String>,
    /// Vector the verdict was derived from.
    pub vector: CapabilityVector,
    /// Overrides in effect.
    pub overrides: SupportOverrides,
}

impl SupportEvaluation {
    /// True when the verdict comes from the forced-unsupported override.
    pub fn is_forced(&self) -> bool {
        self.overrides.force_unsupported
    }
}

/// Evaluate whether `vector` can run the AR session.
///
/// Pure: identical inputs yield identical verdicts. All checks run (no short-circuit) so several
/// reasons can surface together, except under `force_unsupported`, which yields exactly one.
pub fn evaluate(vector: &CapabilityVector, overrides: &SupportOverrides) -> SupportEvaluation {
    let mut reasons = Vec::new();

    if overrides.force_unsupported {
        reasons.push(REASON_FORCED.to_string());
    } else {
        if below_minimum(vector, PlatformFamily::Ios, IOS_MIN_VERSION) {
            reasons.push(REASON_IOS.to_string());
        }
        if below_minimum(vector, PlatformFamily::Android, ANDROID_MIN_VERSION) {
            reasons.push(REASON_ANDROID.to_string());
        }
        if !vector.has_graphics_context {
            reasons.push(REASON_GRAPHICS.to_string());
        }
        if !vector.has_camera_api {
            reasons.push(REASON_CAMERA.to_string());
        }
    }

    SupportEvaluation {
        supported: reasons.is_empty(),
        reasons,
        vector: *vector,
        overrides: *overrides,
    }
}

// An unknown version never fails the family check on its own.
fn below_minimum(vector: &CapabilityVector, family: PlatformFamily, min: f64) -> bool {
    vector.platform_family == family && vector.platform_version.is_some_and(|v| v < min)
}

/// Source of a [`CapabilityVector`]; the probing primitives live outside this crate.
pub trait CapabilityProbe {
    /// Collect the device signals.
    fn probe(&self) -> CapabilityVector;
}

/// Probe that always reports the same vector.
#[derive(Clone, Copy, Debug)]
pub struct FixedProbe(pub CapabilityVector);

impl CapabilityProbe for FixedProbe {
    fn probe(&self) -> CapabilityVector {
        self.0
    }
}

/// Probe wrapper that runs the inner probe at most once.
#[derive(Debug)]
pub struct CachedProbe<P> {
    inner: P,
    cached: OnceLock<CapabilityVector>,
}

impl<P: CapabilityProbe> CachedProbe<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cached: OnceLock::new(),
        }
    }
}

impl<P: CapabilityProbe> CapabilityProbe for CachedProbe<P> {
    fn probe(&self) -> CapabilityVector {
        *self.cached.get_or_init(|| self.inner.probe())
    }
}

static PROCESS_VECTOR: OnceLock<CapabilityVector> = OnceLock::new();

/// Process-wide capability vector, computed by `probe` on first use and read-only afterwards.
pub fn process_capabilities(probe: &dyn CapabilityProbe) -> CapabilityVector {
    *PROCESS_VECTOR.get_or_init(|| {
        let vector = probe.probe();
        tracing::debug!(?vector, "capability vector cached");
        vector
    })
}

#[cfg(test)]
#[path = "../../tests/unit/capability/evaluate.rs"]
mod tests;
