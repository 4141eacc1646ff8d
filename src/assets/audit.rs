use crate::{assets::preload::PreloadResult, foundation::config::SessionOpts};

/// Warning raised when the preload exceeds `asset_budget_bytes`.
pub const BUDGET_WARNING: &str = "Asset budget exceeded";

/// Advisory findings derived from a [`PreloadResult`]. Never fatal.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct PreloadAudit {
    /// User-facing warnings, in the order they were found.
    pub warnings: Vec<String>,
    /// Ids of overlays larger than `oversized_dimension_px` on either axis.
    pub oversized: Vec<String>,
    pub over_budget: bool,
}

/// User-facing warning for an overlay that could not be loaded.
pub fn unavailable_overlay_warning(id: &str) -> String {
    format!("Overlay “{id}” is unavailable.")
}

pub fn audit_preload(result: &PreloadResult, opts: &SessionOpts) -> PreloadAudit {
    let mut audit = PreloadAudit::default();

    for failed in &result.failed_overlays {
        audit
            .warnings
            .push(unavailable_overlay_warning(&failed.overlay.id));
    }

    let limit = opts.oversized_dimension_px;
    for res in &result.overlay_resources {
        let Some((w, h)) = res.dimensions else {
            continue;
        };
        if w > limit || h > limit {
            tracing::warn!(
                overlay = %res.overlay.id,
                width = w,
                height = h,
                limit,
                "oversized overlay image"
            );
            audit.oversized.push(res.overlay.id.clone());
        }
    }

    if result.stats.total as u64 > opts.asset_budget_bytes {
        tracing::warn!(
            total = result.stats.total,
            budget = opts.asset_budget_bytes,
            "asset budget exceeded"
        );
        audit.over_budget = true;
        audit.warnings.push(BUDGET_WARNING.to_string());
    }

    audit
}

#[cfg(test)]
#[path = "../../tests/unit/assets/audit.rs"]
mod tests;
