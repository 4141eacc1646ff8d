use std::cmp::Ordering;

use url::Url;

use crate::{
    assets::preload::{EncodingKind, OverlayResource},
    foundation::core::Vec3,
    manifest::model::Overlay,
};

/// A textured plane anchored to the tracked target.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayPlane {
    pub overlay_id: String,
    pub encoding: EncodingKind,
    pub material_src: Url,
    /// Declared position with the depth offset added to z.
    pub position: Vec3,
    pub scale: Vec3,
    pub depth_index: f64,
    pub depth_offset: f64,
    pub loop_playback: bool,
    pub visible: bool,
}

impl OverlayPlane {
    /// Engine material attribute for this plane.
    pub fn material_attribute(&self) -> String {
        format!(
            "src: {}; transparent: true; alphaTest: 0.001; side: double; magFilter: linear; minFilter: linearMipMapLinear",
            self.material_src
        )
    }

    pub fn position_attribute(&self) -> String {
        self.position.to_attribute()
    }

    pub fn scale_attribute(&self) -> String {
        self.scale.to_attribute()
    }
}

/// One displayed overlay: the loaded resource and the plane built from it.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayDisplayEntry {
    pub overlay: Overlay,
    pub resource: OverlayResource,
    pub plane: OverlayPlane,
    pub depth_offset: f64,
}

/// Turn loaded overlays into display entries ordered by depth.
///
/// The sort on `depth_index` is stable, so equal depths keep manifest order; `-0` and `0` are
/// equal. Entry `i` gets a depth offset of `i * step`.
pub fn compose(resources: &[OverlayResource], step: f64) -> Vec<OverlayDisplayEntry> {
    let mut ordered: Vec<&OverlayResource> = resources.iter().collect();
    ordered.sort_by(|a, b| {
        a.overlay
            .depth_index
            .partial_cmp(&b.overlay.depth_index)
            .unwrap_or(Ordering::Equal)
    });

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, res)| {
            let depth_offset = i as f64 * step;
            let overlay = &res.overlay;
            OverlayDisplayEntry {
                plane: OverlayPlane {
                    overlay_id: overlay.id.clone(),
                    encoding: res.encoding,
                    material_src: res.url.clone(),
                    position: overlay.position.offset_z(depth_offset),
                    scale: overlay.scale,
                    depth_index: overlay.depth_index,
                    depth_offset,
                    loop_playback: overlay.loop_playback,
                    visible: false,
                },
                overlay: overlay.clone(),
                resource: res.clone(),
                depth_offset,
            }
        })
        .collect()
}

/// Show or hide every entry.
pub fn set_visibility(entries: &mut [OverlayDisplayEntry], visible: bool) {
    for e in entries {
        e.plane.visible = visible;
    }
}

/// Planes of `entries`, in display order.
pub fn planes(entries: &[OverlayDisplayEntry]) -> Vec<OverlayPlane> {
    entries.iter().map(|e| e.plane.clone()).collect()
}

#[cfg(test)]
#[path = "../../tests/unit/compose/compositor.rs"]
mod tests;
