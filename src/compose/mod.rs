//! Overlay compositing onto the target plane.

pub mod compositor;
