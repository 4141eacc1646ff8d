//! Artwork manifests: model, validation and resolution.

pub mod model;
pub mod resolve;
pub mod validate;
