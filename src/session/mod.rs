//! Session orchestration.
//!
//! [`machine`] holds the pure phase machine, [`controller`] interprets its effects against an
//! [`fetch::source::AssetSource`](crate::fetch::source::AssetSource) and a
//! [`engine::TrackingEngine`], and [`signals`] is the observable output.

pub mod controller;
pub mod engine;
pub mod machine;
pub mod signals;
