//! Byte sources for manifests and assets.
//!
//! Everything above this layer reads through [`source::AssetSource`], so the same pipeline runs
//! against HTTP, a local gallery directory, or an in-memory table in tests.

/// Local gallery directory served under a fixed origin.
pub mod dir;
/// HTTP(S) via `reqwest`.
pub mod http;
/// In-memory table with scripted failures.
pub mod memory;
pub mod source;
