//! Asset preloading, decoding and post-preload audits.

pub mod audit;
pub mod decode;
pub mod preload;
