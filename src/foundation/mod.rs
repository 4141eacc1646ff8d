//! Shared value types, errors and session options.

pub mod config;
pub mod core;
pub mod error;
