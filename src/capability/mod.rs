//! Device capability gate.

pub mod evaluate;
