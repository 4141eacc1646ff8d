//! Artwork identifiers and the locations derived from them.

pub mod identifier;
