/// Frame/time/canvas primitives.
pub mod core;
/// Crate error type.
pub mod error;
/// Frame range text parsing.
pub mod range;
