//! Timeline model and frame-to-clip resolution.

/// Clips and their time mapping.
pub mod clip;
/// JSON draft documents.
pub mod draft;
/// Active clip lookup and the ready frame set.
pub mod resolver;
