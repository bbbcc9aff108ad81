//! Encode/write service.
//!
//! Sinks consume finished frames in strictly increasing index order.

/// `ffmpeg`-based video sink.
pub mod ffmpeg;
/// Frame sink trait and built-in sinks.
pub mod sink;
