//! Concurrent frame rendering: preparation, scheduling and ordered output.

/// Per-clip decoded picture hand-off.
pub mod cache;
/// Cooperative cancellation.
pub mod cancel;
/// Reordering sink in front of the encoder.
pub mod ordered;
/// Decode-ahead producer.
pub mod prepare;
/// Session API and the bounded worker pool.
pub mod session;
