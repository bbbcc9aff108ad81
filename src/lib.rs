//! Framecut renders multi-layer video timelines into ordered frame streams.
//!
//! A [`Draft`] places clips on numbered layers. A [`RenderSession`] resolves which clips are
//! active on each output frame, decodes them ahead of the workers, runs each clip's effect chain,
//! folds the layers with their mixture modes and hands the result to a [`FrameSink`] in strict
//! frame order:
//!
//! - Load and validate a [`Draft`]
//! - Open a decode service ([`MediaDecoder`] or [`MemoryDecoder`])
//! - Create a [`RenderSession`] over a [`ComputeDispatcher`]
//! - Render single frames or stream a range into a [`FrameSink`]
#![forbid(unsafe_code)]

mod foundation;

/// Layer mixing and per-clip effects.
pub mod compose;
pub mod compute;
pub mod decode;
/// Frame sinks.
pub mod encode;
pub mod picture;
/// Concurrent range rendering.
pub mod render;
/// Clips, drafts and frame resolution.
pub mod timeline;

pub use crate::foundation::core::{Canvas, Fps, FrameIndex, FrameRange};
pub use crate::foundation::error::{FrameCutError, FrameCutResult};
pub use crate::foundation::range::{
    MAX_SEQUENCE_FRAMES, parse_frame_range, parse_frame_sequence, parse_frame_spans,
};

pub use crate::compose::effect::Effect;
pub use crate::compose::mixture::{MixtureEngine, MixtureMode};
pub use crate::compute::{BlendParams, ComputeBackend, ComputeDispatcher, ComputeOp, CpuBackend};
pub use crate::decode::{DecodeService, MediaDecoder, MemoryDecoder, StreamInfo};
pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
pub use crate::encode::sink::{
    FrameSink, ImageSequenceFormat, ImageSequenceSink, InMemorySink, SinkConfig,
};
pub use crate::picture::Picture;
pub use crate::render::cancel::CancellationToken;
pub use crate::render::ordered::{OrderedSink, ProgressEvent, SinkPhase};
pub use crate::render::session::{ErrorPolicy, RenderOpts, RenderSession, RenderStats};
pub use crate::timeline::clip::{Clip, ClipSource};
pub use crate::timeline::draft::Draft;
pub use crate::timeline::resolver::{ReadyFrameSet, TimelineResolver};
