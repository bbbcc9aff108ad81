pub type FrameCutResult<T> = Result<T, FrameCutError>;

/// Errors produced while resolving, compositing and writing a timeline.
#[derive(thiserror::Error, Debug)]
pub enum FrameCutError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("frame {frame} is outside the mapped range [{start}, {end}) of clip '{clip}'")]
    FrameRange {
        clip: String,
        frame: u64,
        start: i64,
        end: i64,
    },

    #[error("clips '{first}' and '{second}' both occupy layer {layer} at frame {frame}")]
    Overlap {
        frame: u64,
        layer: u32,
        first: String,
        second: String,
    },

    #[error("no compute backend implementation for '{op}'")]
    ComputeUnavailable { op: String },

    #[error("frame {frame} was written more than once")]
    DuplicateFrameWrite { frame: u64 },

    #[error("frame {frame} failed to render: {source}")]
    Render {
        frame: u64,
        #[source]
        source: Box<FrameCutError>,
    },

    #[error("{} of {total} frames failed to render", errors.len())]
    Aggregate {
        total: u64,
        errors: Vec<FrameCutError>,
    },

    #[error("render cancelled")]
    Cancelled,

    #[error("encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FrameCutError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn compute_unavailable(op: impl std::fmt::Display) -> Self {
        Self::ComputeUnavailable { op: op.to_string() }
    }

    pub fn render(frame: u64, source: FrameCutError) -> Self {
        Self::Render {
            frame,
            source: Box::new(source),
        }
    }

    /// Errors that must stop a run regardless of the configured error policy.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Overlap { .. } | Self::DuplicateFrameWrite { .. } | Self::Cancelled => true,
            Self::Render { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
