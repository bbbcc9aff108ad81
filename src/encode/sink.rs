use crate::encode::ffmpeg::ensure_parent_dir;
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{FrameCutError, FrameCutResult};
use crate::picture::Picture;
use image::{ImageBuffer, ImageFormat, Rgb, Rgba};
use std::path::{Path, PathBuf};

/// Configuration provided to a [`FrameSink`] at the start of a range render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames-per-second.
    pub fps: Fps,
}

/// Sink contract for consuming rendered frames in timeline order.
///
/// Ordering contract: `push_frame` is called in strictly increasing `FrameIndex` order.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> FrameCutResult<()>;
    /// Push one frame in strictly increasing timeline order.
    fn push_frame(&mut self, idx: FrameIndex, frame: &Picture) -> FrameCutResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> FrameCutResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    ended: bool,
    frames: Vec<(FrameIndex, Picture)>,
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the sink configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    /// Borrow the captured frames.
    pub fn frames(&self) -> &[(FrameIndex, Picture)] {
        &self.frames
    }

    /// `true` once `end` has been called.
    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> FrameCutResult<()> {
        self.cfg = Some(cfg);
        self.ended = false;
        self.frames.clear();
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &Picture) -> FrameCutResult<()> {
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> FrameCutResult<()> {
        self.ended = true;
        Ok(())
    }
}

/// Pixel layout of an image sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageSequenceFormat {
    /// 16-bit RGB PNG, alpha flattened.
    Png16,
    /// 8-bit RGB PNG, alpha flattened.
    Png8,
    /// 16-bit RGBA PNG.
    Png16Alpha,
    /// 8-bit RGBA PNG.
    Png8Alpha,
}

/// Sink writing one PNG per frame as `frame_{index:06}.png`.
#[derive(Debug)]
pub struct ImageSequenceSink {
    dir: PathBuf,
    format: ImageSequenceFormat,
    upper_bound: u16,
    cfg: Option<SinkConfig>,
    last_idx: Option<FrameIndex>,
}

impl ImageSequenceSink {
    pub fn new(dir: impl Into<PathBuf>, format: ImageSequenceFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
            upper_bound: 0,
            cfg: None,
            last_idx: None,
        }
    }

    /// Clamp flattened color to `upper_bound` (0 = unbounded). Ignored by alpha formats.
    pub fn with_upper_bound(mut self, upper_bound: u16) -> Self {
        self.upper_bound = upper_bound;
        self
    }

    /// Path the frame `idx` is written to.
    pub fn frame_path(&self, idx: FrameIndex) -> PathBuf {
        frame_path_in(&self.dir, idx)
    }
}

fn frame_path_in(dir: &Path, idx: FrameIndex) -> PathBuf {
    dir.join(format!("frame_{:06}.png", idx.0))
}

impl FrameSink for ImageSequenceSink {
    fn begin(&mut self, cfg: SinkConfig) -> FrameCutResult<()> {
        ensure_parent_dir(&self.dir.join("frame"))?;
        self.cfg = Some(cfg);
        self.last_idx = None;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &Picture) -> FrameCutResult<()> {
        let cfg = self
            .cfg
            .ok_or_else(|| FrameCutError::encode("image sequence sink not started"))?;
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(FrameCutError::encode(
                "image sequence sink received out-of-order frame index",
            ));
        }
        self.last_idx = Some(idx);
        if frame.width() != cfg.width || frame.height() != cfg.height {
            return Err(FrameCutError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                cfg.width,
                cfg.height
            )));
        }

        let (w, h) = (frame.width(), frame.height());
        let path = self.frame_path(idx);
        let mismatch = || FrameCutError::validation("frame buffer does not match its size");
        let res = match self.format {
            ImageSequenceFormat::Png16Alpha => {
                ImageBuffer::<Rgba<u16>, _>::from_raw(w, h, frame.to_rgba16())
                    .ok_or_else(mismatch)?
                    .save_with_format(&path, ImageFormat::Png)
            }
            ImageSequenceFormat::Png8Alpha => {
                ImageBuffer::<Rgba<u8>, _>::from_raw(w, h, frame.to_rgba8())
                    .ok_or_else(mismatch)?
                    .save_with_format(&path, ImageFormat::Png)
            }
            ImageSequenceFormat::Png16 => {
                let flat = frame.flattened(self.upper_bound);
                ImageBuffer::<Rgb<u16>, _>::from_raw(w, h, flat.to_rgb16())
                    .ok_or_else(mismatch)?
                    .save_with_format(&path, ImageFormat::Png)
            }
            ImageSequenceFormat::Png8 => {
                let flat = frame.flattened(self.upper_bound);
                ImageBuffer::<Rgb<u8>, _>::from_raw(w, h, flat.to_rgb8())
                    .ok_or_else(mismatch)?
                    .save_with_format(&path, ImageFormat::Png)
            }
        };
        res.map_err(|e| {
            FrameCutError::encode(format!("failed to write '{}': {e}", path.display()))
        })
    }

    fn end(&mut self) -> FrameCutResult<()> {
        self.cfg = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/sink.rs"]
mod tests;
