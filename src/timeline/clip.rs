use crate::compose::effect::Effect;
use crate::compose::mixture::MixtureMode;
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{FrameCutError, FrameCutResult};
use std::path::PathBuf;

/// Where a clip's pictures come from.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum ClipSource {
    /// Video file, decoded frame by frame.
    Video { path: PathBuf },
    /// Still image, shown on every frame.
    Photo { path: PathBuf },
    /// Synthetic uniform color (8-bit RGB, optional 8-bit alpha).
    Solid {
        r: u8,
        g: u8,
        b: u8,
        #[serde(default)]
        a: Option<u8>,
    },
}

impl ClipSource {
    /// File backing the clip, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            ClipSource::Video { path } | ClipSource::Photo { path } => Some(path),
            ClipSource::Solid { .. } => None,
        }
    }
}

fn default_speed_ratio() -> f64 {
    1.0
}

/// A timeline entry. Frame counts are in the output timebase.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Clip {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Stacking order; higher is on top.
    pub layer: u32,
    /// First output frame.
    pub start_frame: u64,
    /// Offset into the source where playback begins.
    #[serde(default)]
    pub relative_start_frame: u64,
    /// Length in frames.
    pub duration: u64,
    /// Source time per output frame.
    #[serde(default = "default_speed_ratio")]
    pub speed_ratio: f64,
    /// How this clip combines with the accumulated layers above it.
    #[serde(default)]
    pub mixture: MixtureMode,
    /// Effects applied in order before mixing.
    #[serde(default)]
    pub effects: Vec<Effect>,
    /// Picture source.
    pub source: ClipSource,
}

impl Clip {
    pub fn validate(&self) -> FrameCutResult<()> {
        if self.id.is_empty() {
            return Err(FrameCutError::validation("clip id must not be empty"));
        }
        if !self.speed_ratio.is_finite() || self.speed_ratio <= 0.0 {
            return Err(FrameCutError::validation(format!(
                "clip '{}' speed_ratio must be finite and > 0, got {}",
                self.id, self.speed_ratio
            )));
        }
        Ok(())
    }

    /// Map an output frame to a source frame.
    ///
    /// `Ok(None)` means `target` is exactly one frame past the clip's end. Frames before the clip
    /// or further past its end are a `FrameRange` error. Every `round` is ties-to-even.
    pub fn resolve_relative_index(&self, target: FrameIndex) -> FrameCutResult<Option<u64>> {
        let ratio = self.speed_ratio;
        let scaled = |v: u64| (v as f64 * ratio).round_ties_even() as i64;
        let eff_duration = scaled(self.duration);
        let eff_start = scaled(self.start_frame);
        let eff_rel_start = scaled(self.relative_start_frame);

        let offset = target.0 as i64 - eff_start;
        if offset == eff_duration {
            return Ok(None);
        }
        if offset < 0 || offset >= eff_duration {
            return Err(FrameCutError::FrameRange {
                clip: self.id.clone(),
                frame: target.0,
                start: eff_start,
                end: eff_start + eff_duration,
            });
        }
        let source = ((eff_rel_start + offset) as f64 / ratio).round_ties_even();
        Ok(Some(source.max(0.0) as u64))
    }

    /// Activity window test: `start * ratio <= frame <= (start + duration) * ratio`.
    pub fn is_active(&self, frame: FrameIndex) -> bool {
        let f = frame.0 as f64;
        let start = self.start_frame as f64 * self.speed_ratio;
        let end = (self.start_frame + self.duration) as f64 * self.speed_ratio;
        start <= f && f <= end
    }

    /// Source frame this clip contributes to `frame`, or `None` when it contributes nothing.
    ///
    /// The one-past-end position and rounding-edge misses of an otherwise active clip both
    /// count as "not contributing".
    pub fn source_frame_for(&self, frame: FrameIndex) -> Option<u64> {
        if !self.is_active(frame) {
            return None;
        }
        match self.resolve_relative_index(frame) {
            Ok(source) => source,
            Err(e) => {
                tracing::debug!(clip = %self.id, frame = frame.0, error = %e, "clip skipped at window edge");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/clip.rs"]
mod tests;
