use crate::foundation::core::{Canvas, Fps, FrameRange};
use crate::foundation::error::{FrameCutError, FrameCutResult};
use crate::timeline::clip::Clip;
use crate::timeline::resolver::TimelineResolver;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// JSON-facing timeline document.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Draft {
    #[serde(default)]
    pub name: String,
    pub canvas: Canvas,
    pub fps: Fps,
    /// Output length in frames.
    pub duration: u64,
    #[serde(default)]
    pub clips: Vec<Clip>,
}

impl Draft {
    /// Parse a draft from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> FrameCutResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| FrameCutError::validation(format!("parse draft JSON: {e}")))
    }

    pub fn from_json_str(s: &str) -> FrameCutResult<Self> {
        Self::from_reader(s.as_bytes())
    }

    /// Parse a draft from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> FrameCutResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            FrameCutError::validation(format!("open draft JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    pub fn validate(&self) -> FrameCutResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(FrameCutError::validation("canvas width/height must be non-zero"));
        }
        Fps::new(self.fps.num, self.fps.den)?;
        for clip in &self.clips {
            clip.validate()?;
        }
        Ok(())
    }

    /// Whole-draft range `[0, duration)`.
    pub fn range(&self) -> FrameRange {
        FrameRange::full(self.duration)
    }

    pub fn resolver(&self) -> FrameCutResult<TimelineResolver> {
        self.validate()?;
        TimelineResolver::new(self.clips.iter().cloned())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/draft.rs"]
mod tests;
