use crate::foundation::core::{FrameIndex, FrameRange};
use crate::foundation::error::{FrameCutError, FrameCutResult};
use crate::timeline::clip::Clip;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// A clip taking part in one output frame.
#[derive(Clone, Debug)]
pub struct ActiveClip {
    pub clip: Arc<Clip>,
    /// Source frame to decode for this output frame.
    pub source_frame: u64,
}

impl ActiveClip {
    pub fn layer(&self) -> u32 {
        self.clip.layer
    }
}

/// Maps output frames to the clips active on them.
#[derive(Clone, Debug)]
pub struct TimelineResolver {
    clips: Vec<Arc<Clip>>,
}

impl TimelineResolver {
    /// Validate clips (unique ids, sane ratios) and build a resolver.
    pub fn new(clips: impl IntoIterator<Item = Clip>) -> FrameCutResult<Self> {
        let clips: Vec<Arc<Clip>> = clips.into_iter().map(Arc::new).collect();
        let mut ids = HashSet::new();
        for clip in &clips {
            clip.validate()?;
            if !ids.insert(clip.id.as_str()) {
                return Err(FrameCutError::validation(format!(
                    "duplicate clip id '{}'",
                    clip.id
                )));
            }
        }
        Ok(Self { clips })
    }

    pub fn clips(&self) -> &[Arc<Clip>] {
        &self.clips
    }

    /// Clips contributing to `frame`, ascending by layer.
    ///
    /// Two contributing clips on one layer is an `Overlap` error naming both.
    pub fn active_clips_for(&self, frame: FrameIndex) -> FrameCutResult<Vec<ActiveClip>> {
        let mut active: Vec<ActiveClip> = self
            .clips
            .iter()
            .filter_map(|clip| {
                clip.source_frame_for(frame).map(|source_frame| ActiveClip {
                    clip: Arc::clone(clip),
                    source_frame,
                })
            })
            .collect();
        active.sort_by_key(ActiveClip::layer);

        if let Some(pair) = active.windows(2).find(|w| w[0].layer() == w[1].layer()) {
            return Err(FrameCutError::Overlap {
                frame: frame.0,
                layer: pair[0].layer(),
                first: pair[0].clip.id.clone(),
                second: pair[1].clip.id.clone(),
            });
        }
        Ok(active)
    }

    /// Resolve every frame of `range` up front.
    #[tracing::instrument(skip(self), fields(clips = self.clips.len()))]
    pub fn build_ready_set(&self, range: FrameRange) -> FrameCutResult<ReadyFrameSet> {
        let mut frames = BTreeMap::new();
        let mut blanks = Vec::new();
        for frame in range.iter() {
            let active = self.active_clips_for(frame)?;
            if active.is_empty() {
                blanks.push(frame);
            } else {
                frames.insert(frame, active);
            }
        }
        tracing::debug!(
            active = frames.len(),
            blank = blanks.len(),
            "ready set built"
        );
        Ok(ReadyFrameSet {
            range,
            frames,
            blanks,
        })
    }
}

/// Per-frame clip membership for a whole render range, built once.
#[derive(Clone, Debug)]
pub struct ReadyFrameSet {
    range: FrameRange,
    frames: BTreeMap<FrameIndex, Vec<ActiveClip>>,
    blanks: Vec<FrameIndex>,
}

impl ReadyFrameSet {
    pub fn range(&self) -> FrameRange {
        self.range
    }

    /// Active clips of `frame`, ascending by layer. `None` for blank or out-of-range frames.
    pub fn get(&self, frame: FrameIndex) -> Option<&[ActiveClip]> {
        self.frames.get(&frame).map(Vec::as_slice)
    }

    /// Frames with at least one clip, in increasing order.
    pub fn active_frames(&self) -> impl Iterator<Item = (FrameIndex, &[ActiveClip])> {
        self.frames.iter().map(|(f, c)| (*f, c.as_slice()))
    }

    /// Frames with no clip, in increasing order.
    pub fn blanks(&self) -> &[FrameIndex] {
        &self.blanks
    }

    pub fn active_len(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/resolver.rs"]
mod tests;
