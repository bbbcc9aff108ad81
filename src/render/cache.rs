use crate::foundation::core::FrameIndex;
use crate::foundation::error::{FrameCutError, FrameCutResult};
use crate::picture::Picture;
use std::collections::HashMap;
use std::sync::Mutex;

/// Hand-off of prepared clip pictures from the preparer to the workers.
///
/// One slot map per clip; entries are removed when taken and never evicted otherwise.
#[derive(Debug, Default)]
pub struct FrameCache {
    clips: HashMap<String, Mutex<HashMap<FrameIndex, Picture>>>,
}

impl FrameCache {
    pub fn new<'a>(clip_ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            clips: clip_ids
                .into_iter()
                .map(|id| (id.to_owned(), Mutex::new(HashMap::new())))
                .collect(),
        }
    }

    fn slot(&self, clip_id: &str) -> FrameCutResult<&Mutex<HashMap<FrameIndex, Picture>>> {
        self.clips
            .get(clip_id)
            .ok_or_else(|| FrameCutError::validation(format!("no cache slot for clip '{clip_id}'")))
    }

    pub fn insert(&self, clip_id: &str, frame: FrameIndex, pic: Picture) -> FrameCutResult<()> {
        self.slot(clip_id)?
            .lock()
            .map_err(|_| FrameCutError::validation("frame cache lock poisoned"))?
            .insert(frame, pic);
        Ok(())
    }

    /// Remove and return the picture of `clip_id` at `frame`.
    pub fn take(&self, clip_id: &str, frame: FrameIndex) -> FrameCutResult<Option<Picture>> {
        Ok(self
            .slot(clip_id)?
            .lock()
            .map_err(|_| FrameCutError::validation("frame cache lock poisoned"))?
            .remove(&frame))
    }

    /// Number of pictures currently held.
    pub fn len(&self) -> usize {
        self.clips
            .values()
            .map(|m| m.lock().map_or(0, |m| m.len()))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/cache.rs"]
mod tests;
