use crate::decode::{DecodeService, decode_for_output};
use crate::foundation::core::{Canvas, FrameIndex};
use crate::foundation::error::{FrameCutError, FrameCutResult};
use crate::render::cache::FrameCache;
use crate::timeline::resolver::ReadyFrameSet;
use crossbeam_channel::{SendTimeoutError, Sender};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

const PROGRESS_LOG_EVERY: u64 = 50;

/// Frames without any active clip, ascending.
///
/// Workers pop the blanks that precede the frame they are about to render; whatever is left
/// after the pool drains is flushed by the session.
#[derive(Debug, Default)]
pub struct BlankQueue {
    frames: Mutex<VecDeque<FrameIndex>>,
}

impl BlankQueue {
    pub fn new(frames: impl IntoIterator<Item = FrameIndex>) -> Self {
        let mut frames: Vec<FrameIndex> = frames.into_iter().collect();
        frames.sort_unstable();
        frames.dedup();
        Self {
            frames: Mutex::new(frames.into()),
        }
    }

    /// Remove and return every queued frame strictly below `frame`.
    pub fn pop_before(&self, frame: FrameIndex) -> FrameCutResult<Vec<FrameIndex>> {
        let mut frames = self.lock()?;
        let mut out = Vec::new();
        while frames.front().is_some_and(|f| *f < frame) {
            if let Some(f) = frames.pop_front() {
                out.push(f);
            }
        }
        Ok(out)
    }

    /// Remove and return everything still queued.
    pub fn drain_all(&self) -> FrameCutResult<Vec<FrameIndex>> {
        Ok(self.lock()?.drain(..).collect())
    }

    pub fn len(&self) -> usize {
        self.frames.lock().map_or(0, |f| f.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> FrameCutResult<std::sync::MutexGuard<'_, VecDeque<FrameIndex>>> {
        self.frames
            .lock()
            .map_err(|_| FrameCutError::validation("blank queue lock poisoned"))
    }
}

/// What the preparer got through before it returned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PrepareReport {
    /// Frames pushed onto the ready queue.
    pub frames_ready: u64,
    /// Clip pictures stored in the cache.
    pub pictures_cached: u64,
    /// Clip pictures whose decode failed; their frames are still pushed.
    pub decode_failures: u64,
    /// The run stopped (cancel, abort or a dropped ready queue) before every frame was pushed.
    pub stopped: bool,
}

/// Decode-ahead producer.
///
/// Walks the active frames of a [`ReadyFrameSet`] in index order, decodes every active clip at
/// the output resolution into the [`FrameCache`], then pushes the frame onto the ready queue.
/// The ready queue is bounded, so decoding never runs more than its capacity ahead of the
/// workers.
pub struct FramePreparer<'a> {
    ready: &'a ReadyFrameSet,
    decoder: &'a dyn DecodeService,
    cache: &'a FrameCache,
    canvas: Canvas,
    poll_interval: Duration,
}

impl<'a> FramePreparer<'a> {
    pub fn new(
        ready: &'a ReadyFrameSet,
        decoder: &'a dyn DecodeService,
        cache: &'a FrameCache,
        canvas: Canvas,
    ) -> Self {
        Self {
            ready,
            decoder,
            cache,
            canvas,
            poll_interval: Duration::from_millis(2),
        }
    }

    /// How often a blocked push re-checks `should_stop`.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_micros(100));
        self
    }

    /// Run to completion or until `should_stop` returns true.
    ///
    /// A clip that fails to decode is logged and left out of the cache; the worker that renders
    /// the frame sees the miss and decodes again, surfacing the error under the run's policy.
    pub fn run<S>(&self, ready_tx: Sender<FrameIndex>, should_stop: S) -> PrepareReport
    where
        S: Fn() -> bool,
    {
        let mut report = PrepareReport::default();
        let total = self.ready.active_len() as u64;

        for (frame, clips) in self.ready.active_frames() {
            for active in clips {
                if should_stop() {
                    report.stopped = true;
                    return report;
                }
                let pic = match decode_for_output(
                    self.decoder,
                    &active.clip,
                    active.source_frame,
                    self.canvas,
                ) {
                    Ok(pic) => pic,
                    Err(e) => {
                        tracing::warn!(
                            frame = frame.0,
                            clip = %active.clip.id,
                            error = %e,
                            "decode failed while preparing"
                        );
                        report.decode_failures += 1;
                        continue;
                    }
                };
                if let Err(e) = self.cache.insert(&active.clip.id, frame, pic) {
                    tracing::warn!(frame = frame.0, clip = %active.clip.id, error = %e, "cache insert failed");
                    continue;
                }
                report.pictures_cached += 1;
            }

            if !self.push_ready(&ready_tx, frame, &should_stop) {
                report.stopped = true;
                return report;
            }
            report.frames_ready += 1;
            if report.frames_ready % PROGRESS_LOG_EVERY == 0 {
                tracing::info!(prepared = report.frames_ready, total, "preparing frames");
            }
        }

        tracing::debug!(
            prepared = report.frames_ready,
            failures = report.decode_failures,
            "preparer finished"
        );
        report
    }

    fn push_ready<S>(&self, ready_tx: &Sender<FrameIndex>, frame: FrameIndex, should_stop: &S) -> bool
    where
        S: Fn() -> bool,
    {
        loop {
            if should_stop() {
                return false;
            }
            match ready_tx.send_timeout(frame, self.poll_interval) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(_)) => continue,
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/prepare.rs"]
mod tests;
