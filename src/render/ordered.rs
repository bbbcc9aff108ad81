//! Ordered output in front of the encoder.
//!
//! Workers hand finished frames over in any order; a writer thread forwards them to the
//! [`FrameSink`] strictly by increasing index. `finish` fills every index that never arrived by
//! recomputing it, so the output always covers the full range.

use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{FrameIndex, FrameRange};
use crate::foundation::error::{FrameCutError, FrameCutResult};
use crate::picture::Picture;
use crossbeam_channel::Sender;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Lifecycle of an [`OrderedSink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkPhase {
    /// Created, encoder not started.
    Idle,
    /// Accepting frames; the writer loop forwards them.
    Running,
    /// `finish` is flushing and regenerating the remainder.
    Draining,
    /// Encoder finalized, or the run was aborted.
    Closed,
}

/// Per-frame progress notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Frame just handed to the encoder.
    pub frame: FrameIndex,
    /// Frames handed to the encoder so far.
    pub finished: u64,
    /// Frames in the range.
    pub total: u64,
}

#[derive(Debug)]
struct SinkState {
    phase: SinkPhase,
    next: u64,
    pending: HashMap<u64, Picture>,
    submitted: Vec<bool>,
}

/// Reordering buffer between render workers and a [`FrameSink`].
pub struct OrderedSink<'a> {
    range: FrameRange,
    cfg: SinkConfig,
    encoder: Mutex<&'a mut dyn FrameSink>,
    state: Mutex<SinkState>,
    arrived: Condvar,
    poll_interval: Duration,
    progress: Option<Sender<ProgressEvent>>,
    written: AtomicU64,
    regenerated: AtomicU64,
}

impl<'a> OrderedSink<'a> {
    pub fn new(encoder: &'a mut dyn FrameSink, range: FrameRange, cfg: SinkConfig) -> Self {
        Self {
            range,
            cfg,
            encoder: Mutex::new(encoder),
            state: Mutex::new(SinkState {
                phase: SinkPhase::Idle,
                next: range.start.0,
                pending: HashMap::new(),
                submitted: vec![false; range.len_frames() as usize],
            }),
            arrived: Condvar::new(),
            poll_interval: Duration::from_millis(2),
            progress: None,
            written: AtomicU64::new(0),
            regenerated: AtomicU64::new(0),
        }
    }

    /// Longest time the writer sleeps before re-checking for the next frame.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_micros(100));
        self
    }

    /// Send a [`ProgressEvent`] per written frame. Delivery failures are ignored.
    pub fn with_progress(mut self, progress: Option<Sender<ProgressEvent>>) -> Self {
        self.progress = progress;
        self
    }

    fn state(&self) -> FrameCutResult<MutexGuard<'_, SinkState>> {
        self.state
            .lock()
            .map_err(|_| FrameCutError::validation("ordered sink state lock poisoned"))
    }

    pub fn phase(&self) -> SinkPhase {
        self.state.lock().map_or(SinkPhase::Closed, |s| s.phase)
    }

    /// Frames handed to the encoder.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::SeqCst)
    }

    /// Frames recomputed by `finish`.
    pub fn regenerated(&self) -> u64 {
        self.regenerated.load(Ordering::SeqCst)
    }

    /// Start the encoder and begin accepting frames.
    pub fn start(&self) -> FrameCutResult<()> {
        let mut state = self.state()?;
        if state.phase != SinkPhase::Idle {
            return Err(FrameCutError::validation("ordered sink already started"));
        }
        self.encoder
            .lock()
            .map_err(|_| FrameCutError::encode("encoder lock poisoned"))?
            .begin(self.cfg)?;
        state.phase = SinkPhase::Running;
        Ok(())
    }

    /// Buffer frame `idx`. Each index may be appended once.
    pub fn append(&self, idx: FrameIndex, pic: Picture) -> FrameCutResult<()> {
        if !self.range.contains(idx) {
            return Err(FrameCutError::validation(format!(
                "frame {idx} is outside the output range {}..{}",
                self.range.start, self.range.end
            )));
        }
        let mut state = self.state()?;
        if state.phase != SinkPhase::Running {
            return Err(FrameCutError::validation(format!(
                "ordered sink is not accepting frames ({:?})",
                state.phase
            )));
        }
        mark_submitted(&mut state, self.range, idx)?;
        state.pending.insert(idx.0, pic);
        drop(state);
        self.arrived.notify_all();
        Ok(())
    }

    /// Writer loop: forward buffered frames in index order until the range is complete, the
    /// sink leaves `Running`, or `should_stop` returns true.
    pub fn run_writer<S>(&self, should_stop: S) -> FrameCutResult<()>
    where
        S: Fn() -> bool,
    {
        loop {
            let mut state = self.state()?;
            let next = state.next;
            if let Some(pic) = state.pending.remove(&next) {
                state.next += 1;
                drop(state);
                self.push(FrameIndex(next), &pic)?;
                continue;
            }
            if next >= self.range.end.0 || state.phase != SinkPhase::Running || should_stop() {
                return Ok(());
            }
            let (guard, _) = self
                .arrived
                .wait_timeout(state, self.poll_interval)
                .map_err(|_| FrameCutError::validation("ordered sink state lock poisoned"))?;
            drop(guard);
        }
    }

    /// Stop accepting frames; wakes the writer so it can exit.
    pub fn begin_drain(&self) -> FrameCutResult<()> {
        let mut state = self.state()?;
        if state.phase == SinkPhase::Running {
            state.phase = SinkPhase::Draining;
        }
        drop(state);
        self.arrived.notify_all();
        Ok(())
    }

    /// Flush everything still buffered, recompute every index that never arrived with
    /// `regenerate`, then finalize the encoder.
    ///
    /// Call after the writer loop has returned.
    pub fn finish<F>(&self, mut regenerate: F) -> FrameCutResult<()>
    where
        F: FnMut(FrameIndex) -> FrameCutResult<Picture>,
    {
        self.begin_drain()?;
        loop {
            let mut state = self.state()?;
            if state.phase != SinkPhase::Draining {
                return Err(FrameCutError::validation(format!(
                    "ordered sink cannot finish from {:?}",
                    state.phase
                )));
            }
            let next = state.next;
            if next >= self.range.end.0 {
                break;
            }
            let buffered = state.pending.remove(&next);
            drop(state);

            let pic = match buffered {
                Some(pic) => pic,
                None => {
                    tracing::warn!(frame = next, "frame never produced, regenerating");
                    let pic = regenerate(FrameIndex(next))?;
                    let mut state = self.state()?;
                    mark_submitted(&mut state, self.range, FrameIndex(next))?;
                    self.regenerated.fetch_add(1, Ordering::SeqCst);
                    pic
                }
            };
            self.state()?.next = next + 1;
            self.push(FrameIndex(next), &pic)?;
        }

        self.encoder
            .lock()
            .map_err(|_| FrameCutError::encode("encoder lock poisoned"))?
            .end()?;
        self.state()?.phase = SinkPhase::Closed;
        Ok(())
    }

    /// Close without finalizing the encoder; buffered frames are dropped.
    pub fn abort(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.phase = SinkPhase::Closed;
            state.pending.clear();
        }
        self.arrived.notify_all();
    }

    fn push(&self, idx: FrameIndex, pic: &Picture) -> FrameCutResult<()> {
        self.encoder
            .lock()
            .map_err(|_| FrameCutError::encode("encoder lock poisoned"))?
            .push_frame(idx, pic)?;
        let finished = self.written.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(tx) = self.progress.as_ref() {
            let _ = tx.try_send(ProgressEvent {
                frame: idx,
                finished,
                total: self.range.len_frames(),
            });
        }
        Ok(())
    }
}

fn mark_submitted(state: &mut SinkState, range: FrameRange, idx: FrameIndex) -> FrameCutResult<()> {
    let slot = (idx.0 - range.start.0) as usize;
    if state.submitted[slot] {
        return Err(FrameCutError::DuplicateFrameWrite { frame: idx.0 });
    }
    state.submitted[slot] = true;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/render/ordered.rs"]
mod tests;
