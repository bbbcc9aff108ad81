use crate::compose::effect::apply_effects;
use crate::compose::mixture::MixtureEngine;
use crate::compute::{BlendParams, ComputeDispatcher};
use crate::decode::{DecodeService, decode_for_output};
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{Canvas, Fps, FrameIndex, FrameRange};
use crate::foundation::error::{FrameCutError, FrameCutResult};
use crate::picture::Picture;
use crate::render::cache::FrameCache;
use crate::render::cancel::{CancellationToken, RunFlags};
use crate::render::ordered::{OrderedSink, ProgressEvent};
use crate::render::prepare::{BlankQueue, FramePreparer, PrepareReport};
use crate::timeline::draft::Draft;
use crate::timeline::resolver::{ActiveClip, ReadyFrameSet, TimelineResolver};
use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a failed frame does to the run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Record the failure, keep rendering; the worker regenerates the frame at once (or writes
    /// a blank) so later frames are not held back, and the run succeeds.
    #[default]
    Deferred,
    /// Stop at the first failure without finalizing the output.
    Immediate,
    /// Record failures, finish the output, then return them all as one aggregate error.
    Strict,
}

/// Options controlling [`RenderSession::render_range`].
#[derive(Clone, Debug)]
pub struct RenderOpts {
    /// Upper bound on concurrently rendering workers.
    pub max_threads: usize,
    pub error_policy: ErrorPolicy,
    /// Arithmetic blend parameters for add/subtract/multiply.
    pub blend: BlendParams,
    /// Sleep between scheduler and writer polls.
    pub poll_interval: Duration,
    /// Warn when the share of cache misses exceeds this ratio.
    pub miss_warn_ratio: f64,
    /// Receives one event per frame handed to the sink.
    pub progress: Option<Sender<ProgressEvent>>,
}

impl Default for RenderOpts {
    fn default() -> Self {
        Self {
            max_threads: default_max_threads(),
            error_policy: ErrorPolicy::default(),
            blend: BlendParams::default(),
            poll_interval: Duration::from_millis(2),
            miss_warn_ratio: 0.1,
            progress: None,
        }
    }
}

/// 1.75 workers per available core.
pub fn default_max_threads() -> usize {
    let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
    (cores * 7 / 4).max(1)
}

/// Range render statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Frames in the requested range.
    pub frames_total: u64,
    /// Frames composed by the worker pool.
    pub frames_rendered: u64,
    /// Frames with no active clip.
    pub frames_blank: u64,
    /// Frames recomputed while finishing the sink.
    pub frames_regenerated: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Frames whose render failed at least once.
    pub frames_failed: u64,
}

/// Renderer for one draft.
///
/// Resolves the timeline once; every render shares the decoder and the compute dispatcher.
pub struct RenderSession {
    canvas: Canvas,
    fps: Fps,
    duration: u64,
    resolver: TimelineResolver,
    decoder: Arc<dyn DecodeService>,
    compute: ComputeDispatcher,
    opts: RenderOpts,
}

impl RenderSession {
    pub fn new(
        draft: &Draft,
        decoder: Arc<dyn DecodeService>,
        compute: ComputeDispatcher,
        opts: RenderOpts,
    ) -> FrameCutResult<Self> {
        if opts.max_threads == 0 {
            return Err(FrameCutError::validation("max_threads must be >= 1"));
        }
        let resolver = draft.resolver()?;
        Ok(Self {
            canvas: draft.canvas,
            fps: draft.fps,
            duration: draft.duration,
            resolver,
            decoder,
            compute,
            opts,
        })
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Whole-draft range.
    pub fn range(&self) -> FrameRange {
        FrameRange::full(self.duration)
    }

    pub fn opts(&self) -> &RenderOpts {
        &self.opts
    }

    pub fn sink_config(&self) -> SinkConfig {
        SinkConfig {
            width: self.canvas.width,
            height: self.canvas.height,
            fps: self.fps,
        }
    }

    /// Compose one frame synchronously, decoding every active clip.
    pub fn render_frame(&self, frame: FrameIndex) -> FrameCutResult<Picture> {
        if !self.range().contains(frame) {
            return Err(FrameCutError::validation(format!(
                "frame {frame} is outside the draft (duration {})",
                self.duration
            )));
        }
        let active = self.resolver.active_clips_for(frame)?;
        self.compose(&active, |a| {
            decode_for_output(self.decoder.as_ref(), &a.clip, a.source_frame, self.canvas)
        })
    }

    /// Fold active clips (ascending by layer) into one picture, top layer first.
    fn compose<F>(&self, active: &[ActiveClip], mut fetch: F) -> FrameCutResult<Picture>
    where
        F: FnMut(&ActiveClip) -> FrameCutResult<Picture>,
    {
        if active.is_empty() {
            return Ok(Picture::transparent(self.canvas.width, self.canvas.height));
        }
        let mut layers = Vec::with_capacity(active.len());
        for a in active.iter().rev() {
            let pic = fetch(a)?;
            let pic = apply_effects(pic, &a.clip.effects, &self.compute, self.canvas)?;
            layers.push((pic, a.clip.mixture));
        }
        MixtureEngine::new(&self.compute, self.opts.blend).compose(layers)
    }

    /// Render `range` into `sink` with the bounded worker pool.
    ///
    /// The whole range is resolved first, so an overlapping layer aborts before any frame
    /// reaches the sink. Frames always reach the sink in index order.
    #[tracing::instrument(skip(self, sink, cancel), fields(start = range.start.0, end = range.end.0))]
    pub fn render_range(
        &self,
        range: FrameRange,
        sink: &mut dyn FrameSink,
        cancel: &CancellationToken,
    ) -> FrameCutResult<RenderStats> {
        if range.end.0 > self.duration {
            return Err(FrameCutError::validation(format!(
                "range {}..{} exceeds draft duration {}",
                range.start, range.end, self.duration
            )));
        }
        let ready = self.resolver.build_ready_set(range)?;
        let max_threads = self.opts.max_threads;
        let pool = build_thread_pool(max_threads)?;

        let ordered = OrderedSink::new(sink, range, self.sink_config())
            .with_poll_interval(self.opts.poll_interval)
            .with_progress(self.opts.progress.clone());
        let run = RunState::new(self, &ready, &ordered, RunFlags::new(cancel.clone()));

        ordered.start()?;
        tracing::info!(
            frames = range.len_frames(),
            active = ready.active_len(),
            blank = ready.blanks().len(),
            workers = max_threads,
            backend = self.compute.backend_name(),
            "render started"
        );

        std::thread::scope(|scope| -> FrameCutResult<()> {
            let writer = scope.spawn(|| {
                let res = catch_panic("frame writer", || {
                    ordered.run_writer(|| run.flags.should_stop())
                });
                if res.is_err() {
                    run.flags.abort();
                }
                res
            });

            let (ready_tx, ready_rx) = crossbeam_channel::bounded((max_threads * 2).max(2));
            let preparer = scope.spawn(|| {
                let flags = &run.flags;
                let preparer =
                    FramePreparer::new(&ready, self.decoder.as_ref(), &run.cache, self.canvas)
                        .with_poll_interval(self.opts.poll_interval);
                let report = catch_panic("frame preparer", move || {
                    Ok(preparer.run(ready_tx, || flags.should_stop()))
                });
                run.preparer_done.store(true, Ordering::SeqCst);
                report.unwrap_or_else(|e| {
                    run.abort_with(e);
                    PrepareReport {
                        stopped: true,
                        ..PrepareReport::default()
                    }
                })
            });

            let (job_tx, job_rx) = crossbeam_channel::bounded::<FrameIndex>(0);
            pool.in_place_scope(|s| {
                let run = &run;
                for _ in 0..max_threads {
                    let jobs = job_rx.clone();
                    s.spawn(move |_| run.worker_loop(jobs));
                }
                drop(job_rx);
                run.dispatch(ready_rx, job_tx);
            });

            let report = match preparer.join() {
                Ok(report) => report,
                Err(_) => {
                    run.flags.abort();
                    ordered.abort();
                    return Err(FrameCutError::validation("preparer thread panicked"));
                }
            };
            tracing::debug!(?report, "preparer joined");

            if run.flags.should_stop() {
                ordered.abort();
            } else {
                if let Err(e) = run.flush_blanks(None) {
                    run.record_failure(range.start, e);
                }
                ordered.begin_drain()?;
            }
            writer
                .join()
                .map_err(|_| FrameCutError::validation("writer thread panicked"))?
        })
        .inspect_err(|_| ordered.abort())?;

        if cancel.is_cancelled() {
            ordered.abort();
            tracing::info!(written = ordered.written(), "render cancelled");
            return Err(FrameCutError::Cancelled);
        }
        if let Some(err) = run.take_abort_error()? {
            ordered.abort();
            return Err(err);
        }

        ordered
            .finish(|frame| run.regenerate(frame))
            .inspect_err(|_| ordered.abort())?;

        let failures = run.take_failures()?;
        let stats = run.stats(range, failures.len() as u64);
        self.log_summary(&stats);

        if self.opts.error_policy == ErrorPolicy::Strict && !failures.is_empty() {
            return Err(FrameCutError::Aggregate {
                total: stats.frames_total,
                errors: failures
                    .into_iter()
                    .map(|(frame, e)| FrameCutError::render(frame, e))
                    .collect(),
            });
        }
        Ok(stats)
    }

    fn log_summary(&self, stats: &RenderStats) {
        let lookups = stats.cache_hits + stats.cache_misses;
        if lookups > 0 {
            let miss_ratio = stats.cache_misses as f64 / lookups as f64;
            if miss_ratio > self.opts.miss_warn_ratio {
                tracing::warn!(
                    misses = stats.cache_misses,
                    lookups,
                    "high cache miss rate; workers are decoding synchronously"
                );
            }
        }
        tracing::info!(
            total = stats.frames_total,
            rendered = stats.frames_rendered,
            blank = stats.frames_blank,
            regenerated = stats.frames_regenerated,
            failed = stats.frames_failed,
            "render finished"
        );
    }
}

/// Shared state of one `render_range` call.
struct RunState<'s, 'o> {
    session: &'s RenderSession,
    ready: &'s ReadyFrameSet,
    ordered: &'s OrderedSink<'o>,
    flags: RunFlags,
    cache: FrameCache,
    blanks: BlankQueue,
    preparer_done: AtomicBool,
    finished: AtomicU64,
    rendered: AtomicU64,
    regenerated: AtomicU64,
    blank_written: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    failures: Mutex<BTreeMap<u64, FrameCutError>>,
    abort_error: Mutex<Option<FrameCutError>>,
}

impl<'s, 'o> RunState<'s, 'o> {
    fn new(
        session: &'s RenderSession,
        ready: &'s ReadyFrameSet,
        ordered: &'s OrderedSink<'o>,
        flags: RunFlags,
    ) -> Self {
        let cache = FrameCache::new(session.resolver.clips().iter().map(|c| c.id.as_str()));
        Self {
            session,
            ready,
            ordered,
            flags,
            cache,
            blanks: BlankQueue::new(ready.blanks().iter().copied()),
            preparer_done: AtomicBool::new(false),
            finished: AtomicU64::new(0),
            rendered: AtomicU64::new(0),
            regenerated: AtomicU64::new(0),
            blank_written: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            failures: Mutex::new(BTreeMap::new()),
            abort_error: Mutex::new(None),
        }
    }

    /// Hand ready frames to idle workers.
    ///
    /// Before taking a frame the loop waits while many frames remain and the ready queue holds
    /// fewer than half a pool's worth, unless the preparer has already finished.
    fn dispatch(&self, ready_rx: Receiver<FrameIndex>, job_tx: Sender<FrameIndex>) {
        let poll = self.session.opts.poll_interval;
        let half = (self.session.opts.max_threads / 2) as i64;
        let total = self.ready.range().len_frames() as i64;

        loop {
            if self.flags.should_stop() {
                break;
            }
            let remaining = total - self.finished.load(Ordering::SeqCst) as i64;
            if remaining > half - 2
                && (ready_rx.len() as i64) < half
                && !self.preparer_done.load(Ordering::SeqCst)
            {
                std::thread::sleep(poll);
                continue;
            }
            match ready_rx.recv_timeout(poll) {
                Ok(frame) => {
                    if !self.send_job(&job_tx, frame) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn send_job(&self, job_tx: &Sender<FrameIndex>, frame: FrameIndex) -> bool {
        let poll = self.session.opts.poll_interval;
        loop {
            if self.flags.should_stop() {
                return false;
            }
            match job_tx.send_timeout(frame, poll) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(_)) => continue,
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }

    fn worker_loop(&self, jobs: Receiver<FrameIndex>) {
        for frame in jobs.iter() {
            if self.flags.should_stop() {
                break;
            }
            if let Err(e) = catch_panic("render worker", || self.render_job(frame)) {
                if self.record_failure(frame, e) {
                    self.fill_in(frame);
                }
            }
        }
    }

    /// Write a replacement for a frame that failed in a worker so the writer does not stall
    /// behind it; whatever cannot be appended here is left for `OrderedSink::finish`.
    fn fill_in(&self, frame: FrameIndex) {
        if self.flags.should_stop() {
            return;
        }
        match self
            .regenerate(frame)
            .and_then(|pic| self.ordered.append(frame, pic))
        {
            Ok(()) => {
                self.finished.fetch_add(1, Ordering::SeqCst);
                self.regenerated.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) if e.is_fatal() => {
                self.record_failure(frame, e);
            }
            Err(e) => {
                tracing::debug!(frame = frame.0, error = %e, "failed frame left for the final pass");
            }
        }
    }

    /// Recompute `frame` outside the pool. A non-fatal failure under a deferring policy is
    /// recorded and yields a transparent frame.
    fn regenerate(&self, frame: FrameIndex) -> FrameCutResult<Picture> {
        let session = self.session;
        match catch_panic("frame regeneration", || session.render_frame(frame)) {
            Ok(pic) => Ok(pic),
            Err(e) if e.is_fatal() || session.opts.error_policy == ErrorPolicy::Immediate => {
                Err(e)
            }
            Err(e) => {
                tracing::error!(frame = frame.0, error = %e, "regeneration failed, writing a blank frame");
                self.note_failure(frame, e)?;
                Ok(Picture::transparent(
                    session.canvas.width,
                    session.canvas.height,
                ))
            }
        }
    }

    fn render_job(&self, frame: FrameIndex) -> FrameCutResult<()> {
        self.flush_blanks(Some(frame))?;

        let active = self.ready.get(frame).unwrap_or_default();
        let pic = self.session.compose(active, |a| self.fetch(frame, a))?;
        self.ordered.append(frame, pic)?;
        self.finished.fetch_add(1, Ordering::SeqCst);
        self.rendered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Cached picture of `a` at `frame`; a miss decodes synchronously.
    fn fetch(&self, frame: FrameIndex, a: &ActiveClip) -> FrameCutResult<Picture> {
        if self.flags.should_stop() {
            return Err(FrameCutError::Cancelled);
        }
        if let Some(pic) = self.cache.take(&a.clip.id, frame)? {
            self.hits.fetch_add(1, Ordering::SeqCst);
            return Ok(pic);
        }
        self.misses.fetch_add(1, Ordering::SeqCst);
        tracing::warn!(frame = frame.0, clip = %a.clip.id, "cache miss, decoding in worker");
        decode_for_output(
            self.session.decoder.as_ref(),
            &a.clip,
            a.source_frame,
            self.session.canvas,
        )
    }

    /// Write queued blank frames below `before` (all of them when `None`).
    fn flush_blanks(&self, before: Option<FrameIndex>) -> FrameCutResult<()> {
        let frames = match before {
            Some(frame) => self.blanks.pop_before(frame)?,
            None => self.blanks.drain_all()?,
        };
        let canvas = self.session.canvas;
        for frame in frames {
            self.ordered
                .append(frame, Picture::transparent(canvas.width, canvas.height))?;
            self.finished.fetch_add(1, Ordering::SeqCst);
            self.blank_written.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Log a failed frame and apply the error policy. Returns true when the run goes on.
    fn record_failure(&self, frame: FrameIndex, err: FrameCutError) -> bool {
        if matches!(err, FrameCutError::Cancelled) && self.flags.should_stop() {
            return false;
        }
        tracing::error!(frame = frame.0, error = %err, "frame failed");
        if err.is_fatal() {
            self.abort_with(err);
            return false;
        }
        if self.session.opts.error_policy == ErrorPolicy::Immediate {
            self.abort_with(FrameCutError::render(frame.0, err));
            return false;
        }
        if let Ok(mut failures) = self.failures.lock() {
            failures.entry(frame.0).or_insert(err);
        }
        true
    }

    /// Stop the run; the first error wins.
    fn abort_with(&self, err: FrameCutError) {
        if let Ok(mut slot) = self.abort_error.lock() {
            slot.get_or_insert(err);
        }
        self.flags.abort();
    }

    fn note_failure(&self, frame: FrameIndex, err: FrameCutError) -> FrameCutResult<()> {
        self.failures
            .lock()
            .map_err(|_| FrameCutError::validation("failure list lock poisoned"))?
            .entry(frame.0)
            .or_insert(err);
        Ok(())
    }

    fn take_abort_error(&self) -> FrameCutResult<Option<FrameCutError>> {
        Ok(self
            .abort_error
            .lock()
            .map_err(|_| FrameCutError::validation("abort slot lock poisoned"))?
            .take())
    }

    fn take_failures(&self) -> FrameCutResult<BTreeMap<u64, FrameCutError>> {
        Ok(std::mem::take(
            &mut *self
                .failures
                .lock()
                .map_err(|_| FrameCutError::validation("failure list lock poisoned"))?,
        ))
    }

    fn stats(&self, range: FrameRange, failed: u64) -> RenderStats {
        RenderStats {
            frames_total: range.len_frames(),
            frames_rendered: self.rendered.load(Ordering::SeqCst),
            frames_blank: self.blank_written.load(Ordering::SeqCst),
            frames_regenerated: self.regenerated.load(Ordering::SeqCst)
                + self.ordered.regenerated(),
            cache_hits: self.hits.load(Ordering::SeqCst),
            cache_misses: self.misses.load(Ordering::SeqCst),
            frames_failed: failed,
        }
    }
}

/// Run `f`, turning a panic into an error naming `what`.
fn catch_panic<T, F>(what: &str, f: F) -> FrameCutResult<T>
where
    F: FnOnce() -> FrameCutResult<T>,
{
    std::panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(FrameCutError::Other(anyhow::anyhow!(
            "{what} panicked: {}",
            panic_message(payload.as_ref())
        )))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn build_thread_pool(threads: usize) -> FrameCutResult<rayon::ThreadPool> {
    if threads == 0 {
        return Err(FrameCutError::validation("worker count must be >= 1"));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("framecut-worker-{i}"))
        .build()
        .map_err(|e| FrameCutError::validation(format!("failed to build worker pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/render/session.rs"]
mod tests;
