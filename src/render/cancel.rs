use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag, checked at every scheduling poll point.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Stop conditions of one run: the caller's token plus an internal abort raised by fatal
/// errors.
#[derive(Debug, Default)]
pub(crate) struct RunFlags {
    pub(crate) cancel: CancellationToken,
    abort: AtomicBool,
}

impl RunFlags {
    pub(crate) fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            abort: AtomicBool::new(false),
        }
    }

    pub(crate) fn abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    pub(crate) fn should_stop(&self) -> bool {
        self.abort.load(Ordering::SeqCst) || self.cancel.is_cancelled()
    }
}
