//! Compute-dispatch service: named elementwise operations over channel buffers.
//!
//! A [`ComputeBackend`] hands out [`Computer`]s by [`ComputeOp`]. Each computer declares whether it
//! may be called from several threads at once; [`ComputeDispatcher`] serializes calls only for
//! computers that say they are not thread-safe.

/// Built-in CPU backend.
pub mod cpu;

use crate::foundation::error::{FrameCutError, FrameCutResult};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

pub use cpu::CpuBackend;

/// Operation names a backend can be asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComputeOp {
    /// Channel addition.
    Add,
    /// Channel subtraction.
    Subtract,
    /// Channel multiplication.
    Multiply,
    /// Alpha compositing of a foreground over a background.
    Overlay,
    /// Chroma-window removal.
    RemoveColor,
}

impl ComputeOp {
    /// Every operation, in declaration order.
    pub const ALL: [ComputeOp; 5] = [
        ComputeOp::Add,
        ComputeOp::Subtract,
        ComputeOp::Multiply,
        ComputeOp::Overlay,
        ComputeOp::RemoveColor,
    ];

    /// Stable operation name.
    pub fn name(self) -> &'static str {
        match self {
            ComputeOp::Add => "add",
            ComputeOp::Subtract => "subtract",
            ComputeOp::Multiply => "multiply",
            ComputeOp::Overlay => "overlay",
            ComputeOp::RemoveColor => "remove_color",
        }
    }
}

impl fmt::Display for ComputeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ComputeOp {
    type Err = FrameCutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| FrameCutError::compute_unavailable(s))
    }
}

/// Numeric configuration shared by the add/subtract/multiply kernels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlendParams {
    /// Clamp results to this value; 0 means unbounded.
    pub upper_bound: u16,
    /// Wrap instead of saturating when a result exceeds `u16::MAX`.
    pub allow_overflow: bool,
}

/// Per-call parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ComputeParams {
    /// No parameters (overlay).
    None,
    /// Arithmetic blend parameters.
    Blend(BlendParams),
    /// Inclusive per-channel `[low, high]` window for color removal.
    ColorWindow {
        /// Lower RGB bounds.
        low: [u16; 3],
        /// Upper RGB bounds.
        high: [u16; 3],
    },
}

/// Borrowed input channel.
#[derive(Clone, Copy, Debug)]
pub enum ChannelRef<'a> {
    /// 16-bit color channel.
    U16(&'a [u16]),
    /// Float alpha channel.
    F32(&'a [f32]),
}

impl<'a> ChannelRef<'a> {
    fn len(&self) -> usize {
        match self {
            ChannelRef::U16(c) => c.len(),
            ChannelRef::F32(c) => c.len(),
        }
    }

    pub(crate) fn as_u16(&self, op: ComputeOp, slot: usize) -> FrameCutResult<&'a [u16]> {
        match *self {
            ChannelRef::U16(c) => Ok(c),
            ChannelRef::F32(_) => Err(FrameCutError::validation(format!(
                "{op} input {slot} must be a u16 channel"
            ))),
        }
    }

    pub(crate) fn as_f32(&self, op: ComputeOp, slot: usize) -> FrameCutResult<&'a [f32]> {
        match *self {
            ChannelRef::F32(c) => Ok(c),
            ChannelRef::U16(_) => Err(FrameCutError::validation(format!(
                "{op} input {slot} must be an f32 channel"
            ))),
        }
    }
}

/// Owned output channel.
#[derive(Clone, Debug, PartialEq)]
pub enum Channel {
    /// 16-bit color channel.
    U16(Vec<u16>),
    /// Float alpha channel.
    F32(Vec<f32>),
}

impl Channel {
    /// Unwrap a color channel.
    pub fn into_u16(self) -> FrameCutResult<Vec<u16>> {
        match self {
            Channel::U16(c) => Ok(c),
            Channel::F32(_) => Err(FrameCutError::validation("expected a u16 output channel")),
        }
    }

    /// Unwrap an alpha channel.
    pub fn into_f32(self) -> FrameCutResult<Vec<f32>> {
        match self {
            Channel::F32(c) => Ok(c),
            Channel::U16(_) => Err(FrameCutError::validation("expected an f32 output channel")),
        }
    }
}

/// One elementwise operation on one backend.
///
/// Channel layouts per operation:
/// - `Add`/`Subtract`/`Multiply`: `[a, b]` u16 in, `[out]` u16 out.
/// - `Overlay`: `[fg_r, fg_g, fg_b, fg_a, bg_r, bg_g, bg_b, bg_a]` in, `[r, g, b, a]` out.
/// - `RemoveColor`: `[r, g, b, a]` in, `[r, g, b, a]` out.
pub trait Computer: Send + Sync {
    /// Operation implemented by this computer.
    fn op(&self) -> ComputeOp;

    /// Whether concurrent `apply` calls are allowed.
    fn is_thread_safe(&self) -> bool {
        true
    }

    /// Run the operation over equally sized channel buffers.
    fn apply(
        &self,
        params: &ComputeParams,
        inputs: &[ChannelRef<'_>],
    ) -> FrameCutResult<Vec<Channel>>;
}

/// A source of [`Computer`]s (CPU, GPU, ...).
pub trait ComputeBackend: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// Look up the computer for `op`, failing with `ComputeUnavailable` when unsupported.
    fn require_computer(&self, op: ComputeOp) -> FrameCutResult<Arc<dyn Computer>>;
}

/// Shared entry point to a compute backend for all render workers.
pub struct ComputeDispatcher {
    backend: Arc<dyn ComputeBackend>,
    serial: Mutex<()>,
}

impl ComputeDispatcher {
    pub fn new(backend: Arc<dyn ComputeBackend>) -> Self {
        Self {
            backend,
            serial: Mutex::new(()),
        }
    }

    /// Dispatcher over the built-in thread-safe CPU backend.
    pub fn cpu() -> Self {
        Self::new(Arc::new(CpuBackend::new()))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Resolve `op` to a callable handle.
    pub fn require(&self, op: ComputeOp) -> FrameCutResult<ComputeHandle<'_>> {
        let computer = self.backend.require_computer(op)?;
        Ok(ComputeHandle {
            computer,
            serial: &self.serial,
        })
    }

    /// Resolve an operation by name.
    pub fn require_by_name(&self, name: &str) -> FrameCutResult<ComputeHandle<'_>> {
        self.require(name.parse()?)
    }
}

impl fmt::Debug for ComputeDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeDispatcher")
            .field("backend", &self.backend.name())
            .finish()
    }
}

/// Callable computer bound to its dispatcher's serialization lock.
pub struct ComputeHandle<'a> {
    computer: Arc<dyn Computer>,
    serial: &'a Mutex<()>,
}

impl ComputeHandle<'_> {
    pub fn is_thread_safe(&self) -> bool {
        self.computer.is_thread_safe()
    }

    /// Validate channel lengths and run the computer, holding the dispatch lock when the
    /// computer is not thread-safe.
    pub fn apply(
        &self,
        params: &ComputeParams,
        inputs: &[ChannelRef<'_>],
    ) -> FrameCutResult<Vec<Channel>> {
        ensure_equal_lengths(self.computer.op(), inputs)?;

        if self.computer.is_thread_safe() {
            return self.computer.apply(params, inputs);
        }
        let _guard = self
            .serial
            .lock()
            .map_err(|_| FrameCutError::validation("compute dispatch lock poisoned"))?;
        self.computer.apply(params, inputs)
    }
}

/// Fail unless every input channel has the same length.
pub(crate) fn ensure_equal_lengths(op: ComputeOp, inputs: &[ChannelRef<'_>]) -> FrameCutResult<()> {
    if let Some(first) = inputs.first()
        && inputs.iter().any(|c| c.len() != first.len())
    {
        return Err(FrameCutError::validation(format!(
            "{op} inputs must have equal lengths"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/compute/dispatch.rs"]
mod tests;
