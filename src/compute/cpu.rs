use crate::compose::effect::remove_color_px;
use crate::compose::mixture::{add_u16, multiply_u16, overlay_px, subtract_u16};
use crate::compute::{
    BlendParams, Channel, ChannelRef, ComputeBackend, ComputeOp, ComputeParams, Computer,
    ensure_equal_lengths,
};
use crate::foundation::error::{FrameCutError, FrameCutResult};
use std::sync::Arc;

/// Scalar CPU implementation of every [`ComputeOp`].
#[derive(Clone, Debug)]
pub struct CpuBackend {
    thread_safe: bool,
    disabled: Vec<ComputeOp>,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuBackend {
    pub fn new() -> Self {
        Self {
            thread_safe: true,
            disabled: Vec::new(),
        }
    }

    /// CPU backend whose computers ask to be called one at a time, like a device queue that
    /// cannot take concurrent submissions.
    pub fn serialized() -> Self {
        Self {
            thread_safe: false,
            ..Self::new()
        }
    }

    /// Remove `op` from the set of provided computers.
    pub fn without(mut self, op: ComputeOp) -> Self {
        self.disabled.push(op);
        self
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        if self.thread_safe { "cpu" } else { "cpu-serial" }
    }

    fn require_computer(&self, op: ComputeOp) -> FrameCutResult<Arc<dyn Computer>> {
        if self.disabled.contains(&op) {
            return Err(FrameCutError::compute_unavailable(op));
        }
        Ok(Arc::new(CpuComputer {
            op,
            thread_safe: self.thread_safe,
        }))
    }
}

struct CpuComputer {
    op: ComputeOp,
    thread_safe: bool,
}

impl Computer for CpuComputer {
    fn op(&self) -> ComputeOp {
        self.op
    }

    fn is_thread_safe(&self) -> bool {
        self.thread_safe
    }

    fn apply(
        &self,
        params: &ComputeParams,
        inputs: &[ChannelRef<'_>],
    ) -> FrameCutResult<Vec<Channel>> {
        let op = self.op;
        let expect = |n: usize| -> FrameCutResult<()> {
            if inputs.len() != n {
                return Err(FrameCutError::validation(format!(
                    "{op} expects {n} input channels, got {}",
                    inputs.len()
                )));
            }
            ensure_equal_lengths(op, inputs)
        };

        match op {
            ComputeOp::Add | ComputeOp::Subtract | ComputeOp::Multiply => {
                expect(2)?;
                let blend = match params {
                    ComputeParams::Blend(p) => *p,
                    ComputeParams::None => BlendParams::default(),
                    ComputeParams::ColorWindow { .. } => {
                        return Err(FrameCutError::validation(format!(
                            "{op} does not take a color window"
                        )));
                    }
                };
                let kernel: fn(u16, u16, BlendParams) -> u16 = match op {
                    ComputeOp::Add => add_u16,
                    ComputeOp::Subtract => subtract_u16,
                    _ => multiply_u16,
                };
                let a = inputs[0].as_u16(op, 0)?;
                let b = inputs[1].as_u16(op, 1)?;
                let out = a
                    .iter()
                    .zip(b)
                    .map(|(&x, &y)| kernel(x, y, blend))
                    .collect();
                Ok(vec![Channel::U16(out)])
            }
            ComputeOp::Overlay => {
                expect(8)?;
                let fg_a = inputs[3].as_f32(op, 3)?;
                let bg_a = inputs[7].as_f32(op, 7)?;
                let mut out = Vec::with_capacity(4);
                let mut alpha = Vec::new();
                for ch in 0..3 {
                    let fg = inputs[ch].as_u16(op, ch)?;
                    let bg = inputs[ch + 4].as_u16(op, ch + 4)?;
                    let mut color = Vec::with_capacity(fg.len());
                    let mut ch_alpha = Vec::with_capacity(fg.len());
                    for i in 0..fg.len() {
                        let (c, a) = overlay_px(fg[i], fg_a[i], bg[i], bg_a[i]);
                        color.push(c);
                        ch_alpha.push(a);
                    }
                    out.push(Channel::U16(color));
                    if ch == 0 {
                        alpha = ch_alpha;
                    }
                }
                out.push(Channel::F32(alpha));
                Ok(out)
            }
            ComputeOp::RemoveColor => {
                expect(4)?;
                let ComputeParams::ColorWindow { low, high } = *params else {
                    return Err(FrameCutError::validation(
                        "remove_color requires a color window",
                    ));
                };
                let r = inputs[0].as_u16(op, 0)?;
                let g = inputs[1].as_u16(op, 1)?;
                let b = inputs[2].as_u16(op, 2)?;
                let a = inputs[3].as_f32(op, 3)?;
                let n = r.len();
                let (mut or, mut og, mut ob, mut oa) = (
                    Vec::with_capacity(n),
                    Vec::with_capacity(n),
                    Vec::with_capacity(n),
                    Vec::with_capacity(n),
                );
                for i in 0..n {
                    let (px, alpha) = remove_color_px([r[i], g[i], b[i]], a[i], low, high);
                    or.push(px[0]);
                    og.push(px[1]);
                    ob.push(px[2]);
                    oa.push(alpha);
                }
                Ok(vec![
                    Channel::U16(or),
                    Channel::U16(og),
                    Channel::U16(ob),
                    Channel::F32(oa),
                ])
            }
        }
    }
}
