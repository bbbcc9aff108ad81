//! Layer blending.
//!
//! Scalar kernels operate on single 16-bit samples and are what every compute backend must
//! reproduce. [`MixtureEngine`] applies them to whole pictures through a
//! [`ComputeDispatcher`].

use crate::compute::{BlendParams, ChannelRef, ComputeDispatcher, ComputeOp, ComputeParams};
use crate::foundation::error::{FrameCutError, FrameCutResult};
use crate::picture::Picture;

/// Alpha at or below which an overlay foreground is ignored entirely.
pub const OVERLAY_NEGLIGIBLE_ALPHA: f32 = 0.05;

/// How a clip's picture is combined with the layers beneath it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixtureMode {
    Add,
    #[serde(alias = "minus")]
    Subtract,
    Multiply,
    #[default]
    Overlay,
}

impl MixtureMode {
    pub fn compute_op(self) -> ComputeOp {
        match self {
            MixtureMode::Add => ComputeOp::Add,
            MixtureMode::Subtract => ComputeOp::Subtract,
            MixtureMode::Multiply => ComputeOp::Multiply,
            MixtureMode::Overlay => ComputeOp::Overlay,
        }
    }
}

fn bounded(v: u16, p: BlendParams) -> u16 {
    if p.upper_bound == 0 {
        v
    } else {
        v.min(p.upper_bound)
    }
}

/// `a + b`; past `u16::MAX` either saturates or wraps to `a + b - 65535`.
pub fn add_u16(a: u16, b: u16, p: BlendParams) -> u16 {
    let t = u32::from(a) + u32::from(b);
    if t > u32::from(u16::MAX) {
        return if p.allow_overflow {
            (t - u32::from(u16::MAX)) as u16
        } else {
            u16::MAX
        };
    }
    bounded(t as u16, p)
}

/// `a - b`; negative differences clamp to 0.
pub fn subtract_u16(a: u16, b: u16, p: BlendParams) -> u16 {
    let t = i32::from(a) - i32::from(b);
    if t < 0 {
        return 0;
    }
    bounded(t as u16, p)
}

/// `a * b`; past `u16::MAX` either saturates or keeps the low 16 bits.
pub fn multiply_u16(a: u16, b: u16, p: BlendParams) -> u16 {
    let t = u32::from(a) * u32::from(b);
    if t > u32::from(u16::MAX) {
        return if p.allow_overflow {
            (t & 0xFFFF) as u16
        } else {
            u16::MAX
        };
    }
    bounded(t as u16, p)
}

/// Composite foreground sample `a` (alpha `alpha_a`) over background `b` (alpha `alpha_b`).
///
/// Returns the output sample and output alpha.
pub fn overlay_px(a: u16, alpha_a: f32, b: u16, alpha_b: f32) -> (u16, f32) {
    if alpha_a == 1.0 {
        return (a, 1.0);
    }
    if alpha_a <= OVERLAY_NEGLIGIBLE_ALPHA {
        return (b, alpha_b);
    }
    let out_a = alpha_a + alpha_b * (1.0 - alpha_a);
    if out_a < 1e-6 {
        return (0, 0.0);
    }
    let c = (f32::from(a) * alpha_a + f32::from(b) * alpha_b * (1.0 - alpha_a)) / out_a;
    (c.clamp(0.0, 65535.0) as u16, out_a.min(1.0))
}

/// Picture-level blending through a compute backend.
#[derive(Debug, Clone, Copy)]
pub struct MixtureEngine<'a> {
    compute: &'a ComputeDispatcher,
    params: BlendParams,
}

impl<'a> MixtureEngine<'a> {
    pub fn new(compute: &'a ComputeDispatcher, params: BlendParams) -> Self {
        Self { compute, params }
    }

    /// Combine `overlay` (upper) with `base` (lower) using `mode`.
    pub fn mix(&self, mode: MixtureMode, overlay: Picture, base: Picture) -> FrameCutResult<Picture> {
        if overlay.canvas() != base.canvas() {
            return Err(FrameCutError::validation(format!(
                "cannot mix {}x{} over {}x{}",
                overlay.width(),
                overlay.height(),
                base.width(),
                base.height()
            )));
        }

        match mode {
            MixtureMode::Overlay => self.overlay(overlay, base),
            _ => self.arithmetic(mode, overlay, base),
        }
    }

    fn overlay(&self, fg: Picture, mut bg: Picture) -> FrameCutResult<Picture> {
        let Some(fg_alpha) = fg.alpha() else {
            return Ok(fg);
        };
        bg.ensure_alpha();
        let bg_alpha = bg.alpha().unwrap_or_default();

        let handle = self.compute.require(ComputeOp::Overlay)?;
        let mut out = handle
            .apply(
                &ComputeParams::None,
                &[
                    ChannelRef::U16(fg.r()),
                    ChannelRef::U16(fg.g()),
                    ChannelRef::U16(fg.b()),
                    ChannelRef::F32(fg_alpha),
                    ChannelRef::U16(bg.r()),
                    ChannelRef::U16(bg.g()),
                    ChannelRef::U16(bg.b()),
                    ChannelRef::F32(bg_alpha),
                ],
            )?
            .into_iter();
        let mut next = || {
            out.next()
                .ok_or_else(|| FrameCutError::validation("overlay returned too few channels"))
        };
        let r = next()?.into_u16()?;
        let g = next()?.into_u16()?;
        let b = next()?.into_u16()?;
        let a = next()?.into_f32()?;
        Picture::new(fg.width(), fg.height(), r, g, b, Some(a))
    }

    fn arithmetic(&self, mode: MixtureMode, top: Picture, base: Picture) -> FrameCutResult<Picture> {
        let handle = self.compute.require(mode.compute_op())?;
        let params = ComputeParams::Blend(self.params);
        let channel = |a: &[u16], b: &[u16]| -> FrameCutResult<Vec<u16>> {
            handle
                .apply(&params, &[ChannelRef::U16(a), ChannelRef::U16(b)])?
                .into_iter()
                .next()
                .ok_or_else(|| FrameCutError::validation(format!("{mode:?} returned no channel")))?
                .into_u16()
        };
        let r = channel(top.r(), base.r())?;
        let g = channel(top.g(), base.g())?;
        let b = channel(top.b(), base.b())?;
        let (width, height) = (top.width(), top.height());
        let (_, _, _, alpha) = top.into_channels();
        Picture::new(width, height, r, g, b, alpha)
    }

    /// Fold layers given top-most first.
    ///
    /// The accumulator starts as the top picture; each following (lower) layer becomes the base
    /// and is combined with the accumulator using that layer's mode.
    pub fn compose<I>(&self, layers: I) -> FrameCutResult<Picture>
    where
        I: IntoIterator<Item = (Picture, MixtureMode)>,
    {
        let mut layers = layers.into_iter();
        let Some((mut acc, _)) = layers.next() else {
            return Err(FrameCutError::validation("no layers to compose"));
        };
        for (base, mode) in layers {
            acc = self.mix(mode, acc, base)?;
        }
        Ok(acc)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compose/mixture.rs"]
mod tests;
