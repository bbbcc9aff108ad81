//! Per-clip effect chains, applied to a clip's picture before it is blended.

use crate::compute::{ChannelRef, ComputeDispatcher, ComputeOp, ComputeParams};
use crate::foundation::core::Canvas;
use crate::foundation::error::{FrameCutError, FrameCutResult};
use crate::picture::Picture;

/// Something that transforms one picture into another.
pub trait RenderEffect {
    /// Transform `pic`. `canvas` is the output resolution of the run.
    fn render(
        &self,
        pic: Picture,
        compute: &ComputeDispatcher,
        canvas: Canvas,
    ) -> FrameCutResult<Picture>;
}

/// Built-in effects. Unknown `type` tags are rejected when the draft is parsed.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum Effect {
    /// Make every pixel within `range` of `color` (8-bit ARGB) fully transparent.
    RemoveColor { color: [u8; 4], range: u32 },
    /// Keep only the given region.
    Crop {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    /// Resample to a fixed size.
    Resize { width: u32, height: u32 },
    /// Move onto a transparent canvas-sized picture at `(x, y)`.
    Place { x: i64, y: i64 },
}

impl RenderEffect for Effect {
    fn render(
        &self,
        pic: Picture,
        compute: &ComputeDispatcher,
        canvas: Canvas,
    ) -> FrameCutResult<Picture> {
        match *self {
            Effect::RemoveColor { color, range } => remove_color(pic, color, range, compute),
            Effect::Crop {
                x,
                y,
                width,
                height,
            } => pic.cropped(x, y, width, height),
            Effect::Resize { width, height } => pic.resized(width, height),
            Effect::Place { x, y } => Ok(pic.placed(x, y, canvas.width, canvas.height)),
        }
    }
}

/// Run `effects` in order, then bring the result to the canvas size: pictures that fit are
/// placed at the top-left of a transparent canvas, anything else is resized.
pub fn apply_effects(
    mut pic: Picture,
    effects: &[Effect],
    compute: &ComputeDispatcher,
    canvas: Canvas,
) -> FrameCutResult<Picture> {
    for effect in effects {
        pic = effect.render(pic, compute, canvas)?;
    }
    if pic.canvas() == canvas {
        return Ok(pic);
    }
    if pic.width() <= canvas.width && pic.height() <= canvas.height {
        Ok(pic.placed(0, 0, canvas.width, canvas.height))
    } else {
        pic.resized(canvas.width, canvas.height)
    }
}

/// Inclusive 16-bit `[low, high]` windows around an 8-bit ARGB color.
pub fn remove_color_window(argb: [u8; 4], range: u32) -> ([u16; 3], [u16; 3]) {
    let mut low = [0u16; 3];
    let mut high = [0u16; 3];
    for (ch, &c) in argb[1..].iter().enumerate() {
        let value = i64::from(c) * 257;
        low[ch] = (value - i64::from(range)).clamp(0, 65535) as u16;
        high[ch] = (value + i64::from(range)).clamp(0, 65535) as u16;
    }
    (low, high)
}

/// Zero a pixel and its alpha when every channel falls inside its window.
pub fn remove_color_px(rgb: [u16; 3], alpha: f32, low: [u16; 3], high: [u16; 3]) -> ([u16; 3], f32) {
    let inside = (0..3).all(|ch| low[ch] <= rgb[ch] && rgb[ch] <= high[ch]);
    if inside { ([0; 3], 0.0) } else { (rgb, alpha) }
}

fn remove_color(
    mut pic: Picture,
    argb: [u8; 4],
    range: u32,
    compute: &ComputeDispatcher,
) -> FrameCutResult<Picture> {
    pic.ensure_alpha();
    let (low, high) = remove_color_window(argb, range);
    let handle = compute.require(ComputeOp::RemoveColor)?;
    let alpha = pic.alpha().unwrap_or_default();
    let out = handle.apply(
        &ComputeParams::ColorWindow { low, high },
        &[
            ChannelRef::U16(pic.r()),
            ChannelRef::U16(pic.g()),
            ChannelRef::U16(pic.b()),
            ChannelRef::F32(alpha),
        ],
    )?;
    let [r, g, b, a]: [_; 4] = out
        .try_into()
        .map_err(|_| FrameCutError::validation("remove_color must return four channels"))?;
    Picture::new(
        pic.width(),
        pic.height(),
        r.into_u16()?,
        g.into_u16()?,
        b.into_u16()?,
        Some(a.into_f32()?),
    )
}

#[cfg(test)]
#[path = "../../tests/unit/compose/effect.rs"]
mod tests;
