//! Fixed-resolution pixel buffer: planar 16-bit RGB with optional per-pixel float alpha.

use crate::foundation::core::Canvas;
use crate::foundation::error::{FrameCutError, FrameCutResult};
use image::{ImageBuffer, Rgba, imageops};

/// Planar RGB16 picture with optional straight alpha in `[0, 1]`.
///
/// `width * height` equals the length of every channel; this is checked on construction and
/// preserved by every operation.
#[derive(Clone, Debug, PartialEq)]
pub struct Picture {
    width: u32,
    height: u32,
    r: Vec<u16>,
    g: Vec<u16>,
    b: Vec<u16>,
    alpha: Option<Vec<f32>>,
}

impl Picture {
    /// Build a picture from planar channels, validating lengths and alpha range.
    pub fn new(
        width: u32,
        height: u32,
        r: Vec<u16>,
        g: Vec<u16>,
        b: Vec<u16>,
        alpha: Option<Vec<f32>>,
    ) -> FrameCutResult<Self> {
        let pixels = width as usize * height as usize;
        if r.len() != pixels || g.len() != pixels || b.len() != pixels {
            return Err(FrameCutError::validation(format!(
                "picture {width}x{height} expects {pixels} pixels per channel, got r={} g={} b={}",
                r.len(),
                g.len(),
                b.len()
            )));
        }
        if let Some(a) = alpha.as_ref()
            && a.len() != pixels
        {
            return Err(FrameCutError::validation(format!(
                "picture {width}x{height} expects {pixels} alpha values, got {}",
                a.len()
            )));
        }
        if let Some(bad) = alpha
            .iter()
            .flatten()
            .find(|a| !a.is_finite() || !(0.0..=1.0).contains(*a))
        {
            return Err(FrameCutError::validation(format!(
                "picture alpha must be finite and within [0, 1], got {bad}"
            )));
        }
        Ok(Self {
            width,
            height,
            r,
            g,
            b,
            alpha,
        })
    }

    /// Uniformly colored picture. `alpha: None` yields a picture without an alpha channel.
    pub fn solid(width: u32, height: u32, rgb: [u16; 3], alpha: Option<f32>) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            r: vec![rgb[0]; pixels],
            g: vec![rgb[1]; pixels],
            b: vec![rgb[2]; pixels],
            alpha: alpha.map(|a| {
                let a = if a.is_nan() { 0.0 } else { a.clamp(0.0, 1.0) };
                vec![a; pixels]
            }),
        }
    }

    /// Fully transparent black picture.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self::solid(width, height, [0, 0, 0], Some(0.0))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    /// Pixel count (`width * height`).
    pub fn pixels(&self) -> usize {
        self.r.len()
    }

    pub fn has_alpha_channel(&self) -> bool {
        self.alpha.is_some()
    }

    pub fn r(&self) -> &[u16] {
        &self.r
    }

    pub fn g(&self) -> &[u16] {
        &self.g
    }

    pub fn b(&self) -> &[u16] {
        &self.b
    }

    pub fn alpha(&self) -> Option<&[f32]> {
        self.alpha.as_deref()
    }

    /// Alpha of pixel `i`; opaque when the picture has no alpha channel.
    pub fn alpha_at(&self, i: usize) -> f32 {
        self.alpha.as_ref().map_or(1.0, |a| a[i])
    }

    /// Upgrade to a dense alpha channel, opaque everywhere, if none is present.
    pub fn ensure_alpha(&mut self) {
        if self.alpha.is_none() {
            self.alpha = Some(vec![1.0; self.pixels()]);
        }
    }

    /// Split into `(r, g, b, alpha)` channels.
    pub fn into_channels(self) -> (Vec<u16>, Vec<u16>, Vec<u16>, Option<Vec<f32>>) {
        (self.r, self.g, self.b, self.alpha)
    }

    /// Decode interleaved straight-alpha RGBA8.
    pub fn from_rgba8(width: u32, height: u32, data: &[u8]) -> FrameCutResult<Self> {
        let pixels = checked_interleaved_len(width, height, data.len())?;
        let mut pic = Self::with_capacity(width, height, pixels);
        let alpha = pic.alpha.get_or_insert_with(Vec::new);
        for px in data.chunks_exact(4) {
            pic.r.push(u16::from(px[0]) * 257);
            pic.g.push(u16::from(px[1]) * 257);
            pic.b.push(u16::from(px[2]) * 257);
            alpha.push(f32::from(px[3]) / 255.0);
        }
        Ok(pic)
    }

    /// Decode interleaved straight-alpha RGBA16.
    pub fn from_rgba16(width: u32, height: u32, data: &[u16]) -> FrameCutResult<Self> {
        let pixels = checked_interleaved_len(width, height, data.len())?;
        let mut pic = Self::with_capacity(width, height, pixels);
        let alpha = pic.alpha.get_or_insert_with(Vec::new);
        for px in data.chunks_exact(4) {
            pic.r.push(px[0]);
            pic.g.push(px[1]);
            pic.b.push(px[2]);
            alpha.push(f32::from(px[3]) / 65535.0);
        }
        Ok(pic)
    }

    fn with_capacity(width: u32, height: u32, pixels: usize) -> Self {
        Self {
            width,
            height,
            r: Vec::with_capacity(pixels),
            g: Vec::with_capacity(pixels),
            b: Vec::with_capacity(pixels),
            alpha: Some(Vec::with_capacity(pixels)),
        }
    }

    /// Interleaved straight-alpha RGBA16 (opaque when there is no alpha channel).
    pub fn to_rgba16(&self) -> Vec<u16> {
        let mut out = Vec::with_capacity(self.pixels() * 4);
        for i in 0..self.pixels() {
            out.extend_from_slice(&[
                self.r[i],
                self.g[i],
                self.b[i],
                alpha_to_u16(self.alpha_at(i)),
            ]);
        }
        out
    }

    /// Interleaved RGB16, alpha dropped.
    pub fn to_rgb16(&self) -> Vec<u16> {
        let mut out = Vec::with_capacity(self.pixels() * 3);
        for i in 0..self.pixels() {
            out.extend_from_slice(&[self.r[i], self.g[i], self.b[i]]);
        }
        out
    }

    /// Interleaved straight-alpha RGBA8.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.to_rgba16().into_iter().map(u16_to_u8).collect()
    }

    /// Interleaved RGB8, alpha dropped.
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.to_rgb16().into_iter().map(u16_to_u8).collect()
    }

    /// Premultiply color by alpha, clamp to `upper_bound` (0 = unbounded) and drop alpha.
    pub fn flattened(&self, upper_bound: u16) -> Picture {
        let bound = if upper_bound == 0 {
            u16::MAX
        } else {
            upper_bound
        };
        let Some(alpha) = self.alpha.as_ref() else {
            let clamp = |c: &Vec<u16>| c.iter().map(|&v| v.min(bound)).collect::<Vec<_>>();
            return Picture {
                width: self.width,
                height: self.height,
                r: clamp(&self.r),
                g: clamp(&self.g),
                b: clamp(&self.b),
                alpha: None,
            };
        };
        let map = |c: &Vec<u16>| {
            c.iter()
                .zip(alpha)
                .map(|(&v, &a)| {
                    let scaled = (f32::from(v) * a.clamp(0.0, 1.0)).round();
                    (scaled as u16).min(bound)
                })
                .collect::<Vec<_>>()
        };
        Picture {
            width: self.width,
            height: self.height,
            r: map(&self.r),
            g: map(&self.g),
            b: map(&self.b),
            alpha: None,
        }
    }

    /// Resample to `width x height` (triangle filter). Same-size requests return a clone.
    pub fn resized(&self, width: u32, height: u32) -> FrameCutResult<Picture> {
        if width == 0 || height == 0 {
            return Err(FrameCutError::validation(format!(
                "cannot resize picture to {width}x{height}"
            )));
        }
        if width == self.width && height == self.height {
            return Ok(self.clone());
        }
        let src: ImageBuffer<Rgba<u16>, Vec<u16>> =
            ImageBuffer::from_raw(self.width, self.height, self.to_rgba16()).ok_or_else(|| {
                FrameCutError::validation("picture buffer does not match its dimensions")
            })?;
        let dst = imageops::resize(&src, width, height, imageops::FilterType::Triangle);
        let mut out = Picture::from_rgba16(width, height, dst.as_raw())?;
        if !self.has_alpha_channel() {
            out.alpha = None;
        }
        Ok(out)
    }

    /// Cut out the `width x height` region starting at `(x, y)`, clipped to the picture bounds.
    pub fn cropped(&self, x: u32, y: u32, width: u32, height: u32) -> FrameCutResult<Picture> {
        let x_end = x.saturating_add(width).min(self.width);
        let y_end = y.saturating_add(height).min(self.height);
        if x >= x_end || y >= y_end {
            return Err(FrameCutError::validation(format!(
                "crop region {width}x{height}+{x}+{y} is outside the {}x{} picture",
                self.width, self.height
            )));
        }
        let (w, h) = (x_end - x, y_end - y);
        let mut out = Self::with_capacity(w, h, w as usize * h as usize);
        if !self.has_alpha_channel() {
            out.alpha = None;
        }
        for row in y..y_end {
            let start = row as usize * self.width as usize + x as usize;
            let end = start + w as usize;
            out.r.extend_from_slice(&self.r[start..end]);
            out.g.extend_from_slice(&self.g[start..end]);
            out.b.extend_from_slice(&self.b[start..end]);
            if let (Some(dst), Some(src)) = (out.alpha.as_mut(), self.alpha.as_ref()) {
                dst.extend_from_slice(&src[start..end]);
            }
        }
        Ok(out)
    }

    /// Copy this picture onto a transparent `width x height` canvas with its top-left corner at
    /// `(x, y)`. Pixels falling outside the canvas are dropped.
    pub fn placed(&self, x: i64, y: i64, width: u32, height: u32) -> Picture {
        let mut out = Picture::transparent(width, height);
        for sy in 0..self.height as i64 {
            let dy = sy + y;
            if dy < 0 || dy >= height as i64 {
                continue;
            }
            for sx in 0..self.width as i64 {
                let dx = sx + x;
                if dx < 0 || dx >= width as i64 {
                    continue;
                }
                let si = (sy * self.width as i64 + sx) as usize;
                let di = (dy * width as i64 + dx) as usize;
                out.r[di] = self.r[si];
                out.g[di] = self.g[si];
                out.b[di] = self.b[si];
                if let Some(a) = out.alpha.as_mut() {
                    a[di] = self.alpha_at(si);
                }
            }
        }
        out
    }
}

fn checked_interleaved_len(width: u32, height: u32, len: usize) -> FrameCutResult<usize> {
    let pixels = width as usize * height as usize;
    if len != pixels * 4 {
        return Err(FrameCutError::validation(format!(
            "interleaved rgba buffer for {width}x{height} expects {} samples, got {len}",
            pixels * 4
        )));
    }
    Ok(pixels)
}

fn alpha_to_u16(a: f32) -> u16 {
    (a.clamp(0.0, 1.0) * 65535.0).round() as u16
}

fn u16_to_u8(v: u16) -> u8 {
    ((u32::from(v) * 255 + 32767) / 65535) as u8
}

#[cfg(test)]
#[path = "../tests/unit/picture.rs"]
mod tests;
