//! Compositing operators over placed premultiplied images.
//!
//! Every operator accepts null operands and treats them the way the corresponding expression
//! constructor does, so a failed draw deep inside a graph degrades to a missing part instead of
//! an error.

use crate::document::model::BlendMode;
use crate::foundation::core::{ChannelMatrix, PixelBounds};
use crate::foundation::math::{add_sat_u8, mul_div255_u8};
use crate::render::image::{Bitmap, PlacedImage};
use crate::render::pool::{BitmapPool, BitmapPoolOpts, BitmapPoolStats};
use std::rc::Rc;

pub type PremulRgba8 = [u8; 4];

/// Source-over of one premultiplied pixel.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    let sa = src[3];
    if sa == 0 {
        return dst;
    }
    let inv = 255u16 - u16::from(sa);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = add_sat_u8(src[i], mul_div255_u8(u16::from(dst[i]), inv));
    }
    out
}

/// Per-channel linear interpolation of premultiplied pixels.
pub fn lerp_px(a: PremulRgba8, b: PremulRgba8, t: f32) -> PremulRgba8 {
    if t <= 0.0 {
        return a;
    }
    if t >= 1.0 {
        return b;
    }
    std::array::from_fn(|i| {
        let (a, b) = (f32::from(a[i]), f32::from(b[i]));
        (a + (b - a) * t).round().clamp(0.0, 255.0) as u8
    })
}

fn scale_px(px: PremulRgba8, m: u16) -> PremulRgba8 {
    px.map(|c| mul_div255_u8(u16::from(c), m))
}

/// Composite `src` onto `dst` in place; equal-length premultiplied rows.
///
/// With `ignore_alpha` the source is treated as opaque wherever it has any coverage, and left
/// out wherever it has none.
pub(crate) fn blend_row(dst: &mut [u8], src: &[u8], mode: BlendMode, ignore_alpha: bool) {
    debug_assert_eq!(dst.len(), src.len());
    // Blend mode dispatch happens once per row; each branch monomorphizes its kernel.
    match mode.or_normal() {
        BlendMode::Normal if !ignore_alpha => {
            for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
                d.copy_from_slice(&out);
            }
        }
        BlendMode::Normal | BlendMode::PassThrough => {
            blend_row_with(dst, src, ignore_alpha, |s, _| s)
        }
        BlendMode::Multiply => blend_row_with(dst, src, ignore_alpha, |s, d| s * d),
        BlendMode::Screen => blend_row_with(dst, src, ignore_alpha, |s, d| s + d - s * d),
        BlendMode::Overlay => blend_row_with(dst, src, ignore_alpha, |s, d| hard_light(d, s)),
        BlendMode::Darken => blend_row_with(dst, src, ignore_alpha, |s, d| s.min(d)),
        BlendMode::Lighten => blend_row_with(dst, src, ignore_alpha, |s, d| s.max(d)),
        BlendMode::ColorDodge => blend_row_with(dst, src, ignore_alpha, |s, d| {
            if s >= 1.0 {
                1.0
            } else {
                (d / (1.0 - s)).min(1.0)
            }
        }),
        BlendMode::ColorBurn => blend_row_with(dst, src, ignore_alpha, |s, d| {
            if s <= 0.0 {
                0.0
            } else {
                1.0 - ((1.0 - d) / s).min(1.0)
            }
        }),
        BlendMode::LinearDodge => blend_row_with(dst, src, ignore_alpha, |s, d| (s + d).min(1.0)),
        BlendMode::LinearBurn => {
            blend_row_with(dst, src, ignore_alpha, |s, d| (s + d - 1.0).max(0.0))
        }
        BlendMode::SoftLight => blend_row_with(dst, src, ignore_alpha, |s, d| {
            if s <= 0.5 {
                d - (1.0 - 2.0 * s) * d * (1.0 - d)
            } else {
                let g = if d <= 0.25 {
                    ((16.0 * d - 12.0) * d + 4.0) * d
                } else {
                    d.sqrt()
                };
                d + (2.0 * s - 1.0) * (g - d)
            }
        }),
        BlendMode::HardLight => blend_row_with(dst, src, ignore_alpha, hard_light),
        BlendMode::Difference => blend_row_with(dst, src, ignore_alpha, |s, d| (d - s).abs()),
        BlendMode::Exclusion => blend_row_with(dst, src, ignore_alpha, |s, d| d + s - 2.0 * d * s),
    }
}

fn hard_light(s: f32, d: f32) -> f32 {
    if s <= 0.5 {
        2.0 * s * d
    } else {
        1.0 - 2.0 * (1.0 - s) * (1.0 - d)
    }
}

fn unpremul(p: f32, a: f32) -> f32 {
    if a > 0.0 { (p / a).clamp(0.0, 1.0) } else { 0.0 }
}

#[inline(always)]
fn blend_row_with<F>(dst: &mut [u8], src: &[u8], ignore_alpha: bool, blend_fn: F)
where
    F: Fn(f32, f32) -> f32,
{
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        if s[3] == 0 {
            continue;
        }
        // Source-over with the blend applied to unpremultiplied channels:
        // out_a = sa + da * (1 - sa)
        // out_p = sp * (1 - da) + dp * (1 - sa) + B(sc, dc) * sa * da
        let raw_sa = f32::from(s[3]) / 255.0;
        let sa = if ignore_alpha { 1.0 } else { raw_sa };
        let da = f32::from(d[3]) / 255.0;
        let out_a = (sa + da * (1.0 - sa)).clamp(0.0, 1.0);
        for c in 0..3 {
            let sc = unpremul(f32::from(s[c]) / 255.0, raw_sa);
            let dp = f32::from(d[c]) / 255.0;
            let dc = unpremul(dp, da);
            let b = blend_fn(sc, dc).clamp(0.0, 1.0);
            let out = sc * sa * (1.0 - da) + dp * (1.0 - sa) + b * sa * da;
            d[c] = (out.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
        d[3] = (out_a * 255.0).round() as u8;
    }
}

/// Compositing operators with a scratch bitmap pool.
///
/// Operands that are uniquely owned when consumed are returned to the pool.
#[derive(Debug, Default)]
pub struct Compositor {
    pool: BitmapPool,
}

impl Compositor {
    pub fn new(opts: BitmapPoolOpts) -> Self {
        Self {
            pool: BitmapPool::new(opts),
        }
    }

    pub fn pool_stats(&self) -> BitmapPoolStats {
        self.pool.stats()
    }

    /// Transparent scratch bitmap covering `bounds`.
    pub fn canvas(&mut self, bounds: PixelBounds) -> Bitmap {
        self.pool.acquire(bounds.width(), bounds.height())
    }

    pub fn release(&mut self, bitmap: Bitmap) {
        self.pool.release(bitmap);
    }

    pub fn recycle(&mut self, image: PlacedImage) {
        if let Some(bitmap) = image.into_unique() {
            self.pool.release(bitmap);
        }
    }

    fn place(&mut self, bitmap: Bitmap, bounds: PixelBounds) -> Option<PlacedImage> {
        if bounds.is_empty() {
            self.pool.release(bitmap);
            return None;
        }
        Some(PlacedImage::new(bitmap, bounds.x0, bounds.y0))
    }

    pub fn blend(
        &mut self,
        dst: Option<PlacedImage>,
        src: Option<PlacedImage>,
        mode: BlendMode,
    ) -> Option<PlacedImage> {
        self.blend_impl(dst, src, mode, false)
    }

    /// Blend with the source treated as opaque; its coverage is expected to be reapplied by an
    /// enclosing mask mix.
    pub fn blend_ignore_alpha(
        &mut self,
        dst: Option<PlacedImage>,
        src: Option<PlacedImage>,
        mode: BlendMode,
    ) -> Option<PlacedImage> {
        self.blend_impl(dst, src, mode, true)
    }

    fn blend_impl(
        &mut self,
        dst: Option<PlacedImage>,
        src: Option<PlacedImage>,
        mode: BlendMode,
        ignore_alpha: bool,
    ) -> Option<PlacedImage> {
        let Some(src) = src else { return dst };
        let Some(dst) = dst else { return Some(src) };
        let bounds = dst.bounds.union(src.bounds);
        let mut out = self.canvas(bounds);
        copy_into(&mut out, bounds, &dst);
        for_each_overlap(&mut out, bounds, &src, |d, s| {
            blend_row(d, s, mode, ignore_alpha)
        });
        self.recycle(dst);
        self.recycle(src);
        self.place(out, bounds)
    }

    /// Multiply `image` by the channel-weighted `mask`.
    pub fn mask(
        &mut self,
        image: Option<PlacedImage>,
        mask: Option<PlacedImage>,
        channels: &ChannelMatrix,
    ) -> Option<PlacedImage> {
        let image = image?;
        let Some(mask) = mask else {
            return self.multiply_alpha(Some(image), channels.bias());
        };
        let bounds = if channels.bias() > 0.0 {
            image.bounds
        } else {
            image.bounds.intersect(mask.bounds)
        };
        if bounds.is_empty() {
            self.recycle(image);
            self.recycle(mask);
            return None;
        }
        let mut out = self.canvas(bounds);
        for y in bounds.y0..bounds.y1 {
            let row = out.row_mut((y - bounds.y0) as u32);
            for (i, x) in (bounds.x0..bounds.x1).enumerate() {
                let r = channels.ratio(mask.pixel_at(x, y));
                let px = lerp_px([0; 4], image.pixel_at(x, y), r);
                row[i * 4..i * 4 + 4].copy_from_slice(&px);
            }
        }
        self.recycle(image);
        self.recycle(mask);
        self.place(out, bounds)
    }

    /// Interpolate from `dst` to `src` by the channel-weighted `mask`.
    pub fn mix_mask(
        &mut self,
        dst: Option<PlacedImage>,
        src: Option<PlacedImage>,
        mask: Option<PlacedImage>,
        channels: &ChannelMatrix,
    ) -> Option<PlacedImage> {
        let Some(mask) = mask else {
            return self.mix(dst, src, channels.bias());
        };
        let Some(dst) = dst else {
            return self.mask(src, Some(mask), channels);
        };
        let Some(src) = src else {
            return self.mask(Some(dst), Some(mask), &channels.inverted());
        };
        let bounds = if channels.bias() > 0.0 {
            dst.bounds.union(src.bounds)
        } else {
            dst.bounds.union(src.bounds.intersect(mask.bounds))
        };
        let mut out = self.canvas(bounds);
        for y in bounds.y0..bounds.y1 {
            let row = out.row_mut((y - bounds.y0) as u32);
            for (i, x) in (bounds.x0..bounds.x1).enumerate() {
                let r = channels.ratio(mask.pixel_at(x, y));
                let px = lerp_px(dst.pixel_at(x, y), src.pixel_at(x, y), r);
                row[i * 4..i * 4 + 4].copy_from_slice(&px);
            }
        }
        self.recycle(dst);
        self.recycle(src);
        self.recycle(mask);
        self.place(out, bounds)
    }

    pub fn mix(
        &mut self,
        a: Option<PlacedImage>,
        b: Option<PlacedImage>,
        ratio: f64,
    ) -> Option<PlacedImage> {
        if ratio <= 0.0 {
            return a;
        }
        if ratio >= 1.0 {
            return b;
        }
        let Some(a) = a else {
            return self.multiply_alpha(b, ratio);
        };
        let Some(b) = b else {
            return self.multiply_alpha(Some(a), 1.0 - ratio);
        };
        let bounds = a.bounds.union(b.bounds);
        let mut out = self.canvas(bounds);
        let t = ratio as f32;
        for y in bounds.y0..bounds.y1 {
            let row = out.row_mut((y - bounds.y0) as u32);
            for (i, x) in (bounds.x0..bounds.x1).enumerate() {
                let px = lerp_px(a.pixel_at(x, y), b.pixel_at(x, y), t);
                row[i * 4..i * 4 + 4].copy_from_slice(&px);
            }
        }
        self.recycle(a);
        self.recycle(b);
        self.place(out, bounds)
    }

    pub fn multiply_alpha(
        &mut self,
        image: Option<PlacedImage>,
        multiplier: f64,
    ) -> Option<PlacedImage> {
        let image = image?;
        if multiplier >= 1.0 {
            return Some(image);
        }
        if multiplier <= 0.0 {
            self.recycle(image);
            return None;
        }
        let m = (multiplier * 255.0).round() as u16;
        let bounds = image.bounds;
        let mut bitmap = match Rc::try_unwrap(image.bitmap) {
            Ok(bitmap) => bitmap,
            Err(shared) => {
                let mut copy = self.canvas(bounds);
                copy.data_mut().copy_from_slice(shared.data());
                copy
            }
        };
        for px in bitmap.data_mut().chunks_exact_mut(4) {
            let out = scale_px([px[0], px[1], px[2], px[3]], m);
            px.copy_from_slice(&out);
        }
        self.place(bitmap, bounds)
    }

    /// Crop or extend `image` to exactly `bounds`.
    pub fn reframe(&mut self, image: Option<PlacedImage>, bounds: PixelBounds) -> PlacedImage {
        if let Some(image) = &image
            && image.bounds == bounds
        {
            return image.clone();
        }
        let mut out = self.canvas(bounds);
        if let Some(image) = image {
            copy_into(&mut out, bounds, &image);
            self.recycle(image);
        }
        PlacedImage::new(out, bounds.x0, bounds.y0)
    }
}

/// Call `f` with each overlapping row segment of the canvas (placed at `bounds`) and `src`.
pub(crate) fn for_each_overlap(
    canvas: &mut Bitmap,
    bounds: PixelBounds,
    src: &PlacedImage,
    mut f: impl FnMut(&mut [u8], &[u8]),
) {
    let area = bounds.intersect(src.bounds);
    if area.is_empty() {
        return;
    }
    let dx0 = (area.x0 - bounds.x0) as usize * 4;
    let sx0 = (area.x0 - src.bounds.x0) as usize * 4;
    let len = area.width() as usize * 4;
    for y in area.y0..area.y1 {
        let drow = canvas.row_mut((y - bounds.y0) as u32);
        let srow = src.bitmap.row((y - src.bounds.y0) as u32);
        f(&mut drow[dx0..dx0 + len], &srow[sx0..sx0 + len]);
    }
}

pub(crate) fn copy_into(canvas: &mut Bitmap, bounds: PixelBounds, src: &PlacedImage) {
    for_each_overlap(canvas, bounds, src, |d, s| d.copy_from_slice(s));
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
