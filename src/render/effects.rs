//! Pixel kernels behind layer effects and filters.

use crate::foundation::core::{Color, PixelBounds};
use crate::foundation::error::{RendexError, RendexResult};
use crate::foundation::math::mul_div255_u8;
use crate::render::composite::{Compositor, copy_into};
use crate::render::image::PlacedImage;

/// Device-space size parameters of a shadow or glow.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowParams {
    /// Total blur extent in pixels.
    pub blur_px: f64,
    /// Fraction of the blur extent turned into a hard spread, in `[0, 1]`.
    pub choke: f64,
    pub offset: (i32, i32),
    pub color: Color,
}

impl ShadowParams {
    fn spread_px(&self) -> f64 {
        self.blur_px.max(0.0) * self.choke.clamp(0.0, 1.0)
    }

    fn blur_radius(&self) -> u32 {
        (self.blur_px.max(0.0) - self.spread_px()).round() as u32
    }
}

pub(crate) fn gaussian_kernel_q16(radius: u32, sigma: f32) -> RendexResult<Vec<u32>> {
    if radius == 0 {
        return Ok(vec![1 << 16]);
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(RendexError::validation("blur sigma must be finite and > 0"));
    }

    let r = radius as i32;
    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    let denom = 2.0 * f64::from(sigma) * f64::from(sigma);
    for i in -r..=r {
        let x = f64::from(i);
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }
    if sum <= 0.0 {
        return Err(RendexError::validation("gaussian kernel sum is zero"));
    }

    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = ((wf / sum) * 65536.0).round() as i64;
        let q = q.clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    // Put the rounding error on the center tap so the kernel sums to exactly one.
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }
    Ok(weights)
}

/// Sigma used for a blur of the given pixel radius.
pub(crate) fn blur_sigma(radius: u32) -> f32 {
    (radius as f32 / 3.0).max(0.1)
}

fn blur_rgba8_premul_q16(
    src: &[u8],
    dst: &mut [u8],
    tmp: &mut [u8],
    width: u32,
    height: u32,
    k: &[u32],
) {
    if k.len() == 1 {
        dst.copy_from_slice(src);
        return;
    }
    horizontal_blur_q16(src, tmp, width, height, k);
    vertical_blur_q16(tmp, dst, width, height, k);
}

fn horizontal_blur_q16(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sx = (x + ki as i32 - radius).clamp(0, w - 1);
                let idx = ((y * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_blur_q16(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sy = (y + ki as i32 - radius).clamp(0, h - 1);
                let idx = ((sy * w + x) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    let v = (acc + 32768) >> 16;
    v.min(255) as u8
}

/// Gaussian blur by `radius_px`. Unbounded blurs grow the image by the radius; bounded ones
/// keep its bounds.
pub fn blur(
    out: &mut Compositor,
    image: PlacedImage,
    radius_px: u32,
    bounded: bool,
) -> Option<PlacedImage> {
    if radius_px == 0 {
        return Some(image);
    }
    let kernel = match gaussian_kernel_q16(radius_px, blur_sigma(radius_px)) {
        Ok(k) => k,
        Err(e) => {
            tracing::warn!(radius_px, error = %e, "blur kernel unavailable, leaving image as is");
            return Some(image);
        }
    };
    let bounds = if bounded {
        image.bounds
    } else {
        image.bounds.inflate(radius_px as i32)
    };
    let mut src = out.canvas(bounds);
    copy_into(&mut src, bounds, &image);
    let mut tmp = out.canvas(bounds);
    let mut dst = out.canvas(bounds);
    blur_rgba8_premul_q16(
        src.data(),
        dst.data_mut(),
        tmp.data_mut(),
        bounds.width(),
        bounds.height(),
        &kernel,
    );
    out.recycle(image);
    out.release(src);
    out.release(tmp);
    Some(PlacedImage::new(dst, bounds.x0, bounds.y0))
}

/// Row-major 4x5 matrix over straight RGBA with the bias in the last column.
pub fn color_matrix(
    out: &mut Compositor,
    image: PlacedImage,
    m: &[f64; 20],
) -> Option<PlacedImage> {
    let m = m.map(|v| v as f32);
    let bounds = image.bounds;
    let mut dst = out.canvas(bounds);
    color_matrix_rgba8_premul(image.bitmap.data(), dst.data_mut(), m);
    out.recycle(image);
    Some(PlacedImage::new(dst, bounds.x0, bounds.y0))
}

fn color_matrix_rgba8_premul(src: &[u8], dst: &mut [u8], m: [f32; 20]) {
    debug_assert_eq!(src.len(), dst.len());
    for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
        let pa = f32::from(s[3]) / 255.0;
        let inv_a = if pa > 0.0 { 1.0 / pa } else { 0.0 };
        let r = f32::from(s[0]) / 255.0 * inv_a;
        let g = f32::from(s[1]) / 255.0 * inv_a;
        let b = f32::from(s[2]) / 255.0 * inv_a;
        let a = pa;

        let row = |i: usize| {
            (m[i] * r + m[i + 1] * g + m[i + 2] * b + m[i + 3] * a + m[i + 4]).clamp(0.0, 1.0)
        };
        let (out_r, out_g, out_b, out_a) = (row(0), row(5), row(10), row(15));

        d[0] = (out_r * out_a * 255.0).round().clamp(0.0, 255.0) as u8;
        d[1] = (out_g * out_a * 255.0).round().clamp(0.0, 255.0) as u8;
        d[2] = (out_b * out_a * 255.0).round().clamp(0.0, 255.0) as u8;
        d[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    }
}

/// Single-channel coverage on the pixel grid.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct AlphaMap {
    pub bounds: PixelBounds,
    pub data: Vec<u8>,
}

impl AlphaMap {
    /// Alpha of `image` resampled onto `bounds`.
    pub fn from_image(image: &PlacedImage, bounds: PixelBounds) -> Self {
        let mut data = Vec::with_capacity(bounds.pixel_count());
        for y in bounds.y0..bounds.y1 {
            for x in bounds.x0..bounds.x1 {
                data.push(image.pixel_at(x, y)[3]);
            }
        }
        Self { bounds, data }
    }

    pub fn at(&self, x: i32, y: i32) -> u8 {
        if !self.bounds.contains(x, y) {
            return 0;
        }
        let i = (y - self.bounds.y0) as usize * self.bounds.width() as usize
            + (x - self.bounds.x0) as usize;
        self.data[i]
    }

    pub fn invert(&mut self) {
        for a in &mut self.data {
            *a = 255 - *a;
        }
    }

    /// Multiply by `other`, complemented when `complement` is set.
    pub fn multiply(&mut self, other: &Self, complement: bool) {
        let (x0, y0) = (self.bounds.x0, self.bounds.y0);
        let w = self.bounds.width() as i32;
        for (i, a) in self.data.iter_mut().enumerate() {
            let x = x0 + i as i32 % w;
            let y = y0 + i as i32 / w;
            let o = other.at(x, y);
            let o = if complement { 255 - o } else { o };
            *a = mul_div255_u8(u16::from(*a), u16::from(o));
        }
    }

    /// Euclidean distance from each pixel center to the nearest pixel on the given side of the
    /// half-coverage threshold.
    fn distances(&self, to_inside: bool) -> Vec<f64> {
        let (w, h) = (self.bounds.width() as usize, self.bounds.height() as usize);
        let far = ((w + h) as f64).powi(2) + 1.0;
        let mut f: Vec<f64> = self
            .data
            .iter()
            .map(|&a| if (a >= 128) == to_inside { 0.0 } else { far })
            .collect();

        let n = w.max(h);
        let mut line = vec![0.0; n];
        let mut d = vec![0.0; n];
        let mut v = vec![0usize; n];
        let mut z = vec![0.0; n + 1];
        for x in 0..w {
            for y in 0..h {
                line[y] = f[y * w + x];
            }
            squared_distance_1d(&line[..h], &mut d[..h], &mut v, &mut z);
            for y in 0..h {
                f[y * w + x] = d[y];
            }
        }
        for y in 0..h {
            let row = &mut f[y * w..(y + 1) * w];
            line[..w].copy_from_slice(row);
            squared_distance_1d(&line[..w], &mut d[..w], &mut v, &mut z);
            row.copy_from_slice(&d[..w]);
        }
        f.into_iter().map(f64::sqrt).collect()
    }

    /// Coverage dilated by `radius` pixels.
    pub fn grown(&self, radius: f64) -> Self {
        let pad = radius.ceil() as i32 + 1;
        let bounds = self.bounds.inflate(pad);
        let padded = self.reframed(bounds);
        let dist = padded.distances(true);
        let data = dist
            .into_iter()
            .map(|d| ((radius + 1.0 - d).clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        Self { bounds, data }
    }

    /// Coverage eroded by `radius` pixels.
    pub fn shrunk(&self, radius: f64) -> Self {
        let bounds = self.bounds.inflate(1);
        let padded = self.reframed(bounds);
        let dist = padded.distances(false);
        let data = dist
            .into_iter()
            .map(|d| ((d - radius).clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        Self { bounds, data }
    }

    pub fn reframed(&self, bounds: PixelBounds) -> Self {
        let mut data = Vec::with_capacity(bounds.pixel_count());
        for y in bounds.y0..bounds.y1 {
            for x in bounds.x0..bounds.x1 {
                data.push(self.at(x, y));
            }
        }
        Self { bounds, data }
    }

    /// Solid `color` with this coverage.
    pub fn colorize(&self, out: &mut Compositor, color: Color) -> Option<PlacedImage> {
        if self.bounds.is_empty() {
            return None;
        }
        let premul = color.to_premul_rgba8();
        let mut bitmap = out.canvas(self.bounds);
        for (px, &a) in bitmap.data_mut().chunks_exact_mut(4).zip(&self.data) {
            for c in 0..4 {
                px[c] = mul_div255_u8(u16::from(premul[c]), u16::from(a));
            }
        }
        Some(PlacedImage::new(bitmap, self.bounds.x0, self.bounds.y0))
    }
}

/// One-dimensional squared distance transform of sampled function `f` (lower envelope of
/// parabolas).
fn squared_distance_1d(f: &[f64], d: &mut [f64], v: &mut [usize], z: &mut [f64]) {
    let n = f.len();
    if n == 0 {
        return;
    }
    let intersect = |q: usize, p: usize| -> f64 {
        let (qf, pf) = (q as f64, p as f64);
        ((f[q] + qf * qf) - (f[p] + pf * pf)) / (2.0 * qf - 2.0 * pf)
    };
    let mut k = 0usize;
    v[0] = 0;
    z[0] = f64::NEG_INFINITY;
    z[1] = f64::INFINITY;
    for q in 1..n {
        let mut s = intersect(q, v[k]);
        while s <= z[k] {
            k -= 1;
            s = intersect(q, v[k]);
        }
        k += 1;
        v[k] = q;
        z[k] = s;
        z[k + 1] = f64::INFINITY;
    }
    k = 0;
    for (q, out) in d.iter_mut().enumerate().take(n) {
        while z[k + 1] < q as f64 {
            k += 1;
        }
        let p = v[k];
        let dq = q as f64 - p as f64;
        *out = dq * dq + f[p];
    }
}

/// Shadow cast by `basis`; outer shadows sit behind the basis, inner ones inside it.
pub fn shadow(
    out: &mut Compositor,
    basis: &PlacedImage,
    params: &ShadowParams,
    inner: bool,
) -> Option<PlacedImage> {
    let spread = params.spread_px();
    let radius = params.blur_radius();
    let (dx, dy) = params.offset;
    let reach = spread.ceil() as i32 + radius as i32 + dx.abs().max(dy.abs()) + 1;

    let mut coverage = if inner {
        let mut a = AlphaMap::from_image(basis, basis.bounds.inflate(reach));
        a.invert();
        a
    } else {
        AlphaMap::from_image(basis, basis.bounds)
    };
    if spread > 0.0 {
        coverage = coverage.grown(spread);
    }
    let colored = coverage.colorize(out, params.color)?;
    let blurred = blur(out, colored, radius, false)?;
    let shifted = PlacedImage {
        bounds: PixelBounds::new(
            blurred.bounds.x0 + dx,
            blurred.bounds.y0 + dy,
            blurred.bounds.x1 + dx,
            blurred.bounds.y1 + dy,
        ),
        bitmap: blurred.bitmap,
    };
    if inner {
        out.mask(
            Some(shifted),
            Some(basis.clone()),
            &crate::foundation::core::ChannelMatrix::ALPHA,
        )
    } else {
        Some(shifted)
    }
}

/// Coverage of a stroke of `thickness_px` around the half-coverage contour of `basis`.
pub(crate) fn stroke_coverage(
    basis: &PlacedImage,
    position: crate::document::model::StrokePosition,
    thickness_px: f64,
) -> AlphaMap {
    use crate::document::model::StrokePosition;

    let a = AlphaMap::from_image(basis, basis.bounds);
    match position {
        StrokePosition::Outside => {
            let mut grown = a.grown(thickness_px);
            grown.multiply(&a, true);
            grown
        }
        StrokePosition::Inside => {
            let mut inner = a.reframed(a.bounds.inflate(1));
            let shrunk = a.shrunk(thickness_px);
            inner.multiply(&shrunk, true);
            inner
        }
        StrokePosition::Center => {
            let half = 0.5 * thickness_px;
            let mut grown = a.grown(half);
            let shrunk = a.shrunk(half);
            grown.multiply(&shrunk, true);
            grown
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/effects.rs"]
mod tests;
