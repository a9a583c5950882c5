use crate::document::model::{
    Effect, EffectKind, Filter, FilterKind, Gradient, GradientKind, ImageRef, Paint,
};
use crate::foundation::core::{
    Affine, ChannelMatrix, Color, PixelBounds, Point, Rect, ensure_invertible,
};
use crate::foundation::error::RendexResult;
use crate::render::composite::Compositor;
use crate::render::effects::{ShadowParams, blur, color_matrix, shadow, stroke_coverage};
use crate::render::image::{Bitmap, PlacedImage};
use anyhow::Context;
use std::collections::HashMap;
use std::rc::Rc;

/// Where a layer part is drawn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawTarget {
    /// Layer to device transformation, render scale included.
    pub transform: Affine,
    /// Output scale of the render.
    pub render_scale: f64,
    /// Composed feature scale of the layer and its ancestors.
    pub feature_scale: f64,
    /// Logical extent of the layer in layer coordinates.
    pub local_bounds: Rect,
}

impl DrawTarget {
    /// Device bounds of the layer's logical extent.
    pub fn device_bounds(&self) -> PixelBounds {
        if self.local_bounds.area() <= 0.0 {
            return PixelBounds::EMPTY;
        }
        PixelBounds::outer(self.transform.transform_rect_bbox(self.local_bounds))
    }

    /// Pixels per unit of effect parameters (blur radii, offsets, stroke widths).
    pub fn effect_scale(&self) -> f64 {
        self.render_scale * self.feature_scale
    }

    fn device_offset(&self, offset: [f64; 2]) -> (i32, i32) {
        let s = self.effect_scale();
        ((offset[0] * s).round() as i32, (offset[1] * s).round() as i32)
    }
}

/// Fill, effect and filter services used while rendering.
///
/// Every method returns `None` for an empty or failed result; failures are logged, not
/// propagated.
pub trait PaintServices {
    /// `paint` over the device rectangle `bounds`.
    fn paint(
        &mut self,
        out: &mut Compositor,
        paint: &Paint,
        target: &DrawTarget,
        bounds: PixelBounds,
    ) -> Option<PlacedImage>;

    fn effect(
        &mut self,
        out: &mut Compositor,
        effect: &Effect,
        basis: Option<PlacedImage>,
        target: &DrawTarget,
    ) -> Option<PlacedImage>;

    fn filter(
        &mut self,
        out: &mut Compositor,
        filter: &Filter,
        basis: PlacedImage,
    ) -> Option<PlacedImage>;
}

/// Decoded image assets by name, stored premultiplied.
#[derive(Clone, Debug, Default)]
pub struct ImageBase {
    images: HashMap<String, Rc<Bitmap>>,
}

impl ImageBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bitmap: Bitmap) {
        self.images.insert(name.into(), Rc::new(bitmap));
    }

    /// Decode an encoded PNG or JPEG and store it under `name`.
    pub fn decode(&mut self, name: impl Into<String>, bytes: &[u8]) -> RendexResult<()> {
        let name = name.into();
        let dyn_img = image::load_from_memory(bytes)
            .with_context(|| format!("decode image asset '{name}'"))?;
        let rgba = dyn_img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut data = rgba.into_raw();
        premultiply_rgba8_in_place(&mut data);
        self.insert(name, Bitmap::from_premul(width, height, data)?);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Rc<Bitmap>> {
        self.images.get(name)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[..3].fill(0);
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * a + 127) / 255) as u8;
        }
    }
}

/// Reference CPU implementation of [`PaintServices`].
#[derive(Clone, Debug, Default)]
pub struct CpuPainter {
    images: ImageBase,
}

impl CpuPainter {
    pub fn new(images: ImageBase) -> Self {
        Self { images }
    }

    pub fn images(&self) -> &ImageBase {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut ImageBase {
        &mut self.images
    }

    fn solid(out: &mut Compositor, color: Color, bounds: PixelBounds) -> Option<PlacedImage> {
        if bounds.is_empty() || color.a <= 0.0 {
            return None;
        }
        let px = color.to_premul_rgba8();
        let mut bitmap = out.canvas(bounds);
        for p in bitmap.data_mut().chunks_exact_mut(4) {
            p.copy_from_slice(&px);
        }
        Some(PlacedImage::new(bitmap, bounds.x0, bounds.y0))
    }

    /// Evaluate a per-pixel shader at device pixel centers mapped back to layer space.
    fn shade(
        out: &mut Compositor,
        target: &DrawTarget,
        bounds: PixelBounds,
        mut shader: impl FnMut(Point) -> [u8; 4],
    ) -> Option<PlacedImage> {
        if bounds.is_empty() {
            return None;
        }
        if let Err(e) = ensure_invertible(target.transform, "paint transform") {
            tracing::debug!(error = %e, "cannot shade through a singular transform");
            return None;
        }
        let inverse = target.transform.inverse();
        let mut bitmap = out.canvas(bounds);
        for y in bounds.y0..bounds.y1 {
            let row = bitmap.row_mut((y - bounds.y0) as u32);
            for (i, x) in (bounds.x0..bounds.x1).enumerate() {
                let p = inverse * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                row[i * 4..i * 4 + 4].copy_from_slice(&shader(p));
            }
        }
        Some(PlacedImage::new(bitmap, bounds.x0, bounds.y0))
    }

    fn gradient(
        out: &mut Compositor,
        gradient: &Gradient,
        target: &DrawTarget,
        bounds: PixelBounds,
    ) -> Option<PlacedImage> {
        let start = Point::new(gradient.start[0], gradient.start[1]);
        let end = Point::new(gradient.end[0], gradient.end[1]);
        let axis = end - start;
        let len2 = axis.hypot2();
        if gradient.stops.is_empty() || len2 <= f64::EPSILON {
            let color = gradient.stops.last().map_or(Color::TRANSPARENT, |s| s.color);
            return Self::solid(out, color, bounds);
        }
        let kind = gradient.kind;
        Self::shade(out, target, bounds, |p| {
            let t = match kind {
                GradientKind::Linear => (p - start).dot(axis) / len2,
                GradientKind::Radial => (p - start).hypot() / len2.sqrt(),
            };
            sample_stops(gradient, t).to_premul_rgba8()
        })
    }

    fn image(
        &self,
        out: &mut Compositor,
        image: &ImageRef,
        target: &DrawTarget,
        bounds: PixelBounds,
    ) -> Option<PlacedImage> {
        let Some(bitmap) = self.images.get(&image.asset).cloned() else {
            tracing::warn!(asset = %image.asset, "image asset missing, drawing nothing");
            return None;
        };
        let rect = image
            .rect
            .map_or(target.local_bounds, |[x0, y0, x1, y1]| Rect::new(x0, y0, x1, y1));
        if rect.area() <= 0.0 || bitmap.width() == 0 || bitmap.height() == 0 {
            return None;
        }
        let placed = PixelBounds::outer(target.transform.transform_rect_bbox(rect));
        let bounds = bounds.intersect(placed);
        let (sx, sy) = (
            f64::from(bitmap.width()) / rect.width(),
            f64::from(bitmap.height()) / rect.height(),
        );
        Self::shade(out, target, bounds, |p| {
            if !rect.contains(p) {
                return [0; 4];
            }
            let u = ((p.x - rect.x0) * sx).floor() as u32;
            let v = ((p.y - rect.y0) * sy).floor() as u32;
            bitmap.pixel(u.min(bitmap.width() - 1), v.min(bitmap.height() - 1))
        })
    }
}

/// Straight color of `gradient` at parameter `t`, clamped to the end stops.
fn sample_stops(gradient: &Gradient, t: f64) -> Color {
    let stops = &gradient.stops;
    let Some(first) = stops.first() else {
        return Color::TRANSPARENT;
    };
    if t <= first.position {
        return first.color;
    }
    for pair in stops.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if t <= b.position {
            let span = b.position - a.position;
            let local = if span > 0.0 { (t - a.position) / span } else { 1.0 };
            return a.color.lerp(b.color, local);
        }
    }
    stops.last().map_or(first.color, |s| s.color)
}

impl PaintServices for CpuPainter {
    fn paint(
        &mut self,
        out: &mut Compositor,
        paint: &Paint,
        target: &DrawTarget,
        bounds: PixelBounds,
    ) -> Option<PlacedImage> {
        match paint {
            Paint::Color { color } => Self::solid(out, *color, bounds),
            Paint::Gradient { gradient } => Self::gradient(out, gradient, target, bounds),
            Paint::Image { image } => self.image(out, image, target, bounds),
        }
    }

    fn effect(
        &mut self,
        out: &mut Compositor,
        effect: &Effect,
        basis: Option<PlacedImage>,
        target: &DrawTarget,
    ) -> Option<PlacedImage> {
        let scale = target.effect_scale();
        match &effect.kind {
            EffectKind::Overlay { overlay } => match basis {
                None => self.paint(out, &overlay.paint, target, target.device_bounds()),
                Some(basis) => {
                    let bounds = basis.bounds;
                    let painted = self.paint(out, &overlay.paint, target, bounds);
                    out.mask(painted, Some(basis), &ChannelMatrix::ALPHA)
                }
            },
            EffectKind::Stroke { stroke } => {
                let basis = basis?;
                let coverage = stroke_coverage(&basis, stroke.position, stroke.thickness * scale);
                out.recycle(basis);
                let mask = coverage.colorize(out, Color::WHITE)?;
                let painted = self.paint(out, &stroke.fill.paint, target, mask.bounds);
                out.mask(painted, Some(mask), &ChannelMatrix::ALPHA)
            }
            EffectKind::DropShadow { shadow: s } | EffectKind::InnerShadow { shadow: s } => {
                let basis = basis?;
                let params = ShadowParams {
                    blur_px: s.blur * scale,
                    choke: s.choke,
                    offset: target.device_offset(s.offset),
                    color: s.color,
                };
                let inner = matches!(effect.kind, EffectKind::InnerShadow { .. });
                let result = shadow(out, &basis, &params, inner);
                out.recycle(basis);
                result
            }
            EffectKind::OuterGlow { glow } | EffectKind::InnerGlow { glow } => {
                let basis = basis?;
                let params = ShadowParams {
                    blur_px: glow.blur * scale,
                    choke: glow.choke,
                    offset: (0, 0),
                    color: glow.color,
                };
                let inner = matches!(effect.kind, EffectKind::InnerGlow { .. });
                let result = shadow(out, &basis, &params, inner);
                out.recycle(basis);
                result
            }
            EffectKind::GaussianBlur { blur: radius } | EffectKind::Blur { blur: radius } => {
                blur(out, basis?, (radius * scale).max(0.0).round() as u32, false)
            }
            EffectKind::BoundedBlur { blur: radius } => {
                blur(out, basis?, (radius * scale).max(0.0).round() as u32, true)
            }
            EffectKind::Other => {
                tracing::debug!("unsupported effect drawn as nothing");
                None
            }
        }
    }

    fn filter(
        &mut self,
        out: &mut Compositor,
        filter: &Filter,
        basis: PlacedImage,
    ) -> Option<PlacedImage> {
        if !filter.visible {
            return Some(basis);
        }
        match &filter.kind {
            FilterKind::OpacityMultiplier { opacity } => out.multiply_alpha(Some(basis), *opacity),
            FilterKind::ColorMatrix { matrix } => color_matrix(out, basis, matrix),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/paint.rs"]
mod tests;
