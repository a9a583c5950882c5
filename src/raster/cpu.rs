use crate::document::model::{FillRule, StrokePosition};
use crate::foundation::core::{Affine, BezPath, PixelBounds, Rect, Vec2};
use crate::foundation::error::{RendexError, RendexResult};
use crate::foundation::math::mul_div255_u8;
use crate::raster::{Rasterizer, ShapeGeometry, ShapePart};
use crate::render::image::{Bitmap, PlacedImage};
use kurbo::Shape as _;

/// Options for [`CpuRasterizer`].
#[derive(Debug, Clone, Copy)]
pub struct CpuRasterizerOpts {
    /// Flattening tolerance of stroke expansion, in layer units.
    pub tolerance: f64,
    /// Transparent border added around every coverage bitmap, for antialiasing.
    pub margin_px: u32,
}

impl Default for CpuRasterizerOpts {
    fn default() -> Self {
        Self {
            tolerance: 0.1,
            margin_px: 1,
        }
    }
}

/// Coverage rasterizer on top of `vello_cpu`.
///
/// The render context is kept between calls and reused while the target size stays the same.
pub struct CpuRasterizer {
    opts: CpuRasterizerOpts,
    ctx: Option<vello_cpu::RenderContext>,
}

impl std::fmt::Debug for CpuRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuRasterizer")
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl Default for CpuRasterizer {
    fn default() -> Self {
        Self::new(CpuRasterizerOpts::default())
    }
}

impl CpuRasterizer {
    pub fn new(opts: CpuRasterizerOpts) -> Self {
        Self { opts, ctx: None }
    }

    pub fn opts(&self) -> CpuRasterizerOpts {
        self.opts
    }

    fn stroke_outline(&self, geometry: &ShapeGeometry, index: usize) -> RendexResult<BezPath> {
        let stroke = geometry.stroke(index)?;
        let style = kurbo::Stroke::new(stroke.outline_width());
        Ok(kurbo::stroke(
            geometry.path.iter(),
            &style,
            &kurbo::StrokeOpts::default(),
            self.opts.tolerance,
        ))
    }

    fn pixel_bounds(&self, rect: Rect) -> PixelBounds {
        PixelBounds::outer(rect).inflate(self.opts.margin_px as i32)
    }

    fn with_ctx_mut<R>(
        &mut self,
        width: u16,
        height: u16,
        f: impl FnOnce(&mut vello_cpu::RenderContext) -> R,
    ) -> R {
        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == width && ctx.height() == height => ctx,
            _ => vello_cpu::RenderContext::new(width, height),
        };
        ctx.reset();
        let out = f(&mut ctx);
        self.ctx = Some(ctx);
        out
    }

    /// White coverage of `path` filled under `transform`, on the pixel grid of `bounds`.
    fn coverage(
        &mut self,
        path: &BezPath,
        fill_rule: FillRule,
        transform: Affine,
        bounds: PixelBounds,
    ) -> RendexResult<Bitmap> {
        let w: u16 = bounds
            .width()
            .try_into()
            .map_err(|_| RendexError::shape_layer("coverage width exceeds u16"))?;
        let h: u16 = bounds
            .height()
            .try_into()
            .map_err(|_| RendexError::shape_layer("coverage height exceeds u16"))?;
        let origin = Vec2::new(-f64::from(bounds.x0), -f64::from(bounds.y0));
        let device = Affine::translate(origin) * transform;
        let cpu_path = bezpath_to_cpu(path);

        let pixmap = self.with_ctx_mut(w, h, |ctx| {
            ctx.set_transform(affine_to_cpu(device));
            ctx.set_fill_rule(match fill_rule {
                FillRule::NonZero => vello_cpu::peniko::Fill::NonZero,
                FillRule::EvenOdd => vello_cpu::peniko::Fill::EvenOdd,
            });
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(255, 255, 255, 255));
            ctx.fill_path(&cpu_path);
            ctx.flush();
            let mut pixmap = vello_cpu::Pixmap::new(w, h);
            ctx.render_to_pixmap(&mut pixmap);
            pixmap
        });
        Bitmap::from_premul(
            bounds.width(),
            bounds.height(),
            pixmap.data_as_u8_slice().to_vec(),
        )
    }
}

impl Rasterizer for CpuRasterizer {
    fn bounds(
        &self,
        geometry: &ShapeGeometry,
        part: ShapePart,
        transform: Affine,
    ) -> RendexResult<Rect> {
        let local = match part {
            ShapePart::Body => geometry.body_bounds(),
            ShapePart::Stroke(i) => {
                if geometry.stroke(i)?.position == StrokePosition::Inside {
                    geometry.body_bounds()
                } else {
                    let outline = self.stroke_outline(geometry, i)?;
                    if outline.elements().is_empty() {
                        Rect::ZERO
                    } else {
                        outline.bounding_box()
                    }
                }
            }
        };
        if local == Rect::ZERO {
            return Ok(Rect::ZERO);
        }
        Ok(transform.transform_rect_bbox(local))
    }

    fn rasterize(
        &mut self,
        geometry: &ShapeGeometry,
        part: ShapePart,
        transform: Affine,
    ) -> RendexResult<Option<PlacedImage>> {
        let bounds = self.pixel_bounds(self.bounds(geometry, part, transform)?);
        if bounds.is_empty() {
            return Ok(None);
        }
        let bitmap = match part {
            ShapePart::Body => {
                self.coverage(&geometry.path, geometry.fill_rule, transform, bounds)?
            }
            ShapePart::Stroke(i) => {
                let position = geometry.stroke(i)?.position;
                let outline = self.stroke_outline(geometry, i)?;
                let mut stroke = self.coverage(&outline, FillRule::NonZero, transform, bounds)?;
                if position != StrokePosition::Center {
                    let body =
                        self.coverage(&geometry.path, geometry.fill_rule, transform, bounds)?;
                    clip_coverage(&mut stroke, &body, position == StrokePosition::Outside);
                }
                stroke
            }
        };
        Ok(Some(PlacedImage::new(bitmap, bounds.x0, bounds.y0)))
    }
}

/// Keep the part of `coverage` inside `clip` (or outside it with `outside`).
fn clip_coverage(coverage: &mut Bitmap, clip: &Bitmap, outside: bool) {
    for (px, c) in coverage
        .data_mut()
        .chunks_exact_mut(4)
        .zip(clip.data().chunks_exact(4))
    {
        let w = if outside { 255 - c[3] } else { c[3] };
        let w = u16::from(w);
        for v in px.iter_mut() {
            *v = mul_div255_u8(u16::from(*v), w);
        }
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::LineTo(p) => out.line_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::QuadTo(p1, p2) => out.quad_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
            ),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
                vello_cpu::kurbo::Point::new(p3.x, p3.y),
            ),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/raster/cpu.rs"]
mod tests;
