use crate::animation::AnimationProvider;
use crate::document::component::{Component, RenderGraph};
use crate::document::model::{BlendMode, Filter, Layer, Paint};
use crate::expr::node::{LayerRef, NodeKind};
use crate::foundation::core::{Affine, ChannelMatrix, PixelBounds};
use crate::foundation::error::{RendexError, RendexResult};
use crate::raster::{CpuRasterizer, Rasterizer, ShapePart};
use crate::render::composite::Compositor;
use crate::render::image::PlacedImage;
use crate::render::paint::{CpuPainter, DrawTarget, ImageBase, PaintServices};
use crate::transform::{Evaluate, transform};
use std::rc::Rc;

/// Options of a single render.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderOpts {
    /// Device pixels per component unit.
    pub scale: f64,
    /// Animation time in seconds.
    pub time: f64,
    /// Output frame in device pixels. Defaults to the document dimensions, or to the component
    /// bounds when the document has none.
    pub bounds: Option<PixelBounds>,
}

impl Default for RenderOpts {
    fn default() -> Self {
        Self {
            scale: 1.0,
            time: 0.0,
            bounds: None,
        }
    }
}

/// External services a render draws with.
pub struct RenderServices<'s> {
    pub rasterizer: &'s mut dyn Rasterizer,
    pub painter: &'s mut dyn PaintServices,
    pub compositor: &'s mut Compositor,
}

/// Owned set of the reference CPU services.
#[derive(Debug, Default)]
pub struct CpuRenderer {
    pub rasterizer: CpuRasterizer,
    pub painter: CpuPainter,
    pub compositor: Compositor,
}

impl CpuRenderer {
    pub fn new(images: ImageBase) -> Self {
        Self {
            painter: CpuPainter::new(images),
            ..Self::default()
        }
    }

    pub fn services(&mut self) -> RenderServices<'_> {
        RenderServices {
            rasterizer: &mut self.rasterizer,
            painter: &mut self.painter,
            compositor: &mut self.compositor,
        }
    }

    /// Assemble `component` and render it.
    pub fn render(
        &mut self,
        component: &mut Component,
        opts: &RenderOpts,
    ) -> RendexResult<PlacedImage> {
        let graph = component.assemble()?;
        render(component, &graph, self.services(), opts)
    }
}

/// Rendering instantiation of the graph interpreter: every node evaluates to a placed image.
pub struct RenderContext<'c, 's> {
    component: &'c Component,
    services: RenderServices<'s>,
    opts: RenderOpts,
    draws: usize,
}

impl<'c, 's> RenderContext<'c, 's> {
    pub fn new(component: &'c Component, services: RenderServices<'s>, opts: RenderOpts) -> Self {
        Self {
            component,
            services,
            opts,
            draws: 0,
        }
    }

    /// Number of draw and effect service calls so far.
    pub fn draws(&self) -> usize {
        self.draws
    }

    /// Layer to device transformation at the current time.
    fn layer_transform(&self, layer_ref: &LayerRef, layer: &Layer) -> Affine {
        Affine::scale(self.opts.scale)
            * layer_ref.parent_transform
            * layer.affine()
            * self.component.layer_transform(&layer_ref.id, self.opts.time)
    }

    fn target(&self, layer_ref: &LayerRef) -> RendexResult<(&'c Layer, DrawTarget)> {
        let component: &'c Component = self.component;
        let layer = component.layer(&layer_ref.id)?;
        let instance = component.instance(&layer_ref.id)?;
        let target = DrawTarget {
            transform: self.layer_transform(layer_ref, layer),
            render_scale: self.opts.scale,
            feature_scale: layer_ref.parent_feature_scale * layer.feature_scale.unwrap_or(1.0),
            local_bounds: instance.bounds().logical,
        };
        Ok((layer, target))
    }

    fn paint_part(
        &mut self,
        layer_ref: &LayerRef,
        part: ShapePart,
        paint: impl FnOnce(&Layer) -> Option<&Paint>,
    ) -> RendexResult<Option<PlacedImage>> {
        let (layer, target) = self.target(layer_ref)?;
        let Some(paint) = paint(layer) else {
            return Err(RendexError::invalid_index(format!(
                "no paint for {part:?} of layer '{}'",
                layer.id
            )));
        };
        let geometry = self.component.instance(&layer_ref.id)?.geometry().ok_or_else(|| {
            RendexError::shape_layer(format!("layer '{}' has no geometry", layer.id))
        })?;
        let device = self.services.rasterizer.bounds(geometry, part, target.transform)?;
        let bounds = PixelBounds::outer(device).inflate(1);

        let animated = match paint {
            Paint::Color { .. } if part == ShapePart::Body => self
                .component
                .layer_fill_color(&layer_ref.id, self.opts.time)
                .map(|color| Paint::Color { color }),
            _ => None,
        };
        let paint = animated.as_ref().unwrap_or(paint);
        Ok(self
            .services
            .painter
            .paint(&mut *self.services.compositor, paint, &target, bounds))
    }

    fn try_draw(&mut self, kind: &NodeKind) -> RendexResult<Option<PlacedImage>> {
        let Some(layer_ref) = kind.layer() else {
            return Ok(None);
        };
        match kind {
            NodeKind::DrawLayerBody { .. } | NodeKind::DrawLayerStroke { .. } => {
                let part = match kind {
                    NodeKind::DrawLayerStroke { index, .. } => ShapePart::Stroke(*index),
                    _ => ShapePart::Body,
                };
                let (_, target) = self.target(layer_ref)?;
                let Some(geometry) = self.component.instance(&layer_ref.id)?.geometry() else {
                    return Ok(None);
                };
                self.services
                    .rasterizer
                    .rasterize(geometry, part, target.transform)
            }
            NodeKind::DrawLayerFill { index, .. } => {
                let index = *index;
                self.paint_part(layer_ref, ShapePart::Body, |layer| {
                    let fill = layer.shape.as_ref()?.fills.get(index)?;
                    Some(&fill.paint)
                })
            }
            NodeKind::DrawLayerStrokeFill { index, .. } => {
                let index = *index;
                self.paint_part(layer_ref, ShapePart::Stroke(index), |layer| {
                    let stroke = layer.shape.as_ref()?.strokes.get(index)?;
                    Some(&stroke.fill.paint)
                })
            }
            NodeKind::DrawLayerText { .. } => {
                let (_, target) = self.target(layer_ref)?;
                let instance = self.component.instance(&layer_ref.id)?;
                match (self.component.text_shaper(), instance.text_shape()) {
                    (Some(shaper), Some(text)) => shaper.draw_text(text, target.transform),
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    fn try_effect(
        &mut self,
        basis: Option<PlacedImage>,
        layer_ref: &LayerRef,
        index: usize,
    ) -> RendexResult<Option<PlacedImage>> {
        let (layer, target) = self.target(layer_ref)?;
        let effect = layer.effects.get(index).ok_or_else(|| {
            RendexError::invalid_index(format!("effect {index} of layer '{}'", layer.id))
        })?;
        Ok(self
            .services
            .painter
            .effect(&mut *self.services.compositor, effect, basis, &target))
    }
}

impl Evaluate for RenderContext<'_, '_> {
    type Output = Option<PlacedImage>;

    fn empty(&mut self) -> Self::Output {
        None
    }

    fn draw(&mut self, kind: &NodeKind) -> Self::Output {
        self.draws += 1;
        self.try_draw(kind).unwrap_or_else(|err| {
            tracing::debug!(node = kind.name(), error = %err, "draw failed, drawing nothing");
            None
        })
    }

    fn blend(&mut self, dst: Self::Output, src: Self::Output, mode: BlendMode) -> Self::Output {
        self.services.compositor.blend(dst, src, mode)
    }

    fn blend_ignore_alpha(
        &mut self,
        dst: Self::Output,
        src: Self::Output,
        mode: BlendMode,
    ) -> Self::Output {
        self.services.compositor.blend_ignore_alpha(dst, src, mode)
    }

    fn mask(
        &mut self,
        image: Self::Output,
        mask: Self::Output,
        channels: &ChannelMatrix,
    ) -> Self::Output {
        self.services.compositor.mask(image, mask, channels)
    }

    fn mix_mask(
        &mut self,
        dst: Self::Output,
        src: Self::Output,
        mask: Self::Output,
        channels: &ChannelMatrix,
    ) -> Self::Output {
        self.services.compositor.mix_mask(dst, src, mask, channels)
    }

    fn mix(&mut self, a: Self::Output, b: Self::Output, ratio: f64) -> Self::Output {
        self.services.compositor.mix(a, b, ratio)
    }

    fn multiply_alpha(&mut self, image: Self::Output, multiplier: f64) -> Self::Output {
        self.services.compositor.multiply_alpha(image, multiplier)
    }

    fn draw_effect(
        &mut self,
        basis: Self::Output,
        layer: &Rc<LayerRef>,
        index: usize,
        _standalone: bool,
    ) -> Self::Output {
        self.draws += 1;
        self.try_effect(basis, layer, index).unwrap_or_else(|err| {
            tracing::debug!(layer = %layer.id, index, error = %err, "effect failed, drawing nothing");
            None
        })
    }

    fn apply_filter(&mut self, basis: Self::Output, filter: &Filter) -> Self::Output {
        let basis = basis?;
        self.services
            .painter
            .filter(&mut *self.services.compositor, filter, basis)
    }

    fn layer_opacity(&mut self, layer: &LayerRef) -> Option<f64> {
        let opacity = self.component.layer(&layer.id).map_or(1.0, |l| l.opacity);
        Some(opacity * self.component.layer_opacity(&layer.id, self.opts.time))
    }

    fn mix_layer_opacity(
        &mut self,
        layer: &Rc<LayerRef>,
        a: Self::Output,
        b: Self::Output,
    ) -> Self::Output {
        let ratio = self.layer_opacity(layer).unwrap_or(1.0);
        self.services.compositor.mix(a, b, ratio)
    }
}

/// Output frame when none is requested.
fn default_frame(component: &Component, scale: f64) -> RendexResult<PixelBounds> {
    let frame = match component.dimensions() {
        Some(d) => PixelBounds::new(
            0,
            0,
            (d.width * scale).ceil() as i32,
            (d.height * scale).ceil() as i32,
        ),
        None => {
            let bounds = component.instance(component.root_id())?.bounds().transformed;
            PixelBounds::outer(Affine::scale(scale).transform_rect_bbox(bounds))
        }
    };
    if frame.is_empty() {
        return Err(RendexError::validation("render frame is empty"));
    }
    Ok(frame)
}

/// Render an assembled graph of `component` into a frame.
#[tracing::instrument(
    skip_all,
    fields(nodes = graph.graph.len(), scale = opts.scale, time = opts.time)
)]
pub fn render(
    component: &Component,
    graph: &RenderGraph,
    services: RenderServices<'_>,
    opts: &RenderOpts,
) -> RendexResult<PlacedImage> {
    if !(opts.scale.is_finite() && opts.scale > 0.0) {
        return Err(RendexError::validation(format!(
            "render scale must be positive, got {}",
            opts.scale
        )));
    }
    if !component.is_built() || graph.revision != component.revision() {
        return Err(RendexError::validation(format!(
            "graph assembled at revision {} but the component is at {}; assemble it again",
            graph.revision,
            component.revision()
        )));
    }
    let frame = match opts.bounds {
        Some(bounds) => bounds,
        None => default_frame(component, opts.scale)?,
    };

    let mut ctx = RenderContext::new(component, services, *opts);
    let (image, stats) = transform(&graph.graph, graph.root, &mut ctx);
    tracing::debug!(
        draws = ctx.draws,
        evaluated = stats.evaluated,
        hits = stats.hits,
        evictions = stats.evictions,
        "graph rendered"
    );
    Ok(ctx.services.compositor.reframe(image, frame))
}

#[cfg(test)]
#[path = "../../tests/unit/render/context.rs"]
mod tests;
