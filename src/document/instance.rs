use crate::animation::anim::DocumentAnimation;
use crate::document::model::{Layer, LayerKind};
use crate::expr::node::LayerRef;
use crate::foundation::core::{Affine, Rect};
use crate::foundation::error::{RendexError, RendexResult};
use crate::raster::{ShapeGeometry, TextShape, TextShaper};
use std::rc::Rc;

/// Extents of a layer.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayerBounds {
    /// Content extent in layer coordinates: the body of a shape, the glyphs of a text, the
    /// children (or the mask) of a group.
    pub logical: Rect,
    /// `logical` grown by outward strokes, still in layer coordinates.
    pub untransformed: Rect,
    /// `untransformed` in component coordinates.
    pub transformed: Rect,
}

/// Bounding box of `rect` under `transform`; an empty rect stays empty.
pub(crate) fn transform_bounds(rect: Rect, transform: Affine) -> Rect {
    if rect == Rect::ZERO {
        return Rect::ZERO;
    }
    transform.transform_rect_bbox(rect)
}

/// Union that treats `Rect::ZERO` as empty.
pub(crate) fn union_bounds(a: Rect, b: Rect) -> Rect {
    match (a == Rect::ZERO, b == Rect::ZERO) {
        (true, _) => b,
        (_, true) => a,
        _ => a.union(b),
    }
}

/// Cached, derived state of one layer: its place in the tree, parsed geometry, bounds and the
/// animations that apply to it.
#[derive(Clone, Debug)]
pub struct LayerInstance {
    layer_ref: Rc<LayerRef>,
    parent: Option<String>,
    transform: Affine,
    feature_scale: f64,
    geometry: Option<ShapeGeometry>,
    text: Option<TextShape>,
    bounds: LayerBounds,
    animation: DocumentAnimation,
    shape_valid: bool,
}

impl LayerInstance {
    pub(crate) fn new(
        layer: &Layer,
        parent: Option<String>,
        parent_transform: Affine,
        parent_feature_scale: f64,
    ) -> Self {
        Self {
            layer_ref: LayerRef::new(layer.id.clone(), parent_transform, parent_feature_scale),
            parent,
            transform: layer.affine(),
            feature_scale: layer.feature_scale.unwrap_or(1.0),
            geometry: None,
            text: None,
            bounds: LayerBounds::default(),
            animation: DocumentAnimation::default(),
            shape_valid: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.layer_ref.id
    }

    /// Handle used by expression nodes drawing this layer.
    pub fn layer_ref(&self) -> &Rc<LayerRef> {
        &self.layer_ref
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Layer to component transformation, without animations.
    pub fn transformation(&self) -> Affine {
        self.layer_ref.parent_transform * self.transform
    }

    pub fn feature_scale(&self) -> f64 {
        self.layer_ref.parent_feature_scale * self.feature_scale
    }

    pub fn geometry(&self) -> Option<&ShapeGeometry> {
        self.geometry.as_ref()
    }

    pub fn text_shape(&self) -> Option<&TextShape> {
        self.text.as_ref()
    }

    pub fn bounds(&self) -> &LayerBounds {
        &self.bounds
    }

    /// Own and inherited animations, all addressed to this layer.
    pub fn animation(&self) -> &DocumentAnimation {
        &self.animation
    }

    /// Move the instance under a (possibly changed) parent. The `LayerRef` is replaced only when
    /// the parent placement actually changed.
    pub(crate) fn set_parent(
        &mut self,
        layer: &Layer,
        parent: Option<String>,
        parent_transform: Affine,
        parent_feature_scale: f64,
    ) {
        let r = &self.layer_ref;
        if r.parent_transform != parent_transform || r.parent_feature_scale != parent_feature_scale
        {
            self.layer_ref = LayerRef::new(layer.id.clone(), parent_transform, parent_feature_scale);
        }
        self.parent = parent;
        self.transform = layer.affine();
        self.feature_scale = layer.feature_scale.unwrap_or(1.0);
    }

    pub(crate) fn set_animation(&mut self, animation: DocumentAnimation) {
        self.animation = animation;
    }

    /// Drop parsed geometry and text so the next rebuild recreates them.
    pub(crate) fn invalidate(&mut self) {
        self.shape_valid = false;
        self.geometry = None;
        self.text = None;
    }

    /// Parse the shape (if stale) and refresh the bounds.
    pub(crate) fn initialize_shape(&mut self, layer: &Layer) -> RendexResult<()> {
        if !self.shape_valid {
            let shape = layer
                .shape
                .as_ref()
                .filter(|_| layer.kind == LayerKind::Shape)
                .ok_or_else(|| {
                    RendexError::shape_layer(format!("layer '{}' has no shape", layer.id))
                })?;
            self.geometry = Some(ShapeGeometry::from_shape(shape)?);
            self.shape_valid = true;
        }
        let (logical, untransformed) = self
            .geometry
            .as_ref()
            .map_or((Rect::ZERO, Rect::ZERO), |g| {
                (g.body_bounds(), g.logical_bounds())
            });
        self.bounds = LayerBounds {
            logical,
            untransformed,
            transformed: transform_bounds(untransformed, self.transformation()),
        };
        Ok(())
    }

    /// Shape the text (if stale) and refresh the bounds. Without a shaper the layer has no
    /// extent and draws nothing.
    pub(crate) fn initialize_text(
        &mut self,
        layer: &Layer,
        shaper: Option<&dyn TextShaper>,
    ) -> RendexResult<()> {
        let style = layer
            .text
            .as_ref()
            .filter(|_| layer.kind == LayerKind::Text)
            .ok_or_else(|| RendexError::text_layer(format!("layer '{}' has no text", layer.id)))?;
        if !self.shape_valid {
            self.text = match shaper {
                Some(shaper) => Some(shaper.shape_text(style)?),
                None => {
                    tracing::debug!(layer = %layer.id, "no text shaper, text layer stays empty");
                    None
                }
            };
            self.shape_valid = true;
        }
        let logical = match (&self.text, shaper) {
            (Some(text), Some(shaper)) => shaper.bounds(text),
            (Some(text), None) => text.bounds,
            _ => Rect::ZERO,
        };
        self.set_logical_bounds(logical);
        Ok(())
    }

    pub(crate) fn set_logical_bounds(&mut self, logical: Rect) {
        self.bounds = LayerBounds {
            logical,
            untransformed: logical,
            transformed: transform_bounds(logical, self.transformation()),
        };
    }
}

#[cfg(test)]
#[path = "../../tests/unit/document/instance.rs"]
mod tests;
