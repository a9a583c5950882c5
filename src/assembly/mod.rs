//! Layer assembly: turns a layer's fills, strokes, effects and mask role into an expression
//! subtree.
//!
//! Every layer is assembled as an `underlay` (content behind the layer body, such as outside
//! strokes and drop shadows) and an `overlay` (the body's own content). The two are switched by
//! the body coverage, optionally isolated by a layer-and-effects blur, and finally mixed with the
//! background by the layer opacity.

pub mod facets;
pub mod group;
pub mod layer;

pub use facets::{Facet, Facets};
pub use group::GroupLayerAssembler;
pub use layer::{assemble_shape_layer, assemble_text_layer};

use crate::document::model::{
    BlendMode, EffectBasis, EffectKind, Filter, Layer, MaskBasis, StrokePosition,
};
use crate::expr::graph::{ExprGraph, InlaySlot};
use crate::expr::node::{Expr, LayerRef};
use crate::foundation::core::ChannelMatrix;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AssemblyFlags {
    /// The layer opacity is not animated and can be folded into a plain `Mix`.
    pub fixed_opacity: bool,
}

/// Result of assembling one layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayerSubtree {
    pub root: Expr,
    /// Slot that receives the masked group content when this layer is an embedded mask.
    pub inlay: Option<InlaySlot>,
    /// Render the owning mask group gates its content with.
    pub mask_facet: Expr,
}

/// The layer being assembled, as seen by the expression constructors.
#[derive(Clone, Copy)]
pub(crate) struct Subject<'a> {
    pub layer: &'a Layer,
    pub layer_ref: &'a Rc<LayerRef>,
}

pub(crate) fn is_mask_active(mask_basis: Option<MaskBasis>) -> bool {
    mask_basis.is_some_and(|b| b != MaskBasis::Solid)
}

pub(crate) fn embed_in_mask(mask_basis: Option<MaskBasis>) -> bool {
    mask_basis.is_some_and(MaskBasis::is_embedded)
}

/// Resolve a pass-through effect mode against the mode of the fill it paints.
pub fn combine_blend_mode(outer: BlendMode, inner: BlendMode) -> BlendMode {
    if outer != BlendMode::PassThrough {
        return outer;
    }
    if inner == BlendMode::PassThrough {
        tracing::warn!("pass-through effect over pass-through fill, blending as normal");
        return BlendMode::Normal;
    }
    inner
}

fn has_isolating_blur(layer: &Layer) -> bool {
    layer
        .effects
        .iter()
        .any(|e| e.visible && e.kind.is_blur() && e.basis == EffectBasis::LayerAndEffects)
}

/// Background a layer composites onto. A layer-and-effects blur isolates the layer, so its
/// background is empty.
pub(crate) fn layer_background(graph: &mut ExprGraph, layer: &Layer) -> Expr {
    if has_isolating_blur(layer) {
        None
    } else {
        graph.make_background()
    }
}

pub(crate) fn request_facets(layer: &Layer, facets: &mut Facets, mask_basis: Option<MaskBasis>) {
    if let Some(basis) = mask_basis.filter(|_| is_mask_active(mask_basis)) {
        facets.request(basis);
    }
    for effect in layer.effects.iter().filter(|e| e.visible) {
        facets.request(effect.basis);
    }
}

pub(crate) fn apply_filters(graph: &mut ExprGraph, filters: &[Filter], mut image: Expr) -> Expr {
    for filter in filters.iter().filter(|f| f.visible) {
        image = graph.apply_filter(image, filter);
    }
    image
}

/// Route every visible non-isolating effect into the underlay or the overlay.
pub(crate) fn assemble_foreground_effects(
    graph: &mut ExprGraph,
    subject: Subject<'_>,
    facets: &Facets,
    underlay: &mut Expr,
    overlay: &mut Expr,
    inlay: &mut Option<InlaySlot>,
) {
    let Subject { layer, layer_ref } = subject;
    for (i, effect) in layer.effects.iter().enumerate() {
        if !effect.visible || effect.basis == EffectBasis::LayerAndEffects {
            continue;
        }
        match &effect.kind {
            EffectKind::Overlay { overlay: fill } => {
                if !fill.visible {
                    continue;
                }
                let drawn = graph.draw_layer_effect(None, layer_ref, i, true);
                let render = apply_filters(graph, &fill.filters, drawn);
                let mode = combine_blend_mode(effect.blend_mode, fill.blend_mode);
                *overlay = graph.blend_with_inlay(*overlay, render, mode, inlay);
            }
            EffectKind::Stroke { stroke } => {
                if !stroke.fill.visible {
                    continue;
                }
                let drawn = graph.draw_layer_effect(facets.get(effect.basis), layer_ref, i, false);
                let render = apply_filters(graph, &stroke.fill.filters, drawn);
                let mode = combine_blend_mode(effect.blend_mode, stroke.fill.blend_mode);
                if stroke.position != StrokePosition::Inside {
                    *underlay = graph.blend(*underlay, render, mode);
                }
                if stroke.position != StrokePosition::Outside {
                    *overlay = graph.blend_with_inlay(*overlay, render, mode, inlay);
                }
            }
            EffectKind::DropShadow { .. } | EffectKind::OuterGlow { .. } => {
                let drawn = graph.draw_layer_effect(facets.get(effect.basis), layer_ref, i, false);
                *underlay = graph.blend(*underlay, drawn, effect.blend_mode);
            }
            EffectKind::InnerShadow { .. } | EffectKind::InnerGlow { .. } => {
                let drawn = graph.draw_layer_effect(facets.get(effect.basis), layer_ref, i, false);
                *overlay = graph.blend_with_inlay(*overlay, drawn, effect.blend_mode, inlay);
            }
            // Blurs replace the fill or wrap the whole layer.
            EffectKind::GaussianBlur { .. } | EffectKind::BoundedBlur { .. } | EffectKind::Blur { .. } => {}
            EffectKind::Other => {
                tracing::debug!(layer = %layer.id, effect = i, "skipping unsupported effect");
            }
        }
    }
}

/// Apply fill- and background-basis blurs to the layer's fill content.
pub(crate) fn apply_fill_replacement_effects(
    graph: &mut ExprGraph,
    subject: Subject<'_>,
    mut fill: Expr,
) -> Expr {
    let Subject { layer, layer_ref } = subject;
    for (i, effect) in layer.effects.iter().enumerate() {
        if !effect.visible || !effect.kind.is_blur() {
            continue;
        }
        match effect.basis {
            EffectBasis::Fill => {
                let drawn = graph.draw_layer_effect(fill, layer_ref, i, false);
                fill = apply_filters(graph, &effect.filters, drawn);
            }
            EffectBasis::Background => {
                let bg = graph.make_background();
                let drawn = graph.draw_layer_effect(bg, layer_ref, i, false);
                fill = apply_filters(graph, &effect.filters, drawn);
            }
            EffectBasis::LayerAndEffects => {}
            EffectBasis::Body | EffectBasis::BodyAndStrokes => {
                tracing::debug!(
                    layer = %layer.id,
                    effect = i,
                    basis = ?effect.basis,
                    "blur basis not supported, skipping"
                );
            }
        }
    }
    fill
}

/// Inputs of [`finalize_layer_assembly`] that vary per layer kind.
pub(crate) struct Composite {
    pub underlay: Expr,
    pub overlay: Expr,
    /// Coverage switching between underlay and overlay.
    pub overlay_mask: Expr,
    pub inlay: Option<InlaySlot>,
}

/// Switch underlay and overlay by the body, apply isolating blurs and the layer opacity.
pub(crate) fn finalize_layer_assembly(
    graph: &mut ExprGraph,
    subject: Subject<'_>,
    facets: &mut Facets,
    composite: Composite,
    mask_basis: Option<MaskBasis>,
    flags: AssemblyFlags,
) -> LayerSubtree {
    let Subject { layer, layer_ref } = subject;
    let Composite {
        underlay,
        mut overlay,
        overlay_mask,
        mut inlay,
    } = composite;

    if embed_in_mask(mask_basis) {
        overlay = graph.make_inlay_point(overlay, &mut inlay);
    }
    let mut render = graph.mix_mask(underlay, overlay, overlay_mask, ChannelMatrix::ALPHA);

    let mut layer_and_effects: Expr = None;
    for (i, effect) in layer.effects.iter().enumerate() {
        if effect.visible && effect.kind.is_blur() && effect.basis == EffectBasis::LayerAndEffects {
            let basis = layer_and_effects.or(render);
            let drawn = graph.draw_layer_effect(basis, layer_ref, i, false);
            layer_and_effects = apply_filters(graph, &effect.filters, drawn);
        }
    }
    if layer_and_effects.is_some() {
        facets.set(Facet::LayerAndEffects, layer_and_effects);
        let bg = graph.make_background();
        render = graph.blend(bg, layer_and_effects, layer.blend_mode);
    } else if facets.is_requested(Facet::LayerAndEffects) {
        let unset = graph.unset_background(render);
        facets.set(Facet::LayerAndEffects, unset);
    }

    let bg = graph.make_background();
    let root = if flags.fixed_opacity {
        graph.mix(bg, render, layer.opacity)
    } else {
        graph.mix_layer_opacity(layer_ref, bg, render)
    };
    let mask_facet = match mask_basis {
        Some(basis) if is_mask_active(mask_basis) => facets.get(basis),
        _ => None,
    };
    debug_assert!(facets.finished(), "layer '{}' left a facet unprovided", layer.id);
    LayerSubtree {
        root,
        inlay,
        mask_facet,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assembly/mod.rs"]
mod tests;
