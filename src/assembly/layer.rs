use crate::assembly::{
    AssemblyFlags, Composite, Facet, Facets, LayerSubtree, Subject, apply_fill_replacement_effects,
    apply_filters, assemble_foreground_effects, finalize_layer_assembly, layer_background,
    request_facets,
};
use crate::document::model::{BlendMode, Layer, LayerKind, MaskBasis, StrokePosition};
use crate::expr::graph::ExprGraph;
use crate::expr::node::{Expr, LayerRef};
use crate::foundation::core::ChannelMatrix;
use crate::foundation::error::{RendexError, RendexResult};
use std::rc::Rc;

struct StrokeRender {
    render: Expr,
    position: StrokePosition,
    mode: BlendMode,
}

/// Assemble a shape layer.
///
/// `mask_basis` is set when the layer is the mask of a mask group.
pub fn assemble_shape_layer(
    graph: &mut ExprGraph,
    layer: &Layer,
    layer_ref: &Rc<LayerRef>,
    mask_basis: Option<MaskBasis>,
    flags: AssemblyFlags,
) -> RendexResult<LayerSubtree> {
    let Some(shape) = layer.shape.as_ref().filter(|_| layer.kind == LayerKind::Shape) else {
        return Err(RendexError::wrong_layer_type(format!(
            "layer '{}' is not a shape layer",
            layer.id
        )));
    };
    let subject = Subject { layer, layer_ref };

    let mut facets = Facets::new();
    request_facets(layer, &mut facets, mask_basis);

    let body = graph.draw_layer_body(layer_ref);
    let mut body_and_strokes = body;

    let mut fill_renders = Vec::with_capacity(shape.fills.len());
    let mut combined_fill: Expr = None;
    for (i, fill) in shape.fills.iter().enumerate() {
        if !fill.visible {
            continue;
        }
        let drawn = graph.draw_layer_fill(layer_ref, i);
        let render = apply_filters(graph, &fill.filters, drawn);
        fill_renders.push((render, fill.blend_mode));
        combined_fill = graph.blend(combined_fill, render, fill.blend_mode);
    }

    let mut stroke_renders = Vec::with_capacity(shape.strokes.len());
    for (i, stroke) in shape.strokes.iter().enumerate() {
        if !stroke.visible {
            continue;
        }
        let stroke_body = graph.draw_layer_stroke(layer_ref, i);
        if stroke.position != StrokePosition::Inside {
            body_and_strokes = graph.blend(body_and_strokes, stroke_body, BlendMode::Normal);
        }
        if stroke.fill.visible {
            let drawn = graph.draw_layer_stroke_fill(layer_ref, i);
            let paint = apply_filters(graph, &stroke.fill.filters, drawn);
            stroke_renders.push(StrokeRender {
                render: graph.mask(paint, stroke_body, ChannelMatrix::ALPHA),
                position: stroke.position,
                mode: stroke.fill.blend_mode,
            });
        }
    }

    facets.set(Facet::Body, body);
    facets.set(Facet::BodyAndStrokes, body_and_strokes);
    let fill_facet = graph.mask(combined_fill, body, ChannelMatrix::ALPHA);
    facets.set(Facet::Fill, fill_facet);

    let mut underlay = layer_background(graph, layer);
    let mut overlay = underlay;
    if layer.blend_mode == BlendMode::PassThrough {
        for &(render, mode) in &fill_renders {
            overlay = graph.blend(overlay, render, mode);
        }
    } else {
        let fill = apply_fill_replacement_effects(graph, subject, combined_fill);
        overlay = graph.blend(overlay, fill, layer.blend_mode);
    }

    let mut inlay = None;
    assemble_foreground_effects(
        graph,
        subject,
        &facets,
        &mut underlay,
        &mut overlay,
        &mut inlay,
    );

    for stroke in &stroke_renders {
        if stroke.position == StrokePosition::Center && underlay == overlay {
            underlay = graph.blend(underlay, stroke.render, stroke.mode);
            overlay = underlay;
            continue;
        }
        if stroke.position != StrokePosition::Inside {
            underlay = graph.blend(underlay, stroke.render, stroke.mode);
        }
        if stroke.position != StrokePosition::Outside {
            overlay = graph.blend(overlay, stroke.render, stroke.mode);
        }
    }

    let composite = Composite {
        underlay,
        overlay,
        overlay_mask: body,
        inlay,
    };
    Ok(finalize_layer_assembly(
        graph,
        subject,
        &mut facets,
        composite,
        mask_basis,
        flags,
    ))
}

/// Assemble a text layer. Its glyph render serves as body, body-and-strokes and fill.
pub fn assemble_text_layer(
    graph: &mut ExprGraph,
    layer: &Layer,
    layer_ref: &Rc<LayerRef>,
    mask_basis: Option<MaskBasis>,
    flags: AssemblyFlags,
) -> RendexResult<LayerSubtree> {
    if layer.kind != LayerKind::Text || layer.text.is_none() {
        return Err(RendexError::wrong_layer_type(format!(
            "layer '{}' is not a text layer",
            layer.id
        )));
    }
    let subject = Subject { layer, layer_ref };

    let mut facets = Facets::new();
    request_facets(layer, &mut facets, mask_basis);

    let text = graph.draw_layer_text(layer_ref);
    facets.set(Facet::Body, text);
    facets.set(Facet::BodyAndStrokes, text);
    facets.set(Facet::Fill, text);

    let mut underlay = layer_background(graph, layer);
    let render = apply_fill_replacement_effects(graph, subject, text);
    if render != text {
        let fill = graph.mask(render, text, ChannelMatrix::ALPHA);
        facets.set(Facet::Fill, fill);
    }
    let mut overlay = graph.blend_ignore_alpha(underlay, render, layer.blend_mode);

    let mut inlay = None;
    assemble_foreground_effects(
        graph,
        subject,
        &facets,
        &mut underlay,
        &mut overlay,
        &mut inlay,
    );
    let composite = Composite {
        underlay,
        overlay,
        overlay_mask: text,
        inlay,
    };
    Ok(finalize_layer_assembly(
        graph,
        subject,
        &mut facets,
        composite,
        mask_basis,
        flags,
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/assembly/layer.rs"]
mod tests;
