use super::*;
use crate::document::model::{Effect, LayerKind};
use crate::expr::node::NodeKind;

#[test]
fn pass_through_effect_takes_fill_mode() {
    assert_eq!(
        combine_blend_mode(BlendMode::PassThrough, BlendMode::Screen),
        BlendMode::Screen
    );
    assert_eq!(
        combine_blend_mode(BlendMode::Multiply, BlendMode::Screen),
        BlendMode::Multiply
    );
    assert_eq!(
        combine_blend_mode(BlendMode::PassThrough, BlendMode::PassThrough),
        BlendMode::Normal
    );
}

#[test]
fn isolating_blur_removes_layer_background() {
    let mut g = ExprGraph::new();
    let mut layer = Layer::new("l", LayerKind::Group);
    let bg = layer_background(&mut g, &layer);
    assert!(g.is_background(bg));

    layer.effects.push(Effect::new(
        EffectBasis::LayerAndEffects,
        EffectKind::GaussianBlur { blur: 4.0 },
    ));
    assert_eq!(layer_background(&mut g, &layer), None);

    layer.effects[0].visible = false;
    assert!(layer_background(&mut g, &layer).is_some());
}

#[test]
fn invisible_filters_are_skipped() {
    let mut g = ExprGraph::new();
    let l = LayerRef::root("l");
    let body = g.draw_layer_body(&l);
    let mut hidden = Filter::color_matrix([0.0; 20]);
    hidden.visible = false;
    let out = apply_filters(&mut g, &[hidden, Filter::opacity(0.5)], body);
    assert!(matches!(g.kind(out.unwrap()), NodeKind::MultiplyAlpha { .. }));
}

#[test]
fn mask_facets_are_requested_only_for_active_masks() {
    let layer = Layer::new("l", LayerKind::Group);
    let mut facets = Facets::new();
    request_facets(&layer, &mut facets, Some(MaskBasis::Solid));
    assert!(!facets.is_requested(Facet::Body));
    request_facets(&layer, &mut facets, Some(MaskBasis::FillEmbed));
    assert!(facets.is_requested(Facet::Fill));
}
