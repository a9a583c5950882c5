use super::*;
use crate::assembly::LayerSubtree;
use crate::document::model::{
    Effect, EffectBasis, EffectKind, Fill, Glow, Shape, Stroke, TextStyle,
};
use crate::expr::dump::dump;
use crate::expr::node::NodeKind;
use crate::foundation::core::Color;

const FIXED: AssemblyFlags = AssemblyFlags {
    fixed_opacity: true,
};

fn square(fills: Vec<Fill>, strokes: Vec<Stroke>) -> Layer {
    Layer::shape(
        "s",
        Shape {
            path: "M0 0H10V10H0Z".to_string(),
            fill_rule: Default::default(),
            fills,
            strokes,
        },
    )
}

fn stroke(position: StrokePosition) -> Stroke {
    Stroke {
        visible: true,
        position,
        thickness: 4.0,
        fill: Fill::color(Color::rgba(0.0, 0.0, 1.0, 1.0)),
    }
}

fn assemble(layer: &Layer, flags: AssemblyFlags) -> (ExprGraph, LayerSubtree) {
    let mut g = ExprGraph::new();
    let r = LayerRef::root(layer.id.clone());
    let subtree = assemble_shape_layer(&mut g, layer, &r, None, flags).unwrap();
    (g, subtree)
}

#[test]
fn fill_with_outside_stroke_switches_on_body() {
    let layer = square(
        vec![Fill::color(Color::rgba(1.0, 0.0, 0.0, 1.0))],
        vec![stroke(StrokePosition::Outside)],
    );
    let (g, subtree) = assemble(&layer, FIXED);
    let expected = "\
#0 MixMask([0.0, 0.0, 0.0, 1.0, 0.0]) dst=#1 src=#6 mask=#8 [bg]
#1 Blend(normal) dst=#2 src=#3 [bg]
#2 Background [bg]
#3 Mask([0.0, 0.0, 0.0, 1.0, 0.0]) image=#4 mask=#5
#4 LayerStrokeFill(s[0])
#5 LayerStroke(s[0])
#6 Blend(normal) dst=#2 src=#7 [bg]
#7 LayerFill(s[0])
#8 LayerBody(s)
";
    assert_eq!(dump(&g, subtree.root), expected);
    assert_eq!(subtree.inlay, None);
    assert_eq!(subtree.mask_facet, None);
}

#[test]
fn center_stroke_without_fill_unifies_underlay_and_overlay() {
    let layer = square(Vec::new(), vec![stroke(StrokePosition::Center)]);
    let (g, subtree) = assemble(&layer, FIXED);
    let root = subtree.root.unwrap();
    assert!(matches!(g.kind(root), NodeKind::Blend { .. }));
    let blends = g
        .nodes()
        .filter(|(_, n)| matches!(n.kind, NodeKind::Blend { .. }))
        .count();
    // One for body-and-strokes, one for the stroke render.
    assert_eq!(blends, 2);
}

#[test]
fn pass_through_blends_each_fill_into_background() {
    let mut top = Fill::color(Color::WHITE);
    top.blend_mode = BlendMode::Screen;
    let mut layer = square(vec![Fill::color(Color::BLACK), top], Vec::new());
    layer.blend_mode = BlendMode::PassThrough;
    let (g, subtree) = assemble(&layer, FIXED);

    let NodeKind::MixMask { src, .. } = *g.kind(subtree.root.unwrap()) else {
        panic!("expected a body switch");
    };
    let NodeKind::Blend { dst, mode, .. } = *g.kind(src) else {
        panic!("expected the top fill blend");
    };
    assert_eq!(mode, BlendMode::Screen);
    assert!(matches!(
        g.kind(dst),
        NodeKind::Blend {
            mode: BlendMode::Normal,
            ..
        }
    ));
}

#[test]
fn animated_opacity_defers_to_layer_opacity_node() {
    let layer = square(vec![Fill::color(Color::BLACK)], Vec::new());
    let (g, subtree) = assemble(&layer, AssemblyFlags::default());
    assert!(matches!(
        g.kind(subtree.root.unwrap()),
        NodeKind::MixLayerOpacity { a: Some(_), b: Some(_), .. }
    ));
}

#[test]
fn fixed_opacity_mixes_with_background() {
    let mut layer = square(vec![Fill::color(Color::BLACK)], Vec::new());
    layer.opacity = 0.5;
    let (g, subtree) = assemble(&layer, FIXED);
    assert!(matches!(
        g.kind(subtree.root.unwrap()),
        NodeKind::Mix { ratio, .. } if *ratio == 0.5
    ));
}

#[test]
fn shadows_go_under_inner_glows_over() {
    let glow = Glow {
        blur: 2.0,
        choke: 0.0,
        color: Color::WHITE,
    };
    let mut layer = square(vec![Fill::color(Color::BLACK)], Vec::new());
    layer.effects = vec![
        Effect::new(EffectBasis::Body, EffectKind::OuterGlow { glow: glow.clone() }),
        Effect::new(EffectBasis::Fill, EffectKind::InnerGlow { glow }),
    ];
    let (g, subtree) = assemble(&layer, FIXED);

    let NodeKind::MixMask { dst, src, .. } = *g.kind(subtree.root.unwrap()) else {
        panic!("expected a body switch");
    };
    let NodeKind::Blend { src: outer, .. } = *g.kind(dst) else {
        panic!("expected the outer glow in the underlay");
    };
    assert!(matches!(
        g.kind(outer),
        NodeKind::DrawLayerEffect { index: 0, basis: Some(b), .. } if matches!(g.kind(*b), NodeKind::DrawLayerBody { .. })
    ));
    let NodeKind::Blend { src: inner, .. } = *g.kind(src) else {
        panic!("expected the inner glow in the overlay");
    };
    assert!(matches!(
        g.kind(inner),
        NodeKind::DrawLayerEffect { index: 1, basis: Some(b), .. } if matches!(g.kind(*b), NodeKind::Mask { .. })
    ));
    assert!(subtree.inlay.is_some());
}

#[test]
fn layer_and_effects_blur_isolates_the_layer() {
    let mut layer = square(vec![Fill::color(Color::BLACK)], Vec::new());
    layer.effects = vec![Effect::new(
        EffectBasis::LayerAndEffects,
        EffectKind::GaussianBlur { blur: 3.0 },
    )];
    let (g, subtree) = assemble(&layer, FIXED);

    let NodeKind::Blend { dst, src, .. } = *g.kind(subtree.root.unwrap()) else {
        panic!("expected the isolated render blended onto the background");
    };
    assert!(g.kind(dst).is_background());
    let NodeKind::DrawLayerEffect { basis: Some(basis), .. } = *g.kind(src) else {
        panic!("expected the blur");
    };
    // The blurred composite has no background of its own.
    assert!(!g.flags(basis).contains(crate::expr::node::NodeFlags::BACKGROUND_DEPENDENT));
}

#[test]
fn fill_blur_replaces_fill() {
    let mut layer = square(vec![Fill::color(Color::BLACK)], Vec::new());
    layer.effects = vec![Effect::new(EffectBasis::Fill, EffectKind::Blur { blur: 2.0 })];
    let (g, subtree) = assemble(&layer, FIXED);
    let NodeKind::MixMask { src, .. } = *g.kind(subtree.root.unwrap()) else {
        panic!("expected a body switch");
    };
    let NodeKind::Blend { src: fill, .. } = *g.kind(src) else {
        panic!("expected the fill blend");
    };
    assert!(matches!(g.kind(fill), NodeKind::DrawLayerEffect { .. }));
}

#[test]
fn embedded_mask_gets_inlay_and_mask_facet() {
    let layer = square(vec![Fill::color(Color::BLACK)], Vec::new());
    let mut g = ExprGraph::new();
    let r = LayerRef::root("s");
    let subtree =
        assemble_shape_layer(&mut g, &layer, &r, Some(MaskBasis::BodyEmbed), FIXED).unwrap();
    assert!(subtree.inlay.is_some());
    assert!(matches!(
        g.kind(subtree.mask_facet.unwrap()),
        NodeKind::DrawLayerBody { .. }
    ));
}

#[test]
fn text_layer_uses_glyphs_for_every_facet() {
    let mut layer = Layer::new("t", LayerKind::Text);
    layer.text = Some(TextStyle {
        content: "hi".to_string(),
        font: None,
        size: 12.0,
        color: Color::BLACK,
    });
    let mut g = ExprGraph::new();
    let r = LayerRef::root("t");
    let subtree =
        assemble_text_layer(&mut g, &layer, &r, Some(MaskBasis::Fill), FIXED).unwrap();
    assert!(matches!(
        g.kind(subtree.mask_facet.unwrap()),
        NodeKind::DrawLayerText { .. }
    ));
    // The shortcut turns the body switch of an ignore-alpha blend into a plain blend.
    assert!(matches!(g.kind(subtree.root.unwrap()), NodeKind::Blend { .. }));
}

#[test]
fn wrong_layer_kind_is_rejected() {
    let layer = Layer::new("g", LayerKind::Group);
    let mut g = ExprGraph::new();
    let r = LayerRef::root("g");
    assert!(matches!(
        assemble_shape_layer(&mut g, &layer, &r, None, FIXED),
        Err(RendexError::WrongLayerType(_))
    ));
    assert!(matches!(
        assemble_text_layer(&mut g, &layer, &r, None, FIXED),
        Err(RendexError::WrongLayerType(_))
    ));
}
