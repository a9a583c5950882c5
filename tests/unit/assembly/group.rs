use super::*;
use crate::assembly::assemble_shape_layer;
use crate::document::model::{Fill, LayerKind, Shape};
use crate::expr::node::{NodeFlags, NodeKind};
use crate::foundation::core::Color;

const FIXED: AssemblyFlags = AssemblyFlags {
    fixed_opacity: true,
};

fn child(g: &mut ExprGraph, id: &str, mask_basis: Option<MaskBasis>) -> LayerSubtree {
    let layer = Layer::shape(
        id,
        Shape {
            path: "M0 0H10V10H0Z".to_string(),
            fill_rule: Default::default(),
            fills: vec![Fill::color(Color::BLACK)],
            strokes: Vec::new(),
        },
    );
    let r = LayerRef::root(id);
    assemble_shape_layer(g, &layer, &r, mask_basis, FIXED).unwrap()
}

fn group(kind: LayerKind, mode: BlendMode) -> (Layer, Rc<LayerRef>) {
    let mut layer = Layer::new("g", kind);
    layer.blend_mode = mode;
    (layer, LayerRef::root("g"))
}

#[test]
fn isolated_group_unbinds_its_background() {
    let mut g = ExprGraph::new();
    let (layer, r) = group(LayerKind::Group, BlendMode::Multiply);
    let mut asm = GroupLayerAssembler::new(&mut g, &layer, &r, None, FIXED);
    let a = child(&mut g, "a", None);
    let b = child(&mut g, "b", None);
    asm.add_layer(&mut g, a);
    asm.add_layer(&mut g, b);
    let subtree = asm.finish(&mut g).unwrap();

    // Body switch of an ignore-alpha blend collapses into a multiply blend.
    let NodeKind::Blend { dst, src, mode } = *g.kind(subtree.root.unwrap()) else {
        panic!("expected the group blended onto its background");
    };
    assert_eq!(mode, BlendMode::Multiply);
    assert!(g.kind(dst).is_background());
    assert!(matches!(
        g.kind(src),
        NodeKind::SetBackground {
            background: None,
            ..
        }
    ));
    assert!(!g.flags(src).contains(NodeFlags::BACKGROUND_DEPENDENT));
}

#[test]
fn pass_through_group_without_effects_is_its_content() {
    let mut g = ExprGraph::new();
    let (layer, r) = group(LayerKind::Group, BlendMode::PassThrough);
    let mut asm = GroupLayerAssembler::new(&mut g, &layer, &r, None, FIXED);
    let a = child(&mut g, "a", None);
    let b = child(&mut g, "b", None);
    asm.add_layer(&mut g, a);
    asm.add_layer(&mut g, b);
    let subtree = asm.finish(&mut g).unwrap();

    let NodeKind::SetBackground {
        content,
        background: Some(inner),
    } = *g.kind(subtree.root.unwrap())
    else {
        panic!("expected child b over child a");
    };
    assert_eq!(Some(content), b.root);
    assert_eq!(Some(inner), a.root);
    // Still reads the parent's background.
    assert!(g.flags(subtree.root.unwrap()).contains(NodeFlags::BACKGROUND_DEPENDENT));
}

#[test]
fn mask_group_gates_content_with_mask_facet() {
    let mut g = ExprGraph::new();
    let (mut layer, r) = group(LayerKind::MaskGroup, BlendMode::Normal);
    layer.mask_basis = Some(MaskBasis::Body);
    let mut asm = GroupLayerAssembler::new(&mut g, &layer, &r, None, FIXED);
    let mask = child(&mut g, "m", Some(MaskBasis::Body));
    asm.set_mask(&mut g, mask, true);
    let a = child(&mut g, "a", None);
    asm.add_layer(&mut g, a);
    let subtree = asm.finish(&mut g).unwrap();

    let NodeKind::MixMask {
        dst,
        mask: gate,
        channels,
        ..
    } = *g.kind(subtree.root.unwrap())
    else {
        panic!("expected the mask gate");
    };
    assert!(g.kind(dst).is_background());
    assert_eq!(Some(gate), mask.mask_facet);
    assert_eq!(channels, ChannelMatrix::ALPHA);
}

#[test]
fn solid_mask_is_an_ordinary_child() {
    let mut g = ExprGraph::new();
    let (mut layer, r) = group(LayerKind::MaskGroup, BlendMode::PassThrough);
    layer.mask_basis = Some(MaskBasis::Solid);
    let mut asm = GroupLayerAssembler::new(&mut g, &layer, &r, None, FIXED);
    let mask = child(&mut g, "m", Some(MaskBasis::Solid));
    asm.set_mask(&mut g, mask, true);
    let subtree = asm.finish(&mut g).unwrap();
    // The layer's background collapses, leaving the mask layer itself.
    assert_eq!(subtree.root, mask.root);
}

#[test]
fn embedded_mask_splices_content_into_inlay() {
    let mut g = ExprGraph::new();
    let (mut layer, r) = group(LayerKind::MaskGroup, BlendMode::PassThrough);
    layer.mask_basis = Some(MaskBasis::BodyEmbed);
    let mut asm = GroupLayerAssembler::new(&mut g, &layer, &r, None, FIXED);
    let mask = child(&mut g, "m", Some(MaskBasis::BodyEmbed));
    let slot = mask.inlay.unwrap();
    let before = g.inlay_content(slot).unwrap();
    asm.set_mask(&mut g, mask, true);
    let a = child(&mut g, "a", None);
    asm.add_layer(&mut g, a);
    let subtree = asm.finish(&mut g).unwrap();

    assert_eq!(subtree.root, mask.root);
    let spliced = g.inlay_content(slot).unwrap();
    assert!(matches!(
        g.kind(spliced),
        NodeKind::SetBackground { content, background: Some(bg) } if *bg == before && Some(*content) == a.root
    ));
}

#[test]
fn pass_through_mask_provides_layer_and_effects_facet() {
    let mut g = ExprGraph::new();
    let (layer, r) = group(LayerKind::Group, BlendMode::PassThrough);
    let basis = Some(MaskBasis::LayerAndEffects);
    let mut asm = GroupLayerAssembler::new(&mut g, &layer, &r, basis, FIXED);
    let a = child(&mut g, "a", None);
    asm.add_layer(&mut g, a);
    let subtree = asm.finish(&mut g).unwrap();

    let facet = subtree.mask_facet.expect("layer-and-effects facet of the group");
    assert!(matches!(
        g.kind(facet),
        NodeKind::SetBackground {
            background: None,
            ..
        }
    ));
}
