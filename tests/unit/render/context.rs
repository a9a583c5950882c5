use super::*;
use crate::animation::anim::{AnimationKind, DocumentAnimation, Keyframe, LayerAnimation};
use crate::document::change::{LayerChange, PropertyChange};
use crate::foundation::core::Color;

const DOC: &str = r#"{
    "dimensions": { "width": 20, "height": 20 },
    "root": {
        "id": "root",
        "type": "group",
        "children": [
            {
                "id": "square",
                "type": "shape",
                "shape": {
                    "path": "M5 5 L15 5 L15 15 L5 15 Z",
                    "fills": [ { "paint": { "type": "color", "color": { "r": 1, "g": 0, "b": 0 } } } ]
                }
            }
        ]
    }
}"#;

fn component() -> Component {
    Component::from_json(DOC).unwrap()
}

fn single(layer: &str, kind: AnimationKind, keyframe: Keyframe) -> DocumentAnimation {
    DocumentAnimation {
        animations: vec![LayerAnimation {
            layer: layer.to_string(),
            kind,
            keyframes: vec![keyframe],
            rotation_center: None,
        }],
    }
}

#[test]
fn renders_a_filled_square_into_the_document_frame() {
    let mut c = component();
    let mut renderer = CpuRenderer::default();
    let image = renderer.render(&mut c, &RenderOpts::default()).unwrap();
    assert_eq!(image.bounds, PixelBounds::new(0, 0, 20, 20));
    assert_eq!(image.pixel_at(10, 10), [255, 0, 0, 255]);
    assert_eq!(image.pixel_at(2, 2), [0, 0, 0, 0]);
}

#[test]
fn scale_grows_the_frame() {
    let mut c = component();
    let mut renderer = CpuRenderer::default();
    let opts = RenderOpts {
        scale: 2.0,
        ..RenderOpts::default()
    };
    let image = renderer.render(&mut c, &opts).unwrap();
    assert_eq!(image.bounds, PixelBounds::new(0, 0, 40, 40));
    assert_eq!(image.pixel_at(25, 25), [255, 0, 0, 255]);
    assert_eq!(image.pixel_at(8, 8), [0, 0, 0, 0]);
}

#[test]
fn invalid_scale_is_rejected() {
    let mut c = component();
    let mut renderer = CpuRenderer::default();
    let opts = RenderOpts {
        scale: 0.0,
        ..RenderOpts::default()
    };
    assert!(matches!(
        renderer.render(&mut c, &opts),
        Err(RendexError::Validation(_))
    ));
}

#[test]
fn stale_component_is_rejected() {
    let mut c = component();
    let graph = c.assemble().unwrap();
    let hide = LayerChange::Properties(PropertyChange {
        visible: Some(false),
        ..Default::default()
    });
    c.modify_layer("square", &hide).unwrap();
    let mut renderer = CpuRenderer::default();
    let err = render(&c, &graph, renderer.services(), &RenderOpts::default()).unwrap_err();
    assert!(matches!(err, RendexError::Validation(_)));
}

#[test]
fn graph_from_before_an_edit_is_rejected_after_a_rebuild() {
    let mut c = component();
    let graph = c.assemble().unwrap();
    c.remove_layer("square").unwrap();
    // Queries rebuild the cache, which must not revive the old graph.
    c.bounds().unwrap();
    assert!(c.is_built());
    let mut renderer = CpuRenderer::default();
    let err = render(&c, &graph, renderer.services(), &RenderOpts::default()).unwrap_err();
    assert!(matches!(err, RendexError::Validation(_)));

    let fresh = c.assemble().unwrap();
    assert_eq!(fresh.revision, c.revision());
    let image = render(&c, &fresh, renderer.services(), &RenderOpts::default()).unwrap();
    assert_eq!(image.pixel_at(10, 10), [0, 0, 0, 0]);
}

#[test]
fn animated_fill_color_replaces_the_paint() {
    let mut c = component();
    c.set_animations(single(
        "square",
        AnimationKind::FillColor,
        Keyframe {
            delay: 0.0,
            color: Some(Color::rgba(0.0, 0.0, 1.0, 1.0)),
            ..Keyframe::default()
        },
    ))
    .unwrap();
    let mut renderer = CpuRenderer::default();
    let image = renderer.render(&mut c, &RenderOpts::default()).unwrap();
    assert_eq!(image.pixel_at(10, 10), [0, 0, 255, 255]);
}

#[test]
fn animated_opacity_multiplies_layer_opacity() {
    let mut c = component();
    let half = LayerChange::Properties(PropertyChange {
        opacity: Some(0.5),
        ..Default::default()
    });
    c.modify_layer("square", &half).unwrap();
    c.set_animations(single(
        "square",
        AnimationKind::Opacity,
        Keyframe {
            delay: 0.0,
            opacity: Some(0.5),
            ..Keyframe::default()
        },
    ))
    .unwrap();
    let graph = c.assemble().unwrap();
    let mut renderer = CpuRenderer::default();
    let mut ctx = RenderContext::new(&c, renderer.services(), RenderOpts::default());
    let square = c.instance("square").unwrap().layer_ref().clone();
    assert_eq!(ctx.layer_opacity(&square), Some(0.25));

    let (image, _) = transform(&graph.graph, graph.root, &mut ctx);
    let alpha = image.unwrap().pixel_at(10, 10)[3];
    assert!((63..=65).contains(&alpha), "alpha {alpha}");
}

#[test]
fn frame_defaults_to_component_bounds() {
    let mut doc = crate::document::model::Document::from_json(DOC).unwrap();
    doc.dimensions = None;
    let mut c = Component::from_document(&doc).unwrap();
    let mut renderer = CpuRenderer::default();
    let image = renderer.render(&mut c, &RenderOpts::default()).unwrap();
    assert_eq!(image.bounds, PixelBounds::new(5, 5, 15, 15));
}

#[test]
fn explicit_bounds_crop() {
    let mut c = component();
    let mut renderer = CpuRenderer::default();
    let opts = RenderOpts {
        bounds: Some(PixelBounds::new(10, 10, 12, 12)),
        ..RenderOpts::default()
    };
    let image = renderer.render(&mut c, &opts).unwrap();
    assert_eq!(image.bounds.width(), 2);
    assert_eq!(image.pixel_at(11, 11), [255, 0, 0, 255]);
}
