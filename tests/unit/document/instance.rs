use super::*;
use crate::document::model::{Fill, Shape, Stroke, StrokePosition, TextStyle};
use crate::foundation::core::Color;

fn square(id: &str) -> Layer {
    Layer::shape(
        id,
        Shape {
            path: "M0 0 L10 0 L10 10 L0 10 Z".to_string(),
            fills: vec![Fill::color(Color::BLACK)],
            strokes: vec![Stroke {
                visible: true,
                position: StrokePosition::Outside,
                thickness: 2.0,
                fill: Fill::color(Color::WHITE),
            }],
            ..Default::default()
        },
    )
}

struct FixedShaper;

impl TextShaper for FixedShaper {
    fn shape_text(&self, style: &TextStyle) -> RendexResult<TextShape> {
        Ok(TextShape {
            handle: style.content.len() as u64,
            bounds: Rect::new(0.0, 0.0, 6.0 * style.content.len() as f64, style.size),
        })
    }

    fn draw_text(
        &self,
        _shape: &TextShape,
        _transform: Affine,
    ) -> RendexResult<Option<crate::render::image::PlacedImage>> {
        Ok(None)
    }
}

#[test]
fn shape_bounds_include_outside_stroke() {
    let mut layer = square("s");
    layer.transform = [1.0, 0.0, 0.0, 1.0, 5.0, 0.0];
    let mut instance = LayerInstance::new(&layer, Some("root".into()), Affine::scale(2.0), 1.0);
    instance.initialize_shape(&layer).unwrap();

    let bounds = instance.bounds();
    assert_eq!(bounds.logical, Rect::new(0.0, 0.0, 10.0, 10.0));
    assert_eq!(bounds.untransformed, Rect::new(-2.0, -2.0, 12.0, 12.0));
    assert_eq!(bounds.transformed, Rect::new(6.0, -4.0, 34.0, 24.0));
    assert_eq!(instance.parent(), Some("root"));
}

#[test]
fn bad_path_is_a_shape_layer_error() {
    let mut layer = square("s");
    if let Some(shape) = layer.shape.as_mut() {
        shape.path = "M0 0 X 5 5".to_string();
    }
    let mut instance = LayerInstance::new(&layer, None, Affine::IDENTITY, 1.0);
    assert!(matches!(
        instance.initialize_shape(&layer),
        Err(RendexError::ShapeLayerError(_))
    ));
}

#[test]
fn geometry_is_kept_until_invalidated() {
    let mut layer = square("s");
    let mut instance = LayerInstance::new(&layer, None, Affine::IDENTITY, 1.0);
    instance.initialize_shape(&layer).unwrap();

    if let Some(shape) = layer.shape.as_mut() {
        shape.path = "M0 0 L20 0 L20 20 Z".to_string();
    }
    instance.initialize_shape(&layer).unwrap();
    assert_eq!(instance.bounds().logical.width(), 10.0);

    instance.invalidate();
    assert!(instance.geometry().is_none());
    instance.initialize_shape(&layer).unwrap();
    assert_eq!(instance.bounds().logical.width(), 20.0);
}

#[test]
fn text_without_shaper_is_empty() {
    let mut layer = Layer::new("t", LayerKind::Text);
    layer.text = Some(TextStyle {
        content: "hello".to_string(),
        font: None,
        size: 10.0,
        color: Color::BLACK,
    });
    let mut instance = LayerInstance::new(&layer, None, Affine::IDENTITY, 1.0);
    instance.initialize_text(&layer, None).unwrap();
    assert!(instance.text_shape().is_none());
    assert_eq!(instance.bounds().logical, Rect::ZERO);

    instance.invalidate();
    instance.initialize_text(&layer, Some(&FixedShaper)).unwrap();
    assert_eq!(instance.bounds().logical, Rect::new(0.0, 0.0, 30.0, 10.0));
}

#[test]
fn feature_scale_composes_with_parent() {
    let mut layer = square("s");
    layer.feature_scale = Some(2.0);
    let instance = LayerInstance::new(&layer, None, Affine::IDENTITY, 1.5);
    assert_eq!(instance.feature_scale(), 3.0);
}

#[test]
fn layer_ref_is_replaced_only_when_placement_changes() {
    let layer = square("s");
    let mut instance = LayerInstance::new(&layer, None, Affine::IDENTITY, 1.0);
    let before = Rc::clone(instance.layer_ref());
    instance.set_parent(&layer, None, Affine::IDENTITY, 1.0);
    assert!(Rc::ptr_eq(&before, instance.layer_ref()));

    instance.set_parent(&layer, None, Affine::translate((1.0, 0.0)), 1.0);
    assert!(!Rc::ptr_eq(&before, instance.layer_ref()));
}

#[test]
fn empty_bounds_union() {
    let r = Rect::new(1.0, 1.0, 2.0, 2.0);
    assert_eq!(union_bounds(Rect::ZERO, r), r);
    assert_eq!(union_bounds(r, Rect::ZERO), r);
    assert_eq!(transform_bounds(Rect::ZERO, Affine::translate((3.0, 3.0))), Rect::ZERO);
}
