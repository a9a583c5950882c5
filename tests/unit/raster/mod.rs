use super::*;
use crate::document::model::{Fill, Stroke};
use crate::foundation::core::Color;

fn square(strokes: Vec<Stroke>) -> Shape {
    Shape {
        path: "M0 0 H10 V10 H0 Z".to_owned(),
        fill_rule: FillRule::NonZero,
        fills: vec![Fill::color(Color::BLACK)],
        strokes,
    }
}

fn stroke(position: StrokePosition, thickness: f64) -> Stroke {
    Stroke {
        visible: true,
        position,
        thickness,
        fill: Fill::color(Color::WHITE),
    }
}

#[test]
fn parses_path_and_strokes() {
    let geom = ShapeGeometry::from_shape(&square(vec![stroke(StrokePosition::Outside, 2.0)]))
        .unwrap();
    assert_eq!(geom.body_bounds(), Rect::new(0.0, 0.0, 10.0, 10.0));
    assert_eq!(geom.strokes.len(), 1);
    assert_eq!(geom.stroke(0).unwrap().outline_width(), 4.0);
    assert!(matches!(
        geom.stroke(1),
        Err(RendexError::InvalidIndex(_))
    ));
}

#[test]
fn invalid_path_is_a_shape_layer_error() {
    let mut shape = square(Vec::new());
    shape.path = "M0 0 Q".to_owned();
    let err = ShapeGeometry::from_shape(&shape).unwrap_err();
    assert!(matches!(err, RendexError::ShapeLayerError(_)));
}

#[test]
fn negative_thickness_is_rejected() {
    let err = ShapeGeometry::from_shape(&square(vec![stroke(StrokePosition::Center, -1.0)]))
        .unwrap_err();
    assert!(err.to_string().contains("invalid thickness"));
}

#[test]
fn logical_bounds_grow_by_outward_strokes() {
    let geom = ShapeGeometry::from_shape(&square(vec![
        stroke(StrokePosition::Inside, 5.0),
        stroke(StrokePosition::Center, 2.0),
        stroke(StrokePosition::Outside, 3.0),
    ]))
    .unwrap();
    assert_eq!(geom.logical_bounds(), Rect::new(-3.0, -3.0, 13.0, 13.0));
}

#[test]
fn empty_path_has_empty_bounds() {
    let mut shape = square(Vec::new());
    shape.path = String::new();
    let geom = ShapeGeometry::from_shape(&shape).unwrap();
    assert_eq!(geom.body_bounds(), Rect::ZERO);
    assert_eq!(geom.logical_bounds(), Rect::ZERO);
}
