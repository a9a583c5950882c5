use super::*;
use crate::document::model::Shape;

fn rect() -> Layer {
    Layer::shape(
        "rect",
        Shape {
            path: "M0 0 L10 0 L10 10 L0 10 Z".to_string(),
            fills: vec![Fill::color(Color::BLACK)],
            ..Default::default()
        },
    )
}

#[test]
fn levels_are_ordered() {
    assert!(ChangeLevel::None < ChangeLevel::Logical);
    assert!(ChangeLevel::Visual < ChangeLevel::Bounds);
    assert!(ChangeLevel::Composition < ChangeLevel::Hierarchy);
}

#[test]
fn property_change_takes_highest_level() {
    let mut layer = rect();
    let change = LayerChange::Properties(PropertyChange {
        name: Some("Rectangle".to_string()),
        transform: Some([2.0, 0.0, 0.0, 2.0, 5.0, 5.0]),
        ..Default::default()
    });
    assert_eq!(apply_change(&mut layer, &change).unwrap(), ChangeLevel::Bounds);
    assert_eq!(layer.name, "Rectangle");
    assert_eq!(layer.transform[4], 5.0);

    let rename = LayerChange::Properties(PropertyChange {
        name: Some("r".to_string()),
        ..Default::default()
    });
    assert_eq!(apply_change(&mut layer, &rename).unwrap(), ChangeLevel::Logical);

    let hide = LayerChange::Properties(PropertyChange {
        visible: Some(false),
        ..Default::default()
    });
    assert_eq!(apply_change(&mut layer, &hide).unwrap(), ChangeLevel::Composition);
}

#[test]
fn singular_transform_is_rejected_and_layer_kept() {
    let mut layer = rect();
    let change = LayerChange::Properties(PropertyChange {
        name: Some("changed".to_string()),
        transform: Some([1.0, 2.0, 2.0, 4.0, 0.0, 0.0]),
        ..Default::default()
    });
    let err = apply_change(&mut layer, &change).unwrap_err();
    assert!(matches!(err, RendexError::SingularTransformation(_)));
    assert_eq!(layer, rect());
}

#[test]
fn properties_must_match_layer_type() {
    let mut layer = rect();
    let change = LayerChange::Properties(PropertyChange {
        mask_basis: Some(MaskBasis::Body),
        ..Default::default()
    });
    assert!(matches!(
        apply_change(&mut layer, &change),
        Err(RendexError::WrongLayerType(_))
    ));

    let mut group = Layer::group("g");
    let change = LayerChange::Properties(PropertyChange {
        path: Some("M0 0 L1 1 Z".to_string()),
        ..Default::default()
    });
    assert!(matches!(
        apply_change(&mut group, &change),
        Err(RendexError::WrongLayerType(_))
    ));
    assert!(matches!(
        apply_change(&mut group, &LayerChange::Fill(ListEdit::Remove { index: 0 })),
        Err(RendexError::WrongLayerType(_))
    ));
}

#[test]
fn out_of_range_opacity_fails_validation() {
    let mut layer = rect();
    let change = LayerChange::Properties(PropertyChange {
        opacity: Some(1.5),
        ..Default::default()
    });
    assert!(matches!(
        apply_change(&mut layer, &change),
        Err(RendexError::Validation(_))
    ));
    assert_eq!(layer.opacity, 1.0);
}

#[test]
fn fill_list_edits_check_indices() {
    let mut layer = rect();
    let insert = LayerChange::Fill(ListEdit::Insert {
        index: Some(1),
        value: Fill::color(Color::WHITE),
    });
    assert_eq!(apply_change(&mut layer, &insert).unwrap(), ChangeLevel::Composition);
    assert_eq!(layer.shape.as_ref().unwrap().fills.len(), 2);

    let bad = LayerChange::Fill(ListEdit::Insert {
        index: Some(5),
        value: Fill::color(Color::WHITE),
    });
    assert!(matches!(
        apply_change(&mut layer, &bad),
        Err(RendexError::InvalidIndex(_))
    ));

    let remove = LayerChange::Fill(ListEdit::Remove { index: 0 });
    apply_change(&mut layer, &remove).unwrap();
    let fills = &layer.shape.as_ref().unwrap().fills;
    assert_eq!(fills.len(), 1);
    assert_eq!(fills[0], Fill::color(Color::WHITE));

    let replace = LayerChange::Fill(ListEdit::Replace {
        index: 1,
        value: Fill::color(Color::BLACK),
    });
    assert!(matches!(
        apply_change(&mut layer, &replace),
        Err(RendexError::InvalidIndex(_))
    ));
}

#[test]
fn fill_color_is_visual() {
    let mut layer = rect();
    let change = LayerChange::FillColor {
        index: 0,
        color: Color::WHITE,
    };
    assert_eq!(apply_change(&mut layer, &change).unwrap(), ChangeLevel::Visual);
    assert_eq!(
        layer.shape.as_ref().unwrap().fills[0].paint,
        Paint::Color {
            color: Color::WHITE
        }
    );
}
