use super::*;
use crate::animation::AnimationProvider;

fn opacity_anim(layer: &str, frames: &[(f64, f64)]) -> LayerAnimation {
    LayerAnimation {
        layer: layer.to_string(),
        kind: AnimationKind::Opacity,
        keyframes: frames
            .iter()
            .map(|&(delay, opacity)| Keyframe {
                delay,
                opacity: Some(opacity),
                ..Keyframe::default()
            })
            .collect(),
        rotation_center: None,
    }
}

#[test]
fn opacity_interpolates_between_keyframes() {
    let a = opacity_anim("l", &[(0.0, 1.0), (2.0, 0.0)]);
    assert_eq!(animate_opacity(&a, 0.0), 1.0);
    assert_eq!(animate_opacity(&a, 1.0), 0.5);
    assert_eq!(animate_opacity(&a, 2.0), 0.0);
    assert_eq!(animate_opacity(&a, 10.0), 0.0);
}

#[test]
fn before_first_keyframe_holds_first_value() {
    let a = opacity_anim("l", &[(1.0, 0.2), (1.0, 0.8)]);
    assert_eq!(animate_opacity(&a, 0.5), 0.2);
}

#[test]
fn easing_shapes_segment_progress() {
    let mut a = opacity_anim("l", &[(0.0, 0.0), (1.0, 1.0)]);
    a.keyframes[1].easing = Some(Easing(vec![0.0, 1.0]));
    // Smoothstep-like cubic through [0, 0, 1, 1] is 0.5 at the midpoint.
    assert!((animate_opacity(&a, 0.5) - 0.5).abs() < 1e-12);
    assert!(animate_opacity(&a, 0.25) < 0.25);
}

#[test]
fn wrong_kind_yields_neutral_values() {
    let a = opacity_anim("l", &[(0.0, 0.5)]);
    assert_eq!(animate_rotation(&a, 0.0), 0.0);
    assert_eq!(animate_transform(&a, 0.0), Affine::IDENTITY);
    assert_eq!(animate_color(&a, 0.0), None);
}

#[test]
fn rotation_turns_about_center() {
    let a = LayerAnimation {
        layer: "l".into(),
        kind: AnimationKind::Rotation,
        keyframes: vec![Keyframe {
            delay: 0.0,
            rotation: Some(std::f64::consts::PI),
            ..Keyframe::default()
        }],
        rotation_center: Some([10.0, 10.0]),
    };
    let p = animate_transform(&a, 0.0) * kurbo::Point::new(12.0, 10.0);
    assert!((p.x - 8.0).abs() < 1e-9 && (p.y - 10.0).abs() < 1e-9);
}

#[test]
fn provider_multiplies_opacities_per_layer() {
    let doc = DocumentAnimation {
        animations: vec![
            opacity_anim("l", &[(0.0, 0.5)]),
            opacity_anim("l", &[(0.0, 0.5)]),
            opacity_anim("other", &[(0.0, 0.0)]),
        ],
    };
    assert_eq!(doc.layer_opacity("l", 0.0), 0.25);
    assert_eq!(doc.layer_opacity("missing", 0.0), 1.0);
    assert!(doc.animates_opacity("other"));
}

#[test]
fn validation_requires_values_for_kind() {
    let mut a = opacity_anim("l", &[(0.0, 1.0)]);
    a.keyframes[0].opacity = None;
    assert!(a.validate().is_err());

    let rot = LayerAnimation {
        layer: "l".into(),
        kind: AnimationKind::Rotation,
        keyframes: Vec::new(),
        rotation_center: None,
    };
    assert!(rot.validate().is_err());
}

#[test]
fn inherited_transform_is_conjugated() {
    let parent = LayerAnimation {
        layer: "parent".into(),
        kind: AnimationKind::Transform,
        keyframes: vec![Keyframe {
            delay: 0.0,
            transform: Some([1.0, 0.0, 0.0, 1.0, 10.0, 0.0]),
            ..Keyframe::default()
        }],
        rotation_center: None,
    };
    let child_transform = Affine::scale(2.0);
    let inherited = parent.inherited_by("child", child_transform).unwrap();
    assert_eq!(inherited.layer, "child");

    let own = child_transform * animate_transform(&inherited, 0.0);
    let expected = animate_transform(&parent, 0.0) * child_transform;
    for (a, b) in own.as_coeffs().iter().zip(expected.as_coeffs()) {
        assert!((a - b).abs() < 1e-9);
    }

    assert!(
        opacity_anim("parent", &[(0.0, 0.5)])
            .inherited_by("child", child_transform)
            .is_none()
    );
}

#[test]
fn fill_color_is_not_inherited() {
    let parent = LayerAnimation {
        layer: "parent".into(),
        kind: AnimationKind::FillColor,
        keyframes: vec![Keyframe {
            delay: 0.0,
            color: Some(Color::rgba(0.0, 1.0, 0.0, 1.0)),
            ..Keyframe::default()
        }],
        rotation_center: None,
    };
    assert!(parent.inherited_by("child", Affine::IDENTITY).is_none());
}

#[test]
fn inherited_rotation_moves_center() {
    let parent = LayerAnimation {
        layer: "parent".into(),
        kind: AnimationKind::Rotation,
        keyframes: vec![Keyframe {
            delay: 0.0,
            rotation: Some(1.0),
            ..Keyframe::default()
        }],
        rotation_center: Some([4.0, 4.0]),
    };
    let inherited = parent
        .inherited_by("child", Affine::translate((2.0, 0.0)))
        .unwrap();
    assert_eq!(inherited.rotation_center, Some([2.0, 4.0]));
}
