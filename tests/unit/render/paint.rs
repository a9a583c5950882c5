use super::*;
use crate::document::model::{EffectBasis, Fill, GradientStop};

fn target(transform: Affine) -> DrawTarget {
    DrawTarget {
        transform,
        render_scale: 1.0,
        feature_scale: 1.0,
        local_bounds: Rect::new(0.0, 0.0, 4.0, 4.0),
    }
}

fn red() -> Paint {
    Paint::Color {
        color: Color::rgba(1.0, 0.0, 0.0, 1.0),
    }
}

#[test]
fn effect_scale_follows_render_and_feature_scale() {
    let mut t = target(Affine::scale(2.0));
    t.render_scale = 2.0;
    t.feature_scale = 1.5;
    assert!((t.effect_scale() - 3.0).abs() < 1e-9);
    assert_eq!(t.device_bounds(), PixelBounds::new(0, 0, 8, 8));
}

#[test]
fn solid_paint_covers_bounds() {
    let mut out = Compositor::default();
    let mut painter = CpuPainter::default();
    let bounds = PixelBounds::new(2, 3, 5, 6);
    let img = painter
        .paint(&mut out, &red(), &target(Affine::IDENTITY), bounds)
        .unwrap();
    assert_eq!(img.bounds, bounds);
    assert_eq!(img.pixel_at(2, 3), [255, 0, 0, 255]);
    assert_eq!(img.pixel_at(4, 5), [255, 0, 0, 255]);
}

#[test]
fn transparent_paint_is_null() {
    let mut out = Compositor::default();
    let paint = Paint::Color {
        color: Color::TRANSPARENT,
    };
    let img = CpuPainter::default().paint(
        &mut out,
        &paint,
        &target(Affine::IDENTITY),
        PixelBounds::new(0, 0, 2, 2),
    );
    assert!(img.is_none());
}

#[test]
fn linear_gradient_runs_from_start_to_end() {
    let mut out = Compositor::default();
    let paint = Paint::Gradient {
        gradient: Gradient {
            kind: GradientKind::Linear,
            start: [0.0, 0.0],
            end: [10.0, 0.0],
            stops: vec![
                GradientStop {
                    position: 0.0,
                    color: Color::BLACK,
                },
                GradientStop {
                    position: 1.0,
                    color: Color::WHITE,
                },
            ],
        },
    };
    let img = CpuPainter::default()
        .paint(
            &mut out,
            &paint,
            &target(Affine::IDENTITY),
            PixelBounds::new(0, 0, 10, 1),
        )
        .unwrap();
    let first = img.pixel_at(0, 0);
    let last = img.pixel_at(9, 0);
    assert!(first[0] < 20);
    assert!(last[0] > 235);
    assert_eq!(first[3], 255);
}

#[test]
fn stops_clamp_outside_their_range() {
    let gradient = Gradient {
        kind: GradientKind::Radial,
        start: [0.0, 0.0],
        end: [1.0, 0.0],
        stops: vec![
            GradientStop {
                position: 0.25,
                color: Color::BLACK,
            },
            GradientStop {
                position: 0.75,
                color: Color::WHITE,
            },
        ],
    };
    assert_eq!(sample_stops(&gradient, 0.0), Color::BLACK);
    assert_eq!(sample_stops(&gradient, 2.0), Color::WHITE);
    let mid = sample_stops(&gradient, 0.5);
    assert!((mid.r - 0.5).abs() < 1e-9);
}

#[test]
fn missing_image_asset_draws_nothing() {
    let mut out = Compositor::default();
    let paint = Paint::Image {
        image: ImageRef {
            asset: "nope".to_string(),
            rect: None,
        },
    };
    let img = CpuPainter::default().paint(
        &mut out,
        &paint,
        &target(Affine::IDENTITY),
        PixelBounds::new(0, 0, 4, 4),
    );
    assert!(img.is_none());
}

#[test]
fn image_paint_stretches_over_its_rect() {
    let mut images = ImageBase::new();
    let mut bm = Bitmap::new(2, 2);
    bm.data_mut()[12..16].copy_from_slice(&[0, 0, 255, 255]);
    images.insert("tile", bm);
    let mut painter = CpuPainter::new(images);
    let mut out = Compositor::default();
    let paint = Paint::Image {
        image: ImageRef {
            asset: "tile".to_string(),
            rect: None,
        },
    };
    let img = painter
        .paint(
            &mut out,
            &paint,
            &target(Affine::IDENTITY),
            PixelBounds::new(-2, -2, 10, 10),
        )
        .unwrap();
    assert_eq!(img.bounds, PixelBounds::new(0, 0, 4, 4));
    assert_eq!(img.pixel_at(3, 3), [0, 0, 255, 255]);
    assert_eq!(img.pixel_at(0, 0), [0, 0, 0, 0]);
}

#[test]
fn decoded_images_are_premultiplied() {
    let src = image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 0, 0, 128]));
    let mut encoded = Vec::new();
    src.write_to(
        &mut std::io::Cursor::new(&mut encoded),
        image::ImageFormat::Png,
    )
    .unwrap();

    let mut images = ImageBase::new();
    images.decode("dot", &encoded).unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images.get("dot").unwrap().pixel(0, 0), [128, 0, 0, 128]);
    assert!(images.decode("junk", b"not an image").is_err());
}

#[test]
fn standalone_overlay_paints_layer_bounds() {
    let mut out = Compositor::default();
    let effect = Effect::new(
        EffectBasis::Body,
        EffectKind::Overlay {
            overlay: Fill::color(Color::WHITE),
        },
    );
    let img = CpuPainter::default()
        .effect(&mut out, &effect, None, &target(Affine::translate((1.0, 1.0))))
        .unwrap();
    assert_eq!(img.bounds, PixelBounds::new(1, 1, 5, 5));
}

#[test]
fn overlay_is_clipped_to_its_basis() {
    let mut out = Compositor::default();
    let mut basis = Bitmap::new(2, 2);
    basis.data_mut()[..4].copy_from_slice(&[255, 255, 255, 255]);
    let basis = PlacedImage::new(basis, 0, 0);
    let effect = Effect::new(
        EffectBasis::Fill,
        EffectKind::Overlay {
            overlay: Fill::color(Color::BLACK),
        },
    );
    let img = CpuPainter::default()
        .effect(&mut out, &effect, Some(basis), &target(Affine::IDENTITY))
        .unwrap();
    assert_eq!(img.pixel_at(0, 0), [0, 0, 0, 255]);
    assert_eq!(img.pixel_at(1, 1), [0, 0, 0, 0]);
}

#[test]
fn unknown_effects_and_missing_bases_are_null() {
    let mut out = Compositor::default();
    let mut painter = CpuPainter::default();
    let other = Effect::new(EffectBasis::Body, EffectKind::Other);
    let t = target(Affine::IDENTITY);
    assert!(painter.effect(&mut out, &other, None, &t).is_none());
    let blur = Effect::new(EffectBasis::Body, EffectKind::GaussianBlur { blur: 2.0 });
    assert!(painter.effect(&mut out, &blur, None, &t).is_none());
}

#[test]
fn hidden_filters_pass_through() {
    let mut out = Compositor::default();
    let mut bm = Bitmap::new(1, 1);
    bm.data_mut().fill(255);
    let img = PlacedImage::new(bm, 0, 0);
    let mut filter = Filter::opacity(0.5);
    filter.visible = false;
    let kept = CpuPainter::default().filter(&mut out, &filter, img).unwrap();
    assert_eq!(kept.pixel_at(0, 0), [255, 255, 255, 255]);

    filter.visible = true;
    let halved = CpuPainter::default().filter(&mut out, &filter, kept).unwrap();
    assert_eq!(halved.pixel_at(0, 0)[3], 128);
}
