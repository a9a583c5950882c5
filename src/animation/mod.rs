//! Keyframed layer animations and the per-frame provider interface.

pub mod anim;
pub mod ease;

use crate::foundation::core::{Affine, Color};
use anim::{DocumentAnimation, animate_color, animate_opacity, animate_transform};

/// Per-frame animated values of a layer.
pub trait AnimationProvider {
    /// Extra transformation applied after the layer's own transform.
    fn layer_transform(&self, layer: &str, time: f64) -> Affine;
    /// Multiplier on the layer's static opacity.
    fn layer_opacity(&self, layer: &str, time: f64) -> f64;
    /// Replacement color for the layer's color fills, if animated.
    fn layer_fill_color(&self, layer: &str, time: f64) -> Option<Color>;
}

impl AnimationProvider for DocumentAnimation {
    fn layer_transform(&self, layer: &str, time: f64) -> Affine {
        self.for_layer(layer)
            .fold(Affine::IDENTITY, |acc, a| animate_transform(a, time) * acc)
    }

    fn layer_opacity(&self, layer: &str, time: f64) -> f64 {
        self.for_layer(layer)
            .map(|a| animate_opacity(a, time))
            .product()
    }

    fn layer_fill_color(&self, layer: &str, time: f64) -> Option<Color> {
        self.for_layer(layer)
            .filter_map(|a| animate_color(a, time))
            .last()
    }
}
