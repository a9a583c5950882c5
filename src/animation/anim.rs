use crate::animation::ease::Easing;
use crate::foundation::core::{Affine, Color, Vec2};
use crate::foundation::error::{RendexError, RendexResult};

/// Linear interpolation for animatable values.
pub trait Lerp: Sized {
    /// Interpolate from `a` to `b` with normalized factor `t` in `[0, 1]`.
    fn lerp(a: &Self, b: &Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        a + (b - a) * t
    }
}

impl Lerp for [f64; 6] {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
    }
}

impl Lerp for Color {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        a.lerp(*b, t)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationKind {
    Transform,
    /// Rotation in radians about `rotation_center`.
    Rotation,
    /// Multiplier on the layer's opacity.
    Opacity,
    /// Replaces the color of the layer's color fills.
    FillColor,
}

/// State of an animation at the end of a segment.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Keyframe {
    /// Seconds since the previous keyframe (or since zero for the first one).
    pub delay: f64,
    /// Easing of the segment ending at this keyframe.
    #[serde(default)]
    pub easing: Option<Easing>,
    #[serde(default)]
    pub transform: Option<[f64; 6]>,
    #[serde(default)]
    pub rotation: Option<f64>,
    #[serde(default)]
    pub opacity: Option<f64>,
    #[serde(default)]
    pub color: Option<Color>,
}

impl Keyframe {
    /// Eased progress through the segment ending at this keyframe, `time` relative to its start.
    fn progress(&self, time: f64) -> f64 {
        if time < 0.0 {
            return 0.0;
        }
        if time >= self.delay {
            return 1.0;
        }
        let t = time / self.delay;
        match &self.easing {
            Some(easing) => easing.apply(t),
            None => t,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayerAnimation {
    pub layer: String,
    #[serde(rename = "type")]
    pub kind: AnimationKind,
    pub keyframes: Vec<Keyframe>,
    #[serde(default)]
    pub rotation_center: Option<[f64; 2]>,
}

struct Progress<'a> {
    a: &'a Keyframe,
    b: &'a Keyframe,
    t: f64,
}

impl LayerAnimation {
    /// Check that every keyframe carries the value its animation kind needs.
    pub fn validate(&self) -> RendexResult<()> {
        if self.kind == AnimationKind::Rotation && self.rotation_center.is_none() {
            return Err(RendexError::validation(format!(
                "rotation animation of '{}' has no rotation center",
                self.layer
            )));
        }
        for (i, kf) in self.keyframes.iter().enumerate() {
            if !(kf.delay.is_finite() && kf.delay >= 0.0) {
                return Err(RendexError::validation(format!(
                    "keyframe {i} of '{}' has invalid delay {}",
                    self.layer, kf.delay
                )));
            }
            let present = match self.kind {
                AnimationKind::Transform => kf.transform.is_some(),
                AnimationKind::Rotation => kf.rotation.is_some(),
                AnimationKind::Opacity => kf.opacity.is_some(),
                AnimationKind::FillColor => kf.color.is_some(),
            };
            if !present {
                return Err(RendexError::validation(format!(
                    "keyframe {i} of '{}' is missing its {:?} value",
                    self.layer, self.kind
                )));
            }
        }
        Ok(())
    }

    /// The same animation as seen from a child layer with transform `child_transform`.
    ///
    /// Transform and rotation keyframes are conjugated into the child's frame, so applying the
    /// result after the child's transform equals applying the original before it. Opacity and fill
    /// colour are not inherited: the parent's own mix already applies its opacity, and its fill
    /// colour belongs to the parent's paint only.
    pub fn inherited_by(&self, child: &str, child_transform: Affine) -> Option<Self> {
        let inverse = child_transform.inverse();
        let mut out = self.clone();
        out.layer = child.to_string();
        match self.kind {
            AnimationKind::Opacity | AnimationKind::FillColor => return None,
            AnimationKind::Transform => {
                for kf in &mut out.keyframes {
                    if let Some(t) = kf.transform {
                        kf.transform = Some((inverse * Affine::new(t) * child_transform).as_coeffs());
                    }
                }
            }
            AnimationKind::Rotation => {
                if let Some([cx, cy]) = self.rotation_center {
                    let c = inverse * kurbo::Point::new(cx, cy);
                    out.rotation_center = Some([c.x, c.y]);
                }
            }
        }
        Some(out)
    }

    fn progress(&self, mut time: f64) -> Option<Progress<'_>> {
        let first = self.keyframes.first()?;
        let mut a = first;
        for kf in &self.keyframes {
            if time < kf.delay {
                return Some(Progress {
                    a,
                    b: kf,
                    t: kf.progress(time),
                });
            }
            time -= kf.delay;
            a = kf;
        }
        Some(Progress { a, b: a, t: 0.0 })
    }

    fn sample<T: Lerp>(&self, time: f64, value: impl Fn(&Keyframe) -> Option<T>) -> Option<T> {
        let p = self.progress(time)?;
        let a = value(p.a)?;
        let b = value(p.b)?;
        Some(T::lerp(&a, &b, p.t))
    }
}

pub fn animate_rotation(animation: &LayerAnimation, time: f64) -> f64 {
    if animation.kind != AnimationKind::Rotation {
        return 0.0;
    }
    animation.sample(time, |kf| kf.rotation).unwrap_or(0.0)
}

/// Transformation contributed by a TRANSFORM or ROTATION animation; identity otherwise.
pub fn animate_transform(animation: &LayerAnimation, time: f64) -> Affine {
    match animation.kind {
        AnimationKind::Transform => animation
            .sample(time, |kf| kf.transform)
            .map(Affine::new)
            .unwrap_or(Affine::IDENTITY),
        AnimationKind::Rotation => match animation.rotation_center {
            Some([cx, cy]) => {
                let center = Vec2::new(cx, cy);
                Affine::translate(center)
                    * Affine::rotate(animate_rotation(animation, time))
                    * Affine::translate(-center)
            }
            None => Affine::IDENTITY,
        },
        _ => Affine::IDENTITY,
    }
}

pub fn animate_opacity(animation: &LayerAnimation, time: f64) -> f64 {
    if animation.kind != AnimationKind::Opacity {
        return 1.0;
    }
    animation.sample(time, |kf| kf.opacity).unwrap_or(1.0)
}

pub fn animate_color(animation: &LayerAnimation, time: f64) -> Option<Color> {
    if animation.kind != AnimationKind::FillColor {
        return None;
    }
    animation.sample(time, |kf| kf.color)
}

/// All layer animations of a document.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DocumentAnimation {
    #[serde(default)]
    pub animations: Vec<LayerAnimation>,
}

impl DocumentAnimation {
    pub fn validate(&self) -> RendexResult<()> {
        self.animations.iter().try_for_each(LayerAnimation::validate)
    }

    pub fn for_layer<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a LayerAnimation> + 'a {
        self.animations.iter().filter(move |a| a.layer == id)
    }

    pub fn animates_opacity(&self, id: &str) -> bool {
        self.for_layer(id).any(|a| a.kind == AnimationKind::Opacity)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/anim.rs"]
mod tests;
