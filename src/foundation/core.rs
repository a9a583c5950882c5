use crate::foundation::error::{RendexError, RendexResult};

pub use kurbo::{Affine, BezPath, Point, Rect, Vec2};

/// Integer pixel rectangle, half-open `[x0, x1) x [y0, y1)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PixelBounds {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl PixelBounds {
    pub const EMPTY: Self = Self {
        x0: 0,
        y0: 0,
        x1: 0,
        y1: 0,
    };

    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Smallest pixel rectangle fully covering `rect`.
    pub fn outer(rect: Rect) -> Self {
        if !rect.is_finite() || rect.width() <= 0.0 || rect.height() <= 0.0 {
            return Self::EMPTY;
        }
        Self {
            x0: rect.x0.floor() as i32,
            y0: rect.y0.floor() as i32,
            x1: rect.x1.ceil() as i32,
            y1: rect.y1.ceil() as i32,
        }
    }

    pub fn width(self) -> u32 {
        (self.x1 - self.x0).max(0) as u32
    }

    pub fn height(self) -> u32 {
        (self.y1 - self.y0).max(0) as u32
    }

    pub fn is_empty(self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    pub fn pixel_count(self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// Union of two rectangles; empty operands are ignored.
    pub fn union(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn intersect(self, other: Self) -> Self {
        let out = Self {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        if out.is_empty() { Self::EMPTY } else { out }
    }

    /// Grow on every side by `px` pixels.
    pub fn inflate(self, px: i32) -> Self {
        if self.is_empty() {
            return self;
        }
        Self {
            x0: self.x0 - px,
            y0: self.y0 - px,
            x1: self.x1 + px,
            y1: self.y1 + px,
        }
    }

    pub fn contains(self, x: i32, y: i32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    pub fn to_rect(self) -> Rect {
        Rect::new(
            f64::from(self.x0),
            f64::from(self.y0),
            f64::from(self.x1),
            f64::from(self.y1),
        )
    }
}

/// Straight-alpha RGBA color with channels in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    #[serde(default = "one")]
    pub a: f64,
}

fn one() -> f64 {
    1.0
}

impl Color {
    pub const TRANSPARENT: Self = Self::rgba(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Self = Self::rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::rgba(1.0, 1.0, 1.0, 1.0);

    pub const fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::rgba(
            f64::from(r) / 255.0,
            f64::from(g) / 255.0,
            f64::from(b) / 255.0,
            f64::from(a) / 255.0,
        )
    }

    /// Premultiplied 8-bit representation.
    pub fn to_premul_rgba8(self) -> [u8; 4] {
        let a = self.a.clamp(0.0, 1.0);
        let ch = |c: f64| -> u8 { (c.clamp(0.0, 1.0) * a * 255.0).round() as u8 };
        [ch(self.r), ch(self.g), ch(self.b), (a * 255.0).round() as u8]
    }

    pub fn lerp(self, other: Self, t: f64) -> Self {
        use crate::foundation::math::lerp;
        Self::rgba(
            lerp(self.r, other.r, t),
            lerp(self.g, other.g, t),
            lerp(self.b, other.b, t),
            lerp(self.a, other.a, t),
        )
    }
}

/// Weights applied to a mask image's channels to derive a blend ratio.
///
/// The ratio at a pixel is `m0*r + m1*g + m2*b + m3*a + m4`, where the color
/// channels are unpremultiplied.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChannelMatrix(pub [f64; 5]);

impl ChannelMatrix {
    /// Use the mask's alpha channel directly.
    pub const ALPHA: Self = Self([0.0, 0.0, 0.0, 1.0, 0.0]);

    /// A matrix that can never produce a positive ratio.
    pub fn is_zero(&self) -> bool {
        !self.0.iter().any(|&m| m > 0.0)
    }

    /// Weights selecting the complementary ratio `1 - ratio`.
    pub fn inverted(&self) -> Self {
        let [r, g, b, a, bias] = self.0;
        Self([-r, -g, -b, -a, 1.0 - bias])
    }

    pub fn bias(&self) -> f64 {
        self.0[4]
    }

    /// Ratio for one premultiplied pixel, clamped to `[0, 1]`.
    pub fn ratio(&self, px: [u8; 4]) -> f32 {
        let a = f32::from(px[3]) / 255.0;
        let inv = if a > 0.0 { 1.0 / a } else { 0.0 };
        let [mr, mg, mb, ma, bias] = self.0.map(|v| v as f32);
        let r = f32::from(px[0]) / 255.0 * inv;
        let g = f32::from(px[1]) / 255.0 * inv;
        let b = f32::from(px[2]) / 255.0 * inv;
        (mr * r + mg * g + mb * b + ma * a + bias).clamp(0.0, 1.0)
    }
}

impl Default for ChannelMatrix {
    fn default() -> Self {
        Self::ALPHA
    }
}

/// Reject transforms that collapse the plane.
pub fn ensure_invertible(transform: Affine, what: &str) -> RendexResult<()> {
    let det = transform.determinant();
    if !det.is_finite() || det.abs() < 1e-12 {
        return Err(RendexError::singular_transformation(format!(
            "{what} has determinant {det}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
