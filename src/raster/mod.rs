//! Geometry services consumed by rendering: shape coverage and text.
//!
//! Both are traits so callers can swap in their own rasterizer or shaper; [`cpu::CpuRasterizer`]
//! is the reference implementation. Coverage is returned as white premultiplied pixels, so an
//! alpha channel matrix reads it directly.

pub mod cpu;

pub use cpu::{CpuRasterizer, CpuRasterizerOpts};

use crate::document::model::{FillRule, Shape, StrokePosition, TextStyle};
use crate::foundation::core::{Affine, BezPath, Rect};
use crate::foundation::error::{RendexError, RendexResult};
use crate::render::image::PlacedImage;
use kurbo::Shape as _;

/// Which part of a shape to rasterize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapePart {
    Body,
    /// Coverage of the stroke with the given index, clipped according to its position.
    Stroke(usize),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeGeometry {
    pub position: StrokePosition,
    pub thickness: f64,
}

impl StrokeGeometry {
    /// Width of the centered outline that, once clipped, yields the requested thickness.
    pub fn outline_width(&self) -> f64 {
        match self.position {
            StrokePosition::Center => self.thickness,
            StrokePosition::Inside | StrokePosition::Outside => 2.0 * self.thickness,
        }
    }
}

/// Parsed outline of a shape layer in layer coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeGeometry {
    pub path: BezPath,
    pub fill_rule: FillRule,
    pub strokes: Vec<StrokeGeometry>,
}

impl ShapeGeometry {
    pub fn from_shape(shape: &Shape) -> RendexResult<Self> {
        let path = BezPath::from_svg(shape.path.trim())
            .map_err(|e| RendexError::shape_layer(format!("invalid path data: {e}")))?;
        let strokes = shape
            .strokes
            .iter()
            .enumerate()
            .map(|(i, s)| {
                if !s.thickness.is_finite() || s.thickness < 0.0 {
                    return Err(RendexError::shape_layer(format!(
                        "stroke {i} has invalid thickness {}",
                        s.thickness
                    )));
                }
                Ok(StrokeGeometry {
                    position: s.position,
                    thickness: s.thickness,
                })
            })
            .collect::<RendexResult<Vec<_>>>()?;
        Ok(Self {
            path,
            fill_rule: shape.fill_rule,
            strokes,
        })
    }

    pub fn stroke(&self, index: usize) -> RendexResult<&StrokeGeometry> {
        self.strokes.get(index).ok_or_else(|| {
            RendexError::invalid_index(format!(
                "stroke {index} out of range ({} strokes)",
                self.strokes.len()
            ))
        })
    }

    /// Bounds of the body in layer coordinates.
    pub fn body_bounds(&self) -> Rect {
        if self.path.elements().is_empty() {
            return Rect::ZERO;
        }
        self.path.bounding_box()
    }

    /// Bounds of the body grown by every stroke that extends outwards.
    pub fn logical_bounds(&self) -> Rect {
        let body = self.body_bounds();
        let grow = self
            .strokes
            .iter()
            .map(|s| match s.position {
                StrokePosition::Inside => 0.0,
                StrokePosition::Center => 0.5 * s.thickness,
                StrokePosition::Outside => s.thickness,
            })
            .fold(0.0, f64::max);
        if body.area() <= 0.0 && grow == 0.0 {
            return body;
        }
        body.inflate(grow, grow)
    }
}

/// Shape coverage service.
pub trait Rasterizer {
    /// Device-space bounds of `part` under `transform`, before any margin.
    fn bounds(&self, geometry: &ShapeGeometry, part: ShapePart, transform: Affine)
    -> RendexResult<Rect>;

    /// White premultiplied coverage of `part`, or `None` when nothing is covered.
    fn rasterize(
        &mut self,
        geometry: &ShapeGeometry,
        part: ShapePart,
        transform: Affine,
    ) -> RendexResult<Option<PlacedImage>>;
}

/// A shaped run of text, as produced by a [`TextShaper`].
#[derive(Clone, Debug, PartialEq)]
pub struct TextShape {
    /// Shaper-defined identity of the shaped run.
    pub handle: u64,
    /// Bounds in layer coordinates.
    pub bounds: Rect,
}

/// Text shaping and glyph drawing service.
pub trait TextShaper {
    fn shape_text(&self, style: &TextStyle) -> RendexResult<TextShape>;

    fn bounds(&self, shape: &TextShape) -> Rect {
        shape.bounds
    }

    /// Colored glyph render of `shape` under `transform`.
    fn draw_text(&self, shape: &TextShape, transform: Affine)
    -> RendexResult<Option<PlacedImage>>;
}

#[cfg(test)]
#[path = "../../tests/unit/raster/mod.rs"]
mod tests;
