use crate::foundation::core::PixelBounds;
use crate::foundation::error::{RendexError, RendexResult};
use std::rc::Rc;

/// Premultiplied RGBA8 pixel buffer, row-major without padding.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Bitmap {
    /// Fully transparent bitmap.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; byte_len(width, height)],
        }
    }

    pub fn from_premul(width: u32, height: u32, data: Vec<u8>) -> RendexResult<Self> {
        if data.len() != byte_len(width, height) {
            return Err(RendexError::validation(format!(
                "bitmap {width}x{height} expects {} bytes, got {}",
                byte_len(width, height),
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub(crate) fn from_vec_unchecked(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), byte_len(width, height));
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0; 4];
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    pub(crate) fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * 4;
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    pub(crate) fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.width as usize * 4;
        let start = y as usize * stride;
        &mut self.data[start..start + stride]
    }
}

pub(crate) fn byte_len(width: u32, height: u32) -> usize {
    (width as usize)
        .saturating_mul(height as usize)
        .saturating_mul(4)
}

/// A bitmap placed on the integer pixel grid of the output.
///
/// Pixels outside `bounds` are transparent. The bitmap is shared so memoized interpreter
/// results can be handed to several consumers without copying.
#[derive(Clone, Debug)]
pub struct PlacedImage {
    pub bitmap: Rc<Bitmap>,
    pub bounds: PixelBounds,
}

impl PlacedImage {
    pub fn new(bitmap: Bitmap, x0: i32, y0: i32) -> Self {
        let bounds = PixelBounds::new(
            x0,
            y0,
            x0 + bitmap.width() as i32,
            y0 + bitmap.height() as i32,
        );
        Self {
            bitmap: Rc::new(bitmap),
            bounds,
        }
    }

    /// Premultiplied pixel at output coordinates `(x, y)`.
    pub fn pixel_at(&self, x: i32, y: i32) -> [u8; 4] {
        if !self.bounds.contains(x, y) {
            return [0; 4];
        }
        self.bitmap
            .pixel((x - self.bounds.x0) as u32, (y - self.bounds.y0) as u32)
    }

    /// Unpremultiplied color at `(x, y)`, as `[r, g, b, a]` in `0..=255`.
    pub fn straight_at(&self, x: i32, y: i32) -> [u8; 4] {
        let [r, g, b, a] = self.pixel_at(x, y);
        if a == 0 {
            return [0; 4];
        }
        let un = |c: u8| -> u8 { ((u32::from(c) * 255 + u32::from(a) / 2) / u32::from(a)).min(255) as u8 };
        [un(r), un(g), un(b), a]
    }

    /// Take the bitmap back if this is its last owner.
    pub(crate) fn into_unique(self) -> Option<Bitmap> {
        Rc::try_unwrap(self.bitmap).ok()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/image.rs"]
mod tests;
