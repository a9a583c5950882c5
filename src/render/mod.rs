//! Rendering: placed premultiplied images, compositing operators, paint services and the
//! interpreter instantiation that turns an assembled graph into pixels.

pub mod composite;
pub mod context;
pub mod effects;
pub mod image;
pub mod paint;
pub mod pool;

pub use composite::Compositor;
pub use context::{CpuRenderer, RenderContext, RenderOpts, RenderServices, render};
pub use image::{Bitmap, PlacedImage};
pub use paint::{CpuPainter, DrawTarget, ImageBase, PaintServices};
pub use pool::{BitmapPool, BitmapPoolOpts, BitmapPoolStats};
