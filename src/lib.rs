//! Layered vector documents rendered through a shared render-expression graph.
//!
//! A [`Component`] holds the layer tree. Assembly turns every layer into an expression subtree
//! ([`assembly`]), the background placeholders of the result are resolved symbolically
//! ([`transform::resolve_background`]) and the same non-recursive interpreter then evaluates the
//! graph into pixels ([`render::render`]).

#![forbid(unsafe_code)]

pub mod animation;
pub mod assembly;
pub mod document;
pub mod expr;
pub mod foundation;
pub mod raster;
pub mod render;
pub mod transform;

pub use animation::AnimationProvider;
pub use animation::anim::{DocumentAnimation, LayerAnimation};
pub use document::{
    ChangeLevel, Component, Document, Layer, LayerChange, LayerKind, LayerSpec, RenderGraph,
    TransformOrigin,
};
pub use expr::{ExprGraph, GraphFingerprint, LayerRef, NodeKind};
pub use foundation::core::{Color, PixelBounds};
pub use foundation::error::{RendexError, RendexResult};
pub use raster::{CpuRasterizer, Rasterizer, TextShaper};
pub use render::{CpuRenderer, PlacedImage, RenderOpts, RenderServices, render};
pub use transform::{Evaluate, resolve_background, transform};
