//! Layer documents: the serialized model, the mutable layer tree and its instance cache.

pub mod change;
pub mod component;
pub mod instance;
pub mod model;
pub mod store;

pub use change::{ChangeLevel, LayerChange, ListEdit, PropertyChange, apply_change};
pub use component::{Component, RenderGraph, TransformOrigin};
pub use instance::{LayerBounds, LayerInstance};
pub use model::{Document, Layer, LayerKind, LayerSpec};
pub use store::{LayerEntry, LayerStore};
