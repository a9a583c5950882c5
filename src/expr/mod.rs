//! Render-expression graph: node model, elision-aware constructors and diagnostics.

pub mod dump;
pub mod graph;
pub mod node;

pub use dump::{GraphFingerprint, dump, fingerprint, to_dot};
pub use graph::{ExprGraph, InlayOperand, InlaySlot};
pub use node::{Expr, LayerRef, Node, NodeFlags, NodeId, NodeKind, Operand};
