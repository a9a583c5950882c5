use crate::document::model::{BlendMode, Filter};
use crate::expr::graph::ExprGraph;
use crate::expr::node::{Expr, LayerRef, NodeKind};
use crate::foundation::core::ChannelMatrix;
use crate::transform::{Evaluate, TransformStats, transform};
use std::rc::Rc;

/// Graph-to-graph instantiation of the interpreter.
///
/// Every `Background` is replaced by the (resolved) background bound around it and every
/// `SetBackground` by its content, so the output contains neither. Everything else is rebuilt
/// through the eliding constructors of the output graph.
#[derive(Debug, Default)]
pub struct BackgroundResolver {
    out: ExprGraph,
}

impl BackgroundResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_graph(self) -> ExprGraph {
        self.out
    }
}

impl Evaluate for BackgroundResolver {
    type Output = Expr;

    fn empty(&mut self) -> Expr {
        None
    }

    fn draw(&mut self, kind: &NodeKind) -> Expr {
        match kind {
            NodeKind::DrawLayerBody { layer } => self.out.draw_layer_body(layer),
            NodeKind::DrawLayerStroke { layer, index } => self.out.draw_layer_stroke(layer, *index),
            NodeKind::DrawLayerFill { layer, index } => self.out.draw_layer_fill(layer, *index),
            NodeKind::DrawLayerStrokeFill { layer, index } => {
                self.out.draw_layer_stroke_fill(layer, *index)
            }
            NodeKind::DrawLayerText { layer } => self.out.draw_layer_text(layer),
            other => {
                tracing::warn!(kind = other.name(), "not a draw leaf");
                None
            }
        }
    }

    fn blend(&mut self, dst: Expr, src: Expr, mode: BlendMode) -> Expr {
        self.out.blend(dst, src, mode)
    }

    fn blend_ignore_alpha(&mut self, dst: Expr, src: Expr, mode: BlendMode) -> Expr {
        self.out.blend_ignore_alpha(dst, src, mode)
    }

    fn mask(&mut self, image: Expr, mask: Expr, channels: &ChannelMatrix) -> Expr {
        self.out.mask(image, mask, *channels)
    }

    fn mix_mask(&mut self, dst: Expr, src: Expr, mask: Expr, channels: &ChannelMatrix) -> Expr {
        self.out.mix_mask(dst, src, mask, *channels)
    }

    fn mix(&mut self, a: Expr, b: Expr, ratio: f64) -> Expr {
        self.out.mix(a, b, ratio)
    }

    fn multiply_alpha(&mut self, image: Expr, multiplier: f64) -> Expr {
        self.out.multiply_alpha(image, multiplier)
    }

    fn draw_effect(
        &mut self,
        basis: Expr,
        layer: &Rc<LayerRef>,
        index: usize,
        standalone: bool,
    ) -> Expr {
        self.out.draw_layer_effect(basis, layer, index, standalone)
    }

    fn apply_filter(&mut self, basis: Expr, filter: &Filter) -> Expr {
        self.out.apply_filter(basis, filter)
    }

    // Opacity may be animated; keep the node for render time.
    fn layer_opacity(&mut self, _layer: &LayerRef) -> Option<f64> {
        None
    }

    fn mix_layer_opacity(&mut self, layer: &Rc<LayerRef>, a: Expr, b: Expr) -> Expr {
        self.out.mix_layer_opacity(layer, a, b)
    }
}

/// Output of [`resolve_background`].
#[derive(Clone, Debug)]
pub struct ResolvedGraph {
    /// Background-free graph holding exactly the nodes reachable from `root`.
    pub graph: ExprGraph,
    pub root: Expr,
    pub stats: TransformStats,
}

/// Eliminate `Background` and `SetBackground` nodes from the subgraph at `root`.
#[tracing::instrument(skip(graph), fields(nodes = graph.len()))]
pub fn resolve_background(graph: &ExprGraph, root: Expr) -> ResolvedGraph {
    let mut resolver = BackgroundResolver::new();
    let (resolved, stats) = transform(graph, root, &mut resolver);
    let (graph, root) = resolver.into_graph().compact(resolved);
    tracing::debug!(resolved_nodes = graph.len(), "background resolved");
    ResolvedGraph { graph, root, stats }
}

#[cfg(test)]
#[path = "../../tests/unit/transform/resolve.rs"]
mod tests;
