//! Generic non-recursive interpreter over expression graphs.
//!
//! [`GraphTransform`] walks a graph with an explicit stack of `(node, entry)` frames. Each node
//! is re-entered once per operand and once more to combine the operand results, which lets a
//! single loop evaluate arbitrarily deep graphs. What a node evaluates *to* is decided by an
//! [`Evaluate`] implementation: [`resolve::BackgroundResolver`] produces another graph and
//! [`crate::render::RenderContext`] produces pixels.
//!
//! Results of nodes with more than one incoming edge are memoized and evicted once every edge
//! has consumed them. Nodes that read a background are memoized per background scope.

pub mod resolve;
pub mod scope;

pub use resolve::{BackgroundResolver, ResolvedGraph, resolve_background};
pub use scope::{BackgroundScope, ScopeId, ScopeToken};

use crate::document::model::{BlendMode, Filter};
use crate::expr::graph::ExprGraph;
use crate::expr::node::{Expr, LayerRef, NodeFlags, NodeId, NodeKind};
use crate::foundation::core::ChannelMatrix;
use std::collections::HashMap;
use std::rc::Rc;

/// Operations an interpreter instantiation provides for each node kind.
///
/// Every method receives already-evaluated operands. A null operand is whatever
/// [`Self::empty`] returns.
pub trait Evaluate {
    type Output: Clone;

    /// Null result, also used for skipped branches.
    fn empty(&mut self) -> Self::Output;
    /// Leaf draw of a layer part (`DrawLayerBody`, `DrawLayerFill`, ...).
    fn draw(&mut self, kind: &NodeKind) -> Self::Output;
    fn blend(&mut self, dst: Self::Output, src: Self::Output, mode: BlendMode) -> Self::Output;
    fn blend_ignore_alpha(
        &mut self,
        dst: Self::Output,
        src: Self::Output,
        mode: BlendMode,
    ) -> Self::Output;
    fn mask(
        &mut self,
        image: Self::Output,
        mask: Self::Output,
        channels: &ChannelMatrix,
    ) -> Self::Output;
    fn mix_mask(
        &mut self,
        dst: Self::Output,
        src: Self::Output,
        mask: Self::Output,
        channels: &ChannelMatrix,
    ) -> Self::Output;
    fn mix(&mut self, a: Self::Output, b: Self::Output, ratio: f64) -> Self::Output;
    fn multiply_alpha(&mut self, image: Self::Output, multiplier: f64) -> Self::Output;
    fn draw_effect(
        &mut self,
        basis: Self::Output,
        layer: &Rc<LayerRef>,
        index: usize,
        standalone: bool,
    ) -> Self::Output;
    fn apply_filter(&mut self, basis: Self::Output, filter: &Filter) -> Self::Output;
    /// Effective opacity of `layer`, if known to this instantiation.
    ///
    /// When known, a `MixLayerOpacity` node skips the branch it does not need and combines with
    /// [`Self::mix`]; otherwise both branches are evaluated and [`Self::mix_layer_opacity`] is
    /// called.
    fn layer_opacity(&mut self, layer: &LayerRef) -> Option<f64>;
    fn mix_layer_opacity(
        &mut self,
        layer: &Rc<LayerRef>,
        a: Self::Output,
        b: Self::Output,
    ) -> Self::Output;
}

/// Counters of one interpreter run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransformStats {
    /// Deepest explicit stack reached.
    pub max_depth: usize,
    /// Nodes evaluated (cache hits excluded).
    pub evaluated: usize,
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
    /// Largest number of simultaneously memoized results.
    pub peak_entries: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    /// `None` for background placeholders, which are interchangeable within a scope.
    node: Option<NodeId>,
    scope: ScopeId,
}

struct CacheEntry<T> {
    result: T,
    consumed: u32,
    /// Evicted by scope exit only.
    pinned: bool,
}

struct Cache<T> {
    entries: HashMap<CacheKey, CacheEntry<T>>,
    by_scope: HashMap<ScopeId, Vec<CacheKey>>,
}

impl<T: Clone> Cache<T> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            by_scope: HashMap::new(),
        }
    }

    fn hit(&mut self, key: CacheKey, refs: u32, stats: &mut TransformStats) -> Option<T> {
        let entry = self.entries.get_mut(&key)?;
        entry.consumed += 1;
        let result = entry.result.clone();
        if !entry.pinned && entry.consumed >= refs {
            self.entries.remove(&key);
            stats.evictions += 1;
        }
        Some(result)
    }

    fn insert(&mut self, key: CacheKey, result: T, pinned: bool, stats: &mut TransformStats) {
        self.entries.insert(
            key,
            CacheEntry {
                result,
                consumed: 1,
                pinned,
            },
        );
        if key.scope != ScopeId::ROOT {
            self.by_scope.entry(key.scope).or_default().push(key);
        }
        stats.peak_entries = stats.peak_entries.max(self.entries.len());
    }

    fn close_scope(&mut self, scope: ScopeId, stats: &mut TransformStats) {
        let Some(keys) = self.by_scope.remove(&scope) else {
            return;
        };
        for key in keys {
            if self.entries.remove(&key).is_some() {
                stats.evictions += 1;
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Frame {
    node: NodeId,
    entry: u32,
    key: CacheKey,
    token: Option<ScopeToken>,
    opacity: Option<f64>,
}

enum Step<T> {
    Visit(NodeId),
    /// Null operand: push an empty result and re-enter the same node.
    Skip,
    Done(T),
}

type Observer<'o, T> = Box<dyn FnMut(NodeId, &T) + 'o>;

/// Configurable interpreter run over one graph.
pub struct GraphTransform<'g, 'o, E: Evaluate> {
    graph: &'g ExprGraph,
    observer: Option<Observer<'o, E::Output>>,
}

impl<'g, 'o, E: Evaluate> GraphTransform<'g, 'o, E> {
    pub fn new(graph: &'g ExprGraph) -> Self {
        Self {
            graph,
            observer: None,
        }
    }

    /// Call `observer` with every node evaluated (not served from the cache) and its result.
    pub fn with_observer(mut self, observer: impl FnMut(NodeId, &E::Output) + 'o) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn run(mut self, root: Expr, eval: &mut E) -> (E::Output, TransformStats) {
        let Some(root) = root else {
            return (eval.empty(), TransformStats::default());
        };

        let graph = self.graph;
        let mut state = State {
            scope: BackgroundScope::new(),
            cache: Cache::new(),
            results: Vec::new(),
            stats: TransformStats::default(),
        };
        let mut stack = vec![Frame::new(root)];

        loop {
            let depth = stack.len();
            let Some(frame) = stack.last_mut() else {
                break;
            };
            state.stats.max_depth = state.stats.max_depth.max(depth);
            let entry = frame.entry;
            frame.entry += 1;
            let id = frame.node;
            let node = graph.node(id);

            if entry == 0 {
                frame.key = cache_key(graph, id, state.scope.current());
                if let Some(result) = state.cache.hit(frame.key, node.refs, &mut state.stats) {
                    state.stats.hits += 1;
                    state.results.push(result);
                    stack.pop();
                    continue;
                }
                state.stats.misses += 1;
            }

            match state.step(&node.kind, frame, entry, eval) {
                Step::Visit(child) => stack.push(Frame::new(child)),
                Step::Skip => {
                    let empty = eval.empty();
                    state.results.push(empty);
                }
                Step::Done(result) => {
                    let key = frame.key;
                    stack.pop();
                    state.stats.evaluated += 1;
                    if let Some(observer) = self.observer.as_mut() {
                        observer(id, &result);
                    }
                    let background = node.kind.is_background();
                    if node.refs > 1 || background {
                        state
                            .cache
                            .insert(key, result.clone(), background, &mut state.stats);
                    }
                    state.results.push(result);
                }
            }
        }

        let stats = state.stats;
        tracing::debug!(
            nodes = graph.len(),
            evaluated = stats.evaluated,
            max_depth = stats.max_depth,
            hits = stats.hits,
            misses = stats.misses,
            evictions = stats.evictions,
            peak_entries = stats.peak_entries,
            "graph transform finished"
        );
        let result = take(&mut state.results, eval);
        (result, stats)
    }
}

/// Evaluate `root` with the default configuration.
pub fn transform<E: Evaluate>(
    graph: &ExprGraph,
    root: Expr,
    eval: &mut E,
) -> (E::Output, TransformStats) {
    GraphTransform::new(graph).run(root, eval)
}

impl Frame {
    fn new(node: NodeId) -> Self {
        Self {
            node,
            entry: 0,
            key: CacheKey {
                node: Some(node),
                scope: ScopeId::ROOT,
            },
            token: None,
            opacity: None,
        }
    }
}

fn cache_key(graph: &ExprGraph, id: NodeId, scope: ScopeId) -> CacheKey {
    let node = graph.node(id);
    if node.kind.is_background() {
        CacheKey { node: None, scope }
    } else if node.flags.contains(NodeFlags::BACKGROUND_DEPENDENT) {
        CacheKey {
            node: Some(id),
            scope,
        }
    } else {
        CacheKey {
            node: Some(id),
            scope: ScopeId::ROOT,
        }
    }
}

fn take<E: Evaluate>(results: &mut Vec<E::Output>, eval: &mut E) -> E::Output {
    match results.pop() {
        Some(result) => result,
        None => eval.empty(),
    }
}

/// Mutable state of one run besides the frame stack.
struct State<T> {
    scope: BackgroundScope,
    cache: Cache<T>,
    results: Vec<T>,
    stats: TransformStats,
}

impl<T: Clone> State<T> {
    fn leave_scope(&mut self, token: Option<ScopeToken>) {
        if let Some(closed) = token.and_then(|t| self.scope.restore(t)) {
            self.cache.close_scope(closed, &mut self.stats);
        }
    }

    /// Advance `frame` at `entry`.
    fn step<E: Evaluate<Output = T>>(
        &mut self,
        kind: &NodeKind,
        frame: &mut Frame,
        entry: u32,
        eval: &mut E,
    ) -> Step<T> {
        match kind {
            NodeKind::Background => {
                if entry == 0 {
                    return match self.scope.take_background() {
                        Some((background, token)) => {
                            frame.token = Some(token);
                            Step::Visit(background)
                        }
                        None => Step::Done(eval.empty()),
                    };
                }
                self.leave_scope(frame.token.take());
                Step::Done(take(&mut self.results, eval))
            }
            NodeKind::SetBackground {
                content,
                background,
            } => {
                if entry == 0 {
                    frame.token = Some(self.scope.push(*background));
                    return Step::Visit(*content);
                }
                self.leave_scope(frame.token.take());
                Step::Done(take(&mut self.results, eval))
            }
            NodeKind::MixLayerOpacity { layer, a, b } => match entry {
                0 => {
                    frame.opacity = eval.layer_opacity(layer);
                    match (*a, frame.opacity) {
                        (_, Some(op)) if op >= 1.0 => Step::Skip,
                        (Some(a), _) => Step::Visit(a),
                        (None, _) => Step::Skip,
                    }
                }
                1 => match (*b, frame.opacity) {
                    (_, Some(op)) if op <= 0.0 => Step::Skip,
                    (Some(b), _) => Step::Visit(b),
                    (None, _) => Step::Skip,
                },
                _ => {
                    let b_out = take(&mut self.results, eval);
                    let a_out = take(&mut self.results, eval);
                    Step::Done(match frame.opacity {
                        Some(op) if op >= 1.0 => b_out,
                        Some(op) if op <= 0.0 => a_out,
                        Some(op) => eval.mix(a_out, b_out, op),
                        None => eval.mix_layer_opacity(layer, a_out, b_out),
                    })
                }
            },
            _ => {
                let operands = kind.operands();
                match operands.get(entry as usize) {
                    Some(&(_, Some(child))) => Step::Visit(child),
                    Some(&(_, None)) => Step::Skip,
                    None => Step::Done(combine(kind, &mut self.results, eval)),
                }
            }
        }
    }
}

/// Pop the evaluated operands of an ordinary node and combine them.
fn combine<E: Evaluate>(kind: &NodeKind, results: &mut Vec<E::Output>, eval: &mut E) -> E::Output {
    match kind {
        NodeKind::Empty => eval.empty(),
        NodeKind::Identity { .. } => take(results, eval),
        NodeKind::Blend { mode, .. } => {
            let src = take(results, eval);
            let dst = take(results, eval);
            eval.blend(dst, src, *mode)
        }
        NodeKind::BlendIgnoreAlpha { mode, .. } => {
            let src = take(results, eval);
            let dst = take(results, eval);
            eval.blend_ignore_alpha(dst, src, *mode)
        }
        NodeKind::Mask { channels, .. } => {
            let mask = take(results, eval);
            let image = take(results, eval);
            eval.mask(image, mask, channels)
        }
        NodeKind::MixMask { channels, .. } => {
            let mask = take(results, eval);
            let src = take(results, eval);
            let dst = take(results, eval);
            eval.mix_mask(dst, src, mask, channels)
        }
        NodeKind::Mix { ratio, .. } => {
            let b = take(results, eval);
            let a = take(results, eval);
            eval.mix(a, b, *ratio)
        }
        NodeKind::MultiplyAlpha { multiplier, .. } => {
            let image = take(results, eval);
            eval.multiply_alpha(image, *multiplier)
        }
        NodeKind::DrawLayerBody { .. }
        | NodeKind::DrawLayerStroke { .. }
        | NodeKind::DrawLayerFill { .. }
        | NodeKind::DrawLayerStrokeFill { .. }
        | NodeKind::DrawLayerText { .. } => eval.draw(kind),
        NodeKind::DrawLayerEffect {
            layer,
            index,
            standalone,
            ..
        } => {
            let basis = take(results, eval);
            eval.draw_effect(basis, layer, *index, *standalone)
        }
        NodeKind::ApplyFilter { filter, .. } => {
            let basis = take(results, eval);
            eval.apply_filter(basis, filter)
        }
        // Scoped and opacity nodes are finished by `State::step`.
        NodeKind::Background | NodeKind::SetBackground { .. } | NodeKind::MixLayerOpacity { .. } => {
            take(results, eval)
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/transform/mod.rs"]
mod tests;
