use crate::document::model::{BlendMode, Filter, FilterKind};
use crate::expr::node::{Expr, LayerRef, Node, NodeFlags, NodeId, NodeKind};
use crate::foundation::core::ChannelMatrix;
use crate::foundation::error::{RendexError, RendexResult};
use smallvec::SmallVec;
use std::rc::Rc;

/// Which operand of an inlay node may be rewritten.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InlayOperand {
    IdentityContent,
    BlendDst,
}

/// A rewritable child slot of an already-built node.
///
/// Content computed later (an embedded mask's group) is spliced in here by
/// [`ExprGraph::rewrite_inlay`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InlaySlot {
    pub node: NodeId,
    pub operand: InlayOperand,
}

/// Append-only arena of render-expression nodes.
///
/// Nodes are built bottom-up through the constructor methods, which elide degenerate operations
/// and return one of the operands instead. Every created edge bumps the child's `refs`.
#[derive(Clone, Debug, Default)]
pub struct ExprGraph {
    nodes: Vec<Node>,
}

impl ExprGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn flags(&self, id: NodeId) -> NodeFlags {
        self.nodes[id.index()].flags
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    pub fn is_background(&self, expr: Expr) -> bool {
        expr.is_some_and(|id| self.kind(id).is_background())
    }

    fn flags_of(&self, expr: Expr) -> NodeFlags {
        expr.map_or(NodeFlags::NONE, |id| self.flags(id))
    }

    fn flags_for(&self, kind: &NodeKind) -> NodeFlags {
        match kind {
            NodeKind::Background => NodeFlags::BACKGROUND_DEPENDENT,
            // Backgrounds inside the content are bound here.
            NodeKind::SetBackground {
                content,
                background,
            } => self
                .flags(*content)
                .without(NodeFlags::BACKGROUND_DEPENDENT)
                .union(self.flags_of(*background)),
            NodeKind::MixLayerOpacity { a, b, .. } => NodeFlags::ANIMATED_OPACITY
                .union(self.flags_of(*a))
                .union(self.flags_of(*b)),
            other => other
                .children()
                .into_iter()
                .fold(NodeFlags::NONE, |acc, c| acc.union(self.flags(c))),
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let flags = self.flags_for(&kind);
        let id = NodeId(self.nodes.len() as u32);
        for child in kind.children() {
            let node = &mut self.nodes[child.index()];
            node.refs += 1;
            node.parents.push(id);
        }
        self.nodes.push(Node {
            kind,
            refs: 0,
            flags,
            parents: SmallVec::new(),
        });
        id
    }

    pub fn empty(&mut self) -> NodeId {
        self.push(NodeKind::Empty)
    }

    pub fn blend(&mut self, dst: Expr, src: Expr, mode: BlendMode) -> Expr {
        let Some(src) = src else { return dst };
        let Some(dst) = dst else { return Some(src) };
        Some(self.push(NodeKind::Blend {
            dst,
            src,
            mode: mode.or_normal(),
        }))
    }

    /// Like [`Self::blend`], additionally recording the first available inlay slot.
    pub fn blend_with_inlay(
        &mut self,
        dst: Expr,
        src: Expr,
        mode: BlendMode,
        inlay: &mut Option<InlaySlot>,
    ) -> Expr {
        let Some(src) = src else { return dst };
        let Some(dst) = dst else {
            return self.make_inlay_point(Some(src), inlay);
        };
        let id = self.push(NodeKind::Blend {
            dst,
            src,
            mode: mode.or_normal(),
        });
        if inlay.is_none() {
            *inlay = Some(InlaySlot {
                node: id,
                operand: InlayOperand::BlendDst,
            });
        }
        Some(id)
    }

    pub fn blend_ignore_alpha(&mut self, dst: Expr, src: Expr, mode: BlendMode) -> Expr {
        let Some(src) = src else { return dst };
        let Some(dst) = dst else { return Some(src) };
        Some(self.push(NodeKind::BlendIgnoreAlpha {
            dst,
            src,
            mode: mode.or_normal(),
        }))
    }

    pub fn mask(&mut self, image: Expr, mask: Expr, channels: ChannelMatrix) -> Expr {
        match (image, mask) {
            (Some(image), Some(mask)) if !channels.is_zero() => Some(self.push(NodeKind::Mask {
                image,
                mask,
                channels,
            })),
            _ => None,
        }
    }

    pub fn mix_mask(&mut self, dst: Expr, src: Expr, mask: Expr, channels: ChannelMatrix) -> Expr {
        let (Some(s), Some(m)) = (src, mask) else {
            return dst;
        };
        if channels.is_zero() {
            return dst;
        }
        let Some(d) = dst else {
            return self.mask(src, mask, channels);
        };
        if d == s {
            return dst;
        }
        // Blending `m` into `d` ignoring alpha and then mixing that back into `d` through `m`'s
        // own coverage is a plain blend of `m` into `d`.
        let shortcut = match *self.kind(s) {
            NodeKind::BlendIgnoreAlpha {
                dst: inner_dst,
                src: inner_src,
                mode,
            } if inner_src == m && inner_dst == d => Some(mode),
            _ => None,
        };
        if let Some(mode) = shortcut {
            return Some(self.push(NodeKind::Blend {
                dst: d,
                src: m,
                mode,
            }));
        }
        Some(self.push(NodeKind::MixMask {
            dst: d,
            src: s,
            mask: m,
            channels,
        }))
    }

    pub fn mix(&mut self, a: Expr, b: Expr, ratio: f64) -> Expr {
        if ratio == 0.0 {
            return a;
        }
        if ratio == 1.0 {
            return b;
        }
        let Some(a_id) = a else {
            return self.multiply_alpha(b, ratio);
        };
        let Some(b_id) = b else {
            return self.multiply_alpha(a, 1.0 - ratio);
        };
        Some(self.push(NodeKind::Mix {
            a: a_id,
            b: b_id,
            ratio,
        }))
    }

    pub fn multiply_alpha(&mut self, image: Expr, multiplier: f64) -> Expr {
        if multiplier == 1.0 {
            return image;
        }
        let image = image.filter(|_| multiplier > 0.0)?;
        Some(self.push(NodeKind::MultiplyAlpha { image, multiplier }))
    }

    pub fn draw_layer_body(&mut self, layer: &Rc<LayerRef>) -> Expr {
        Some(self.push(NodeKind::DrawLayerBody {
            layer: Rc::clone(layer),
        }))
    }

    pub fn draw_layer_stroke(&mut self, layer: &Rc<LayerRef>, index: usize) -> Expr {
        Some(self.push(NodeKind::DrawLayerStroke {
            layer: Rc::clone(layer),
            index,
        }))
    }

    pub fn draw_layer_fill(&mut self, layer: &Rc<LayerRef>, index: usize) -> Expr {
        Some(self.push(NodeKind::DrawLayerFill {
            layer: Rc::clone(layer),
            index,
        }))
    }

    pub fn draw_layer_stroke_fill(&mut self, layer: &Rc<LayerRef>, index: usize) -> Expr {
        Some(self.push(NodeKind::DrawLayerStrokeFill {
            layer: Rc::clone(layer),
            index,
        }))
    }

    pub fn draw_layer_text(&mut self, layer: &Rc<LayerRef>) -> Expr {
        Some(self.push(NodeKind::DrawLayerText {
            layer: Rc::clone(layer),
        }))
    }

    /// Only standalone effects (overlay fills) may be drawn without a basis.
    pub fn draw_layer_effect(
        &mut self,
        basis: Expr,
        layer: &Rc<LayerRef>,
        index: usize,
        standalone: bool,
    ) -> Expr {
        if basis.is_none() && !standalone {
            return None;
        }
        Some(self.push(NodeKind::DrawLayerEffect {
            basis,
            layer: Rc::clone(layer),
            index,
            standalone,
        }))
    }

    pub fn apply_filter(&mut self, basis: Expr, filter: &Filter) -> Expr {
        let basis = basis?;
        if let FilterKind::OpacityMultiplier { opacity } = filter.kind {
            return self.multiply_alpha(Some(basis), opacity);
        }
        Some(self.push(NodeKind::ApplyFilter {
            basis,
            filter: filter.clone(),
        }))
    }

    /// Wrap `content` in an identity node whose operand becomes the inlay slot, unless a slot
    /// was already recorded.
    pub fn make_inlay_point(&mut self, content: Expr, inlay: &mut Option<InlaySlot>) -> Expr {
        if inlay.is_some() {
            return content;
        }
        let content = match content {
            Some(id) => id,
            None => self.empty(),
        };
        let id = self.push(NodeKind::Identity { content });
        *inlay = Some(InlaySlot {
            node: id,
            operand: InlayOperand::IdentityContent,
        });
        Some(id)
    }

    pub fn make_background(&mut self) -> Expr {
        Some(self.push(NodeKind::Background))
    }

    pub fn set_background(&mut self, content: Expr, background: Expr) -> Expr {
        let Some(bg) = background else {
            return self.unset_background(content);
        };
        let c = content?;
        if self.kind(bg).is_background() {
            return content;
        }
        if self.kind(c).is_background() {
            return background;
        }
        Some(self.push(NodeKind::SetBackground {
            content: c,
            background: Some(bg),
        }))
    }

    pub fn unset_background(&mut self, content: Expr) -> Expr {
        let content = content?;
        Some(self.push(NodeKind::SetBackground {
            content,
            background: None,
        }))
    }

    pub fn mix_layer_opacity(&mut self, layer: &Rc<LayerRef>, a: Expr, b: Expr) -> Expr {
        Some(self.push(NodeKind::MixLayerOpacity {
            layer: Rc::clone(layer),
            a,
            b,
        }))
    }

    /// Current child of an inlay slot.
    pub fn inlay_content(&self, slot: InlaySlot) -> RendexResult<NodeId> {
        match (self.kind(slot.node), slot.operand) {
            (NodeKind::Identity { content }, InlayOperand::IdentityContent) => Ok(*content),
            (NodeKind::Blend { dst, .. }, InlayOperand::BlendDst) => Ok(*dst),
            (kind, operand) => Err(RendexError::validation(format!(
                "inlay slot {operand:?} does not exist on {} node",
                kind.name()
            ))),
        }
    }

    /// Replace the child of `slot` with `f(old_child)`.
    ///
    /// The edge moves from the old child to the new one and flags are recomputed for every
    /// ancestor of the slot node. A null replacement is stored as an `Empty` node.
    pub fn rewrite_inlay(
        &mut self,
        slot: InlaySlot,
        f: impl FnOnce(&mut Self, Expr) -> Expr,
    ) -> RendexResult<()> {
        let old = self.inlay_content(slot)?;
        let new = match f(self, Some(old)) {
            Some(id) => id,
            None => self.empty(),
        };
        if new == old {
            return Ok(());
        }
        if self.is_ancestor_or_self(new, slot.node) {
            return Err(RendexError::validation(
                "inlay rewrite would create a cycle",
            ));
        }

        match (&mut self.nodes[slot.node.index()].kind, slot.operand) {
            (NodeKind::Identity { content }, InlayOperand::IdentityContent) => *content = new,
            (NodeKind::Blend { dst, .. }, InlayOperand::BlendDst) => *dst = new,
            _ => return Err(RendexError::validation("inlay slot changed during rewrite")),
        }

        let old_node = &mut self.nodes[old.index()];
        old_node.refs = old_node.refs.saturating_sub(1);
        if let Some(pos) = old_node.parents.iter().position(|&p| p == slot.node) {
            old_node.parents.swap_remove(pos);
        }
        let new_node = &mut self.nodes[new.index()];
        new_node.refs += 1;
        new_node.parents.push(slot.node);

        self.propagate_flags(slot.node);
        Ok(())
    }

    /// `true` if `ancestor` is reachable from `node` by following child edges.
    fn is_ancestor_or_self(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if id == ancestor {
                return true;
            }
            if std::mem::replace(&mut seen[id.index()], true) {
                continue;
            }
            stack.extend(self.kind(id).children());
        }
        false
    }

    fn propagate_flags(&mut self, start: NodeId) {
        let mut work = vec![start];
        while let Some(id) = work.pop() {
            let flags = self.flags_for(self.kind(id));
            let node = &mut self.nodes[id.index()];
            if node.flags != flags {
                node.flags = flags;
                work.extend(node.parents.iter().copied());
            }
        }
    }

    /// Copy the subgraph reachable from `root` into a fresh arena with exact edge counts.
    pub fn compact(&self, root: Expr) -> (ExprGraph, Expr) {
        let mut out = ExprGraph::new();
        let Some(root) = root else {
            return (out, None);
        };
        let mut map: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if map[id.index()].is_some() {
                continue;
            }
            if expanded {
                let kind = remap(self.kind(id), |c| map[c.index()]);
                map[id.index()] = Some(out.push(kind));
            } else {
                stack.push((id, true));
                for child in self.kind(id).children().into_iter().rev() {
                    if map[child.index()].is_none() {
                        stack.push((child, false));
                    }
                }
            }
        }
        let new_root = map[root.index()];
        (out, new_root)
    }
}

/// Rebuild `kind` with children translated through `f`. Children must already be mapped.
fn remap(kind: &NodeKind, f: impl Fn(NodeId) -> Option<NodeId>) -> NodeKind {
    let m = |id: NodeId| f(id).unwrap_or(id);
    match kind {
        NodeKind::Identity { content } => NodeKind::Identity {
            content: m(*content),
        },
        NodeKind::Blend { dst, src, mode } => NodeKind::Blend {
            dst: m(*dst),
            src: m(*src),
            mode: *mode,
        },
        NodeKind::BlendIgnoreAlpha { dst, src, mode } => NodeKind::BlendIgnoreAlpha {
            dst: m(*dst),
            src: m(*src),
            mode: *mode,
        },
        NodeKind::Mask {
            image,
            mask,
            channels,
        } => NodeKind::Mask {
            image: m(*image),
            mask: m(*mask),
            channels: *channels,
        },
        NodeKind::MixMask {
            dst,
            src,
            mask,
            channels,
        } => NodeKind::MixMask {
            dst: m(*dst),
            src: m(*src),
            mask: m(*mask),
            channels: *channels,
        },
        NodeKind::Mix { a, b, ratio } => NodeKind::Mix {
            a: m(*a),
            b: m(*b),
            ratio: *ratio,
        },
        NodeKind::MultiplyAlpha { image, multiplier } => NodeKind::MultiplyAlpha {
            image: m(*image),
            multiplier: *multiplier,
        },
        NodeKind::DrawLayerEffect {
            basis,
            layer,
            index,
            standalone,
        } => NodeKind::DrawLayerEffect {
            basis: basis.map(m),
            layer: Rc::clone(layer),
            index: *index,
            standalone: *standalone,
        },
        NodeKind::ApplyFilter { basis, filter } => NodeKind::ApplyFilter {
            basis: m(*basis),
            filter: filter.clone(),
        },
        NodeKind::SetBackground {
            content,
            background,
        } => NodeKind::SetBackground {
            content: m(*content),
            background: background.map(m),
        },
        NodeKind::MixLayerOpacity { layer, a, b } => NodeKind::MixLayerOpacity {
            layer: Rc::clone(layer),
            a: a.map(m),
            b: b.map(m),
        },
        leaf @ (NodeKind::Empty
        | NodeKind::Background
        | NodeKind::DrawLayerBody { .. }
        | NodeKind::DrawLayerStroke { .. }
        | NodeKind::DrawLayerFill { .. }
        | NodeKind::DrawLayerStrokeFill { .. }
        | NodeKind::DrawLayerText { .. }) => leaf.clone(),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/expr/graph.rs"]
mod tests;
