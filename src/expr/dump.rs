//! Canonical listings of expression subgraphs.
//!
//! Nodes are numbered in first-visit pre-order from the root, so two graphs built in different
//! arenas (or in a different allocation order) produce the same listing when they have the same
//! structure. Edge counts are not part of the listing.

use crate::document::model::FilterKind;
use crate::expr::graph::ExprGraph;
use crate::expr::node::{Expr, NodeFlags, NodeId, NodeKind};
use std::collections::HashMap;
use std::fmt::Write as _;
use xxhash_rust::xxh3::Xxh3;

const XXH3_SEED: u64 = 0x5f0d_1c3a_9e27_b841;

/// Stable structural fingerprint of a subgraph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GraphFingerprint {
    pub hi: u64,
    pub lo: u64,
}

struct Canonical {
    order: Vec<NodeId>,
    number: HashMap<NodeId, usize>,
}

fn canonical(graph: &ExprGraph, root: NodeId) -> Canonical {
    let mut order = Vec::new();
    let mut number = HashMap::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if number.contains_key(&id) {
            continue;
        }
        number.insert(id, order.len());
        order.push(id);
        for child in graph.kind(id).children().into_iter().rev() {
            if !number.contains_key(&child) {
                stack.push(child);
            }
        }
    }
    Canonical { order, number }
}

fn payload(kind: &NodeKind) -> String {
    match kind {
        NodeKind::Blend { mode, .. } | NodeKind::BlendIgnoreAlpha { mode, .. } => {
            format!("({})", mode.as_str())
        }
        NodeKind::Mask { channels, .. } | NodeKind::MixMask { channels, .. } => {
            format!("({:?})", channels.0)
        }
        NodeKind::Mix { ratio, .. } => format!("(ratio={ratio})"),
        NodeKind::MultiplyAlpha { multiplier, .. } => format!("(x{multiplier})"),
        NodeKind::DrawLayerBody { layer } | NodeKind::DrawLayerText { layer } => {
            format!("({})", layer.id)
        }
        NodeKind::DrawLayerStroke { layer, index }
        | NodeKind::DrawLayerFill { layer, index }
        | NodeKind::DrawLayerStrokeFill { layer, index } => format!("({}[{index}])", layer.id),
        NodeKind::DrawLayerEffect { layer, index, .. } => format!("({}[{index}])", layer.id),
        NodeKind::ApplyFilter { filter, .. } => match &filter.kind {
            FilterKind::OpacityMultiplier { opacity } => format!("(opacity={opacity})"),
            FilterKind::ColorMatrix { matrix } => format!("(matrix={matrix:?})"),
        },
        NodeKind::MixLayerOpacity { layer, .. } => format!("({})", layer.id),
        NodeKind::Empty
        | NodeKind::Identity { .. }
        | NodeKind::Background
        | NodeKind::SetBackground { .. } => String::new(),
    }
}

fn flag_suffix(flags: NodeFlags) -> &'static str {
    match (
        flags.contains(NodeFlags::BACKGROUND_DEPENDENT),
        flags.contains(NodeFlags::ANIMATED_OPACITY),
    ) {
        (true, true) => " [bg,anim]",
        (true, false) => " [bg]",
        (false, true) => " [anim]",
        (false, false) => "",
    }
}

/// One line per reachable node: `#n Kind(payload) operand=#k ... [flags]`.
pub fn dump(graph: &ExprGraph, root: Expr) -> String {
    let Some(root) = root else {
        return "null\n".to_string();
    };
    let c = canonical(graph, root);
    let mut out = String::new();
    for (n, &id) in c.order.iter().enumerate() {
        let kind = graph.kind(id);
        let _ = write!(out, "#{n} {}{}", kind.name(), payload(kind));
        for (operand, child) in kind.operands() {
            match child {
                Some(child) => {
                    let _ = write!(out, " {}=#{}", operand.name(), c.number[&child]);
                }
                None => {
                    let _ = write!(out, " {}=null", operand.name());
                }
            }
        }
        out.push_str(flag_suffix(graph.flags(id)));
        out.push('\n');
    }
    out
}

pub fn fingerprint(graph: &ExprGraph, root: Expr) -> GraphFingerprint {
    let mut h = Xxh3::with_seed(XXH3_SEED);
    h.update(dump(graph, root).as_bytes());
    let v = h.digest128();
    GraphFingerprint {
        hi: (v >> 64) as u64,
        lo: v as u64,
    }
}

/// Graphviz rendering of the subgraph, for debugging.
pub fn to_dot(graph: &ExprGraph, root: Expr) -> String {
    let mut out = String::from("digraph rendex {\n  node [shape=box, fontname=monospace];\n");
    if let Some(root) = root {
        let c = canonical(graph, root);
        for (n, &id) in c.order.iter().enumerate() {
            let kind = graph.kind(id);
            let label = format!("{}{}", kind.name(), payload(kind)).replace('"', "\\\"");
            let _ = writeln!(
                out,
                "  n{n} [label=\"{label}\\nrefs={}\"];",
                graph.node(id).refs
            );
            for (operand, child) in kind.operands() {
                if let Some(child) = child {
                    let _ = writeln!(
                        out,
                        "  n{n} -> n{} [label=\"{}\"];",
                        c.number[&child],
                        operand.name()
                    );
                }
            }
        }
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
#[path = "../../tests/unit/expr/dump.rs"]
mod tests;
