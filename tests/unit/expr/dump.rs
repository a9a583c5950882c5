use super::*;
use crate::document::model::BlendMode;
use crate::expr::node::LayerRef;

fn sample(g: &mut ExprGraph, leaves_first: bool) -> Expr {
    let l = LayerRef::root("shape");
    let (body, fill) = if leaves_first {
        let body = g.draw_layer_body(&l);
        let fill = g.draw_layer_fill(&l, 0);
        (body, fill)
    } else {
        // Allocate in the opposite order with an unrelated node in between.
        let fill = g.draw_layer_fill(&l, 0);
        g.empty();
        let body = g.draw_layer_body(&l);
        (body, fill)
    };
    let bg = g.make_background();
    let over = g.blend(bg, fill, BlendMode::Multiply);
    g.mix(body, over, 0.5)
}

#[test]
fn dump_numbers_nodes_in_preorder() {
    let mut g = ExprGraph::new();
    let root = sample(&mut g, true);
    let text = dump(&g, root);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "#0 Mix(ratio=0.5) a=#1 b=#2 [bg]");
    assert_eq!(lines[1], "#1 LayerBody(shape)");
    assert_eq!(lines[2], "#2 Blend(multiply) dst=#3 src=#4 [bg]");
    assert_eq!(lines[3], "#3 Background [bg]");
    assert_eq!(lines[4], "#4 LayerFill(shape[0])");
    assert_eq!(lines.len(), 5);
}

#[test]
fn dump_of_null_is_null() {
    assert_eq!(dump(&ExprGraph::new(), None), "null\n");
}

#[test]
fn fingerprint_ignores_allocation_order() {
    let mut g1 = ExprGraph::new();
    let r1 = sample(&mut g1, true);
    let mut g2 = ExprGraph::new();
    let r2 = sample(&mut g2, false);
    assert_eq!(fingerprint(&g1, r1), fingerprint(&g2, r2));

    let changed = g2.multiply_alpha(r2, 0.5);
    assert_ne!(fingerprint(&g1, r1), fingerprint(&g2, changed));
}

#[test]
fn dot_lists_edges() {
    let mut g = ExprGraph::new();
    let root = sample(&mut g, true);
    let dot = to_dot(&g, root);
    assert!(dot.starts_with("digraph rendex {"));
    assert!(dot.contains("n0 -> n1 [label=\"a\"]"));
    assert!(dot.contains("n2 -> n3 [label=\"dst\"]"));
    assert!(dot.trim_end().ends_with('}'));
}
