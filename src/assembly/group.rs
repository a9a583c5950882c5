use crate::assembly::{
    AssemblyFlags, Composite, Facet, Facets, LayerSubtree, Subject, apply_fill_replacement_effects,
    assemble_foreground_effects, embed_in_mask, finalize_layer_assembly, is_mask_active,
    layer_background, request_facets,
};
use crate::document::model::{BlendMode, Layer, MaskBasis};
use crate::expr::graph::ExprGraph;
use crate::expr::node::{Expr, LayerRef};
use crate::foundation::core::ChannelMatrix;
use crate::foundation::error::RendexResult;
use std::rc::Rc;

/// Incremental assembler for a group layer.
///
/// Children are added bottom to top; each child's root is evaluated with the group content
/// accumulated so far as its background. The mask (if any) is set before or after the children,
/// and [`Self::finish`] produces the group's subtree.
#[derive(Debug)]
pub struct GroupLayerAssembler {
    layer: Layer,
    layer_ref: Rc<LayerRef>,
    /// Role of this group as the mask of its own parent.
    group_mask_basis: Option<MaskBasis>,
    /// How this group's own mask gates its content.
    mask_basis: Option<MaskBasis>,
    flags: AssemblyFlags,
    content: Expr,
    mask: Option<LayerSubtree>,
    mask_visible: bool,
}

impl GroupLayerAssembler {
    pub fn new(
        graph: &mut ExprGraph,
        layer: &Layer,
        layer_ref: &Rc<LayerRef>,
        group_mask_basis: Option<MaskBasis>,
        flags: AssemblyFlags,
    ) -> Self {
        let content = layer_background(graph, layer);
        Self {
            layer: layer.clone(),
            layer_ref: Rc::clone(layer_ref),
            group_mask_basis,
            mask_basis: layer.mask_basis,
            flags,
            content,
            mask: None,
            mask_visible: false,
        }
    }

    pub fn layer_id(&self) -> &str {
        &self.layer.id
    }

    pub fn add_layer(&mut self, graph: &mut ExprGraph, subtree: LayerSubtree) {
        self.content = graph.set_background(subtree.root, self.content);
    }

    pub fn set_mask(&mut self, graph: &mut ExprGraph, subtree: LayerSubtree, visible: bool) {
        if self.mask_basis.unwrap_or(MaskBasis::Body) == MaskBasis::Solid {
            if visible {
                self.add_layer(graph, subtree);
            }
            return;
        }
        self.mask = Some(subtree);
        self.mask_visible = visible;
        if visible && !embed_in_mask(self.mask_basis) {
            self.content = graph.set_background(subtree.root, self.content);
        }
    }

    pub fn finish(mut self, graph: &mut ExprGraph) -> RendexResult<LayerSubtree> {
        if embed_in_mask(self.mask_basis) && self.mask_visible {
            if let Some(mask) = self.mask {
                if let Some(slot) = mask.inlay {
                    let content = self.content;
                    graph.rewrite_inlay(slot, |g, old| g.set_background(content, old))?;
                } else {
                    tracing::warn!(layer = %self.layer.id, "embedded mask has no inlay point");
                }
                self.content = mask.root;
            }
        }

        let mut facets = Facets::new();
        request_facets(&self.layer, &mut facets, self.group_mask_basis);
        let subject = Subject {
            layer: &self.layer,
            layer_ref: &self.layer_ref,
        };

        let mut subtree = if self.layer.blend_mode == BlendMode::PassThrough {
            self.pass_through(graph, subject, &mut facets)
        } else {
            let content = graph.unset_background(self.content);
            facets.set(Facet::Body, content);
            facets.set(Facet::BodyAndStrokes, content);
            facets.set(Facet::Fill, content);

            let mut underlay = layer_background(graph, &self.layer);
            let render = apply_fill_replacement_effects(graph, subject, content);
            if render != content {
                let fill = graph.mask(render, content, ChannelMatrix::ALPHA);
                facets.set(Facet::Fill, fill);
            }
            let mut overlay = graph.blend_ignore_alpha(underlay, render, self.layer.blend_mode);

            let mut inlay = None;
            assemble_foreground_effects(
                graph,
                subject,
                &facets,
                &mut underlay,
                &mut overlay,
                &mut inlay,
            );
            let composite = Composite {
                underlay,
                overlay,
                overlay_mask: content,
                inlay,
            };
            finalize_layer_assembly(
                graph,
                subject,
                &mut facets,
                composite,
                self.group_mask_basis,
                self.flags,
            )
        };

        if is_mask_active(self.mask_basis) && !embed_in_mask(self.mask_basis) {
            let mask_facet = self.mask.and_then(|m| m.mask_facet);
            let bg = graph.make_background();
            subtree.root = graph.mix_mask(
                bg,
                subtree.root,
                mask_facet,
                self.layer.mask_channel_matrix(),
            );
        }
        Ok(subtree)
    }

    /// Children stay blended straight into the group's background; effects are layered on top
    /// of that.
    fn pass_through(
        &self,
        graph: &mut ExprGraph,
        subject: Subject<'_>,
        facets: &mut Facets,
    ) -> LayerSubtree {
        let mut subtree = LayerSubtree::default();
        let needs_standalone = [
            Facet::Body,
            Facet::BodyAndStrokes,
            Facet::Fill,
            Facet::LayerAndEffects,
        ]
        .into_iter()
        .any(|f| facets.is_requested(f));
        if needs_standalone {
            let standalone = graph.unset_background(self.content);
            facets.set(Facet::Body, standalone);
            facets.set(Facet::BodyAndStrokes, standalone);
            facets.set(Facet::Fill, standalone);
            facets.set(Facet::LayerAndEffects, standalone);

            let (mut underlay, mut overlay) = (None, None);
            let mut inlay = None;
            assemble_foreground_effects(
                graph,
                subject,
                facets,
                &mut underlay,
                &mut overlay,
                &mut inlay,
            );
            if embed_in_mask(self.group_mask_basis) {
                overlay = graph.make_inlay_point(overlay, &mut inlay);
            }
            let effects = graph.mix_mask(underlay, overlay, standalone, ChannelMatrix::ALPHA);
            subtree.root = graph.blend(self.content, effects, BlendMode::Normal);
            subtree.inlay = inlay;
            if let Some(basis) = self.group_mask_basis.filter(|_| is_mask_active(self.group_mask_basis)) {
                subtree.mask_facet = facets.get(basis);
            }
        } else {
            subtree.root = self.content;
        }

        let bg = graph.make_background();
        subtree.root = if self.flags.fixed_opacity {
            graph.mix(bg, subtree.root, self.layer.opacity)
        } else {
            graph.mix_layer_opacity(&self.layer_ref, bg, subtree.root)
        };
        debug_assert!(facets.finished(), "group '{}' left a facet unprovided", self.layer.id);
        subtree
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assembly/group.rs"]
mod tests;
