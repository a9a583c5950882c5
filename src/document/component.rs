//! A document held as a mutable layer tree plus the per-layer instance cache derived from it.
//!
//! Edits go through [`Component::add_layer`], [`Component::remove_layer`] and
//! [`Component::modify_layer`]; they only mark the cache stale. [`Component::rebuild`] refreshes
//! the instances and [`Component::assemble`] turns the tree into a background-free
//! [`RenderGraph`].

use crate::animation::AnimationProvider;
use crate::animation::anim::{DocumentAnimation, LayerAnimation};
use crate::assembly::{
    AssemblyFlags, GroupLayerAssembler, LayerSubtree, assemble_shape_layer, assemble_text_layer,
    is_mask_active,
};
use crate::document::change::{ChangeLevel, LayerChange, PropertyChange, apply_change};
use crate::document::instance::{LayerBounds, LayerInstance, transform_bounds, union_bounds};
use crate::document::model::{Dimensions, Document, Layer, LayerKind, LayerSpec, MaskBasis};
use crate::document::store::LayerStore;
use crate::expr::dump::{GraphFingerprint, fingerprint};
use crate::expr::graph::ExprGraph;
use crate::expr::node::Expr;
use crate::foundation::core::{Affine, Color, Point, Rect, ensure_invertible};
use crate::foundation::error::{RendexError, RendexResult};
use crate::raster::TextShaper;
use crate::transform::TransformStats;
use crate::transform::resolve::resolve_background;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Coordinate system a [`Component::transform_layer`] transformation is expressed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformOrigin {
    /// Applied before the layer's own transform.
    Layer,
    /// Applied after the layer's own transform, in the parent's coordinates.
    Parent,
    /// Expressed in component coordinates.
    Component,
}

/// Assembled, background-resolved expression graph of a component (or one of its subtrees).
#[derive(Clone, Debug)]
pub struct RenderGraph {
    pub graph: ExprGraph,
    pub root: Expr,
    pub fingerprint: GraphFingerprint,
    /// Some layer of the component is animated, so renders depend on time.
    pub animated: bool,
    pub stats: TransformStats,
    /// [`Component::revision`] the graph was assembled at.
    pub revision: u64,
}

pub struct Component {
    store: LayerStore,
    dimensions: Option<Dimensions>,
    animations: DocumentAnimation,
    instances: HashMap<String, LayerInstance>,
    text_shaper: Option<Rc<dyn TextShaper>>,
    built: bool,
    revision: u64,
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("root", &self.store.root())
            .field("layers", &self.store.len())
            .field("animations", &self.animations.animations.len())
            .field("text_shaper", &self.text_shaper.is_some())
            .field("built", &self.built)
            .field("revision", &self.revision)
            .finish()
    }
}

/// Group being assembled, with the ids still to feed into it.
struct GroupFrame {
    assembler: GroupLayerAssembler,
    mask_basis: Option<MaskBasis>,
    slots: std::vec::IntoIter<Slot>,
    current: Option<Slot>,
}

#[derive(Clone, Debug)]
struct Slot {
    id: String,
    /// `Some(visible)` for the group's mask.
    mask: Option<bool>,
}

impl Component {
    pub fn from_document(document: &Document) -> RendexResult<Self> {
        let store = LayerStore::from_spec(&document.root)?;
        let mut component = Self {
            store,
            dimensions: document.dimensions,
            animations: DocumentAnimation::default(),
            instances: HashMap::new(),
            text_shaper: None,
            built: false,
            revision: 0,
        };
        component.set_animations(document.animations.clone())?;
        component.rebuild()?;
        Ok(component)
    }

    pub fn from_json(json: &str) -> RendexResult<Self> {
        Self::from_document(&Document::from_json(json)?)
    }

    pub fn to_document(&self) -> RendexResult<Document> {
        Ok(Document {
            dimensions: self.dimensions,
            root: self.store.to_spec(self.store.root())?,
            animations: self.animations.clone(),
        })
    }

    pub fn root_id(&self) -> &str {
        self.store.root()
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions
    }

    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    pub fn layer(&self, id: &str) -> RendexResult<&Layer> {
        self.store.layer(id)
    }

    /// Cached instance of `id` as of the last rebuild.
    pub fn instance(&self, id: &str) -> RendexResult<&LayerInstance> {
        self.instances
            .get(id)
            .ok_or_else(|| RendexError::layer_not_found(id))
    }

    pub fn animations(&self) -> &DocumentAnimation {
        &self.animations
    }

    /// Bumped on every successful edit.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Install a text shaper. Text layers are reshaped on the next rebuild.
    pub fn set_text_shaper(&mut self, shaper: Option<Rc<dyn TextShaper>>) {
        self.text_shaper = shaper;
        for (id, instance) in &mut self.instances {
            if self
                .store
                .layer(id)
                .is_ok_and(|l| l.kind == LayerKind::Text)
            {
                instance.invalidate();
            }
        }
        self.touch();
    }

    pub fn text_shaper(&self) -> Option<&dyn TextShaper> {
        self.text_shaper.as_deref()
    }

    /// Replace all animations. Every animation must be valid and target an existing layer.
    pub fn set_animations(&mut self, animations: DocumentAnimation) -> RendexResult<()> {
        animations.validate()?;
        if let Some(a) = animations
            .animations
            .iter()
            .find(|a| !self.store.contains(&a.layer))
        {
            return Err(RendexError::layer_not_found(format!(
                "{} (animation target)",
                a.layer
            )));
        }
        self.animations = animations;
        self.touch();
        Ok(())
    }

    /// Insert `spec` and its subtree under the group `parent`, below `before` or on top.
    pub fn add_layer(
        &mut self,
        parent: &str,
        before: Option<&str>,
        spec: &LayerSpec,
    ) -> RendexResult<ChangeLevel> {
        self.store.insert(parent, before, spec)?;
        tracing::debug!(layer = %spec.layer.id, parent, "layer added");
        self.touch();
        Ok(ChangeLevel::Hierarchy)
    }

    /// Remove `id` with its subtree and the animations targeting it. Returns the removed ids.
    pub fn remove_layer(&mut self, id: &str) -> RendexResult<Vec<String>> {
        let removed = self.store.remove(id)?;
        let gone: HashSet<&str> = removed.iter().map(String::as_str).collect();
        self.instances.retain(|id, _| !gone.contains(id.as_str()));
        self.animations
            .animations
            .retain(|a| !gone.contains(a.layer.as_str()));
        tracing::debug!(layer = id, removed = removed.len(), "layer removed");
        self.touch();
        Ok(removed)
    }

    /// Apply `change` to layer `id`. On error nothing changes.
    pub fn modify_layer(&mut self, id: &str, change: &LayerChange) -> RendexResult<ChangeLevel> {
        let layer = self.store.layer_mut(id)?;
        let level = apply_change(layer, change)?;
        if level > ChangeLevel::Logical {
            if let Some(instance) = self.instances.get_mut(id) {
                instance.invalidate();
            }
            self.touch();
        } else {
            self.revision += 1;
        }
        tracing::debug!(layer = id, ?level, "layer modified");
        Ok(level)
    }

    /// Compose `transform` into the transform of layer `id`.
    pub fn transform_layer(
        &mut self,
        id: &str,
        origin: TransformOrigin,
        transform: Affine,
    ) -> RendexResult<ChangeLevel> {
        ensure_invertible(transform, "layer transformation")?;
        self.ensure_built()?;
        let current = self.store.layer(id)?.affine();
        let next = match origin {
            TransformOrigin::Layer => current * transform,
            TransformOrigin::Parent => transform * current,
            TransformOrigin::Component => {
                let parent = self.instance(id)?.layer_ref().parent_transform;
                parent.inverse() * transform * parent * current
            }
        };
        let change = LayerChange::Properties(PropertyChange {
            transform: Some(next.as_coeffs()),
            ..Default::default()
        });
        self.modify_layer(id, &change)
    }

    /// Bounds of layer `id`, rebuilding the cache first if it is stale.
    pub fn layer_bounds(&mut self, id: &str) -> RendexResult<LayerBounds> {
        self.ensure_built()?;
        Ok(*self.instance(id)?.bounds())
    }

    /// Extent of the whole component in component coordinates.
    pub fn bounds(&mut self) -> RendexResult<Rect> {
        let root = self.store.root().to_string();
        Ok(self.layer_bounds(&root)?.transformed)
    }

    /// Topmost visible shape or text layer whose bounds, grown by `radius`, contain `point`.
    pub fn identify_layer(&mut self, point: Point, radius: f64) -> RendexResult<Option<String>> {
        self.ensure_built()?;
        let mut stack = vec![self.store.root()];
        while let Some(id) = stack.pop() {
            let entry = self.store.entry(id)?;
            if !entry.layer.visible {
                continue;
            }
            if entry.layer.kind.is_group() {
                // Popped top first.
                stack.extend(entry.children.iter().map(String::as_str));
                continue;
            }
            let bounds = self.instance(id)?.bounds().transformed;
            if bounds != Rect::ZERO && bounds.inflate(radius, radius).contains(point) {
                return Ok(Some(id.to_string()));
            }
        }
        Ok(None)
    }

    pub fn ensure_built(&mut self) -> RendexResult<()> {
        if self.built {
            return Ok(());
        }
        self.rebuild()
    }

    /// Refresh every layer instance: placement, animations, geometry and bounds.
    #[tracing::instrument(skip(self), fields(layers = self.store.len()))]
    pub fn rebuild(&mut self) -> RendexResult<()> {
        let order = self.store.subtree(self.store.root())?;
        let live: HashSet<&str> = order.iter().map(String::as_str).collect();
        self.instances.retain(|id, _| live.contains(id.as_str()));

        for id in &order {
            let entry = self.store.entry(id)?;
            let layer = &entry.layer;
            let (parent_transform, parent_scale, inherited) = match entry.parent.as_deref() {
                Some(parent) => {
                    let p = self
                        .instances
                        .get(parent)
                        .ok_or_else(|| RendexError::layer_not_found(parent))?;
                    (
                        p.transformation(),
                        p.feature_scale(),
                        p.animation().animations.clone(),
                    )
                }
                None => (Affine::IDENTITY, 1.0, Vec::new()),
            };
            let mut animations: Vec<LayerAnimation> =
                self.animations.for_layer(id).cloned().collect();
            animations.extend(
                inherited
                    .iter()
                    .filter_map(|a| a.inherited_by(id, layer.affine())),
            );

            let instance = self
                .instances
                .entry(id.clone())
                .or_insert_with(|| {
                    LayerInstance::new(layer, entry.parent.clone(), parent_transform, parent_scale)
                });
            instance.set_parent(layer, entry.parent.clone(), parent_transform, parent_scale);
            instance.set_animation(DocumentAnimation { animations });
            match layer.kind {
                LayerKind::Shape => instance.initialize_shape(layer)?,
                LayerKind::Text => instance.initialize_text(layer, self.text_shaper.as_deref())?,
                LayerKind::Group | LayerKind::MaskGroup => {}
            }
        }

        // Children before parents.
        for id in order.iter().rev() {
            let entry = self.store.entry(id)?;
            if !entry.layer.kind.is_group() {
                continue;
            }
            let masked = entry.layer.kind == LayerKind::MaskGroup
                && is_mask_active(entry.layer.mask_basis);
            let sources: Vec<&String> = if masked {
                entry.mask.iter().collect()
            } else {
                entry.mask.iter().chain(entry.children.iter()).collect()
            };
            let mut logical = Rect::ZERO;
            for child in sources {
                let untransformed = self.instance(child)?.bounds().untransformed;
                let child_transform = self.store.layer(child)?.affine();
                logical = union_bounds(logical, transform_bounds(untransformed, child_transform));
            }
            if let Some(instance) = self.instances.get_mut(id) {
                instance.set_logical_bounds(logical);
            }
        }

        self.built = true;
        tracing::debug!(instances = self.instances.len(), "component rebuilt");
        Ok(())
    }

    /// Assemble and background-resolve the whole component.
    pub fn assemble(&mut self) -> RendexResult<RenderGraph> {
        let root = self.store.root().to_string();
        self.assemble_layer(&root)
    }

    /// Assemble and background-resolve the subtree at `id`.
    #[tracing::instrument(skip(self))]
    pub fn assemble_layer(&mut self, id: &str) -> RendexResult<RenderGraph> {
        self.ensure_built()?;
        let mut graph = ExprGraph::new();
        let root = self.assemble_tree(&mut graph, id)?;
        let resolved = resolve_background(&graph, root);
        let fingerprint = fingerprint(&resolved.graph, resolved.root);
        tracing::debug!(
            assembled = graph.len(),
            resolved = resolved.graph.len(),
            max_depth = resolved.stats.max_depth,
            "component assembled"
        );
        Ok(RenderGraph {
            graph: resolved.graph,
            root: resolved.root,
            fingerprint,
            animated: !self.animations.animations.is_empty(),
            stats: resolved.stats,
            revision: self.revision,
        })
    }

    fn assemble_leaf(
        &self,
        graph: &mut ExprGraph,
        id: &str,
        mask_basis: Option<MaskBasis>,
    ) -> RendexResult<Option<LayerSubtree>> {
        let layer = self.store.layer(id)?;
        let instance = self.instance(id)?;
        let flags = AssemblyFlags {
            fixed_opacity: !instance.animation().animates_opacity(id),
        };
        Ok(match layer.kind {
            LayerKind::Shape => Some(assemble_shape_layer(
                graph,
                layer,
                instance.layer_ref(),
                mask_basis,
                flags,
            )?),
            LayerKind::Text => Some(assemble_text_layer(
                graph,
                layer,
                instance.layer_ref(),
                mask_basis,
                flags,
            )?),
            LayerKind::Group | LayerKind::MaskGroup => None,
        })
    }

    fn open_group(
        &self,
        graph: &mut ExprGraph,
        id: &str,
        mask_basis: Option<MaskBasis>,
    ) -> RendexResult<GroupFrame> {
        let entry = self.store.entry(id)?;
        let instance = self.instance(id)?;
        let flags = AssemblyFlags {
            fixed_opacity: !instance.animation().animates_opacity(id),
        };
        let assembler =
            GroupLayerAssembler::new(graph, &entry.layer, instance.layer_ref(), mask_basis, flags);
        let mut slots = Vec::with_capacity(entry.children.len() + 1);
        if let Some(mask) = &entry.mask {
            slots.push(Slot {
                id: mask.clone(),
                mask: Some(self.store.layer(mask)?.visible),
            });
        }
        for child in &entry.children {
            if self.store.layer(child)?.visible {
                slots.push(Slot {
                    id: child.clone(),
                    mask: None,
                });
            }
        }
        Ok(GroupFrame {
            assembler,
            mask_basis: entry.layer.mask_basis,
            slots: slots.into_iter(),
            current: None,
        })
    }

    /// Assemble the subtree at `id` with an explicit stack of open groups.
    fn assemble_tree(&self, graph: &mut ExprGraph, id: &str) -> RendexResult<Expr> {
        if !self.store.layer(id)?.visible {
            return Ok(None);
        }
        let mut frames: Vec<GroupFrame> = Vec::new();
        let mut pending: Option<(String, Option<MaskBasis>)> = Some((id.to_string(), None));
        let mut max_depth = 0;
        loop {
            let finished = match pending.take() {
                Some((id, mask_basis)) => match self.assemble_leaf(graph, &id, mask_basis)? {
                    Some(subtree) => subtree,
                    None => {
                        frames.push(self.open_group(graph, &id, mask_basis)?);
                        max_depth = max_depth.max(frames.len());
                        continue;
                    }
                },
                None => {
                    let Some(frame) = frames.last_mut() else {
                        let err = anyhow::anyhow!("assembly stack exhausted without a result");
                        return Err(err.into());
                    };
                    if let Some(slot) = frame.slots.next() {
                        let basis = slot.mask.and_then(|_| frame.mask_basis);
                        pending = Some((slot.id.clone(), basis));
                        frame.current = Some(slot);
                        continue;
                    }
                    let Some(frame) = frames.pop() else {
                        continue;
                    };
                    frame.assembler.finish(graph)?
                }
            };

            let Some(parent) = frames.last_mut() else {
                tracing::trace!(max_depth, "layer tree assembled");
                return Ok(finished.root);
            };
            match parent.current.take().and_then(|slot| slot.mask) {
                Some(visible) => parent.assembler.set_mask(graph, finished, visible),
                None => parent.assembler.add_layer(graph, finished),
            }
        }
    }

    /// Mark derived state stale after an edit.
    fn touch(&mut self) {
        self.built = false;
        self.revision += 1;
    }
}

impl AnimationProvider for Component {
    fn layer_transform(&self, layer: &str, time: f64) -> Affine {
        self.instances
            .get(layer)
            .map_or(Affine::IDENTITY, |i| i.animation().layer_transform(layer, time))
    }

    fn layer_opacity(&self, layer: &str, time: f64) -> f64 {
        self.instances
            .get(layer)
            .map_or(1.0, |i| i.animation().layer_opacity(layer, time))
    }

    fn layer_fill_color(&self, layer: &str, time: f64) -> Option<Color> {
        self.instances
            .get(layer)
            .and_then(|i| i.animation().layer_fill_color(layer, time))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/document/component.rs"]
mod tests;
