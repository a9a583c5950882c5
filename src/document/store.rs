use crate::document::model::{Layer, LayerSpec};
use crate::foundation::core::ensure_invertible;
use crate::foundation::error::{RendexError, RendexResult};
use std::collections::{HashMap, HashSet};

/// One layer of a [`LayerStore`] with its tree links.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerEntry {
    pub layer: Layer,
    pub parent: Option<String>,
    /// Children ordered bottom to top.
    pub children: Vec<String>,
    /// Mask layer of a mask group.
    pub mask: Option<String>,
}

/// Flat arena of the layer tree, keyed by layer id.
#[derive(Clone, Debug)]
pub struct LayerStore {
    entries: HashMap<String, LayerEntry>,
    root: String,
}

/// Check a layer before it enters the store.
fn admit(layer: &Layer, has_children: bool, has_mask: bool) -> RendexResult<()> {
    layer.validate()?;
    ensure_invertible(layer.affine(), &format!("transform of layer '{}'", layer.id))?;
    if has_children && !layer.kind.is_group() {
        return Err(RendexError::wrong_layer_type(format!(
            "layer '{}' ({}) cannot have children",
            layer.id,
            layer.kind.as_str()
        )));
    }
    if has_mask && layer.kind != crate::document::model::LayerKind::MaskGroup {
        return Err(RendexError::wrong_layer_type(format!(
            "layer '{}' ({}) cannot have a mask",
            layer.id,
            layer.kind.as_str()
        )));
    }
    Ok(())
}

impl LayerStore {
    pub fn from_spec(spec: &LayerSpec) -> RendexResult<Self> {
        let mut store = Self {
            entries: HashMap::new(),
            root: spec.layer.id.clone(),
        };
        store.insert_tree(None, spec)?;
        Ok(store)
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn entry(&self, id: &str) -> RendexResult<&LayerEntry> {
        self.entries
            .get(id)
            .ok_or_else(|| RendexError::layer_not_found(id))
    }

    pub fn layer(&self, id: &str) -> RendexResult<&Layer> {
        self.entry(id).map(|e| &e.layer)
    }

    pub fn layer_mut(&mut self, id: &str) -> RendexResult<&mut Layer> {
        self.entries
            .get_mut(id)
            .map(|e| &mut e.layer)
            .ok_or_else(|| RendexError::layer_not_found(id))
    }

    /// Ids of `id` and all layers below it, parents before children, masks before content.
    pub fn subtree(&self, id: &str) -> RendexResult<Vec<String>> {
        self.entry(id)?;
        let mut out = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(id) = stack.pop() {
            if let Some(entry) = self.entries.get(&id) {
                stack.extend(entry.children.iter().rev().cloned());
                stack.extend(entry.mask.iter().cloned());
            }
            out.push(id);
        }
        Ok(out)
    }

    /// Insert `spec` and its subtree under `parent`, below the child `before` or on top.
    pub fn insert(
        &mut self,
        parent: &str,
        before: Option<&str>,
        spec: &LayerSpec,
    ) -> RendexResult<()> {
        let parent_entry = self.entry(parent)?;
        if !parent_entry.layer.kind.is_group() {
            return Err(RendexError::wrong_layer_type(format!(
                "layer '{parent}' ({}) cannot have children",
                parent_entry.layer.kind.as_str()
            )));
        }
        let position = match before {
            None => parent_entry.children.len(),
            Some(before) => parent_entry
                .children
                .iter()
                .position(|c| c == before)
                .ok_or_else(|| {
                    RendexError::layer_not_found(format!("{before} (in children of '{parent}')"))
                })?,
        };
        self.insert_tree(Some(parent), spec)?;
        if let Some(entry) = self.entries.get_mut(parent) {
            entry.children.insert(position, spec.layer.id.clone());
        }
        Ok(())
    }

    /// Remove `id` and everything below it. Returns the removed ids.
    pub fn remove(&mut self, id: &str) -> RendexResult<Vec<String>> {
        if id == self.root {
            return Err(RendexError::validation(format!(
                "cannot remove the root layer '{id}'"
            )));
        }
        let removed = self.subtree(id)?;
        let parent = self.entries.get(id).and_then(|e| e.parent.clone());
        if let Some(parent) = parent.and_then(|p| self.entries.get_mut(&p)) {
            parent.children.retain(|c| c != id);
            if parent.mask.as_deref() == Some(id) {
                parent.mask = None;
            }
        }
        for id in &removed {
            self.entries.remove(id);
        }
        Ok(removed)
    }

    /// Rebuild the nested spec of the subtree at `id`.
    pub fn to_spec(&self, id: &str) -> RendexResult<LayerSpec> {
        let order = self.subtree(id)?;
        let mut built: HashMap<&str, LayerSpec> = HashMap::with_capacity(order.len());
        for id in order.iter().rev() {
            let entry = self.entry(id)?;
            let children = entry
                .children
                .iter()
                .filter_map(|c| built.remove(c.as_str()))
                .collect();
            let mask = entry
                .mask
                .as_deref()
                .and_then(|m| built.remove(m))
                .map(Box::new);
            built.insert(
                id.as_str(),
                LayerSpec {
                    layer: entry.layer.clone(),
                    children,
                    mask,
                },
            );
        }
        built
            .remove(id)
            .ok_or_else(|| RendexError::layer_not_found(id))
    }

    /// Validate the whole of `spec` first so a failed insert leaves the store untouched.
    fn insert_tree(&mut self, parent: Option<&str>, spec: &LayerSpec) -> RendexResult<()> {
        let mut seen = HashSet::new();
        let mut stack = vec![spec];
        while let Some(s) = stack.pop() {
            let id = s.layer.id.as_str();
            if self.entries.contains_key(id) || !seen.insert(id) {
                return Err(RendexError::duplicate_layer_id(id));
            }
            admit(&s.layer, !s.children.is_empty(), s.mask.is_some())?;
            stack.extend(s.children.iter());
            stack.extend(s.mask.as_deref());
        }

        let mut stack = vec![(parent.map(str::to_string), spec)];
        while let Some((parent, s)) = stack.pop() {
            let id = s.layer.id.clone();
            for child in &s.children {
                stack.push((Some(id.clone()), child));
            }
            if let Some(mask) = s.mask.as_deref() {
                stack.push((Some(id.clone()), mask));
            }
            self.entries.insert(
                id,
                LayerEntry {
                    layer: s.layer.clone(),
                    parent,
                    children: s.children.iter().map(|c| c.layer.id.clone()).collect(),
                    mask: s.mask.as_ref().map(|m| m.layer.id.clone()),
                },
            );
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/document/store.rs"]
mod tests;
