//! Typed layer edits and the invalidation level each one implies.

use crate::document::model::{
    BlendMode, Effect, Fill, FillRule, Layer, LayerKind, MaskBasis, Paint, Shape, Stroke,
    TextStyle,
};
use crate::foundation::core::{Affine, Color, ensure_invertible};
use crate::foundation::error::{RendexError, RendexResult};

/// How much derived state a change invalidates. Levels are ordered; a change implies every level
/// below it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeLevel {
    #[default]
    None,
    /// Metadata only, rendering is unaffected.
    Logical,
    /// Pixels change, the expression graph does not.
    Visual,
    /// Layer geometry or placement changes.
    Bounds,
    /// The expression graph must be reassembled.
    Composition,
    /// The layer tree itself changes.
    Hierarchy,
}

/// Edit of an indexed list (fills, strokes, effects).
#[derive(Clone, Debug, PartialEq)]
pub enum ListEdit<T> {
    Replace { index: usize, value: T },
    /// Insert at `index`, or at the end when `index` is `None`.
    Insert { index: Option<usize>, value: T },
    Remove { index: usize },
}

impl<T> ListEdit<T> {
    fn apply(&self, list: &mut Vec<T>, what: &str) -> RendexResult<()>
    where
        T: Clone,
    {
        let out_of_range = |index: usize, len: usize| {
            RendexError::invalid_index(format!("{what} {index} out of range ({len} present)"))
        };
        match self {
            Self::Replace { index, value } => {
                let len = list.len();
                let slot = list.get_mut(*index).ok_or_else(|| out_of_range(*index, len))?;
                *slot = value.clone();
            }
            Self::Insert { index, value } => {
                let index = index.unwrap_or(list.len());
                if index > list.len() {
                    return Err(out_of_range(index, list.len()));
                }
                list.insert(index, value.clone());
            }
            Self::Remove { index } => {
                if *index >= list.len() {
                    return Err(out_of_range(*index, list.len()));
                }
                list.remove(*index);
            }
        }
        Ok(())
    }
}

/// Property updates; `None` fields are left alone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyChange {
    pub name: Option<String>,
    pub visible: Option<bool>,
    pub opacity: Option<f64>,
    pub blend_mode: Option<BlendMode>,
    pub transform: Option<[f64; 6]>,
    pub feature_scale: Option<f64>,
    /// Shape layers only.
    pub path: Option<String>,
    /// Shape layers only.
    pub fill_rule: Option<FillRule>,
    /// Text layers only.
    pub text: Option<TextStyle>,
    /// Mask groups only.
    pub mask_basis: Option<MaskBasis>,
    /// Mask groups only.
    pub mask_channels: Option<[f64; 5]>,
    pub effects: Option<Vec<Effect>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LayerChange {
    Properties(PropertyChange),
    Fill(ListEdit<Fill>),
    Stroke(ListEdit<Stroke>),
    Effect(ListEdit<Effect>),
    /// Replace the paint of fill `index` with a solid color.
    FillColor { index: usize, color: Color },
}

fn wrong_type(layer: &Layer, what: &str) -> RendexError {
    RendexError::wrong_layer_type(format!(
        "layer '{}' ({}) has no {what}",
        layer.id,
        layer.kind.as_str()
    ))
}

fn shape_of<'a>(layer: &'a mut Layer, what: &str) -> RendexResult<&'a mut Shape> {
    if layer.kind != LayerKind::Shape || layer.shape.is_none() {
        return Err(wrong_type(layer, what));
    }
    layer
        .shape
        .as_mut()
        .ok_or_else(|| RendexError::shape_layer("shape payload missing"))
}

fn apply_properties(layer: &mut Layer, change: &PropertyChange) -> RendexResult<ChangeLevel> {
    let shape_only = change.path.is_some() || change.fill_rule.is_some();
    if shape_only && layer.kind != LayerKind::Shape {
        return Err(wrong_type(layer, "shape"));
    }
    if change.text.is_some() && layer.kind != LayerKind::Text {
        return Err(wrong_type(layer, "text"));
    }
    let mask_only = change.mask_basis.is_some() || change.mask_channels.is_some();
    if mask_only && layer.kind != LayerKind::MaskGroup {
        return Err(wrong_type(layer, "mask"));
    }

    let mut level = ChangeLevel::None;
    let mut raise = |l: ChangeLevel| level = level.max(l);
    if let Some(transform) = change.transform {
        ensure_invertible(Affine::new(transform), "layer transform")?;
        layer.transform = transform;
        raise(ChangeLevel::Bounds);
    }
    if let Some(name) = &change.name {
        layer.name.clone_from(name);
        raise(ChangeLevel::Logical);
    }
    if let Some(visible) = change.visible {
        layer.visible = visible;
        raise(ChangeLevel::Composition);
    }
    if let Some(opacity) = change.opacity {
        layer.opacity = opacity;
        raise(ChangeLevel::Composition);
    }
    if let Some(mode) = change.blend_mode {
        layer.blend_mode = mode;
        raise(ChangeLevel::Composition);
    }
    if let Some(scale) = change.feature_scale {
        layer.feature_scale = Some(scale);
        raise(ChangeLevel::Visual);
    }
    if let Some(path) = &change.path {
        shape_of(layer, "shape")?.path.clone_from(path);
        raise(ChangeLevel::Bounds);
    }
    if let Some(rule) = change.fill_rule {
        shape_of(layer, "shape")?.fill_rule = rule;
        raise(ChangeLevel::Visual);
    }
    if let Some(text) = &change.text {
        layer.text = Some(text.clone());
        raise(ChangeLevel::Bounds);
    }
    if let Some(basis) = change.mask_basis {
        layer.mask_basis = Some(basis);
        raise(ChangeLevel::Composition);
    }
    if let Some(channels) = change.mask_channels {
        layer.mask_channels = Some(channels);
        raise(ChangeLevel::Composition);
    }
    if let Some(effects) = &change.effects {
        layer.effects.clone_from(effects);
        raise(ChangeLevel::Composition);
    }
    Ok(level)
}

/// Apply `change` to `layer`. On error the layer is left unchanged.
pub fn apply_change(layer: &mut Layer, change: &LayerChange) -> RendexResult<ChangeLevel> {
    let mut next = layer.clone();
    let level = match change {
        LayerChange::Properties(props) => apply_properties(&mut next, props)?,
        LayerChange::Fill(edit) => {
            edit.apply(&mut shape_of(&mut next, "fills")?.fills, "fill")?;
            ChangeLevel::Composition
        }
        LayerChange::Stroke(edit) => {
            edit.apply(&mut shape_of(&mut next, "strokes")?.strokes, "stroke")?;
            ChangeLevel::Composition
        }
        LayerChange::Effect(edit) => {
            edit.apply(&mut next.effects, "effect")?;
            ChangeLevel::Composition
        }
        LayerChange::FillColor { index, color } => {
            let fills = &mut shape_of(&mut next, "fills")?.fills;
            let len = fills.len();
            let fill = fills.get_mut(*index).ok_or_else(|| {
                RendexError::invalid_index(format!("fill {index} out of range ({len} present)"))
            })?;
            fill.paint = Paint::Color { color: *color };
            ChangeLevel::Visual
        }
    };
    next.validate()?;
    *layer = next;
    Ok(level)
}

#[cfg(test)]
#[path = "../../tests/unit/document/change.rs"]
mod tests;
