use crate::document::model::{EffectBasis, MaskBasis};
use crate::expr::node::Expr;

/// Derived renders of a layer that effects and masks can consume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Facet {
    /// No facet; a solid mask needs no render.
    Solid,
    Body,
    BodyAndStrokes,
    Fill,
    LayerAndEffects,
    Background,
}

impl Facet {
    pub const COUNT: usize = 6;

    pub fn index(self) -> usize {
        match self {
            Self::Solid => 0,
            Self::Body => 1,
            Self::BodyAndStrokes => 2,
            Self::Fill => 3,
            Self::LayerAndEffects => 4,
            Self::Background => 5,
        }
    }
}

impl From<EffectBasis> for Facet {
    fn from(basis: EffectBasis) -> Self {
        match basis {
            EffectBasis::Body => Self::Body,
            EffectBasis::BodyAndStrokes => Self::BodyAndStrokes,
            EffectBasis::Fill => Self::Fill,
            EffectBasis::LayerAndEffects => Self::LayerAndEffects,
            EffectBasis::Background => Self::Background,
        }
    }
}

impl From<MaskBasis> for Facet {
    fn from(basis: MaskBasis) -> Self {
        match basis {
            MaskBasis::Solid => Self::Solid,
            MaskBasis::Body | MaskBasis::BodyEmbed => Self::Body,
            MaskBasis::Fill | MaskBasis::FillEmbed => Self::Fill,
            MaskBasis::LayerAndEffects => Self::LayerAndEffects,
        }
    }
}

/// Per-layer record of requested and produced facets.
///
/// Requests may arrive before the facet's node exists. A facet that is never set reads as null;
/// a facet set to null counts as provided.
#[derive(Clone, Debug, Default)]
pub struct Facets {
    requested: [bool; Facet::COUNT],
    provided: [bool; Facet::COUNT],
    nodes: [Expr; Facet::COUNT],
}

impl Facets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, facet: impl Into<Facet>) {
        self.requested[facet.into().index()] = true;
    }

    pub fn is_requested(&self, facet: Facet) -> bool {
        self.requested[facet.index()]
    }

    pub fn set(&mut self, facet: Facet, node: Expr) {
        self.provided[facet.index()] = true;
        self.nodes[facet.index()] = node;
    }

    pub fn get(&self, facet: impl Into<Facet>) -> Expr {
        self.nodes[facet.into().index()]
    }

    /// Every requested facet has been provided. Solid and background requests are served
    /// without a render of the layer itself.
    pub fn finished(&self) -> bool {
        (0..Facet::COUNT)
            .filter(|&i| i != Facet::Solid.index() && i != Facet::Background.index())
            .all(|i| !self.requested[i] || self.provided[i])
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assembly/facets.rs"]
mod tests;
