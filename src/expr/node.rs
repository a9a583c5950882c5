use crate::document::model::{BlendMode, Filter};
use crate::foundation::core::{Affine, ChannelMatrix};
use smallvec::SmallVec;
use std::rc::Rc;

/// Index of a node inside its [`crate::expr::graph::ExprGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Nullable node handle; `None` is the empty image.
pub type Expr = Option<NodeId>;

/// A layer as seen from a particular place in the layer tree.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerRef {
    pub id: String,
    /// Composed transformation of all ancestors.
    pub parent_transform: Affine,
    /// Composed feature scale of all ancestors.
    pub parent_feature_scale: f64,
}

impl LayerRef {
    pub fn new(id: impl Into<String>, parent_transform: Affine, parent_feature_scale: f64) -> Rc<Self> {
        Rc::new(Self {
            id: id.into(),
            parent_transform,
            parent_feature_scale,
        })
    }

    pub fn root(id: impl Into<String>) -> Rc<Self> {
        Self::new(id, Affine::IDENTITY, 1.0)
    }
}

/// Hints inherited from children.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NodeFlags(u8);

impl NodeFlags {
    pub const NONE: Self = Self(0);
    /// Result depends on an enclosing background context.
    pub const BACKGROUND_DEPENDENT: Self = Self(0x01);
    /// Subtree contains a layer opacity that is only known at render time.
    pub const ANIMATED_OPACITY: Self = Self(0x02);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

/// Closed set of render-expression operations.
#[derive(Clone, Debug)]
pub enum NodeKind {
    /// Dimensionless empty image.
    Empty,
    /// Relays its content; used where a stable slot is needed before the content is known.
    Identity { content: NodeId },
    Blend {
        dst: NodeId,
        src: NodeId,
        mode: BlendMode,
    },
    /// Blend that treats `src` as opaque; its alpha is applied elsewhere in the graph.
    BlendIgnoreAlpha {
        dst: NodeId,
        src: NodeId,
        mode: BlendMode,
    },
    /// Multiply `image` alpha by the channel-weighted `mask`.
    Mask {
        image: NodeId,
        mask: NodeId,
        channels: ChannelMatrix,
    },
    /// Weighted average of `dst` and `src`, weighted by the channel-weighted `mask`.
    MixMask {
        dst: NodeId,
        src: NodeId,
        mask: NodeId,
        channels: ChannelMatrix,
    },
    Mix { a: NodeId, b: NodeId, ratio: f64 },
    MultiplyAlpha { image: NodeId, multiplier: f64 },
    DrawLayerBody { layer: Rc<LayerRef> },
    DrawLayerStroke { layer: Rc<LayerRef>, index: usize },
    DrawLayerFill { layer: Rc<LayerRef>, index: usize },
    DrawLayerStrokeFill { layer: Rc<LayerRef>, index: usize },
    DrawLayerText { layer: Rc<LayerRef> },
    /// The layer's `index`-th effect applied to `basis`.
    DrawLayerEffect {
        basis: Option<NodeId>,
        layer: Rc<LayerRef>,
        index: usize,
        /// Effect draws on its own without a basis (overlay fills).
        standalone: bool,
    },
    ApplyFilter { basis: NodeId, filter: Filter },
    /// Whatever the nearest enclosing `SetBackground` established.
    Background,
    /// Binds `background` for the `Background` nodes inside `content`; `None` unbinds.
    SetBackground {
        content: NodeId,
        background: Option<NodeId>,
    },
    /// Weighted average of `a` and `b` by the layer's render-time opacity.
    MixLayerOpacity {
        layer: Rc<LayerRef>,
        a: Option<NodeId>,
        b: Option<NodeId>,
    },
}

/// Operand position inside a node, in visiting order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    Content,
    Dst,
    Src,
    Image,
    Mask,
    A,
    B,
    Basis,
    Background,
}

impl Operand {
    pub fn name(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Dst => "dst",
            Self::Src => "src",
            Self::Image => "image",
            Self::Mask => "mask",
            Self::A => "a",
            Self::B => "b",
            Self::Basis => "basis",
            Self::Background => "background",
        }
    }
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::Identity { .. } => "Identity",
            Self::Blend { .. } => "Blend",
            Self::BlendIgnoreAlpha { .. } => "BlendIgnoreAlpha",
            Self::Mask { .. } => "Mask",
            Self::MixMask { .. } => "MixMask",
            Self::Mix { .. } => "Mix",
            Self::MultiplyAlpha { .. } => "MultiplyAlpha",
            Self::DrawLayerBody { .. } => "LayerBody",
            Self::DrawLayerStroke { .. } => "LayerStroke",
            Self::DrawLayerFill { .. } => "LayerFill",
            Self::DrawLayerStrokeFill { .. } => "LayerStrokeFill",
            Self::DrawLayerText { .. } => "LayerText",
            Self::DrawLayerEffect { .. } => "LayerEffect",
            Self::ApplyFilter { .. } => "ApplyFilter",
            Self::Background => "Background",
            Self::SetBackground { .. } => "SetBackground",
            Self::MixLayerOpacity { .. } => "MixLayerOpacity",
        }
    }

    /// Child slots in visiting order. A `None` child is a null operand.
    pub fn operands(&self) -> SmallVec<[(Operand, Expr); 3]> {
        let mut out = SmallVec::new();
        match self {
            Self::Empty
            | Self::Background
            | Self::DrawLayerBody { .. }
            | Self::DrawLayerStroke { .. }
            | Self::DrawLayerFill { .. }
            | Self::DrawLayerStrokeFill { .. }
            | Self::DrawLayerText { .. } => {}
            Self::Identity { content } => out.push((Operand::Content, Some(*content))),
            Self::Blend { dst, src, .. } | Self::BlendIgnoreAlpha { dst, src, .. } => {
                out.push((Operand::Dst, Some(*dst)));
                out.push((Operand::Src, Some(*src)));
            }
            Self::Mask { image, mask, .. } => {
                out.push((Operand::Image, Some(*image)));
                out.push((Operand::Mask, Some(*mask)));
            }
            Self::MixMask { dst, src, mask, .. } => {
                out.push((Operand::Dst, Some(*dst)));
                out.push((Operand::Src, Some(*src)));
                out.push((Operand::Mask, Some(*mask)));
            }
            Self::Mix { a, b, .. } => {
                out.push((Operand::A, Some(*a)));
                out.push((Operand::B, Some(*b)));
            }
            Self::MultiplyAlpha { image, .. } => out.push((Operand::Image, Some(*image))),
            Self::DrawLayerEffect { basis, .. } => out.push((Operand::Basis, *basis)),
            Self::ApplyFilter { basis, .. } => out.push((Operand::Basis, Some(*basis))),
            Self::SetBackground {
                content,
                background,
            } => {
                out.push((Operand::Content, Some(*content)));
                out.push((Operand::Background, *background));
            }
            Self::MixLayerOpacity { a, b, .. } => {
                out.push((Operand::A, *a));
                out.push((Operand::B, *b));
            }
        }
        out
    }

    /// Non-null children, one entry per edge.
    pub fn children(&self) -> SmallVec<[NodeId; 3]> {
        self.operands().into_iter().filter_map(|(_, c)| c).collect()
    }

    pub fn layer(&self) -> Option<&Rc<LayerRef>> {
        match self {
            Self::DrawLayerBody { layer }
            | Self::DrawLayerStroke { layer, .. }
            | Self::DrawLayerFill { layer, .. }
            | Self::DrawLayerStrokeFill { layer, .. }
            | Self::DrawLayerText { layer }
            | Self::DrawLayerEffect { layer, .. }
            | Self::MixLayerOpacity { layer, .. } => Some(layer),
            _ => None,
        }
    }

    pub fn is_background(&self) -> bool {
        matches!(self, Self::Background)
    }
}

/// Arena entry.
#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    /// Number of (parent, slot) edges pointing at this node. Counts edges, not owners: the
    /// interpreter evicts a memoized result once this many consumers have read it.
    pub refs: u32,
    pub flags: NodeFlags,
    pub(crate) parents: SmallVec<[NodeId; 2]>,
}

impl Node {
    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }
}
