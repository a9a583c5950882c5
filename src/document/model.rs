//! Serializable design document model.
//!
//! The JSON shape is this crate's own. A [`Document`] is a tree of [`LayerSpec`]s; once loaded
//! into a [`crate::Component`] the tree is flattened into a [`crate::document::store::LayerStore`].

use crate::animation::anim::DocumentAnimation;
use crate::foundation::core::{Affine, ChannelMatrix, Color};
use crate::foundation::error::{RendexError, RendexResult};
use serde::{Deserialize, Serialize};

fn yes() -> bool {
    true
}

fn one() -> f64 {
    1.0
}

fn identity() -> [f64; 6] {
    [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Normal,
    /// Group-only: children blend straight into the group's background.
    PassThrough,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    LinearDodge,
    LinearBurn,
    SoftLight,
    HardLight,
    Difference,
    Exclusion,
}

impl BlendMode {
    /// Blend mode usable by a compositing operator.
    pub fn or_normal(self) -> Self {
        if self == Self::PassThrough {
            Self::Normal
        } else {
            self
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::PassThrough => "pass_through",
            Self::Multiply => "multiply",
            Self::Screen => "screen",
            Self::Overlay => "overlay",
            Self::Darken => "darken",
            Self::Lighten => "lighten",
            Self::ColorDodge => "color_dodge",
            Self::ColorBurn => "color_burn",
            Self::LinearDodge => "linear_dodge",
            Self::LinearBurn => "linear_burn",
            Self::SoftLight => "soft_light",
            Self::HardLight => "hard_light",
            Self::Difference => "difference",
            Self::Exclusion => "exclusion",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Shape,
    Text,
    Group,
    MaskGroup,
}

impl LayerKind {
    pub fn is_group(self) -> bool {
        matches!(self, Self::Group | Self::MaskGroup)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shape => "shape",
            Self::Text => "text",
            Self::Group => "group",
            Self::MaskGroup => "mask_group",
        }
    }
}

/// Which derived render an effect consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectBasis {
    #[default]
    Body,
    BodyAndStrokes,
    Fill,
    LayerAndEffects,
    Background,
}

/// How a mask layer's render gates its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskBasis {
    Solid,
    Body,
    BodyEmbed,
    Fill,
    FillEmbed,
    LayerAndEffects,
}

impl MaskBasis {
    /// Masked content is spliced into the mask layer's own composition.
    pub fn is_embedded(self) -> bool {
        matches!(self, Self::BodyEmbed | Self::FillEmbed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokePosition {
    Inside,
    #[default]
    Center,
    Outside,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default = "yes")]
    pub visible: bool,
    #[serde(flatten)]
    pub kind: FilterKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterKind {
    OpacityMultiplier {
        #[serde(default = "one")]
        opacity: f64,
    },
    /// Row-major 4x5 matrix over straight RGBA, last column is the bias.
    ColorMatrix { matrix: [f64; 20] },
}

impl Filter {
    pub fn opacity(opacity: f64) -> Self {
        Self {
            visible: true,
            kind: FilterKind::OpacityMultiplier { opacity },
        }
    }

    pub fn color_matrix(matrix: [f64; 20]) -> Self {
        Self {
            visible: true,
            kind: FilterKind::ColorMatrix { matrix },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientKind {
    #[default]
    Linear,
    Radial,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    pub position: f64,
    pub color: Color,
}

/// Gradient in layer coordinates. For radial gradients `start` is the center and the distance
/// to `end` is the radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gradient {
    #[serde(default)]
    pub kind: GradientKind,
    pub start: [f64; 2],
    pub end: [f64; 2],
    pub stops: Vec<GradientStop>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub asset: String,
    /// Placement `[x0, y0, x1, y1]` in layer coordinates; defaults to the layer's bounds.
    #[serde(default)]
    pub rect: Option<[f64; 4]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Paint {
    Color { color: Color },
    Gradient { gradient: Gradient },
    Image { image: ImageRef },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    #[serde(default = "yes")]
    pub visible: bool,
    #[serde(default)]
    pub blend_mode: BlendMode,
    pub paint: Paint,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl Fill {
    pub fn color(color: Color) -> Self {
        Self {
            visible: true,
            blend_mode: BlendMode::Normal,
            paint: Paint::Color { color },
            filters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    #[serde(default = "yes")]
    pub visible: bool,
    #[serde(default)]
    pub position: StrokePosition,
    pub thickness: f64,
    pub fill: Fill,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    /// SVG path data in layer coordinates.
    pub path: String,
    #[serde(default)]
    pub fill_rule: FillRule,
    #[serde(default)]
    pub fills: Vec<Fill>,
    #[serde(default)]
    pub strokes: Vec<Stroke>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub content: String,
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default = "default_font_size")]
    pub size: f64,
    #[serde(default = "default_text_color")]
    pub color: Color,
}

fn default_font_size() -> f64 {
    12.0
}

fn default_text_color() -> Color {
    Color::BLACK
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shadow {
    #[serde(default)]
    pub offset: [f64; 2],
    #[serde(default)]
    pub blur: f64,
    #[serde(default)]
    pub choke: f64,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glow {
    #[serde(default)]
    pub blur: f64,
    #[serde(default)]
    pub choke: f64,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectKind {
    Overlay { overlay: Fill },
    Stroke { stroke: Stroke },
    DropShadow { shadow: Shadow },
    InnerShadow { shadow: Shadow },
    OuterGlow { glow: Glow },
    InnerGlow { glow: Glow },
    GaussianBlur { blur: f64 },
    BoundedBlur { blur: f64 },
    Blur { blur: f64 },
    Other,
}

impl EffectKind {
    pub fn is_blur(&self) -> bool {
        matches!(
            self,
            Self::GaussianBlur { .. } | Self::BoundedBlur { .. } | Self::Blur { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Overlay { .. } => "overlay",
            Self::Stroke { .. } => "stroke",
            Self::DropShadow { .. } => "drop_shadow",
            Self::InnerShadow { .. } => "inner_shadow",
            Self::OuterGlow { .. } => "outer_glow",
            Self::InnerGlow { .. } => "inner_glow",
            Self::GaussianBlur { .. } => "gaussian_blur",
            Self::BoundedBlur { .. } => "bounded_blur",
            Self::Blur { .. } => "blur",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    #[serde(default = "yes")]
    pub visible: bool,
    #[serde(default)]
    pub basis: EffectBasis,
    #[serde(default)]
    pub blend_mode: BlendMode,
    #[serde(flatten)]
    pub kind: EffectKind,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl Effect {
    pub fn new(basis: EffectBasis, kind: EffectKind) -> Self {
        Self {
            visible: true,
            basis,
            blend_mode: BlendMode::Normal,
            kind,
            filters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    #[serde(default = "yes")]
    pub visible: bool,
    #[serde(default = "one")]
    pub opacity: f64,
    #[serde(default)]
    pub blend_mode: BlendMode,
    /// Affine coefficients `[a, b, c, d, e, f]` relative to the parent.
    #[serde(default = "identity")]
    pub transform: [f64; 6],
    #[serde(default)]
    pub feature_scale: Option<f64>,
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub shape: Option<Shape>,
    #[serde(default)]
    pub text: Option<TextStyle>,
    /// Mask groups only.
    #[serde(default)]
    pub mask_basis: Option<MaskBasis>,
    #[serde(default)]
    pub mask_channels: Option<[f64; 5]>,
}

impl Layer {
    pub fn new(id: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            kind,
            visible: true,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            transform: identity(),
            feature_scale: None,
            effects: Vec::new(),
            shape: None,
            text: None,
            mask_basis: None,
            mask_channels: None,
        }
    }

    pub fn shape(id: impl Into<String>, shape: Shape) -> Self {
        Self {
            shape: Some(shape),
            ..Self::new(id, LayerKind::Shape)
        }
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self::new(id, LayerKind::Group)
    }

    pub fn affine(&self) -> Affine {
        Affine::new(self.transform)
    }

    pub fn mask_channel_matrix(&self) -> ChannelMatrix {
        self.mask_channels.map(ChannelMatrix).unwrap_or_default()
    }

    /// Check that the payload matches the layer kind.
    pub fn validate(&self) -> RendexResult<()> {
        let fail = |what: &str| -> RendexResult<()> {
            Err(RendexError::wrong_layer_type(format!(
                "layer '{}' ({}) {what}",
                self.id,
                self.kind.as_str()
            )))
        };
        if self.id.is_empty() {
            return Err(RendexError::validation("layer id must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(RendexError::validation(format!(
                "layer '{}' opacity must be in [0, 1]",
                self.id
            )));
        }
        match self.kind {
            LayerKind::Shape if self.shape.is_none() => fail("is missing its shape"),
            LayerKind::Text if self.text.is_none() => fail("is missing its text"),
            LayerKind::Shape | LayerKind::Text | LayerKind::Group
                if self.mask_basis.is_some() =>
            {
                fail("cannot carry a mask basis")
            }
            _ => Ok(()),
        }
    }
}

/// A layer together with its subtree, as written in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    #[serde(flatten)]
    pub layer: Layer,
    #[serde(default)]
    pub children: Vec<LayerSpec>,
    /// Mask groups only.
    #[serde(default)]
    pub mask: Option<Box<LayerSpec>>,
}

impl LayerSpec {
    pub fn leaf(layer: Layer) -> Self {
        Self {
            layer,
            children: Vec::new(),
            mask: None,
        }
    }

    pub fn group(layer: Layer, children: Vec<LayerSpec>) -> Self {
        Self {
            layer,
            children,
            mask: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
    pub root: LayerSpec,
    #[serde(default)]
    pub animations: DocumentAnimation,
}

impl Document {
    pub fn from_json(json: &str) -> RendexResult<Self> {
        serde_json::from_str(json).map_err(|e| RendexError::serde(e.to_string()))
    }

    pub fn to_json(&self) -> RendexResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| RendexError::serde(e.to_string()))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/document/model.rs"]
mod tests;
