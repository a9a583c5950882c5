pub type RendexResult<T> = Result<T, RendexError>;

#[derive(thiserror::Error, Debug)]
pub enum RendexError {
    #[error("layer not found: {0}")]
    LayerNotFound(String),

    #[error("wrong layer type: {0}")]
    WrongLayerType(String),

    #[error("shape layer error: {0}")]
    ShapeLayerError(String),

    #[error("text layer error: {0}")]
    TextLayerError(String),

    #[error("singular transformation: {0}")]
    SingularTransformation(String),

    #[error("duplicate layer id: {0}")]
    DuplicateLayerId(String),

    #[error("invalid index: {0}")]
    InvalidIndex(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RendexError {
    pub fn layer_not_found(id: impl Into<String>) -> Self {
        Self::LayerNotFound(id.into())
    }

    pub fn wrong_layer_type(msg: impl Into<String>) -> Self {
        Self::WrongLayerType(msg.into())
    }

    pub fn shape_layer(msg: impl Into<String>) -> Self {
        Self::ShapeLayerError(msg.into())
    }

    pub fn text_layer(msg: impl Into<String>) -> Self {
        Self::TextLayerError(msg.into())
    }

    pub fn singular_transformation(msg: impl Into<String>) -> Self {
        Self::SingularTransformation(msg.into())
    }

    pub fn duplicate_layer_id(id: impl Into<String>) -> Self {
        Self::DuplicateLayerId(id.into())
    }

    pub fn invalid_index(msg: impl Into<String>) -> Self {
        Self::InvalidIndex(msg.into())
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Self::NotImplemented(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}
