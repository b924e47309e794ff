use thiserror::Error;

/// Errors raised by tensor construction, layer wiring and training.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetError {
    /// Tensor or matrix shapes disagree with a declared size.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Invalid construction or call parameters.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Cost-function input outside its valid domain.
    #[error("domain error: {0}")]
    Domain(String),
}

pub type Result<T> = std::result::Result<T, NetError>;
