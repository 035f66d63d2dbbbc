use thiserror::Error;

pub type Result<T> = std::result::Result<T, GeneratorError>;

/// Errors returned by short code generation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl From<GeneratorError> for linkwatch_core::ShortenerError {
    fn from(value: GeneratorError) -> Self {
        match value {
            GeneratorError::InvalidUrl { url, reason } => {
                Self::InvalidUrl(format!("{url}: {reason}"))
            }
        }
    }
}
