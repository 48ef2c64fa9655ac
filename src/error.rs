use thiserror::Error;

/// Error taxonomy for the analysis and compositing workflows.
///
/// Every failure that reaches a client is collapsed to its display string;
/// structured variants exist so the orchestration layer can branch on the
/// failure class without string matching.
#[derive(Debug, Error)]
pub enum AppError {
    /// A precondition was not met. Surfaced verbatim, never transitions the
    /// session.
    #[error("{0}")]
    Validation(String),

    /// A remote model call failed or returned an unusable payload.
    #[error("{0}")]
    RemoteCall(String),

    /// The image model answered with text instead of an image and the text
    /// reads as a refusal. The message quotes the model's own words.
    #[error("{0}")]
    ContentRefusal(String),

    /// A required collage image source could not be loaded. Fatal to the
    /// whole composite.
    #[error("Failed to load image from {src}: {reason}")]
    ImageLoad { src: String, reason: String },

    /// Unexpected internal condition (e.g. PNG encoding).
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn remote(message: impl Into<String>) -> Self {
        AppError::RemoteCall(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}
