pub type NarrateResult<T> = Result<T, NarrateError>;

/// Error taxonomy for a narration run.
///
/// `Synthesis` and `Render` abort a run. `Resource` is only ever produced during cleanup and is
/// logged, never returned from [`crate::NarrationPipeline::run`].
#[derive(thiserror::Error, Debug)]
pub enum NarrateError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("segmentation error: {0}")]
    Segmentation(String),

    #[error("synthesis error: {0}")]
    Synthesis(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("resource error: {0}")]
    Resource(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl NarrateError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn segmentation(msg: impl Into<String>) -> Self {
        Self::Segmentation(msg.into())
    }

    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }
}
