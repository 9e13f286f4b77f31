use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Please add title or content.")]
    Validation,

    #[error("note not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}
