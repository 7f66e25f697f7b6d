use shared::{domain::ReminderId, error::ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reminder {0} not found")]
    NotFound(ReminderId),
    #[error("reminder {0} already exists")]
    Duplicate(ReminderId),
    #[error("invalid reminder: {0}")]
    Validation(#[from] ValidationError),
    #[error("media store failed for reminder {reminder_id}: {source}")]
    Media {
        reminder_id: ReminderId,
        source: anyhow::Error,
    },
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("invalid profile: {0}")]
    Validation(#[from] ValidationError),
    #[error("failed to persist profile: {source}")]
    Persistence { source: anyhow::Error },
}
