use thiserror::Error;

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::promote::Stage;

#[derive(Debug, Error)]
pub enum PromoteError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to stage credentials: {0}")]
    Credentials(#[from] std::io::Error),
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("{operation} failed (stage: {stage}): {error:#}")]
    Remote {
        stage: Stage,
        operation: &'static str,
        error: anyhow::Error,
    },
    /// Commit returned successfully but without an edit id.
    #[error("Error {status}: {status_text}")]
    CommitUnconfirmed { status: u16, status_text: String },
}

impl PromoteError {
    /// Last state reached before the failure, when a remote call was involved.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PromoteError::Remote { stage, .. } => Some(*stage),
            PromoteError::CommitUnconfirmed { .. } => Some(Stage::DestinationStaged),
            _ => None,
        }
    }
}
