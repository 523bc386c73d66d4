use thiserror::Error;

use super::{RemapError, ResolutionError};

/// Errors returned by the copy service
#[derive(Error, Debug)]
pub enum CopyError {
    /// Labels did not resolve; nothing was written
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A reference could not be rewritten; the transaction was rolled back
    #[error(transparent)]
    Remap(#[from] RemapError),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A stored JSON column could not be parsed or written
    #[error("Invalid JSON in {column}: {source}")]
    Json {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The connected backend has no sequence maintenance support
    #[error("Unsupported database backend: {0}")]
    Unsupported(String),
}

impl CopyError {
    pub fn json(column: &'static str, source: serde_json::Error) -> Self {
        CopyError::Json { column, source }
    }

    /// Check if this error was raised before any write
    pub fn is_resolution_error(&self) -> bool {
        matches!(self, CopyError::Resolution(_))
    }

    /// Check if this error was raised while rewriting references
    pub fn is_remap_error(&self) -> bool {
        matches!(self, CopyError::Remap(_))
    }
}
