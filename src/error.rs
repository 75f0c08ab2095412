use std::path::PathBuf;

use axum::http::StatusCode;

use crate::db::RepoError;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("invalid asset: {0}")]
    Invalid(String),

    #[error("asset io failed for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("thumbnail failed for {}: {reason}", .path.display())]
    Thumbnail { path: PathBuf, reason: String },

    #[error("publish failed: {0}")]
    Publish(String),
}

impl AssetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MealError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("duplicated ingredients submitted")]
    DuplicateIngredients { details: Vec<String> },

    #[error("meal {0} not found")]
    NotFound(i64),

    #[error(transparent)]
    Repository(anyhow::Error),
}

impl From<RepoError> for MealError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Conflict(what) => MealError::Validation(format!("{what} has already been taken")),
            RepoError::Other(e) => MealError::Repository(e),
        }
    }
}

impl MealError {
    pub fn status(&self) -> StatusCode {
        match self {
            MealError::Validation(_) | MealError::DuplicateIngredients { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            MealError::NotFound(_) => StatusCode::NOT_FOUND,
            MealError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Human-readable message, including per-entry details for duplicates.
    pub fn message(&self) -> String {
        match self {
            MealError::DuplicateIngredients { details } if !details.is_empty() => {
                format!("{self}: {}", details.join("; "))
            }
            _ => self.to_string(),
        }
    }
}
