use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::ingredients::repo::IngredientRepo;
use crate::meals::repo::MealRepo;
use crate::menu::repo::MenuRepo;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// A unique constraint rejected the write; carries the offending column.
    #[error("unique constraint violated on {0}")]
    Conflict(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db) = e.as_database_error() {
            if db.is_unique_violation() {
                let what = match db.constraint() {
                    Some(c) if c.starts_with("meal_title") => "title",
                    Some(c) => c,
                    None => "unique value",
                };
                return RepoError::Conflict(what.to_string());
            }
        }
        RepoError::Other(e.into())
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Everything the core needs from relational storage.
pub trait Repository: MealRepo + IngredientRepo + MenuRepo + Send + Sync {}

impl<T> Repository for T where T: MealRepo + IngredientRepo + MenuRepo + Send + Sync {}

#[derive(Clone)]
pub struct PgRepo {
    pub(crate) db: PgPool,
}

impl PgRepo {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;

        // Run migrations if present
        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }
        Ok(Self { db })
    }
}
