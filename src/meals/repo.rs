use anyhow::Context;
use async_trait::async_trait;

use super::repo_types::{Meal, MealFields};
use crate::db::{PgRepo, RepoResult};

#[async_trait]
pub trait MealRepo: Send + Sync {
    async fn find_meal(&self, meal_id: i64) -> RepoResult<Option<Meal>>;
    /// Whether another meal (other than `except`) already uses `title`.
    async fn title_taken(&self, title: &str, except: Option<i64>) -> RepoResult<bool>;
    async fn insert_meal(&self, fields: &MealFields) -> RepoResult<Meal>;
    async fn update_meal(&self, meal: &Meal) -> RepoResult<()>;
    async fn delete_meal(&self, meal_id: i64) -> RepoResult<u64>;
}

const MEAL_COLUMNS: &str = "meal_id, title, recipe_caption, description, recipe, recipe_url, type, image, thumbnail";

#[async_trait]
impl MealRepo for PgRepo {
    async fn find_meal(&self, meal_id: i64) -> RepoResult<Option<Meal>> {
        let meal = sqlx::query_as::<_, Meal>(&format!(
            "SELECT {MEAL_COLUMNS} FROM meal WHERE meal_id = $1"
        ))
        .bind(meal_id)
        .fetch_optional(&self.db)
        .await
        .context("find meal")?;
        Ok(meal)
    }

    async fn title_taken(&self, title: &str, except: Option<i64>) -> RepoResult<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM meal
                 WHERE title = $1
                   AND ($2::BIGINT IS NULL OR meal_id <> $2)
            )
            "#,
        )
        .bind(title)
        .bind(except)
        .fetch_one(&self.db)
        .await
        .context("check meal title")?;
        Ok(taken)
    }

    async fn insert_meal(&self, fields: &MealFields) -> RepoResult<Meal> {
        let meal = sqlx::query_as::<_, Meal>(&format!(
            r#"
            INSERT INTO meal (title, recipe_caption, description, recipe, type)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {MEAL_COLUMNS}
            "#
        ))
        .bind(&fields.title)
        .bind(&fields.recipe_caption)
        .bind(&fields.description)
        .bind(&fields.recipe)
        .bind(fields.meal_type.as_str())
        .fetch_one(&self.db)
        .await?;
        Ok(meal)
    }

    async fn update_meal(&self, meal: &Meal) -> RepoResult<()> {
        sqlx::query(
            r#"
            UPDATE meal
               SET title = $2, recipe_caption = $3, description = $4, recipe = $5,
                   recipe_url = $6, type = $7, image = $8, thumbnail = $9
             WHERE meal_id = $1
            "#,
        )
        .bind(meal.meal_id)
        .bind(&meal.title)
        .bind(&meal.recipe_caption)
        .bind(&meal.description)
        .bind(&meal.recipe)
        .bind(&meal.recipe_url)
        .bind(meal.meal_type.as_str())
        .bind(&meal.image)
        .bind(&meal.thumbnail)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn delete_meal(&self, meal_id: i64) -> RepoResult<u64> {
        let res = sqlx::query("DELETE FROM meal WHERE meal_id = $1")
            .bind(meal_id)
            .execute(&self.db)
            .await
            .context("delete meal")?;
        Ok(res.rows_affected())
    }
}
