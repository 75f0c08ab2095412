use anyhow::Context;
use async_trait::async_trait;

use super::repo_types::{AlternativeLine, AlternativeMealIngredient, IngredientLine, MealIngredient};
use crate::db::{PgRepo, RepoResult};

#[async_trait]
pub trait IngredientRepo: Send + Sync {
    /// Subset of `titles` already stored as ingredient titles.
    async fn existing_titles(&self, titles: &[String]) -> RepoResult<Vec<String>>;
    /// Id of the ingredient titled `title`, creating it when missing.
    async fn find_or_create_ingredient(&self, title: &str) -> RepoResult<i64>;
    /// Swaps the meal's ingredient rows for `rows`, all or nothing.
    async fn replace_meal_ingredients(&self, meal_id: i64, rows: &[MealIngredient]) -> RepoResult<()>;
    async fn delete_meal_ingredients(&self, meal_id: i64) -> RepoResult<u64>;
    async fn delete_meal_ingredient(&self, meal_id: i64, ingredient_id: i64) -> RepoResult<u64>;
    async fn insert_alternatives(&self, rows: &[AlternativeMealIngredient]) -> RepoResult<()>;
    async fn delete_alternatives(&self, meal_id: i64) -> RepoResult<u64>;
    async fn delete_alternatives_for_default(&self, meal_id: i64, ingredient_id: i64) -> RepoResult<u64>;
    async fn ingredient_lines(&self, meal_id: i64) -> RepoResult<Vec<IngredientLine>>;
    async fn alternative_lines(&self, meal_id: i64) -> RepoResult<Vec<AlternativeLine>>;
}

#[async_trait]
impl IngredientRepo for PgRepo {
    async fn existing_titles(&self, titles: &[String]) -> RepoResult<Vec<String>> {
        if titles.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT title FROM ingredient WHERE title = ANY($1) ORDER BY title",
        )
        .bind(titles)
        .fetch_all(&self.db)
        .await
        .context("existing ingredient titles")?;
        Ok(rows)
    }

    async fn find_or_create_ingredient(&self, title: &str) -> RepoResult<i64> {
        // The no-op update makes RETURNING yield the id on conflict too.
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO ingredient (title)
            VALUES ($1)
            ON CONFLICT (title) DO UPDATE SET title = EXCLUDED.title
            RETURNING ingredient_id
            "#,
        )
        .bind(title)
        .fetch_one(&self.db)
        .await
        .context("find or create ingredient")?;
        Ok(id)
    }

    async fn replace_meal_ingredients(&self, meal_id: i64, rows: &[MealIngredient]) -> RepoResult<()> {
        let ids: Vec<i64> = rows.iter().map(|r| r.ingredient_id).collect();
        let portions: Vec<String> = rows.iter().map(|r| r.portion.clone()).collect();

        let mut tx = self.db.begin().await.context("begin tx")?;
        sqlx::query("DELETE FROM meal_ingredient WHERE meal_id = $1")
            .bind(meal_id)
            .execute(&mut *tx)
            .await
            .context("clear meal ingredients")?;
        if !ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO meal_ingredient (meal_id, ingredient_id, portion)
                SELECT $1, ingredient_id, portion
                  FROM UNNEST($2::BIGINT[], $3::TEXT[]) AS t (ingredient_id, portion)
                "#,
            )
            .bind(meal_id)
            .bind(&ids)
            .bind(&portions)
            .execute(&mut *tx)
            .await
            .context("insert meal ingredients")?;
        }
        tx.commit().await.context("commit tx")?;
        Ok(())
    }

    async fn delete_meal_ingredients(&self, meal_id: i64) -> RepoResult<u64> {
        let res = sqlx::query("DELETE FROM meal_ingredient WHERE meal_id = $1")
            .bind(meal_id)
            .execute(&self.db)
            .await
            .context("delete meal ingredients")?;
        Ok(res.rows_affected())
    }

    async fn delete_meal_ingredient(&self, meal_id: i64, ingredient_id: i64) -> RepoResult<u64> {
        let res = sqlx::query("DELETE FROM meal_ingredient WHERE meal_id = $1 AND ingredient_id = $2")
            .bind(meal_id)
            .bind(ingredient_id)
            .execute(&self.db)
            .await
            .context("delete meal ingredient")?;
        Ok(res.rows_affected())
    }

    async fn insert_alternatives(&self, rows: &[AlternativeMealIngredient]) -> RepoResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let meal_ids: Vec<i64> = rows.iter().map(|r| r.meal_id).collect();
        let default_ids: Vec<i64> = rows.iter().map(|r| r.default_ing_id).collect();
        let texts: Vec<String> = rows.iter().map(|r| r.alternative_ingredients.clone()).collect();
        sqlx::query(
            r#"
            INSERT INTO alternative_meal_ingredients (meal_id, default_ing_id, alternative_ingredients)
            SELECT * FROM UNNEST($1::BIGINT[], $2::BIGINT[], $3::TEXT[])
            "#,
        )
        .bind(&meal_ids)
        .bind(&default_ids)
        .bind(&texts)
        .execute(&self.db)
        .await
        .context("insert alternative ingredients")?;
        Ok(())
    }

    async fn delete_alternatives(&self, meal_id: i64) -> RepoResult<u64> {
        let res = sqlx::query("DELETE FROM alternative_meal_ingredients WHERE meal_id = $1")
            .bind(meal_id)
            .execute(&self.db)
            .await
            .context("delete alternative ingredients")?;
        Ok(res.rows_affected())
    }

    async fn delete_alternatives_for_default(&self, meal_id: i64, ingredient_id: i64) -> RepoResult<u64> {
        let res = sqlx::query(
            "DELETE FROM alternative_meal_ingredients WHERE meal_id = $1 AND default_ing_id = $2",
        )
        .bind(meal_id)
        .bind(ingredient_id)
        .execute(&self.db)
        .await
        .context("delete alternatives for default ingredient")?;
        Ok(res.rows_affected())
    }

    async fn ingredient_lines(&self, meal_id: i64) -> RepoResult<Vec<IngredientLine>> {
        let rows = sqlx::query_as::<_, IngredientLine>(
            r#"
            SELECT i.ingredient_id, i.title, mi.portion
              FROM meal_ingredient mi
              JOIN ingredient i ON i.ingredient_id = mi.ingredient_id
             WHERE mi.meal_id = $1
            "#,
        )
        .bind(meal_id)
        .fetch_all(&self.db)
        .await
        .context("list ingredient lines")?;
        Ok(rows)
    }

    async fn alternative_lines(&self, meal_id: i64) -> RepoResult<Vec<AlternativeLine>> {
        let rows = sqlx::query_as::<_, AlternativeLine>(
            r#"
            SELECT a.default_ing_id, i.title AS default_title, a.alternative_ingredients
              FROM alternative_meal_ingredients a
              JOIN ingredient i ON i.ingredient_id = a.default_ing_id
             WHERE a.meal_id = $1
             ORDER BY a.id
            "#,
        )
        .bind(meal_id)
        .fetch_all(&self.db)
        .await
        .context("list alternative lines")?;
        Ok(rows)
    }
}
