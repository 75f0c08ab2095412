use anyhow::Context;
use async_trait::async_trait;

use super::repo_types::{MenuSlot, PhaseMenu};
use crate::db::{PgRepo, RepoResult};

#[async_trait]
pub trait MenuRepo: Send + Sync {
    /// Distinct slots in which the meal is placed.
    async fn slots_for_meal(&self, meal_id: i64) -> RepoResult<Vec<MenuSlot>>;
    /// One placement of some other meal in `slot`, preferring the current default.
    async fn replacement_in_slot(&self, slot: MenuSlot, excluding_meal: i64) -> RepoResult<Option<PhaseMenu>>;
    async fn mark_default(&self, slot: MenuSlot, meal_id: i64) -> RepoResult<u64>;
    /// Removes user selections pinned to `meal_id` in `slot`.
    async fn delete_user_selections(&self, slot: MenuSlot, meal_id: i64) -> RepoResult<u64>;
    async fn delete_placements(&self, meal_id: i64) -> RepoResult<u64>;
}

#[async_trait]
impl MenuRepo for PgRepo {
    async fn slots_for_meal(&self, meal_id: i64) -> RepoResult<Vec<MenuSlot>> {
        let rows = sqlx::query_as::<_, MenuSlot>(
            r#"
            SELECT DISTINCT phase_id, day_of_phase, category_id
              FROM phase_menu
             WHERE meal_id = $1
             ORDER BY phase_id, day_of_phase, category_id
            "#,
        )
        .bind(meal_id)
        .fetch_all(&self.db)
        .await
        .context("list menu slots for meal")?;
        Ok(rows)
    }

    async fn replacement_in_slot(&self, slot: MenuSlot, excluding_meal: i64) -> RepoResult<Option<PhaseMenu>> {
        let row = sqlx::query_as::<_, PhaseMenu>(
            r#"
            SELECT phase_id, day_of_phase, category_id, meal_id, "group", is_default
              FROM phase_menu
             WHERE phase_id = $1 AND day_of_phase = $2 AND category_id = $3
               AND meal_id <> $4
             ORDER BY is_default DESC, meal_id
             LIMIT 1
            "#,
        )
        .bind(slot.phase_id)
        .bind(slot.day_of_phase)
        .bind(slot.category_id)
        .bind(excluding_meal)
        .fetch_optional(&self.db)
        .await
        .context("find replacement placement")?;
        Ok(row)
    }

    async fn mark_default(&self, slot: MenuSlot, meal_id: i64) -> RepoResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE phase_menu SET is_default = TRUE
             WHERE phase_id = $1 AND day_of_phase = $2 AND category_id = $3 AND meal_id = $4
            "#,
        )
        .bind(slot.phase_id)
        .bind(slot.day_of_phase)
        .bind(slot.category_id)
        .bind(meal_id)
        .execute(&self.db)
        .await
        .context("mark placement default")?;
        Ok(res.rows_affected())
    }

    async fn delete_user_selections(&self, slot: MenuSlot, meal_id: i64) -> RepoResult<u64> {
        let res = sqlx::query(
            r#"
            DELETE FROM user_menu
             WHERE phase_id = $1 AND day_of_phase = $2 AND category_id = $3 AND meal_id = $4
            "#,
        )
        .bind(slot.phase_id)
        .bind(slot.day_of_phase)
        .bind(slot.category_id)
        .bind(meal_id)
        .execute(&self.db)
        .await
        .context("delete user menu selections")?;
        Ok(res.rows_affected())
    }

    async fn delete_placements(&self, meal_id: i64) -> RepoResult<u64> {
        let res = sqlx::query("DELETE FROM phase_menu WHERE meal_id = $1")
            .bind(meal_id)
            .execute(&self.db)
            .await
            .context("delete phase menu placements")?;
        Ok(res.rows_affected())
    }
}
