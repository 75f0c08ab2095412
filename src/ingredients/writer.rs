use tracing::{info, instrument};

use super::repo::IngredientRepo;
use super::repo_types::{AlternativeMealIngredient, EntryRef, IngredientEntry, MealIngredient};
use crate::db::RepoResult;

struct Resolved<'a> {
    ingredient_id: i64,
    entry: &'a IngredientEntry,
}

async fn resolve<'a, R>(repo: &R, entries: &'a [IngredientEntry]) -> RepoResult<Vec<Resolved<'a>>>
where
    R: IngredientRepo + ?Sized,
{
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let ingredient_id = match entry.reference() {
            Some(EntryRef::New(title)) => repo.find_or_create_ingredient(title).await?,
            Some(EntryRef::Existing(id)) => id,
            None => continue,
        };
        out.push(Resolved { ingredient_id, entry });
    }
    Ok(out)
}

/// Makes the meal's ingredient and alternative rows match `entries`.
///
/// Ingredient rows are swapped atomically; if that fails nothing else is
/// written. Alternatives are then cleared and rewritten, so a failure there
/// leaves the meal without alternatives rather than with the old set.
#[instrument(skip(repo, entries), fields(entries = entries.len()))]
pub async fn replace_associations<R>(repo: &R, meal_id: i64, entries: &[IngredientEntry]) -> RepoResult<()>
where
    R: IngredientRepo + ?Sized,
{
    let resolved = resolve(repo, entries).await?;

    let rows: Vec<MealIngredient> = resolved
        .iter()
        .map(|r| MealIngredient {
            meal_id,
            ingredient_id: r.ingredient_id,
            portion: r.entry.portion.trim().to_string(),
        })
        .collect();
    repo.replace_meal_ingredients(meal_id, &rows).await?;

    let alternatives: Vec<AlternativeMealIngredient> = resolved
        .iter()
        .filter_map(|r| {
            r.entry.alternative_text().map(|text| AlternativeMealIngredient {
                meal_id,
                default_ing_id: r.ingredient_id,
                alternative_ingredients: text.trim().to_string(),
            })
        })
        .collect();
    repo.delete_alternatives(meal_id).await?;
    repo.insert_alternatives(&alternatives).await?;

    info!(meal_id, ingredients = rows.len(), alternatives = alternatives.len(), "ingredient associations replaced");
    Ok(())
}

/// Drops one ingredient from a meal together with the alternatives listed for it.
#[instrument(skip(repo))]
pub async fn remove_ingredient<R>(repo: &R, meal_id: i64, ingredient_id: i64) -> RepoResult<u64>
where
    R: IngredientRepo + ?Sized,
{
    let removed = repo.delete_meal_ingredient(meal_id, ingredient_id).await?;
    repo.delete_alternatives_for_default(meal_id, ingredient_id).await?;
    Ok(removed)
}
