use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::cascade::{reassign_defaults, CascadeReport};
use super::dto::{AlternativeGroup, MealDetails};
use super::repo_types::{Meal, MealFields};
use crate::error::{AssetError, MealError};
use crate::images::{publish::remove_remote, AssetLinks, AssetSlot, Upload};
use crate::ingredients::repo_types::split_alternatives;
use crate::ingredients::{validator, writer, IngredientEntry};
use crate::state::AppState;

const TITLE_MAX: usize = 100;
const CAPTION_MAX: usize = 100;

/// Everything a caller submits when saving a meal.
#[derive(Debug, Clone, Default)]
pub struct MealSubmission {
    pub fields: MealFields,
    pub ingredients: Vec<IngredientEntry>,
    pub upload: Option<Upload>,
}

#[derive(Debug, Serialize)]
pub struct SavedMeal {
    pub meal: Meal,
    /// Non-blocking notes for the caller, e.g. reused ingredient titles.
    pub advisories: Vec<String>,
    /// Set when the meal was saved but its image could not be processed.
    pub asset_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletedMeal {
    pub meal_id: i64,
    pub cascade: CascadeReport,
    pub removed_assets: Vec<AssetSlot>,
    pub asset_warnings: Vec<String>,
}

fn validated(mut fields: MealFields) -> Result<MealFields, MealError> {
    fields.title = fields.title.trim().to_string();
    if fields.title.is_empty() {
        return Err(MealError::Validation("title cannot be blank".into()));
    }
    if fields.title.chars().count() > TITLE_MAX {
        return Err(MealError::Validation(format!(
            "title should contain at most {TITLE_MAX} characters"
        )));
    }
    if let Some(caption) = &fields.recipe_caption {
        if caption.chars().count() > CAPTION_MAX {
            return Err(MealError::Validation(format!(
                "recipe caption should contain at most {CAPTION_MAX} characters"
            )));
        }
    }
    Ok(fields)
}

struct Checked {
    fields: MealFields,
    extension: Option<String>,
    advisories: Vec<String>,
}

/// Every check that can reject a save, run before anything is written.
async fn precheck(st: &AppState, sub: &MealSubmission, except: Option<i64>) -> Result<Checked, MealError> {
    let dup = validator::check_duplicates(&*st.repo, &sub.ingredients).await?;
    if dup.has_duplicates {
        warn!(details = ?dup.details, "duplicated ingredients submitted");
        return Err(MealError::DuplicateIngredients { details: dup.details });
    }

    let fields = validated(sub.fields.clone())?;
    if st.repo.title_taken(&fields.title, except).await? {
        return Err(MealError::Validation("title has already been taken".into()));
    }

    let extension = sub
        .upload
        .as_ref()
        .map(|u| st.assets.validate(u))
        .transpose()
        .map_err(|e| MealError::Validation(e.to_string()))?;

    Ok(Checked {
        fields,
        extension,
        advisories: dup.advisory().into_iter().collect(),
    })
}

async fn discard_local(st: &AppState, link: &str) {
    if let Err(e) = st.assets.clear_by_url(link).await {
        warn!(link, error = %e, "discarding local asset failed");
    }
}

/// Stores the upload, derives its thumbnail and, with object storage
/// configured, publishes the pair. On success both asset fields are replaced.
async fn attach_upload(st: &AppState, meal: &mut Meal, upload: &Upload, ext: &str) -> Result<(), AssetError> {
    let origin = st.assets.derive_storage_name(ext);
    st.assets.store_local(&upload.body, &origin).await?;

    let thumb = match st.assets.generate_thumbnail(&origin).await {
        Ok(thumb) => thumb,
        Err(e) => {
            discard_local(st, &origin).await;
            return Err(e);
        }
    };

    let previous = meal.asset_links();
    let links = match st.storage.as_deref() {
        Some(storage) => {
            let published = st
                .assets
                .publish(
                    storage,
                    &origin,
                    &thumb,
                    &st.config.assets.remote_folder,
                    meal.meal_id,
                    previous.as_ref(),
                )
                .await;
            match published {
                Ok(links) => links,
                Err(e) => {
                    discard_local(st, &origin).await;
                    discard_local(st, &thumb).await;
                    return Err(e);
                }
            }
        }
        None => {
            // TODO: remove the previous local pair here; repeated edits leak files until then
            if let Some(old) = &previous {
                debug!(meal_id = meal.meal_id, origin = %old.origin, "previous local assets kept");
            }
            AssetLinks { origin, thumb }
        }
    };

    meal.set_asset_links(links);
    Ok(())
}

#[instrument(skip(st, sub), fields(title = %sub.fields.title))]
pub async fn create_meal(st: &AppState, sub: MealSubmission) -> Result<SavedMeal, MealError> {
    let checked = precheck(st, &sub, None).await?;

    let mut meal = st.repo.insert_meal(&checked.fields).await?;
    info!(meal_id = meal.meal_id, "meal created");

    let mut asset_error = None;
    if let (Some(upload), Some(ext)) = (&sub.upload, &checked.extension) {
        if let Err(e) = attach_upload(st, &mut meal, upload, ext).await {
            warn!(meal_id = meal.meal_id, error = %e, "meal saved without image");
            asset_error = Some(e.to_string());
        }
    }

    // Links and recipe URL are persisted before the association write.
    meal.recipe_url = Some(st.config.recipe_url(meal.meal_id));
    st.repo.update_meal(&meal).await?;

    writer::replace_associations(&*st.repo, meal.meal_id, &sub.ingredients).await?;

    Ok(SavedMeal {
        meal,
        advisories: checked.advisories,
        asset_error,
    })
}

#[instrument(skip(st, sub))]
pub async fn update_meal(st: &AppState, meal_id: i64, sub: MealSubmission) -> Result<SavedMeal, MealError> {
    let mut meal = st
        .repo
        .find_meal(meal_id)
        .await?
        .ok_or(MealError::NotFound(meal_id))?;
    let checked = precheck(st, &sub, Some(meal_id)).await?;

    meal.apply(checked.fields);
    meal.recipe_url = Some(st.config.recipe_url(meal_id));

    let mut asset_error = None;
    if let (Some(upload), Some(ext)) = (&sub.upload, &checked.extension) {
        if let Err(e) = attach_upload(st, &mut meal, upload, ext).await {
            warn!(meal_id, error = %e, "image replacement failed; keeping previous image");
            asset_error = Some(e.to_string());
        }
    }

    st.repo.update_meal(&meal).await?;
    writer::replace_associations(&*st.repo, meal_id, &sub.ingredients).await?;
    info!(meal_id, "meal updated");

    Ok(SavedMeal {
        meal,
        advisories: checked.advisories,
        asset_error,
    })
}

#[instrument(skip(st))]
pub async fn delete_meal(st: &AppState, meal_id: i64) -> Result<DeletedMeal, MealError> {
    let meal = st
        .repo
        .find_meal(meal_id)
        .await?
        .ok_or(MealError::NotFound(meal_id))?;

    let cascade = reassign_defaults(&*st.repo, meal_id).await?;

    let mut removed_assets = Vec::new();
    let mut asset_warnings = Vec::new();
    if let Some(links) = meal.asset_links() {
        match st.storage.as_deref() {
            Some(storage) => {
                match remove_remote(storage, &st.config.assets.remote_folder, meal_id, &links).await {
                    Ok(()) => removed_assets = vec![AssetSlot::Origin, AssetSlot::Thumb],
                    Err(e) => {
                        warn!(meal_id, error = %e, "remote asset removal failed");
                        asset_warnings.push(format!("{e:#}"));
                    }
                }
            }
            None => {
                let report = st.assets.remove_local(meal_id, &links).await;
                removed_assets = report.removed();
                asset_warnings = report.failures();
            }
        }
    }

    st.repo.delete_placements(meal_id).await?;
    st.repo.delete_meal_ingredients(meal_id).await?;
    st.repo.delete_alternatives(meal_id).await?;
    st.repo.delete_meal(meal_id).await?;
    info!(meal_id, warnings = cascade.warnings.len(), "meal deleted");

    Ok(DeletedMeal {
        meal_id,
        cascade,
        removed_assets,
        asset_warnings,
    })
}

pub async fn remove_ingredient(st: &AppState, meal_id: i64, ingredient_id: i64) -> Result<u64, MealError> {
    Ok(writer::remove_ingredient(&*st.repo, meal_id, ingredient_id).await?)
}

#[instrument(skip(st))]
pub async fn meal_details(st: &AppState, meal_id: i64) -> Result<MealDetails, MealError> {
    let meal = st
        .repo
        .find_meal(meal_id)
        .await?
        .ok_or(MealError::NotFound(meal_id))?;
    let ingredients = st.repo.ingredient_lines(meal_id).await?;

    let mut alternatives: Vec<AlternativeGroup> = Vec::new();
    for line in st.repo.alternative_lines(meal_id).await? {
        let names = split_alternatives(&line.alternative_ingredients);
        if names.is_empty() {
            continue;
        }
        match alternatives.iter_mut().find(|g| g.ingredient_id == line.default_ing_id) {
            Some(group) => group.alternatives.extend(names),
            None => alternatives.push(AlternativeGroup {
                ingredient_id: line.default_ing_id,
                title: line.default_title,
                alternatives: names,
            }),
        }
    }

    let visible = st.config.meal_types.for_type(meal.meal_type);
    Ok(MealDetails {
        meal_id: meal.meal_id,
        title: meal.title,
        recipe_caption: meal.recipe_caption,
        meal_type: meal.meal_type,
        type_label: meal.meal_type.label(),
        description: meal.description.filter(|_| visible.description),
        directions: meal.recipe.filter(|_| visible.directions),
        recipe_url: meal.recipe_url,
        image: meal.image,
        thumbnail: meal.thumbnail,
        selectable_as_default: visible.default_selection,
        ingredients,
        alternatives,
    })
}
