use serde::{Deserialize, Serialize};

use super::repo_types::{MealFields, MealType};
use super::services::DeletedMeal;
use crate::ingredients::repo_types::IngredientLine;
use crate::ingredients::IngredientEntry;

/// JSON carried in the `meal` part of a multipart save request.
#[derive(Debug, Deserialize)]
pub struct MealForm {
    #[serde(flatten)]
    pub fields: MealFields,
    #[serde(default)]
    pub ingredients: Vec<IngredientEntry>,
}

#[derive(Debug, Serialize)]
pub struct AlternativeGroup {
    pub ingredient_id: i64,
    pub title: String,
    pub alternatives: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MealDetails {
    pub meal_id: i64,
    pub title: String,
    pub recipe_caption: Option<String>,
    #[serde(rename = "type")]
    pub meal_type: MealType,
    pub type_label: &'static str,
    pub description: Option<String>,
    pub directions: Option<String>,
    pub recipe_url: Option<String>,
    pub image: Option<String>,
    pub thumbnail: Option<String>,
    pub selectable_as_default: bool,
    pub ingredients: Vec<IngredientLine>,
    pub alternatives: Vec<AlternativeGroup>,
}

#[derive(Debug, Serialize)]
pub struct DeletedMealResponse {
    pub meal_id: i64,
    pub promoted: usize,
    pub cleared_selections: u64,
    pub warnings: Vec<String>,
}

impl From<DeletedMeal> for DeletedMealResponse {
    fn from(d: DeletedMeal) -> Self {
        let mut warnings: Vec<String> = d
            .cascade
            .warnings
            .into_iter()
            .map(|w| {
                format!(
                    "phase {} day {} category {} meal {}: {}",
                    w.slot.phase_id, w.slot.day_of_phase, w.slot.category_id, w.meal_id, w.message
                )
            })
            .collect();
        warnings.extend(d.asset_warnings);
        Self {
            meal_id: d.meal_id,
            promoted: d.cascade.promoted.len(),
            cleared_selections: d.cascade.cleared_selections,
            warnings,
        }
    }
}
