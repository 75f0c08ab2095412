use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::images::AssetLinks;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    #[default]
    Daily,
    Restaurant,
}

impl MealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Daily => "daily",
            MealType::Restaurant => "restaurant",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MealType::Daily => "Daily",
            MealType::Restaurant => "Restaurant",
        }
    }
}

impl TryFrom<String> for MealType {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        match raw.as_str() {
            "daily" => Ok(MealType::Daily),
            "restaurant" => Ok(MealType::Restaurant),
            other => Err(format!("unknown meal type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Meal {
    pub meal_id: i64,
    pub title: String,
    pub recipe_caption: Option<String>,
    pub description: Option<String>,
    pub recipe: Option<String>,
    pub recipe_url: Option<String>,
    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub meal_type: MealType,
    pub image: Option<String>,
    pub thumbnail: Option<String>,
}

impl Meal {
    /// Both links, or nothing: a half-set pair is treated as absent.
    pub fn asset_links(&self) -> Option<AssetLinks> {
        match (&self.image, &self.thumbnail) {
            (Some(origin), Some(thumb)) if !origin.is_empty() && !thumb.is_empty() => {
                Some(AssetLinks {
                    origin: origin.clone(),
                    thumb: thumb.clone(),
                })
            }
            _ => None,
        }
    }

    pub fn set_asset_links(&mut self, links: AssetLinks) {
        self.image = Some(links.origin);
        self.thumbnail = Some(links.thumb);
    }

    pub fn apply(&mut self, fields: MealFields) {
        self.title = fields.title;
        self.recipe_caption = fields.recipe_caption;
        self.description = fields.description;
        self.recipe = fields.recipe;
        self.meal_type = fields.meal_type;
    }
}

/// Editable columns of a meal, as submitted by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MealFields {
    pub title: String,
    #[serde(default)]
    pub recipe_caption: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub recipe: Option<String>,
    #[serde(rename = "type", default)]
    pub meal_type: MealType,
}
