use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One line of the ingredient list submitted with a meal. It names either a
/// brand-new ingredient (`new`) or an existing one by id (`exist`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngredientEntry {
    #[serde(default)]
    pub new: Option<String>,
    #[serde(default)]
    pub exist: Option<i64>,
    #[serde(default)]
    pub portion: String,
    /// Semicolon-delimited substitute names for this ingredient.
    #[serde(default)]
    pub alternatives: Option<String>,
}

/// Which kind of reference an entry carries, `new` taking precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryRef<'a> {
    New(&'a str),
    Existing(i64),
}

impl IngredientEntry {
    pub fn reference(&self) -> Option<EntryRef<'_>> {
        match (&self.new, self.exist) {
            (Some(name), _) if !name.trim().is_empty() => Some(EntryRef::New(name.trim())),
            (_, Some(id)) if id > 0 => Some(EntryRef::Existing(id)),
            _ => None,
        }
    }

    pub fn alternative_text(&self) -> Option<&str> {
        self.alternatives
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct MealIngredient {
    pub meal_id: i64,
    pub ingredient_id: i64,
    pub portion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct AlternativeMealIngredient {
    pub meal_id: i64,
    pub default_ing_id: i64,
    pub alternative_ingredients: String,
}

/// An ingredient line joined with its title, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct IngredientLine {
    pub ingredient_id: i64,
    pub title: String,
    pub portion: String,
}

/// Alternatives joined with the default ingredient's title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct AlternativeLine {
    pub default_ing_id: i64,
    pub default_title: String,
    pub alternative_ingredients: String,
}

lazy_static! {
    static ref ALTERNATIVE_SEPARATOR: Regex = Regex::new(r"\s*;\s*").unwrap();
}

/// Splits a semicolon-delimited alternatives column into trimmed names.
pub fn split_alternatives(text: &str) -> Vec<String> {
    ALTERNATIVE_SEPARATOR
        .split(text.trim())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
