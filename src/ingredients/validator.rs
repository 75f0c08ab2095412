use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, instrument};

use super::repo::IngredientRepo;
use super::repo_types::{EntryRef, IngredientEntry};
use crate::db::RepoResult;

/// Outcome of the duplicate check. Only `has_duplicates` blocks a save;
/// `already_used` is advisory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateCheck {
    pub has_duplicates: bool,
    pub details: Vec<String>,
    pub already_used: Vec<String>,
}

impl DuplicateCheck {
    pub fn advisory(&self) -> Option<String> {
        (!self.already_used.is_empty())
            .then(|| format!("these ingredients are already in use: {}", self.already_used.join(",")))
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Partition<'a> {
    new_names: Vec<&'a str>,
    existing: Vec<i64>,
}

fn partition(entries: &[IngredientEntry]) -> Partition<'_> {
    let mut out = Partition::default();
    for entry in entries {
        match entry.reference() {
            Some(EntryRef::New(name)) => out.new_names.push(name),
            Some(EntryRef::Existing(id)) => out.existing.push(id),
            None => {}
        }
    }
    out
}

/// In-submission duplicates, in first-seen order.
fn repeated<T: Eq + std::hash::Hash + Copy>(items: &[T]) -> Vec<T> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    items
        .iter()
        .filter(|item| !seen.insert(**item) && reported.insert(**item))
        .copied()
        .collect()
}

#[instrument(skip(repo, entries), fields(entries = entries.len()))]
pub async fn check_duplicates<R>(repo: &R, entries: &[IngredientEntry]) -> RepoResult<DuplicateCheck>
where
    R: IngredientRepo + ?Sized,
{
    let parts = partition(entries);
    let mut check = DuplicateCheck::default();

    let unique_new: Vec<String> = {
        let mut seen = HashSet::new();
        parts
            .new_names
            .iter()
            .filter(|n| seen.insert(**n))
            .map(|n| n.to_string())
            .collect()
    };
    check.already_used = repo.existing_titles(&unique_new).await?;

    for name in repeated(&parts.new_names) {
        check.details.push(format!("new ingredient \"{name}\" submitted more than once"));
    }
    for id in repeated(&parts.existing) {
        check.details.push(format!("ingredient #{id} submitted more than once"));
    }
    check.has_duplicates = !check.details.is_empty();

    debug!(
        has_duplicates = check.has_duplicates,
        already_used = check.already_used.len(),
        "ingredient duplicate check"
    );
    Ok(check)
}
