use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::db::RepoResult;
use crate::menu::repo::MenuRepo;
use crate::menu::{MenuSlot, PhaseMenu};

/// A single menu row that could not be updated while a meal was removed.
#[derive(Debug, Clone, Serialize)]
pub struct CascadeWarning {
    pub slot: MenuSlot,
    pub meal_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CascadeReport {
    /// Placements that now carry the default flag for their slot.
    pub promoted: Vec<PhaseMenu>,
    pub cleared_selections: u64,
    pub warnings: Vec<CascadeWarning>,
}

impl CascadeReport {
    fn warn(&mut self, slot: MenuSlot, meal_id: i64, err: impl std::fmt::Display) {
        warn!(
            phase_id = slot.phase_id,
            day = slot.day_of_phase,
            category_id = slot.category_id,
            meal_id,
            error = %err,
            "menu cascade step failed"
        );
        self.warnings.push(CascadeWarning {
            slot,
            meal_id,
            message: err.to_string(),
        });
    }
}

/// Hands every slot occupied by `meal_id` to another meal already placed
/// there and drops user selections pinned to the meal being removed.
///
/// Only the listing of slots can fail the call; every per-row change after
/// that is attempted independently and failures are collected as warnings.
/// Slots the meal does not occupy are never touched.
#[instrument(skip(repo))]
pub async fn reassign_defaults<R>(repo: &R, meal_id: i64) -> RepoResult<CascadeReport>
where
    R: MenuRepo + ?Sized,
{
    let slots = repo.slots_for_meal(meal_id).await?;
    let mut report = CascadeReport::default();

    for slot in slots {
        match repo.replacement_in_slot(slot, meal_id).await {
            Ok(Some(replacement)) => match repo.mark_default(replacement.slot(), replacement.meal_id).await {
                Ok(_) => report.promoted.push(PhaseMenu {
                    is_default: true,
                    ..replacement
                }),
                Err(e) => report.warn(slot, replacement.meal_id, e),
            },
            Ok(None) => {}
            Err(e) => report.warn(slot, meal_id, e),
        }

        match repo.delete_user_selections(slot, meal_id).await {
            Ok(n) => report.cleared_selections += n,
            Err(e) => report.warn(slot, meal_id, e),
        }
    }

    info!(
        meal_id,
        promoted = report.promoted.len(),
        cleared_selections = report.cleared_selections,
        warnings = report.warnings.len(),
        "menu defaults reassigned"
    );
    Ok(report)
}
