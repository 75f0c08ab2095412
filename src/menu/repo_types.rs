use serde::Serialize;
use sqlx::FromRow;

/// A `(phase, day, category)` cell of a phase menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, FromRow)]
pub struct MenuSlot {
    pub phase_id: i64,
    pub day_of_phase: i32,
    pub category_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct PhaseMenu {
    pub phase_id: i64,
    pub day_of_phase: i32,
    pub category_id: i64,
    pub meal_id: i64,
    pub group: i32,
    pub is_default: bool,
}

impl PhaseMenu {
    pub fn slot(&self) -> MenuSlot {
        MenuSlot {
            phase_id: self.phase_id,
            day_of_phase: self.day_of_phase,
            category_id: self.category_id,
        }
    }
}
