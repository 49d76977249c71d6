//! Multi-version slot evaluation outputs

use serde::{Deserialize, Serialize};

/// Score of a candidate release against one slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotAssignment {
    pub slot_id: i64,
    pub slot_name: String,
    pub score: i32,
    pub is_upgrade: bool,
    /// Slot currently holds no file
    pub is_new_fill: bool,
}

/// Result of evaluating a release against every slot of a media item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotEvaluation {
    pub assignments: Vec<SlotAssignment>,
    pub recommended_slot_id: Option<i64>,
    /// The caller must pick a slot interactively before importing
    pub requires_selection: bool,
}

impl SlotEvaluation {
    pub fn assignment_for(&self, slot_id: i64) -> Option<&SlotAssignment> {
        self.assignments.iter().find(|a| a.slot_id == slot_id)
    }
}
