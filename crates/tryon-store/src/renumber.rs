//! The renumbering cascade as an explicit saga.
//!
//! A saga is the ordered list of renames needed to bring a body slot list
//! back to canonical names `1..=N`, plus a high-water mark counting the
//! steps already applied. Steps run strictly in ascending target order:
//! target `i` is always free (deleted, or already moved down) by the time
//! step `i` runs, which would not hold if two steps ran out of order or at
//! once.

use tryon_shared::naming;
use tryon_shared::types::{SlotKind, UserId};

use crate::models::BodyPhotoSlot;

/// Move the blob at `from` to the canonical name `to` for `target_index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameStep {
    pub from: String,
    pub to: String,
    pub target_index: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenumberSaga {
    user_id: UserId,
    steps: Vec<RenameStep>,
    completed: usize,
}

impl RenumberSaga {
    /// Plan the renames for `remaining`, which must already be in display
    /// order. Slots already at their canonical name produce no step.
    pub fn plan(user: &UserId, remaining: &[BodyPhotoSlot]) -> Self {
        let steps = remaining
            .iter()
            .enumerate()
            .filter_map(|(pos, slot)| {
                let target_index = u8::try_from(pos + 1).ok()?;
                let to = naming::name_for(user, SlotKind::Body, target_index);
                (slot.blob_name != to).then(|| RenameStep {
                    from: slot.blob_name.clone(),
                    to,
                    target_index,
                })
            })
            .collect();

        Self {
            user_id: user.clone(),
            steps,
            completed: 0,
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn steps(&self) -> &[RenameStep] {
        &self.steps
    }

    /// High-water mark: number of steps fully applied.
    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.steps.len()
    }

    /// The first step not yet applied.
    pub fn next_step(&self) -> Option<&RenameStep> {
        self.steps.get(self.completed)
    }

    pub(crate) fn advance(&mut self) {
        if !self.is_complete() {
            self.completed += 1;
        }
    }

    /// Canonical names written by the steps applied so far.
    pub fn renamed(&self) -> Vec<String> {
        self.steps
            .iter()
            .take(self.completed)
            .map(|s| s.to.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::parse("user_abc").unwrap()
    }

    #[test]
    fn test_plan_after_deleting_first() {
        let u = user();
        let remaining = vec![
            BodyPhotoSlot::canonical(&u, 2),
            BodyPhotoSlot::canonical(&u, 3),
        ];
        let saga = RenumberSaga::plan(&u, &remaining);

        let steps = saga.steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].from, "user_abc-body2.jpg");
        assert_eq!(steps[0].to, "user_abc-body1.jpg");
        assert_eq!(steps[1].from, "user_abc-body3.jpg");
        assert_eq!(steps[1].to, "user_abc-body2.jpg");
        assert_eq!(saga.completed(), 0);
    }

    #[test]
    fn test_plan_skips_slots_already_in_place() {
        let u = user();
        let remaining = vec![
            BodyPhotoSlot::canonical(&u, 1),
            BodyPhotoSlot::canonical(&u, 3),
        ];
        let saga = RenumberSaga::plan(&u, &remaining);
        assert_eq!(saga.steps().len(), 1);
        assert_eq!(saga.steps()[0].target_index, 2);
    }

    #[test]
    fn test_plan_after_deleting_last_is_empty() {
        let u = user();
        let remaining = vec![
            BodyPhotoSlot::canonical(&u, 1),
            BodyPhotoSlot::canonical(&u, 2),
        ];
        assert!(RenumberSaga::plan(&u, &remaining).is_complete());
    }

    #[test]
    fn test_high_water_mark() {
        let u = user();
        let remaining = vec![
            BodyPhotoSlot::canonical(&u, 2),
            BodyPhotoSlot::canonical(&u, 3),
        ];
        let mut saga = RenumberSaga::plan(&u, &remaining);
        saga.advance();
        assert_eq!(saga.renamed(), vec!["user_abc-body1.jpg".to_string()]);
        assert_eq!(saga.next_step().unwrap().target_index, 2);

        saga.advance();
        saga.advance();
        assert!(saga.is_complete());
        assert_eq!(saga.completed(), 2);
    }
}
