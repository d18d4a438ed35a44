//! Step ledger views.
//!
//! The ledger is gated on the latest identity confirmation. A step counts as completed only
//! if the user who last confirmed identity completed it after that confirmation. Anyone
//! other than that user is working under an invalidated identity check and sees no step as
//! completed until they confirm identity themselves.

use crate::models::{AppointmentId, StepCompletion, StepCompletionId, StepName, UserId};
use crate::store::Transaction;
use crate::WorkflowResult;
use chrono::{DateTime, Utc};
use screening_ids::IdMinter;
use serde::Serialize;

/// How one step appears to a viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StepState {
    pub step: StepName,
    pub completed: bool,
    /// The first step not yet completed.
    pub current: bool,
    /// Not reachable until an earlier step is completed.
    pub disabled: bool,
}

pub fn record(
    tx: &mut dyn Transaction,
    ids: &dyn IdMinter,
    appointment_id: AppointmentId,
    step_name: StepName,
    actor: UserId,
    at: DateTime<Utc>,
) -> WorkflowResult<StepCompletion> {
    let row = StepCompletion {
        id: StepCompletionId::from_uuid(ids.new_id()),
        appointment_id,
        step_name,
        created_at: at,
        created_by: actor,
    };
    tx.insert_step_completion(row.clone())?;
    Ok(row)
}

/// The most recent CONFIRM_IDENTITY row. `completions` is oldest first.
pub fn latest_identity_confirmation(completions: &[StepCompletion]) -> Option<&StepCompletion> {
    completions
        .iter()
        .rev()
        .find(|row| row.step_name == StepName::ConfirmIdentity)
}

/// True when someone other than `actor` confirmed identity last.
///
/// With no confirmation on record there is nothing to invalidate.
pub fn is_identity_invalidated(completions: &[StepCompletion], actor: UserId) -> bool {
    latest_identity_confirmation(completions).is_some_and(|row| row.created_by != actor)
}

/// Steps completed under the latest identity confirmation.
///
/// When `viewer` is given and their identity check is invalidated, nothing is completed.
pub fn completed_steps(completions: &[StepCompletion], viewer: Option<UserId>) -> Vec<StepName> {
    let Some(confirmation) = latest_identity_confirmation(completions) else {
        return Vec::new();
    };
    if viewer.is_some_and(|viewer| viewer != confirmation.created_by) {
        return Vec::new();
    }

    StepName::ALL
        .into_iter()
        .filter(|step| {
            *step == StepName::ConfirmIdentity
                || completions.iter().any(|row| {
                    row.step_name == *step
                        && row.created_by == confirmation.created_by
                        && row.created_at >= confirmation.created_at
                })
        })
        .collect()
}

/// Every step in order, marked completed, current or disabled.
pub fn step_states(completions: &[StepCompletion], viewer: Option<UserId>) -> Vec<StepState> {
    let completed = completed_steps(completions, viewer);
    let mut earlier_done = true;

    StepName::ALL
        .into_iter()
        .map(|step| {
            let is_completed = completed.contains(&step);
            let current = !is_completed && earlier_done;
            earlier_done &= is_completed;
            StepState {
                step,
                completed: is_completed,
                current,
                disabled: !is_completed && !current,
            }
        })
        .collect()
}

/// The first step not yet completed, if any.
pub fn current_step(completions: &[StepCompletion], viewer: Option<UserId>) -> Option<StepName> {
    step_states(completions, viewer)
        .into_iter()
        .find(|state| state.current)
        .map(|state| state.step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use screening_ids::Uuid;

    fn user(n: u128) -> UserId {
        UserId::from_uuid(Uuid::from_u128(n))
    }

    fn row(step_name: StepName, by: UserId, minute: i64) -> StepCompletion {
        StepCompletion {
            id: StepCompletionId::from_uuid(Uuid::from_u128(minute as u128 + 100)),
            appointment_id: AppointmentId::from_uuid(Uuid::from_u128(1)),
            step_name,
            created_at: Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap()
                + Duration::minutes(minute),
            created_by: by,
        }
    }

    #[test]
    fn empty_ledger_starts_at_confirm_identity() {
        let states = step_states(&[], None);
        assert!(states[0].current);
        assert!(states[1..].iter().all(|state| state.disabled));
        assert!(!is_identity_invalidated(&[], user(1)));
    }

    #[test]
    fn steps_complete_in_order() {
        let u1 = user(1);
        let ledger = vec![
            row(StepName::ConfirmIdentity, u1, 1),
            row(StepName::ReviewMedicalInformation, u1, 2),
        ];
        let states = step_states(&ledger, Some(u1));
        assert!(states[0].completed && states[1].completed);
        assert!(states[2].current);
        assert!(states[3].disabled);
        assert_eq!(current_step(&ledger, Some(u1)), Some(StepName::TakeImages));
    }

    #[test]
    fn another_user_sees_nothing_completed() {
        let (u1, u2) = (user(1), user(2));
        let ledger = vec![
            row(StepName::ConfirmIdentity, u1, 1),
            row(StepName::ReviewMedicalInformation, u1, 2),
        ];
        assert!(is_identity_invalidated(&ledger, u2));
        assert!(completed_steps(&ledger, Some(u2)).is_empty());
        assert_eq!(current_step(&ledger, Some(u2)), Some(StepName::ConfirmIdentity));
        assert_eq!(completed_steps(&ledger, None).len(), 2);
    }

    #[test]
    fn reconfirmation_discards_earlier_steps() {
        let (u1, u2) = (user(1), user(2));
        let ledger = vec![
            row(StepName::ConfirmIdentity, u1, 1),
            row(StepName::ReviewMedicalInformation, u1, 2),
            row(StepName::ConfirmIdentity, u2, 3),
        ];
        assert!(!is_identity_invalidated(&ledger, u2));
        assert!(is_identity_invalidated(&ledger, u1));
        assert_eq!(
            completed_steps(&ledger, Some(u2)),
            vec![StepName::ConfirmIdentity]
        );
    }
}
