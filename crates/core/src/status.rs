//! Status log operations.
//!
//! The log is append-only and a status name can be entered at most once per appointment.
//! The current status is the most recent row, or SCHEDULED when nothing has been recorded.

use crate::models::{
    AppointmentId, AppointmentStatus, AppointmentStatusId, AppointmentStatusName, UserId,
};
use crate::store::Transaction;
use crate::WorkflowResult;
use chrono::{DateTime, Utc};
use screening_ids::IdMinter;
use serde::Serialize;
use std::collections::HashMap;

/// The current status of an appointment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "row", rename_all = "snake_case")]
pub enum CurrentStatus {
    Recorded(AppointmentStatus),
    /// Nothing has been recorded yet.
    Scheduled,
}

impl CurrentStatus {
    pub fn name(&self) -> AppointmentStatusName {
        match self {
            CurrentStatus::Recorded(row) => row.name,
            CurrentStatus::Scheduled => AppointmentStatusName::Scheduled,
        }
    }

    pub fn row(&self) -> Option<&AppointmentStatus> {
        match self {
            CurrentStatus::Recorded(row) => Some(row),
            CurrentStatus::Scheduled => None,
        }
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.row().map(|row| row.created_by)
    }
}

impl From<Option<AppointmentStatus>> for CurrentStatus {
    fn from(row: Option<AppointmentStatus>) -> Self {
        row.map_or(CurrentStatus::Scheduled, CurrentStatus::Recorded)
    }
}

/// Writes one status row.
pub fn append(
    tx: &mut dyn Transaction,
    ids: &dyn IdMinter,
    appointment_id: AppointmentId,
    name: AppointmentStatusName,
    actor: UserId,
    at: DateTime<Utc>,
) -> WorkflowResult<AppointmentStatus> {
    let row = AppointmentStatus {
        id: AppointmentStatusId::from_uuid(ids.new_id()),
        appointment_id,
        name,
        created_at: at,
        created_by: actor,
    };
    tx.append_status(row.clone())?;
    Ok(row)
}

pub fn latest(tx: &dyn Transaction, appointment_id: AppointmentId) -> WorkflowResult<CurrentStatus> {
    Ok(tx.latest_status(appointment_id)?.into())
}

/// Rows newest first.
pub fn history(
    tx: &dyn Transaction,
    appointment_id: AppointmentId,
) -> WorkflowResult<Vec<AppointmentStatus>> {
    tx.status_history(appointment_id)
}

/// Current status for each id, in one storage round trip.
pub fn latest_for_many(
    tx: &dyn Transaction,
    ids: &[AppointmentId],
) -> WorkflowResult<HashMap<AppointmentId, CurrentStatus>> {
    let mut found = tx.latest_statuses(ids)?;
    Ok(ids
        .iter()
        .map(|id| (*id, found.remove(id).into()))
        .collect())
}

/// The status the workflow guards act on.
///
/// RESUMED and TAKEN_OVER carry on from wherever the appointment was paused, so for those
/// this is the status recorded just before the latest PAUSED row. `history` is newest first.
pub fn effective_status(history: &[AppointmentStatus]) -> AppointmentStatusName {
    let Some(current) = history.first() else {
        return AppointmentStatusName::Scheduled;
    };

    match current.name {
        AppointmentStatusName::Resumed | AppointmentStatusName::TakenOver => history
            .iter()
            .position(|row| row.name == AppointmentStatusName::Paused)
            .and_then(|paused| history.get(paused + 1))
            .map_or(AppointmentStatusName::Scheduled, |row| row.name),
        name => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, Store};
    use crate::models::{ExtraNeeds, Participant, ParticipantId, Provider, ProviderId};
    use chrono::{Duration, NaiveDate, TimeZone};
    use screening_ids::{SequentialIdMinter, Uuid};
    use screening_types::NonEmptyText;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn setup() -> (InMemoryStore, SequentialIdMinter, AppointmentId) {
        let ids = SequentialIdMinter::new();
        let store = InMemoryStore::new();
        let provider = Provider {
            id: ProviderId::from_uuid(ids.new_id()),
            name: NonEmptyText::new("North Screening").unwrap(),
        };
        let participant = Participant {
            id: ParticipantId::from_uuid(ids.new_id()),
            first_name: NonEmptyText::new("Ann").unwrap(),
            last_name: NonEmptyText::new("Lee").unwrap(),
            date_of_birth: NaiveDate::from_ymd_opt(1960, 1, 1).unwrap(),
            ethnic_background_id: None,
            extra_needs: ExtraNeeds::new(),
        };
        let id = store
            .seed_appointment(&ids, &provider, participant, at(0))
            .unwrap();
        (store, ids, id)
    }

    fn row(name: AppointmentStatusName, minutes: i64) -> AppointmentStatus {
        AppointmentStatus {
            id: AppointmentStatusId::from_uuid(Uuid::from_u128(minutes as u128 + 1)),
            appointment_id: AppointmentId::from_uuid(Uuid::from_u128(1)),
            name,
            created_at: at(minutes),
            created_by: UserId::from_uuid(Uuid::from_u128(2)),
        }
    }

    #[test]
    fn unrecorded_appointment_is_scheduled() {
        let (store, _, id) = setup();
        let current = store.read(|tx| latest(tx, id)).unwrap();
        assert_eq!(current, CurrentStatus::Scheduled);
        assert_eq!(current.name(), AppointmentStatusName::Scheduled);
        assert_eq!(current.created_by(), None);
    }

    #[test]
    fn latest_follows_appends() {
        let (store, ids, id) = setup();
        let actor = UserId::from_uuid(Uuid::from_u128(77));
        store
            .atomic(|tx| {
                append(tx, &ids, id, AppointmentStatusName::CheckedIn, actor, at(1))?;
                append(tx, &ids, id, AppointmentStatusName::InProgress, actor, at(2))
            })
            .unwrap();

        let current = store.read(|tx| latest(tx, id)).unwrap();
        assert_eq!(current.name(), AppointmentStatusName::InProgress);
        assert_eq!(current.created_by(), Some(actor));

        let many = store
            .read(|tx| latest_for_many(tx, &[id, AppointmentId::from_uuid(Uuid::from_u128(999))]))
            .unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(many[&id].name(), AppointmentStatusName::InProgress);
        assert_eq!(
            many[&AppointmentId::from_uuid(Uuid::from_u128(999))],
            CurrentStatus::Scheduled
        );
    }

    #[test]
    fn effective_status_skips_back_over_a_pause() {
        use AppointmentStatusName::*;
        let history = vec![
            row(TakenOver, 5),
            row(Paused, 4),
            row(MedicalInformationReviewed, 3),
            row(IdentityConfirmed, 2),
            row(InProgress, 1),
        ];
        assert_eq!(effective_status(&history), MedicalInformationReviewed);
        assert_eq!(effective_status(&history[1..]), Paused);
        assert_eq!(effective_status(&[]), Scheduled);
    }
}
