//! Reinvite flag handling.
//!
//! `Appointment::reinvite` has no effect inside the workflow. It tells downstream scheduling
//! that the participant should be offered another appointment.

use crate::constants::permissions;
use crate::context::CoreContext;
use crate::models::{Appointment, AppointmentId, RecallChoice, User};
use crate::store::Store;
use crate::WorkflowResult;

/// Sets the reinvite flag from the recall choice made when imaging was incomplete.
///
/// Returns true if the flag changed. With no choice the flag is left alone.
pub fn apply_recall(appointment: &mut Appointment, choice: Option<RecallChoice>) -> bool {
    let reinvite = match choice {
        Some(RecallChoice::ToBeRecalled) => true,
        Some(RecallChoice::PartialMammography) => false,
        None => return false,
    };
    let changed = appointment.reinvite != reinvite;
    appointment.reinvite = reinvite;
    changed
}

/// Edits the reinvite flag outside a status transition.
pub struct RecallService<S> {
    ctx: CoreContext<S>,
}

impl<S: Store> RecallService<S> {
    pub fn new(ctx: CoreContext<S>) -> Self {
        Self { ctx }
    }

    pub fn reinvite(&self, appointment_id: AppointmentId, actor: &User) -> WorkflowResult<Appointment> {
        self.set(appointment_id, actor, true)
    }

    pub fn clear(&self, appointment_id: AppointmentId, actor: &User) -> WorkflowResult<Appointment> {
        self.set(appointment_id, actor, false)
    }

    fn set(
        &self,
        appointment_id: AppointmentId,
        actor: &User,
        reinvite: bool,
    ) -> WorkflowResult<Appointment> {
        let mut auditor = self.ctx.auditor(actor);
        self.ctx.store.atomic(|tx| {
            self.ctx.authorize(
                tx,
                appointment_id,
                actor,
                permissions::PERFORM_MAMMOGRAM_APPOINTMENT,
            )?;

            let mut appointment = tx.appointment(appointment_id)?;
            if appointment.reinvite == reinvite {
                return Ok(appointment);
            }

            appointment.reinvite = reinvite;
            tx.update_appointment(&appointment)?;
            auditor.audit_update(&appointment)?;
            auditor.flush(tx)?;

            tracing::info!(
                appointment = %appointment_id,
                user = %actor.id,
                reinvite,
                "updated reinvite flag"
            );
            Ok(appointment)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClinicSlotId, ScreeningEpisodeId};
    use screening_ids::Uuid;

    fn appointment() -> Appointment {
        Appointment::new(
            AppointmentId::from_uuid(Uuid::from_u128(1)),
            ScreeningEpisodeId::from_uuid(Uuid::from_u128(2)),
            ClinicSlotId::from_uuid(Uuid::from_u128(3)),
        )
    }

    #[test]
    fn to_be_recalled_sets_reinvite() {
        let mut appt = appointment();
        assert!(apply_recall(&mut appt, Some(RecallChoice::ToBeRecalled)));
        assert!(appt.reinvite);
        assert!(!apply_recall(&mut appt, Some(RecallChoice::ToBeRecalled)));
    }

    #[test]
    fn partial_mammography_clears_reinvite() {
        let mut appt = appointment();
        appt.reinvite = true;
        assert!(apply_recall(&mut appt, Some(RecallChoice::PartialMammography)));
        assert!(!appt.reinvite);
    }

    #[test]
    fn no_choice_leaves_the_flag() {
        let mut appt = appointment();
        appt.reinvite = true;
        assert!(!apply_recall(&mut appt, None));
        assert!(appt.reinvite);
    }
}
