//! Tracks which medical information sections were reviewed for an appointment.

use crate::constants::permissions;
use crate::context::CoreContext;
use crate::error::warn_on_conflict;
use crate::models::{
    AppointmentId, MedicalInformationReview, MedicalInformationSection, ReviewId, User,
};
use crate::status;
use crate::store::Store;
use crate::{WorkflowError, WorkflowResult};
use serde::Serialize;
use std::collections::BTreeSet;

/// The result of marking a section reviewed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "review", rename_all = "snake_case")]
pub enum ReviewOutcome {
    Reviewed(MedicalInformationReview),
    /// The section had been reviewed before, possibly by someone else.
    AlreadyReviewed(MedicalInformationReview),
}

impl ReviewOutcome {
    pub fn review(&self) -> &MedicalInformationReview {
        match self {
            ReviewOutcome::Reviewed(row) | ReviewOutcome::AlreadyReviewed(row) => row,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, ReviewOutcome::Reviewed(_))
    }
}

pub struct ReviewTracker<S> {
    ctx: CoreContext<S>,
}

impl<S: Store> ReviewTracker<S> {
    pub fn new(ctx: CoreContext<S>) -> Self {
        Self { ctx }
    }

    /// Records the review once. Later calls return the first review unchanged.
    pub fn mark_reviewed(
        &self,
        appointment_id: AppointmentId,
        section: MedicalInformationSection,
        actor: &User,
    ) -> WorkflowResult<ReviewOutcome> {
        let mut auditor = self.ctx.auditor(actor);
        let outcome = self.ctx.store.atomic(|tx| {
            self.ctx.authorize(
                tx,
                appointment_id,
                actor,
                permissions::MANAGE_MEDICAL_INFORMATION,
            )?;

            if let Some(existing) = tx.review(appointment_id, section)? {
                return Ok(ReviewOutcome::AlreadyReviewed(existing));
            }

            let current = status::latest(tx, appointment_id)?.name();
            if current.is_terminal() {
                return Err(WorkflowError::InvalidStatus(current));
            }

            let row = MedicalInformationReview {
                id: ReviewId::from_uuid(self.ctx.ids.new_id()),
                appointment_id,
                section,
                reviewed_by: actor.id,
                created_at: self.ctx.clock.now(),
            };
            tx.insert_review(&row)?;
            auditor.audit_create(&row)?;
            auditor.flush(tx)?;
            Ok(ReviewOutcome::Reviewed(row))
        });
        let outcome = warn_on_conflict(outcome, "mark reviewed", appointment_id, actor.id)?;

        match &outcome {
            ReviewOutcome::Reviewed(_) => tracing::info!(
                appointment = %appointment_id,
                section = section.label(),
                user = %actor.id,
                "section reviewed"
            ),
            ReviewOutcome::AlreadyReviewed(row) => tracing::debug!(
                appointment = %appointment_id,
                section = section.label(),
                reviewed_by = %row.reviewed_by,
                "section already reviewed"
            ),
        }
        Ok(outcome)
    }

    pub fn reviewed_sections(
        &self,
        appointment_id: AppointmentId,
        actor: &User,
    ) -> WorkflowResult<BTreeSet<MedicalInformationSection>> {
        self.ctx.store.read(|tx| {
            self.ctx.authorize(
                tx,
                appointment_id,
                actor,
                permissions::MANAGE_MEDICAL_INFORMATION,
            )?;
            Ok(tx
                .reviews(appointment_id)?
                .into_iter()
                .map(|row| row.section)
                .collect())
        })
    }

    pub fn all_sections_reviewed(
        &self,
        appointment_id: AppointmentId,
        actor: &User,
    ) -> WorkflowResult<bool> {
        let reviewed = self.reviewed_sections(appointment_id, actor)?;
        Ok(MedicalInformationSection::ALL
            .iter()
            .all(|section| reviewed.contains(section)))
    }
}
