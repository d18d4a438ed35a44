//! Storage contract for the workflow core.
//!
//! Services never hold records between calls. Every operation opens a unit of work with
//! [`Store::atomic`], reads and writes through the [`Transaction`] it is handed, and either
//! commits everything (closure returns `Ok`) or nothing (closure returns `Err`).
//!
//! Implementations must enforce these constraints at write time:
//! - `(appointment_id, name)` is unique in the status log
//! - `(appointment_id, step_name)` rows may repeat; the ledger is append-only
//! - one study per appointment
//! - `(study_id, view)` is unique among series, and every series passes [`Series::validate`]
//! - `(appointment_id, section)` is unique among reviews
//!
//! A uniqueness or validation failure is reported as [`WorkflowError::InvariantViolation`].
//!
//! [`WorkflowError::InvariantViolation`]: crate::WorkflowError::InvariantViolation

mod memory;

pub use memory::InMemoryStore;

use crate::audit::AuditSink;
use crate::models::{
    Appointment, AppointmentId, AppointmentStatus, MedicalInformationReview,
    MedicalInformationSection, Participant, ProviderId, Series, StepCompletion, Study, StudyId,
};
use crate::WorkflowResult;
use std::collections::HashMap;

/// Reads and writes available inside one unit of work.
pub trait Transaction: AuditSink {
    // Scheduling context (read only).

    fn appointment(&self, id: AppointmentId) -> WorkflowResult<Appointment>;

    /// Resolves the provider through slot, clinic and setting.
    fn provider_for_appointment(&self, id: AppointmentId) -> WorkflowResult<ProviderId>;

    fn participant_for_appointment(&self, id: AppointmentId) -> WorkflowResult<Participant>;

    fn update_appointment(&mut self, appointment: &Appointment) -> WorkflowResult<()>;

    // Status log.

    fn append_status(&mut self, row: AppointmentStatus) -> WorkflowResult<()>;

    fn latest_status(&self, id: AppointmentId) -> WorkflowResult<Option<AppointmentStatus>>;

    /// The latest row for each id that has one. Ids without rows are absent.
    fn latest_statuses(
        &self,
        ids: &[AppointmentId],
    ) -> WorkflowResult<HashMap<AppointmentId, AppointmentStatus>>;

    /// All rows, newest first.
    fn status_history(&self, id: AppointmentId) -> WorkflowResult<Vec<AppointmentStatus>>;

    // Step ledger.

    fn insert_step_completion(&mut self, row: StepCompletion) -> WorkflowResult<()>;

    /// All rows, oldest first.
    fn step_completions(&self, id: AppointmentId) -> WorkflowResult<Vec<StepCompletion>>;

    // Studies and series.

    fn study(&self, id: StudyId) -> WorkflowResult<Study>;

    fn study_for_appointment(&self, id: AppointmentId) -> WorkflowResult<Option<Study>>;

    fn insert_study(&mut self, study: &Study) -> WorkflowResult<()>;

    fn update_study(&mut self, study: &Study) -> WorkflowResult<()>;

    /// Fails while the study still has series.
    fn delete_study(&mut self, id: StudyId) -> WorkflowResult<()>;

    /// Series of a study, right craniocaudal first.
    fn series_for_study(&self, id: StudyId) -> WorkflowResult<Vec<Series>>;

    fn insert_series(&mut self, series: &[Series]) -> WorkflowResult<()>;

    fn update_series(&mut self, series: &Series) -> WorkflowResult<()>;

    /// Removes every series of a study and returns them.
    fn delete_series_for_study(&mut self, id: StudyId) -> WorkflowResult<Vec<Series>>;

    // Medical information reviews.

    fn review(
        &self,
        id: AppointmentId,
        section: MedicalInformationSection,
    ) -> WorkflowResult<Option<MedicalInformationReview>>;

    fn insert_review(&mut self, row: &MedicalInformationReview) -> WorkflowResult<()>;

    /// Reviews in the order they were recorded.
    fn reviews(&self, id: AppointmentId) -> WorkflowResult<Vec<MedicalInformationReview>>;
}

/// A transactional store.
pub trait Store: Send + Sync {
    /// Runs `f` as one unit of work. Writes are kept only if `f` returns `Ok`.
    fn atomic<T, F>(&self, f: F) -> WorkflowResult<T>
    where
        F: FnOnce(&mut dyn Transaction) -> WorkflowResult<T>;

    /// Runs a read-only unit of work.
    fn read<T, F>(&self, f: F) -> WorkflowResult<T>
    where
        F: FnOnce(&dyn Transaction) -> WorkflowResult<T>,
    {
        self.atomic(|tx| f(tx))
    }
}
