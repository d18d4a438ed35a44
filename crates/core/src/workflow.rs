//! The appointment workflow.
//!
//! [`AppointmentWorkflow::apply`] is the single entry point for changing an appointment. One
//! call runs in one unit of work and writes, in order: the status row, the step ledger row,
//! any study or appointment changes, then the audit rows. Either all of it is committed or
//! none of it.
//!
//! Repeating an action that produced the current status is a no-op for the user who did it
//! and an [`WorkflowError::ActionPerformedByDifferentUser`] for anyone else.

use crate::audit::Auditor;
use crate::constants::permissions;
use crate::context::CoreContext;
use crate::models::{
    AppointmentId, AppointmentStatus, AppointmentStatusName, StepCompletion, StepName,
    StoppedReasons, User,
};
use crate::state_machine::{AppointmentAction, AppointmentStateMachine};
use crate::status::{self, CurrentStatus};
use crate::steps::{self, StepState};
use crate::store::{Store, Transaction};
use crate::study::{self, StudyChange, StudyInput};
use crate::error::warn_on_conflict;
use crate::{WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How images are recorded when `take_images` runs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageCapture {
    /// Replace any study with the four standard views, one image each.
    StandardSet,
    Detailed(StudyInput),
    /// Images were recorded beforehand. The appointment must already have a study.
    #[default]
    KeepExisting,
}

/// Why an appointment stopped before screening, and whether to invite the participant back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoppedDetails {
    pub reasons: StoppedReasons,
    pub reinvite: bool,
}

/// Extra input some actions need.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionParams {
    #[default]
    None,
    Images(ImageCapture),
    Stopped(StoppedDetails),
}

/// Conditions reported alongside a successful transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowSignal {
    /// The acting user is not the one who last confirmed identity. They have taken the
    /// appointment over and must confirm identity again.
    IdentityInvalidated,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppliedTransition {
    pub action: AppointmentAction,
    /// The current status once the action has been applied.
    pub status: CurrentStatus,
    /// A new status row was written.
    pub changed: bool,
    pub ledger_delta: Option<StepCompletion>,
    pub study_delta: Option<StudyChange>,
    pub signals: Vec<WorkflowSignal>,
}

/// Appointment counts for the clinic list filters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FilterCounts {
    /// Still to be seen: scheduled or checked in.
    pub remaining: usize,
    pub checked_in: usize,
    /// In a terminal status.
    pub complete: usize,
    pub all: usize,
}

/// Everything the guards need to know about one appointment.
struct Snapshot {
    history: Vec<AppointmentStatus>,
    current: CurrentStatus,
    ledger: Vec<StepCompletion>,
    machine: AppointmentStateMachine,
}

impl Snapshot {
    fn load(
        tx: &dyn Transaction,
        appointment_id: AppointmentId,
        actor: &User,
    ) -> WorkflowResult<Self> {
        let history = status::history(tx, appointment_id)?;
        let current = CurrentStatus::from(history.first().cloned());
        let ledger = tx.step_completions(appointment_id)?;
        let machine = AppointmentStateMachine::new(
            current.name(),
            steps::is_identity_invalidated(&ledger, actor.id),
        )
        .with_effective_state(status::effective_status(&history));

        Ok(Self {
            history,
            current,
            ledger,
            machine,
        })
    }

    fn has_entered(&self, name: AppointmentStatusName) -> bool {
        self.history.iter().any(|row| row.name == name)
    }

    fn step_is_current(&self, action: AppointmentAction, actor: &User) -> bool {
        action
            .step()
            .is_some_and(|step| steps::current_step(&self.ledger, Some(actor.id)) == Some(step))
    }

    /// Once identity has been confirmed, later clinical steps follow the ledger order of the
    /// acting user.
    fn follows_ledger(&self, action: AppointmentAction, actor: &User) -> bool {
        match action.step() {
            None | Some(StepName::ConfirmIdentity) => true,
            Some(_) => {
                steps::latest_identity_confirmation(&self.ledger).is_none()
                    || self.step_is_current(action, actor)
            }
        }
    }

    /// True if `action` would be accepted: as a transition, as a ledger-only re-completion or
    /// as a no-op repeat by the user who recorded the current status.
    fn allows(&self, action: AppointmentAction, actor: &User) -> bool {
        let target = self.machine.target(action);
        if self.current.name() == target {
            self.current.created_by() == Some(actor.id)
        } else if self.has_entered(target) {
            self.machine
                .can_recomplete(action, self.step_is_current(action, actor))
        } else {
            self.machine.can(action) && self.follows_ledger(action, actor)
        }
    }
}

pub struct AppointmentWorkflow<S> {
    ctx: CoreContext<S>,
}

impl<S: Store> AppointmentWorkflow<S> {
    pub fn new(ctx: CoreContext<S>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &CoreContext<S> {
        &self.ctx
    }

    /// Applies `action` to the appointment on behalf of `actor`.
    pub fn apply(
        &self,
        appointment_id: AppointmentId,
        action: AppointmentAction,
        actor: &User,
        params: ActionParams,
    ) -> WorkflowResult<AppliedTransition> {
        check_params(action, &params)?;

        let mut auditor = self.ctx.auditor(actor);
        let applied = self.ctx.store.atomic(|tx| {
            self.ctx
                .authorize(tx, appointment_id, actor, action.permission())?;
            let applied = self.apply_in(tx, &mut auditor, appointment_id, action, actor, params)?;
            auditor.flush(tx)?;
            Ok(applied)
        });
        let applied = warn_on_conflict(applied, action.as_str(), appointment_id, actor.id)?;

        if applied.changed || applied.ledger_delta.is_some() {
            tracing::info!(
                appointment = %appointment_id,
                action = action.as_str(),
                status = %applied.status.name(),
                user = %actor.id,
                ledger_only = !applied.changed,
                "applied appointment action"
            );
        }
        Ok(applied)
    }

    fn apply_in(
        &self,
        tx: &mut dyn Transaction,
        auditor: &mut Auditor,
        appointment_id: AppointmentId,
        action: AppointmentAction,
        actor: &User,
        params: ActionParams,
    ) -> WorkflowResult<AppliedTransition> {
        let snapshot = Snapshot::load(tx, appointment_id, actor)?;
        let mut machine = snapshot.machine;
        let target = machine.target(action);

        if snapshot.current.name() == target {
            return repeat_of_current(snapshot.current, action, actor);
        }

        let mut applied = AppliedTransition {
            action,
            status: snapshot.current.clone(),
            changed: false,
            ledger_delta: None,
            study_delta: None,
            signals: Vec::new(),
        };

        if snapshot.has_entered(target) {
            if !machine.can_recomplete(action, snapshot.step_is_current(action, actor)) {
                return Err(WorkflowError::InvalidStatus(target));
            }
        } else {
            if !snapshot.follows_ledger(action, actor) {
                return Err(WorkflowError::InvalidStatus(target));
            }
            machine.perform(action)?;
            let at = self.ctx.clock.now();
            let row = match status::append(
                tx,
                &*self.ctx.ids,
                appointment_id,
                target,
                actor.id,
                at,
            ) {
                Ok(row) => row,
                Err(WorkflowError::InvariantViolation(message)) => {
                    let latest = status::latest(tx, appointment_id)?;
                    if latest.name() == target && latest.created_by() == Some(actor.id) {
                        return repeat_of_current(latest, action, actor);
                    }
                    return Err(WorkflowError::InvariantViolation(message));
                }
                Err(err) => return Err(err),
            };
            auditor.audit_create(&row)?;
            applied.status = CurrentStatus::Recorded(row);
            applied.changed = true;

            if target == AppointmentStatusName::TakenOver {
                applied.signals.push(WorkflowSignal::IdentityInvalidated);
            }
        }

        if let Some(step) = action.step() {
            let row = steps::record(
                tx,
                &*self.ctx.ids,
                appointment_id,
                step,
                actor.id,
                self.ctx.clock.now(),
            )?;
            auditor.audit_create(&row)?;
            applied.ledger_delta = Some(row);
        }

        match (action, params) {
            (AppointmentAction::TakeImages, ActionParams::Images(capture)) => {
                applied.study_delta =
                    self.capture_images(tx, auditor, appointment_id, capture)?;
            }
            (AppointmentAction::TakeImages, ActionParams::None) => {
                applied.study_delta = self.capture_images(
                    tx,
                    auditor,
                    appointment_id,
                    ImageCapture::KeepExisting,
                )?;
            }
            (AppointmentAction::MarkAttendedNotScreened, ActionParams::Stopped(details)) => {
                let mut appointment = tx.appointment(appointment_id)?;
                appointment.stopped_reasons = Some(details.reasons);
                appointment.reinvite = details.reinvite;
                tx.update_appointment(&appointment)?;
                auditor.audit_update(&appointment)?;
            }
            _ => {}
        }

        Ok(applied)
    }

    fn capture_images(
        &self,
        tx: &mut dyn Transaction,
        auditor: &mut Auditor,
        appointment_id: AppointmentId,
        capture: ImageCapture,
    ) -> WorkflowResult<Option<StudyChange>> {
        let ids = &*self.ctx.ids;
        match capture {
            ImageCapture::StandardSet => {
                study::replace_with_default_series(tx, ids, auditor, appointment_id).map(Some)
            }
            ImageCapture::Detailed(input) => {
                study::record_images(tx, ids, auditor, appointment_id, &input).map(Some)
            }
            ImageCapture::KeepExisting => {
                if tx.study_for_appointment(appointment_id)?.is_none() {
                    return Err(WorkflowError::InvalidInput(
                        "no images have been recorded for this appointment".into(),
                    ));
                }
                Ok(None)
            }
        }
    }

    pub fn check_in(&self, id: AppointmentId, actor: &User) -> WorkflowResult<AppliedTransition> {
        self.apply(id, AppointmentAction::CheckIn, actor, ActionParams::None)
    }

    pub fn cancel(&self, id: AppointmentId, actor: &User) -> WorkflowResult<AppliedTransition> {
        self.apply(id, AppointmentAction::Cancel, actor, ActionParams::None)
    }

    pub fn mark_did_not_attend(
        &self,
        id: AppointmentId,
        actor: &User,
    ) -> WorkflowResult<AppliedTransition> {
        self.apply(id, AppointmentAction::MarkDidNotAttend, actor, ActionParams::None)
    }

    pub fn start(&self, id: AppointmentId, actor: &User) -> WorkflowResult<AppliedTransition> {
        self.apply(id, AppointmentAction::Start, actor, ActionParams::None)
    }

    pub fn confirm_identity(
        &self,
        id: AppointmentId,
        actor: &User,
    ) -> WorkflowResult<AppliedTransition> {
        self.apply(id, AppointmentAction::ConfirmIdentity, actor, ActionParams::None)
    }

    pub fn review_medical_information(
        &self,
        id: AppointmentId,
        actor: &User,
    ) -> WorkflowResult<AppliedTransition> {
        self.apply(
            id,
            AppointmentAction::ReviewMedicalInformation,
            actor,
            ActionParams::None,
        )
    }

    pub fn take_images(
        &self,
        id: AppointmentId,
        actor: &User,
        capture: ImageCapture,
    ) -> WorkflowResult<AppliedTransition> {
        self.apply(
            id,
            AppointmentAction::TakeImages,
            actor,
            ActionParams::Images(capture),
        )
    }

    pub fn screen(
        &self,
        id: AppointmentId,
        actor: &User,
        partial: bool,
    ) -> WorkflowResult<AppliedTransition> {
        let action = if partial {
            AppointmentAction::PartialScreen
        } else {
            AppointmentAction::Screen
        };
        self.apply(id, action, actor, ActionParams::None)
    }

    pub fn pause(&self, id: AppointmentId, actor: &User) -> WorkflowResult<AppliedTransition> {
        self.apply(id, AppointmentAction::Pause, actor, ActionParams::None)
    }

    pub fn resume(&self, id: AppointmentId, actor: &User) -> WorkflowResult<AppliedTransition> {
        self.apply(id, AppointmentAction::Resume, actor, ActionParams::None)
    }

    pub fn mark_attended_not_screened(
        &self,
        id: AppointmentId,
        actor: &User,
        details: StoppedDetails,
    ) -> WorkflowResult<AppliedTransition> {
        self.apply(
            id,
            AppointmentAction::MarkAttendedNotScreened,
            actor,
            ActionParams::Stopped(details),
        )
    }

    /// True if `actor` may apply `action` now. Failures to read state count as no.
    pub fn can(&self, id: AppointmentId, action: AppointmentAction, actor: &User) -> bool {
        let result = self.ctx.store.read(|tx| {
            let scope_ok = self
                .ctx
                .authorize(tx, id, actor, action.permission())
                .is_ok();
            Ok(scope_ok && Snapshot::load(tx, id, actor)?.allows(action, actor))
        });
        match result {
            Ok(allowed) => allowed,
            Err(err) => {
                tracing::warn!(appointment = %id, action = action.as_str(), error = %err, "could not evaluate action");
                false
            }
        }
    }

    pub fn current(&self, id: AppointmentId) -> WorkflowResult<CurrentStatus> {
        self.ctx.store.read(|tx| status::latest(tx, id))
    }

    pub fn current_many(
        &self,
        ids: &[AppointmentId],
    ) -> WorkflowResult<HashMap<AppointmentId, CurrentStatus>> {
        self.ctx.store.read(|tx| status::latest_for_many(tx, ids))
    }

    /// Status rows, newest first.
    pub fn history(&self, id: AppointmentId) -> WorkflowResult<Vec<AppointmentStatus>> {
        self.ctx.store.read(|tx| status::history(tx, id))
    }

    /// Step states under the latest identity confirmation.
    pub fn steps(&self, id: AppointmentId) -> WorkflowResult<Vec<StepState>> {
        self.ctx
            .store
            .read(|tx| Ok(steps::step_states(&tx.step_completions(id)?, None)))
    }

    /// Step states as `actor` sees them. Nothing is completed while their identity check is
    /// invalidated.
    pub fn steps_for(&self, id: AppointmentId, actor: &User) -> WorkflowResult<Vec<StepState>> {
        self.ctx
            .store
            .read(|tx| Ok(steps::step_states(&tx.step_completions(id)?, Some(actor.id))))
    }

    pub fn is_special_appointment(&self, id: AppointmentId, actor: &User) -> WorkflowResult<bool> {
        self.ctx.store.read(|tx| {
            self.ctx
                .authorize(tx, id, actor, permissions::VIEW_PARTICIPANT_DATA)?;
            Ok(tx.participant_for_appointment(id)?.is_special_appointment())
        })
    }

    pub fn filter_counts(&self, ids: &[AppointmentId]) -> WorkflowResult<FilterCounts> {
        let statuses = self.current_many(ids)?;
        let mut counts = FilterCounts {
            all: ids.len(),
            ..FilterCounts::default()
        };
        for id in ids {
            let name = statuses
                .get(id)
                .map_or(AppointmentStatusName::Scheduled, CurrentStatus::name);
            match name {
                AppointmentStatusName::Scheduled => counts.remaining += 1,
                AppointmentStatusName::CheckedIn => {
                    counts.remaining += 1;
                    counts.checked_in += 1;
                }
                name if name.is_terminal() => counts.complete += 1,
                _ => {}
            }
        }
        Ok(counts)
    }
}

fn repeat_of_current(
    current: CurrentStatus,
    action: AppointmentAction,
    actor: &User,
) -> WorkflowResult<AppliedTransition> {
    let name = current.name();
    if current.created_by() != Some(actor.id) {
        tracing::warn!(
            action = action.as_str(),
            status = %name,
            user = %actor.id,
            recorded_by = ?current.created_by(),
            "action already performed by a different user"
        );
        return Err(WorkflowError::ActionPerformedByDifferentUser(name));
    }

    Ok(AppliedTransition {
        action,
        status: current,
        changed: false,
        ledger_delta: None,
        study_delta: None,
        signals: Vec::new(),
    })
}

fn check_params(action: AppointmentAction, params: &ActionParams) -> WorkflowResult<()> {
    match (action, params) {
        (_, ActionParams::None) if action != AppointmentAction::MarkAttendedNotScreened => Ok(()),
        (AppointmentAction::TakeImages, ActionParams::Images(_)) => Ok(()),
        (AppointmentAction::MarkAttendedNotScreened, ActionParams::Stopped(_)) => Ok(()),
        (AppointmentAction::MarkAttendedNotScreened, _) => Err(WorkflowError::InvalidInput(
            "a reason for why this appointment cannot continue must be provided".into(),
        )),
        (action, _) => Err(WorkflowError::InvalidInput(format!(
            "{action} takes no extra input"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditLog, AuditSink};
    use crate::config::CoreConfig;
    use crate::models::{
        Appointment, ExtraNeed, ExtraNeeds, MedicalInformationReview, MedicalInformationSection,
        Participant, ParticipantId, Provider, ProviderId, Series, StepName, StoppedReason, Study,
        StudyId, SupportReason, UserId,
    };
    use crate::store::InMemoryStore;
    use chrono::{NaiveDate, TimeZone, Utc};
    use screening_ids::{IdMinter, ManualClock, SequentialIdMinter, Uuid};
    use screening_types::NonEmptyText;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::{Arc, Mutex};
    use AppointmentStatusName::*;

    struct Fixture {
        workflow: AppointmentWorkflow<InMemoryStore>,
        store: Arc<InMemoryStore>,
        appointment_id: AppointmentId,
        provider_id: ProviderId,
    }

    impl Fixture {
        fn clinician(&self, n: u128) -> User {
            User::new(
                UserId::from_uuid(Uuid::from_u128(n)),
                NonEmptyText::new(format!("Clinician {n}")).unwrap(),
                Some(self.provider_id),
            )
            .with_groups(["Clinical"])
        }

        fn admin(&self, n: u128) -> User {
            User::new(
                UserId::from_uuid(Uuid::from_u128(n)),
                NonEmptyText::new(format!("Admin {n}")).unwrap(),
                Some(self.provider_id),
            )
            .with_groups(["Administrative"])
        }
    }

    fn fixture_with(extra_needs: ExtraNeeds) -> Fixture {
        let ids = Arc::new(SequentialIdMinter::starting_at(1_000));
        let store = Arc::new(InMemoryStore::new());
        let provider = Provider {
            id: ProviderId::from_uuid(ids.new_id()),
            name: NonEmptyText::new("Central Screening").unwrap(),
        };
        let participant = Participant {
            id: ParticipantId::from_uuid(ids.new_id()),
            first_name: NonEmptyText::new("Rose").unwrap(),
            last_name: NonEmptyText::new("Green").unwrap(),
            date_of_birth: NaiveDate::from_ymd_opt(1962, 11, 20).unwrap(),
            ethnic_background_id: None,
            extra_needs,
        };
        let start = Utc.with_ymd_and_hms(2025, 7, 7, 9, 0, 0).unwrap();
        let appointment_id = store
            .seed_appointment(&*ids, &provider, participant, start)
            .unwrap();
        let ctx = CoreContext::new(
            Arc::new(CoreConfig::with_default_ruleset().unwrap()),
            Arc::clone(&store),
            Arc::new(ManualClock::starting_at(start)),
            ids,
        );
        Fixture {
            workflow: AppointmentWorkflow::new(ctx),
            store,
            appointment_id,
            provider_id: provider.id,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(ExtraNeeds::new())
    }

    #[test]
    fn check_in_writes_status_and_audit() {
        let f = fixture();
        let admin = f.admin(1);
        let applied = f.workflow.check_in(f.appointment_id, &admin).unwrap();
        assert!(applied.changed);
        assert_eq!(applied.status.name(), CheckedIn);
        assert!(applied.ledger_delta.is_none());

        let logs = f.store.audit_logs().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].object_type, "appointment_status");
        assert_eq!(logs[0].actor, admin.id);
    }

    #[test]
    fn repeat_by_same_user_is_a_no_op() {
        let f = fixture();
        let admin = f.admin(1);
        let first = f.workflow.check_in(f.appointment_id, &admin).unwrap();
        let second = f.workflow.check_in(f.appointment_id, &admin).unwrap();
        assert!(!second.changed);
        assert_eq!(second.status, first.status);
        assert_eq!(f.workflow.history(f.appointment_id).unwrap().len(), 1);
    }

    #[test]
    fn repeat_by_another_user_is_refused() {
        let f = fixture();
        f.workflow.check_in(f.appointment_id, &f.admin(1)).unwrap();
        assert!(matches!(
            f.workflow.check_in(f.appointment_id, &f.admin(2)),
            Err(WorkflowError::ActionPerformedByDifferentUser(CheckedIn))
        ));
    }

    #[test]
    fn can_agrees_with_apply_on_repeats() {
        let f = fixture();
        let id = f.appointment_id;
        f.workflow.check_in(id, &f.admin(1)).unwrap();
        assert!(f.workflow.can(id, AppointmentAction::CheckIn, &f.admin(1)));
        assert!(!f.workflow.can(id, AppointmentAction::CheckIn, &f.admin(2)));
    }

    /// Wraps [`InMemoryStore`] so the next status append loses a race: a row with the same
    /// name, recorded by `winner`, lands first and the append reports the unique conflict.
    struct RacingStore {
        inner: InMemoryStore,
        winner: Mutex<Option<UserId>>,
    }

    impl Store for RacingStore {
        fn atomic<T, F>(&self, f: F) -> WorkflowResult<T>
        where
            F: FnOnce(&mut dyn Transaction) -> WorkflowResult<T>,
        {
            self.inner.atomic(|tx| {
                f(&mut RacingTransaction {
                    inner: tx,
                    winner: &self.winner,
                })
            })
        }
    }

    struct RacingTransaction<'a> {
        inner: &'a mut dyn Transaction,
        winner: &'a Mutex<Option<UserId>>,
    }

    impl AuditSink for RacingTransaction<'_> {
        fn write_audit_logs(&mut self, logs: &[AuditLog]) -> WorkflowResult<()> {
            self.inner.write_audit_logs(logs)
        }
    }

    impl Transaction for RacingTransaction<'_> {
        fn appointment(&self, id: AppointmentId) -> WorkflowResult<Appointment> {
            self.inner.appointment(id)
        }

        fn provider_for_appointment(&self, id: AppointmentId) -> WorkflowResult<ProviderId> {
            self.inner.provider_for_appointment(id)
        }

        fn participant_for_appointment(&self, id: AppointmentId) -> WorkflowResult<Participant> {
            self.inner.participant_for_appointment(id)
        }

        fn update_appointment(&mut self, appointment: &Appointment) -> WorkflowResult<()> {
            self.inner.update_appointment(appointment)
        }

        fn append_status(&mut self, row: AppointmentStatus) -> WorkflowResult<()> {
            let winner = self.winner.lock().unwrap().take();
            match winner {
                Some(winner) => {
                    self.inner.append_status(AppointmentStatus {
                        created_by: winner,
                        ..row.clone()
                    })?;
                    self.inner.append_status(row)
                }
                None => self.inner.append_status(row),
            }
        }

        fn latest_status(&self, id: AppointmentId) -> WorkflowResult<Option<AppointmentStatus>> {
            self.inner.latest_status(id)
        }

        fn latest_statuses(
            &self,
            ids: &[AppointmentId],
        ) -> WorkflowResult<HashMap<AppointmentId, AppointmentStatus>> {
            self.inner.latest_statuses(ids)
        }

        fn status_history(&self, id: AppointmentId) -> WorkflowResult<Vec<AppointmentStatus>> {
            self.inner.status_history(id)
        }

        fn insert_step_completion(&mut self, row: StepCompletion) -> WorkflowResult<()> {
            self.inner.insert_step_completion(row)
        }

        fn step_completions(&self, id: AppointmentId) -> WorkflowResult<Vec<StepCompletion>> {
            self.inner.step_completions(id)
        }

        fn study(&self, id: StudyId) -> WorkflowResult<Study> {
            self.inner.study(id)
        }

        fn study_for_appointment(&self, id: AppointmentId) -> WorkflowResult<Option<Study>> {
            self.inner.study_for_appointment(id)
        }

        fn insert_study(&mut self, study: &Study) -> WorkflowResult<()> {
            self.inner.insert_study(study)
        }

        fn update_study(&mut self, study: &Study) -> WorkflowResult<()> {
            self.inner.update_study(study)
        }

        fn delete_study(&mut self, id: StudyId) -> WorkflowResult<()> {
            self.inner.delete_study(id)
        }

        fn series_for_study(&self, id: StudyId) -> WorkflowResult<Vec<Series>> {
            self.inner.series_for_study(id)
        }

        fn insert_series(&mut self, series: &[Series]) -> WorkflowResult<()> {
            self.inner.insert_series(series)
        }

        fn update_series(&mut self, series: &Series) -> WorkflowResult<()> {
            self.inner.update_series(series)
        }

        fn delete_series_for_study(&mut self, id: StudyId) -> WorkflowResult<Vec<Series>> {
            self.inner.delete_series_for_study(id)
        }

        fn review(
            &self,
            id: AppointmentId,
            section: MedicalInformationSection,
        ) -> WorkflowResult<Option<MedicalInformationReview>> {
            self.inner.review(id, section)
        }

        fn insert_review(&mut self, row: &MedicalInformationReview) -> WorkflowResult<()> {
            self.inner.insert_review(row)
        }

        fn reviews(&self, id: AppointmentId) -> WorkflowResult<Vec<MedicalInformationReview>> {
            self.inner.reviews(id)
        }
    }

    fn racing_workflow(
        winner: UserId,
    ) -> (AppointmentWorkflow<RacingStore>, AppointmentId, ProviderId) {
        let Fixture {
            workflow,
            store,
            appointment_id,
            provider_id,
        } = fixture();
        drop(workflow);
        let store = Arc::new(RacingStore {
            inner: Arc::into_inner(store).unwrap(),
            winner: Mutex::new(Some(winner)),
        });
        let start = Utc.with_ymd_and_hms(2025, 7, 7, 9, 0, 0).unwrap();
        let ctx = CoreContext::new(
            Arc::new(CoreConfig::with_default_ruleset().unwrap()),
            store,
            Arc::new(ManualClock::starting_at(start)),
            Arc::new(SequentialIdMinter::starting_at(5_000)),
        );
        (AppointmentWorkflow::new(ctx), appointment_id, provider_id)
    }

    fn admin_of(provider_id: ProviderId, n: u128) -> User {
        User::new(
            UserId::from_uuid(Uuid::from_u128(n)),
            NonEmptyText::new(format!("Admin {n}")).unwrap(),
            Some(provider_id),
        )
        .with_groups(["Administrative"])
    }

    #[test]
    fn conflict_with_own_concurrent_write_is_a_no_op() {
        let admin_id = UserId::from_uuid(Uuid::from_u128(1));
        let (workflow, id, provider_id) = racing_workflow(admin_id);
        let admin = admin_of(provider_id, 1);

        let applied = workflow.check_in(id, &admin).unwrap();
        assert!(!applied.changed);
        assert_eq!(applied.status.name(), CheckedIn);
        assert_eq!(applied.status.created_by(), Some(admin.id));

        let history = workflow.history(id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].created_by, admin.id);
    }

    #[test]
    fn conflict_with_another_users_write_is_surfaced() {
        let (workflow, id, provider_id) = racing_workflow(UserId::from_uuid(Uuid::from_u128(2)));
        let admin = admin_of(provider_id, 1);

        assert!(matches!(
            workflow.check_in(id, &admin),
            Err(WorkflowError::InvariantViolation(_))
        ));
        assert!(workflow.history(id).unwrap().is_empty());
    }

    #[test]
    fn clinical_steps_write_ledger_rows() {
        let f = fixture();
        let u1 = f.clinician(1);
        let id = f.appointment_id;
        f.workflow.start(id, &u1).unwrap();
        let confirmed = f.workflow.confirm_identity(id, &u1).unwrap();
        assert_eq!(
            confirmed.ledger_delta.map(|row| row.step_name),
            Some(StepName::ConfirmIdentity)
        );
        f.workflow.review_medical_information(id, &u1).unwrap();
        let imaged = f
            .workflow
            .take_images(id, &u1, ImageCapture::StandardSet)
            .unwrap();
        assert_eq!(imaged.study_delta.unwrap().record.series.len(), 4);
        let screened = f.workflow.screen(id, &u1, false).unwrap();
        assert_eq!(screened.status.name(), Screened);

        let states = f.workflow.steps_for(id, &u1).unwrap();
        assert!(states.iter().all(|state| state.completed));
    }

    #[test]
    fn administrative_users_cannot_start() {
        let f = fixture();
        assert!(matches!(
            f.workflow.start(f.appointment_id, &f.admin(1)),
            Err(WorkflowError::NotAuthorized { .. })
        ));
        assert!(!f
            .workflow
            .can(f.appointment_id, AppointmentAction::Start, &f.admin(1)));
        assert!(f
            .workflow
            .can(f.appointment_id, AppointmentAction::Start, &f.clinician(2)));
    }

    #[test]
    fn illegal_transition_leaves_no_trace() {
        let f = fixture();
        let u1 = f.clinician(1);
        assert!(matches!(
            f.workflow.screen(f.appointment_id, &u1, true),
            Err(WorkflowError::InvalidStatus(PartiallyScreened))
        ));
        assert!(f.workflow.history(f.appointment_id).unwrap().is_empty());
        assert!(f.store.audit_logs().unwrap().is_empty());
    }

    #[test]
    fn keep_existing_needs_a_study() {
        let f = fixture();
        let u1 = f.clinician(1);
        let id = f.appointment_id;
        f.workflow.start(id, &u1).unwrap();
        f.workflow.confirm_identity(id, &u1).unwrap();
        f.workflow.review_medical_information(id, &u1).unwrap();

        assert!(matches!(
            f.workflow.take_images(id, &u1, ImageCapture::KeepExisting),
            Err(WorkflowError::InvalidInput(_))
        ));
        assert_eq!(f.workflow.current(id).unwrap().name(), MedicalInformationReviewed);
    }

    #[test]
    fn takeover_requires_reconfirmation() {
        let f = fixture();
        let (u1, u2) = (f.clinician(1), f.clinician(2));
        let id = f.appointment_id;
        f.workflow.start(id, &u1).unwrap();
        f.workflow.confirm_identity(id, &u1).unwrap();
        f.workflow.review_medical_information(id, &u1).unwrap();
        f.workflow.pause(id, &u1).unwrap();

        let resumed = f.workflow.resume(id, &u2).unwrap();
        assert_eq!(resumed.status.name(), TakenOver);
        assert_eq!(resumed.signals, vec![WorkflowSignal::IdentityInvalidated]);

        assert!(matches!(
            f.workflow
                .take_images(id, &u2, ImageCapture::StandardSet),
            Err(WorkflowError::InvalidStatus(ImagesTaken))
        ));

        let reconfirmed = f.workflow.confirm_identity(id, &u2).unwrap();
        assert!(!reconfirmed.changed);
        assert_eq!(reconfirmed.status.name(), TakenOver);
        assert!(reconfirmed.ledger_delta.is_some());

        // Review was done by the previous clinician; redoing it writes only the ledger.
        let reviewed = f.workflow.review_medical_information(id, &u2).unwrap();
        assert!(!reviewed.changed);
        assert_eq!(
            reviewed.ledger_delta.map(|row| row.step_name),
            Some(StepName::ReviewMedicalInformation)
        );

        let imaged = f
            .workflow
            .take_images(id, &u2, ImageCapture::StandardSet)
            .unwrap();
        assert_eq!(imaged.status.name(), ImagesTaken);
        assert!(imaged.changed);
    }

    #[test]
    fn resume_by_same_user_is_not_a_takeover() {
        let f = fixture();
        let u1 = f.clinician(1);
        let id = f.appointment_id;
        f.workflow.start(id, &u1).unwrap();
        f.workflow.confirm_identity(id, &u1).unwrap();
        f.workflow.pause(id, &u1).unwrap();
        let resumed = f.workflow.resume(id, &u1).unwrap();
        assert_eq!(resumed.status.name(), Resumed);
        assert!(resumed.signals.is_empty());
        f.workflow.review_medical_information(id, &u1).unwrap();
    }

    #[test]
    fn attended_not_screened_records_reasons() {
        let f = fixture();
        let u1 = f.clinician(1);
        let id = f.appointment_id;
        f.workflow.start(id, &u1).unwrap();

        assert!(matches!(
            f.workflow
                .apply(id, AppointmentAction::MarkAttendedNotScreened, &u1, ActionParams::None),
            Err(WorkflowError::InvalidInput(_))
        ));

        let reasons = StoppedReasons::new(
            BTreeSet::from([StoppedReason::PainDuringScreening]),
            BTreeMap::new(),
        )
        .unwrap();
        let applied = f
            .workflow
            .mark_attended_not_screened(
                id,
                &u1,
                StoppedDetails {
                    reasons: reasons.clone(),
                    reinvite: true,
                },
            )
            .unwrap();
        assert_eq!(applied.status.name(), AttendedNotScreened);

        let appointment = f.store.read(|tx| tx.appointment(id)).unwrap();
        assert!(appointment.reinvite);
        assert_eq!(appointment.stopped_reasons, Some(reasons));
    }

    #[test]
    fn params_must_match_the_action() {
        let f = fixture();
        assert!(matches!(
            f.workflow.apply(
                f.appointment_id,
                AppointmentAction::CheckIn,
                &f.admin(1),
                ActionParams::Images(ImageCapture::StandardSet)
            ),
            Err(WorkflowError::InvalidInput(_))
        ));
    }

    #[test]
    fn filter_counts_group_by_status() {
        let f = fixture();
        let other = AppointmentId::from_uuid(Uuid::from_u128(424_242));
        f.workflow.check_in(f.appointment_id, &f.admin(1)).unwrap();

        let counts = f.workflow.filter_counts(&[f.appointment_id, other]).unwrap();
        assert_eq!(
            counts,
            FilterCounts {
                remaining: 2,
                checked_in: 1,
                complete: 0,
                all: 2,
            }
        );
    }

    #[test]
    fn special_appointments_follow_extra_needs() {
        let mut needs = ExtraNeeds::new();
        needs.insert(
            SupportReason::Hearing,
            ExtraNeed {
                details: Some("Uses a hearing loop".into()),
                temporary: None,
            },
        );
        let f = fixture_with(needs);
        assert!(f
            .workflow
            .is_special_appointment(f.appointment_id, &f.admin(1))
            .unwrap());

        let plain = fixture();
        assert!(!plain
            .workflow
            .is_special_appointment(plain.appointment_id, &plain.admin(1))
            .unwrap());
    }
}
