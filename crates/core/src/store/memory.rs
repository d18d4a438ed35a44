//! In-memory [`Store`] used by tests, the CLI and embedders without a database.
//!
//! A unit of work runs against a copy of the tables under a mutex and the copy replaces the
//! live tables only when the work succeeds, so a failed operation leaves no trace.

use super::{Store, Transaction};
use crate::audit::{AuditLog, AuditSink};
use crate::models::{
    Appointment, AppointmentId, AppointmentStatus, Clinic, ClinicId, ClinicSlot, ClinicSlotId,
    MedicalInformationReview, MedicalInformationSection, Participant, ParticipantId, Provider,
    ProviderId, ScreeningEpisode, ScreeningEpisodeId, Series, Setting, SettingId,
    StepCompletion, Study, StudyId,
};
use crate::{WorkflowError, WorkflowResult};
use chrono::{DateTime, Utc};
use screening_ids::IdMinter;
use screening_types::NonEmptyText;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Clone, Debug, Default)]
struct Tables {
    providers: HashMap<ProviderId, Provider>,
    settings: HashMap<SettingId, Setting>,
    clinics: HashMap<ClinicId, Clinic>,
    clinic_slots: HashMap<ClinicSlotId, ClinicSlot>,
    participants: HashMap<ParticipantId, Participant>,
    episodes: HashMap<ScreeningEpisodeId, ScreeningEpisode>,
    appointments: HashMap<AppointmentId, Appointment>,
    /// Oldest first.
    statuses: HashMap<AppointmentId, Vec<AppointmentStatus>>,
    /// Oldest first.
    steps: HashMap<AppointmentId, Vec<StepCompletion>>,
    studies: HashMap<StudyId, Study>,
    study_by_appointment: HashMap<AppointmentId, StudyId>,
    series: HashMap<StudyId, Vec<Series>>,
    reviews: HashMap<AppointmentId, Vec<MedicalInformationReview>>,
    audit_logs: Vec<AuditLog>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    fail_audit_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent audit write fail until switched off again.
    pub fn fail_audit_writes(&self, fail: bool) {
        self.fail_audit_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> WorkflowResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| WorkflowError::StorageUnavailable("store lock poisoned".into()))
    }

    // ------------------------------------------------------------------------
    // Scheduling context. These records are owned by the booking system.
    // ------------------------------------------------------------------------

    pub fn insert_provider(&self, provider: Provider) -> WorkflowResult<()> {
        self.lock()?.providers.insert(provider.id, provider);
        Ok(())
    }

    pub fn insert_setting(&self, setting: Setting) -> WorkflowResult<()> {
        let mut tables = self.lock()?;
        if !tables.providers.contains_key(&setting.provider_id) {
            return Err(WorkflowError::not_found("provider", setting.provider_id));
        }
        tables.settings.insert(setting.id, setting);
        Ok(())
    }

    pub fn insert_clinic(&self, clinic: Clinic) -> WorkflowResult<()> {
        let mut tables = self.lock()?;
        if !tables.settings.contains_key(&clinic.setting_id) {
            return Err(WorkflowError::not_found("setting", clinic.setting_id));
        }
        tables.clinics.insert(clinic.id, clinic);
        Ok(())
    }

    pub fn insert_clinic_slot(&self, slot: ClinicSlot) -> WorkflowResult<()> {
        let mut tables = self.lock()?;
        if !tables.clinics.contains_key(&slot.clinic_id) {
            return Err(WorkflowError::not_found("clinic", slot.clinic_id));
        }
        tables.clinic_slots.insert(slot.id, slot);
        Ok(())
    }

    pub fn insert_participant(&self, participant: Participant) -> WorkflowResult<()> {
        self.lock()?.participants.insert(participant.id, participant);
        Ok(())
    }

    pub fn insert_screening_episode(&self, episode: ScreeningEpisode) -> WorkflowResult<()> {
        let mut tables = self.lock()?;
        if !tables.participants.contains_key(&episode.participant_id) {
            return Err(WorkflowError::not_found("participant", episode.participant_id));
        }
        tables.episodes.insert(episode.id, episode);
        Ok(())
    }

    pub fn insert_appointment(&self, appointment: Appointment) -> WorkflowResult<()> {
        let mut tables = self.lock()?;
        if !tables.episodes.contains_key(&appointment.screening_episode_id) {
            return Err(WorkflowError::not_found(
                "screening episode",
                appointment.screening_episode_id,
            ));
        }
        if !tables.clinic_slots.contains_key(&appointment.clinic_slot_id) {
            return Err(WorkflowError::not_found(
                "clinic slot",
                appointment.clinic_slot_id,
            ));
        }
        tables.appointments.insert(appointment.id, appointment);
        Ok(())
    }

    /// Books `participant` into a new single-slot clinic run by `provider`.
    ///
    /// The provider is added if the store does not know it yet.
    pub fn seed_appointment(
        &self,
        ids: &dyn IdMinter,
        provider: &Provider,
        participant: Participant,
        starts_at: DateTime<Utc>,
    ) -> WorkflowResult<AppointmentId> {
        if !self.lock()?.providers.contains_key(&provider.id) {
            self.insert_provider(provider.clone())?;
        }

        let setting = Setting {
            id: SettingId::from_uuid(ids.new_id()),
            provider_id: provider.id,
            name: NonEmptyText::new(format!("{} screening unit", provider.name))?,
        };
        let clinic = Clinic {
            id: ClinicId::from_uuid(ids.new_id()),
            setting_id: setting.id,
            starts_at,
        };
        let slot = ClinicSlot {
            id: ClinicSlotId::from_uuid(ids.new_id()),
            clinic_id: clinic.id,
            starts_at,
            duration_in_minutes: 6,
        };
        let episode = ScreeningEpisode {
            id: ScreeningEpisodeId::from_uuid(ids.new_id()),
            participant_id: participant.id,
            protocol: NonEmptyText::new("ROUTINE")?,
        };
        let appointment = Appointment::new(
            AppointmentId::from_uuid(ids.new_id()),
            episode.id,
            slot.id,
        );
        let appointment_id = appointment.id;

        self.insert_setting(setting)?;
        self.insert_clinic(clinic)?;
        self.insert_clinic_slot(slot)?;
        self.insert_participant(participant)?;
        self.insert_screening_episode(episode)?;
        self.insert_appointment(appointment)?;
        Ok(appointment_id)
    }

    /// Every audit row written so far, oldest first.
    pub fn audit_logs(&self) -> WorkflowResult<Vec<AuditLog>> {
        Ok(self.lock()?.audit_logs.clone())
    }
}

impl Store for InMemoryStore {
    fn atomic<T, F>(&self, f: F) -> WorkflowResult<T>
    where
        F: FnOnce(&mut dyn Transaction) -> WorkflowResult<T>,
    {
        let mut live = self.lock()?;
        let mut working = live.clone();
        let mut tx = MemoryTransaction {
            tables: &mut working,
            fail_audit_writes: self.fail_audit_writes.load(Ordering::SeqCst),
        };

        let result = f(&mut tx)?;
        *live = working;
        Ok(result)
    }

    fn read<T, F>(&self, f: F) -> WorkflowResult<T>
    where
        F: FnOnce(&dyn Transaction) -> WorkflowResult<T>,
    {
        let mut live = self.lock()?;
        let tx = MemoryTransaction {
            tables: &mut *live,
            fail_audit_writes: true,
        };
        f(&tx)
    }
}

struct MemoryTransaction<'a> {
    tables: &'a mut Tables,
    fail_audit_writes: bool,
}

impl MemoryTransaction<'_> {
    fn study_mut(&mut self, id: StudyId) -> WorkflowResult<&mut Study> {
        self.tables
            .studies
            .get_mut(&id)
            .ok_or_else(|| WorkflowError::not_found("study", id))
    }
}

impl AuditSink for MemoryTransaction<'_> {
    fn write_audit_logs(&mut self, logs: &[AuditLog]) -> WorkflowResult<()> {
        if self.fail_audit_writes {
            return Err(WorkflowError::StorageUnavailable(
                "audit log is not writable".into(),
            ));
        }
        self.tables.audit_logs.extend_from_slice(logs);
        Ok(())
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn appointment(&self, id: AppointmentId) -> WorkflowResult<Appointment> {
        self.tables
            .appointments
            .get(&id)
            .cloned()
            .ok_or_else(|| WorkflowError::not_found("appointment", id))
    }

    fn provider_for_appointment(&self, id: AppointmentId) -> WorkflowResult<ProviderId> {
        let appointment = self.appointment(id)?;
        let tables = &*self.tables;
        let slot = tables
            .clinic_slots
            .get(&appointment.clinic_slot_id)
            .ok_or_else(|| WorkflowError::not_found("clinic slot", appointment.clinic_slot_id))?;
        let clinic = tables
            .clinics
            .get(&slot.clinic_id)
            .ok_or_else(|| WorkflowError::not_found("clinic", slot.clinic_id))?;
        let setting = tables
            .settings
            .get(&clinic.setting_id)
            .ok_or_else(|| WorkflowError::not_found("setting", clinic.setting_id))?;
        Ok(setting.provider_id)
    }

    fn participant_for_appointment(&self, id: AppointmentId) -> WorkflowResult<Participant> {
        let appointment = self.appointment(id)?;
        let episode = self
            .tables
            .episodes
            .get(&appointment.screening_episode_id)
            .ok_or_else(|| {
                WorkflowError::not_found("screening episode", appointment.screening_episode_id)
            })?;
        self.tables
            .participants
            .get(&episode.participant_id)
            .cloned()
            .ok_or_else(|| WorkflowError::not_found("participant", episode.participant_id))
    }

    fn update_appointment(&mut self, appointment: &Appointment) -> WorkflowResult<()> {
        let slot = self
            .tables
            .appointments
            .get_mut(&appointment.id)
            .ok_or_else(|| WorkflowError::not_found("appointment", appointment.id))?;
        *slot = appointment.clone();
        Ok(())
    }

    fn append_status(&mut self, row: AppointmentStatus) -> WorkflowResult<()> {
        if !self.tables.appointments.contains_key(&row.appointment_id) {
            return Err(WorkflowError::not_found("appointment", row.appointment_id));
        }

        let rows = self.tables.statuses.entry(row.appointment_id).or_default();
        if rows.iter().any(|existing| existing.name == row.name) {
            return Err(WorkflowError::InvariantViolation(format!(
                "appointment {} has already been {}",
                row.appointment_id, row.name
            )));
        }

        let at = rows.partition_point(|existing| existing.created_at <= row.created_at);
        rows.insert(at, row);
        Ok(())
    }

    fn latest_status(&self, id: AppointmentId) -> WorkflowResult<Option<AppointmentStatus>> {
        Ok(self
            .tables
            .statuses
            .get(&id)
            .and_then(|rows| rows.last())
            .cloned())
    }

    fn latest_statuses(
        &self,
        ids: &[AppointmentId],
    ) -> WorkflowResult<HashMap<AppointmentId, AppointmentStatus>> {
        Ok(ids
            .iter()
            .filter_map(|id| {
                let latest = self.tables.statuses.get(id)?.last()?;
                Some((*id, latest.clone()))
            })
            .collect())
    }

    fn status_history(&self, id: AppointmentId) -> WorkflowResult<Vec<AppointmentStatus>> {
        Ok(self
            .tables
            .statuses
            .get(&id)
            .map(|rows| rows.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    fn insert_step_completion(&mut self, row: StepCompletion) -> WorkflowResult<()> {
        if !self.tables.appointments.contains_key(&row.appointment_id) {
            return Err(WorkflowError::not_found("appointment", row.appointment_id));
        }
        let rows = self.tables.steps.entry(row.appointment_id).or_default();
        let at = rows.partition_point(|existing| existing.created_at <= row.created_at);
        rows.insert(at, row);
        Ok(())
    }

    fn step_completions(&self, id: AppointmentId) -> WorkflowResult<Vec<StepCompletion>> {
        Ok(self.tables.steps.get(&id).cloned().unwrap_or_default())
    }

    fn study(&self, id: StudyId) -> WorkflowResult<Study> {
        self.tables
            .studies
            .get(&id)
            .cloned()
            .ok_or_else(|| WorkflowError::not_found("study", id))
    }

    fn study_for_appointment(&self, id: AppointmentId) -> WorkflowResult<Option<Study>> {
        Ok(self
            .tables
            .study_by_appointment
            .get(&id)
            .and_then(|study_id| self.tables.studies.get(study_id))
            .cloned())
    }

    fn insert_study(&mut self, study: &Study) -> WorkflowResult<()> {
        if !self.tables.appointments.contains_key(&study.appointment_id) {
            return Err(WorkflowError::not_found("appointment", study.appointment_id));
        }
        if self
            .tables
            .study_by_appointment
            .contains_key(&study.appointment_id)
        {
            return Err(WorkflowError::InvariantViolation(format!(
                "appointment {} already has a study",
                study.appointment_id
            )));
        }
        self.tables
            .study_by_appointment
            .insert(study.appointment_id, study.id);
        self.tables.studies.insert(study.id, study.clone());
        Ok(())
    }

    fn update_study(&mut self, study: &Study) -> WorkflowResult<()> {
        let stored = self.study_mut(study.id)?;
        if stored.appointment_id != study.appointment_id {
            return Err(WorkflowError::InvariantViolation(
                "a study cannot move to another appointment".into(),
            ));
        }
        *stored = study.clone();
        Ok(())
    }

    fn delete_study(&mut self, id: StudyId) -> WorkflowResult<()> {
        if self
            .tables
            .series
            .get(&id)
            .is_some_and(|series| !series.is_empty())
        {
            return Err(WorkflowError::InvariantViolation(format!(
                "study {id} still has series"
            )));
        }
        let study = self
            .tables
            .studies
            .remove(&id)
            .ok_or_else(|| WorkflowError::not_found("study", id))?;
        self.tables.study_by_appointment.remove(&study.appointment_id);
        self.tables.series.remove(&id);
        Ok(())
    }

    fn series_for_study(&self, id: StudyId) -> WorkflowResult<Vec<Series>> {
        let mut series = self.tables.series.get(&id).cloned().unwrap_or_default();
        series.sort_by_key(|s| s.view);
        Ok(series)
    }

    fn insert_series(&mut self, series: &[Series]) -> WorkflowResult<()> {
        for new in series {
            new.validate()?;
            if !self.tables.studies.contains_key(&new.study_id) {
                return Err(WorkflowError::not_found("study", new.study_id));
            }
            let rows = self.tables.series.entry(new.study_id).or_default();
            if rows.iter().any(|existing| existing.view == new.view) {
                return Err(WorkflowError::InvariantViolation(format!(
                    "study {} already has a {} series",
                    new.study_id, new.view
                )));
            }
            rows.push(new.clone());
        }
        Ok(())
    }

    fn update_series(&mut self, series: &Series) -> WorkflowResult<()> {
        series.validate()?;
        let stored = self
            .tables
            .series
            .get_mut(&series.study_id)
            .and_then(|rows| rows.iter_mut().find(|row| row.id == series.id))
            .ok_or_else(|| WorkflowError::not_found("series", series.id))?;
        if stored.view != series.view {
            return Err(WorkflowError::InvariantViolation(
                "a series cannot change view".into(),
            ));
        }
        *stored = series.clone();
        Ok(())
    }

    fn delete_series_for_study(&mut self, id: StudyId) -> WorkflowResult<Vec<Series>> {
        let mut removed = self.tables.series.remove(&id).unwrap_or_default();
        removed.sort_by_key(|s| s.view);
        Ok(removed)
    }

    fn review(
        &self,
        id: AppointmentId,
        section: MedicalInformationSection,
    ) -> WorkflowResult<Option<MedicalInformationReview>> {
        Ok(self
            .tables
            .reviews
            .get(&id)
            .and_then(|rows| rows.iter().find(|row| row.section == section))
            .cloned())
    }

    fn insert_review(&mut self, row: &MedicalInformationReview) -> WorkflowResult<()> {
        if !self.tables.appointments.contains_key(&row.appointment_id) {
            return Err(WorkflowError::not_found("appointment", row.appointment_id));
        }
        let rows = self.tables.reviews.entry(row.appointment_id).or_default();
        if rows.iter().any(|existing| existing.section == row.section) {
            return Err(WorkflowError::InvariantViolation(format!(
                "{:?} has already been reviewed for appointment {}",
                row.section, row.appointment_id
            )));
        }
        rows.push(row.clone());
        Ok(())
    }

    fn reviews(&self, id: AppointmentId) -> WorkflowResult<Vec<MedicalInformationReview>> {
        Ok(self.tables.reviews.get(&id).cloned().unwrap_or_default())
    }
}
