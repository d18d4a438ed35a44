//! Manually recorded images.
//!
//! An appointment has at most one study and a study has at most one series per view. Replacing
//! a study's series always removes every existing series before inserting the new set, inside
//! the same unit of work.
//!
//! Forms that edit series details read a [`SeriesFingerprint`] first and submit it back. If
//! the series changed in between the submission is refused with
//! [`WorkflowError::StaleFingerprint`].

use crate::audit::Auditor;
use crate::constants::permissions;
use crate::context::CoreContext;
use crate::error::warn_on_conflict;
use crate::models::{
    AppointmentId, ImageView, Notes, RecallChoice, Repeats, Series, SeriesId, SeriesInput,
    Study, StudyAttributes, StudyId, User,
};
use crate::recall::apply_recall;
use crate::store::{Store, Transaction};
use crate::{WorkflowError, WorkflowResult};
use screening_ids::IdMinter;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Images recorded in detail, as submitted from the image capture form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyInput {
    pub series: Vec<SeriesInput>,
    #[serde(default)]
    pub attributes: StudyAttributes,
    /// Set when a full set could not be taken.
    #[serde(default)]
    pub recall: Option<RecallChoice>,
}

/// A study with its series, right craniocaudal first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StudyRecord {
    pub study: Study,
    pub series: Vec<Series>,
}

impl StudyRecord {
    pub fn has_series_with_multiple_images(&self) -> bool {
        self.series.iter().any(Series::has_multiple_images)
    }

    /// Series still needing repeat information or holding it.
    pub fn series_with_multiple_images(&self) -> Vec<&Series> {
        self.series
            .iter()
            .filter(|series| series.has_multiple_images())
            .collect()
    }

    /// Image count for every view, zero where no series was recorded.
    pub fn series_counts(&self) -> BTreeMap<ImageView, u8> {
        let mut counts: BTreeMap<ImageView, u8> = ImageView::ALL_RCC_FIRST
            .into_iter()
            .map(|view| (view, 0))
            .collect();
        for series in &self.series {
            counts.insert(series.view, series.count);
        }
        counts
    }

    pub fn fingerprint(&self) -> SeriesFingerprint {
        SeriesFingerprint::of(&self.series)
    }
}

/// What a study write did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StudyChange {
    pub record: StudyRecord,
    /// The study row was created rather than updated.
    pub created: bool,
    /// Series removed before the new set was inserted.
    pub removed: Vec<Series>,
}

/// Hex SHA-256 over every series' id, laterality, view position and count.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeriesFingerprint(String);

impl SeriesFingerprint {
    pub fn of(series: &[Series]) -> Self {
        let mut rows: Vec<_> = series
            .iter()
            .map(|s| {
                (
                    s.id,
                    s.view.laterality.as_str(),
                    s.view.view_position.as_str(),
                    s.count,
                )
            })
            .collect();
        rows.sort();

        let mut hasher = Sha256::new();
        for (id, laterality, view_position, count) in rows {
            hasher.update(format!("{id}|{laterality}|{view_position}|{count}\n").as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Accepts a fingerprint previously handed out, as 64 hex characters.
    pub fn parse(input: &str) -> WorkflowResult<Self> {
        let trimmed = input.trim();
        if trimmed.len() != 64 || !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(WorkflowError::InvalidInput(format!(
                "'{input}' is not a series fingerprint"
            )));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Repeat information for one series.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatUpdate {
    pub series_id: SeriesId,
    pub repeats: Repeats,
}

pub(crate) fn load(
    tx: &dyn Transaction,
    appointment_id: AppointmentId,
) -> WorkflowResult<Option<StudyRecord>> {
    let Some(study) = tx.study_for_appointment(appointment_id)? else {
        return Ok(None);
    };
    let series = tx.series_for_study(study.id)?;
    Ok(Some(StudyRecord { study, series }))
}

/// Removes the study and its series if there is one.
pub(crate) fn delete_existing(
    tx: &mut dyn Transaction,
    auditor: &mut Auditor,
    appointment_id: AppointmentId,
) -> WorkflowResult<Option<StudyRecord>> {
    let Some(study) = tx.study_for_appointment(appointment_id)? else {
        return Ok(None);
    };

    let series = tx.delete_series_for_study(study.id)?;
    auditor.audit_bulk_delete(&series)?;
    auditor.audit_delete(&study)?;
    tx.delete_study(study.id)?;
    Ok(Some(StudyRecord { study, series }))
}

/// Replaces any study with a fresh one holding the four standard views, one image each.
pub(crate) fn replace_with_default_series(
    tx: &mut dyn Transaction,
    ids: &dyn IdMinter,
    auditor: &mut Auditor,
    appointment_id: AppointmentId,
) -> WorkflowResult<StudyChange> {
    let removed = delete_existing(tx, auditor, appointment_id)?
        .map(|record| record.series)
        .unwrap_or_default();

    let study = Study {
        id: StudyId::from_uuid(ids.new_id()),
        appointment_id,
        attributes: StudyAttributes::default(),
    };
    tx.insert_study(&study)?;
    auditor.audit_create(&study)?;

    let series: Vec<Series> = ImageView::STANDARD_SET
        .into_iter()
        .map(|view| Series::new(SeriesId::from_uuid(ids.new_id()), study.id, view, 1))
        .collect();
    tx.insert_series(&series)?;
    auditor.audit_bulk_create(&series)?;

    Ok(StudyChange {
        record: StudyRecord {
            series: tx.series_for_study(study.id)?,
            study,
        },
        created: true,
        removed,
    })
}

/// Updates or creates the study, then replaces its series with every input whose count is
/// not zero.
pub(crate) fn replace(
    tx: &mut dyn Transaction,
    ids: &dyn IdMinter,
    auditor: &mut Auditor,
    appointment_id: AppointmentId,
    inputs: &[SeriesInput],
    attributes: StudyAttributes,
) -> WorkflowResult<StudyChange> {
    let (study, created) = match tx.study_for_appointment(appointment_id)? {
        Some(mut study) => {
            study.attributes = attributes;
            tx.update_study(&study)?;
            auditor.audit_update(&study)?;
            (study, false)
        }
        None => {
            let study = Study {
                id: StudyId::from_uuid(ids.new_id()),
                appointment_id,
                attributes,
            };
            tx.insert_study(&study)?;
            auditor.audit_create(&study)?;
            (study, true)
        }
    };

    let removed = tx.delete_series_for_study(study.id)?;
    auditor.audit_bulk_delete(&removed)?;

    let series: Vec<Series> = inputs
        .iter()
        .filter(|input| input.count != 0)
        .map(|input| {
            Series::new(SeriesId::from_uuid(ids.new_id()), study.id, input.view, input.count)
                .with_repeats(input.repeats.clone())
        })
        .collect();
    for s in &series {
        s.validate()?;
    }
    tx.insert_series(&series)?;
    auditor.audit_bulk_create(&series)?;

    Ok(StudyChange {
        record: StudyRecord {
            series: tx.series_for_study(study.id)?,
            study,
        },
        created,
        removed,
    })
}

/// Records detailed images: completeness follows the recall choice and the appointment's
/// reinvite flag is updated in the same unit of work.
pub(crate) fn record_images(
    tx: &mut dyn Transaction,
    ids: &dyn IdMinter,
    auditor: &mut Auditor,
    appointment_id: AppointmentId,
    input: &StudyInput,
) -> WorkflowResult<StudyChange> {
    let mut attributes = input.attributes.clone();
    attributes.completeness = Some(RecallChoice::completeness(input.recall));
    let change = replace(tx, ids, auditor, appointment_id, &input.series, attributes)?;

    let mut appointment = tx.appointment(appointment_id)?;
    if apply_recall(&mut appointment, input.recall) {
        tx.update_appointment(&appointment)?;
        auditor.audit_update(&appointment)?;
    }
    Ok(change)
}

/// Study operations for one appointment at a time.
pub struct StudyService<S> {
    ctx: CoreContext<S>,
}

impl<S: Store> StudyService<S> {
    pub fn new(ctx: CoreContext<S>) -> Self {
        Self { ctx }
    }

    pub fn load(
        &self,
        appointment_id: AppointmentId,
        actor: &User,
    ) -> WorkflowResult<Option<StudyRecord>> {
        self.ctx.store.read(|tx| {
            self.authorize(tx, appointment_id, actor)?;
            load(tx, appointment_id)
        })
    }

    /// The fingerprint of the appointment's current series. An appointment without a study
    /// has the fingerprint of an empty set.
    pub fn fingerprint(
        &self,
        appointment_id: AppointmentId,
        actor: &User,
    ) -> WorkflowResult<SeriesFingerprint> {
        Ok(self
            .load(appointment_id, actor)?
            .map(|record| record.fingerprint())
            .unwrap_or_else(|| SeriesFingerprint::of(&[])))
    }

    pub fn create_with_default_series(
        &self,
        appointment_id: AppointmentId,
        actor: &User,
    ) -> WorkflowResult<StudyChange> {
        self.write(appointment_id, actor, "replaced study with default series", |tx, auditor| {
            replace_with_default_series(tx, &*self.ctx.ids, auditor, appointment_id)
        })
    }

    pub fn create(
        &self,
        appointment_id: AppointmentId,
        actor: &User,
        series: &[SeriesInput],
        attributes: StudyAttributes,
    ) -> WorkflowResult<StudyChange> {
        self.write(appointment_id, actor, "replaced study series", |tx, auditor| {
            replace(tx, &*self.ctx.ids, auditor, appointment_id, series, attributes)
        })
    }

    pub fn record_images(
        &self,
        appointment_id: AppointmentId,
        actor: &User,
        input: &StudyInput,
    ) -> WorkflowResult<StudyChange> {
        self.write(appointment_id, actor, "recorded images", |tx, auditor| {
            record_images(tx, &*self.ctx.ids, auditor, appointment_id, input)
        })
    }

    /// Returns the removed study, if there was one.
    pub fn delete_if_exists(
        &self,
        appointment_id: AppointmentId,
        actor: &User,
    ) -> WorkflowResult<Option<StudyRecord>> {
        self.write(appointment_id, actor, "deleted study", |tx, auditor| {
            delete_existing(tx, auditor, appointment_id)
        })
    }

    /// Changes the free-text details only.
    pub fn update_additional_details(
        &self,
        study_id: StudyId,
        actor: &User,
        additional_details: Notes,
    ) -> WorkflowResult<Study> {
        let mut auditor = self.ctx.auditor(actor);
        self.ctx.store.atomic(|tx| {
            let mut study = tx.study(study_id)?;
            self.authorize(tx, study.appointment_id, actor)?;

            study.attributes.additional_details = additional_details;
            tx.update_study(&study)?;
            auditor.audit_update(&study)?;
            auditor.flush(tx)?;
            Ok(study)
        })
    }

    /// Writes repeat information after checking the series have not changed since
    /// `expected` was read.
    pub fn record_repeat_information(
        &self,
        appointment_id: AppointmentId,
        actor: &User,
        expected: &SeriesFingerprint,
        updates: &[RepeatUpdate],
    ) -> WorkflowResult<StudyRecord> {
        let mut auditor = self.ctx.auditor(actor);
        let result = self.ctx.store.atomic(|tx| {
            self.authorize(tx, appointment_id, actor)?;
            let record = load(tx, appointment_id)?
                .ok_or_else(|| WorkflowError::not_found("study for appointment", appointment_id))?;

            let actual = record.fingerprint();
            if &actual != expected {
                tracing::warn!(
                    appointment = %appointment_id,
                    user = %actor.id,
                    expected = %expected,
                    actual = %actual,
                    "series changed since they were read"
                );
                return Err(WorkflowError::StaleFingerprint {
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }

            let mut updated = Vec::with_capacity(updates.len());
            for update in updates {
                let series = record
                    .series
                    .iter()
                    .find(|s| s.id == update.series_id)
                    .ok_or_else(|| WorkflowError::not_found("series", update.series_id))?;
                if !series.has_multiple_images() {
                    return Err(WorkflowError::InvalidInput(format!(
                        "{} holds a single image and takes no repeat information",
                        series.view
                    )));
                }
                let series = series.clone().with_repeats(Some(update.repeats.clone()));
                series.validate()?;
                tx.update_series(&series)?;
                updated.push(series);
            }
            auditor.audit_bulk_update(&updated)?;
            auditor.flush(&mut *tx)?;

            tracing::info!(
                appointment = %appointment_id,
                user = %actor.id,
                series = updated.len(),
                "recorded repeat information"
            );
            Ok(StudyRecord {
                series: tx.series_for_study(record.study.id)?,
                study: record.study,
            })
        });
        warn_on_conflict(result, "record repeat information", appointment_id, actor.id)
    }

    fn authorize(
        &self,
        tx: &dyn Transaction,
        appointment_id: AppointmentId,
        actor: &User,
    ) -> WorkflowResult<()> {
        self.ctx.authorize(
            tx,
            appointment_id,
            actor,
            permissions::PERFORM_MAMMOGRAM_APPOINTMENT,
        )
    }

    fn write<T, F>(
        &self,
        appointment_id: AppointmentId,
        actor: &User,
        message: &'static str,
        f: F,
    ) -> WorkflowResult<T>
    where
        F: FnOnce(&mut dyn Transaction, &mut Auditor) -> WorkflowResult<T>,
    {
        let mut auditor = self.ctx.auditor(actor);
        let result = self.ctx.store.atomic(|tx| {
            self.authorize(tx, appointment_id, actor)?;
            let result = f(&mut *tx, &mut auditor)?;
            auditor.flush(tx)?;
            Ok(result)
        });
        let result = warn_on_conflict(result, message, appointment_id, actor.id)?;
        tracing::info!(appointment = %appointment_id, user = %actor.id, "{message}");
        Ok(result)
    }
}
