use super::{ClinicSlotId, Notes, ScreeningEpisodeId, UserId};
use crate::{WorkflowError, WorkflowResult};
use chrono::{DateTime, Utc};
use screening_ids::record_id;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

record_id!(
    /// Identifies an appointment.
    AppointmentId
);
record_id!(
    /// Identifies one row of an appointment's status log.
    AppointmentStatusId
);

/// The name of an appointment status.
///
/// An appointment with no recorded status is [`AppointmentStatusName::Scheduled`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatusName {
    Scheduled,
    CheckedIn,
    InProgress,
    Paused,
    Resumed,
    TakenOver,
    IdentityConfirmed,
    MedicalInformationReviewed,
    ImagesTaken,
    Screened,
    PartiallyScreened,
    AttendedNotScreened,
    Cancelled,
    DidNotAttend,
}

impl AppointmentStatusName {
    pub const ALL: [AppointmentStatusName; 14] = [
        AppointmentStatusName::Scheduled,
        AppointmentStatusName::CheckedIn,
        AppointmentStatusName::InProgress,
        AppointmentStatusName::Paused,
        AppointmentStatusName::Resumed,
        AppointmentStatusName::TakenOver,
        AppointmentStatusName::IdentityConfirmed,
        AppointmentStatusName::MedicalInformationReviewed,
        AppointmentStatusName::ImagesTaken,
        AppointmentStatusName::Screened,
        AppointmentStatusName::PartiallyScreened,
        AppointmentStatusName::AttendedNotScreened,
        AppointmentStatusName::Cancelled,
        AppointmentStatusName::DidNotAttend,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatusName::Scheduled => "SCHEDULED",
            AppointmentStatusName::CheckedIn => "CHECKED_IN",
            AppointmentStatusName::InProgress => "IN_PROGRESS",
            AppointmentStatusName::Paused => "PAUSED",
            AppointmentStatusName::Resumed => "RESUMED",
            AppointmentStatusName::TakenOver => "TAKEN_OVER",
            AppointmentStatusName::IdentityConfirmed => "IDENTITY_CONFIRMED",
            AppointmentStatusName::MedicalInformationReviewed => "MEDICAL_INFORMATION_REVIEWED",
            AppointmentStatusName::ImagesTaken => "IMAGES_TAKEN",
            AppointmentStatusName::Screened => "SCREENED",
            AppointmentStatusName::PartiallyScreened => "PARTIALLY_SCREENED",
            AppointmentStatusName::AttendedNotScreened => "ATTENDED_NOT_SCREENED",
            AppointmentStatusName::Cancelled => "CANCELLED",
            AppointmentStatusName::DidNotAttend => "DID_NOT_ATTEND",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AppointmentStatusName::Scheduled => "Scheduled",
            AppointmentStatusName::CheckedIn => "Checked in",
            AppointmentStatusName::InProgress => "In progress",
            AppointmentStatusName::Paused => "Paused",
            AppointmentStatusName::Resumed => "Resumed",
            AppointmentStatusName::TakenOver => "Taken over",
            AppointmentStatusName::IdentityConfirmed => "Identity confirmed",
            AppointmentStatusName::MedicalInformationReviewed => "Medical information reviewed",
            AppointmentStatusName::ImagesTaken => "Images taken",
            AppointmentStatusName::Screened => "Screened",
            AppointmentStatusName::PartiallyScreened => "Partially screened",
            AppointmentStatusName::AttendedNotScreened => "Attended not screened",
            AppointmentStatusName::Cancelled => "Cancelled",
            AppointmentStatusName::DidNotAttend => "Did not attend",
        }
    }

    /// Statuses in which a clinician is actively working through the appointment.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            AppointmentStatusName::InProgress
                | AppointmentStatusName::Resumed
                | AppointmentStatusName::TakenOver
                | AppointmentStatusName::IdentityConfirmed
                | AppointmentStatusName::MedicalInformationReviewed
                | AppointmentStatusName::ImagesTaken
        )
    }

    /// Statuses with no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatusName::Screened
                | AppointmentStatusName::PartiallyScreened
                | AppointmentStatusName::AttendedNotScreened
                | AppointmentStatusName::Cancelled
                | AppointmentStatusName::DidNotAttend
        )
    }
}

impl fmt::Display for AppointmentStatusName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatusName {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppointmentStatusName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| WorkflowError::UnknownTag {
                kind: "appointment status",
                tag: s.to_owned(),
            })
    }
}

/// One row of the append-only status log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentStatus {
    pub id: AppointmentStatusId,
    pub appointment_id: AppointmentId,
    pub name: AppointmentStatusName,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
}

/// Why an appointment could not go ahead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoppedReason {
    ParticipantDidNotAttend,
    FailedIdentityCheck,
    LanguageDifficulties,
    PhysicalHealthIssue,
    MentalHealthIssue,
    #[serde(rename = "LAST_MAMMOGRAM_WITHIN_6_MONTHS")]
    LastMammogramWithin6Months,
    BreastImplantRisks,
    PainDuringScreening,
    TechnicalIssues,
    ParticipantWithdrewConsent,
    Other,
}

impl StoppedReason {
    pub fn label(&self) -> &'static str {
        match self {
            StoppedReason::ParticipantDidNotAttend => "Participant did not attend",
            StoppedReason::FailedIdentityCheck => "Failed identity check",
            StoppedReason::LanguageDifficulties => "Language difficulties",
            StoppedReason::PhysicalHealthIssue => "Physical health issue",
            StoppedReason::MentalHealthIssue => "Mental health issue",
            StoppedReason::LastMammogramWithin6Months => "Last mammogram within 6 months",
            StoppedReason::BreastImplantRisks => "Breast implant risks",
            StoppedReason::PainDuringScreening => "Pain during screening",
            StoppedReason::TechnicalIssues => "Technical issues",
            StoppedReason::ParticipantWithdrewConsent => "Participant withdrew consent",
            StoppedReason::Other => "Other",
        }
    }
}

/// The reasons recorded when an appointment is marked attended-not-screened.
///
/// At least one reason is required, and choosing [`StoppedReason::Other`] requires details.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoppedReasons {
    reasons: BTreeSet<StoppedReason>,
    #[serde(default)]
    details: BTreeMap<StoppedReason, Notes>,
}

impl StoppedReasons {
    pub fn new(
        reasons: BTreeSet<StoppedReason>,
        details: BTreeMap<StoppedReason, Notes>,
    ) -> WorkflowResult<Self> {
        if reasons.is_empty() {
            return Err(WorkflowError::InvalidInput(
                "a reason for why this appointment cannot continue must be provided".into(),
            ));
        }
        let details: BTreeMap<_, _> = details
            .into_iter()
            .filter(|(_, text)| !text.is_empty())
            .collect();
        if reasons.contains(&StoppedReason::Other) && !details.contains_key(&StoppedReason::Other)
        {
            return Err(WorkflowError::InvalidInput(
                "explain why this appointment cannot proceed".into(),
            ));
        }
        if let Some(stray) = details.keys().find(|reason| !reasons.contains(*reason)) {
            return Err(WorkflowError::InvalidInput(format!(
                "details given for {stray:?}, which was not selected"
            )));
        }
        Ok(Self { reasons, details })
    }

    pub fn reasons(&self) -> &BTreeSet<StoppedReason> {
        &self.reasons
    }

    pub fn details(&self, reason: StoppedReason) -> Option<&Notes> {
        self.details.get(&reason)
    }
}

/// A booked appointment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub screening_episode_id: ScreeningEpisodeId,
    pub clinic_slot_id: ClinicSlotId,
    /// The participant should be invited to another appointment.
    pub reinvite: bool,
    pub stopped_reasons: Option<StoppedReasons>,
}

impl Appointment {
    pub fn new(
        id: AppointmentId,
        screening_episode_id: ScreeningEpisodeId,
        clinic_slot_id: ClinicSlotId,
    ) -> Self {
        Self {
            id,
            screening_episode_id,
            clinic_slot_id,
            reinvite: false,
            stopped_reasons: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_round_trip_through_strings() {
        for name in AppointmentStatusName::ALL {
            assert_eq!(name.as_str().parse::<AppointmentStatusName>().unwrap(), name);
            assert_eq!(
                serde_json::to_string(&name).unwrap(),
                format!("\"{}\"", name.as_str())
            );
        }
    }

    #[test]
    fn terminal_and_in_progress_are_disjoint() {
        for name in AppointmentStatusName::ALL {
            assert!(!(name.is_terminal() && name.is_in_progress()), "{name}");
        }
        assert!(!AppointmentStatusName::Paused.is_in_progress());
        assert!(!AppointmentStatusName::Paused.is_terminal());
    }

    #[test]
    fn stopped_reasons_require_a_reason() {
        let err = StoppedReasons::new(BTreeSet::new(), BTreeMap::new()).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidInput(_)));
    }

    #[test]
    fn stopped_reason_other_requires_details() {
        let reasons = BTreeSet::from([StoppedReason::Other]);
        assert!(StoppedReasons::new(reasons.clone(), BTreeMap::new()).is_err());

        let details = BTreeMap::from([(StoppedReason::Other, Notes::new("Fire alarm").unwrap())]);
        let stopped = StoppedReasons::new(reasons, details).unwrap();
        assert_eq!(
            stopped.details(StoppedReason::Other).unwrap().as_str(),
            "Fire alarm"
        );
    }

    #[test]
    fn stopped_reason_serialises_with_digit_suffix() {
        assert_eq!(
            serde_json::to_string(&StoppedReason::LastMammogramWithin6Months).unwrap(),
            "\"LAST_MAMMOGRAM_WITHIN_6_MONTHS\""
        );
    }
}
