use super::{AppointmentId, UserId};
use chrono::{DateTime, Utc};
use screening_ids::record_id;
use serde::{Deserialize, Serialize};
use std::fmt;

record_id!(
    /// Identifies one row of the step ledger.
    StepCompletionId
);

/// The steps a clinician works through during an appointment, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepName {
    ConfirmIdentity,
    ReviewMedicalInformation,
    TakeImages,
    CheckInformation,
}

impl StepName {
    pub const ALL: [StepName; 4] = [
        StepName::ConfirmIdentity,
        StepName::ReviewMedicalInformation,
        StepName::TakeImages,
        StepName::CheckInformation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::ConfirmIdentity => "CONFIRM_IDENTITY",
            StepName::ReviewMedicalInformation => "REVIEW_MEDICAL_INFORMATION",
            StepName::TakeImages => "TAKE_IMAGES",
            StepName::CheckInformation => "CHECK_INFORMATION",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepName::ConfirmIdentity => "Confirm identity",
            StepName::ReviewMedicalInformation => "Review medical information",
            StepName::TakeImages => "Take images",
            StepName::CheckInformation => "Check information",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A step completed by a user. Rows are never updated or deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCompletion {
    pub id: StepCompletionId,
    pub appointment_id: AppointmentId,
    pub step_name: StepName,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
}
