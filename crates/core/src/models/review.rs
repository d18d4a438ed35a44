use super::{AppointmentId, UserId};
use chrono::{DateTime, Utc};
use screening_ids::record_id;
use serde::{Deserialize, Serialize};

record_id!(
    /// Identifies a medical information review.
    ReviewId
);

/// The reviewable sections of a participant's medical information.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MedicalInformationSection {
    MammogramHistory,
    Symptoms,
    MedicalHistory,
    BreastFeatures,
    OtherInformation,
}

impl MedicalInformationSection {
    pub const ALL: [MedicalInformationSection; 5] = [
        MedicalInformationSection::MammogramHistory,
        MedicalInformationSection::Symptoms,
        MedicalInformationSection::MedicalHistory,
        MedicalInformationSection::BreastFeatures,
        MedicalInformationSection::OtherInformation,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MedicalInformationSection::MammogramHistory => "Mammogram history",
            MedicalInformationSection::Symptoms => "Symptoms",
            MedicalInformationSection::MedicalHistory => "Medical history",
            MedicalInformationSection::BreastFeatures => "Breast features",
            MedicalInformationSection::OtherInformation => "Other information",
        }
    }
}

/// Records that a section was reviewed for an appointment. At most one per section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalInformationReview {
    pub id: ReviewId,
    pub appointment_id: AppointmentId,
    pub section: MedicalInformationSection,
    pub reviewed_by: UserId,
    pub created_at: DateTime<Utc>,
}
