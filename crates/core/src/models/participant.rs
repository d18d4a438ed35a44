use crate::{WorkflowError, WorkflowResult};
use chrono::{Datelike, NaiveDate};
use screening_ids::record_id;
use screening_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

record_id!(
    /// Identifies a participant.
    ParticipantId
);
record_id!(
    /// Identifies a screening episode.
    ScreeningEpisodeId
);

/// Reasons a participant may need extra support at their appointment.
///
/// Variant order is the display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupportReason {
    BreastImplants,
    MedicalDevices,
    Vision,
    Hearing,
    PhysicalRestriction,
    SocialEmotionalMentalHealth,
    Language,
    GenderIdentity,
    Other,
}

impl SupportReason {
    pub const ALL: [SupportReason; 9] = [
        SupportReason::BreastImplants,
        SupportReason::MedicalDevices,
        SupportReason::Vision,
        SupportReason::Hearing,
        SupportReason::PhysicalRestriction,
        SupportReason::SocialEmotionalMentalHealth,
        SupportReason::Language,
        SupportReason::GenderIdentity,
        SupportReason::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SupportReason::BreastImplants => "BREAST_IMPLANTS",
            SupportReason::MedicalDevices => "MEDICAL_DEVICES",
            SupportReason::Vision => "VISION",
            SupportReason::Hearing => "HEARING",
            SupportReason::PhysicalRestriction => "PHYSICAL_RESTRICTION",
            SupportReason::SocialEmotionalMentalHealth => "SOCIAL_EMOTIONAL_MENTAL_HEALTH",
            SupportReason::Language => "LANGUAGE",
            SupportReason::GenderIdentity => "GENDER_IDENTITY",
            SupportReason::Other => "OTHER",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SupportReason::BreastImplants => "Breast implants",
            SupportReason::MedicalDevices => "Implanted medical devices",
            SupportReason::Vision => "Vision",
            SupportReason::Hearing => "Hearing",
            SupportReason::PhysicalRestriction => "Physical restriction",
            SupportReason::SocialEmotionalMentalHealth => "Social, emotional, and mental health",
            SupportReason::Language => "Language",
            SupportReason::GenderIdentity => "Gender identity",
            SupportReason::Other => "Other",
        }
    }
}

impl fmt::Display for SupportReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SupportReason {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SupportReason::ALL
            .into_iter()
            .find(|reason| reason.as_str() == s)
            .ok_or_else(|| WorkflowError::UnknownTag {
                kind: "support reason",
                tag: s.to_owned(),
            })
    }
}

/// Details recorded against one support reason.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraNeed {
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub temporary: Option<bool>,
}

/// The support a participant needs, keyed by reason.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraNeeds(BTreeMap<SupportReason, ExtraNeed>);

impl ExtraNeeds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads extra needs from their stored JSON form, `{"REASON": {"details": ..}}`.
    ///
    /// An empty array is accepted as "no needs". Unknown reason tags are rejected.
    pub fn from_json(value: &serde_json::Value) -> WorkflowResult<Self> {
        let entries = match value {
            serde_json::Value::Null => return Ok(Self::new()),
            serde_json::Value::Array(items) if items.is_empty() => return Ok(Self::new()),
            serde_json::Value::Object(entries) => entries,
            other => {
                return Err(WorkflowError::InvalidInput(format!(
                    "extra needs must be an object keyed by support reason, got {other}"
                )))
            }
        };

        let mut needs = BTreeMap::new();
        for (tag, detail) in entries {
            let reason = tag.parse::<SupportReason>()?;
            let need: ExtraNeed = serde_json::from_value(detail.clone()).map_err(|e| {
                WorkflowError::InvalidInput(format!("invalid details for {tag}: {e}"))
            })?;
            needs.insert(reason, need);
        }
        Ok(Self(needs))
    }

    pub fn insert(&mut self, reason: SupportReason, need: ExtraNeed) {
        self.0.insert(reason, need);
    }

    pub fn get(&self, reason: SupportReason) -> Option<&ExtraNeed> {
        self.0.get(&reason)
    }

    /// Reasons in display order.
    pub fn reasons(&self) -> impl Iterator<Item = SupportReason> + '_ {
        self.0.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub first_name: NonEmptyText,
    pub last_name: NonEmptyText,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub ethnic_background_id: Option<String>,
    #[serde(default)]
    pub extra_needs: ExtraNeeds,
}

impl Participant {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Age in whole years on `date`.
    pub fn age_on(&self, date: NaiveDate) -> i32 {
        let had_birthday = (date.month(), date.day())
            >= (self.date_of_birth.month(), self.date_of_birth.day());
        let years = date.year() - self.date_of_birth.year();
        if had_birthday {
            years
        } else {
            years - 1
        }
    }

    /// True when the appointment needs adjustments for this participant.
    pub fn is_special_appointment(&self) -> bool {
        !self.extra_needs.is_empty()
    }
}

/// A participant's progress through one screening round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningEpisode {
    pub id: ScreeningEpisodeId,
    pub participant_id: ParticipantId,
    pub protocol: NonEmptyText,
}
