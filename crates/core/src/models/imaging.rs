//! Manually recorded mammogram images: a study per appointment and a series per view.

use super::{AppointmentId, Notes};
use crate::constants::MAX_IMAGES_PER_SERIES;
use crate::{WorkflowError, WorkflowResult};
use screening_ids::record_id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

record_id!(
    /// Identifies a study.
    StudyId
);
record_id!(
    /// Identifies a series within a study.
    SeriesId
);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ViewPosition {
    Cc,
    Mlo,
    Eklund,
}

impl ViewPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewPosition::Cc => "CC",
            ViewPosition::Mlo => "MLO",
            ViewPosition::Eklund => "EKLUND",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Laterality {
    #[serde(rename = "R")]
    Right,
    #[serde(rename = "L")]
    Left,
}

impl Laterality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Laterality::Right => "R",
            Laterality::Left => "L",
        }
    }
}

/// A view position on one breast.
///
/// Ordering follows the reading order: right before left, then CC, MLO, Eklund.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageView {
    pub laterality: Laterality,
    pub view_position: ViewPosition,
}

impl ImageView {
    pub const fn new(view_position: ViewPosition, laterality: Laterality) -> Self {
        Self {
            laterality,
            view_position,
        }
    }

    /// Every view, right craniocaudal first.
    pub const ALL_RCC_FIRST: [ImageView; 6] = [
        ImageView::new(ViewPosition::Cc, Laterality::Right),
        ImageView::new(ViewPosition::Mlo, Laterality::Right),
        ImageView::new(ViewPosition::Eklund, Laterality::Right),
        ImageView::new(ViewPosition::Cc, Laterality::Left),
        ImageView::new(ViewPosition::Mlo, Laterality::Left),
        ImageView::new(ViewPosition::Eklund, Laterality::Left),
    ];

    /// The four standard views taken when a full set is recorded.
    pub const STANDARD_SET: [ImageView; 4] = [
        ImageView::new(ViewPosition::Cc, Laterality::Left),
        ImageView::new(ViewPosition::Cc, Laterality::Right),
        ImageView::new(ViewPosition::Mlo, Laterality::Left),
        ImageView::new(ViewPosition::Mlo, Laterality::Right),
    ];

    pub fn short_name(&self) -> String {
        match (self.view_position, self.laterality) {
            (ViewPosition::Eklund, Laterality::Right) => "Right Eklund".to_owned(),
            (ViewPosition::Eklund, Laterality::Left) => "Left Eklund".to_owned(),
            (position, laterality) => format!("{}{}", laterality.as_str(), position.as_str()),
        }
    }

    pub fn from_short_name(name: &str) -> WorkflowResult<Self> {
        ImageView::ALL_RCC_FIRST
            .into_iter()
            .find(|view| view.short_name() == name)
            .ok_or_else(|| WorkflowError::UnknownTag {
                kind: "image view",
                tag: name.to_owned(),
            })
    }
}

impl fmt::Display for ImageView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepeatType {
    AllRepeats,
    SomeRepeats,
    NoRepeats,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepeatReason {
    PatientMoved,
    UnableCompression,
    InadequateCompression,
    IncorrectPositioning,
    ImageTooLight,
    ImageTooDark,
    MotionBlur,
    EquipmentFault,
    FoldedSkin,
    PectoralMuscle,
    Other,
}

impl RepeatReason {
    pub fn label(&self) -> &'static str {
        match self {
            RepeatReason::PatientMoved => "Patient moved during exposure",
            RepeatReason::UnableCompression => "Unable to maintain compression",
            RepeatReason::InadequateCompression => "Inadequate compression achieved",
            RepeatReason::IncorrectPositioning => "Incorrect positioning identified",
            RepeatReason::ImageTooLight => "Image too light - exposure needs adjustment",
            RepeatReason::ImageTooDark => "Image too dark - exposure needs adjustment",
            RepeatReason::MotionBlur => "Motion blur affecting image quality",
            RepeatReason::EquipmentFault => "Equipment technical fault",
            RepeatReason::FoldedSkin => "Folded skin needs smoothing",
            RepeatReason::PectoralMuscle => "Pectoral muscle not visualised correctly",
            RepeatReason::Other => "Other",
        }
    }
}

/// Whether a study holds a full set of images.
///
/// PARTIAL studies are done despite missing views. INCOMPLETE studies are missing views for a
/// temporary reason and the participant can be invited back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudyCompleteness {
    Complete,
    Partial,
    Incomplete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncompleteImagesReason {
    ConsentWithdrawn,
    LanguageOrLearningDifficulties,
    UnableToScanTissue,
    Wheelchair,
    OtherMobility,
    TechnicalIssues,
    Other,
}

/// What happens next when a full set of images could not be taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecallChoice {
    /// Invite the participant back to complete the set.
    ToBeRecalled,
    /// Accept the images taken as the final set.
    PartialMammography,
}

impl RecallChoice {
    pub fn completeness(choice: Option<RecallChoice>) -> StudyCompleteness {
        match choice {
            Some(RecallChoice::ToBeRecalled) => StudyCompleteness::Incomplete,
            Some(RecallChoice::PartialMammography) => StudyCompleteness::Partial,
            None => StudyCompleteness::Complete,
        }
    }
}

/// The information held on a study apart from its series.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyAttributes {
    #[serde(default)]
    pub additional_details: Notes,
    #[serde(default)]
    pub imperfect_but_best_possible: bool,
    #[serde(default)]
    pub completeness: Option<StudyCompleteness>,
    #[serde(default)]
    pub reasons_incomplete: BTreeSet<IncompleteImagesReason>,
    #[serde(default)]
    pub reasons_incomplete_details: Notes,
}

/// The recorded images for one appointment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Study {
    pub id: StudyId,
    pub appointment_id: AppointmentId,
    #[serde(flatten)]
    pub attributes: StudyAttributes,
}

/// Repeat information for a series holding more than one image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repeats {
    pub repeat_type: RepeatType,
    #[serde(default)]
    pub reasons: BTreeSet<RepeatReason>,
    #[serde(default)]
    pub count: Option<u8>,
}

/// One requested series when recording images. A count of zero means "not taken".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesInput {
    pub view: ImageView,
    pub count: u8,
    #[serde(default)]
    pub repeats: Option<Repeats>,
}

impl SeriesInput {
    pub fn new(view: ImageView, count: u8) -> Self {
        Self {
            view,
            count,
            repeats: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub id: SeriesId,
    pub study_id: StudyId,
    pub view: ImageView,
    pub count: u8,
    pub repeat_type: Option<RepeatType>,
    #[serde(default)]
    pub repeat_reasons: BTreeSet<RepeatReason>,
    pub repeat_count: Option<u8>,
}

impl Series {
    pub fn new(id: SeriesId, study_id: StudyId, view: ImageView, count: u8) -> Self {
        Self {
            id,
            study_id,
            view,
            count,
            repeat_type: None,
            repeat_reasons: BTreeSet::new(),
            repeat_count: None,
        }
    }

    pub fn with_repeats(mut self, repeats: Option<Repeats>) -> Self {
        match repeats {
            Some(repeats) => {
                self.repeat_type = Some(repeats.repeat_type);
                self.repeat_reasons = repeats.reasons;
                self.repeat_count = repeats.count;
            }
            None => {
                self.repeat_type = None;
                self.repeat_reasons.clear();
                self.repeat_count = None;
            }
        }
        self
    }

    pub fn has_multiple_images(&self) -> bool {
        self.count > 1
    }

    /// Checks the count and repeat fields against each other.
    ///
    /// A series holding one image carries no repeat information. With more than one image,
    /// repeat information may still be pending; once given, NO_REPEATS takes no reasons,
    /// ALL_REPEATS takes no count, and SOME_REPEATS needs a count strictly below the image
    /// count. Both ALL_REPEATS and SOME_REPEATS need at least one reason.
    pub fn validate(&self) -> WorkflowResult<()> {
        let invalid = |msg: String| Err(WorkflowError::InvariantViolation(msg));

        if self.count == 0 || self.count > MAX_IMAGES_PER_SERIES {
            return invalid(format!(
                "{} count must be between 1 and {MAX_IMAGES_PER_SERIES}, got {}",
                self.view, self.count
            ));
        }

        if self.count == 1 {
            if self.repeat_type.is_some()
                || !self.repeat_reasons.is_empty()
                || self.repeat_count.is_some()
            {
                return invalid(format!(
                    "{} has a single image and cannot carry repeat information",
                    self.view
                ));
            }
            return Ok(());
        }

        match self.repeat_type {
            None if !self.repeat_reasons.is_empty() || self.repeat_count.is_some() => invalid(
                format!("{} has repeat details without a repeat type", self.view),
            ),
            None => Ok(()),
            Some(RepeatType::NoRepeats) if !self.repeat_reasons.is_empty() => invalid(format!(
                "{} has no repeats but lists repeat reasons",
                self.view
            )),
            Some(RepeatType::NoRepeats | RepeatType::AllRepeats) if self.repeat_count.is_some() => {
                invalid(format!(
                    "{} repeat count is only recorded when some images were repeats",
                    self.view
                ))
            }
            Some(RepeatType::SomeRepeats | RepeatType::AllRepeats)
                if self.repeat_reasons.is_empty() =>
            {
                invalid(format!("{} repeats need at least one reason", self.view))
            }
            Some(RepeatType::SomeRepeats) => match self.repeat_count {
                Some(n) if n >= 1 && n < self.count => Ok(()),
                Some(n) => invalid(format!(
                    "{} repeat count must be between 1 and {}, got {n}",
                    self.view,
                    self.count - 1
                )),
                None => invalid(format!(
                    "{} has some repeats but no repeat count",
                    self.view
                )),
            },
            Some(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screening_ids::Uuid;

    fn series(count: u8) -> Series {
        Series::new(
            SeriesId::from_uuid(Uuid::from_u128(1)),
            StudyId::from_uuid(Uuid::from_u128(2)),
            ImageView::new(ViewPosition::Mlo, Laterality::Right),
            count,
        )
    }

    fn repeats(repeat_type: RepeatType, reasons: &[RepeatReason], count: Option<u8>) -> Repeats {
        Repeats {
            repeat_type,
            reasons: reasons.iter().copied().collect(),
            count,
        }
    }

    #[test]
    fn views_sort_right_craniocaudal_first() {
        let mut views = ImageView::STANDARD_SET.to_vec();
        views.push(ImageView::new(ViewPosition::Eklund, Laterality::Left));
        views.push(ImageView::new(ViewPosition::Eklund, Laterality::Right));
        views.sort();
        assert_eq!(views, ImageView::ALL_RCC_FIRST.to_vec());
    }

    #[test]
    fn short_names_round_trip() {
        for view in ImageView::ALL_RCC_FIRST {
            assert_eq!(ImageView::from_short_name(&view.short_name()).unwrap(), view);
        }
        assert_eq!(ImageView::ALL_RCC_FIRST[0].short_name(), "RCC");
        assert!(ImageView::from_short_name("XCC").is_err());
    }

    #[test]
    fn single_image_series_rejects_repeats() {
        assert!(series(1).validate().is_ok());
        let bad = series(1).with_repeats(Some(repeats(RepeatType::AllRepeats, &[], None)));
        assert!(matches!(
            bad.validate(),
            Err(WorkflowError::InvariantViolation(_))
        ));
    }

    #[test]
    fn count_bounds_are_enforced() {
        assert!(series(0).validate().is_err());
        assert!(series(20).validate().is_ok());
        assert!(series(21).validate().is_err());
    }

    #[test]
    fn pending_repeat_information_is_valid() {
        assert!(series(3).validate().is_ok());
    }

    #[test]
    fn some_repeats_count_must_be_below_image_count() {
        let ok = series(3).with_repeats(Some(repeats(
            RepeatType::SomeRepeats,
            &[RepeatReason::PatientMoved],
            Some(2),
        )));
        assert!(ok.validate().is_ok());

        for bad_count in [Some(0), Some(3), None] {
            let bad = series(3).with_repeats(Some(repeats(
                RepeatType::SomeRepeats,
                &[RepeatReason::PatientMoved],
                bad_count,
            )));
            assert!(bad.validate().is_err(), "{bad_count:?}");
        }
    }

    #[test]
    fn no_repeats_takes_no_reasons() {
        let bad = series(2).with_repeats(Some(repeats(
            RepeatType::NoRepeats,
            &[RepeatReason::MotionBlur],
            None,
        )));
        assert!(bad.validate().is_err());

        let ok = series(2).with_repeats(Some(repeats(RepeatType::NoRepeats, &[], None)));
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn all_repeats_takes_no_count() {
        let bad = series(2).with_repeats(Some(repeats(
            RepeatType::AllRepeats,
            &[RepeatReason::FoldedSkin],
            Some(1),
        )));
        assert!(bad.validate().is_err());

        let no_reason = series(2).with_repeats(Some(repeats(RepeatType::AllRepeats, &[], None)));
        assert!(no_reason.validate().is_err());
    }

    #[test]
    fn recall_choice_sets_completeness() {
        assert_eq!(
            RecallChoice::completeness(Some(RecallChoice::ToBeRecalled)),
            StudyCompleteness::Incomplete
        );
        assert_eq!(
            RecallChoice::completeness(Some(RecallChoice::PartialMammography)),
            StudyCompleteness::Partial
        );
        assert_eq!(
            RecallChoice::completeness(None),
            StudyCompleteness::Complete
        );
    }
}
