//! Records owned by, or read by, the appointment workflow.
//!
//! Scheduling context (providers, settings, clinics, slots, participants, episodes) is created
//! outside the core and only read here. Appointment statuses, step completions, studies,
//! series and reviews are written by the workflow services.

mod appointment;
mod clinic;
mod imaging;
mod participant;
mod review;
mod user;
mod workflow_step;

pub use appointment::{
    Appointment, AppointmentId, AppointmentStatus, AppointmentStatusId, AppointmentStatusName,
    StoppedReason, StoppedReasons,
};
pub use clinic::{Clinic, ClinicId, ClinicSlot, ClinicSlotId, Setting, SettingId};
pub use imaging::{
    ImageView, IncompleteImagesReason, Laterality, RecallChoice, RepeatReason, RepeatType,
    Repeats, Series, SeriesId, SeriesInput, Study, StudyAttributes, StudyCompleteness, StudyId,
    ViewPosition,
};
pub use participant::{
    ExtraNeed, ExtraNeeds, Participant, ParticipantId, ScreeningEpisode, ScreeningEpisodeId,
    SupportReason,
};
pub use review::{MedicalInformationReview, MedicalInformationSection, ReviewId};
pub use user::{Provider, ProviderId, User, UserId};
pub use workflow_step::{StepCompletion, StepCompletionId, StepName};

/// Free text limited to the note word count.
pub type Notes = screening_types::WordLimitedText<{ crate::constants::MAX_NOTE_WORDS }>;
