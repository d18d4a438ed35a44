//! Constants used throughout the screening core crate.

/// Upper bound on the image count of a single series.
pub const MAX_IMAGES_PER_SERIES: u8 = 20;

/// Word limit for free-text notes and "provide details" fields.
pub const MAX_NOTE_WORDS: usize = 500;

/// Environment variable naming a YAML ruleset file to load instead of the built-in one.
pub const RULESET_ENV_VAR: &str = "SCREENING_RULESET";

/// Default `tracing` directive for binaries embedding the core. Matches `screening_core` too.
pub const DEFAULT_LOG_FILTER: &str = "screening=info";

/// Permission names checked by the workflow services.
pub mod permissions {
    pub const VIEW_APPOINTMENTS: &str = "participants.view_appointments";
    pub const MANAGE_APPOINTMENTS: &str = "participants.manage_appointments";
    pub const PERFORM_MAMMOGRAM_APPOINTMENT: &str = "participants.perform_mammogram_appointment";
    pub const MANAGE_MEDICAL_INFORMATION: &str = "participants.manage_medical_information";
    pub const VIEW_PARTICIPANT_DATA: &str = "participants.view_participant_data";
    pub const MANAGE_PARTICIPANT_DATA: &str = "participants.manage_participant_data";
    pub const VIEW_CLINICS: &str = "clinics.view_clinics";
    pub const MANAGE_CLINICS: &str = "clinics.manage_clinics";
}
