use super::ProviderId;
use chrono::{DateTime, Utc};
use screening_ids::record_id;
use screening_types::NonEmptyText;
use serde::{Deserialize, Serialize};

record_id!(
    /// Identifies a screening setting (a site or mobile unit).
    SettingId
);
record_id!(
    /// Identifies a clinic session.
    ClinicId
);
record_id!(
    /// Identifies a bookable slot within a clinic.
    ClinicSlotId
);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub id: SettingId,
    pub provider_id: ProviderId,
    pub name: NonEmptyText,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clinic {
    pub id: ClinicId,
    pub setting_id: SettingId,
    pub starts_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicSlot {
    pub id: ClinicSlotId,
    pub clinic_id: ClinicId,
    pub starts_at: DateTime<Utc>,
    pub duration_in_minutes: u32,
}
