use screening_ids::record_id;
use screening_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

record_id!(
    /// Identifies a user of the service.
    UserId
);
record_id!(
    /// Identifies a screening provider.
    ProviderId
);

/// An organisation running breast screening clinics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub name: NonEmptyText,
}

/// An authenticated user as seen by the authorization engine.
///
/// `provider_id` is the provider the user is currently acting for, if any.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: NonEmptyText,
    pub is_active: bool,
    #[serde(default)]
    pub groups: BTreeSet<String>,
    pub provider_id: Option<ProviderId>,
}

impl User {
    pub fn new(id: UserId, name: NonEmptyText, provider_id: Option<ProviderId>) -> Self {
        Self {
            id,
            name,
            is_active: true,
            groups: BTreeSet::new(),
            provider_id,
        }
    }

    pub fn with_groups<I, G>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}
