//! Built-in roles and the default ruleset.

use super::{Predicate, RuleSet};
use crate::constants::permissions;
use crate::{WorkflowError, WorkflowResult};
use std::fmt;
use std::str::FromStr;

/// Roles are group names held by users.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Administrative,
    Clinical,
    Superuser,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Administrative, Role::Clinical, Role::Superuser];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrative => "Administrative",
            Role::Clinical => "Clinical",
            Role::Superuser => "Superuser",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| WorkflowError::UnknownTag {
                kind: "role",
                tag: s.to_owned(),
            })
    }
}

/// Holds when the user has any of `roles`.
pub fn has_role(roles: &[Role]) -> Predicate {
    Predicate::in_group(roles.iter().map(Role::as_str))
}

/// The ruleset used when no ruleset file is configured.
///
/// Every permission is also scoped to the user's own provider.
pub fn default_ruleset() -> WorkflowResult<RuleSet> {
    use Role::{Administrative, Clinical};

    fn scoped(roles: &[Role]) -> Predicate {
        Predicate::combine(has_role(roles), [Predicate::SameProvider])
    }

    RuleSet::new()
        .with_rule(permissions::VIEW_CLINICS, scoped(&[Administrative, Clinical]))?
        .with_rule(permissions::MANAGE_CLINICS, scoped(&[Administrative, Clinical]))?
        .with_rule(permissions::VIEW_APPOINTMENTS, scoped(&[Administrative, Clinical]))?
        .with_rule(permissions::MANAGE_APPOINTMENTS, scoped(&[Administrative, Clinical]))?
        .with_rule(permissions::PERFORM_MAMMOGRAM_APPOINTMENT, scoped(&[Clinical]))?
        .with_rule(permissions::MANAGE_MEDICAL_INFORMATION, scoped(&[Clinical]))?
        .with_rule(permissions::VIEW_PARTICIPANT_DATA, scoped(&[Administrative, Clinical]))?
        .with_rule(permissions::MANAGE_PARTICIPANT_DATA, scoped(&[Administrative, Clinical]))
}
