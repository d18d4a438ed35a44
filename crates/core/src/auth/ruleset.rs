//! Declarative permission rules.
//!
//! A [`RuleSet`] maps permission names (`<app_label>.<name>`) to a [`Predicate`] over a user
//! and an optional object. Unknown permissions and inactive users are always denied.
//!
//! Rulesets can be built in code or loaded from YAML:
//!
//! ```yaml
//! permissions:
//!   participants.perform_mammogram_appointment:
//!     in_group: [Clinical]
//!     same_provider: true
//! ```
//!
//! Every condition listed under a permission must hold. They are evaluated in the order
//! `allow_all`, `in_group`, `same_provider`, `object_owner`.

use crate::models::{ProviderId, User, UserId};
use crate::{WorkflowError, WorkflowResult};
use screening_types::PermissionName;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Something a permission can be checked against.
pub trait AuthObject {
    /// The provider the object belongs to, if known.
    fn provider_id(&self) -> Option<ProviderId>;

    /// The user who owns the object, if it has an owner.
    fn owner(&self) -> Option<UserId> {
        None
    }
}

pub type PredicateFn = dyn Fn(&User, Option<&dyn AuthObject>) -> bool + Send + Sync;

/// A rule deciding whether a user holds a permission.
#[derive(Clone)]
pub enum Predicate {
    AllowAll,
    /// The user is a member of at least one of the groups.
    InGroup(Vec<String>),
    /// The user acts for the object's provider. Holds when there is no object.
    SameProvider,
    /// The user owns the object. Fails when there is no object.
    ObjectOwner,
    /// Every child holds. Children are evaluated in order and evaluation stops at the
    /// first failure.
    All(Vec<Predicate>),
    Custom(Arc<PredicateFn>),
}

impl Predicate {
    pub fn in_group<I, G>(groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        Predicate::InGroup(groups.into_iter().map(Into::into).collect())
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&User, Option<&dyn AuthObject>) -> bool + Send + Sync + 'static,
    {
        Predicate::Custom(Arc::new(f))
    }

    /// Combines predicates into one that holds only when all of them hold.
    pub fn combine(first: Predicate, others: impl IntoIterator<Item = Predicate>) -> Self {
        let mut children = vec![first];
        children.extend(others);
        Predicate::All(children)
    }

    pub fn evaluate(&self, user: &User, obj: Option<&dyn AuthObject>) -> bool {
        match self {
            Predicate::AllowAll => true,
            Predicate::InGroup(groups) => groups.iter().any(|group| user.in_group(group)),
            Predicate::SameProvider => match obj {
                None => true,
                Some(obj) => match (user.provider_id, obj.provider_id()) {
                    (Some(mine), Some(theirs)) => mine == theirs,
                    _ => false,
                },
            },
            Predicate::ObjectOwner => {
                obj.and_then(|obj| obj.owner()).is_some_and(|owner| owner == user.id)
            }
            Predicate::All(children) => children.iter().all(|child| child.evaluate(user, obj)),
            Predicate::Custom(f) => f(user, obj),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::AllowAll => f.write_str("AllowAll"),
            Predicate::InGroup(groups) => f.debug_tuple("InGroup").field(groups).finish(),
            Predicate::SameProvider => f.write_str("SameProvider"),
            Predicate::ObjectOwner => f.write_str("ObjectOwner"),
            Predicate::All(children) => f.debug_tuple("All").field(children).finish(),
            Predicate::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A set of named permissions and the predicates that grant them.
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    app_permissions: BTreeMap<String, Vec<PermissionName>>,
    predicates: HashMap<String, Predicate>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a permission.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidRuleSet`] if the name is not `<app_label>.<name>` or
    /// is already registered.
    pub fn register(&mut self, permission: &str, predicate: Predicate) -> WorkflowResult<()> {
        let name = PermissionName::parse(permission)
            .map_err(|e| WorkflowError::InvalidRuleSet(e.to_string()))?;

        if self.predicates.contains_key(name.as_str()) {
            return Err(WorkflowError::InvalidRuleSet(format!(
                "permission {name} is registered twice"
            )));
        }

        self.app_permissions
            .entry(name.app_label().to_owned())
            .or_default()
            .push(name.clone());
        self.predicates.insert(name.as_str().to_owned(), predicate);
        Ok(())
    }

    /// Builder form of [`RuleSet::register`].
    pub fn with_rule(mut self, permission: &str, predicate: Predicate) -> WorkflowResult<Self> {
        self.register(permission, predicate)?;
        Ok(self)
    }

    pub fn has_perm(&self, user: &User, permission: &str, obj: Option<&dyn AuthObject>) -> bool {
        if !user.is_active {
            return false;
        }

        self.predicates
            .get(permission)
            .is_some_and(|predicate| predicate.evaluate(user, obj))
    }

    /// True if the user holds any permission under `app_label`, checked without an object.
    pub fn has_module_perms(&self, user: &User, app_label: &str) -> bool {
        if !user.is_active {
            return false;
        }

        self.app_permissions.get(app_label).is_some_and(|perms| {
            perms
                .iter()
                .any(|perm| self.has_perm(user, perm.as_str(), None))
        })
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.predicates.contains_key(permission)
    }

    pub fn predicate(&self, permission: &str) -> Option<&Predicate> {
        self.predicates.get(permission)
    }

    /// Permissions grouped by app label, in registration order within each app.
    pub fn permissions(&self) -> impl Iterator<Item = (&str, &[PermissionName])> {
        self.app_permissions
            .iter()
            .map(|(app, perms)| (app.as_str(), perms.as_slice()))
    }

    /// Parses a ruleset from YAML text.
    ///
    /// This uses `serde_path_to_error` so schema mismatches name the failing path (e.g.
    /// `permissions.clinics.view_clinics.in_group`).
    pub fn from_yaml_str(yaml_text: &str) -> WorkflowResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

        let wire = match serde_path_to_error::deserialize::<_, RuleSetWire>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let path = if path.is_empty() {
                    "<root>".to_owned()
                } else {
                    path
                };
                return Err(WorkflowError::RuleSetParse {
                    path,
                    source: err.into_inner(),
                });
            }
        };

        let mut rules = RuleSet::new();
        for (permission, conditions) in wire.permissions {
            let predicate = conditions.into_predicate(&permission)?;
            rules.register(&permission, predicate)?;
        }
        Ok(rules)
    }

    pub fn from_yaml_file(path: &Path) -> WorkflowResult<Self> {
        let text = std::fs::read_to_string(path).map_err(WorkflowError::FileRead)?;
        Self::from_yaml_str(&text)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleSetWire {
    permissions: BTreeMap<String, ConditionsWire>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConditionsWire {
    #[serde(default)]
    allow_all: bool,
    #[serde(default)]
    in_group: Option<Vec<String>>,
    #[serde(default)]
    same_provider: bool,
    #[serde(default)]
    object_owner: bool,
}

impl ConditionsWire {
    fn into_predicate(self, permission: &str) -> WorkflowResult<Predicate> {
        let mut children = Vec::new();
        if self.allow_all {
            children.push(Predicate::AllowAll);
        }
        if let Some(groups) = self.in_group {
            if groups.is_empty() {
                return Err(WorkflowError::InvalidRuleSet(format!(
                    "{permission}: in_group needs at least one group"
                )));
            }
            children.push(Predicate::InGroup(groups));
        }
        if self.same_provider {
            children.push(Predicate::SameProvider);
        }
        if self.object_owner {
            children.push(Predicate::ObjectOwner);
        }

        match children.len() {
            0 => Err(WorkflowError::InvalidRuleSet(format!(
                "{permission} declares no conditions"
            ))),
            1 => Ok(children.remove(0)),
            _ => Ok(Predicate::All(children)),
        }
    }
}
