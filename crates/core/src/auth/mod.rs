//! Authorization: named permissions evaluated against a user and an optional object.

mod roles;
mod ruleset;

pub use roles::{default_ruleset, has_role, Role};
pub use ruleset::{AuthObject, Predicate, PredicateFn, RuleSet};
