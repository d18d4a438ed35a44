//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the workflow
//! services. Nothing in this crate reads environment variables while handling a request.

use crate::auth::{default_ruleset, RuleSet};
use crate::{WorkflowError, WorkflowResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    ruleset: Arc<RuleSet>,
}

impl CoreConfig {
    pub fn new(ruleset: RuleSet) -> WorkflowResult<Self> {
        if ruleset.permissions().next().is_none() {
            return Err(WorkflowError::InvalidRuleSet(
                "ruleset defines no permissions".into(),
            ));
        }

        Ok(Self {
            ruleset: Arc::new(ruleset),
        })
    }

    /// Configuration using the built-in role ruleset.
    pub fn with_default_ruleset() -> WorkflowResult<Self> {
        Self::new(default_ruleset()?)
    }

    pub fn ruleset(&self) -> &RuleSet {
        &self.ruleset
    }

    pub fn shared_ruleset(&self) -> Arc<RuleSet> {
        Arc::clone(&self.ruleset)
    }
}

/// Resolve the authorization ruleset without reading environment variables.
///
/// If `override_path` is provided it must name a readable YAML ruleset file. Otherwise the
/// built-in ruleset is used.
pub fn resolve_ruleset(override_path: Option<PathBuf>) -> WorkflowResult<RuleSet> {
    match override_path {
        Some(path) => {
            if !path.is_file() {
                return Err(WorkflowError::InvalidInput(format!(
                    "ruleset override {} is not a file",
                    path.display()
                )));
            }
            load_ruleset_file(&path)
        }
        None => default_ruleset(),
    }
}

fn load_ruleset_file(path: &Path) -> WorkflowResult<RuleSet> {
    let rules = RuleSet::from_yaml_file(path)?;
    tracing::info!(path = %path.display(), "loaded authorization ruleset");
    Ok(rules)
}
