use crate::models::{AppointmentId, AppointmentStatusName, UserId};

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("appointment is not in a valid status to move to {0}")]
    InvalidStatus(AppointmentStatusName),
    #[error("{0} was already recorded by a different user")]
    ActionPerformedByDifferentUser(AppointmentStatusName),
    #[error("user lacks permission {permission}")]
    NotAuthorized { permission: String },
    #[error("series changed since they were read (expected {expected}, found {actual})")]
    StaleFingerprint { expected: String, actual: String },
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("invalid ruleset: {0}")]
    InvalidRuleSet(String),
    #[error("unknown {kind} '{tag}'")]
    UnknownTag { kind: &'static str, tag: String },

    #[error("invalid text: {0}")]
    Text(#[from] screening_types::TextError),
    #[error("invalid identifier: {0}")]
    Id(#[from] screening_ids::IdError),
    #[error("failed to read ruleset file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to parse ruleset YAML at {path}: {source}")]
    RuleSetParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to serialise audit snapshot: {0}")]
    AuditSnapshot(serde_json::Error),
}

impl WorkflowError {
    /// True for failures a caller may resolve by re-reading state and submitting again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkflowError::InvariantViolation(_) | WorkflowError::StaleFingerprint { .. }
        )
    }

    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        WorkflowError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Logs a storage constraint conflict at the service boundary before it reaches the caller.
pub(crate) fn warn_on_conflict<T>(
    result: WorkflowResult<T>,
    operation: &str,
    appointment_id: AppointmentId,
    actor: UserId,
) -> WorkflowResult<T> {
    if let Err(WorkflowError::InvariantViolation(message)) = &result {
        tracing::warn!(
            appointment = %appointment_id,
            user = %actor,
            operation,
            error = %message,
            "write rejected by a storage constraint"
        );
    }
    result
}

pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_are_retryable() {
        assert!(WorkflowError::InvariantViolation("dup".into()).is_retryable());
        assert!(WorkflowError::StaleFingerprint {
            expected: "a".into(),
            actual: "b".into()
        }
        .is_retryable());
        assert!(!WorkflowError::InvalidStatus(AppointmentStatusName::Screened).is_retryable());
        assert!(!WorkflowError::NotAuthorized {
            permission: "mammograms.do_appointment".into()
        }
        .is_retryable());
    }

    #[test]
    fn invalid_status_names_the_target() {
        let err = WorkflowError::InvalidStatus(AppointmentStatusName::IdentityConfirmed);
        assert_eq!(
            err.to_string(),
            "appointment is not in a valid status to move to IDENTITY_CONFIRMED"
        );
    }
}
