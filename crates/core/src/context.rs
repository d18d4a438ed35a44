//! Shared handles for the workflow services.

use crate::audit::Auditor;
use crate::auth::AuthObject;
use crate::config::CoreConfig;
use crate::models::{AppointmentId, ProviderId, User};
use crate::store::{Store, Transaction};
use crate::{WorkflowError, WorkflowResult};
use screening_ids::{Clock, IdMinter};
use std::sync::Arc;

/// Configuration, storage and the injected effects every service needs.
pub struct CoreContext<S> {
    pub config: Arc<CoreConfig>,
    pub store: Arc<S>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdMinter>,
}

impl<S> Clone for CoreContext<S> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            ids: Arc::clone(&self.ids),
        }
    }
}

impl<S: Store> CoreContext<S> {
    pub fn new(
        config: Arc<CoreConfig>,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdMinter>,
    ) -> Self {
        Self {
            config,
            store,
            clock,
            ids,
        }
    }

    /// An auditor for one unit of work performed by `actor`.
    pub(crate) fn auditor(&self, actor: &User) -> Auditor {
        Auditor::new(actor.id, Arc::clone(&self.clock), Arc::clone(&self.ids))
    }

    /// Checks `permission` for `actor` against the provider that runs the appointment.
    pub(crate) fn authorize(
        &self,
        tx: &dyn Transaction,
        appointment_id: AppointmentId,
        actor: &User,
        permission: &str,
    ) -> WorkflowResult<()> {
        let scope = AppointmentScope {
            provider_id: tx.provider_for_appointment(appointment_id)?,
        };
        if self.config.ruleset().has_perm(actor, permission, Some(&scope)) {
            return Ok(());
        }

        tracing::warn!(
            user = %actor.id,
            appointment = %appointment_id,
            permission,
            "permission denied"
        );
        Err(WorkflowError::NotAuthorized {
            permission: permission.to_owned(),
        })
    }
}

/// The object an appointment-level permission is checked against.
struct AppointmentScope {
    provider_id: ProviderId,
}

impl AuthObject for AppointmentScope {
    fn provider_id(&self) -> Option<ProviderId> {
        Some(self.provider_id)
    }
}
