//! Audit trail for writes made by the workflow services.
//!
//! An [`Auditor`] is scoped to one actor and one unit of work. Events are buffered as the
//! work proceeds and written to the [`AuditSink`] by [`Auditor::flush`], which the services
//! call last inside the transaction. A failed flush fails the transaction.

use crate::models::{
    Appointment, AppointmentStatus, MedicalInformationReview, Participant, Series,
    StepCompletion, Study, UserId,
};
use crate::{WorkflowError, WorkflowResult};
use chrono::{DateTime, Utc};
use screening_ids::{record_id, Clock, IdMinter, Uuid};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

record_id!(
    /// Identifies an audit log row.
    AuditLogId
);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOperation {
    Create,
    Update,
    Delete,
    BulkCreate,
    BulkUpdate,
    BulkDelete,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: AuditLogId,
    pub actor: UserId,
    pub operation: AuditOperation,
    pub object_type: String,
    pub object_id: Uuid,
    /// The object as it was when audited.
    pub snapshot: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A record that can appear in the audit trail.
pub trait Auditable: Serialize {
    fn object_type(&self) -> &'static str;
    fn object_id(&self) -> Uuid;
}

/// Where audit rows end up. Implemented by store transactions.
pub trait AuditSink {
    fn write_audit_logs(&mut self, logs: &[AuditLog]) -> WorkflowResult<()>;
}

macro_rules! auditable {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl Auditable for $ty {
                fn object_type(&self) -> &'static str {
                    $name
                }

                fn object_id(&self) -> Uuid {
                    self.id.uuid()
                }
            }
        )*
    };
}

auditable!(
    Appointment => "appointment",
    AppointmentStatus => "appointment_status",
    StepCompletion => "appointment_workflow_step_completion",
    Study => "study",
    Series => "series",
    MedicalInformationReview => "medical_information_review",
    Participant => "participant",
);

/// Records audit events on behalf of one actor.
pub struct Auditor {
    actor: UserId,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdMinter>,
    pending: Vec<AuditLog>,
}

impl Auditor {
    pub fn new(actor: UserId, clock: Arc<dyn Clock>, ids: Arc<dyn IdMinter>) -> Self {
        Self {
            actor,
            clock,
            ids,
            pending: Vec::new(),
        }
    }

    pub fn actor(&self) -> UserId {
        self.actor
    }

    pub fn audit_create<T: Auditable>(&mut self, obj: &T) -> WorkflowResult<()> {
        self.record(AuditOperation::Create, std::slice::from_ref(obj))
    }

    pub fn audit_update<T: Auditable>(&mut self, obj: &T) -> WorkflowResult<()> {
        self.record(AuditOperation::Update, std::slice::from_ref(obj))
    }

    pub fn audit_delete<T: Auditable>(&mut self, obj: &T) -> WorkflowResult<()> {
        self.record(AuditOperation::Delete, std::slice::from_ref(obj))
    }

    pub fn audit_bulk_create<T: Auditable>(&mut self, objs: &[T]) -> WorkflowResult<()> {
        self.record(AuditOperation::BulkCreate, objs)
    }

    pub fn audit_bulk_update<T: Auditable>(&mut self, objs: &[T]) -> WorkflowResult<()> {
        self.record(AuditOperation::BulkUpdate, objs)
    }

    pub fn audit_bulk_delete<T: Auditable>(&mut self, objs: &[T]) -> WorkflowResult<()> {
        self.record(AuditOperation::BulkDelete, objs)
    }

    /// Events recorded but not yet flushed.
    pub fn pending(&self) -> &[AuditLog] {
        &self.pending
    }

    /// Writes the buffered events to `sink`, returning how many were written.
    pub fn flush<K: AuditSink + ?Sized>(&mut self, sink: &mut K) -> WorkflowResult<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        sink.write_audit_logs(&self.pending)?;
        let written = self.pending.len();
        self.pending.clear();
        Ok(written)
    }

    fn record<T: Auditable>(&mut self, operation: AuditOperation, objs: &[T]) -> WorkflowResult<()> {
        if objs.is_empty() {
            return Ok(());
        }

        // Bulk rows share one timestamp.
        let created_at = self.clock.now();
        for obj in objs {
            let snapshot = serde_json::to_value(obj).map_err(WorkflowError::AuditSnapshot)?;
            self.pending.push(AuditLog {
                id: AuditLogId::from_uuid(self.ids.new_id()),
                actor: self.actor,
                operation,
                object_type: obj.object_type().to_owned(),
                object_id: obj.object_id(),
                snapshot,
                created_at,
            });
        }
        Ok(())
    }
}
