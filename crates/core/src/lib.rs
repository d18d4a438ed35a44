//! # Screening Core
//!
//! Core business logic for the breast screening appointment workflow.
//!
//! This crate contains the pure domain operations:
//! - the appointment state machine and its append-only status log
//! - the workflow step ledger and identity invalidation after a takeover
//! - manually recorded studies and series with stale-form detection
//! - medical information review tracking and the reinvite flag
//! - predicate-based authorization scoped to the user's provider
//! - an audit trail written inside every unit of work
//!
//! **No transport concerns**: HTTP handlers, sessions and scheduling belong to the host
//! application. Storage is reached through the [`store::Store`] trait; [`store::InMemoryStore`]
//! is provided for tests and tooling.

pub mod audit;
pub mod auth;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod models;
pub mod recall;
pub mod review;
pub mod state_machine;
pub mod status;
pub mod steps;
pub mod store;
pub mod study;
pub mod workflow;

pub use audit::{AuditLog, AuditOperation, AuditSink, Auditable, Auditor};
pub use auth::{default_ruleset, AuthObject, Predicate, Role, RuleSet};
pub use config::{resolve_ruleset, CoreConfig};
pub use context::CoreContext;
pub use error::{WorkflowError, WorkflowResult};
pub use recall::RecallService;
pub use review::{ReviewOutcome, ReviewTracker};
pub use state_machine::{AppointmentAction, AppointmentStateMachine};
pub use status::CurrentStatus;
pub use steps::StepState;
pub use store::{InMemoryStore, Store, Transaction};
pub use study::{
    RepeatUpdate, SeriesFingerprint, StudyChange, StudyInput, StudyRecord, StudyService,
};
pub use workflow::{
    ActionParams, AppliedTransition, AppointmentWorkflow, FilterCounts, ImageCapture,
    StoppedDetails, WorkflowSignal,
};

pub use screening_ids::{Clock, IdMinter, ManualClock, RandomIdMinter, SequentialIdMinter, SystemClock};
