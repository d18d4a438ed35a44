#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use screening_core::models::{
    AppointmentId, ExtraNeeds, Participant, ParticipantId, Provider, ProviderId, User, UserId,
};
use screening_core::{
    AppointmentWorkflow, CoreConfig, CoreContext, IdMinter, InMemoryStore, ManualClock,
    ReviewTracker, RuleSet, SequentialIdMinter, StudyService,
};
use screening_ids::Uuid;
use screening_types::NonEmptyText;
use std::sync::Arc;

pub fn clinic_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 15, 8, 30, 0).unwrap()
}

/// One provider, one in-memory store and the services over it.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub ids: Arc<SequentialIdMinter>,
    pub ctx: CoreContext<InMemoryStore>,
    pub workflow: AppointmentWorkflow<InMemoryStore>,
    pub provider: Provider,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_ruleset(screening_core::default_ruleset().unwrap())
    }

    pub fn with_ruleset(rules: RuleSet) -> Self {
        let ids = Arc::new(SequentialIdMinter::starting_at(1));
        let store = Arc::new(InMemoryStore::new());
        let provider = Provider {
            id: ProviderId::from_uuid(ids.new_id()),
            name: NonEmptyText::new("Harbour Breast Screening").unwrap(),
        };
        let id_minter: Arc<dyn IdMinter> = ids.clone();
        let ctx = CoreContext::new(
            Arc::new(CoreConfig::new(rules).unwrap()),
            Arc::clone(&store),
            Arc::new(ManualClock::starting_at(clinic_start())),
            id_minter,
        );
        Self {
            workflow: AppointmentWorkflow::new(ctx.clone()),
            store,
            ids,
            ctx,
            provider,
        }
    }

    pub fn studies(&self) -> StudyService<InMemoryStore> {
        StudyService::new(self.ctx.clone())
    }

    pub fn reviews(&self) -> ReviewTracker<InMemoryStore> {
        ReviewTracker::new(self.ctx.clone())
    }

    pub fn new_appointment(&self) -> AppointmentId {
        self.new_appointment_with(ExtraNeeds::new())
    }

    pub fn new_appointment_with(&self, extra_needs: ExtraNeeds) -> AppointmentId {
        let participant = Participant {
            id: ParticipantId::from_uuid(self.ids.new_id()),
            first_name: NonEmptyText::new("Elaine").unwrap(),
            last_name: NonEmptyText::new("Brooks").unwrap(),
            date_of_birth: NaiveDate::from_ymd_opt(1964, 2, 29).unwrap(),
            ethnic_background_id: None,
            extra_needs,
        };
        self.store
            .seed_appointment(&*self.ids, &self.provider, participant, clinic_start())
            .unwrap()
    }

    /// A clinician working for this harness's provider.
    pub fn clinician(&self, n: u128) -> User {
        self.user(n, &["Clinical"])
    }

    pub fn admin(&self, n: u128) -> User {
        self.user(n, &["Administrative"])
    }

    pub fn user(&self, n: u128, groups: &[&str]) -> User {
        User::new(
            UserId::from_uuid(Uuid::from_u128(1_000_000 + n)),
            NonEmptyText::new(format!("User {n}")).unwrap(),
            Some(self.provider.id),
        )
        .with_groups(groups.iter().copied())
    }
}
