//! Clubs, units, members, roles and events, plus the unit allocation workflow.

pub mod allocation;
pub mod domain;
pub mod eligibility;
pub mod error;
pub mod events;
pub mod import;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

use std::sync::Arc;

pub use allocation::{AllocationOutcome, AllocationService, CandidateListing, UnitCandidate};
pub use domain::{
    AgeRange, AllocationTask, Club, ClubId, Event, EventId, Gender, Member, MemberId, MemberRole,
    NewClub, NewEvent, NewMember, NewRole, NewUnit, Role, RoleGrant, RoleId, RoleScope, TaskId,
    TaskKind, TaskStatus, Unit, UnitGender, UnitId,
};
pub use eligibility::{age_on, Ineligibility, ReferenceDatePolicy};
pub use error::RosterError;
pub use events::{EligibilityEntry, EventService};
pub use import::{ImportError, ImportReport, MemberCsvImporter, RejectedRow};
pub use memory::{InMemoryRepository, InMemoryRosterStore};
pub use repository::{
    Notification, NotificationError, NotificationPublisher, Record, Repository, RepositoryError,
    RosterStore,
};
pub use router::roster_router;
pub use service::{HeldRole, RosterService, SeatLock};

/// The services sharing one store and one seat lock, as handed to the HTTP router.
pub struct RosterServices<S, N> {
    pub roster: RosterService<S>,
    pub events: EventService<S>,
    pub allocation: AllocationService<S, N>,
}

impl<S, N> RosterServices<S, N>
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, policy: ReferenceDatePolicy) -> Self {
        let seats = SeatLock::default();
        Self {
            roster: RosterService::new(store.clone(), policy).with_seat_lock(seats.clone()),
            events: EventService::new(store.clone()).with_seat_lock(seats.clone()),
            allocation: AllocationService::new(store, notifier, policy).with_seat_lock(seats),
        }
    }

    pub fn importer(&self) -> MemberCsvImporter<'_, S> {
        MemberCsvImporter::new(&self.roster)
    }
}
