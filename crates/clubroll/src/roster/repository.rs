use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use super::domain::{
    AllocationTask, Club, ClubId, Event, EventId, Member, MemberId, Role, RoleId, TaskId, Unit,
    UnitId,
};

/// Stored aggregate addressable by its identifier.
pub trait Record: Clone + Send + Sync + 'static {
    type Id: Clone + Eq + Ord + Hash + fmt::Display + Send + Sync + 'static;

    const KIND: &'static str;

    fn id(&self) -> &Self::Id;
}

/// Storage abstraction so the services can be exercised in isolation.
pub trait Repository<T: Record>: Send + Sync {
    fn insert(&self, record: T) -> Result<T, RepositoryError>;
    fn update(&self, record: T) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &T::Id) -> Result<Option<T>, RepositoryError>;
    fn remove(&self, id: &T::Id) -> Result<Option<T>, RepositoryError>;
    fn list(&self) -> Result<Vec<T>, RepositoryError>;
}

/// One repository per aggregate, grouped so a single backend serves every service.
pub trait RosterStore: Send + Sync + 'static {
    fn clubs(&self) -> &dyn Repository<Club>;
    fn units(&self) -> &dyn Repository<Unit>;
    fn members(&self) -> &dyn Repository<Member>;
    fn roles(&self) -> &dyn Repository<Role>;
    fn events(&self) -> &dyn Repository<Event>;
    fn tasks(&self) -> &dyn Repository<AllocationTask>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook for notices about allocation results (e-mail, chat, ...).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: String,
    pub club_id: ClubId,
    pub member_id: MemberId,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

impl Record for Club {
    type Id = ClubId;
    const KIND: &'static str = "club";

    fn id(&self) -> &ClubId {
        &self.id
    }
}

impl Record for Unit {
    type Id = UnitId;
    const KIND: &'static str = "unit";

    fn id(&self) -> &UnitId {
        &self.id
    }
}

impl Record for Member {
    type Id = MemberId;
    const KIND: &'static str = "member";

    fn id(&self) -> &MemberId {
        &self.id
    }
}

impl Record for Role {
    type Id = RoleId;
    const KIND: &'static str = "role";

    fn id(&self) -> &RoleId {
        &self.id
    }
}

impl Record for Event {
    type Id = EventId;
    const KIND: &'static str = "event";

    fn id(&self) -> &EventId {
        &self.id
    }
}

impl Record for AllocationTask {
    type Id = TaskId;
    const KIND: &'static str = "task";

    fn id(&self) -> &TaskId {
        &self.id
    }
}
