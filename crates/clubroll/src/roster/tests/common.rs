use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::roster::domain::{
    AgeRange, AllocationTask, Club, Event, Gender, Member, MemberId, NewClub, NewMember, NewUnit,
    Role, Unit, UnitGender, UnitId,
};
use crate::roster::eligibility::ReferenceDatePolicy;
use crate::roster::memory::{InMemoryRepository, InMemoryRosterStore};
use crate::roster::repository::{
    Notification, NotificationError, NotificationPublisher, Record, Repository, RepositoryError,
    RosterStore,
};
use crate::roster::{roster_router, RosterServices};

pub(super) const YEAR: i32 = 2025;

pub(super) fn today() -> NaiveDate {
    date(2025, 9, 1)
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) type MemoryServices = RosterServices<InMemoryRosterStore, MemoryNotifications>;

pub(super) struct Fixture {
    pub(super) services: Arc<MemoryServices>,
    pub(super) notifications: Arc<MemoryNotifications>,
    pub(super) club: Club,
}

impl Fixture {
    pub(super) fn unit(
        &self,
        name: &str,
        gender: UnitGender,
        ages: (u32, u32),
        capacity: u32,
    ) -> Unit {
        self.services
            .roster
            .create_unit(
                &self.club.id,
                NewUnit {
                    name: name.to_string(),
                    gender,
                    age_range: AgeRange::new(ages.0, ages.1),
                    capacity,
                },
            )
            .expect("unit created")
    }

    pub(super) fn member(
        &self,
        first_name: &str,
        birth_date: NaiveDate,
        gender: Gender,
        unit_id: Option<&UnitId>,
    ) -> Member {
        self.services
            .roster
            .register_member(
                &self.club.id,
                new_member(first_name, birth_date, gender, unit_id),
                today(),
            )
            .expect("member registered")
    }

    pub(super) fn router(&self) -> axum::Router {
        roster_router(self.services.clone())
    }
}

pub(super) fn new_member(
    first_name: &str,
    birth_date: NaiveDate,
    gender: Gender,
    unit_id: Option<&UnitId>,
) -> NewMember {
    NewMember {
        first_name: first_name.to_string(),
        last_name: "Walker".to_string(),
        birth_date,
        gender,
        email: Some(format!("{}@example.org", first_name.to_ascii_lowercase())),
        unit_id: unit_id.cloned(),
    }
}

pub(super) fn fixture() -> Fixture {
    let notifications = Arc::new(MemoryNotifications::default());
    let services = Arc::new(RosterServices::new(
        Arc::new(InMemoryRosterStore::default()),
        notifications.clone(),
        ReferenceDatePolicy::default(),
    ));
    let club = services
        .roster
        .create_club(NewClub {
            name: "Lakeside Scouts".to_string(),
            description: Some("Saturday troop".to_string()),
        })
        .expect("club created");

    Fixture {
        services,
        notifications,
        club,
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifications {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifications {
    pub(super) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notification mutex poisoned").clone()
    }

    pub(super) fn templates(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .map(|notification| notification.template)
            .collect()
    }
}

impl NotificationPublisher for MemoryNotifications {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct OfflineNotifications;

impl NotificationPublisher for OfflineNotifications {
    fn publish(&self, _notification: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay offline".to_string()))
    }
}

/// Publisher whose first delivery fails and later ones go through.
#[derive(Default)]
pub(super) struct FlakyNotifications {
    attempts: Mutex<usize>,
    delivered: MemoryNotifications,
}

impl FlakyNotifications {
    pub(super) fn delivered(&self) -> Vec<String> {
        self.delivered.templates()
    }
}

impl NotificationPublisher for FlakyNotifications {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        let mut attempts = self.attempts.lock().expect("attempt mutex poisoned");
        *attempts += 1;
        if *attempts == 1 {
            return Err(NotificationError::Transport("relay timed out".to_string()));
        }
        self.delivered.publish(notification)
    }
}

const STALL: Duration = Duration::from_millis(20);

/// Member repository that stalls on reads, widening every check-then-write window.
#[derive(Default)]
pub(super) struct SlowMembers {
    inner: InMemoryRepository<Member>,
}

impl Repository<Member> for SlowMembers {
    fn insert(&self, record: Member) -> Result<Member, RepositoryError> {
        self.inner.insert(record)
    }

    fn update(&self, record: Member) -> Result<(), RepositoryError> {
        self.inner.update(record)
    }

    fn fetch(&self, id: &MemberId) -> Result<Option<Member>, RepositoryError> {
        thread::sleep(STALL);
        self.inner.fetch(id)
    }

    fn remove(&self, id: &MemberId) -> Result<Option<Member>, RepositoryError> {
        self.inner.remove(id)
    }

    fn list(&self) -> Result<Vec<Member>, RepositoryError> {
        thread::sleep(STALL);
        self.inner.list()
    }
}

/// In-memory store with slow member reads.
#[derive(Default)]
pub(super) struct SlowMemberStore {
    inner: InMemoryRosterStore,
    members: SlowMembers,
}

impl RosterStore for SlowMemberStore {
    fn clubs(&self) -> &dyn Repository<Club> {
        self.inner.clubs()
    }

    fn units(&self) -> &dyn Repository<Unit> {
        self.inner.units()
    }

    fn members(&self) -> &dyn Repository<Member> {
        &self.members
    }

    fn roles(&self) -> &dyn Repository<Role> {
        self.inner.roles()
    }

    fn events(&self) -> &dyn Repository<Event> {
        self.inner.events()
    }

    fn tasks(&self) -> &dyn Repository<AllocationTask> {
        self.inner.tasks()
    }
}

/// Store whose every read and write fails.
pub(super) struct UnavailableStore;

impl<T: Record> Repository<T> for UnavailableStore {
    fn insert(&self, _record: T) -> Result<T, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: T) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &T::Id) -> Result<Option<T>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn remove(&self, _id: &T::Id) -> Result<Option<T>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self) -> Result<Vec<T>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl RosterStore for UnavailableStore {
    fn clubs(&self) -> &dyn Repository<Club> {
        self
    }

    fn units(&self) -> &dyn Repository<Unit> {
        self
    }

    fn members(&self) -> &dyn Repository<Member> {
        self
    }

    fn roles(&self) -> &dyn Repository<Role> {
        self
    }

    fn events(&self) -> &dyn Repository<Event> {
        self
    }

    fn tasks(&self) -> &dyn Repository<AllocationTask> {
        self
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
