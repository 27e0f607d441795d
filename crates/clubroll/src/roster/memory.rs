use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::domain::{AllocationTask, Club, Event, Member, Role, Unit};
use super::repository::{Record, Repository, RepositoryError, RosterStore};

/// Process-local repository ordered by identifier.
pub struct InMemoryRepository<T: Record> {
    records: Mutex<BTreeMap<T::Id, T>>,
}

impl<T: Record> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<T: Record> InMemoryRepository<T> {
    fn guard(&self) -> Result<MutexGuard<'_, BTreeMap<T::Id, T>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable(format!("{} store poisoned", T::KIND)))
    }
}

impl<T: Record> Repository<T> for InMemoryRepository<T> {
    fn insert(&self, record: T) -> Result<T, RepositoryError> {
        let mut guard = self.guard()?;
        if guard.contains_key(record.id()) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id().clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: T) -> Result<(), RepositoryError> {
        let mut guard = self.guard()?;
        match guard.get_mut(record.id()) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &T::Id) -> Result<Option<T>, RepositoryError> {
        Ok(self.guard()?.get(id).cloned())
    }

    fn remove(&self, id: &T::Id) -> Result<Option<T>, RepositoryError> {
        Ok(self.guard()?.remove(id))
    }

    fn list(&self) -> Result<Vec<T>, RepositoryError> {
        Ok(self.guard()?.values().cloned().collect())
    }
}

/// Roster backend kept entirely in memory; the default for the API binary and tests.
#[derive(Default)]
pub struct InMemoryRosterStore {
    clubs: InMemoryRepository<Club>,
    units: InMemoryRepository<Unit>,
    members: InMemoryRepository<Member>,
    roles: InMemoryRepository<Role>,
    events: InMemoryRepository<Event>,
    tasks: InMemoryRepository<AllocationTask>,
}

impl RosterStore for InMemoryRosterStore {
    fn clubs(&self) -> &dyn Repository<Club> {
        &self.clubs
    }

    fn units(&self) -> &dyn Repository<Unit> {
        &self.units
    }

    fn members(&self) -> &dyn Repository<Member> {
        &self.members
    }

    fn roles(&self) -> &dyn Repository<Role> {
        &self.roles
    }

    fn events(&self) -> &dyn Repository<Event> {
        &self.events
    }

    fn tasks(&self) -> &dyn Repository<AllocationTask> {
        &self.tasks
    }
}
