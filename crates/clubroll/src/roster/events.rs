use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::domain::{ClubId, Event, EventId, Member, MemberId, NewEvent};
use super::eligibility::event_eligibility;
use super::error::RosterError;
use super::repository::RosterStore;
use super::service::{require, SeatLock};

/// Club member who may take part in an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibilityEntry {
    pub member_id: MemberId,
    pub name: String,
    pub registered: bool,
}

/// Club events and participant registration.
pub struct EventService<S> {
    store: Arc<S>,
    seats: SeatLock,
}

impl<S> EventService<S>
where
    S: RosterStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            seats: SeatLock::default(),
        }
    }

    pub fn with_seat_lock(mut self, seats: SeatLock) -> Self {
        self.seats = seats;
        self
    }

    pub fn create(&self, club_id: &ClubId, new_event: NewEvent) -> Result<Event, RosterError> {
        require(self.store.clubs(), club_id)?;

        let title = new_event.title.trim().to_string();
        if title.is_empty() {
            return Err(RosterError::validation("title", "must not be empty"));
        }
        if new_event.ends_on < new_event.starts_on {
            return Err(RosterError::validation(
                "ends_on",
                format!(
                    "{} is before the start {}",
                    new_event.ends_on, new_event.starts_on
                ),
            ));
        }
        if let Some(range) = new_event.age_range {
            if !range.is_valid() {
                return Err(RosterError::validation(
                    "age_range",
                    format!("minimum {} exceeds maximum {}", range.min, range.max),
                ));
            }
        }
        if new_event.capacity == Some(0) {
            return Err(RosterError::validation("capacity", "must be at least 1"));
        }
        if let Some(unit_id) = &new_event.unit_id {
            let unit = require(self.store.units(), unit_id)?;
            if &unit.club_id != club_id {
                return Err(RosterError::validation(
                    "unit_id",
                    format!("unit {} belongs to another club", unit.id),
                ));
            }
        }

        let event = self.store.events().insert(Event {
            id: EventId::generate(),
            club_id: club_id.clone(),
            unit_id: new_event.unit_id,
            title,
            starts_on: new_event.starts_on,
            ends_on: new_event.ends_on,
            age_range: new_event.age_range,
            gender: new_event.gender,
            capacity: new_event.capacity,
            participants: Vec::new(),
        })?;
        info!(
            club = %club_id,
            event = %event.id,
            starts_on = %event.starts_on,
            "event created"
        );
        Ok(event)
    }

    pub fn get(&self, event_id: &EventId) -> Result<Event, RosterError> {
        require(self.store.events(), event_id)
    }

    /// Events of a club in chronological order.
    pub fn list(&self, club_id: &ClubId) -> Result<Vec<Event>, RosterError> {
        require(self.store.clubs(), club_id)?;
        let mut events: Vec<_> = self
            .store
            .events()
            .list()?
            .into_iter()
            .filter(|event| &event.club_id == club_id)
            .collect();
        events.sort_by(|left, right| {
            left.starts_on
                .cmp(&right.starts_on)
                .then_with(|| left.title.cmp(&right.title))
        });
        Ok(events)
    }

    pub fn delete(&self, event_id: &EventId) -> Result<Event, RosterError> {
        let event = self.get(event_id)?;
        self.store.events().remove(event_id)?;
        info!(event = %event.id, "event deleted");
        Ok(event)
    }

    pub fn register(
        &self,
        event_id: &EventId,
        member_id: &MemberId,
    ) -> Result<Event, RosterError> {
        let _seats = self.seats.hold()?;
        let mut event = self.get(event_id)?;
        let member = require(self.store.members(), member_id)?;
        if member.club_id != event.club_id {
            return Err(RosterError::validation(
                "member_id",
                format!("member {} belongs to another club", member.id),
            ));
        }
        if event.participants.contains(member_id) {
            return Err(RosterError::Conflict(format!(
                "member {} is already registered for event {}",
                member.id, event.id
            )));
        }
        event_eligibility(&event, &member)?;
        if event.is_full() {
            return Err(RosterError::Conflict(format!("event {} is full", event.id)));
        }

        event.participants.push(member.id.clone());
        self.store.events().update(event.clone())?;
        info!(event = %event.id, member = %member.id, "member registered for event");
        Ok(event)
    }

    pub fn unregister(
        &self,
        event_id: &EventId,
        member_id: &MemberId,
    ) -> Result<Event, RosterError> {
        let _seats = self.seats.hold()?;
        let mut event = self.get(event_id)?;
        if !event.participants.contains(member_id) {
            return Err(RosterError::NotFound {
                kind: "registration",
                id: format!("{event_id}/{member_id}"),
            });
        }
        event.participants.retain(|participant| participant != member_id);
        self.store.events().update(event.clone())?;
        Ok(event)
    }

    /// Club members who satisfy the event's unit, gender and age restrictions.
    pub fn eligible_members(
        &self,
        event_id: &EventId,
    ) -> Result<Vec<EligibilityEntry>, RosterError> {
        let event = self.get(event_id)?;
        let mut members: Vec<Member> = self
            .store
            .members()
            .list()?
            .into_iter()
            .filter(|member| member.club_id == event.club_id)
            .collect();
        members.sort_by(|left, right| {
            left.last_name
                .cmp(&right.last_name)
                .then_with(|| left.first_name.cmp(&right.first_name))
        });

        Ok(members
            .into_iter()
            .filter(|member| event_eligibility(&event, member).is_ok())
            .map(|member| EligibilityEntry {
                registered: event.participants.contains(&member.id),
                name: member.full_name(),
                member_id: member.id,
            })
            .collect())
    }
}
