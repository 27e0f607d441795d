use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::info;

use super::allocation::occupancy;
use super::domain::{
    Club, ClubId, Member, MemberId, MemberRole, NewClub, NewMember, NewRole, NewUnit, Role,
    RoleGrant, RoleId, RoleScope, Unit, UnitId,
};
use super::eligibility::{check_unit, ReferenceDatePolicy};
use super::error::RosterError;
use super::repository::{Record, Repository, RepositoryError, RosterStore};

/// Fetch a record or report it as missing.
pub(crate) fn require<T: Record>(
    repository: &dyn Repository<T>,
    id: &T::Id,
) -> Result<T, RosterError> {
    repository
        .fetch(id)?
        .ok_or_else(|| RosterError::not_found::<T>(id))
}

/// Serializes every write that takes or frees a unit or event place. One guard is
/// shared by the roster, event and allocation services.
#[derive(Debug, Clone, Default)]
pub struct SeatLock(Arc<Mutex<()>>);

impl SeatLock {
    pub(crate) fn hold(&self) -> Result<MutexGuard<'_, ()>, RosterError> {
        self.0.lock().map_err(|_| {
            RosterError::Repository(RepositoryError::Unavailable(
                "seat lock poisoned".to_string(),
            ))
        })
    }
}

fn required_text(field: &'static str, value: &str) -> Result<String, RosterError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RosterError::validation(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Role together with the unit it is held in, for member role listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeldRole {
    pub role_id: RoleId,
    pub name: String,
    pub scope: RoleScope,
    pub unit_id: Option<UnitId>,
}

/// CRUD over clubs, units, members and roles.
pub struct RosterService<S> {
    store: Arc<S>,
    policy: ReferenceDatePolicy,
    seats: SeatLock,
}

impl<S> RosterService<S>
where
    S: RosterStore,
{
    pub fn new(store: Arc<S>, policy: ReferenceDatePolicy) -> Self {
        Self {
            store,
            policy,
            seats: SeatLock::default(),
        }
    }

    pub fn with_seat_lock(mut self, seats: SeatLock) -> Self {
        self.seats = seats;
        self
    }

    pub fn create_club(&self, new_club: NewClub) -> Result<Club, RosterError> {
        let name = required_text("name", &new_club.name)?;
        self.ensure_unique_club_name(&name, None)?;

        let club = self.store.clubs().insert(Club {
            id: ClubId::generate(),
            name,
            description: optional_text(new_club.description),
        })?;
        info!(club = %club.id, name = %club.name, "club created");
        Ok(club)
    }

    pub fn club(&self, club_id: &ClubId) -> Result<Club, RosterError> {
        require(self.store.clubs(), club_id)
    }

    pub fn clubs(&self) -> Result<Vec<Club>, RosterError> {
        let mut clubs = self.store.clubs().list()?;
        clubs.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(clubs)
    }

    pub fn update_club(&self, club_id: &ClubId, update: NewClub) -> Result<Club, RosterError> {
        let mut club = self.club(club_id)?;
        let name = required_text("name", &update.name)?;
        self.ensure_unique_club_name(&name, Some(club_id))?;

        club.name = name;
        club.description = optional_text(update.description);
        self.store.clubs().update(club.clone())?;
        Ok(club)
    }

    /// Refused while the club still has units or members; roles, events and tasks go with it.
    pub fn delete_club(&self, club_id: &ClubId) -> Result<Club, RosterError> {
        let _seats = self.seats.hold()?;
        let club = self.club(club_id)?;
        if !self.units(club_id)?.is_empty() || !self.members(club_id, None)?.is_empty() {
            return Err(RosterError::Conflict(format!(
                "club {} still has units or members",
                club.id
            )));
        }

        for role in self.roles(club_id)? {
            self.store.roles().remove(&role.id)?;
        }
        for event in self.store.events().list()? {
            if &event.club_id == club_id {
                self.store.events().remove(&event.id)?;
            }
        }
        for task in self.store.tasks().list()? {
            if &task.club_id == club_id {
                self.store.tasks().remove(&task.id)?;
            }
        }

        self.store.clubs().remove(club_id)?;
        info!(club = %club.id, "club deleted");
        Ok(club)
    }

    pub fn create_unit(&self, club_id: &ClubId, new_unit: NewUnit) -> Result<Unit, RosterError> {
        self.club(club_id)?;
        let name = self.validate_unit(club_id, &new_unit, None)?;

        let unit = self.store.units().insert(Unit {
            id: UnitId::generate(),
            club_id: club_id.clone(),
            name,
            gender: new_unit.gender,
            age_range: new_unit.age_range,
            capacity: new_unit.capacity,
        })?;
        info!(
            club = %club_id,
            unit = %unit.id,
            ages = %unit.age_range,
            gender = %unit.gender,
            capacity = unit.capacity,
            "unit created"
        );
        Ok(unit)
    }

    pub fn unit(&self, unit_id: &UnitId) -> Result<Unit, RosterError> {
        require(self.store.units(), unit_id)
    }

    /// Units of a club, youngest first.
    pub fn units(&self, club_id: &ClubId) -> Result<Vec<Unit>, RosterError> {
        let mut units: Vec<_> = self
            .store
            .units()
            .list()?
            .into_iter()
            .filter(|unit| &unit.club_id == club_id)
            .collect();
        units.sort_by(|left, right| {
            left.age_range
                .min
                .cmp(&right.age_range.min)
                .then_with(|| left.name.cmp(&right.name))
        });
        Ok(units)
    }

    pub fn update_unit(&self, unit_id: &UnitId, update: NewUnit) -> Result<Unit, RosterError> {
        let _seats = self.seats.hold()?;
        let mut unit = self.unit(unit_id)?;
        let name = self.validate_unit(&unit.club_id, &update, Some(unit_id))?;

        let members = self.members(&unit.club_id, None)?;
        let seated = occupancy(unit_id, &members, None);
        if update.capacity < seated {
            return Err(RosterError::Conflict(format!(
                "unit {} has {} members, capacity cannot drop to {}",
                unit.id, seated, update.capacity
            )));
        }

        unit.name = name;
        unit.gender = update.gender;
        unit.age_range = update.age_range;
        unit.capacity = update.capacity;
        self.store.units().update(unit.clone())?;
        Ok(unit)
    }

    pub fn delete_unit(&self, unit_id: &UnitId) -> Result<Unit, RosterError> {
        let _seats = self.seats.hold()?;
        let unit = self.unit(unit_id)?;
        let members = self.members(&unit.club_id, None)?;
        if occupancy(unit_id, &members, None) > 0 {
            return Err(RosterError::Conflict(format!(
                "unit {} still has members",
                unit.id
            )));
        }
        let restricted_events = self
            .store
            .events()
            .list()?
            .into_iter()
            .any(|event| event.unit_id.as_ref() == Some(unit_id));
        if restricted_events {
            return Err(RosterError::Conflict(format!(
                "unit {} is referenced by events",
                unit.id
            )));
        }

        for mut member in members {
            let before = member.roles.len();
            member
                .roles
                .retain(|held| held.unit_id.as_ref() != Some(unit_id));
            if member.roles.len() != before {
                self.store.members().update(member)?;
            }
        }

        self.store.units().remove(unit_id)?;
        info!(unit = %unit.id, "unit deleted");
        Ok(unit)
    }

    pub fn register_member(
        &self,
        club_id: &ClubId,
        new_member: NewMember,
        today: NaiveDate,
    ) -> Result<Member, RosterError> {
        let _seats = self.seats.hold()?;
        self.club(club_id)?;
        let member = self.validate_member(club_id, new_member, None, today)?;
        let member = self.store.members().insert(Member {
            id: MemberId::generate(),
            ..member
        })?;
        info!(club = %club_id, member = %member.id, "member registered");
        Ok(member)
    }

    pub fn member(&self, member_id: &MemberId) -> Result<Member, RosterError> {
        require(self.store.members(), member_id)
    }

    /// Members of a club sorted by last then first name, optionally limited to a unit.
    pub fn members(
        &self,
        club_id: &ClubId,
        unit_id: Option<&UnitId>,
    ) -> Result<Vec<Member>, RosterError> {
        let mut members: Vec<_> = self
            .store
            .members()
            .list()?
            .into_iter()
            .filter(|member| &member.club_id == club_id)
            .filter(|member| unit_id.map_or(true, |unit| member.unit_id.as_ref() == Some(unit)))
            .collect();
        members.sort_by(|left, right| {
            left.last_name
                .cmp(&right.last_name)
                .then_with(|| left.first_name.cmp(&right.first_name))
        });
        Ok(members)
    }

    pub fn update_member(
        &self,
        member_id: &MemberId,
        update: NewMember,
        today: NaiveDate,
    ) -> Result<Member, RosterError> {
        let _seats = self.seats.hold()?;
        let current = self.member(member_id)?;
        let validated = self.validate_member(&current.club_id, update, Some(&current), today)?;
        let member = Member {
            id: current.id,
            club_id: current.club_id,
            joined_on: current.joined_on,
            roles: current.roles,
            ..validated
        };
        self.store.members().update(member.clone())?;
        Ok(member)
    }

    /// Removes the member along with event registrations and allocation tasks.
    pub fn remove_member(&self, member_id: &MemberId) -> Result<Member, RosterError> {
        let _seats = self.seats.hold()?;
        let member = self.member(member_id)?;

        for mut event in self.store.events().list()? {
            if event.participants.contains(member_id) {
                event.participants.retain(|participant| participant != member_id);
                self.store.events().update(event)?;
            }
        }
        for task in self.store.tasks().list()? {
            if &task.member_id == member_id {
                self.store.tasks().remove(&task.id)?;
            }
        }

        self.store.members().remove(member_id)?;
        info!(member = %member.id, "member removed");
        Ok(member)
    }

    pub fn create_role(&self, club_id: &ClubId, new_role: NewRole) -> Result<Role, RosterError> {
        self.club(club_id)?;
        let name = required_text("name", &new_role.name)?;
        let taken = self
            .roles(club_id)?
            .iter()
            .any(|role| role.name.eq_ignore_ascii_case(&name));
        if taken {
            return Err(RosterError::Conflict(format!(
                "role '{name}' already exists in club {club_id}"
            )));
        }

        let role = self.store.roles().insert(Role {
            id: RoleId::generate(),
            club_id: club_id.clone(),
            name,
            scope: new_role.scope,
        })?;
        info!(club = %club_id, role = %role.id, "role created");
        Ok(role)
    }

    pub fn roles(&self, club_id: &ClubId) -> Result<Vec<Role>, RosterError> {
        let mut roles: Vec<_> = self
            .store
            .roles()
            .list()?
            .into_iter()
            .filter(|role| &role.club_id == club_id)
            .collect();
        roles.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(roles)
    }

    pub fn delete_role(&self, role_id: &RoleId) -> Result<Role, RosterError> {
        let role = require(self.store.roles(), role_id)?;
        let _seats = self.seats.hold()?;
        for mut member in self.members(&role.club_id, None)? {
            if member.holds_role(role_id) {
                member.roles.retain(|held| &held.role_id != role_id);
                self.store.members().update(member)?;
            }
        }
        self.store.roles().remove(role_id)?;
        Ok(role)
    }

    pub fn grant_role(
        &self,
        member_id: &MemberId,
        grant: RoleGrant,
    ) -> Result<Member, RosterError> {
        let _seats = self.seats.hold()?;
        let mut member = self.member(member_id)?;
        let role = require(self.store.roles(), &grant.role_id)?;
        if role.club_id != member.club_id {
            return Err(RosterError::validation(
                "role_id",
                format!("role {} belongs to another club", role.id),
            ));
        }
        if member.holds_role(&role.id) {
            return Err(RosterError::Conflict(format!(
                "member {} already holds role {}",
                member.id, role.id
            )));
        }

        let unit_id = match (role.scope, grant.unit_id) {
            (RoleScope::Club, None) => None,
            (RoleScope::Club, Some(_)) => {
                return Err(RosterError::validation(
                    "unit_id",
                    "club-wide roles are not bound to a unit",
                ))
            }
            (RoleScope::Unit, None) => {
                return Err(RosterError::validation(
                    "unit_id",
                    "unit roles require a unit",
                ))
            }
            (RoleScope::Unit, Some(unit_id)) => {
                let unit = self.unit(&unit_id)?;
                if unit.club_id != member.club_id {
                    return Err(RosterError::validation(
                        "unit_id",
                        format!("unit {} belongs to another club", unit.id),
                    ));
                }
                Some(unit.id)
            }
        };

        member.roles.push(MemberRole {
            role_id: role.id.clone(),
            unit_id,
        });
        self.store.members().update(member.clone())?;
        info!(member = %member.id, role = %role.id, "role granted");
        Ok(member)
    }

    pub fn revoke_role(
        &self,
        member_id: &MemberId,
        role_id: &RoleId,
    ) -> Result<Member, RosterError> {
        let _seats = self.seats.hold()?;
        let mut member = self.member(member_id)?;
        if !member.holds_role(role_id) {
            return Err(RosterError::NotFound {
                kind: "role assignment",
                id: format!("{member_id}/{role_id}"),
            });
        }
        member.roles.retain(|held| &held.role_id != role_id);
        self.store.members().update(member.clone())?;
        info!(member = %member.id, role = %role_id, "role revoked");
        Ok(member)
    }

    pub fn member_roles(&self, member_id: &MemberId) -> Result<Vec<HeldRole>, RosterError> {
        let member = self.member(member_id)?;
        let mut held = Vec::with_capacity(member.roles.len());
        for assignment in member.roles {
            let role = require(self.store.roles(), &assignment.role_id)?;
            held.push(HeldRole {
                role_id: role.id,
                name: role.name,
                scope: role.scope,
                unit_id: assignment.unit_id,
            });
        }
        held.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(held)
    }

    fn ensure_unique_club_name(
        &self,
        name: &str,
        except: Option<&ClubId>,
    ) -> Result<(), RosterError> {
        let taken = self
            .store
            .clubs()
            .list()?
            .iter()
            .any(|club| Some(&club.id) != except && club.name.eq_ignore_ascii_case(name));
        if taken {
            return Err(RosterError::Conflict(format!(
                "club '{name}' already exists"
            )));
        }
        Ok(())
    }

    fn validate_unit(
        &self,
        club_id: &ClubId,
        unit: &NewUnit,
        except: Option<&UnitId>,
    ) -> Result<String, RosterError> {
        let name = required_text("name", &unit.name)?;
        if !unit.age_range.is_valid() {
            return Err(RosterError::validation(
                "age_range",
                format!(
                    "minimum {} exceeds maximum {}",
                    unit.age_range.min, unit.age_range.max
                ),
            ));
        }
        if unit.capacity == 0 {
            return Err(RosterError::validation("capacity", "must be at least 1"));
        }

        let taken = self.units(club_id)?.iter().any(|existing| {
            Some(&existing.id) != except && existing.name.eq_ignore_ascii_case(&name)
        });
        if taken {
            return Err(RosterError::Conflict(format!(
                "unit '{name}' already exists in club {club_id}"
            )));
        }
        Ok(name)
    }

    /// Validates details and the unit's admission rules. Capacity is only checked when the
    /// member moves into the unit; a member keeping their unit already holds the place.
    fn validate_member(
        &self,
        club_id: &ClubId,
        details: NewMember,
        current: Option<&Member>,
        today: NaiveDate,
    ) -> Result<Member, RosterError> {
        let first_name = required_text("first_name", &details.first_name)?;
        let last_name = required_text("last_name", &details.last_name)?;
        if details.birth_date > today {
            return Err(RosterError::validation(
                "birth_date",
                format!("{} is in the future", details.birth_date),
            ));
        }
        let email = optional_text(details.email);
        if let Some(address) = &email {
            if !address.contains('@') {
                return Err(RosterError::validation(
                    "email",
                    format!("'{address}' is not an e-mail address"),
                ));
            }
        }

        if let Some(unit_id) = &details.unit_id {
            let unit = self.unit(unit_id)?;
            if &unit.club_id != club_id {
                return Err(RosterError::validation(
                    "unit_id",
                    format!("unit {} belongs to another club", unit.id),
                ));
            }

            let reference_age = self
                .policy
                .reference_age(details.birth_date, today.year())
                .ok_or_else(|| RosterError::validation("birth_date", "out of range"))?;
            check_unit(&unit, details.gender, reference_age)?;

            let moving_in =
                current.map_or(true, |member| member.unit_id.as_ref() != Some(unit_id));
            if moving_in {
                let members = self.members(club_id, None)?;
                let excluding = current.map(|member| &member.id);
                if occupancy(&unit.id, &members, excluding) >= unit.capacity {
                    return Err(RosterError::UnitFull {
                        unit: unit.id,
                        capacity: unit.capacity,
                    });
                }
            }
        }

        Ok(Member {
            id: MemberId::from("pending"),
            club_id: club_id.clone(),
            first_name,
            last_name,
            birth_date: details.birth_date,
            gender: details.gender,
            email,
            unit_id: details.unit_id,
            joined_on: today,
            roles: Vec::new(),
        })
    }
}
