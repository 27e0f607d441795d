//! Automatic unit allocation by reference age and gender, with capacity follow-up tasks.

mod plan;

pub use plan::{
    accepting_units, occupancy, plan_allocation, rank_candidates, AllocationPlan, UnitCandidate,
};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    AllocationTask, ClubId, Member, MemberId, TaskId, TaskKind, TaskStatus, Unit, UnitId,
};
use super::eligibility::{check_unit, ReferenceDatePolicy};
use super::error::RosterError;
use super::repository::{Notification, NotificationPublisher, RosterStore};
use super::service::{require, SeatLock};

/// Result of an allocation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AllocationOutcome {
    Assigned {
        member_id: MemberId,
        reference_age: u32,
        unit: UnitCandidate,
    },
    ChoiceRequired {
        member_id: MemberId,
        reference_age: u32,
        candidates: Vec<UnitCandidate>,
    },
    CapacityExceeded {
        member_id: MemberId,
        reference_age: u32,
        task: AllocationTask,
    },
}

/// Candidate listing for a human making the allocation decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateListing {
    pub member_id: MemberId,
    pub year: i32,
    pub reference_age: u32,
    pub candidates: Vec<UnitCandidate>,
}

/// Service applying the allocation rule against the roster store.
pub struct AllocationService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    policy: ReferenceDatePolicy,
    seats: SeatLock,
}

impl<S, N> AllocationService<S, N>
where
    S: RosterStore,
    N: NotificationPublisher + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, policy: ReferenceDatePolicy) -> Self {
        Self {
            store,
            notifier,
            policy,
            seats: SeatLock::default(),
        }
    }

    /// Share the guard with the services that register members and event participants.
    pub fn with_seat_lock(mut self, seats: SeatLock) -> Self {
        self.seats = seats;
        self
    }

    pub fn policy(&self) -> ReferenceDatePolicy {
        self.policy
    }

    pub fn reference_age(&self, member: &Member, year: i32) -> Result<u32, RosterError> {
        self.policy
            .reference_age(member.birth_date, year)
            .ok_or_else(|| RosterError::validation("year", format!("{year} is out of range")))
    }

    /// Allocate a member for `year`. A single open unit is assigned immediately, several
    /// are returned for a human choice, and none with free places raises a task.
    pub fn allocate(
        &self,
        member_id: &MemberId,
        year: i32,
        today: NaiveDate,
    ) -> Result<AllocationOutcome, RosterError> {
        let _seats = self.seats.hold()?;

        let mut member = require(self.store.members(), member_id)?;
        let reference_age = self.reference_age(&member, year)?;
        let units = self.club_units(&member.club_id)?;
        let roster = self.club_members(&member.club_id)?;

        match plan_allocation(&member, reference_age, &units, &roster) {
            AllocationPlan::NoMatchingUnit => {
                warn!(member = %member.id, reference_age, "no unit matches member");
                Err(RosterError::NoMatchingUnit {
                    member: member.id,
                    reference_age,
                })
            }
            AllocationPlan::Assign(candidate) => {
                member.unit_id = Some(candidate.unit_id.clone());
                self.store.members().update(member.clone())?;
                info!(
                    member = %member.id,
                    unit = %candidate.unit_id,
                    reference_age,
                    "member allocated"
                );
                self.notify(
                    "member_allocated",
                    &member,
                    [
                        ("unit_id", candidate.unit_id.to_string()),
                        ("unit_name", candidate.name.clone()),
                    ],
                )?;
                Ok(AllocationOutcome::Assigned {
                    member_id: member.id,
                    reference_age,
                    unit: candidate,
                })
            }
            AllocationPlan::ChooseFrom(candidates) => {
                info!(
                    member = %member.id,
                    options = candidates.len(),
                    "allocation needs a choice"
                );
                Ok(AllocationOutcome::ChoiceRequired {
                    member_id: member.id,
                    reference_age,
                    candidates,
                })
            }
            AllocationPlan::CapacityExceeded(full) => {
                let task = self.open_capacity_task(&member, reference_age, full, today)?;
                Ok(AllocationOutcome::CapacityExceeded {
                    member_id: member.id,
                    reference_age,
                    task,
                })
            }
        }
    }

    /// Every unit accepting the member, full ones included, in allocation order.
    pub fn candidates(
        &self,
        member_id: &MemberId,
        year: i32,
    ) -> Result<CandidateListing, RosterError> {
        let member = require(self.store.members(), member_id)?;
        let reference_age = self.reference_age(&member, year)?;
        let units = self.club_units(&member.club_id)?;
        let roster = self.club_members(&member.club_id)?;

        Ok(CandidateListing {
            candidates: rank_candidates(&member, reference_age, &units, &roster),
            member_id: member.id,
            year,
            reference_age,
        })
    }

    /// Confirm a human choice: the unit must accept the member and still have a place.
    pub fn assign(
        &self,
        member_id: &MemberId,
        unit_id: &UnitId,
        year: i32,
    ) -> Result<Member, RosterError> {
        let _seats = self.seats.hold()?;

        let mut member = require(self.store.members(), member_id)?;
        let unit = require(self.store.units(), unit_id)?;
        if unit.club_id != member.club_id {
            return Err(RosterError::validation(
                "unit_id",
                format!("unit {} belongs to another club", unit.id),
            ));
        }

        let reference_age = self.reference_age(&member, year)?;
        check_unit(&unit, member.gender, reference_age)?;

        let roster = self.club_members(&member.club_id)?;
        if occupancy(&unit.id, &roster, Some(&member.id)) >= unit.capacity {
            return Err(RosterError::UnitFull {
                unit: unit.id,
                capacity: unit.capacity,
            });
        }

        member.unit_id = Some(unit.id.clone());
        self.store.members().update(member.clone())?;
        info!(member = %member.id, unit = %unit.id, "member assigned by hand");
        self.notify(
            "member_allocated",
            &member,
            [
                ("unit_id", unit.id.to_string()),
                ("unit_name", unit.name.clone()),
            ],
        )?;
        Ok(member)
    }

    pub fn tasks(
        &self,
        club_id: &ClubId,
        status: Option<TaskStatus>,
    ) -> Result<Vec<AllocationTask>, RosterError> {
        require(self.store.clubs(), club_id)?;
        let mut tasks: Vec<_> = self
            .store
            .tasks()
            .list()?
            .into_iter()
            .filter(|task| &task.club_id == club_id)
            .filter(|task| status.map_or(true, |wanted| task.status == wanted))
            .collect();
        tasks.sort_by(|left, right| {
            left.created_on
                .cmp(&right.created_on)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(tasks)
    }

    pub fn resolve_task(
        &self,
        task_id: &TaskId,
        today: NaiveDate,
        note: Option<String>,
    ) -> Result<AllocationTask, RosterError> {
        let mut task = require(self.store.tasks(), task_id)?;
        if task.status == TaskStatus::Resolved {
            return Err(RosterError::Conflict(format!(
                "task {} is already resolved",
                task.id
            )));
        }

        task.status = TaskStatus::Resolved;
        task.resolved_on = Some(today);
        if note.is_some() {
            task.note = note;
        }
        self.store.tasks().update(task.clone())?;
        info!(task = %task.id, member = %task.member_id, "allocation task resolved");
        Ok(task)
    }

    fn open_capacity_task(
        &self,
        member: &Member,
        reference_age: u32,
        full: Vec<UnitCandidate>,
        today: NaiveDate,
    ) -> Result<AllocationTask, RosterError> {
        let existing = self.store.tasks().list()?.into_iter().find(|task| {
            task.member_id == member.id
                && task.status == TaskStatus::Open
                && matches!(task.kind, TaskKind::CapacityExceeded { .. })
        });
        if let Some(task) = existing {
            info!(member = %member.id, task = %task.id, "capacity task already open");
            return Ok(task);
        }

        let full_units: Vec<UnitId> = full.into_iter().map(|unit| unit.unit_id).collect();
        let task = AllocationTask {
            id: TaskId::generate(),
            club_id: member.club_id.clone(),
            member_id: member.id.clone(),
            kind: TaskKind::CapacityExceeded {
                reference_age,
                full_units: full_units.clone(),
            },
            status: TaskStatus::Open,
            created_on: today,
            resolved_on: None,
            note: None,
        };
        let task = self.store.tasks().insert(task)?;
        warn!(
            member = %member.id,
            task = %task.id,
            full_units = full_units.len(),
            "every matching unit is full"
        );

        let units = full_units
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        // Withdraw the task so a retry notifies again.
        if let Err(err) = self.notify(
            "capacity_exceeded",
            member,
            [("task_id", task.id.to_string()), ("full_units", units)],
        ) {
            self.store.tasks().remove(&task.id)?;
            warn!(member = %member.id, task = %task.id, "capacity task withdrawn");
            return Err(err);
        }
        Ok(task)
    }

    fn notify<const K: usize>(
        &self,
        template: &str,
        member: &Member,
        details: [(&str, String); K],
    ) -> Result<(), RosterError> {
        let details: BTreeMap<String, String> = details
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();
        self.notifier.publish(Notification {
            template: template.to_string(),
            club_id: member.club_id.clone(),
            member_id: member.id.clone(),
            details,
        })?;
        Ok(())
    }

    fn club_units(&self, club_id: &ClubId) -> Result<Vec<Unit>, RosterError> {
        Ok(self
            .store
            .units()
            .list()?
            .into_iter()
            .filter(|unit| &unit.club_id == club_id)
            .collect())
    }

    fn club_members(&self, club_id: &ClubId) -> Result<Vec<Member>, RosterError> {
        Ok(self
            .store
            .members()
            .list()?
            .into_iter()
            .filter(|member| &member.club_id == club_id)
            .collect())
    }
}
