use serde::{Deserialize, Serialize};

use super::super::domain::{Gender, Member, MemberId, Unit, UnitId};
use super::super::eligibility::unit_accepts;

/// A unit that accepts the member, with its occupancy at planning time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCandidate {
    pub unit_id: UnitId,
    pub name: String,
    pub occupancy: u32,
    pub capacity: u32,
    /// No free place left; listed so a human can still see the unit.
    pub full: bool,
}

impl UnitCandidate {
    fn new(unit: &Unit, occupancy: u32) -> Self {
        Self {
            unit_id: unit.id.clone(),
            name: unit.name.clone(),
            occupancy,
            capacity: unit.capacity,
            full: occupancy >= unit.capacity,
        }
    }

    pub const fn has_space(&self) -> bool {
        !self.full
    }

    pub const fn free_places(&self) -> u32 {
        self.capacity.saturating_sub(self.occupancy)
    }
}

/// Decision reached for a single member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationPlan {
    Assign(UnitCandidate),
    ChooseFrom(Vec<UnitCandidate>),
    CapacityExceeded(Vec<UnitCandidate>),
    NoMatchingUnit,
}

/// Units of the member's club accepting `gender`/`reference_age`, least occupied first,
/// ties broken by name and then id. The member's own seat is not counted.
pub fn rank_candidates(
    member: &Member,
    reference_age: u32,
    units: &[Unit],
    members: &[Member],
) -> Vec<UnitCandidate> {
    let mut candidates: Vec<UnitCandidate> = accepting_units(units, member.gender, reference_age)
        .filter(|unit| unit.club_id == member.club_id)
        .map(|unit| UnitCandidate::new(unit, occupancy(&unit.id, members, Some(&member.id))))
        .collect();

    candidates.sort_by(|left, right| {
        left.occupancy
            .cmp(&right.occupancy)
            .then_with(|| left.name.cmp(&right.name))
            .then_with(|| left.unit_id.cmp(&right.unit_id))
    });
    candidates
}

pub fn plan_allocation(
    member: &Member,
    reference_age: u32,
    units: &[Unit],
    members: &[Member],
) -> AllocationPlan {
    let ranked = rank_candidates(member, reference_age, units, members);
    if ranked.is_empty() {
        return AllocationPlan::NoMatchingUnit;
    }

    let (mut open, full): (Vec<_>, Vec<_>) =
        ranked.into_iter().partition(UnitCandidate::has_space);

    match open.len() {
        0 => AllocationPlan::CapacityExceeded(full),
        1 => AllocationPlan::Assign(open.remove(0)),
        _ => AllocationPlan::ChooseFrom(open),
    }
}

/// Members currently assigned to `unit_id`, optionally ignoring one member.
pub fn occupancy(unit_id: &UnitId, members: &[Member], excluding: Option<&MemberId>) -> u32 {
    members
        .iter()
        .filter(|member| member.unit_id.as_ref() == Some(unit_id))
        .filter(|member| Some(&member.id) != excluding)
        .count() as u32
}

/// Units admitting `gender` at `reference_age`, whatever their club or occupancy.
pub fn accepting_units<'a>(
    units: &'a [Unit],
    gender: Gender,
    reference_age: u32,
) -> impl Iterator<Item = &'a Unit> {
    units
        .iter()
        .filter(move |unit| unit_accepts(unit, gender, reference_age))
}
