//! Age and admission rules shared by unit allocation and event registration.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::domain::{AgeRange, Event, Gender, Member, Unit, UnitGender, UnitId};

/// Calendar day each year at which a member's age is measured for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDatePolicy {
    month: u32,
    day: u32,
}

impl ReferenceDatePolicy {
    /// Accepts any day that exists in a leap year.
    pub fn new(month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(2000, month, day).map(|_| Self { month, day })
    }

    pub const fn month(&self) -> u32 {
        self.month
    }

    pub const fn day(&self) -> u32 {
        self.day
    }

    /// The reference day in `year`; 29 February falls back to the 28th outside leap years.
    pub fn reference_date(&self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day).or_else(|| {
            (self.month == 2 && self.day == 29)
                .then(|| NaiveDate::from_ymd_opt(year, 2, 28))
                .flatten()
        })
    }

    pub fn reference_age(&self, birth_date: NaiveDate, year: i32) -> Option<u32> {
        self.reference_date(year)
            .map(|reference| age_on(birth_date, reference))
    }
}

impl Default for ReferenceDatePolicy {
    fn default() -> Self {
        Self { month: 6, day: 1 }
    }
}

/// Whole years completed on `on`. A 29 February birthday is reached on 1 March
/// in non-leap years.
pub fn age_on(birth_date: NaiveDate, on: NaiveDate) -> u32 {
    if on <= birth_date {
        return 0;
    }

    let mut years = on.year() - birth_date.year();
    if (on.month(), on.day()) < (birth_date.month(), birth_date.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

pub fn unit_accepts(unit: &Unit, gender: Gender, age: u32) -> bool {
    unit.gender.admits(gender) && unit.age_range.contains(age)
}

/// Reason a member cannot join a unit or event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Ineligibility {
    #[error("age {age} is outside the accepted range {range}")]
    AgeOutOfRange { age: u32, range: AgeRange },
    #[error("{gender} members are not admitted ({admits} only)")]
    GenderNotAdmitted { gender: Gender, admits: UnitGender },
    #[error("restricted to members of unit {0}")]
    UnitRestricted(UnitId),
}

/// Checks a member against a unit for the given reference age.
pub fn check_unit(unit: &Unit, member_gender: Gender, age: u32) -> Result<(), Ineligibility> {
    if !unit.gender.admits(member_gender) {
        return Err(Ineligibility::GenderNotAdmitted {
            gender: member_gender,
            admits: unit.gender,
        });
    }
    if !unit.age_range.contains(age) {
        return Err(Ineligibility::AgeOutOfRange {
            age,
            range: unit.age_range,
        });
    }
    Ok(())
}

/// Age is measured on the first day of the event.
pub fn event_eligibility(event: &Event, member: &Member) -> Result<(), Ineligibility> {
    if let Some(unit_id) = &event.unit_id {
        if member.unit_id.as_ref() != Some(unit_id) {
            return Err(Ineligibility::UnitRestricted(unit_id.clone()));
        }
    }

    if let Some(admits) = event.gender {
        if !admits.admits(member.gender) {
            return Err(Ineligibility::GenderNotAdmitted {
                gender: member.gender,
                admits,
            });
        }
    }

    if let Some(range) = event.age_range {
        let age = age_on(member.birth_date, event.starts_on);
        if !range.contains(age) {
            return Err(Ineligibility::AgeOutOfRange { age, range });
        }
    }

    Ok(())
}
