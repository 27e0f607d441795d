use super::domain::{MemberId, UnitId};
use super::eligibility::Ineligibility;
use super::repository::{NotificationError, Record, RepositoryError};

/// Error raised by the roster services.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Ineligible(#[from] Ineligibility),
    #[error("no unit of the club accepts member {member} (age {reference_age})")]
    NoMatchingUnit {
        member: MemberId,
        reference_age: u32,
    },
    #[error("unit {unit} is full ({capacity} places)")]
    UnitFull { unit: UnitId, capacity: u32 },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
}

impl RosterError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found<T: Record>(id: &T::Id) -> Self {
        Self::NotFound {
            kind: T::KIND,
            id: id.to_string(),
        }
    }
}
