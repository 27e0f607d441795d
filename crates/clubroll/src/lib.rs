//! Membership management for clubs: units, members, roles, events, and the
//! age/gender based unit allocation rule.

pub mod config;
pub mod error;
pub mod roster;
pub mod telemetry;
