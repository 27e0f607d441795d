mod parser;

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{ClubId, MemberId, NewMember, UnitId};
use super::error::RosterError;
use super::repository::RosterStore;
use super::service::RosterService;

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Roster(RosterError),
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read member roster: {}", err),
            ImportError::Csv(err) => write!(f, "invalid member roster CSV: {}", err),
            ImportError::Roster(err) => write!(f, "could not prepare member import: {}", err),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv(err) => Some(err),
            ImportError::Roster(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<RosterError> for ImportError {
    fn from(err: RosterError) -> Self {
        Self::Roster(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub line: u64,
    pub reason: String,
}

/// Outcome of a roster import: created members and the rows that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: Vec<MemberId>,
    pub rejected: Vec<RejectedRow>,
}

/// Bulk member registration from a spreadsheet export.
///
/// Expected columns: `First Name`, `Last Name`, `Birth Date`, `Gender`, and the optional
/// `Email` and `Unit` (matched against the club's unit names, ignoring case).
pub struct MemberCsvImporter<'a, S> {
    roster: &'a RosterService<S>,
}

impl<'a, S> MemberCsvImporter<'a, S>
where
    S: RosterStore,
{
    pub fn new(roster: &'a RosterService<S>) -> Self {
        Self { roster }
    }

    pub fn import_path<P: AsRef<Path>>(
        &self,
        path: P,
        club_id: &ClubId,
        today: NaiveDate,
    ) -> Result<ImportReport, ImportError> {
        let file = std::fs::File::open(path)?;
        self.import_reader(file, club_id, today)
    }

    pub fn import_reader<R: Read>(
        &self,
        reader: R,
        club_id: &ClubId,
        today: NaiveDate,
    ) -> Result<ImportReport, ImportError> {
        self.roster.club(club_id)?;
        let units: HashMap<String, UnitId> = self
            .roster
            .units(club_id)?
            .into_iter()
            .map(|unit| (parser::normalize_header(&unit.name), unit.id))
            .collect();

        let mut report = ImportReport::default();
        for row in parser::parse_rows(reader)? {
            let row = match row {
                Ok(row) => row,
                Err(fault) => {
                    report.rejected.push(RejectedRow {
                        line: fault.line,
                        reason: fault.reason,
                    });
                    continue;
                }
            };

            let unit_id = match &row.unit {
                Some(name) => match units.get(&parser::normalize_header(name)) {
                    Some(unit_id) => Some(unit_id.clone()),
                    None => {
                        report.rejected.push(RejectedRow {
                            line: row.line,
                            reason: format!("unknown unit '{name}'"),
                        });
                        continue;
                    }
                },
                None => None,
            };

            let new_member = NewMember {
                first_name: row.first_name,
                last_name: row.last_name,
                birth_date: row.birth_date,
                gender: row.gender,
                email: row.email,
                unit_id,
            };

            match self.roster.register_member(club_id, new_member, today) {
                Ok(member) => report.imported.push(member.id),
                Err(RosterError::Repository(err)) => {
                    return Err(ImportError::Roster(RosterError::Repository(err)))
                }
                Err(err) => report.rejected.push(RejectedRow {
                    line: row.line,
                    reason: err.to_string(),
                }),
            }
        }

        if report.rejected.is_empty() {
            info!(club = %club_id, imported = report.imported.len(), "member roster imported");
        } else {
            warn!(
                club = %club_id,
                imported = report.imported.len(),
                rejected = report.rejected.len(),
                "member roster imported with rejections"
            );
        }
        Ok(report)
    }
}
