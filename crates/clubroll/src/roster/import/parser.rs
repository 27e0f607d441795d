use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use std::io::Read;

use super::super::domain::Gender;

/// One roster row after parsing, before it is checked against the club.
#[derive(Debug)]
pub(crate) struct MemberRow {
    pub(crate) line: u64,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) birth_date: NaiveDate,
    pub(crate) gender: Gender,
    pub(crate) email: Option<String>,
    pub(crate) unit: Option<String>,
}

/// A row that could not be read, with the CSV line it came from.
#[derive(Debug)]
pub(crate) struct RowFault {
    pub(crate) line: u64,
    pub(crate) reason: String,
}

pub(crate) fn parse_rows<R: Read>(
    reader: R,
) -> Result<Vec<Result<MemberRow, RowFault>>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader
        .headers()?
        .iter()
        .map(normalize_header)
        .collect::<csv::StringRecord>();

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        let row = match record.deserialize::<RawRow>(Some(&headers)) {
            Ok(raw) => raw.into_member_row(line),
            Err(err) => Err(RowFault {
                line,
                reason: err.to_string(),
            }),
        };
        rows.push(row);
    }

    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "first name")]
    first_name: String,
    #[serde(rename = "last name")]
    last_name: String,
    #[serde(rename = "birth date")]
    birth_date: String,
    gender: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    email: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    unit: Option<String>,
}

impl RawRow {
    fn into_member_row(self, line: u64) -> Result<MemberRow, RowFault> {
        let fault = |reason: String| RowFault { line, reason };

        let birth_date = parse_birth_date(&self.birth_date)
            .ok_or_else(|| fault(format!("unreadable birth date '{}'", self.birth_date)))?;
        let gender = Gender::parse(&self.gender)
            .ok_or_else(|| fault(format!("unknown gender '{}'", self.gender)))?;

        Ok(MemberRow {
            line,
            first_name: self.first_name,
            last_name: self.last_name,
            birth_date,
            gender,
            email: self.email,
            unit: self.unit,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

/// Lower-cases headers and strips byte-order marks so `First Name` and `first  name` match.
pub(crate) fn normalize_header(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.replace('_', " ").to_ascii_lowercase()
}

/// ISO dates first, then the day-first forms common in club spreadsheets.
fn parse_birth_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}
