//! Validation stage: turn a [`RawRow`] into an [`EnrollmentRecord`].
//!
//! Only the two name columns can reject a row. Everything else is lenient:
//! a birth date that cannot be parsed becomes an absent birth date plus a
//! [`RowWarning`], never a rejection.

use crate::error::{Rejection, RejectionReason};
use crate::model::{CellValue, EnrollmentRecord, Field, RawRow};
use crate::output::{RowWarning, WarningKind};
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};

/// Text formats tried, in order, for birth dates stored as text.
///
/// `%Y` also accepts one to three digit years, so the two-digit `%y` form
/// must come first and every parse must land on a four-digit year.
const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d", "%d.%m.%y", "%d.%m.%Y", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y",
];

/// Smallest year a parsed text date may have.
const MIN_TEXT_YEAR: i32 = 1000;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M",
];

/// Largest serial the 1900 date system represents (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// A record plus the non-fatal notes raised while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRow {
    pub record: EnrollmentRecord,
    pub warnings: Vec<RowWarning>,
}

/// Result of reading one birth-date cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateOutcome {
    Absent,
    Parsed(NaiveDate),
    /// Something was there but it is not a date; carries the raw text.
    Unparsable(String),
}

/// Validate one row.
///
/// # Errors
/// Returns a [`Rejection`] when the trimmed last name, first name, or both
/// are empty. No other field can reject a row.
pub fn validate(row: &RawRow) -> Result<ValidatedRow, Rejection> {
    let last_name = text_of(row, Field::LastName);
    let first_name = text_of(row, Field::FirstName);

    let (last_name, first_name) = match (last_name, first_name) {
        (Some(l), Some(f)) => (l, f),
        (None, Some(_)) => return Err(reject(row, RejectionReason::MissingLastName)),
        (Some(_), None) => return Err(reject(row, RejectionReason::MissingFirstName)),
        (None, None) => return Err(reject(row, RejectionReason::BothNamesMissing)),
    };

    let mut warnings = Vec::new();
    let birth_date = match row.get(Field::BirthDate.header()).map(parse_birth_date) {
        Some(DateOutcome::Parsed(d)) => Some(d),
        Some(DateOutcome::Unparsable(raw)) => {
            warnings.push(RowWarning {
                row_number: row.row_number,
                kind: WarningKind::UnparsableBirthDate { raw },
            });
            None
        }
        Some(DateOutcome::Absent) | None => None,
    };

    Ok(ValidatedRow {
        record: EnrollmentRecord {
            last_name,
            first_name,
            birth_date,
            course: text_of(row, Field::Course),
        },
        warnings,
    })
}

/// Interpret a birth-date cell.
///
/// Accepts native date cells, Excel serial numbers, and the textual formats
/// in [`DATE_FORMATS`] / [`DATETIME_FORMATS`].
pub fn parse_birth_date(cell: &CellValue) -> DateOutcome {
    match cell {
        CellValue::Empty => DateOutcome::Absent,
        CellValue::Date(d) => DateOutcome::Parsed(*d),
        CellValue::Number(n) => match from_excel_serial(*n) {
            Some(d) => DateOutcome::Parsed(d),
            None => DateOutcome::Unparsable(n.to_string()),
        },
        CellValue::Text(s) => {
            let t = s.trim();
            if t.is_empty() {
                DateOutcome::Absent
            } else {
                parse_date_text(t)
                    .map_or_else(|| DateOutcome::Unparsable(t.to_string()), DateOutcome::Parsed)
            }
        }
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let four_digit = |d: &NaiveDate| d.year() >= MIN_TEXT_YEAR;
    DATE_FORMATS
        .iter()
        .filter_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .find(four_digit)
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .filter_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
                .find(four_digit)
        })
}

/// Serial day numbers of the 1900 date system (day 1 = 1900-01-01).
///
/// Serials below 61 are shifted by one day by the fictitious 1900-02-29;
/// they are too old to be birth dates and are rejected as unparsable.
fn from_excel_serial(serial: f64) -> Option<NaiveDate> {
    if !(61.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(Days::new(serial.trunc() as u64))
}

fn text_of(row: &RawRow, field: Field) -> Option<String> {
    row.get(field.header())
        .and_then(CellValue::as_text)
        .map(|s| s.into_owned())
}

fn reject(row: &RawRow, reason: RejectionReason) -> Rejection {
    Rejection {
        row_number: row.row_number,
        reason,
    }
}
