//! Row and record types shared by every pipeline stage.
//!
//! ```text
//! RawRow ──validate──▶ EnrollmentRecord ──render──▶ RenderedPage
//! ```
//!
//! A [`RawRow`] is what the reader saw, untrimmed and untyped beyond the cell
//! kind the workbook reported. An [`EnrollmentRecord`] only exists once both
//! names are present, so every later stage can rely on that.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Header of the required last-name column.
pub const HEADER_LAST_NAME: &str = "Nachname";
/// Header of the required first-name column.
pub const HEADER_FIRST_NAME: &str = "Vorname";
/// Header of the optional birth-date column.
pub const HEADER_BIRTH_DATE: &str = "Geburtsdatum";
/// Header of the optional course column.
pub const HEADER_COURSE: &str = "Kurs";

/// Headers a sheet must carry for conversion to start.
pub const REQUIRED_HEADERS: [&str; 2] = [HEADER_LAST_NAME, HEADER_FIRST_NAME];
/// Headers that may be absent; their fields are then empty for every row.
pub const OPTIONAL_HEADERS: [&str; 2] = [HEADER_BIRTH_DATE, HEADER_COURSE];

/// The fixed set of enrollment fields, in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    LastName,
    FirstName,
    BirthDate,
    Course,
}

impl Field {
    /// Every field, top to bottom as they appear on a page.
    pub const ALL: [Field; 4] = [
        Field::LastName,
        Field::FirstName,
        Field::BirthDate,
        Field::Course,
    ];

    /// Column header this field is read from.
    pub fn header(self) -> &'static str {
        match self {
            Field::LastName => HEADER_LAST_NAME,
            Field::FirstName => HEADER_FIRST_NAME,
            Field::BirthDate => HEADER_BIRTH_DATE,
            Field::Course => HEADER_COURSE,
        }
    }

    /// Fully-qualified AcroForm field name this field is written into.
    pub fn template_field(self) -> &'static str {
        match self {
            Field::LastName => "Nachname",
            Field::FirstName => "Vorname",
            Field::BirthDate => "Geburtsdatum",
            Field::Course => "Kurs",
        }
    }
}

/// One cell as the reader found it.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    /// A cell the workbook itself typed as a date.
    Date(NaiveDate),
}

impl CellValue {
    /// Trimmed textual form, or `None` when the cell is blank.
    ///
    /// Whole numbers lose their fractional part (`12.0` → `"12"`) so numeric
    /// cells in text columns read the way the spreadsheet displayed them.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => {
                let t = s.trim();
                (!t.is_empty()).then_some(Cow::Borrowed(t))
            }
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(Cow::Owned(format!("{}", *n as i64)))
            }
            CellValue::Number(n) => Some(Cow::Owned(n.to_string())),
            CellValue::Date(d) => Some(Cow::Owned(d.format("%Y-%m-%d").to_string())),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.as_text().is_none()
    }
}

/// One data row keyed by header name.
///
/// Headers are shared between all rows of a sheet; `values[i]` belongs to
/// `headers[i]`. A row shorter than the header row has no value for the trailing
/// columns.
#[derive(Debug, Clone)]
pub struct RawRow {
    /// 1-based row number in the source sheet.
    pub row_number: usize,
    headers: Arc<[String]>,
    values: Vec<CellValue>,
}

impl RawRow {
    pub fn new(row_number: usize, headers: Arc<[String]>, values: Vec<CellValue>) -> Self {
        Self {
            row_number,
            headers,
            values,
        }
    }

    /// Cell under `header`; first matching column wins on duplicate headers.
    pub fn get(&self, header: &str) -> Option<&CellValue> {
        let idx = self.headers.iter().position(|h| h == header)?;
        self.values.get(idx)
    }

    pub fn is_blank(&self) -> bool {
        self.values.iter().all(CellValue::is_blank)
    }
}

/// One validated enrollment row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentRecord {
    pub last_name: String,
    pub first_name: String,
    pub birth_date: Option<NaiveDate>,
    pub course: Option<String>,
}

impl EnrollmentRecord {
    /// The value printed for `field`, or `None` when the field is absent.
    pub fn display_value(&self, field: Field) -> Option<Cow<'_, str>> {
        match field {
            Field::LastName => Some(Cow::Borrowed(&self.last_name)),
            Field::FirstName => Some(Cow::Borrowed(&self.first_name)),
            Field::BirthDate => self
                .birth_date
                .map(|d| Cow::Owned(d.format("%d.%m.%Y").to_string())),
            Field::Course => self.course.as_deref().map(Cow::Borrowed),
        }
    }
}

impl fmt::Display for EnrollmentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.last_name, self.first_name)
    }
}
