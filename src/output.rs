//! Result types handed back to the caller.
//!
//! Everything here is plain data and `serde::Serialize`, so a shell can dump
//! a [`ConversionResult`] as JSON or map it onto its own messages.

use crate::error::Rejection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Summary of a successful conversion.
///
/// Success does not mean every row made it: `rejections` may be non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Non-blank data rows read from the sheet.
    pub rows_read: usize,
    /// Valid records rendered; equals the page count of the output.
    pub records_rendered: usize,
    /// Rejected rows in source order.
    pub rejections: Vec<Rejection>,
    /// Non-fatal notes about rows that were still rendered.
    pub warnings: Vec<RowWarning>,
    /// Where the document was written.
    pub output_path: PathBuf,
    /// Which layout the pages were drawn with.
    pub layout: LayoutKind,
    /// Wall-clock duration of the whole run.
    pub duration_ms: u64,
}

impl ConversionResult {
    /// `true` when at least one row was rejected.
    pub fn is_partial(&self) -> bool {
        !self.rejections.is_empty()
    }
}

/// A note about a row that was rendered despite imperfect data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowWarning {
    pub row_number: usize,
    pub kind: WarningKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WarningKind {
    /// The birth-date cell held something that is not a date; the page was
    /// rendered without a birth date.
    UnparsableBirthDate { raw: String },
}

/// Which [`crate::pipeline::layout::FormLayout`] variant a run used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    Template,
    Synthetic,
}

/// What [`crate::convert::inspect`] learned about a spreadsheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkbookSummary {
    pub path: PathBuf,
    /// Header names in column order.
    pub columns: Vec<String>,
    /// Non-blank data rows.
    pub total_rows: usize,
    pub missing_required: Vec<String>,
    pub available_optional: Vec<String>,
    /// `true` when every required column is present.
    pub valid: bool,
}
