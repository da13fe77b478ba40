//! Error types for the enroll2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertError`]: **Fatal**: the conversion cannot proceed at all
//!   (unreadable workbook, missing required columns, broken template, nothing
//!   to write, destination not writable). Returned as `Err(ConvertError)`
//!   from the top-level `convert*` functions.
//!
//! * [`Rejection`]: **Non-fatal**: a single row failed validation but all
//!   other rows are fine. Collected in
//!   [`crate::output::ConversionResult::rejections`] so callers can report
//!   partial success instead of losing the whole run to one bad row.
//!
//! Neither type carries user-facing prose beyond its `Display` impl; the
//! shell driving the conversion decides how to present them.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the enroll2pdf library.
///
/// Row-level failures use [`Rejection`] and are stored in
/// [`crate::output::ConversionResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input does not exist, is not a supported spreadsheet format, or
    /// could not be parsed.
    #[error("cannot read spreadsheet '{path}': {reason}")]
    UnreadableFile { path: PathBuf, reason: String },

    /// One or more required header names are absent from the header row.
    #[error("spreadsheet '{path}' is missing required column(s): {}", missing.join(", "))]
    MissingColumns { path: PathBuf, missing: Vec<String> },

    // ── Template errors ───────────────────────────────────────────────────
    /// A template path was given but the document is unusable.
    #[error("invalid form template '{path}': {reason}")]
    InvalidTemplate { path: PathBuf, reason: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Every row was rejected (or the sheet had no data rows). `path` is the
    /// input spreadsheet, or the destination when the assembler is handed no
    /// pages.
    #[error("no valid records in '{path}': {rows_read} row(s) read, {rejected} rejected")]
    NoValidRecords {
        path: PathBuf,
        rows_read: usize,
        rejected: usize,
    },

    /// Could not create or write the output document.
    #[error("failed to write output file '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The caller raised the cancel flag; the destination was not touched.
    #[error("conversion cancelled after {rows_read} row(s)")]
    Cancelled { rows_read: usize },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (task panic, runtime creation failure).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Shorthand used by the reader for the many ways a workbook can be unreadable.
    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ConvertError::UnreadableFile {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_template(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ConvertError::InvalidTemplate {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::WriteFailed {
            path: path.into(),
            source,
        }
    }
}

/// Why a row was rejected by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum RejectionReason {
    #[error("last name is missing")]
    MissingLastName,
    #[error("first name is missing")]
    MissingFirstName,
    #[error("last and first name are missing")]
    BothNamesMissing,
}

/// A non-fatal, per-row validation failure.
///
/// The conversion records it and continues with the next row.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("row {row_number}: {reason}")]
pub struct Rejection {
    /// 1-based source row number (the header is row 1).
    pub row_number: usize,
    pub reason: RejectionReason,
}
