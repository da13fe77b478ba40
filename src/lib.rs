//! # enroll2pdf
//!
//! Turn an enrollment spreadsheet (one row per student) into a single PDF
//! with one page per student, drawn on your own PDF form or on a generated
//! A4 layout.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .xlsx / .ods / .csv
//!  │
//!  ├─ 1. Input     open the sheet, check headers, stream rows lazily
//!  ├─ 2. Validate  trim names, parse birth dates, reject rows without a name
//!  ├─ 3. Layout    resolve the template form once, or fall back to synthetic
//!  ├─ 4. Render    one content stream per record (pure, spawn_blocking)
//!  └─ 5. Assemble  order pages by sequence, write the PDF atomically
//! ```
//!
//! Rejected rows are not errors: they are listed in
//! [`ConversionResult::rejections`] and the run continues. Only problems that
//! make the whole run meaningless (unreadable input, missing columns, broken
//! template, nothing valid to write, unwritable destination) are returned as
//! [`ConvertError`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let result = enroll2pdf::convert(
//!         "anmeldungen.xlsx",
//!         "anmeldungen.pdf",
//!         Some(Path::new("formular.pdf")),
//!     )?;
//!     eprintln!("{} pages, {} rows rejected",
//!         result.records_rendered,
//!         result.rejections.len());
//!     for r in &result.rejections {
//!         eprintln!("  {r}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Input Columns
//!
//! | Header | Required | Field |
//! |--------|----------|-------|
//! | `Nachname` | yes | last name |
//! | `Vorname` | yes | first name |
//! | `Geburtsdatum` | no | birth date (date cell, Excel serial, or text) |
//! | `Kurs` | no | course |
//!
//! Header names are exact and case-sensitive; column order does not matter.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `enroll2pdf` binary (clap + anyhow + tracing-subscriber + indicatif + serde_json) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! enroll2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{convert, convert_sync, convert_to_file, inspect, inspect_with};
pub use error::{ConvertError, Rejection, RejectionReason};
pub use model::{EnrollmentRecord, Field};
pub use output::{ConversionResult, LayoutKind, RowWarning, WarningKind, WorkbookSummary};
pub use pipeline::input::ReaderOptions;
pub use pipeline::layout::{FieldLabels, FormLayout, SyntheticLayout};
pub use progress::{ConversionProgressCallback, ConversionState, NoopProgressCallback, ProgressCallback};
