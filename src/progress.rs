//! Progress-callback trait for per-row conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the orchestrator moves through its states and handles each row.
//!
//! Callers can forward events to a channel, a GUI, or a terminal progress
//! bar without the library knowing how the host application communicates.
//! The trait is `Send + Sync` so it works when pages are rendered
//! concurrently.
//!
//! # Example
//!
//! ```rust
//! use enroll2pdf::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rendered: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_row_rendered(&self, row_number: usize, page_num: usize) {
//!         self.rendered.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("row {row_number} -> page {page_num}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { rendered: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Rejection;
use crate::output::ConversionResult;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Orchestrator state. A run starts in `Idle` and ends in `Succeeded` or
/// `Failed`; no state is entered twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionState {
    Idle,
    /// Opening the input and resolving the layout.
    Reading,
    /// Validating and rendering rows, interleaved.
    Processing,
    /// Building and writing the output document.
    Assembling,
    Succeeded,
    Failed,
}

impl ConversionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConversionState::Succeeded | ConversionState::Failed)
    }
}

impl fmt::Display for ConversionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConversionState::Idle => "idle",
            ConversionState::Reading => "reading",
            ConversionState::Processing => "processing",
            ConversionState::Assembling => "assembling",
            ConversionState::Succeeded => "succeeded",
            ConversionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Called by the orchestrator as the run progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// With `concurrency > 1`, `on_row_rendered` may be called from different
/// threads and out of page order. Protect shared mutable state with
/// `Mutex` or atomics.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after the input is opened, before any row is read.
    ///
    /// # Arguments
    /// * `expected_rows`: data rows in the sheet, if known up front (CSV
    ///   input is streamed, so this is `None` for it)
    fn on_conversion_start(&self, expected_rows: Option<usize>) {
        let _ = expected_rows;
    }

    /// Called on every state transition, including the terminal one.
    fn on_state_change(&self, state: ConversionState) {
        let _ = state;
    }

    /// Called when a record's page has been rendered.
    ///
    /// # Arguments
    /// * `row_number`: 1-based source row
    /// * `page_num`  : 1-based page the record will occupy
    fn on_row_rendered(&self, row_number: usize, page_num: usize) {
        let _ = (row_number, page_num);
    }

    /// Called when a row fails validation. The run continues.
    fn on_row_rejected(&self, rejection: &Rejection) {
        let _ = rejection;
    }

    /// Called once after the document has been written.
    fn on_conversion_complete(&self, result: &ConversionResult) {
        let _ = result;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
