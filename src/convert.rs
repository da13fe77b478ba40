//! Conversion entry points and the orchestrator that drives the pipeline.
//!
//! ## State machine
//!
//! ```text
//! Idle ─▶ Reading ─▶ Processing ─▶ Assembling ─▶ Succeeded
//!            │            │             │
//!            └────────────┴─────────────┴──────▶ Failed
//! ```
//!
//! `Reading` opens the input and resolves the layout. `Processing`
//! interleaves validation and rendering: rows are pulled lazily, so a row is
//! validated only when a render slot is free. `Assembling` writes the
//! document once, atomically. Row rejections are recorded and never leave
//! `Processing`; every [`ConvertError`] ends the run in `Failed`.

use crate::config::ConversionConfig;
use crate::error::{ConvertError, Rejection};
use crate::model::{EnrollmentRecord, OPTIONAL_HEADERS};
use crate::output::{ConversionResult, RowWarning, WorkbookSummary};
use crate::pipeline::assemble::write_document;
use crate::pipeline::input::{ReaderOptions, TabularReader};
use crate::pipeline::layout::{resolve_layout, FormLayout};
use crate::pipeline::render::{render_page, RenderedPage};
use crate::pipeline::validate::validate;
use crate::progress::ConversionState;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a spreadsheet into a multi-page PDF, one page per valid row.
///
/// This is the primary synchronous entry point: default settings, plus an
/// optional PDF form to fill. Use [`convert_sync`] or [`convert_to_file`]
/// for the full [`ConversionConfig`].
///
/// # Returns
/// `Ok(ConversionResult)` on success, even if some rows were rejected
/// (check `result.rejections`).
///
/// # Errors
/// Returns `Err(ConvertError)` only for fatal errors:
/// - Input missing, unsupported, or unparsable
/// - Required columns missing
/// - Template given but unusable
/// - No valid rows at all
/// - Output not writable
///
/// # Panics
/// Must not be called from inside a Tokio runtime; use [`convert_to_file`]
/// there.
pub fn convert(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    template: Option<&Path>,
) -> Result<ConversionResult, ConvertError> {
    let mut builder = ConversionConfig::builder();
    if let Some(template) = template {
        builder = builder.template_path(template);
    }
    convert_sync(input, output, &builder.build()?)
}

/// Synchronous wrapper around [`convert_to_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionResult, ConvertError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(convert_to_file(input, output, config))
}

/// Convert a spreadsheet and write the PDF to `output`.
///
/// The destination is written once, after every page has been rendered, via
/// a temporary file renamed into place. A failed or cancelled run leaves it
/// untouched.
pub async fn convert_to_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionResult, ConvertError> {
    let started = Instant::now();
    let input = input.as_ref().to_path_buf();
    let output = output.as_ref().to_path_buf();
    info!(input = %input.display(), output = %output.display(), "Starting conversion");

    let mut run = Run::new(config);
    match run.execute(&input, &output, started).await {
        Ok(result) => {
            run.transition(ConversionState::Succeeded);
            info!(
                pages = result.records_rendered,
                rejected = result.rejections.len(),
                duration_ms = result.duration_ms,
                "Conversion complete"
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_conversion_complete(&result);
            }
            Ok(result)
        }
        Err(e) => {
            warn!(error = %e, "Conversion failed");
            run.transition(ConversionState::Failed);
            Err(e)
        }
    }
}

/// Describe a spreadsheet without converting it.
///
/// Never fails on missing columns; they are reported in
/// [`WorkbookSummary::missing_required`].
pub async fn inspect(input: impl AsRef<Path>) -> Result<WorkbookSummary, ConvertError> {
    inspect_with(input, &ReaderOptions::default()).await
}

/// [`inspect`] with an explicit sheet or CSV delimiter.
pub async fn inspect_with(
    input: impl AsRef<Path>,
    options: &ReaderOptions,
) -> Result<WorkbookSummary, ConvertError> {
    let path = input.as_ref().to_path_buf();
    let options = options.clone();
    tokio::task::spawn_blocking(move || summarize(&path, &options))
        .await
        .map_err(|e| ConvertError::Internal(format!("inspect task failed: {e}")))?
}

fn summarize(path: &Path, options: &ReaderOptions) -> Result<WorkbookSummary, ConvertError> {
    let reader = TabularReader::open_unchecked(path, options)?;
    let columns = reader.headers().to_vec();
    let missing_required = reader.missing_required();
    let available_optional = OPTIONAL_HEADERS
        .iter()
        .filter(|h| columns.iter().any(|c| c == *h))
        .map(|h| h.to_string())
        .collect();

    let mut total_rows = 0;
    for row in reader.rows() {
        row?;
        total_rows += 1;
    }

    Ok(WorkbookSummary {
        path: path.to_path_buf(),
        valid: missing_required.is_empty(),
        columns,
        total_rows,
        missing_required,
        available_optional,
    })
}

// ── Orchestration ────────────────────────────────────────────────────────

/// Tracks the state of one run and reports transitions.
struct Run<'a> {
    config: &'a ConversionConfig,
    state: ConversionState,
}

/// What the validating row source saw.
#[derive(Default)]
struct Tally {
    rows_read: usize,
    rejections: Vec<Rejection>,
    warnings: Vec<RowWarning>,
    fatal: Option<ConvertError>,
    cancelled: bool,
}

impl<'a> Run<'a> {
    fn new(config: &'a ConversionConfig) -> Self {
        Self {
            config,
            state: ConversionState::Idle,
        }
    }

    fn transition(&mut self, next: ConversionState) {
        debug!(from = %self.state, to = %next, "State change");
        self.state = next;
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_state_change(next);
        }
    }

    async fn execute(
        &mut self,
        input: &Path,
        output: &Path,
        started: Instant,
    ) -> Result<ConversionResult, ConvertError> {
        let config = self.config;

        // ── Step 1: Open input, resolve layout ───────────────────────────
        self.transition(ConversionState::Reading);
        let (reader, layout) = open_sources(input, config).await?;
        let layout = Arc::new(layout);
        let layout_kind = layout.kind();
        let mut rows = reader.rows();
        if let Some(ref cb) = config.progress_callback {
            cb.on_conversion_start(rows.remaining_hint());
        }

        // ── Step 2: Validate and render, interleaved ─────────────────────
        self.transition(ConversionState::Processing);
        let mut tally = Tally::default();
        let mut next_sequence = 0usize;

        let records = std::iter::from_fn(|| loop {
            if config.is_cancelled() {
                tally.cancelled = true;
                return None;
            }
            let row = match rows.next()? {
                Ok(row) => row,
                Err(e) => {
                    tally.fatal = Some(e);
                    return None;
                }
            };
            tally.rows_read += 1;
            match validate(&row) {
                Ok(validated) => {
                    for w in &validated.warnings {
                        warn!(row = w.row_number, kind = ?w.kind, "Row rendered with warning");
                    }
                    tally.warnings.extend(validated.warnings);
                    let sequence = next_sequence;
                    next_sequence += 1;
                    return Some((sequence, row.row_number, validated.record));
                }
                Err(rejection) => {
                    warn!(row = rejection.row_number, reason = %rejection.reason, "Row rejected");
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_row_rejected(&rejection);
                    }
                    tally.rejections.push(rejection);
                }
            }
        });

        let rendered: Vec<Result<RenderedPage, ConvertError>> = stream::iter(records)
            .map(|(sequence, row_number, record)| {
                render_async(sequence, row_number, record, Arc::clone(&layout), config)
            })
            .buffer_unordered(config.concurrency)
            .collect()
            .await;

        if let Some(e) = tally.fatal {
            return Err(e);
        }
        if tally.cancelled || config.is_cancelled() {
            info!(rows_read = tally.rows_read, "Conversion cancelled");
            return Err(ConvertError::Cancelled {
                rows_read: tally.rows_read,
            });
        }
        let pages = rendered.into_iter().collect::<Result<Vec<_>, _>>()?;
        if pages.is_empty() {
            return Err(ConvertError::NoValidRecords {
                path: input.to_path_buf(),
                rows_read: tally.rows_read,
                rejected: tally.rejections.len(),
            });
        }
        debug!(
            pages = pages.len(),
            rejected = tally.rejections.len(),
            "All rows processed"
        );

        // ── Step 3: Assemble and write ───────────────────────────────────
        self.transition(ConversionState::Assembling);
        let dest = output.to_path_buf();
        let written = tokio::task::spawn_blocking(move || write_document(pages, &layout, &dest))
            .await
            .map_err(|e| ConvertError::Internal(format!("assembly task failed: {e}")))??;

        Ok(ConversionResult {
            rows_read: tally.rows_read,
            records_rendered: written,
            rejections: tally.rejections,
            warnings: tally.warnings,
            output_path: output.to_path_buf(),
            layout: layout_kind,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}

/// Open the reader and resolve the layout off the async threads.
async fn open_sources(
    input: &Path,
    config: &ConversionConfig,
) -> Result<(TabularReader, FormLayout), ConvertError> {
    let input = input.to_path_buf();
    let options = config.reader_options();
    let template: Option<PathBuf> = config.template_path.clone();
    let synthetic = config.synthetic.clone();

    tokio::task::spawn_blocking(move || {
        let reader = TabularReader::open(&input, &options)?;
        let layout = resolve_layout(template.as_deref(), &synthetic)?;
        Ok((reader, layout))
    })
    .await
    .map_err(|e| ConvertError::Internal(format!("open task failed: {e}")))?
}

async fn render_async(
    sequence: usize,
    row_number: usize,
    record: EnrollmentRecord,
    layout: Arc<FormLayout>,
    config: &ConversionConfig,
) -> Result<RenderedPage, ConvertError> {
    let page = tokio::task::spawn_blocking(move || render_page(sequence, &record, &layout))
        .await
        .map_err(|e| ConvertError::Internal(format!("render task failed: {e}")))??;
    debug!(row = row_number, page = sequence + 1, "Rendered page");
    if let Some(ref cb) = config.progress_callback {
        cb.on_row_rendered(row_number, sequence + 1);
    }
    Ok(page)
}
