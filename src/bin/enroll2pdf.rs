//! CLI binary for enroll2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use enroll2pdf::{
    convert_to_file, inspect_with, ConversionConfig, ConversionProgressCallback, ConversionResult,
    ConversionState, ProgressCallback, Rejection,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar over the sheet's rows, with a log
/// line for every rejected row. Rows complete out of order when rendering
/// concurrently; the bar only counts them.
struct CliProgressCallback {
    bar: ProgressBar,
    rejected: AtomicUsize,
}

impl CliProgressCallback {
    /// Start as a spinner; `on_conversion_start` switches to a bar once the
    /// row count is known.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening spreadsheet…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            rejected: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} rows  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, expected_rows: Option<usize>) {
        match expected_rows {
            Some(total) => self.activate_bar(total),
            None => {
                self.bar.set_prefix("Converting");
                self.bar.set_message("reading rows…");
            }
        }
    }

    fn on_state_change(&self, state: ConversionState) {
        match state {
            ConversionState::Assembling => {
                self.bar.set_prefix("Writing");
                self.bar.set_message("assembling PDF…");
            }
            // The error is printed by main; the spinner must be gone by then.
            ConversionState::Failed => self.bar.finish_and_clear(),
            _ => {}
        }
    }

    fn on_row_rendered(&self, _row_number: usize, page_num: usize) {
        self.bar.set_message(format!("page {page_num}"));
        self.bar.inc(1);
    }

    fn on_row_rejected(&self, rejection: &Rejection) {
        self.rejected.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Row {:>4}  {}",
            red("✗"),
            rejection.row_number,
            red(&rejection.reason.to_string()),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, result: &ConversionResult) {
        self.bar.finish_and_clear();
        let rejected = self.rejected.load(Ordering::SeqCst);
        if rejected == 0 {
            eprintln!(
                "{} {} pages written",
                green("✔"),
                bold(&result.records_rendered.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} rows converted  ({} rejected)",
                yellow("⚠"),
                bold(&result.records_rendered.to_string()),
                result.rows_read,
                red(&rejected.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Synthetic A4 form, output next to the input
  enroll2pdf anmeldungen.xlsx

  # Fill your own PDF form
  enroll2pdf anmeldungen.xlsx -t formular.pdf -o anmeldungen.pdf

  # Second worksheet, four pages rendered at a time
  enroll2pdf --sheet "Kurs B" --concurrency 4 anmeldungen.xlsx

  # Comma-separated CSV export
  enroll2pdf --delimiter , export.csv

  # Check columns and row count only
  enroll2pdf --inspect-only anmeldungen.xlsx

  # Machine-readable result
  enroll2pdf --json anmeldungen.xlsx > result.json

INPUT COLUMNS:
  Nachname       required   last name
  Vorname        required   first name
  Geburtsdatum   optional   birth date (date cell, serial number, or text)
  Kurs           optional   course

  Rows missing a name are skipped and listed; the run still succeeds.

TEMPLATE FIELDS:
  A template is a PDF form with text fields named Nachname, Vorname,
  Geburtsdatum and Kurs. Values are flattened into the page.

ENVIRONMENT VARIABLES:
  ENROLL2PDF_OUTPUT        Output file
  ENROLL2PDF_TEMPLATE      PDF form template
  ENROLL2PDF_SHEET         Worksheet name
  ENROLL2PDF_DELIMITER     CSV delimiter
  ENROLL2PDF_CONCURRENCY   Pages rendered at once
  RUST_LOG                 Log filter (overrides --verbose / --quiet)
"#;

/// Convert enrollment spreadsheets to one PDF page per student.
#[derive(Parser, Debug)]
#[command(
    name = "enroll2pdf",
    version,
    about = "Convert enrollment spreadsheets to one PDF page per student",
    long_about = "Read an enrollment spreadsheet (.xlsx, .xls, .xlsb, .ods or .csv) and write \
one PDF page per valid row, either filled into a PDF form template or drawn on a generated \
A4 layout.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Spreadsheet to convert.
    input: PathBuf,

    /// Write the PDF here. Default: the input path with a .pdf extension.
    #[arg(short, long, env = "ENROLL2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// PDF form with fields Nachname, Vorname, Geburtsdatum, Kurs.
    #[arg(short, long, env = "ENROLL2PDF_TEMPLATE")]
    template: Option<PathBuf>,

    /// Worksheet to read (default: first sheet).
    #[arg(long, env = "ENROLL2PDF_SHEET")]
    sheet: Option<String>,

    /// CSV delimiter (default: sniffed; `;` when unsure).
    #[arg(long, env = "ENROLL2PDF_DELIMITER", value_parser = parse_delimiter)]
    delimiter: Option<u8>,

    /// Pages rendered at once.
    #[arg(short, long, env = "ENROLL2PDF_CONCURRENCY", default_value_t = 1,
          value_parser = clap::value_parser!(u16).range(1..=64))]
    concurrency: u16,

    /// Output structured JSON (ConversionResult) on stdout.
    #[arg(long, env = "ENROLL2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "ENROLL2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Print columns and row count only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ENROLL2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ENROLL2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = build_config(&cli, None)?;
        let summary = inspect_with(&cli.input, &config.reader_options())
            .await
            .context("Failed to inspect spreadsheet")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
            );
        } else {
            println!("File:       {}", summary.path.display());
            println!("Columns:    {}", summary.columns.join(", "));
            println!("Rows:       {}", summary.total_rows);
            if !summary.available_optional.is_empty() {
                println!("Optional:   {}", summary.available_optional.join(", "));
            }
            if summary.valid {
                println!("Status:     {}", green("ready"));
            } else {
                println!(
                    "Status:     {} (missing {})",
                    red("not convertible"),
                    summary.missing_required.join(", ")
                );
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // Ctrl-C stops the run between rows; the destination stays untouched.
    if let Some(flag) = config.cancel_flag.clone() {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                flag.store(true, Ordering::SeqCst);
            }
        });
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output(&cli.input));
    let result = convert_to_file(&cli.input, &output_path, &config)
        .await
        .context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
        println!("{json}");
        return Ok(());
    }

    if !cli.quiet {
        if !show_progress {
            for r in &result.rejections {
                eprintln!("  {} {}", red("✗"), r);
            }
        }
        for w in &result.warnings {
            eprintln!(
                "  {} row {}: birth date ignored ({})",
                yellow("!"),
                w.row_number,
                dim(&warning_detail(w))
            );
        }
        eprintln!(
            "{}  {}/{} rows  {}ms  →  {}",
            if result.is_partial() {
                yellow("⚠")
            } else {
                green("✔")
            },
            result.records_rendered,
            result.rows_read,
            result.duration_ms,
            bold(&result.output_path.display().to_string()),
        );
        eprintln!("   {} layout", cyan(&format!("{:?}", result.layout).to_lowercase()));
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .concurrency(usize::from(cli.concurrency))
        .cancel_flag(Arc::new(AtomicBool::new(false)));

    if let Some(ref template) = cli.template {
        builder = builder.template_path(template);
    }
    if let Some(ref sheet) = cli.sheet {
        builder = builder.sheet(sheet);
    }
    if let Some(delimiter) = cli.delimiter {
        builder = builder.csv_delimiter(delimiter);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `anmeldungen.xlsx` → `anmeldungen.pdf`, next to the input.
fn default_output(input: &Path) -> PathBuf {
    input.with_extension("pdf")
}

/// Parse `--delimiter`: a single ASCII character, or `tab` / `\t`.
fn parse_delimiter(s: &str) -> std::result::Result<u8, String> {
    match s {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        _ => match s.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(format!("delimiter must be a single ASCII character, got '{s}'")),
        },
    }
}

fn warning_detail(w: &enroll2pdf::RowWarning) -> String {
    match &w.kind {
        enroll2pdf::WarningKind::UnparsableBirthDate { raw } => format!("unparsable: {raw:?}"),
    }
}
