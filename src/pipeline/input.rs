//! Input stage: open a spreadsheet and hand out its data rows lazily.
//!
//! ## Formats
//!
//! Workbooks (`xlsx`, `xlsm`, `xlsb`, `xls`, `ods`) go through calamine,
//! which loads the selected sheet into a `Range`; rows are then turned into
//! [`RawRow`]s one at a time as the caller pulls them. CSV exports go
//! through the `csv` crate. They are semicolon-separated by default, which is
//! what spreadsheet applications in German locales produce, and are decoded
//! as UTF-8 with a Windows-1252 fallback.
//!
//! ## Header matching
//!
//! Header cells are compared exactly and case-sensitively. Rows are keyed by
//! header name, so the column order of the source file does not matter.

use crate::error::ConvertError;
use crate::model::{CellValue, RawRow, REQUIRED_HEADERS};
use calamine::{open_workbook_auto, Data, Range, Reader};
use encoding_rs::{UTF_8, WINDOWS_1252};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Delimiter used for CSV files when sniffing finds nothing better.
pub const DEFAULT_CSV_DELIMITER: u8 = b';';

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Knobs for opening the input file. Derived from
/// [`crate::config::ConversionConfig::reader_options`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Worksheet to read. `None` = first sheet.
    pub sheet: Option<String>,
    /// CSV delimiter. `None` = sniff from the header line.
    pub csv_delimiter: Option<u8>,
}

/// An opened spreadsheet whose header row has been read.
pub struct TabularReader {
    path: PathBuf,
    headers: Arc<[String]>,
    source: RowSource,
}

enum RowSource {
    Sheet {
        range: Range<Data>,
        /// Relative index of the next row to hand out (0 is the header).
        next: usize,
        /// Absolute 0-based sheet row of `range`'s first row.
        origin_row: usize,
    },
    Csv {
        records: csv::StringRecordsIntoIter<Cursor<Vec<u8>>>,
        /// Source line of the last record read; the header is line 1.
        last_line: usize,
    },
}

impl TabularReader {
    /// Open `path` and check that every required header is present.
    ///
    /// # Errors
    /// - [`ConvertError::UnreadableFile`] if the file is missing, has an
    ///   unsupported extension, or cannot be parsed
    /// - [`ConvertError::MissingColumns`] if `Nachname` or `Vorname` is absent
    pub fn open(path: &Path, options: &ReaderOptions) -> Result<Self, ConvertError> {
        let reader = Self::open_unchecked(path, options)?;
        let missing = reader.missing_required();
        if !missing.is_empty() {
            return Err(ConvertError::MissingColumns {
                path: path.to_path_buf(),
                missing,
            });
        }
        Ok(reader)
    }

    /// Open `path` without enforcing the required headers.
    ///
    /// Used by [`crate::convert::inspect`], which reports missing columns
    /// instead of failing on them.
    pub fn open_unchecked(path: &Path, options: &ReaderOptions) -> Result<Self, ConvertError> {
        if !path.is_file() {
            return Err(ConvertError::unreadable(path, "file does not exist"));
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let reader = if ext == "csv" {
            open_csv(path, options.csv_delimiter)?
        } else if WORKBOOK_EXTENSIONS.contains(&ext.as_str()) {
            open_workbook(path, options.sheet.as_deref())?
        } else {
            return Err(ConvertError::unreadable(
                path,
                format!("unsupported file type '.{ext}'"),
            ));
        };

        info!(
            path = %path.display(),
            columns = reader.headers.len(),
            "Opened spreadsheet"
        );
        Ok(reader)
    }

    /// Header names in column order, exactly as they appear in the file.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Required headers absent from the header row, in canonical order.
    pub fn missing_required(&self) -> Vec<String> {
        REQUIRED_HEADERS
            .iter()
            .filter(|h| !self.headers.iter().any(|x| x == *h))
            .map(|h| h.to_string())
            .collect()
    }

    /// Consume the reader and iterate its data rows.
    ///
    /// The iterator is forward-only; rows already yielded cannot be read
    /// again. Fully blank rows are skipped without being yielded.
    pub fn rows(self) -> RowIter {
        RowIter {
            path: self.path,
            headers: self.headers,
            source: self.source,
            failed: false,
        }
    }
}

/// Lazy sequence of [`RawRow`]s. See [`TabularReader::rows`].
pub struct RowIter {
    path: PathBuf,
    headers: Arc<[String]>,
    source: RowSource,
    failed: bool,
}

impl RowIter {
    /// Upper bound on the rows still to come (blank rows included), when the
    /// source knows it. CSV input is streamed and reports `None`.
    pub fn remaining_hint(&self) -> Option<usize> {
        match &self.source {
            RowSource::Sheet { range, next, .. } => Some(range.height().saturating_sub(*next)),
            RowSource::Csv { .. } => None,
        }
    }

    fn next_raw(&mut self) -> Option<Result<RawRow, ConvertError>> {
        match &mut self.source {
            RowSource::Sheet {
                range,
                next,
                origin_row,
            } => {
                if *next >= range.height() {
                    return None;
                }
                let rel = *next;
                *next += 1;
                let values = (0..self.headers.len())
                    .map(|col| range.get((rel, col)).map(cell_from_data).unwrap_or(CellValue::Empty))
                    .collect();
                Some(Ok(RawRow::new(
                    *origin_row + rel + 1,
                    Arc::clone(&self.headers),
                    values,
                )))
            }
            // The csv crate skips empty lines and joins quoted line breaks,
            // so the row number is the line the record starts on.
            RowSource::Csv { records, last_line } => match records.next()? {
                Ok(record) => {
                    *last_line = record
                        .position()
                        .map_or(*last_line + 1, |p| p.line() as usize);
                    let values = record.iter().map(cell_from_csv).collect();
                    Some(Ok(RawRow::new(*last_line, Arc::clone(&self.headers), values)))
                }
                Err(e) => Some(Err(ConvertError::unreadable(&self.path, e))),
            },
        }
    }
}

impl Iterator for RowIter {
    type Item = Result<RawRow, ConvertError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            match self.next_raw()? {
                Ok(row) if row.is_blank() => {
                    debug!(row = row.row_number, "Skipping blank row");
                }
                Ok(row) => return Some(Ok(row)),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

// ── Workbooks ────────────────────────────────────────────────────────────

fn open_workbook(path: &Path, sheet: Option<&str>) -> Result<TabularReader, ConvertError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| ConvertError::unreadable(path, e))?;

    let range = match sheet {
        Some(name) => workbook
            .worksheet_range(name)
            .map_err(|e| ConvertError::unreadable(path, format!("sheet '{name}': {e}")))?,
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ConvertError::unreadable(path, "workbook has no worksheets"))?
            .map_err(|e| ConvertError::unreadable(path, e))?,
    };

    if range.is_empty() {
        return Err(ConvertError::unreadable(path, "worksheet is empty"));
    }

    let origin_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let headers: Arc<[String]> = (0..range.width())
        .map(|col| {
            range
                .get((0, col))
                .map(header_from_data)
                .unwrap_or_default()
        })
        .collect();
    debug!(origin_row, height = range.height(), "Loaded worksheet range");

    Ok(TabularReader {
        path: path.to_path_buf(),
        headers,
        source: RowSource::Sheet {
            range,
            next: 1,
            origin_row,
        },
    })
}

fn header_from_data(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Map a calamine cell onto the reader's cell model.
pub(crate) fn cell_from_data(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) => CellValue::Date(ndt.date()),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

// ── CSV ──────────────────────────────────────────────────────────────────

fn open_csv(path: &Path, delimiter: Option<u8>) -> Result<TabularReader, ConvertError> {
    let bytes = std::fs::read(path).map_err(|e| ConvertError::unreadable(path, e))?;
    let text = decode_csv_bytes(&bytes);
    let delimiter = delimiter.unwrap_or_else(|| sniff_delimiter(&text));
    debug!(delimiter = %(delimiter as char), "Reading CSV");

    let mut records = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(text.into_bytes()))
        .into_records();

    let header = match records.next() {
        Some(Ok(record)) => record,
        Some(Err(e)) => return Err(ConvertError::unreadable(path, e)),
        None => return Err(ConvertError::unreadable(path, "file is empty")),
    };
    let headers: Arc<[String]> = header.iter().map(str::to_string).collect();

    Ok(TabularReader {
        path: path.to_path_buf(),
        headers,
        source: RowSource::Csv {
            records,
            last_line: 1,
        },
    })
}

/// UTF-8 (BOM stripped) when valid, otherwise Windows-1252.
fn decode_csv_bytes(bytes: &[u8]) -> String {
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match UTF_8.decode_without_bom_handling_and_without_replacement(body) {
        Some(text) => text.into_owned(),
        None => {
            debug!("CSV is not valid UTF-8, decoding as Windows-1252");
            WINDOWS_1252.decode_without_bom_handling(body).0.into_owned()
        }
    }
}

/// Pick the delimiter from the header line: `;` wins, then tab, then `,`.
fn sniff_delimiter(text: &str) -> u8 {
    let first = text.lines().next().unwrap_or("");
    if first.contains(';') {
        b';'
    } else if first.contains('\t') {
        b'\t'
    } else if first.contains(',') {
        b','
    } else {
        DEFAULT_CSV_DELIMITER
    }
}

fn cell_from_csv(raw: &str) -> CellValue {
    if raw.trim().is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(raw.to_string())
    }
}
