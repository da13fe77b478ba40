//! Configuration types for spreadsheet-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The plain [`crate::convert`] entry
//! point uses the defaults plus an optional template path.

use crate::error::ConvertError;
use crate::pipeline::input::ReaderOptions;
use crate::pipeline::layout::SyntheticLayout;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Upper bound for [`ConversionConfig::concurrency`].
pub const MAX_CONCURRENCY: usize = 64;

/// Configuration for a spreadsheet-to-PDF conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use enroll2pdf::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .template_path("form.pdf")
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// PDF form to fill. `None` draws the synthetic layout. Default: None.
    ///
    /// A template that is given but unusable fails the run; it never falls
    /// back to the synthetic layout.
    pub template_path: Option<PathBuf>,

    /// Number of pages rendered at once. Default: 1.
    ///
    /// Page order never depends on this; pages are re-sorted by sequence
    /// before assembly.
    pub concurrency: usize,

    /// Worksheet to read. `None` reads the first sheet. Ignored for CSV.
    pub sheet: Option<String>,

    /// CSV field delimiter. `None` sniffs it from the header line.
    pub csv_delimiter: Option<u8>,

    /// Geometry and labels of the synthetic layout.
    pub synthetic: SyntheticLayout,

    /// Optional progress callback. Default: None.
    pub progress_callback: Option<ProgressCallback>,

    /// Set to `true` from any thread to stop the run between rows.
    /// A cancelled run never writes the destination.
    pub cancel_flag: Option<Arc<AtomicBool>>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            template_path: None,
            concurrency: 1,
            sheet: None,
            csv_delimiter: None,
            synthetic: SyntheticLayout::default(),
            progress_callback: None,
            cancel_flag: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("template_path", &self.template_path)
            .field("concurrency", &self.concurrency)
            .field("sheet", &self.sheet)
            .field("csv_delimiter", &self.csv_delimiter.map(char::from))
            .field("synthetic", &self.synthetic)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .field("cancel_flag", &self.cancel_flag)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Options handed to [`crate::pipeline::input::TabularReader::open`].
    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            sheet: self.sheet.clone(),
            csv_delimiter: self.csv_delimiter,
        }
    }

    /// `true` once the cancel flag has been raised.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.template_path = Some(path.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.clamp(1, MAX_CONCURRENCY);
        self
    }

    pub fn sheet(mut self, name: impl Into<String>) -> Self {
        self.config.sheet = Some(name.into());
        self
    }

    pub fn csv_delimiter(mut self, delimiter: u8) -> Self {
        self.config.csv_delimiter = Some(delimiter);
        self
    }

    pub fn synthetic(mut self, layout: SyntheticLayout) -> Self {
        self.config.synthetic = layout;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.config.cancel_flag = Some(flag);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if c.concurrency == 0 || c.concurrency > MAX_CONCURRENCY {
            return Err(ConvertError::InvalidConfig(format!(
                "concurrency must be 1–{MAX_CONCURRENCY}, got {}",
                c.concurrency
            )));
        }
        if let Some(d) = c.csv_delimiter {
            if !d.is_ascii() || d.is_ascii_alphanumeric() || d == b'"' || d == b'\n' || d == b'\r' {
                return Err(ConvertError::InvalidConfig(format!(
                    "unsupported CSV delimiter {:?}",
                    char::from(d)
                )));
            }
        }
        if c.sheet.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(ConvertError::InvalidConfig("sheet name is empty".into()));
        }
        c.synthetic
            .validate()
            .map_err(|e| ConvertError::InvalidConfig(format!("synthetic layout: {e}")))?;
        Ok(self.config)
    }
}
