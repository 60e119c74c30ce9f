use std::path::Path;
use tracing::{trace, warn};

use super::matcher::NeedleMatcher;
use crate::config::EncodingMode;
use crate::errors::{FinderError, FinderResult};
use crate::metrics::ScanMetrics;

/// Helper function to decode bytes into a String according to encoding mode
fn decode_bytes(bytes: Vec<u8>, path: &Path, encoding_mode: EncodingMode) -> FinderResult<String> {
    match encoding_mode {
        EncodingMode::FailFast => {
            String::from_utf8(bytes).map_err(|e| FinderError::encoding_error(path, e))
        }
        EncodingMode::Lossy => match String::from_utf8(bytes) {
            Ok(contents) => Ok(contents),
            Err(e) => {
                warn!("Invalid UTF-8 replaced in file: {}", path.display());
                Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
            }
        },
    }
}

/// Reads one file and tests it for the needle
#[derive(Debug, Clone)]
pub struct FileProcessor {
    matcher: NeedleMatcher,
    metrics: ScanMetrics,
    encoding_mode: EncodingMode,
}

impl FileProcessor {
    /// Creates a new FileProcessor with the given matcher
    pub fn new(matcher: NeedleMatcher, encoding_mode: EncodingMode) -> Self {
        Self::with_metrics(matcher, encoding_mode, ScanMetrics::new())
    }

    /// Creates a new FileProcessor reporting into existing metrics
    pub fn with_metrics(
        matcher: NeedleMatcher,
        encoding_mode: EncodingMode,
        metrics: ScanMetrics,
    ) -> Self {
        Self {
            matcher,
            metrics,
            encoding_mode,
        }
    }

    /// Gets the current metrics
    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    /// Reads `path` in full and reports whether it contains the needle.
    ///
    /// Any read or decode failure is returned as an error for this file only.
    pub fn process_file(&self, path: &Path) -> FinderResult<bool> {
        trace!("Processing file: {}", path.display());

        let result = self.read_and_match(path);
        match &result {
            Ok(true) => self.metrics.record_match(),
            Ok(false) => {}
            Err(_) => self.metrics.record_error(),
        }
        result
    }

    fn read_and_match(&self, path: &Path) -> FinderResult<bool> {
        let bytes = std::fs::read(path).map_err(|e| FinderError::from_io(path, e))?;
        self.metrics.record_read(bytes.len() as u64);

        let contents = decode_bytes(bytes, path, self.encoding_mode)?;
        Ok(self.matcher.is_match(&contents))
    }
}
