//! Scan events and the terminal scan summary.
//!
//! Workers produce [`ScanEvent`]s; a single dispatcher folds them into a
//! [`ScanResult`] in arrival order while also forwarding them to the
//! consumer. Files that do not contain the needle produce no event at all,
//! so event volume follows matches and failures rather than file count.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A failure tied to one path: an unreadable file or a skipped directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    /// The file or directory that failed
    pub path: PathBuf,
    /// Human-readable reason
    pub message: String,
}

impl FileError {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// One observation made during a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScanEvent {
    /// The file contains the needle
    Match { path: PathBuf },
    /// The file (or directory) could not be processed
    Error(FileError),
}

impl ScanEvent {
    pub fn path(&self) -> &Path {
        match self {
            ScanEvent::Match { path } => path,
            ScanEvent::Error(err) => &err.path,
        }
    }
}

/// How a scan ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ScanOutcome {
    /// Every enumerated file was processed
    Completed,
    /// Cancellation was observed before all files were processed
    Cancelled,
    /// The scan could not run (e.g. the root directory is missing)
    Faulted { reason: String },
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanOutcome::Completed => write!(f, "completed"),
            ScanOutcome::Cancelled => write!(f, "cancelled"),
            ScanOutcome::Faulted { reason } => write!(f, "faulted: {reason}"),
        }
    }
}

/// Counters describing the work a scan did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Files produced by enumeration
    pub files_enumerated: usize,
    /// Files whose contents were read successfully
    pub files_read: u64,
    /// Files never read because the scan was cancelled
    pub files_skipped: u64,
    /// Total bytes read
    pub bytes_read: u64,
    /// Wall-clock time from start to terminal state
    pub duration: Duration,
}

/// Terminal summary of a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    /// Files containing the needle, in the order they were reported
    pub matched_paths: Vec<PathBuf>,
    /// Per-path failures, in the order they were reported
    pub errors: Vec<FileError>,
    /// How the scan ended
    pub outcome: ScanOutcome,
    /// Work counters
    pub stats: ScanStats,
}

impl Default for ScanResult {
    fn default() -> Self {
        Self {
            matched_paths: Vec::new(),
            errors: Vec::new(),
            outcome: ScanOutcome::Completed,
            stats: ScanStats::default(),
        }
    }
}

impl ScanResult {
    /// Creates a new empty result
    pub fn new() -> Self {
        Default::default()
    }

    /// A result for a scan that could not run
    pub fn faulted(reason: impl Into<String>) -> Self {
        Self {
            outcome: ScanOutcome::Faulted {
                reason: reason.into(),
            },
            ..Default::default()
        }
    }

    /// Folds one event into the result
    pub fn add_event(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::Match { path } => self.matched_paths.push(path),
            ScanEvent::Error(err) => self.errors.push(err),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == ScanOutcome::Completed
    }

    pub fn is_cancelled(&self) -> bool {
        self.outcome == ScanOutcome::Cancelled
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self.outcome, ScanOutcome::Faulted { .. })
    }
}

/// Receives scan events as they happen.
///
/// All calls for one scan come from the same dispatcher thread, one at a
/// time, so implementations need no locking of their own. Any
/// `FnMut(&ScanEvent) + Send` closure is an observer.
pub trait ScanObserver: Send {
    /// Called once per event, in arrival order
    fn on_event(&mut self, event: &ScanEvent);

    /// Called once with the terminal result, before waiters are released
    fn on_finished(&mut self, _result: &ScanResult) {}
}

impl<F> ScanObserver for F
where
    F: FnMut(&ScanEvent) + Send,
{
    fn on_event(&mut self, event: &ScanEvent) {
        self(event)
    }
}
