use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, trace};

use super::handle::{CancelToken, Completion, ScanHandle, ScanId};
use super::pool::{run_workers, WorkerReport};
use super::processor::FileProcessor;
use crate::config::EncodingMode;
use crate::enumerate::{FsEnumerator, PathSource};
use crate::errors::{FinderError, FinderResult};
use crate::metrics::ScanMetrics;
use crate::request::{ScanRequest, ValidatedRequest};
use crate::results::{ScanEvent, ScanObserver, ScanOutcome, ScanResult, ScanStats};

/// Per-scan settings beyond the request itself
#[derive(Default)]
pub struct ScanOptions {
    observer: Option<Box<dyn ScanObserver>>,
    cancel: Option<CancelToken>,
    encoding_mode: EncodingMode,
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observer called on the dispatcher thread for every event
    pub fn observer(mut self, observer: impl ScanObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Use an existing token instead of creating a fresh one
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn encoding_mode(mut self, mode: EncodingMode) -> Self {
        self.encoding_mode = mode;
        self
    }
}

impl fmt::Debug for ScanOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanOptions")
            .field("observer", &self.observer.is_some())
            .field("cancel", &self.cancel)
            .field("encoding_mode", &self.encoding_mode)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
enum EngineState {
    #[default]
    Idle,
    Scanning { id: ScanId, cancel: CancelToken },
}

/// Returns the engine to idle when the scan thread is done with it
struct BusyGuard {
    state: Arc<Mutex<EngineState>>,
    id: ScanId,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if matches!(&*state, EngineState::Scanning { id, .. } if *id == self.id) {
            *state = EngineState::Idle;
            debug!("Engine idle after {}", self.id);
        }
    }
}

/// Runs content scans one at a time.
///
/// A scan is started with [`start_scan`](Self::start_scan) and runs on its own
/// thread; the caller gets a [`ScanHandle`] back immediately. While a scan is
/// running, further starts are rejected with [`FinderError::Busy`].
pub struct ScanEngine {
    state: Arc<Mutex<EngineState>>,
    source: Arc<dyn PathSource>,
    next_id: AtomicU64,
}

impl ScanEngine {
    /// Engine enumerating the local filesystem
    pub fn new() -> Self {
        Self::with_source(FsEnumerator)
    }

    /// Engine taking its candidate files from `source`
    pub fn with_source(source: impl PathSource + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState::Idle)),
            source: Arc::new(source),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn start_scan(&self, request: ScanRequest) -> FinderResult<ScanHandle> {
        self.start_scan_with(request, ScanOptions::default())
    }

    /// Validates `request` and starts scanning in the background.
    ///
    /// Rejections (invalid request, engine busy) happen synchronously and
    /// leave no trace: no enumeration, no events, no state change. Problems
    /// found while running, including a missing root, end the scan as
    /// [`ScanOutcome::Faulted`] instead.
    pub fn start_scan_with(
        &self,
        request: ScanRequest,
        options: ScanOptions,
    ) -> FinderResult<ScanHandle> {
        let validated = request.compile()?;
        let cancel = options.cancel.unwrap_or_default();
        let busy = self.acquire(&cancel)?;
        let id = busy.id;

        info!(
            "Starting {}: needle {:?} in {} matching {:?} with {} workers",
            id,
            request.needle,
            request.root_path.display(),
            request.name_pattern,
            request.max_parallelism
        );

        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let completion = Arc::new(Completion::default());
        let published = Arc::clone(&completion);
        let job = ScanJob {
            id,
            request: validated,
            source: Arc::clone(&self.source),
            cancel: cancel.clone(),
            encoding_mode: options.encoding_mode,
        };
        let sink = EventSink {
            result: ScanResult::new(),
            events: events_tx,
            observer: options.observer,
        };

        let thread = thread::Builder::new()
            .name(format!("finder-{id}"))
            .spawn(move || {
                let result = match panic::catch_unwind(AssertUnwindSafe(|| job.run(sink))) {
                    Ok(result) => result,
                    Err(_) => {
                        error!("{} panicked", id);
                        ScanResult::faulted("scan thread panicked")
                    }
                };
                // Idle before waiters wake, so they can start the next scan at once
                drop(busy);
                published.publish(result);
            })?;

        Ok(ScanHandle::new(id, events_rx, cancel, completion, thread))
    }

    fn acquire(&self, cancel: &CancelToken) -> FinderResult<BusyGuard> {
        let mut state = self.state.lock();
        if let EngineState::Scanning { id, .. } = &*state {
            debug!("Rejecting new scan, {} is still running", id);
            return Err(FinderError::Busy);
        }

        let id = ScanId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        *state = EngineState::Scanning {
            id,
            cancel: cancel.clone(),
        };
        Ok(BusyGuard {
            state: Arc::clone(&self.state),
            id,
        })
    }

    /// True while a scan is running
    pub fn is_busy(&self) -> bool {
        matches!(&*self.state.lock(), EngineState::Scanning { .. })
    }

    pub fn active_scan(&self) -> Option<ScanId> {
        match &*self.state.lock() {
            EngineState::Scanning { id, .. } => Some(*id),
            EngineState::Idle => None,
        }
    }

    /// Cancels the running scan, if any. Returns whether there was one.
    pub fn cancel_active(&self) -> bool {
        match &*self.state.lock() {
            EngineState::Scanning { id, cancel } => {
                info!("Cancelling {}", id);
                cancel.cancel();
                true
            }
            EngineState::Idle => false,
        }
    }
}

impl Default for ScanEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScanEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanEngine")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

/// Folds events into the result and forwards them to the consumer.
///
/// Owned by the scan thread, which makes it the only dispatcher.
struct EventSink {
    result: ScanResult,
    events: Sender<ScanEvent>,
    observer: Option<Box<dyn ScanObserver>>,
}

impl EventSink {
    fn deliver(&mut self, event: ScanEvent) {
        trace!("Event: {:?}", event);
        if let Some(observer) = self.observer.as_mut() {
            observer.on_event(&event);
        }
        // Nobody listening is fine
        let _ = self.events.send(event.clone());
        self.result.add_event(event);
    }

    fn finish(mut self, outcome: ScanOutcome, stats: ScanStats) -> ScanResult {
        self.result.outcome = outcome;
        self.result.stats = stats;
        if let Some(observer) = self.observer.as_mut() {
            observer.on_finished(&self.result);
        }
        self.result
    }
}

struct ScanJob {
    id: ScanId,
    request: ValidatedRequest,
    source: Arc<dyn PathSource>,
    cancel: CancelToken,
    encoding_mode: EncodingMode,
}

impl ScanJob {
    fn run(self, mut sink: EventSink) -> ScanResult {
        let start = Instant::now();
        let metrics = ScanMetrics::new();

        let enumeration = match self
            .source
            .enumerate(&self.request.root_path, &self.request.pattern)
        {
            Ok(enumeration) => enumeration,
            Err(e) => {
                error!("{} faulted: {}", self.id, e);
                let stats = ScanStats {
                    duration: start.elapsed(),
                    ..Default::default()
                };
                return sink.finish(ScanOutcome::Faulted { reason: e.to_string() }, stats);
            }
        };

        let files_enumerated = enumeration.files.len();
        debug!(
            "{} enumerated {} files, {} walk errors",
            self.id,
            files_enumerated,
            enumeration.errors.len()
        );
        for walk_error in enumeration.errors {
            sink.deliver(ScanEvent::Error(walk_error));
        }

        let outcome = if self.cancel.is_cancelled() {
            debug!("{} cancelled before dispatch", self.id);
            metrics.record_skips(files_enumerated as u64);
            ScanOutcome::Cancelled
        } else {
            let processor = FileProcessor::with_metrics(
                self.request.matcher.clone(),
                self.encoding_mode,
                metrics.clone(),
            );
            match self.dispatch(&enumeration.files, &processor, &mut sink) {
                Ok(report) => {
                    debug!("{} ran on {} workers", self.id, report.workers);
                    if report.skipped > 0 {
                        ScanOutcome::Cancelled
                    } else {
                        ScanOutcome::Completed
                    }
                }
                Err(e) => {
                    error!("{} faulted: {}", self.id, e);
                    ScanOutcome::Faulted { reason: e.to_string() }
                }
            }
        };

        metrics.log_stats();
        let snapshot = metrics.get_stats();
        let stats = ScanStats {
            files_enumerated,
            files_read: snapshot.files_read,
            files_skipped: snapshot.files_skipped,
            bytes_read: snapshot.bytes_read,
            duration: start.elapsed(),
        };

        let result = sink.finish(outcome, stats);
        info!(
            "{} {}: {} matches, {} errors in {:?}",
            self.id,
            result.outcome,
            result.matched_paths.len(),
            result.errors.len(),
            result.stats.duration
        );
        result
    }

    /// Runs the worker pool while this thread drains its events
    fn dispatch(
        &self,
        files: &[PathBuf],
        processor: &FileProcessor,
        sink: &mut EventSink,
    ) -> FinderResult<WorkerReport> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let cancel = &self.cancel;
        let max_parallelism = self.request.max_parallelism;

        thread::scope(|s| {
            let workers = s.spawn(move || run_workers(files, processor, cancel, tx, max_parallelism));

            // Ends once the pool has exited and dropped its sender
            for event in rx {
                sink.deliver(event);
            }

            workers
                .join()
                .unwrap_or_else(|_| Err(FinderError::worker_pool("worker pool panicked")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerate::{Enumeration, NamePattern};
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tempfile::tempdir;

    struct CountingSource {
        calls: Arc<AtomicUsize>,
    }

    impl PathSource for CountingSource {
        fn enumerate(&self, root: &Path, pattern: &NamePattern) -> FinderResult<Enumeration> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            FsEnumerator.enumerate(root, pattern)
        }
    }

    struct GatedSource {
        gate: crossbeam_channel::Receiver<()>,
    }

    impl PathSource for GatedSource {
        fn enumerate(&self, root: &Path, pattern: &NamePattern) -> FinderResult<Enumeration> {
            let _ = self.gate.recv();
            FsEnumerator.enumerate(root, pattern)
        }
    }

    struct PanickingSource;

    impl PathSource for PanickingSource {
        fn enumerate(&self, _root: &Path, _pattern: &NamePattern) -> FinderResult<Enumeration> {
            panic!("enumerator bug");
        }
    }

    fn request(root: &Path) -> ScanRequest {
        ScanRequest::new(root, "*", "needle", 4)
    }

    #[test]
    fn test_invalid_request_never_enumerates() {
        let dir = tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = ScanEngine::with_source(CountingSource {
            calls: Arc::clone(&calls),
        });

        let err = engine
            .start_scan(ScanRequest::new(dir.path(), "*", "", 4))
            .unwrap_err();
        assert!(matches!(err, FinderError::Validation(_)));
        assert!(!engine.is_busy());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_busy_rejection_and_recovery() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "needle").unwrap();

        let (open, gate) = crossbeam_channel::bounded(0);
        let engine = ScanEngine::with_source(GatedSource { gate });

        let handle = engine.start_scan(request(dir.path())).unwrap();
        assert!(engine.is_busy());
        assert_eq!(engine.active_scan(), Some(handle.id()));

        let err = engine.start_scan(request(dir.path())).unwrap_err();
        assert!(matches!(err, FinderError::Busy));

        open.send(()).unwrap();
        let result = handle.wait();
        assert!(result.is_completed());
        assert_eq!(result.matched_paths.len(), 1);
        assert!(!engine.is_busy());

        // Second scan gets a fresh id once the first is done
        drop(open);
        let second = engine.start_scan(request(dir.path())).unwrap();
        assert_ne!(second.id(), handle.id());
        assert!(second.wait().is_completed());
    }

    #[test]
    fn test_cancel_active() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "needle").unwrap();

        let (open, gate) = crossbeam_channel::bounded(0);
        let engine = ScanEngine::with_source(GatedSource { gate });
        assert!(!engine.cancel_active());

        let handle = engine.start_scan(request(dir.path())).unwrap();
        assert!(engine.cancel_active());
        open.send(()).unwrap();

        let result = handle.wait();
        assert!(result.is_cancelled());
        assert!(result.matched_paths.is_empty());
        assert_eq!(result.stats.files_skipped, 1);
        assert!(!engine.cancel_active());
    }

    #[test]
    fn test_panic_in_scan_faults() {
        let dir = tempdir().unwrap();
        let engine = ScanEngine::with_source(PanickingSource);

        let handle = engine.start_scan(request(dir.path())).unwrap();
        let result = handle.wait_timeout(Duration::from_secs(10)).unwrap();
        assert!(result.is_faulted());
        assert!(!engine.is_busy());
    }

    #[test]
    fn test_encoding_mode_option() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bin.dat"), [b'n', b'e', b'e', b'd', b'l', b'e', 0xFF]).unwrap();
        let engine = ScanEngine::new();

        let strict = engine.start_scan(request(dir.path())).unwrap().wait();
        assert!(strict.matched_paths.is_empty());
        assert_eq!(strict.errors.len(), 1);

        let lossy = engine
            .start_scan_with(
                request(dir.path()),
                ScanOptions::new().encoding_mode(EncodingMode::Lossy),
            )
            .unwrap()
            .wait();
        assert_eq!(lossy.matched_paths.len(), 1);
        assert!(lossy.errors.is_empty());
    }
}
