use crossbeam_channel::Receiver;
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::results::{ScanEvent, ScanResult};

/// Opaque identifier of one scan, unique per engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScanId(u64);

impl ScanId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scan-{}", self.0)
    }
}

/// Shared cooperative cancellation flag.
///
/// Cloning yields another handle to the same flag. Setting it is a release
/// store and workers read it with acquire loads, so a cancel issued from any
/// thread is seen before the next file is started.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// One-shot slot the scan thread fills with its terminal result
#[derive(Debug, Default)]
pub(crate) struct Completion {
    result: Mutex<Option<ScanResult>>,
    done: Condvar,
}

impl Completion {
    /// Stores the result and wakes every waiter. Later calls are ignored.
    pub fn publish(&self, result: ScanResult) {
        let mut slot = self.result.lock();
        if slot.is_none() {
            *slot = Some(result);
        }
        self.done.notify_all();
    }

    pub fn is_done(&self) -> bool {
        self.result.lock().is_some()
    }

    pub fn get(&self) -> Option<ScanResult> {
        self.result.lock().clone()
    }

    pub fn wait(&self) -> ScanResult {
        let mut slot = self.result.lock();
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            self.done.wait(&mut slot);
        }
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<ScanResult> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.result.lock();
        loop {
            if let Some(result) = slot.as_ref() {
                return Some(result.clone());
            }
            if self.done.wait_until(&mut slot, deadline).timed_out() {
                return slot.clone();
            }
        }
    }
}

/// Handle to a running or finished scan.
///
/// Events can be drained from [`events`](Self::events) while the scan runs;
/// the channel disconnects once the scan is over. The terminal
/// [`ScanResult`] is available through [`wait`](Self::wait) and friends.
///
/// Dropping a handle whose scan is still running cancels that scan.
pub struct ScanHandle {
    id: ScanId,
    events_rx: Receiver<ScanEvent>,
    cancel: CancelToken,
    completion: Arc<Completion>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ScanHandle {
    pub(crate) fn new(
        id: ScanId,
        events_rx: Receiver<ScanEvent>,
        cancel: CancelToken,
        completion: Arc<Completion>,
        thread: JoinHandle<()>,
    ) -> Self {
        Self {
            id,
            events_rx,
            cancel,
            completion,
            thread: Mutex::new(Some(thread)),
        }
    }

    pub fn id(&self) -> ScanId {
        self.id
    }

    /// Receiver for events in arrival order
    pub fn events(&self) -> &Receiver<ScanEvent> {
        &self.events_rx
    }

    /// Requests cooperative cancellation.
    ///
    /// Workers finish the file they are reading and take no new ones.
    /// Calling this again, or after the scan has finished, does nothing.
    pub fn cancel(&self) {
        if self.is_finished() {
            debug!("Ignoring cancel for finished {}", self.id);
            return;
        }
        if !self.cancel.is_cancelled() {
            info!("Cancellation requested for {}", self.id);
        }
        self.cancel.cancel();
    }

    /// A clone of the scan's token, e.g. for a signal handler
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// True once the terminal result has been published
    pub fn is_finished(&self) -> bool {
        self.completion.is_done()
    }

    /// The terminal result, if the scan has finished
    pub fn try_result(&self) -> Option<ScanResult> {
        self.completion.get()
    }

    /// Blocks until the scan reaches its terminal state.
    ///
    /// Must not be called from a [`ScanObserver`](crate::results::ScanObserver)
    /// callback, which runs on the scan thread itself.
    pub fn wait(&self) -> ScanResult {
        let result = self.completion.wait();
        self.join_scan_thread();
        result
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ScanResult> {
        let result = self.completion.wait_timeout(timeout)?;
        self.join_scan_thread();
        Some(result)
    }

    fn join_scan_thread(&self) {
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                warn!("Scan thread for {} panicked after publishing", self.id);
            }
        }
    }
}

impl fmt::Debug for ScanHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanHandle")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        if !self.is_finished() {
            debug!("Handle for {} dropped while running, cancelling", self.id);
            self.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::ScanOutcome;

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_completion_publish_once() {
        let completion = Completion::default();
        assert!(!completion.is_done());
        assert_eq!(completion.wait_timeout(Duration::from_millis(10)), None);

        completion.publish(ScanResult::new());
        completion.publish(ScanResult::faulted("late"));

        assert!(completion.is_done());
        assert_eq!(completion.wait().outcome, ScanOutcome::Completed);
    }

    #[test]
    fn test_completion_wakes_waiter() {
        let completion = Arc::new(Completion::default());
        let publisher = Arc::clone(&completion);

        let waiter = std::thread::spawn(move || completion.wait());
        std::thread::sleep(Duration::from_millis(20));
        publisher.publish(ScanResult::faulted("root missing"));

        let result = waiter.join().unwrap();
        assert!(result.is_faulted());
    }

    #[test]
    fn test_scan_id_display() {
        assert_eq!(ScanId::new(7).to_string(), "scan-7");
        assert_eq!(ScanId::new(7).get(), 7);
    }
}
