use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Work counters shared by every worker of one scan
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    files_read: Arc<AtomicU64>,
    bytes_read: Arc<AtomicU64>,
    files_matched: Arc<AtomicU64>,
    read_errors: Arc<AtomicU64>,
    files_skipped: Arc<AtomicU64>,
}

impl ScanMetrics {
    /// Creates a new ScanMetrics instance
    pub fn new() -> Self {
        Self {
            files_read: Arc::new(AtomicU64::new(0)),
            bytes_read: Arc::new(AtomicU64::new(0)),
            files_matched: Arc::new(AtomicU64::new(0)),
            read_errors: Arc::new(AtomicU64::new(0)),
            files_skipped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records a successful read of `bytes` bytes
    pub fn record_read(&self, bytes: u64) {
        self.files_read.fetch_add(1, Ordering::Relaxed);
        let total = self.bytes_read.fetch_add(bytes, Ordering::Relaxed) + bytes;
        debug!("Read {} bytes, total: {} bytes", bytes, total);
    }

    /// Records a file containing the needle
    pub fn record_match(&self) {
        self.files_matched.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a file that could not be read or decoded
    pub fn record_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records files left unread because the scan was cancelled
    pub fn record_skips(&self, count: u64) {
        self.files_skipped.fetch_add(count, Ordering::Relaxed);
    }

    /// Gets the current counter values
    pub fn get_stats(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_read: self.files_read.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            files_matched: self.files_matched.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
        }
    }

    /// Logs current counter values
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Scan stats:\n\
             Files read: {}\n\
             Bytes read: {}\n\
             Files matched: {}\n\
             Read errors: {}\n\
             Files skipped: {}",
            stats.files_read,
            stats.bytes_read,
            stats.files_matched,
            stats.read_errors,
            stats.files_skipped
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`ScanMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub files_read: u64,
    pub bytes_read: u64,
    pub files_matched: u64,
    pub read_errors: u64,
    pub files_skipped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_tracking() {
        let metrics = ScanMetrics::new();

        metrics.record_read(1000);
        metrics.record_read(500);
        let stats = metrics.get_stats();
        assert_eq!(stats.files_read, 2);
        assert_eq!(stats.bytes_read, 1500);
    }

    #[test]
    fn test_outcome_counters() {
        let metrics = ScanMetrics::new();

        metrics.record_match();
        metrics.record_error();
        metrics.record_error();
        metrics.record_skips(1);
        metrics.record_skips(4);

        let stats = metrics.get_stats();
        assert_eq!(stats.files_matched, 1);
        assert_eq!(stats.read_errors, 2);
        assert_eq!(stats.files_skipped, 5);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = ScanMetrics::new();
        let worker_view = metrics.clone();

        std::thread::scope(|s| {
            for _ in 0..4 {
                let worker_view = worker_view.clone();
                s.spawn(move || {
                    for _ in 0..250 {
                        worker_view.record_read(2);
                    }
                });
            }
        });

        let stats = metrics.get_stats();
        assert_eq!(stats.files_read, 1000);
        assert_eq!(stats.bytes_read, 2000);
    }
}
