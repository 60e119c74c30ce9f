use crossbeam_channel::Sender;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use super::handle::CancelToken;
use super::processor::FileProcessor;
use crate::errors::{FinderError, FinderResult};
use crate::results::{FileError, ScanEvent};

/// What the worker pool did with the files it was given
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WorkerReport {
    /// Threads the pool ran with
    pub workers: usize,
    /// Files never started because cancellation was observed first
    pub skipped: u64,
}

/// Reads every path on a dedicated pool of at most `max_parallelism` threads.
///
/// Each path is handed to exactly one worker. Matches and failures are sent
/// on `events`; files without the needle send nothing. Workers check `cancel`
/// before starting each file, so after cancellation only files already being
/// read finish. Returns once every worker has exited.
pub(crate) fn run_workers(
    paths: &[PathBuf],
    processor: &FileProcessor,
    cancel: &CancelToken,
    events: Sender<ScanEvent>,
    max_parallelism: usize,
) -> FinderResult<WorkerReport> {
    let workers = max_parallelism.min(paths.len());
    if workers == 0 {
        debug!("No files to process");
        return Ok(WorkerReport::default());
    }

    debug!("Processing {} files on {} workers", paths.len(), workers);
    let skipped = AtomicU64::new(0);

    ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|index| format!("finder-worker-{index}"))
        .build_scoped(
            |thread| thread.run(),
            |pool| {
                pool.install(|| {
                    paths.par_iter().for_each(|path| {
                        if cancel.is_cancelled() {
                            skipped.fetch_add(1, Ordering::Relaxed);
                            return;
                        }

                        let event = match processor.process_file(path) {
                            Ok(true) => Some(ScanEvent::Match { path: path.clone() }),
                            Ok(false) => None,
                            Err(e) => {
                                warn!("Failed to process {}: {}", path.display(), e);
                                Some(ScanEvent::Error(FileError::new(path, e.to_string())))
                            }
                        };

                        if let Some(event) = event {
                            // The dispatcher outlives the pool
                            let _ = events.send(event);
                        }
                    })
                })
            },
        )
        .map_err(|e| FinderError::worker_pool(e.to_string()))?;

    let skipped = skipped.into_inner();
    if skipped > 0 {
        processor.metrics().record_skips(skipped);
        debug!("Skipped {} files after cancellation", skipped);
    }

    Ok(WorkerReport { workers, skipped })
}
