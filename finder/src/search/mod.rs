//! The scan engine and its parts.
//!
//! A scan runs on a dedicated thread owned by [`ScanEngine`]. That thread
//! enumerates candidate files, then hands them to a rayon pool sized to the
//! request's parallelism. Workers send matches and failures over a crossbeam
//! channel; the scan thread is the only reader, so it alone updates the
//! [`ScanResult`](crate::results::ScanResult), feeds the
//! [`ScanHandle::events`] receiver and calls the observer.
//!
//! ```rust,ignore
//! let engine = ScanEngine::new();
//! let handle = engine.start_scan(ScanRequest::new("src", "*.rs", "todo", 4))?;
//! for event in handle.events() {
//!     println!("{:?}", event);
//! }
//! let result = handle.wait();
//! ```
pub mod engine;
pub mod handle;
pub mod matcher;
mod pool;
pub mod processor;

pub use engine::{ScanEngine, ScanOptions};
pub use handle::{CancelToken, ScanHandle, ScanId};
pub use matcher::NeedleMatcher;
pub use processor::FileProcessor;
