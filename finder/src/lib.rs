pub mod config;
pub mod enumerate;
pub mod errors;
pub mod metrics;
pub mod request;
pub mod results;
pub mod search;

pub use config::{ConfigOverrides, EncodingMode, FinderConfig};
pub use enumerate::{Enumeration, FsEnumerator, NamePattern, PathSource};
pub use errors::{FinderError, FinderResult};
pub use metrics::{MetricsSnapshot, ScanMetrics};
pub use request::ScanRequest;
pub use results::{FileError, ScanEvent, ScanObserver, ScanOutcome, ScanResult, ScanStats};
pub use search::{CancelToken, ScanEngine, ScanHandle, ScanId, ScanOptions};
