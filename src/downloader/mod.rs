//! Recursive download orchestration: frontier, per-URL pipeline, and the
//! scheduler that drives them.

pub mod core;
pub mod frontier;
pub mod process;

pub use self::core::{DownloadError, start_recursive_download};
pub use frontier::{Frontier, QueueItem};
pub use process::{CrawlContext, CrawlStats};
