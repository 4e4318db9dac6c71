//! The crawl's audit trail: one JSONL record per processed URL.

pub mod record;
pub mod writer;

pub use record::{FetchStatus, IndexRecord};
pub use writer::IndexWriter;
