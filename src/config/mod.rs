//! Crawl configuration: the [`DownloadConfig`] type and its builder.

pub mod builder;
pub mod types;

pub use builder::DownloadConfigBuilder;
pub use types::DownloadConfig;
