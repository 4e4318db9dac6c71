//! Utility modules shared across the crate.

pub mod constants;
pub mod url_utils;

pub use constants::*;
pub use url_utils::{canonicalize_url, extract_host, is_fetchable_url, is_same_site};
