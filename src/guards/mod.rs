//! Pre-fetch gates: path containment, robots.txt compliance, and SSRF
//! protection. Each gate can short-circuit a URL's processing without a
//! content fetch.

pub mod path_guard;
pub mod robots;
pub mod ssrf;

pub use path_guard::{PathDecision, PathGuardError, mirror_path_for_url, prepare_target_path};
pub use robots::{RobotsChecker, RobotsRules};
pub use ssrf::{SsrfGuard, ip_is_internal};
