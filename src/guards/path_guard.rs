//! Filesystem path validation for downloaded content.
//!
//! Every path the crawler writes to goes through [`prepare_target_path`],
//! which confines the result to the crawl's content root. Traversal
//! sequences, URL-encoded traversal, absolute-path injection, and
//! symlinked parents all resolve to either a path strictly under the base
//! directory or an error, never a path outside it.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use url::Url;

use crate::utils::constants::{
    MAX_PATH_COMPONENT_BYTES, MAX_PERCENT_DECODE_PASSES, MAX_TOTAL_PATH_BYTES,
};

/// Errors raised while validating or preparing a target path.
#[derive(Debug, Error)]
pub enum PathGuardError {
    #[error("resolved path {path} escapes base directory {base}")]
    OutsideBase { path: PathBuf, base: PathBuf },

    #[error("base directory {base} is unavailable: {source}")]
    BaseUnavailable {
        base: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to create parent directories for {path}: {source}")]
    CreateParent {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("path length {len} bytes exceeds limit of {max}")]
    PathTooLong { len: usize, max: usize },

    #[error("invalid path: {0}")]
    Invalid(String),
}

/// Outcome of path preparation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathDecision {
    /// Path is validated, parents exist, and the target may be written.
    Ready(PathBuf),
    /// Target already exists and overwrite was not requested.
    SkipExisting(PathBuf),
}

/// Validate `requested` against `allowed_base` and prepare it for writing.
///
/// Percent-encoding is decoded iteratively (bounded passes), separators
/// are normalized, and `..` segments are resolved lexically before the
/// containment check. Parent directories are created; a failure to create
/// them is an error, not a skip. The parent is canonicalized after
/// creation so a symlink planted inside the base cannot redirect the
/// write outside it.
///
/// If the target file already exists and `overwrite` is false, returns
/// [`PathDecision::SkipExisting`]. The writer performs a second existence
/// check immediately before its final rename to close the TOCTOU window.
pub fn prepare_target_path(
    requested: &Path,
    allowed_base: &Path,
    overwrite: bool,
) -> Result<PathDecision, PathGuardError> {
    let canonical_base =
        std::fs::canonicalize(allowed_base).map_err(|source| PathGuardError::BaseUnavailable {
            base: allowed_base.to_path_buf(),
            source,
        })?;

    let decoded = decode_percent_bounded(&requested.to_string_lossy());
    let normalized_separators = decoded.replace('\\', "/");
    let candidate = PathBuf::from(normalized_separators);
    let candidate = if candidate.is_absolute() {
        candidate
    } else {
        canonical_base.join(candidate)
    };

    let resolved = normalize_lexically(&candidate);

    // Lexical containment first: cheap rejection of traversal escapes.
    // Absolute requests are accepted only when they already point inside
    // the base (compared against both spellings of the base, since the
    // caller may hold the non-canonical one).
    let relative = resolved
        .strip_prefix(&canonical_base)
        .or_else(|_| resolved.strip_prefix(&normalize_lexically(allowed_base)))
        .map_err(|_| PathGuardError::OutsideBase {
            path: resolved.clone(),
            base: canonical_base.clone(),
        })?
        .to_path_buf();

    if relative.as_os_str().is_empty() {
        return Err(PathGuardError::Invalid(
            "resolved path is the base directory itself".into(),
        ));
    }

    let target = canonical_base.join(&relative);
    let len = target.as_os_str().len();
    if len > MAX_TOTAL_PATH_BYTES {
        return Err(PathGuardError::PathTooLong {
            len,
            max: MAX_TOTAL_PATH_BYTES,
        });
    }

    let parent = target
        .parent()
        .ok_or_else(|| PathGuardError::Invalid("target path has no parent".into()))?
        .to_path_buf();

    std::fs::create_dir_all(&parent).map_err(|source| PathGuardError::CreateParent {
        path: target.clone(),
        source,
    })?;

    // Re-resolve the (now existing) parent to catch symlink escapes.
    let canonical_parent =
        std::fs::canonicalize(&parent).map_err(|source| PathGuardError::BaseUnavailable {
            base: parent.clone(),
            source,
        })?;
    if !canonical_parent.starts_with(&canonical_base) {
        return Err(PathGuardError::OutsideBase {
            path: canonical_parent,
            base: canonical_base,
        });
    }

    let file_name = target
        .file_name()
        .ok_or_else(|| PathGuardError::Invalid("target path has no file name".into()))?;
    let target = canonical_parent.join(file_name);

    if target.exists() && !overwrite {
        return Ok(PathDecision::SkipExisting(target));
    }

    Ok(PathDecision::Ready(target))
}

/// Compute the mirrored on-disk path for a URL under `content_root`.
///
/// The hostname becomes the top-level directory (suffixed with the port
/// when one is present, so two servers on the same host do not collide);
/// URL path segments become directory segments; a path ending in `/` or
/// an empty path maps to `index.html`. Every component is
/// percent-decoded, sanitized, and truncated to a bounded length.
pub fn mirror_path_for_url(url: &str, content_root: &Path) -> Result<PathBuf, PathGuardError> {
    let parsed =
        Url::parse(url).map_err(|e| PathGuardError::Invalid(format!("unparseable URL: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| PathGuardError::Invalid(format!("URL has no host: {url}")))?;

    let host_dir = match parsed.port() {
        Some(port) => sanitize_component(&format!("{host}_{port}")),
        None => sanitize_component(host),
    };
    if host_dir.is_empty() {
        return Err(PathGuardError::Invalid(format!(
            "host sanitized to empty string: {host}"
        )));
    }

    let mut path = content_root.join(host_dir);

    let raw_segments: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.collect())
        .unwrap_or_default();

    let trailing_slash = raw_segments.last().is_none_or(|last| last.is_empty());

    for segment in &raw_segments {
        let cleaned = sanitize_component(&decode_percent_bounded(segment));
        if !cleaned.is_empty() {
            path.push(cleaned);
        }
    }

    if trailing_slash {
        path.push("index.html");
    }

    let len = path.as_os_str().len();
    if len > MAX_TOTAL_PATH_BYTES {
        return Err(PathGuardError::PathTooLong {
            len,
            max: MAX_TOTAL_PATH_BYTES,
        });
    }

    // Sanitized components cannot contain separators, but verify the
    // joined result anyway before anything touches the filesystem.
    let normalized = normalize_lexically(&path);
    if !normalized.starts_with(normalize_lexically(content_root)) {
        return Err(PathGuardError::OutsideBase {
            path: normalized,
            base: content_root.to_path_buf(),
        });
    }

    Ok(path)
}

/// Decode percent-encoding iteratively, bounded to a small number of
/// passes so double-encoded input cannot amplify indefinitely.
fn decode_percent_bounded(input: &str) -> String {
    let mut current = input.to_string();
    for _ in 0..MAX_PERCENT_DECODE_PASSES {
        match urlencoding::decode(&current) {
            Ok(decoded) if decoded != current => current = decoded.into_owned(),
            _ => break,
        }
    }
    current
}

/// Resolve `.` and `..` components without touching the filesystem.
/// Popping past the root is a no-op, so `/base/../../x` resolves to `/x`
/// and fails the containment check rather than escaping.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(segment) => out.push(segment),
        }
    }
    out
}

/// Sanitize a single path component and bound its length.
fn sanitize_component(segment: &str) -> String {
    if segment == "." || segment == ".." {
        return "_".to_string();
    }
    let cleaned = sanitize_filename::sanitize(segment);
    truncate_at_char_boundary(&cleaned, MAX_PATH_COMPONENT_BYTES).to_string()
}

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_bounded_handles_double_encoding() {
        assert_eq!(decode_percent_bounded("%252e%252e"), "..");
        assert_eq!(decode_percent_bounded("plain"), "plain");
    }

    #[test]
    fn normalize_resolves_parent_segments() {
        assert_eq!(
            normalize_lexically(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
        // Popping past root stays at root
        assert_eq!(
            normalize_lexically(Path::new("/a/../../b")),
            PathBuf::from("/b")
        );
    }

    #[test]
    fn sanitize_component_neutralizes_dot_dot() {
        assert_eq!(sanitize_component(".."), "_");
        assert_eq!(sanitize_component("."), "_");
        assert_eq!(sanitize_component("page.html"), "page.html");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "aé"; // 'é' is 2 bytes starting at index 1
        assert_eq!(truncate_at_char_boundary(s, 2), "a");
        assert_eq!(truncate_at_char_boundary(s, 3), "aé");
    }

    #[test]
    fn mirror_path_basic_layout() {
        let root = Path::new("/data/content/crawl1");
        let path = mirror_path_for_url("https://example.com/guide/intro", root).unwrap();
        assert_eq!(path, root.join("example.com").join("guide").join("intro"));
    }

    #[test]
    fn mirror_path_trailing_slash_maps_to_index_html() {
        let root = Path::new("/data/content/crawl1");
        let path = mirror_path_for_url("https://example.com/guide/", root).unwrap();
        assert_eq!(
            path,
            root.join("example.com").join("guide").join("index.html")
        );
        let path = mirror_path_for_url("https://example.com", root).unwrap();
        assert_eq!(path, root.join("example.com").join("index.html"));
    }

    #[test]
    fn mirror_path_includes_port_in_host_dir() {
        let root = Path::new("/data/content/crawl1");
        let path = mirror_path_for_url("http://127.0.0.1:8080/", root).unwrap();
        assert_eq!(path, root.join("127.0.0.1_8080").join("index.html"));
    }

    #[test]
    fn mirror_path_neutralizes_traversal_segments() {
        let root = Path::new("/data/content/crawl1");
        let path = mirror_path_for_url("https://example.com/%2e%2e/%2e%2e/etc/passwd", root)
            .expect("traversal segments must be neutralized, not escape");
        assert!(path.starts_with(root), "path {path:?} escaped {root:?}");
    }

    #[test]
    fn mirror_path_bounds_component_length() {
        let root = Path::new("/data/content/crawl1");
        let long = "a".repeat(500);
        let path = mirror_path_for_url(&format!("https://example.com/{long}"), root).unwrap();
        let last = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(last.len(), MAX_PATH_COMPONENT_BYTES);
    }
}
