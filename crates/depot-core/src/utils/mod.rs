//! Shared utilities

use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static UUID_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});

/// True when the string has the 8-4-4-4-12 hex shape of a UUID.
pub fn is_uuid_shaped(s: &str) -> bool {
    UUID_SHAPE.is_match(s)
}

/// Current time as unix seconds.
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Join object-store key segments, rejecting traversal outside the base.
///
/// Empty segments are skipped; `..` components and absolute segments are
/// refused so a client-supplied path can never escape the artifact's
/// directory.
pub fn safe_join(segments: &[&str]) -> Result<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        if segment.starts_with('/') {
            return Err(Error::Validation(format!(
                "Path segment must be relative: '{}'",
                segment
            )));
        }
        for component in segment.split('/') {
            if component.is_empty() || component == "." {
                continue;
            }
            if component == ".." {
                return Err(Error::Validation(format!(
                    "Path traversal is not allowed: '{}'",
                    segment
                )));
            }
            parts.push(component);
        }
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_shape() {
        assert!(is_uuid_shaped("0192f4be-11f7-7610-9da2-ffc39feeb009"));
        assert!(!is_uuid_shaped("my-dataset"));
        assert!(!is_uuid_shaped("0192F4BE-11F7-7610-9DA2-FFC39FEEB009"));
        assert!(!is_uuid_shaped("0192f4be-11f7-7610-9da2"));
    }

    #[test]
    fn test_safe_join() {
        assert_eq!(
            safe_join(&["prefix", "ws", "artifacts/abc", "v0", "data.csv"]).unwrap(),
            "prefix/ws/artifacts/abc/v0/data.csv"
        );
        assert_eq!(safe_join(&["", "ws", "a//b"]).unwrap(), "ws/a/b");
    }

    #[test]
    fn test_safe_join_rejects_traversal() {
        assert!(safe_join(&["ws", "../other"]).is_err());
        assert!(safe_join(&["ws", "a/../../b"]).is_err());
        assert!(safe_join(&["/absolute"]).is_err());
    }
}
