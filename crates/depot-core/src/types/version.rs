//! Version selectors
//!
//! A selector names one slot in an artifact's version history. With N
//! committed versions, indices `0..N-1` are committed and index `N` is the
//! staged version (when staging is active).

use crate::types::artifact::VersionEntry;
use crate::{Error, Result};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelector {
    /// Latest committed version, or the initial slot when nothing is committed.
    None,
    /// Latest committed version; an error when no version is committed.
    Latest,
    /// The staged version; only valid while staging is active.
    Stage,
    /// A named version label.
    Label(String),
    /// An explicit committed index.
    Index(usize),
}

impl VersionSelector {
    /// Parse a selector out of a request string. Digit-only strings are
    /// explicit indices; a label that happens to look like a number is not
    /// reachable this way, and an unknown label never falls back to index
    /// interpretation.
    pub fn parse(version: Option<&str>) -> VersionSelector {
        match version {
            None => VersionSelector::None,
            Some("latest") => VersionSelector::Latest,
            Some("stage") => VersionSelector::Stage,
            Some(s) => match s.parse::<usize>() {
                Ok(n) => VersionSelector::Index(n),
                Err(_) => VersionSelector::Label(s.to_string()),
            },
        }
    }

    /// Parse a selector out of a JSON value (`null`, string, or non-negative
    /// integer).
    pub fn parse_value(version: Option<&JsonValue>) -> Result<VersionSelector> {
        match version {
            None | Some(JsonValue::Null) => Ok(VersionSelector::None),
            Some(JsonValue::String(s)) => Ok(VersionSelector::parse(Some(s))),
            Some(JsonValue::Number(n)) => {
                let idx = n
                    .as_u64()
                    .ok_or_else(|| Error::Validation("Version index must be non-negative".into()))?;
                Ok(VersionSelector::Index(idx as usize))
            }
            Some(other) => Err(Error::Validation(format!(
                "Version must be a string or an integer, got: {}",
                other
            ))),
        }
    }

    /// Resolve to a version index against `versions` (length N). `staged`
    /// reports whether the artifact currently has a staged version.
    pub fn resolve(&self, versions: &[VersionEntry], staged: bool) -> Result<usize> {
        let committed = versions.len();
        match self {
            VersionSelector::None => Ok(committed.saturating_sub(1)),
            VersionSelector::Latest => {
                if committed == 0 {
                    Err(Error::VersionNotFound("latest".into()))
                } else {
                    Ok(committed - 1)
                }
            }
            VersionSelector::Stage => {
                if staged {
                    Ok(committed)
                } else {
                    Err(Error::Precondition("Artifact has no staged version".into()))
                }
            }
            VersionSelector::Label(label) => versions
                .iter()
                .position(|v| v.version == *label)
                .ok_or_else(|| Error::VersionNotFound(label.clone())),
            VersionSelector::Index(idx) => {
                if *idx < committed {
                    Ok(*idx)
                } else {
                    Err(Error::VersionNotFound(idx.to_string()))
                }
            }
        }
    }
}
