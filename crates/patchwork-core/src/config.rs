//! Reconciliation settings.
//!
//! Every field has a default, so an empty JSON object (or a partial one) is a valid
//! configuration:
//!
//! ```
//! use patchwork_core::ReconcileConfig;
//!
//! let config = ReconcileConfig::from_json_str(r#"{ "resolve": { "nearest_occurrence": true } }"#).unwrap();
//! assert!(config.resolve.nearest_occurrence);
//! assert!(config.resolve.whitespace_fallback);
//! assert_eq!(config.persistence.baseline_revision, "HEAD");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON is malformed or a field has the wrong type.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Top-level settings for an [`EditSession`](crate::session::EditSession).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Anchor resolution.
    pub resolve: ResolveOptions,
    /// Pending edit handling.
    pub overlay: OverlayOptions,
    /// Storage writes on accept and reject.
    pub persistence: PersistenceOptions,
}

impl ReconcileConfig {
    /// Parse settings from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Anchor resolution knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveOptions {
    /// Try a whitespace-tolerant content match after every other strategy failed.
    pub whitespace_fallback: bool,
    /// Minimum non-whitespace length of `match_text` for the whitespace-tolerant match.
    pub whitespace_fallback_min_chars: usize,
    /// Pick the occurrence closest to the position hint instead of the first one.
    pub nearest_occurrence: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            whitespace_fallback: true,
            whitespace_fallback_min_chars: 1,
            nearest_occurrence: false,
        }
    }
}

/// Pending edit overlay knobs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayOptions {
    /// Refuse to accept an edit whose original snippet no longer sits at its range.
    pub verify_snippet_on_accept: bool,
}

/// When and how accepted changes reach storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceOptions {
    /// Write the file to storage after each accept.
    pub write_on_accept: bool,
    /// Stage files changed by accepted diff-origin edits.
    pub stage_diff_edits_on_accept: bool,
    /// Make `reject_all` revert files to `baseline_revision` unless the caller says otherwise.
    pub revert_on_reject_all: bool,
    /// Revision `reject_all` reverts to and diffs are read against.
    pub baseline_revision: String,
}

impl Default for PersistenceOptions {
    fn default() -> Self {
        Self {
            write_on_accept: true,
            stage_diff_edits_on_accept: true,
            revert_on_reject_all: false,
            baseline_revision: "HEAD".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(ReconcileConfig::from_json_str("{}").unwrap(), ReconcileConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = ReconcileConfig::from_json_str(
            r#"{"overlay":{"verify_snippet_on_accept":true},"persistence":{"baseline_revision":"main"}}"#,
        )
        .unwrap();
        assert!(config.overlay.verify_snippet_on_accept);
        assert_eq!(config.persistence.baseline_revision, "main");
        assert!(config.persistence.write_on_accept);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            ReconcileConfig::from_json_str(r#"{"resolve":{"nearest_occurrence":"yes"}}"#),
            Err(ConfigError::Invalid(_))
        ));
    }
}
