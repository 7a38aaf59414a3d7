//! Mod rules and the references they point through
//!
//! A rule ties a mod to another mod, either by its concrete id or by a fuzzy
//! description (md5, logical file name, file expression, version range) that
//! the dependency resolver re-matches against available downloads and lookup
//! results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Relationship a rule declares between its owner and the referenced mod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Requires,
    Recommends,
    Conflicts,
    Provides,
    Before,
    After,
}

impl RuleType {
    /// Rules the dependency resolver acts on
    pub fn is_dependency(self) -> bool {
        matches!(self, RuleType::Requires | RuleType::Recommends)
    }
}

/// Reference to another mod, by id or by fuzzy description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModReference {
    /// Concrete mod id, once pinned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, rename = "fileMD5", skip_serializing_if = "Option::is_none")]
    pub file_md5: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_file_name: Option<String>,
    /// Glob-like expression over the file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_expression: Option<String>,
    /// Version constraint; may be an exact version, a range, or free text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_match: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ModReference {
    /// Reference an existing mod by id
    pub fn by_id<S: Into<String>>(id: S) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Whether this reference can be re-matched without its id
    ///
    /// A fuzzy reference still carries enough description (md5, logical name
    /// or file expression) to find a replacement when the referenced mod is
    /// gone.
    pub fn is_fuzzy(&self) -> bool {
        self.file_md5.is_some()
            || self.logical_file_name.is_some()
            || self.file_expression.is_some()
    }

    /// Stable identity of the reference, used to de-duplicate rules across
    /// a gather recursion
    pub fn key(&self) -> String {
        if let Some(ref id) = self.id {
            return format!("id:{}", id);
        }
        format!(
            "{}:{}:{}:{}",
            self.file_md5.as_deref().unwrap_or(""),
            self.logical_file_name.as_deref().unwrap_or(""),
            self.file_expression.as_deref().unwrap_or(""),
            self.version_match.as_deref().unwrap_or("")
        )
    }
}

/// Extra payload carried by a rule, applied to the installed dependency
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleExtra {
    /// Mod type to assign after install
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_type: Option<String>,
    /// Custom display name to assign after install
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

/// A persisted relationship between two mods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModRule {
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub reference: ModReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<RuleExtra>,
}

impl ModRule {
    pub fn new(rule_type: RuleType, reference: ModReference) -> Self {
        Self {
            rule_type,
            reference,
            extra: None,
        }
    }
}

/// Whether a version constraint matches more than one concrete file
///
/// Hex strings are hashes, and anything parsing as one exact semantic
/// version pins a single file. Everything else ("1.2.x", ">=2.0", "latest")
/// is fuzzy: a download for it should go through the update channel so the
/// matching file is resolved server-side.
pub fn is_fuzzy_version(version_match: &str) -> bool {
    let trimmed = version_match.trim();
    if trimmed.is_empty() {
        return false;
    }
    let is_hex = trimmed.len() >= 8 && trimmed.chars().all(|c| c.is_ascii_hexdigit());
    if is_hex {
        return false;
    }
    semver::Version::parse(trimmed.trim_start_matches('=').trim()).is_err()
}
