//! Resolver-side view of a single dependency
//!
//! Dependencies are built by the gather phase and discarded once the batch
//! completes; only the rewritten rules persist.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::reference::{ModRule, RuleExtra};

/// One row returned by the metadata lookup service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, rename = "fileMD5", skip_serializing_if = "Option::is_none")]
    pub file_md5: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_version: Option<String>,
    /// Repository-side mod id (not a local mod id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_id: Option<String>,
    /// Repository-side file id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    /// Repository domain the mod lives under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
    /// Which repository produced this row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Direct download location, when the repository provides one
    #[serde(default, rename = "sourceURI", skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

/// File entry for a pre-supplied install list
///
/// When a caller already knows which files make up the mod, installer
/// selection is bypassed and a list installer is synthesised over these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileListItem {
    /// Path relative to the extraction root
    pub path: String,
}

/// A dependency the resolver decided needs handling
#[derive(Debug, Clone)]
pub struct Dependency {
    /// The rule this dependency originates from
    pub rule: ModRule,
    /// Candidate metadata rows, best match first
    pub lookup_results: Vec<LookupResult>,
    /// Known download id, if the archive was fetched before
    pub download: Option<String>,
    /// Already-installed mod satisfying the reference
    pub existing_mod: Option<String>,
    /// Pre-recorded installer choices for unattended install
    pub installer_choices: Option<Value>,
    pub file_list: Option<Vec<FileListItem>>,
    pub extra: Option<RuleExtra>,
}

impl Dependency {
    pub fn from_rule(rule: ModRule) -> Self {
        let extra = rule.extra.clone();
        Self {
            rule,
            lookup_results: Vec::new(),
            download: None,
            existing_mod: None,
            installer_choices: None,
            file_list: None,
            extra,
        }
    }
}

/// A rule the gather phase could not resolve
#[derive(Debug, Clone)]
pub struct DependencyError {
    pub rule: Option<ModRule>,
    pub message: String,
}

/// Mixed output of the gather phase
#[derive(Debug, Clone)]
pub enum GatherOutcome {
    Resolved(Dependency),
    Failed(DependencyError),
}

/// Outcome summary of one dependency batch
#[derive(Debug, Default)]
pub struct DependencyBatchReport {
    /// Mods newly installed by the batch
    pub installed: Vec<String>,
    /// References satisfied by mods that were already present
    pub reused: Vec<String>,
    /// Dependencies dropped, with the reason
    pub dropped: Vec<(String, String)>,
}

impl DependencyBatchReport {
    pub fn is_empty(&self) -> bool {
        self.installed.is_empty() && self.reused.is_empty() && self.dropped.is_empty()
    }
}
