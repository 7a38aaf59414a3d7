//! Data model shared across the install subsystem
//!
//! These are the shapes the pipeline, the store capability and the
//! dependency resolver exchange. The persistent store itself lives outside
//! this crate; [`ModEntry`] and friends are its narrow read model.

pub mod dependency;
pub mod reference;

pub use dependency::{
    Dependency, DependencyBatchReport, DependencyError, FileListItem, GatherOutcome, LookupResult,
};
pub use reference::{is_fuzzy_version, ModReference, ModRule, RuleExtra, RuleType};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Attribute keys with meaning to the pipeline
///
/// Attributes are an open bag; these are the keys the install manager itself
/// reads or writes.
pub mod attr {
    pub const VERSION: &str = "version";
    pub const FILE_NAME: &str = "fileName";
    pub const FILE_VERSION: &str = "fileVersion";
    pub const FILE_ID: &str = "fileId";
    pub const NEWEST_FILE_ID: &str = "newestFileId";
    pub const FILE_MD5: &str = "fileMD5";
    pub const FILE_SIZE: &str = "fileSize";
    pub const CUSTOM_FILE_NAME: &str = "customFileName";
    pub const INSTALL_TIME: &str = "installTime";
    pub const VARIANT: &str = "variant";
}

/// Per-install information bag
///
/// Recognised keys get typed fields; anything else travels in `extras` and
/// is persisted with the mod untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModInfo {
    #[serde(default, rename = "fileMD5", skip_serializing_if = "Option::is_none")]
    pub file_md5: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// Game ids the download was declared for
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub download_games: Vec<String>,
    /// Best metadata lookup match, merged in by the pipeline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<LookupResult>,
    /// Pre-recorded installer choices for unattended installs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Value>,
    /// Variant label chosen during a name collision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

/// Lifecycle state of a catalogued mod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModState {
    Installing,
    Installed,
}

/// Narrow read model of one persisted mod
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModEntry {
    pub id: String,
    pub state: ModState,
    /// Classifier selecting deployment behaviour downstream; empty = default
    #[serde(default)]
    pub mod_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_id: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub rules: Vec<ModRule>,
    #[serde(default)]
    pub file_overrides: Vec<String>,
}

impl ModEntry {
    pub fn new<S: Into<String>>(id: S, state: ModState) -> Self {
        Self {
            id: id.into(),
            state,
            mod_type: String::new(),
            archive_id: None,
            attributes: Map::new(),
            rules: Vec::new(),
            file_overrides: Vec::new(),
        }
    }

    /// Read a string attribute
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

/// Transfer state of a managed download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadState {
    Started,
    Paused,
    Finished,
    Failed,
}

/// Narrow read model of one managed download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadInfo {
    pub id: String,
    pub state: DownloadState,
    /// Where the archive landed, once the transfer finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    /// Game ids the download was tagged with
    #[serde(default)]
    pub game_ids: Vec<String>,
    #[serde(default, rename = "fileMD5", skip_serializing_if = "Option::is_none")]
    pub file_md5: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// External entity tracking which mods are enabled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub game_id: String,
}
