//! Installer registry for managing pluggable install strategies
//!
//! Installers are behavioural capabilities registered at startup: a
//! predicate deciding whether a file list is theirs, and an install method
//! emitting instructions. The registry keeps them in a total order
//! (ascending priority, registration order breaking ties) and routes each
//! archive to the first installer that claims it.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::core::{ProgressCallback, Result};
use crate::instructions::Instruction;
use crate::model::FileListItem;

/// Result of an installer's support test
#[derive(Debug, Clone, Default)]
pub struct Supported {
    pub supported: bool,
    /// Files the installer needs to do its work
    pub required_files: Vec<String>,
}

impl Supported {
    pub fn yes() -> Self {
        Self {
            supported: true,
            required_files: Vec::new(),
        }
    }

    pub fn no() -> Self {
        Self::default()
    }
}

/// A pluggable install strategy
#[async_trait]
pub trait ModInstaller: Send + Sync {
    /// Whether this installer can handle the given file list
    async fn test_supported(&self, files: &[String], game_id: &str) -> Result<Supported>;

    /// Turn the archive's file list into install instructions
    ///
    /// Resolves to `None` when the installer already surfaced its own error
    /// to the user; the pipeline then cancels quietly. An empty instruction
    /// list means the archive had nothing to install.
    async fn install(
        &self,
        files: &[String],
        temp_path: &Path,
        game_id: &str,
        progress: Option<ProgressCallback>,
        choices: Option<&Value>,
        unattended: bool,
    ) -> Result<Option<Vec<Instruction>>>;
}

/// Game-specific mod classifier consulted after install instructions are
/// known
#[async_trait]
pub trait ModTypeProbe: Send + Sync {
    fn type_id(&self) -> &str;
    /// Higher priority probes are consulted first
    fn priority(&self) -> i32;
    async fn test(&self, instructions: &[Instruction]) -> Result<bool>;
}

struct RegisteredInstaller {
    priority: i32,
    installer: Arc<dyn ModInstaller>,
}

/// Registry of installers and mod-type probes
///
/// Holds no per-install state; reads during installs are lock-free
/// snapshots.
#[derive(Default)]
pub struct InstallerRegistry {
    installers: RwLock<Vec<RegisteredInstaller>>,
    mod_types: RwLock<HashMap<String, Vec<Arc<dyn ModTypeProbe>>>>,
}

impl InstallerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an installer; lower priority runs earlier, ties keep
    /// registration order
    pub fn register(&self, priority: i32, installer: Arc<dyn ModInstaller>) {
        let mut installers = self.installers.write().unwrap();
        let position = installers
            .iter()
            .position(|entry| entry.priority > priority)
            .unwrap_or(installers.len());
        installers.insert(
            position,
            RegisteredInstaller {
                priority,
                installer,
            },
        );
    }

    /// Register a mod-type probe for one game
    pub fn register_mod_type(&self, game_id: &str, probe: Arc<dyn ModTypeProbe>) {
        let mut mod_types = self.mod_types.write().unwrap();
        let probes = mod_types.entry(game_id.to_owned()).or_default();
        probes.push(probe);
        probes.sort_by_key(|probe| std::cmp::Reverse(probe.priority()));
    }

    /// Find the first installer that supports the file list
    pub async fn find(
        &self,
        files: &[String],
        game_id: &str,
    ) -> Result<Option<(Arc<dyn ModInstaller>, Supported)>> {
        let candidates: Vec<Arc<dyn ModInstaller>> = self
            .installers
            .read()
            .unwrap()
            .iter()
            .map(|entry| Arc::clone(&entry.installer))
            .collect();

        for (index, installer) in candidates.into_iter().enumerate() {
            let support = installer.test_supported(files, game_id).await?;
            if support.supported {
                debug!(index, game_id, "installer selected");
                return Ok(Some((installer, support)));
            }
        }
        Ok(None)
    }

    /// Determine the mod type from the instruction list
    ///
    /// Probes for the game are consulted in descending priority; the first
    /// match wins. No match resolves to the empty (default) type.
    pub async fn determine_mod_type(
        &self,
        game_id: &str,
        instructions: &[Instruction],
    ) -> Result<String> {
        let probes: Vec<Arc<dyn ModTypeProbe>> = self
            .mod_types
            .read()
            .unwrap()
            .get(game_id)
            .map(|probes| probes.to_vec())
            .unwrap_or_default();

        for probe in probes {
            if probe.test(instructions).await? {
                return Ok(probe.type_id().to_owned());
            }
        }
        Ok(String::new())
    }
}

/// Installer synthesised over an explicit file list
///
/// Used when the caller already knows which files make up the mod;
/// bypasses registry selection entirely.
pub struct FileListInstaller {
    files: Vec<FileListItem>,
}

impl FileListInstaller {
    pub fn new(files: Vec<FileListItem>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl ModInstaller for FileListInstaller {
    async fn test_supported(&self, _files: &[String], _game_id: &str) -> Result<Supported> {
        Ok(Supported::yes())
    }

    async fn install(
        &self,
        _files: &[String],
        _temp_path: &Path,
        _game_id: &str,
        _progress: Option<ProgressCallback>,
        _choices: Option<&Value>,
        _unattended: bool,
    ) -> Result<Option<Vec<Instruction>>> {
        Ok(Some(
            self.files
                .iter()
                .map(|item| Instruction::copy(item.path.clone(), item.path.clone()))
                .collect(),
        ))
    }
}
