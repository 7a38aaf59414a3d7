//! The install manager facade
//!
//! Owns the two pieces of process-wide state (the serial install queue and
//! the installer registry) and exposes the programmatic API: installing an
//! archive, and resolving a mod's dependencies or recommendations.

use futures::future::BoxFuture;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::api::Api;
use crate::core::{InstallConfig, ProgressCallback, Result};
use crate::deps;
use crate::model::{DependencyBatchReport, FileListItem, ModInfo};
use crate::pipeline::InstallPipeline;
use crate::queue::InstallQueue;
use crate::registry::{InstallerRegistry, ModInstaller, ModTypeProbe};

/// Everything one install needs to know
///
/// Built with the `with_*` methods; only the archive path is mandatory.
#[derive(Clone)]
pub struct InstallRequest {
    /// Id of the managed download this archive came from, if any
    pub archive_id: Option<String>,
    pub archive_path: PathBuf,
    /// Game ids the download was declared for
    pub download_games: Vec<String>,
    pub info: ModInfo,
    /// Resolve `requires` rules right after the install (also needs the
    /// config flag)
    pub process_dependencies: bool,
    /// Enable the mod in the profile once installed
    pub enable: bool,
    pub profile_id: Option<String>,
    /// Skip game resolution and use this game
    pub force_game_id: Option<String>,
    /// Bypass installer selection with an explicit file list
    pub file_list: Option<Vec<FileListItem>>,
    /// Pre-recorded installer choices
    pub choices: Option<Value>,
    /// Suppress dialogs where a recorded answer exists
    pub unattended: bool,
    pub progress: Option<ProgressCallback>,
}

impl InstallRequest {
    pub fn new<P: AsRef<Path>>(archive_path: P) -> Self {
        Self {
            archive_id: None,
            archive_path: archive_path.as_ref().to_path_buf(),
            download_games: Vec::new(),
            info: ModInfo::default(),
            process_dependencies: false,
            enable: false,
            profile_id: None,
            force_game_id: None,
            file_list: None,
            choices: None,
            unattended: false,
            progress: None,
        }
    }

    pub fn with_archive_id<S: Into<String>>(mut self, id: S) -> Self {
        self.archive_id = Some(id.into());
        self
    }

    pub fn with_game<S: Into<String>>(mut self, game_id: S) -> Self {
        self.download_games.push(game_id.into());
        self
    }

    pub fn forced_game<S: Into<String>>(mut self, game_id: S) -> Self {
        self.force_game_id = Some(game_id.into());
        self
    }

    pub fn with_info(mut self, info: ModInfo) -> Self {
        self.info = info;
        self
    }

    pub fn with_profile<S: Into<String>>(mut self, profile_id: S) -> Self {
        self.profile_id = Some(profile_id.into());
        self
    }

    pub fn with_file_list(mut self, file_list: Option<Vec<FileListItem>>) -> Self {
        self.file_list = file_list;
        self
    }

    pub fn with_choices(mut self, choices: Option<Value>) -> Self {
        self.choices = choices;
        self
    }

    pub fn enable_after_install(mut self) -> Self {
        self.enable = true;
        self
    }

    pub fn process_dependencies(mut self) -> Self {
        self.process_dependencies = true;
        self
    }

    pub fn unattended(mut self) -> Self {
        self.unattended = true;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl std::fmt::Debug for InstallRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallRequest")
            .field("archive_id", &self.archive_id)
            .field("archive_path", &self.archive_path)
            .field("download_games", &self.download_games)
            .field("unattended", &self.unattended)
            .finish_non_exhaustive()
    }
}

/// Coordinates archive installs for one application instance
pub struct InstallManager {
    pub(crate) api: Api,
    pub(crate) config: Arc<InstallConfig>,
    pub(crate) registry: Arc<InstallerRegistry>,
    queue: Arc<InstallQueue>,
}

impl InstallManager {
    pub fn new(api: Api, config: InstallConfig) -> Self {
        Self {
            api,
            config: Arc::new(config),
            registry: Arc::new(InstallerRegistry::new()),
            queue: Arc::new(InstallQueue::new()),
        }
    }

    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    /// Register an install strategy; lower priority is consulted earlier
    pub fn register_installer(&self, priority: i32, installer: Arc<dyn ModInstaller>) {
        self.registry.register(priority, installer);
    }

    /// Register a game-specific mod-type probe
    pub fn register_mod_type(&self, game_id: &str, probe: Arc<dyn ModTypeProbe>) {
        self.registry.register_mod_type(game_id, probe);
    }

    /// Install one archive; resolves to the installed mod id
    ///
    /// The pipeline is appended to the serial queue: it does not start
    /// until every previously requested install reached its terminal
    /// state. Returns a boxed future because dependency installs re-enter
    /// this method.
    pub fn install(&self, request: InstallRequest) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let chain_dependencies =
                request.process_dependencies && self.config.auto_install_dependencies;
            let profile_id = request.profile_id.clone();

            let pipeline = InstallPipeline::new(
                self.api.clone(),
                Arc::clone(&self.config),
                Arc::clone(&self.registry),
                request,
            );
            let mod_id = self.queue.run(pipeline.run()).await?;

            if chain_dependencies {
                if let Some(profile_id) = profile_id {
                    debug!(%mod_id, "auto-resolving dependencies");
                    // the mod itself installed fine; dependency trouble is
                    // surfaced through notifications, not as install failure
                    if let Err(err) =
                        deps::install_dependencies(self, &profile_id, &mod_id, true).await
                    {
                        tracing::warn!(%mod_id, %err, "dependency resolution failed");
                    }
                }
            }
            Ok(mod_id)
        })
    }

    /// Install everything the mod's `requires` rules name
    pub async fn install_dependencies(
        &self,
        profile_id: &str,
        mod_id: &str,
        silent: bool,
    ) -> Result<DependencyBatchReport> {
        deps::install_dependencies(self, profile_id, mod_id, silent).await
    }

    /// Offer and install the mod's `recommends` rules
    pub async fn install_recommendations(
        &self,
        profile_id: &str,
        mod_id: &str,
    ) -> Result<DependencyBatchReport> {
        deps::install_recommendations(self, profile_id, mod_id).await
    }
}
