//! Configuration types for the install subsystem

use std::path::{Path, PathBuf};

/// Configuration for the install manager
#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// Root under which per-game install directories live
    /// (`<install_base>/<game_id>/<mod_id>`)
    pub install_base: PathBuf,
    /// Maximum number of dependencies progressing in parallel
    pub dependency_concurrency: usize,
    /// Automatically install a mod's `requires` rules right after the mod
    /// itself installs. Off by default; dependency installation is normally
    /// an explicit, separate operation.
    pub auto_install_dependencies: bool,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            install_base: PathBuf::from("mods"),
            dependency_concurrency: 4,
            auto_install_dependencies: false,
        }
    }
}

impl InstallConfig {
    /// The install directory for one game
    pub fn install_dir(&self, game_id: &str) -> PathBuf {
        self.install_base.join(game_id)
    }

    /// Final location of an installed mod
    pub fn mod_dir(&self, game_id: &str, mod_id: &str) -> PathBuf {
        self.install_dir(game_id).join(mod_id)
    }

    /// Transient workspace of one pipeline; exists only while it runs
    pub fn staging_dir(&self, game_id: &str, mod_id: &str) -> PathBuf {
        let mut name = mod_id.to_owned();
        name.push_str(".installing");
        self.install_dir(game_id).join(name)
    }
}

/// Builder for [`InstallConfig`]
#[derive(Debug, Default)]
pub struct InstallConfigBuilder {
    config: InstallConfig,
}

impl InstallConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install_base<P: AsRef<Path>>(mut self, base: P) -> Self {
        self.config.install_base = base.as_ref().to_path_buf();
        self
    }

    pub fn dependency_concurrency(mut self, limit: usize) -> Self {
        self.config.dependency_concurrency = limit.max(1);
        self
    }

    pub fn auto_install_dependencies(mut self, enabled: bool) -> Self {
        self.config.auto_install_dependencies = enabled;
        self
    }

    pub fn build(self) -> InstallConfig {
        self.config
    }
}
