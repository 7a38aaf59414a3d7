//! Mod Install Manager
//!
//! This library turns a downloaded archive into an installed, catalogued
//! mod. It coordinates archive extraction, pluggable installer selection,
//! instruction-based staging with rollback, user-mediated replace/upgrade
//! decisions, and recursive dependency resolution with bounded parallelism.
//!
//! External collaborators (the persistent store, the archive codec, the
//! download manager, metadata lookup, and the dialog frontend) are
//! capability traits bundled into an [`Api`] handle; this crate contains
//! no implementations of them.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mod_install::{InstallConfigBuilder, InstallManager, InstallRequest};
//!
//! # async fn example(api: mod_install::Api, installer: Arc<dyn mod_install::ModInstaller>) -> mod_install::Result<()> {
//! let config = InstallConfigBuilder::new()
//!     .install_base("./mods")
//!     .build();
//! let manager = InstallManager::new(api, config);
//! manager.register_installer(100, installer);
//!
//! let request = InstallRequest::new("./downloads/Foo-1.0.zip")
//!     .with_game("skyrim")
//!     .with_profile("default")
//!     .enable_after_install();
//! let mod_id = manager.install(request).await?;
//! println!("installed {}", mod_id);
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency model
//!
//! Installs are appended to a serial queue: at most one pipeline occupies
//! the user-interactive stages at any moment, so dialogs never interleave.
//! Dependency resolution fans out with bounded parallelism (4 by default)
//! over downloads and metadata, while the actual child installs re-enter
//! the same queue.

pub mod api;
pub mod context;
pub mod core;
pub mod extract;
pub mod instructions;
pub mod model;
pub mod registry;

mod deps;
mod manager;
mod pipeline;
mod queue;

// Re-export commonly used types for convenience
pub use crate::api::{
    Api, CollisionChoice, DependencyGatherer, DependencySummary, DownloadClient, Event, EventBus,
    Frontend, HeadlessFrontend, MetadataLookup, ModStore, Notification, RecommendationItem,
    Severity, UpgradeChoice,
};
pub use crate::context::{InstallContext, InstallStatus};
pub use crate::core::{
    InstallConfig, InstallConfigBuilder, InstallError, IntoProgressCallback, ProgressCallback,
    ProgressEvent, ProgressReporter, Result,
};
pub use crate::extract::{has_archive_extension, ArchiveExtractor, ExtractReport, PasswordPrompt};
pub use crate::instructions::{Instruction, InstructionProcessor, ProcessReport};
pub use crate::manager::{InstallManager, InstallRequest};
pub use crate::model::{
    Dependency, DependencyBatchReport, DependencyError, DownloadInfo, DownloadState, FileListItem,
    GatherOutcome, LookupResult, ModEntry, ModInfo, ModReference, ModRule, ModState, Profile,
    RuleExtra, RuleType,
};
pub use crate::registry::{
    FileListInstaller, InstallerRegistry, ModInstaller, ModTypeProbe, Supported,
};

#[cfg(test)]
mod tests;
