//! Request-reply capability towards the dialog/notification subsystem
//!
//! Every dialog is a suspension point of exactly one pipeline at a time (the
//! serial queue guarantees it). Dismissing any dialog fails the call with
//! [`InstallError::UserCanceled`], which the pipeline treats as cooperative
//! cancellation.

use async_trait::async_trait;
use std::path::Path;

use crate::core::error::InstallError;
use crate::core::Result;

/// How a name collision gets resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollisionChoice {
    /// Install alongside the existing mod under `<base>+<variant>`
    Variant(String),
    /// Remove the existing mod and keep the id
    Replace,
}

/// How an already-installed older version of the same file gets handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeChoice {
    /// Remove the old version; the new mod inherits id, rules and overrides
    Replace,
    /// Keep both; the new mod gets its own id
    InstallSeparately,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A passive message shown to the user
#[derive(Debug, Clone)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub message: String,
    /// Offer a one-click issue report with this notification
    pub allow_report: bool,
}

impl Notification {
    pub fn new(severity: Severity, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            message: message.into(),
            allow_report: false,
        }
    }

    pub fn reportable(mut self) -> Self {
        self.allow_report = true;
        self
    }
}

/// Counts shown in the dependency confirmation dialog
#[derive(Debug, Clone)]
pub struct DependencySummary {
    pub mod_name: String,
    /// Dependencies that need an install
    pub install_count: usize,
    /// Dependencies that also need a download first
    pub download_count: usize,
    pub errors: Vec<String>,
}

/// One checkbox row in the recommendations dialog
#[derive(Debug, Clone)]
pub struct RecommendationItem {
    pub name: String,
    /// Archive already present, no download needed
    pub downloaded: bool,
}

#[async_trait]
pub trait Frontend: Send + Sync {
    /// Which of the candidate games does this archive belong to
    async fn choose_game(&self, archive_name: &str, candidates: &[String]) -> Result<String>;

    /// A mod with this id already exists; replace it or add a variant
    async fn resolve_name_collision(&self, mod_id: &str) -> Result<CollisionChoice>;

    /// An older version of the same file is installed
    async fn resolve_version_upgrade(&self, existing_mod_id: &str) -> Result<UpgradeChoice>;

    /// The archive is password protected
    async fn request_password(&self, archive: &Path) -> Result<String>;

    /// The extractor reported non-critical errors; resolve to continue.
    /// When `allow_continue` is false the only outcome is cancellation.
    async fn confirm_extraction_errors(
        &self,
        archive_name: &str,
        errors: &[String],
        allow_continue: bool,
    ) -> Result<()>;

    /// The file is not an archive; resolve to install it as a single-file mod
    async fn confirm_single_file_mod(&self, file_name: &str) -> Result<()>;

    /// Install the listed dependencies? Resolve to proceed.
    async fn confirm_dependency_install(&self, summary: &DependencySummary) -> Result<()>;

    /// Which recommendations to install; returns selected indices.
    /// An empty selection means install nothing (and is not an error).
    async fn select_recommendations(&self, items: &[RecommendationItem]) -> Result<Vec<usize>>;

    fn notify(&self, notification: Notification);
}

/// Frontend for unattended contexts: every dialog cancels, notifications go
/// to the log
#[derive(Debug, Default)]
pub struct HeadlessFrontend;

#[async_trait]
impl Frontend for HeadlessFrontend {
    async fn choose_game(&self, _archive_name: &str, candidates: &[String]) -> Result<String> {
        candidates
            .first()
            .cloned()
            .ok_or(InstallError::UserCanceled)
    }

    async fn resolve_name_collision(&self, _mod_id: &str) -> Result<CollisionChoice> {
        Err(InstallError::UserCanceled)
    }

    async fn resolve_version_upgrade(&self, _existing_mod_id: &str) -> Result<UpgradeChoice> {
        Err(InstallError::UserCanceled)
    }

    async fn request_password(&self, _archive: &Path) -> Result<String> {
        Err(InstallError::UserCanceled)
    }

    async fn confirm_extraction_errors(
        &self,
        _archive_name: &str,
        _errors: &[String],
        _allow_continue: bool,
    ) -> Result<()> {
        Err(InstallError::UserCanceled)
    }

    async fn confirm_single_file_mod(&self, _file_name: &str) -> Result<()> {
        Err(InstallError::UserCanceled)
    }

    async fn confirm_dependency_install(&self, _summary: &DependencySummary) -> Result<()> {
        Ok(())
    }

    async fn select_recommendations(&self, _items: &[RecommendationItem]) -> Result<Vec<usize>> {
        Ok(Vec::new())
    }

    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Error => tracing::error!("{}: {}", notification.title, notification.message),
            Severity::Warning => tracing::warn!("{}: {}", notification.title, notification.message),
            Severity::Info => tracing::info!("{}: {}", notification.title, notification.message),
        }
    }
}
