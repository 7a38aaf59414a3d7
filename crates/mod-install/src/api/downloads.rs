//! Capability towards the download manager
//!
//! The transfer machinery is external; the resolver only needs to start,
//! resume, and watch downloads by id.

use async_trait::async_trait;

use crate::core::Result;
use crate::model::ModInfo;

#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Start a download from the given mirror URLs; resolves to a download id
    async fn start_download(&self, urls: &[String], meta: ModInfo) -> Result<String>;

    /// Ask the repository for the file matching `version_pattern` and
    /// download it; resolves to the download ids it produced
    async fn start_download_update(
        &self,
        source: &str,
        domain: &str,
        mod_id: &str,
        file_id: &str,
        version_pattern: &str,
    ) -> Result<Vec<String>>;

    /// Resume a paused download; resolves when the transfer finished
    async fn resume_download(&self, download_id: &str) -> Result<()>;
}
