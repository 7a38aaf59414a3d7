//! Capability towards the metadata lookup service

use async_trait::async_trait;
use std::path::Path;

use crate::core::Result;
use crate::model::LookupResult;

#[async_trait]
pub trait MetadataLookup: Send + Sync {
    /// Look up repository metadata for a local file
    ///
    /// Hash and size are optional; when hashing failed the lookup still runs
    /// on path and game alone.
    async fn lookup(
        &self,
        file_path: &Path,
        file_md5: Option<&str>,
        file_size: Option<u64>,
        game_id: Option<&str>,
    ) -> Result<Vec<LookupResult>>;
}
