//! Opaque archive extractor interface
//!
//! The actual codec lives outside this crate; the pipeline only needs full
//! extraction with progress, a password hook, and enough error detail to
//! tell a damaged archive from a recoverable warning.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::path::Path;
use std::sync::Arc;

use crate::core::{ProgressCallback, Result};

/// Asks the user for the archive password
///
/// Fails with `UserCanceled` when the prompt is dismissed.
pub type PasswordPrompt = Arc<dyn Fn() -> BoxFuture<'static, Result<String>> + Send + Sync>;

/// Outcome of a full extraction
///
/// `code` follows extractor conventions: 0 success, 1 finished with
/// warnings, 2+ fatal. Messages in `errors` are classified separately
/// because some extractors exit with a benign code while still reporting a
/// broken archive.
#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    pub code: i32,
    pub errors: Vec<String>,
}

impl ExtractReport {
    pub fn ok() -> Self {
        Self::default()
    }

    /// Whether any message indicates the archive itself is damaged
    pub fn has_critical_error(&self) -> bool {
        self.errors.iter().any(|msg| is_critical_message(msg))
    }
}

#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
    /// Extract the whole archive into `dest`
    ///
    /// The destination directory is created if missing. A non-zero `code`
    /// in the report is not an `Err`; only failures to run the extraction
    /// at all are.
    async fn extract_full(
        &self,
        archive: &Path,
        dest: &Path,
        progress: Option<ProgressCallback>,
        password: Option<PasswordPrompt>,
    ) -> Result<ExtractReport>;
}

/// Messages that mean the archive is damaged beyond use
const CRITICAL_PATTERNS: &[&str] = &[
    "unexpected end of archive",
    "data error",
    "cannot open as archive",
];

/// Classify one extractor message
pub fn is_critical_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    CRITICAL_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern))
}

/// Extensions the pipeline treats as true archives
///
/// A file outside this set that fails extraction may instead be offered as
/// a single-file mod.
const ARCHIVE_EXTENSIONS: &[&str] = &[
    "zip", "z01", "7z", "rar", "r00", "001", "bz2", "bzip2", "gz", "gzip", "xz", "z", "lzh",
];

/// Whether the file's extension marks it as an archive
pub fn has_archive_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let lowered = ext.to_lowercase();
            ARCHIVE_EXTENSIONS.contains(&lowered.as_str())
        })
        .unwrap_or(false)
}
