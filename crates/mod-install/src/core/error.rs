//! Error types for the install subsystem with classification helpers

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while installing a mod
///
/// Every failure path of the pipeline, the instruction processor and the
/// dependency resolver collapses into one of these variants. The variant
/// decides how the failure is surfaced: whether the install context finishes
/// as `canceled` or `failed`, and whether the user is offered a report action.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The user dismissed a dialog (game choice, password, collision, ...)
    #[error("canceled by user")]
    UserCanceled,

    /// Policy refusal: no game resolved, empty archive, fatal installer error
    #[error("install canceled: {0}")]
    ProcessCanceled(String),

    /// Transient failure, retrying later may succeed
    #[error("temporary failure: {0}")]
    Temporary(String),

    /// The extractor reported a critical, unrecoverable archive defect
    #[error("archive is damaged: {0}")]
    ArchiveBroken(String),

    /// No installer available or the environment is wrong for one
    #[error("setup error: {0}")]
    Setup(String),

    /// An installer produced data this pipeline cannot act on
    #[error("installer produced invalid data: {0}")]
    DataInvalid(String),

    /// A dependency source could not be located
    #[error("not found: {0}")]
    NotFound(String),

    /// File system failure with path context
    #[error("file operation failed on '{path}'")]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else; the only reportable kind
    #[error("installation failed: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, InstallError>;

impl InstallError {
    /// Wrap a filesystem error together with the path it happened on
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InstallError::FileSystem {
            path: path.into(),
            source,
        }
    }

    pub fn other<E: std::fmt::Display>(err: E) -> Self {
        InstallError::Other(err.to_string())
    }

    /// True for the two cooperative cancellation kinds
    ///
    /// A cancellation short-circuits the pipeline but is not an error the
    /// user needs to be told about beyond the context status.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            InstallError::UserCanceled | InstallError::ProcessCanceled(_)
        )
    }

    /// Whether the failure should carry a one-click report action
    ///
    /// Everything with a known cause is kept non-reportable; only genuinely
    /// unexpected failures are worth a report.
    pub fn is_reportable(&self) -> bool {
        matches!(
            self,
            InstallError::Other(_) | InstallError::Io(_) | InstallError::FileSystem { .. }
        )
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            InstallError::UserCanceled => "user_canceled",
            InstallError::ProcessCanceled(_) => "process_canceled",
            InstallError::Temporary(_) => "temporary",
            InstallError::ArchiveBroken(_) => "archive_broken",
            InstallError::Setup(_) => "setup",
            InstallError::DataInvalid(_) => "data_invalid",
            InstallError::NotFound(_) => "not_found",
            InstallError::FileSystem { .. } => "file_system",
            InstallError::Io(_) => "io",
            InstallError::Other(_) => "unknown",
        }
    }
}
