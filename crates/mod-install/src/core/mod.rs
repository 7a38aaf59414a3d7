//! Core types used throughout the install subsystem
//!
//! This module contains the fundamental types that all other modules depend
//! on: the error taxonomy, progress reporting, and configuration.

pub mod config;
pub mod error;
pub mod progress;

pub use config::{InstallConfig, InstallConfigBuilder};
pub use error::{InstallError, Result};
pub use progress::{
    IntoProgressCallback, NullProgressReporter, ProgressCallback, ProgressEvent, ProgressReporter,
};
