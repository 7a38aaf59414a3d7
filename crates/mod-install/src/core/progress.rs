//! Progress tracking and reporting for install operations

use std::sync::Arc;

/// Progress callback for install operations
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Events emitted while a pipeline advances
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Archive extraction progress, 0-100
    Extraction { archive: String, percent: u8 },
    /// Installer / instruction processing progress, 0-100
    Install { mod_id: String, percent: u8 },
    /// Dependency batch progress
    Dependencies {
        mod_id: String,
        resolved: usize,
        total: usize,
    },
}

/// Trait for progress reporting with more granular control
///
/// All methods default to no-ops so reporters only implement what they
/// care about.
pub trait ProgressReporter: Send + Sync {
    fn on_extraction(&self, _archive: &str, _percent: u8) {}
    fn on_install(&self, _mod_id: &str, _percent: u8) {}
    fn on_dependencies(&self, _mod_id: &str, _resolved: usize, _total: usize) {}
}

/// Extension trait to convert a ProgressReporter into a ProgressCallback
pub trait IntoProgressCallback {
    fn into_callback(self) -> ProgressCallback;
}

impl<T: ProgressReporter + 'static> IntoProgressCallback for T {
    fn into_callback(self) -> ProgressCallback {
        Arc::new(move |event| match event {
            ProgressEvent::Extraction { archive, percent } => self.on_extraction(&archive, percent),
            ProgressEvent::Install { mod_id, percent } => self.on_install(&mod_id, percent),
            ProgressEvent::Dependencies {
                mod_id,
                resolved,
                total,
            } => self.on_dependencies(&mod_id, resolved, total),
        })
    }
}

/// Progress reporter that does nothing
#[derive(Debug, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {}
