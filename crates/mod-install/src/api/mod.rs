//! External capabilities the install manager is wired up with
//!
//! All collaborators outside this subsystem (the persistent store, the
//! dialog frontend, the download manager, metadata lookup, the archive
//! extractor, and the dependency gatherer) are expressed as trait objects
//! bundled into one cheaply-clonable [`Api`] handle.

pub mod downloads;
pub mod events;
pub mod frontend;
pub mod gather;
pub mod lookup;
pub mod store;

pub use downloads::DownloadClient;
pub use events::{Event, EventBus};
pub use frontend::{
    CollisionChoice, DependencySummary, Frontend, HeadlessFrontend, Notification,
    RecommendationItem, Severity, UpgradeChoice,
};
pub use gather::DependencyGatherer;
pub use lookup::MetadataLookup;
pub use store::ModStore;

use std::sync::Arc;

use crate::extract::ArchiveExtractor;

/// Bundle of all external capabilities
#[derive(Clone)]
pub struct Api {
    pub store: Arc<dyn ModStore>,
    pub events: Arc<dyn EventBus>,
    pub frontend: Arc<dyn Frontend>,
    pub downloads: Arc<dyn DownloadClient>,
    pub lookup: Arc<dyn MetadataLookup>,
    pub extractor: Arc<dyn ArchiveExtractor>,
    pub gatherer: Arc<dyn DependencyGatherer>,
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api").finish_non_exhaustive()
    }
}
