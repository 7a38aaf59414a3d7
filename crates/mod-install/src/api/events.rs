//! Events the install manager publishes on the external bus

use async_trait::async_trait;

use crate::core::Result;
use crate::model::ModInfo;

/// Events emitted by the install manager
///
/// `WillInstallMod` is awaited before any filesystem work begins; the other
/// events are informational, but `emit` is awaited uniformly so subscribers
/// may veto by failing.
#[derive(Debug, Clone)]
pub enum Event {
    WillInstallMod {
        game_id: String,
        archive_id: Option<String>,
        mod_id: String,
        info: ModInfo,
    },
    DidInstallMod {
        game_id: String,
        archive_id: Option<String>,
        mod_id: String,
        info: ModInfo,
    },
    WillInstallDependencies {
        profile_id: String,
        mod_id: String,
        recommended: bool,
    },
    DidInstallDependencies {
        profile_id: String,
        mod_id: String,
        recommended: bool,
    },
    ModsEnabled {
        game_id: String,
        mod_ids: Vec<String>,
        enabled: bool,
    },
}

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn emit(&self, event: Event) -> Result<()>;
}
