//! Read/write capability over the persistent mod store
//!
//! The install manager never mutates shared structures directly; everything
//! goes through this narrow command interface. Reads are synchronous
//! snapshots; `remove_mod` is awaited because removal cascades outside this
//! subsystem (deployment, profiles) before the pipeline may reuse the id.

use async_trait::async_trait;
use serde_json::Value;

use crate::core::Result;
use crate::model::{DownloadInfo, ModEntry, ModRule, ModState, Profile};

#[async_trait]
pub trait ModStore: Send + Sync {
    /// Snapshot of one mod, if catalogued
    fn mod_entry(&self, game_id: &str, mod_id: &str) -> Option<ModEntry>;

    /// Snapshot of all mods for a game
    fn mods(&self, game_id: &str) -> Vec<ModEntry>;

    /// Snapshot of one managed download
    fn download(&self, download_id: &str) -> Option<DownloadInfo>;

    fn profile(&self, profile_id: &str) -> Option<Profile>;

    /// Whether the profile has the mod enabled
    fn is_enabled(&self, profile_id: &str, mod_id: &str) -> bool;

    /// Catalogue a new mod entry
    fn add_mod(&self, game_id: &str, entry: ModEntry);

    /// Remove a mod and its directory; resolves once removal completed
    async fn remove_mod(&self, game_id: &str, mod_id: &str) -> Result<()>;

    fn set_mod_state(&self, game_id: &str, mod_id: &str, state: ModState);

    fn set_mod_attribute(&self, game_id: &str, mod_id: &str, key: &str, value: Value);

    fn set_mod_type(&self, game_id: &str, mod_id: &str, mod_type: &str);

    fn add_rule(&self, game_id: &str, mod_id: &str, rule: ModRule);

    fn remove_rule(&self, game_id: &str, mod_id: &str, rule: &ModRule);

    fn set_file_overrides(&self, game_id: &str, mod_id: &str, overrides: Vec<String>);

    fn set_enabled(&self, profile_id: &str, mod_id: &str, enabled: bool);
}
