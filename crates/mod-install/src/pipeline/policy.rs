//! Naming and replacement policy
//!
//! Two user-mediated decisions happen before any filesystem work: what to
//! do when the derived mod id is already taken, and what to do when an
//! older version of the same file is installed.

use tracing::debug;

use super::InstallPipeline;
use crate::api::{CollisionChoice, UpgradeChoice};
use crate::core::Result;
use crate::model::attr;

/// Attributes never carried over when replacing a mod; the new install
/// derives them freshly
const REPLACED_ATTRIBUTES: &[&str] = &[attr::VERSION, attr::FILE_NAME, attr::FILE_VERSION];

impl InstallPipeline {
    /// Compute the initial mod id and resolve name collisions
    pub(super) async fn derive_name(&mut self) -> Result<()> {
        let base = self
            .request
            .archive_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_owned());

        let mut candidate = base.clone();
        loop {
            let Some(existing) = self.api.store.mod_entry(&self.game_id, &candidate) else {
                break;
            };
            debug!(mod_id = %candidate, "name collision");
            match self.api.frontend.resolve_name_collision(&candidate).await? {
                CollisionChoice::Variant(variant) => {
                    candidate = format!("{}+{}", base, variant);
                    self.info.variant = Some(variant);
                    // a fresh variant starts disabled and without attributes
                    self.enable_after = false;
                }
                CollisionChoice::Replace => {
                    self.enable_after = self
                        .request
                        .profile_id
                        .as_deref()
                        .map(|profile| self.api.store.is_enabled(profile, &candidate))
                        .unwrap_or(false);
                    for (key, value) in &existing.attributes {
                        if !REPLACED_ATTRIBUTES.contains(&key.as_str()) {
                            self.inherited_attributes.insert(key.clone(), value.clone());
                        }
                    }
                    self.api.store.remove_mod(&self.game_id, &candidate).await?;
                    break;
                }
            }
        }

        self.mod_id = candidate;
        Ok(())
    }

    /// Offer replacement when an older version of this same file is present
    ///
    /// A prior mod counts as an older version when its newest-file pointer
    /// names the file being installed while its own file id differs.
    pub(super) async fn check_version_upgrade(&mut self) -> Result<()> {
        let Some(file_id) = self
            .info
            .meta
            .as_ref()
            .and_then(|meta| meta.file_id.as_deref())
        else {
            return Ok(());
        };

        let prior = self
            .api
            .store
            .mods(&self.game_id)
            .into_iter()
            .find(|entry| {
                entry.id != self.mod_id
                    && entry.attr_str(attr::NEWEST_FILE_ID) == Some(file_id)
                    && entry.attr_str(attr::FILE_ID) != Some(file_id)
            });
        let Some(prior) = prior else {
            return Ok(());
        };

        let prior_enabled = self
            .request
            .profile_id
            .as_deref()
            .map(|profile| self.api.store.is_enabled(profile, &prior.id))
            .unwrap_or(false);

        match self.api.frontend.resolve_version_upgrade(&prior.id).await? {
            UpgradeChoice::Replace => {
                debug!(prior = %prior.id, "replacing older version");
                self.inherited_rules = prior.rules.clone();
                self.inherited_overrides = prior.file_overrides.clone();
                self.enable_after = self.enable_after || prior_enabled;
                self.api.store.remove_mod(&self.game_id, &prior.id).await?;
                self.mod_id = prior.id;
            }
            UpgradeChoice::InstallSeparately => {
                if prior_enabled {
                    self.enable_after = true;
                }
            }
        }
        Ok(())
    }
}
