//! Capability that matches dependency rules against available sources
//!
//! Gathering is repository-aware (it consults lookup results, downloads and
//! installed mods), so it lives outside this crate. The resolver hands it a
//! rule list and receives dependencies ready for download/install, or
//! per-rule errors.

use async_trait::async_trait;

use crate::core::Result;
use crate::model::{GatherOutcome, ModRule};

#[async_trait]
pub trait DependencyGatherer: Send + Sync {
    /// Resolve rules into concrete dependencies
    ///
    /// `recommended` distinguishes `recommends` gathering from `requires`;
    /// the outcomes are shaped identically either way.
    async fn gather(
        &self,
        game_id: &str,
        rules: &[ModRule],
        recommended: bool,
    ) -> Result<Vec<GatherOutcome>>;
}
