//! Recursive dependency and recommendation installation
//!
//! The resolver gathers a mod's `requires` (or `recommends`) rules into
//! concrete dependencies, lets the user confirm, then works through the
//! batch with bounded parallelism. Downloads and metadata run concurrently;
//! the actual installs still serialise because every child install goes
//! through the install queue.

mod rules;

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::api::{
    DependencySummary, Event, Notification, RecommendationItem, Severity,
};
use crate::core::error::InstallError;
use crate::core::Result;
use crate::manager::{InstallManager, InstallRequest};
use crate::model::{
    attr, Dependency, DependencyBatchReport, DownloadState, GatherOutcome, ModInfo, RuleType,
};

/// Install everything a mod's `requires` rules name
pub(crate) async fn install_dependencies(
    manager: &InstallManager,
    profile_id: &str,
    mod_id: &str,
    silent: bool,
) -> Result<DependencyBatchReport> {
    install_rule_set(manager, profile_id, mod_id, false, silent).await
}

/// Offer and install a mod's `recommends` rules
pub(crate) async fn install_recommendations(
    manager: &InstallManager,
    profile_id: &str,
    mod_id: &str,
) -> Result<DependencyBatchReport> {
    install_rule_set(manager, profile_id, mod_id, true, false).await
}

async fn install_rule_set(
    manager: &InstallManager,
    profile_id: &str,
    mod_id: &str,
    recommended: bool,
    silent: bool,
) -> Result<DependencyBatchReport> {
    let api = &manager.api;
    let profile = api
        .store
        .profile(profile_id)
        .ok_or_else(|| InstallError::NotFound(format!("profile '{}'", profile_id)))?;
    let game_id = profile.game_id.clone();

    api.events
        .emit(Event::WillInstallDependencies {
            profile_id: profile_id.to_owned(),
            mod_id: mod_id.to_owned(),
            recommended,
        })
        .await?;

    let result = run_rule_set(manager, profile_id, &game_id, mod_id, recommended, silent).await;

    // the closing event fires on every path, even cancellation
    let _ = api
        .events
        .emit(Event::DidInstallDependencies {
            profile_id: profile_id.to_owned(),
            mod_id: mod_id.to_owned(),
            recommended,
        })
        .await;

    result
}

async fn run_rule_set(
    manager: &InstallManager,
    profile_id: &str,
    game_id: &str,
    mod_id: &str,
    recommended: bool,
    silent: bool,
) -> Result<DependencyBatchReport> {
    let api = &manager.api;
    let entry = api
        .store
        .mod_entry(game_id, mod_id)
        .ok_or_else(|| InstallError::NotFound(format!("mod '{}'", mod_id)))?;

    let wanted = if recommended {
        RuleType::Recommends
    } else {
        RuleType::Requires
    };
    let rules: Vec<_> = entry
        .rules
        .iter()
        .filter(|rule| rule.rule_type == wanted)
        .cloned()
        .collect();
    if rules.is_empty() {
        return Ok(DependencyBatchReport::default());
    }

    let repaired = rules::repair_rules(api, game_id, mod_id, &rules);

    // rule graphs may be cyclic; one visit per reference per batch
    let mut visited: HashSet<String> = HashSet::new();
    let unique: Vec<_> = repaired
        .into_iter()
        .filter(|rule| visited.insert(rule.reference.key()))
        .collect();

    let outcomes = api.gatherer.gather(game_id, &unique, recommended).await?;

    let mut to_install: Vec<Dependency> = Vec::new();
    let mut existing: Vec<Dependency> = Vec::new();
    let mut errors: Vec<String> = Vec::new();
    for outcome in outcomes {
        match outcome {
            GatherOutcome::Resolved(dep) => {
                let already_enabled = dep
                    .existing_mod
                    .as_deref()
                    .map(|id| api.store.is_enabled(profile_id, id))
                    .unwrap_or(false);
                if already_enabled {
                    existing.push(dep);
                } else {
                    to_install.push(dep);
                }
            }
            GatherOutcome::Failed(failure) => {
                warn!(message = %failure.message, "dependency could not be resolved");
                errors.push(failure.message);
            }
        }
    }

    let mut report = DependencyBatchReport::default();
    for dep in &existing {
        if let Some(id) = dep.existing_mod.as_deref() {
            report.reused.push(id.to_owned());
            rules::update_rule(api, game_id, mod_id, &dep.rule, id);
        }
    }

    if to_install.is_empty() && errors.is_empty() {
        return Ok(report);
    }

    let selected = if recommended {
        let items: Vec<RecommendationItem> = to_install
            .iter()
            .map(|dep| RecommendationItem {
                name: display_name(dep),
                downloaded: dep.download.is_some(),
            })
            .collect();
        let picks = api.frontend.select_recommendations(&items).await?;
        to_install
            .into_iter()
            .enumerate()
            .filter(|(index, _)| picks.contains(index))
            .map(|(_, dep)| dep)
            .collect()
    } else {
        if !(silent && errors.is_empty()) {
            let summary = DependencySummary {
                mod_name: mod_id.to_owned(),
                install_count: to_install.len(),
                download_count: to_install
                    .iter()
                    .filter(|dep| needs_download(manager, dep))
                    .count(),
                errors: errors.clone(),
            };
            api.frontend.confirm_dependency_install(&summary).await?;
        }
        to_install
    };

    if selected.is_empty() {
        return Ok(report);
    }

    info!(
        count = selected.len(),
        recommended, "installing dependencies"
    );
    let batch = do_install_dependencies(manager, profile_id, game_id, mod_id, selected).await?;
    report.installed = batch.installed;
    report.dropped = batch.dropped;
    Ok(report)
}

/// Work through the selected dependencies, at most
/// `dependency_concurrency` in flight
async fn do_install_dependencies(
    manager: &InstallManager,
    profile_id: &str,
    game_id: &str,
    source_mod_id: &str,
    dependencies: Vec<Dependency>,
) -> Result<DependencyBatchReport> {
    let api = &manager.api;
    let aborted = Arc::new(AtomicBool::new(false));
    let enabled: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let results: Vec<(Dependency, Result<String>)> = stream::iter(dependencies)
        .map(|dep| {
            let aborted = Arc::clone(&aborted);
            let enabled = Arc::clone(&enabled);
            async move {
                if aborted.load(Ordering::SeqCst) {
                    return (dep, Err(InstallError::UserCanceled));
                }
                let outcome =
                    install_one_dependency(manager, profile_id, game_id, &dep, &enabled).await;
                if matches!(outcome, Err(InstallError::UserCanceled)) {
                    aborted.store(true, Ordering::SeqCst);
                }
                (dep, outcome)
            }
        })
        .buffer_unordered(manager.config.dependency_concurrency)
        .collect()
        .await;

    let mut report = DependencyBatchReport::default();
    let mut canceled = false;
    for (dep, outcome) in &results {
        match outcome {
            Ok(mod_id) => {
                report.installed.push(mod_id.clone());
                rules::update_rule(api, game_id, source_mod_id, &dep.rule, mod_id);
            }
            Err(InstallError::UserCanceled) => {
                canceled = true;
            }
            Err(err @ (InstallError::ProcessCanceled(_) | InstallError::NotFound(_))) => {
                api.frontend.notify(Notification::new(
                    Severity::Warning,
                    "Dependency not installed",
                    format!("{}: {}", display_name(dep), err),
                ));
                report
                    .dropped
                    .push((display_name(dep), err.to_string()));
            }
            Err(err) => {
                api.frontend.notify(Notification::new(
                    Severity::Error,
                    "Failed to install dependency",
                    format!("{}: {}", display_name(dep), err),
                ));
                report
                    .dropped
                    .push((display_name(dep), err.to_string()));
            }
        }
    }

    let enabled_ids = {
        let mut guard = enabled.lock().unwrap();
        std::mem::take(&mut *guard)
    };
    if !enabled_ids.is_empty() {
        let _ = api
            .events
            .emit(Event::ModsEnabled {
                game_id: game_id.to_owned(),
                mod_ids: enabled_ids,
                enabled: true,
            })
            .await;
    }

    if canceled {
        return Err(InstallError::UserCanceled);
    }
    Ok(report)
}

/// Download (if needed), install (if needed), then enable one dependency
async fn install_one_dependency(
    manager: &InstallManager,
    profile_id: &str,
    game_id: &str,
    dep: &Dependency,
    enabled: &Mutex<Vec<String>>,
) -> Result<String> {
    let api = &manager.api;

    let download_id = match dep.download.as_deref() {
        Some(id) => {
            let paused = api
                .store
                .download(id)
                .map(|info| info.state == DownloadState::Paused)
                .unwrap_or(false);
            if paused {
                debug!(download = id, "resuming paused dependency download");
                api.downloads.resume_download(id).await?;
            }
            id.to_owned()
        }
        None => download_dependency(manager, game_id, dep).await?,
    };

    let mod_id = match dep.existing_mod.as_deref() {
        Some(existing) => existing.to_owned(),
        None => {
            let download = api.store.download(&download_id).ok_or_else(|| {
                InstallError::NotFound(format!("download '{}' disappeared", download_id))
            })?;
            let archive_path = download.local_path.ok_or_else(|| {
                InstallError::NotFound(format!("download '{}' has no file yet", download_id))
            })?;

            let mut info = ModInfo::default();
            info.choices = dep.installer_choices.clone();

            let request = InstallRequest::new(archive_path)
                .with_archive_id(download_id)
                .with_game(game_id)
                .forced_game(game_id)
                .with_info(info)
                .with_profile(profile_id)
                .with_choices(dep.installer_choices.clone())
                .with_file_list(dep.file_list.clone())
                .unattended();
            manager.install(request).await?
        }
    };

    api.store.set_enabled(profile_id, &mod_id, true);
    enabled.lock().unwrap().push(mod_id.clone());

    if let Some(ref extra) = dep.extra {
        if let Some(ref mod_type) = extra.mod_type {
            api.store.set_mod_type(game_id, &mod_id, mod_type);
        }
        if let Some(ref name) = extra.name {
            api.store.set_mod_attribute(
                game_id,
                &mod_id,
                attr::CUSTOM_FILE_NAME,
                name.clone().into(),
            );
        }
    }

    Ok(mod_id)
}

/// Start a download for a dependency that has none yet
///
/// A fuzzy version match goes through the repository's update channel so
/// the matching file is chosen server-side; otherwise the lookup result's
/// direct URI is used.
async fn download_dependency(
    manager: &InstallManager,
    game_id: &str,
    dep: &Dependency,
) -> Result<String> {
    let api = &manager.api;
    let lookup = dep.lookup_results.first().ok_or_else(|| {
        InstallError::NotFound(format!("no download source for {}", display_name(dep)))
    })?;

    let fuzzy = dep
        .rule
        .reference
        .version_match
        .as_deref()
        .map(crate::model::is_fuzzy_version)
        .unwrap_or(false);

    if fuzzy {
        if let (Some(repo_mod), Some(file_id)) =
            (lookup.mod_id.as_deref(), lookup.file_id.as_deref())
        {
            let pattern = dep.rule.reference.version_match.as_deref().unwrap_or("*");
            let source = lookup.source.as_deref().unwrap_or("unknown");
            let domain = lookup.domain_name.as_deref().unwrap_or(game_id);
            let ids = api
                .downloads
                .start_download_update(source, domain, repo_mod, file_id, pattern)
                .await?;
            return ids.into_iter().next().ok_or_else(|| {
                InstallError::NotFound(format!("no matching update for {}", display_name(dep)))
            });
        }
    }

    let uri = lookup.source_uri.clone().ok_or_else(|| {
        InstallError::NotFound(format!("no download source for {}", display_name(dep)))
    })?;
    let mut meta = ModInfo::default();
    meta.file_md5 = lookup.file_md5.clone();
    meta.file_size = lookup.file_size;
    meta.download_games = vec![game_id.to_owned()];
    meta.meta = Some(lookup.clone());
    api.downloads.start_download(&[uri], meta).await
}

/// Whether installing the dependency involves a transfer first
fn needs_download(manager: &InstallManager, dep: &Dependency) -> bool {
    match dep.download.as_deref() {
        None => true,
        Some(id) => manager
            .api
            .store
            .download(id)
            .map(|info| info.state != DownloadState::Finished)
            .unwrap_or(true),
    }
}

fn display_name(dep: &Dependency) -> String {
    let reference = &dep.rule.reference;
    dep.extra
        .as_ref()
        .and_then(|extra| extra.name.clone())
        .or_else(|| {
            dep.lookup_results
                .first()
                .and_then(|lookup| lookup.file_name.clone())
        })
        .or_else(|| reference.logical_file_name.clone())
        .or_else(|| reference.file_expression.clone())
        .or_else(|| reference.id.clone())
        .unwrap_or_else(|| "dependency".to_owned())
}
