//! The per-archive install pipeline
//!
//! A pipeline advances linearly from game resolution through extraction,
//! installer selection and instruction processing to the catalogued mod.
//! Once a step begins it either completes or fails the whole pipeline;
//! cleanup is unified in one place so every exit path removes the staging
//! directory and closes the install context exactly once.

mod policy;

use futures::future::BoxFuture;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::api::{Api, Event, Notification, Severity};
use crate::context::{InstallContext, InstallStatus};
use crate::core::error::InstallError;
use crate::core::{InstallConfig, ProgressCallback, ProgressEvent, Result};
use crate::extract::{has_archive_extension, PasswordPrompt};
use crate::instructions::{Instruction, InstructionProcessor, Submodule};
use crate::manager::InstallRequest;
use crate::model::{ModInfo, ModRule};
use crate::registry::{FileListInstaller, InstallerRegistry, ModInstaller};

/// States of the pipeline, advanced one at a time by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    ResolveGame,
    Hash,
    LookupMeta,
    DeriveName,
    VersionChoice,
    StartContext,
    Extract,
    Enumerate,
    SelectInstaller,
    RunInstaller,
    DetermineModType,
    ProcessInstructions,
    Finalize,
}

pub(crate) struct InstallPipeline {
    api: Api,
    config: Arc<InstallConfig>,
    registry: Arc<InstallerRegistry>,
    request: InstallRequest,

    // working state, filled in as steps complete
    game_id: String,
    info: ModInfo,
    mod_id: String,
    enable_after: bool,
    inherited_attributes: serde_json::Map<String, serde_json::Value>,
    inherited_rules: Vec<ModRule>,
    inherited_overrides: Vec<String>,
    destination: PathBuf,
    temp_path: PathBuf,
    context: Option<Arc<InstallContext>>,
    files: Vec<String>,
    installer: Option<Arc<dyn ModInstaller>>,
    instructions: Vec<Instruction>,
}

impl InstallPipeline {
    pub fn new(
        api: Api,
        config: Arc<InstallConfig>,
        registry: Arc<InstallerRegistry>,
        request: InstallRequest,
    ) -> Self {
        let info = request.info.clone();
        Self {
            api,
            config,
            registry,
            request,
            game_id: String::new(),
            info,
            mod_id: String::new(),
            enable_after: false,
            inherited_attributes: serde_json::Map::new(),
            inherited_rules: Vec::new(),
            inherited_overrides: Vec::new(),
            destination: PathBuf::new(),
            temp_path: PathBuf::new(),
            context: None,
            files: Vec::new(),
            installer: None,
            instructions: Vec::new(),
        }
    }

    fn archive_name(&self) -> String {
        self.request
            .archive_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.request.archive_path.display().to_string())
    }

    /// Run the pipeline to its terminal state
    pub async fn run(mut self) -> Result<String> {
        info!(archive = %self.archive_name(), "install started");
        let result = self.drive().await;
        match result {
            Ok(mod_id) => {
                info!(%mod_id, "install finished");
                Ok(mod_id)
            }
            Err(err) => {
                self.handle_failure(&err).await;
                Err(err)
            }
        }
    }

    async fn drive(&mut self) -> Result<String> {
        let mut step = Step::ResolveGame;
        loop {
            debug!(?step, "pipeline step");
            step = match step {
                Step::ResolveGame => {
                    self.resolve_game().await?;
                    Step::Hash
                }
                Step::Hash => {
                    self.hash_archive().await;
                    Step::LookupMeta
                }
                Step::LookupMeta => {
                    self.lookup_meta().await;
                    Step::DeriveName
                }
                Step::DeriveName => {
                    self.derive_name().await?;
                    Step::VersionChoice
                }
                Step::VersionChoice => {
                    self.check_version_upgrade().await?;
                    Step::StartContext
                }
                Step::StartContext => {
                    self.start_context().await?;
                    Step::Extract
                }
                Step::Extract => {
                    self.extract().await?;
                    Step::Enumerate
                }
                Step::Enumerate => {
                    self.files = enumerate_files(&self.temp_path).await?;
                    Step::SelectInstaller
                }
                Step::SelectInstaller => {
                    self.select_installer().await?;
                    Step::RunInstaller
                }
                Step::RunInstaller => {
                    self.run_installer().await?;
                    Step::DetermineModType
                }
                Step::DetermineModType => {
                    self.determine_mod_type().await?;
                    Step::ProcessInstructions
                }
                Step::ProcessInstructions => {
                    self.process_instructions().await?;
                    Step::Finalize
                }
                Step::Finalize => {
                    return self.finalize().await;
                }
            };
        }
    }

    /// Decide which game this archive belongs to
    async fn resolve_game(&mut self) -> Result<()> {
        if let Some(ref forced) = self.request.force_game_id {
            self.game_id = forced.clone();
            return Ok(());
        }

        let mut candidates = self.request.download_games.clone();
        if let Some(ref archive_id) = self.request.archive_id {
            if let Some(download) = self.api.store.download(archive_id) {
                for game in download.game_ids {
                    if !candidates.contains(&game) {
                        candidates.push(game);
                    }
                }
            }
        }

        self.game_id = match candidates.len() {
            0 => {
                return Err(InstallError::ProcessCanceled(
                    "unable to determine the game this archive belongs to".into(),
                ))
            }
            1 => candidates.remove(0),
            _ => {
                self.api
                    .frontend
                    .choose_game(&self.archive_name(), &candidates)
                    .await?
            }
        };
        Ok(())
    }

    /// Compute archive MD5 and size; failures are non-fatal
    async fn hash_archive(&mut self) {
        if self.info.file_md5.is_none() {
            if let Some(ref archive_id) = self.request.archive_id {
                if let Some(download) = self.api.store.download(archive_id) {
                    self.info.file_md5 = download.file_md5;
                    self.info.file_size = self.info.file_size.or(download.size);
                }
            }
        }
        if self.info.file_md5.is_some() {
            return;
        }
        match compute_md5(&self.request.archive_path).await {
            Ok((md5, size)) => {
                self.info.file_md5 = Some(md5);
                self.info.file_size = Some(size);
            }
            Err(err) => {
                warn!(archive = %self.archive_name(), %err, "hashing failed, continuing without");
            }
        }
    }

    /// Ask the metadata service about the archive; the first result merges
    /// in as `meta`. Failures are non-fatal.
    async fn lookup_meta(&mut self) {
        let game = self.request.download_games.first().map(String::as_str);
        let lookup = self
            .api
            .lookup
            .lookup(
                &self.request.archive_path,
                self.info.file_md5.as_deref(),
                self.info.file_size,
                game,
            )
            .await;
        match lookup {
            Ok(results) => {
                if let Some(first) = results.into_iter().next() {
                    self.info.meta = Some(first);
                }
            }
            Err(err) => {
                warn!(archive = %self.archive_name(), %err, "metadata lookup failed");
            }
        }
    }

    /// Create the context and stake out the directories
    async fn start_context(&mut self) -> Result<()> {
        self.destination = self.config.mod_dir(&self.game_id, &self.mod_id);
        self.temp_path = self.config.staging_dir(&self.game_id, &self.mod_id);

        // awaited before any filesystem work
        self.api
            .events
            .emit(Event::WillInstallMod {
                game_id: self.game_id.clone(),
                archive_id: self.request.archive_id.clone(),
                mod_id: self.mod_id.clone(),
                info: self.info.clone(),
            })
            .await?;

        let context = Arc::new(InstallContext::new(
            self.api.clone(),
            &self.game_id,
            self.request.progress.clone(),
        ));
        context.start_indicator("installing");
        context.start_install(&self.mod_id, self.request.archive_id.as_deref());
        context.set_install_path(&self.destination);
        self.context = Some(context);

        // a staging directory from a crashed earlier run would poison this one
        match fs::remove_dir_all(&self.temp_path).await {
            Ok(()) => warn!(path = %self.temp_path.display(), "removed stale staging directory"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(InstallError::fs(&self.temp_path, err)),
        }
        fs::create_dir_all(&self.temp_path)
            .await
            .map_err(|err| InstallError::fs(&self.temp_path, err))?;
        Ok(())
    }

    /// Extract the archive into the staging directory
    async fn extract(&mut self) -> Result<()> {
        let context = Arc::clone(self.context.as_ref().expect("context started"));
        let progress: ProgressCallback = Arc::new(move |event| {
            if let ProgressEvent::Extraction { percent, .. } = event {
                context.set_progress(percent);
            }
        });

        let frontend = Arc::clone(&self.api.frontend);
        let archive = self.request.archive_path.clone();
        let password: PasswordPrompt = Arc::new(move || {
            let frontend = Arc::clone(&frontend);
            let archive = archive.clone();
            Box::pin(async move { frontend.request_password(&archive).await })
        });

        let outcome = self
            .api
            .extractor
            .extract_full(
                &self.request.archive_path,
                &self.temp_path,
                Some(progress),
                Some(password),
            )
            .await;

        let broken = match outcome {
            Ok(report) if report.has_critical_error() => Some(report.errors.join(", ")),
            Ok(report) => {
                if report.code != 0 {
                    // warnings are survivable if the user says so; anything
                    // worse only offers cancellation
                    let allow_continue = report.code == 1;
                    self.api
                        .frontend
                        .confirm_extraction_errors(
                            &self.archive_name(),
                            &report.errors,
                            allow_continue,
                        )
                        .await?;
                }
                None
            }
            Err(InstallError::ArchiveBroken(message)) => Some(message),
            Err(err) => return Err(err),
        };

        let Some(message) = broken else {
            return Ok(());
        };

        // a file that never was an archive can still become a single-file mod
        if has_archive_extension(&self.request.archive_path) {
            return Err(InstallError::ArchiveBroken(message));
        }
        let file_name = self.archive_name();
        self.api.frontend.confirm_single_file_mod(&file_name).await?;
        fs::create_dir_all(&self.temp_path)
            .await
            .map_err(|err| InstallError::fs(&self.temp_path, err))?;
        let target = self.temp_path.join(&file_name);
        fs::copy(&self.request.archive_path, &target)
            .await
            .map_err(|err| InstallError::fs(&target, err))?;
        Ok(())
    }

    /// Pick the installer: an explicit file list bypasses the registry
    async fn select_installer(&mut self) -> Result<()> {
        if let Some(ref file_list) = self.request.file_list {
            self.installer = Some(Arc::new(FileListInstaller::new(file_list.clone())));
            return Ok(());
        }
        match self.registry.find(&self.files, &self.game_id).await? {
            Some((installer, _support)) => {
                self.installer = Some(installer);
                Ok(())
            }
            None => Err(InstallError::Setup(
                "no installer is able to handle this archive".into(),
            )),
        }
    }

    async fn run_installer(&mut self) -> Result<()> {
        let installer = Arc::clone(self.installer.as_ref().expect("installer selected"));
        let context = Arc::clone(self.context.as_ref().expect("context started"));
        let progress: ProgressCallback = Arc::new(move |event| {
            if let ProgressEvent::Install { percent, .. } = event {
                context.set_progress(percent);
            }
        });

        let result = installer
            .install(
                &self.files,
                &self.temp_path,
                &self.game_id,
                Some(progress),
                self.request.choices.as_ref(),
                self.request.unattended,
            )
            .await?;

        match result {
            // the installer surfaced its own error dialog already
            None => Err(InstallError::UserCanceled),
            Some(instructions) if instructions.is_empty() => Err(InstallError::ProcessCanceled(
                "empty archive or no options selected".into(),
            )),
            Some(instructions) => {
                self.instructions = instructions;
                Ok(())
            }
        }
    }

    /// Consult mod-type probes unless the instructions name a type already
    async fn determine_mod_type(&mut self) -> Result<()> {
        let has_explicit = self
            .instructions
            .iter()
            .any(|instruction| matches!(instruction, Instruction::SetModType(_)));
        if has_explicit {
            return Ok(());
        }
        let already_typed = self
            .api
            .store
            .mod_entry(&self.game_id, &self.mod_id)
            .map(|entry| !entry.mod_type.is_empty())
            .unwrap_or(false);
        if already_typed {
            return Ok(());
        }

        let mod_type = self
            .registry
            .determine_mod_type(&self.game_id, &self.instructions)
            .await?;
        if !mod_type.is_empty() {
            let context = self.context.as_ref().expect("context started");
            context.set_mod_type(&self.mod_id, &mod_type);
        }
        Ok(())
    }

    async fn process_instructions(&self) -> Result<()> {
        fs::create_dir_all(&self.destination)
            .await
            .map_err(|err| InstallError::fs(&self.destination, err))?;

        let context = Arc::clone(self.context.as_ref().expect("context started"));
        let progress: ProgressCallback = Arc::new(move |event| {
            if let ProgressEvent::Install { percent, .. } = event {
                context.set_progress(percent);
            }
        });

        let processor = InstructionProcessor::new(
            &self.api,
            &self.game_id,
            &self.mod_id,
            self.info.file_md5.as_deref(),
            &self.temp_path,
            &self.destination,
        );

        let api = &self.api;
        let registry = &self.registry;
        let game_id = &self.game_id;
        let destination = &self.destination;
        let unattended = self.request.unattended;
        let handler = move |submodule: Submodule| {
            install_nested(api, registry, game_id, destination, submodule, unattended)
        };

        processor
            .process(self.instructions.clone(), Some(progress), &handler)
            .await?;
        Ok(())
    }

    /// Promote the staged install to a catalogued mod
    async fn finalize(&mut self) -> Result<String> {
        remove_staging(&self.api, &self.temp_path).await;

        for rule in self.inherited_rules.drain(..) {
            self.api.store.add_rule(&self.game_id, &self.mod_id, rule);
        }
        if !self.inherited_overrides.is_empty() {
            self.api.store.set_file_overrides(
                &self.game_id,
                &self.mod_id,
                std::mem::take(&mut self.inherited_overrides),
            );
        }
        for (key, value) in std::mem::take(&mut self.inherited_attributes) {
            self.api
                .store
                .set_mod_attribute(&self.game_id, &self.mod_id, &key, value);
        }

        let context = self.context.as_ref().expect("context started");
        context
            .finish_install(InstallStatus::Success, Some(&self.info))
            .await;

        if self.request.enable || self.enable_after {
            if let Some(ref profile_id) = self.request.profile_id {
                self.api.store.set_enabled(profile_id, &self.mod_id, true);
                let _ = self
                    .api
                    .events
                    .emit(Event::ModsEnabled {
                        game_id: self.game_id.clone(),
                        mod_ids: vec![self.mod_id.clone()],
                        enabled: true,
                    })
                    .await;
            }
        }

        let _ = self
            .api
            .events
            .emit(Event::DidInstallMod {
                game_id: self.game_id.clone(),
                archive_id: self.request.archive_id.clone(),
                mod_id: self.mod_id.clone(),
                info: self.info.clone(),
            })
            .await;

        context.stop_indicator();
        Ok(self.mod_id.clone())
    }

    /// Unified failure path: clear the staging tree, withdraw the partial
    /// install, close the context, tell the user what applies
    async fn handle_failure(&mut self, err: &InstallError) {
        if !self.temp_path.as_os_str().is_empty() {
            remove_staging(&self.api, &self.temp_path).await;
        }
        if !self.destination.as_os_str().is_empty() {
            if let Err(remove_err) = fs::remove_dir_all(&self.destination).await {
                if remove_err.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.destination.display(), %remove_err, "could not remove partial install");
                }
            }
        }

        self.notify_failure(err);

        if let Some(context) = self.context.take() {
            let status = match err {
                InstallError::UserCanceled
                | InstallError::ProcessCanceled(_)
                | InstallError::Temporary(_) => InstallStatus::Canceled,
                _ => InstallStatus::Failed,
            };
            context.finish_install(status, None).await;
            context.stop_indicator();
        }
    }

    fn notify_failure(&self, err: &InstallError) {
        let archive = self.archive_name();
        match err {
            InstallError::UserCanceled => {}
            InstallError::ProcessCanceled(reason) => {
                self.api.frontend.notify(Notification::new(
                    Severity::Warning,
                    "Installation canceled",
                    reason.clone(),
                ));
            }
            InstallError::Temporary(reason) => {
                self.api.frontend.notify(Notification::new(
                    Severity::Warning,
                    "Installation failed, please try again",
                    reason.clone(),
                ));
            }
            InstallError::ArchiveBroken(reason) => {
                self.api.frontend.notify(Notification::new(
                    Severity::Error,
                    "Installation failed",
                    format!(
                        "The archive \"{}\" is damaged ({}). Please re-download it.",
                        archive, reason
                    ),
                ));
            }
            InstallError::Setup(reason) => {
                self.api.frontend.notify(Notification::new(
                    Severity::Error,
                    "Installation failed",
                    reason.clone(),
                ));
            }
            InstallError::DataInvalid(reason) => {
                self.api.frontend.notify(Notification::new(
                    Severity::Error,
                    "Installation failed",
                    format!(
                        "The installer for \"{}\" is invalid, please inform its author: {}",
                        archive, reason
                    ),
                ));
            }
            InstallError::NotFound(reason) => {
                self.api.frontend.notify(Notification::new(
                    Severity::Error,
                    "Installation failed",
                    reason.clone(),
                ));
            }
            other => {
                let mut body = other.to_string();
                if let Some(ref md5) = self.info.file_md5 {
                    body.push_str(&format!(" (archive hash {})", md5));
                }
                if let Some(ref context) = self.context {
                    context.report_error("Installation failed", &body, true);
                } else {
                    self.api.frontend.notify(
                        Notification::new(Severity::Error, "Installation failed", body)
                            .reportable(),
                    );
                }
            }
        }
    }
}

/// Install a nested archive into the parent mod
///
/// Runs the extract / enumerate / select / run / process sequence against
/// a nested temp directory; resolves to the mod type the submodule wants
/// for its parent.
fn install_nested<'a>(
    api: &'a Api,
    registry: &'a InstallerRegistry,
    game_id: &'a str,
    destination: &'a Path,
    submodule: Submodule,
    unattended: bool,
) -> BoxFuture<'a, Result<Option<String>>> {
    Box::pin(async move {
        let mut nested_name = destination.as_os_str().to_owned();
        nested_name.push(format!(".{}.installing", submodule.key));
        let nested_temp = PathBuf::from(nested_name);

        let outcome = api
            .extractor
            .extract_full(&submodule.path, &nested_temp, None, None)
            .await;
        let report = match outcome {
            Ok(report) => report,
            Err(err) => {
                let _ = fs::remove_dir_all(&nested_temp).await;
                return Err(err);
            }
        };
        if report.has_critical_error() {
            let _ = fs::remove_dir_all(&nested_temp).await;
            return Err(InstallError::ArchiveBroken(report.errors.join(", ")));
        }

        let result = async {
            let files = enumerate_files(&nested_temp).await?;
            let Some((installer, _)) = registry.find(&files, game_id).await? else {
                return Err(InstallError::Setup(format!(
                    "no installer is able to handle the nested archive '{}'",
                    submodule.path.display()
                )));
            };
            let instructions = installer
                .install(&files, &nested_temp, game_id, None, None, unattended)
                .await?
                .ok_or(InstallError::UserCanceled)?;
            if instructions.is_empty() {
                return Err(InstallError::ProcessCanceled(
                    "nested archive had nothing to install".into(),
                ));
            }

            let mod_id = submodule.key.clone();
            let processor = InstructionProcessor::new(
                api,
                game_id,
                &mod_id,
                None,
                &nested_temp,
                destination,
            );
            let handler = move |nested: Submodule| {
                install_nested(api, registry, game_id, destination, nested, unattended)
            };
            processor
                .process(instructions, None, &handler)
                .await
                .map(|_| ())
        }
        .await;

        let _ = fs::remove_dir_all(&nested_temp).await;
        result.map(|()| submodule.submodule_type)
    })
}

/// Remove a staging directory, guiding the user when it will not go away
async fn remove_staging(api: &Api, temp_path: &Path) {
    match fs::remove_dir_all(temp_path).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            warn!(path = %temp_path.display(), %err, "could not remove staging directory");
            api.frontend.notify(Notification::new(
                Severity::Warning,
                "Cleanup incomplete",
                format!(
                    "The staging directory \"{}\" could not be removed ({}). \
                     Please remove it manually.",
                    temp_path.display(),
                    err
                ),
            ));
        }
    }
}

/// Walk the extraction tree into a list of relative paths
///
/// Directories are included with a trailing separator; some installers key
/// their stop-folder heuristics off it.
pub(crate) async fn enumerate_files(root: &Path) -> Result<Vec<String>> {
    let mut entries = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut read_dir = fs::read_dir(&dir)
            .await
            .map_err(|err| InstallError::fs(&dir, err))?;
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|err| InstallError::fs(&dir, err))?
        {
            let path = entry.path();
            let relative = path
                .strip_prefix(root)
                .expect("walked entries stay under the root")
                .to_string_lossy()
                .into_owned();
            let is_dir = entry
                .file_type()
                .await
                .map(|kind| kind.is_dir())
                .unwrap_or(false);
            if is_dir {
                entries.push(format!("{}{}", relative, std::path::MAIN_SEPARATOR));
                pending.push(path);
            } else {
                entries.push(relative);
            }
        }
    }
    entries.sort();
    Ok(entries)
}

/// Hash the archive without blocking the runtime
pub(crate) async fn compute_md5(path: &Path) -> Result<(String, u64)> {
    let path = path.to_owned();
    tokio::task::spawn_blocking(move || {
        let mut file = std::fs::File::open(&path).map_err(|err| InstallError::fs(&path, err))?;
        let mut hasher = md5::Context::new();
        let mut buffer = [0u8; 64 * 1024];
        let mut size = 0u64;
        loop {
            let read = file
                .read(&mut buffer)
                .map_err(|err| InstallError::fs(&path, err))?;
            if read == 0 {
                break;
            }
            hasher.consume(&buffer[..read]);
            size += read as u64;
        }
        Ok((format!("{:x}", hasher.compute()), size))
    })
    .await
    .map_err(InstallError::other)?
}
