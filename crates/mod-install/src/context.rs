//! Per-install progress and status reporting
//!
//! One context exists per pipeline run, created when the pipeline starts
//! and closed on every exit path. It owns the catalogue entry for the mod
//! while the install is in flight: the entry is created in `installing`
//! state, promoted on success, and withdrawn on cancel or failure.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::api::{Api, Notification, Severity};
use crate::core::{ProgressCallback, ProgressEvent};
use crate::model::{attr, ModEntry, ModInfo, ModState};

/// Terminal status of an install
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    Started,
    Success,
    Failed,
    Canceled,
}

/// Advisory shown instead of errors caused by a known foreign interference
const BROWSER_ASSISTANT_MARKER: &str = "Roaming\\Browser Assistant";
const BROWSER_ASSISTANT_ADVICE: &str = "The installation failed due to an external application \
     (\"Browser Assistant\") interfering with file operations. Please remove it and try again.";

#[derive(Debug)]
struct ContextState {
    mod_id: Option<String>,
    archive_id: Option<String>,
    indicator: Option<String>,
    install_path: Option<std::path::PathBuf>,
    progress: u8,
    status: InstallStatus,
    finished: bool,
}

/// Progress/indicator/error reporter bound to a game and mod id
pub struct InstallContext {
    api: Api,
    game_id: String,
    progress_callback: Option<ProgressCallback>,
    state: Mutex<ContextState>,
}

impl InstallContext {
    pub fn new(api: Api, game_id: &str, progress_callback: Option<ProgressCallback>) -> Self {
        Self {
            api,
            game_id: game_id.to_owned(),
            progress_callback,
            state: Mutex::new(ContextState {
                mod_id: None,
                archive_id: None,
                indicator: None,
                install_path: None,
                progress: 0,
                status: InstallStatus::Started,
                finished: false,
            }),
        }
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    /// Show a busy indicator for the named activity
    pub fn start_indicator(&self, name: &str) {
        debug!(activity = name, "install activity started");
        self.state.lock().unwrap().indicator = Some(name.to_owned());
    }

    pub fn stop_indicator(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(name) = state.indicator.take() {
            debug!(activity = %name, "install activity finished");
        }
    }

    /// Catalogue the mod in `installing` state and bind this context to it
    pub fn start_install(&self, mod_id: &str, archive_id: Option<&str>) {
        let mut entry = ModEntry::new(mod_id, ModState::Installing);
        entry.archive_id = archive_id.map(str::to_owned);
        self.api.store.add_mod(&self.game_id, entry);

        let mut state = self.state.lock().unwrap();
        state.mod_id = Some(mod_id.to_owned());
        state.archive_id = archive_id.map(str::to_owned);
        state.status = InstallStatus::Started;
    }

    pub fn set_install_path(&self, path: &std::path::Path) {
        self.state.lock().unwrap().install_path = Some(path.to_owned());
    }

    /// Update install progress; only whole-percent changes are forwarded
    pub fn set_progress(&self, percent: u8) {
        let mut state = self.state.lock().unwrap();
        let clamped = percent.min(100);
        if clamped == state.progress {
            return;
        }
        state.progress = clamped;
        let mod_id = state.mod_id.clone().unwrap_or_default();
        drop(state);

        if let Some(ref callback) = self.progress_callback {
            callback(ProgressEvent::Install {
                mod_id,
                percent: clamped,
            });
        }
    }

    pub fn set_mod_type(&self, mod_id: &str, mod_type: &str) {
        self.api.store.set_mod_type(&self.game_id, mod_id, mod_type);
    }

    /// Surface an install error to the user
    pub fn report_error(&self, title: &str, body: &str, allow_report: bool) {
        let message = if body.contains(BROWSER_ASSISTANT_MARKER) {
            BROWSER_ASSISTANT_ADVICE.to_owned()
        } else {
            body.to_owned()
        };
        let mut notification = Notification::new(Severity::Error, title, message);
        if allow_report {
            notification = notification.reportable();
        }
        self.api.frontend.notify(notification);
    }

    /// Close the context; called exactly once on every exit path
    ///
    /// Success promotes the catalogue entry and persists the info bag as
    /// attributes; any other status withdraws the entry.
    pub async fn finish_install(&self, status: InstallStatus, info: Option<&ModInfo>) {
        let (mod_id, already_finished) = {
            let mut state = self.state.lock().unwrap();
            let already = state.finished;
            state.finished = true;
            state.status = status;
            (state.mod_id.clone(), already)
        };
        if already_finished {
            warn!("finish_install called more than once");
            return;
        }
        let Some(mod_id) = mod_id else {
            return;
        };

        match status {
            InstallStatus::Success => {
                if let Some(info) = info {
                    self.persist_attributes(&mod_id, info);
                }
                self.api
                    .store
                    .set_mod_state(&self.game_id, &mod_id, ModState::Installed);
            }
            InstallStatus::Failed | InstallStatus::Canceled => {
                if let Err(err) = self.api.store.remove_mod(&self.game_id, &mod_id).await {
                    warn!(%mod_id, %err, "failed to withdraw incomplete mod entry");
                }
            }
            InstallStatus::Started => {}
        }
    }

    fn persist_attributes(&self, mod_id: &str, info: &ModInfo) {
        let store = &self.api.store;
        if let Some(ref md5) = info.file_md5 {
            store.set_mod_attribute(&self.game_id, mod_id, attr::FILE_MD5, md5.clone().into());
        }
        if let Some(size) = info.file_size {
            store.set_mod_attribute(&self.game_id, mod_id, attr::FILE_SIZE, size.into());
        }
        if let Some(ref variant) = info.variant {
            store.set_mod_attribute(&self.game_id, mod_id, attr::VARIANT, variant.clone().into());
        }
        if let Some(ref meta) = info.meta {
            if let Some(ref name) = meta.file_name {
                store.set_mod_attribute(&self.game_id, mod_id, attr::FILE_NAME, name.clone().into());
            }
            if let Some(ref version) = meta.file_version {
                store.set_mod_attribute(
                    &self.game_id,
                    mod_id,
                    attr::VERSION,
                    version.clone().into(),
                );
                store.set_mod_attribute(
                    &self.game_id,
                    mod_id,
                    attr::FILE_VERSION,
                    version.clone().into(),
                );
            }
            if let Some(ref file_id) = meta.file_id {
                store.set_mod_attribute(
                    &self.game_id,
                    mod_id,
                    attr::FILE_ID,
                    file_id.clone().into(),
                );
            }
        }
        for (key, value) in &info.extras {
            store.set_mod_attribute(&self.game_id, mod_id, key, value.clone());
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        store.set_mod_attribute(&self.game_id, mod_id, attr::INSTALL_TIME, now.into());
    }
}
