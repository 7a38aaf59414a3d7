//! Executes instruction lists against a staging layout
//!
//! The processor validates destinations, partitions instructions by type,
//! and runs each group in its fixed order. Individual instruction failures
//! do not unwind the run; only a fatal installer-reported error aborts.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use super::{Instruction, InstructionGroups, Submodule};
use crate::api::{Api, Notification, Severity};
use crate::core::error::InstallError;
use crate::core::{ProgressCallback, ProgressEvent, Result};

const LINE_ENDING: &str = if cfg!(windows) { "\r\n" } else { "\n" };

/// Handler invoked for every submodule instruction
///
/// Runs the nested archive through extraction and instruction processing;
/// resolves to the mod type the submodule wants applied to its parent, if
/// any.
pub type SubmoduleHandler<'a> =
    dyn Fn(Submodule) -> BoxFuture<'a, Result<Option<String>>> + Send + Sync + 'a;

/// What a processing run did and skipped
#[derive(Debug, Default)]
pub struct ProcessReport {
    /// Destinations rejected during validation, with reasons
    pub invalid: Vec<String>,
    /// Copy sources that did not exist in the temp directory
    pub missing_files: Vec<String>,
    /// Mod type recorded by the instruction list, if any
    pub mod_type: Option<String>,
}

/// Per-install instruction executor
pub struct InstructionProcessor<'a> {
    api: &'a Api,
    game_id: &'a str,
    mod_id: &'a str,
    /// Archive MD5 attached to installer-defect reports
    archive_md5: Option<&'a str>,
    /// Where the archive was extracted; copy sources resolve against this
    temp_path: &'a Path,
    /// Where the mod is being assembled
    destination: &'a Path,
}

impl<'a> InstructionProcessor<'a> {
    pub fn new(
        api: &'a Api,
        game_id: &'a str,
        mod_id: &'a str,
        archive_md5: Option<&'a str>,
        temp_path: &'a Path,
        destination: &'a Path,
    ) -> Self {
        Self {
            api,
            game_id,
            mod_id,
            archive_md5,
            temp_path,
            destination,
        }
    }

    /// Run a full instruction list in processing order
    pub async fn process(
        &self,
        instructions: Vec<Instruction>,
        progress: Option<ProgressCallback>,
        submodules: &SubmoduleHandler<'_>,
    ) -> Result<ProcessReport> {
        let mut report = ProcessReport::default();

        let valid = self.validate(instructions, &mut report);
        let groups = InstructionGroups::partition(valid);

        self.report_errors(&groups)?;
        self.report_unsupported(&groups);

        self.make_directories(&groups).await?;
        self.stage_copies(&groups, progress.as_ref(), &mut report)
            .await?;
        self.write_generated(&groups).await?;
        self.write_ini_edits(&groups).await?;

        for submodule in groups.submodules.iter().cloned() {
            debug!(key = %submodule.key, "installing submodule");
            if let Some(mod_type) = submodules(submodule).await? {
                self.api
                    .store
                    .set_mod_type(self.game_id, self.mod_id, &mod_type);
            }
        }

        for attribute in &groups.attributes {
            self.api.store.set_mod_attribute(
                self.game_id,
                self.mod_id,
                &attribute.key,
                attribute.value.clone(),
            );
        }

        if let Some(last) = groups.mod_types.last() {
            for ignored in &groups.mod_types[..groups.mod_types.len() - 1] {
                warn!(
                    mod_id = self.mod_id,
                    ignored = %ignored.value,
                    "multiple mod types assigned, last one wins"
                );
            }
            self.api
                .store
                .set_mod_type(self.game_id, self.mod_id, &last.value);
            report.mod_type = Some(last.value.clone());
        }

        for rule in &groups.rules {
            self.api.store.add_rule(self.game_id, self.mod_id, rule.clone());
        }

        Ok(report)
    }

    /// Drop instructions with invalid destinations, recording the reasons
    fn validate(
        &self,
        instructions: Vec<Instruction>,
        report: &mut ProcessReport,
    ) -> Vec<Instruction> {
        instructions
            .into_iter()
            .filter(|instruction| match instruction.destination() {
                Some(destination) => {
                    match super::resolve_destination(self.destination, destination) {
                        Ok(_) => true,
                        Err(err) => {
                            warn!(%destination, %err, "dropping instruction");
                            report.invalid.push(err.to_string());
                            false
                        }
                    }
                }
                None => true,
            })
            .collect()
    }

    /// Surface installer-reported errors; fatal ones abort
    fn report_errors(&self, groups: &InstructionGroups) -> Result<()> {
        if groups.errors.is_empty() {
            return Ok(());
        }
        let sources: Vec<&str> = groups
            .errors
            .iter()
            .map(|err| err.source.as_str())
            .collect();
        if groups.has_fatal_error() {
            return Err(InstallError::ProcessCanceled(format!(
                "installer reported a fatal error: {}",
                sources.join(", ")
            )));
        }
        self.api.frontend.notify(Notification::new(
            Severity::Warning,
            "Installer reported errors",
            sources.join("\n"),
        ));
        Ok(())
    }

    /// Surface unimplemented installer features with a report action
    fn report_unsupported(&self, groups: &InstructionGroups) {
        if groups.unsupported.is_empty() {
            return;
        }
        let sources: Vec<&str> = groups
            .unsupported
            .iter()
            .map(|entry| entry.source.as_str())
            .collect();
        let mut message = format!(
            "The installer uses features that are not implemented: {}.",
            sources.join(", ")
        );
        if let Some(md5) = self.archive_md5 {
            message.push_str(&format!(" Archive hash: {}.", md5));
        }
        self.api.frontend.notify(
            Notification::new(Severity::Info, "Installer feature not supported", message)
                .reportable(),
        );
    }

    async fn make_directories(&self, groups: &InstructionGroups) -> Result<()> {
        for mkdir in &groups.mkdirs {
            let path = super::resolve_destination(self.destination, &mkdir.destination)?;
            fs::create_dir_all(&path)
                .await
                .map_err(|err| InstallError::fs(&path, err))?;
        }
        Ok(())
    }

    /// Transfer extracted files into the mod directory
    ///
    /// Copies are grouped by source. Every destination except the last is a
    /// copy; the last is a move, so each source file has a single owner when
    /// the group completes.
    async fn stage_copies(
        &self,
        groups: &InstructionGroups,
        progress: Option<&ProgressCallback>,
        report: &mut ProcessReport,
    ) -> Result<()> {
        let mut order: Vec<&str> = Vec::new();
        let mut destinations: HashMap<&str, Vec<&str>> = HashMap::new();
        for copy in &groups.copies {
            destinations
                .entry(copy.source.as_str())
                .or_insert_with(|| {
                    order.push(copy.source.as_str());
                    Vec::new()
                })
                .push(copy.destination.as_str());
        }

        let total = order.len().max(1);
        for (index, source) in order.iter().enumerate() {
            let source_path = self.temp_path.join(source);
            let targets = &destinations[*source];

            if fs::metadata(&source_path).await.is_err() {
                warn!(source = %source, "copy source missing from archive");
                report.missing_files.push((*source).to_owned());
                continue;
            }

            let mut failed = false;
            for (target_index, destination) in targets.iter().enumerate() {
                let target = super::resolve_destination(self.destination, destination)?;
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(|err| InstallError::fs(parent, err))?;
                }

                let is_last = target_index + 1 == targets.len();
                let result = if is_last {
                    match fs::rename(&source_path, &target).await {
                        Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
                            debug!(source = %source, "rename denied, falling back to copy");
                            fs::copy(&source_path, &target).await.map(|_| ())
                        }
                        other => other,
                    }
                } else {
                    fs::copy(&source_path, &target).await.map(|_| ())
                };

                if let Err(err) = result {
                    if err.kind() == std::io::ErrorKind::NotFound {
                        report.missing_files.push((*source).to_owned());
                        failed = true;
                        break;
                    }
                    return Err(InstallError::fs(&target, err));
                }
            }

            if !failed {
                if let Some(callback) = progress {
                    callback(ProgressEvent::Install {
                        mod_id: self.mod_id.to_owned(),
                        percent: ((index + 1) * 100 / total) as u8,
                    });
                }
            }
        }

        if !report.missing_files.is_empty() {
            self.api.frontend.notify(Notification::new(
                Severity::Warning,
                "Installation incomplete",
                format!(
                    "\"{}\" is missing files the installer asked for: {}",
                    self.mod_id,
                    report.missing_files.join(", ")
                ),
            ));
        }
        Ok(())
    }

    async fn write_generated(&self, groups: &InstructionGroups) -> Result<()> {
        for generated in &groups.generated {
            let target = super::resolve_destination(self.destination, &generated.destination)?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|err| InstallError::fs(parent, err))?;
            }
            fs::write(&target, generated.data.as_bytes())
                .await
                .map_err(|err| InstallError::fs(&target, err))?;
        }
        Ok(())
    }

    /// Render grouped ini tweaks under `Ini Tweaks/<destination>`
    async fn write_ini_edits(&self, groups: &InstructionGroups) -> Result<()> {
        // destination -> section -> entries, insertion-ordered throughout
        let mut files: Vec<(&str, Vec<(&str, Vec<(&str, &str)>)>)> = Vec::new();
        for edit in &groups.ini_edits {
            let file_index = match files
                .iter()
                .position(|(name, _)| *name == edit.destination)
            {
                Some(index) => index,
                None => {
                    files.push((edit.destination.as_str(), Vec::new()));
                    files.len() - 1
                }
            };
            let sections = &mut files[file_index].1;
            let section_index = match sections.iter().position(|(name, _)| *name == edit.section)
            {
                Some(index) => index,
                None => {
                    sections.push((edit.section.as_str(), Vec::new()));
                    sections.len() - 1
                }
            };
            sections[section_index]
                .1
                .push((edit.key.as_str(), edit.value.as_str()));
        }

        for (destination, sections) in files {
            let mut rendered = String::new();
            for (section, entries) in sections {
                rendered.push('[');
                rendered.push_str(section);
                rendered.push(']');
                rendered.push_str(LINE_ENDING);
                for (key, value) in entries {
                    rendered.push_str(&format!("{} = {}{}", key, value, LINE_ENDING));
                }
            }

            let tweaks_dir = self.destination.join("Ini Tweaks");
            let target = super::resolve_destination(&tweaks_dir, destination)?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|err| InstallError::fs(parent, err))?;
            }
            fs::write(&target, rendered.as_bytes())
                .await
                .map_err(|err| InstallError::fs(&target, err))?;
        }
        Ok(())
    }
}
