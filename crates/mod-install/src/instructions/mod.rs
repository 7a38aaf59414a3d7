//! Install instructions
//!
//! Installers inspect a file list and emit a list of these primitive
//! actions; the processor executes them against the staging directory. Each
//! action type is its own struct, wrapped in one tagged enum so installer
//! output can round-trip through JSON.

pub mod processor;

pub use processor::{InstructionProcessor, ProcessReport};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::core::error::InstallError;
use crate::core::Result;
use crate::model::ModRule;

/// Stage a file from the extraction temp into the mod
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyFile {
    /// Path relative to the pipeline's temp directory
    pub source: String,
    /// Path relative to the mod's destination directory
    pub destination: String,
}

/// Ensure an empty directory exists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MakeDir {
    pub destination: String,
}

/// Recursively install a nested archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submodule {
    pub key: String,
    /// Location of the nested archive
    pub path: PathBuf,
    /// Mod type to assign to the parent once the submodule installed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submodule_type: Option<String>,
}

/// Write literal bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateFile {
    pub data: String,
    pub destination: String,
}

/// Record a key/value for the mod's `Ini Tweaks/<destination>` output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IniEdit {
    pub destination: String,
    pub section: String,
    pub key: String,
    pub value: String,
}

/// Persist a mod attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetAttribute {
    pub key: String,
    pub value: Value,
}

/// Persist the mod type; with multiple occurrences the last wins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetModType {
    pub value: String,
}

/// Persist a mod rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddRule {
    pub rule: ModRule,
}

/// An installer feature this pipeline does not implement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsupportedFeature {
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionErrorKind {
    /// Aborts the whole pipeline
    Fatal,
    Warning,
}

/// Error reported by the installer itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallerError {
    pub value: InstructionErrorKind,
    pub source: String,
}

impl InstallerError {
    pub fn is_fatal(&self) -> bool {
        self.value == InstructionErrorKind::Fatal
    }
}

/// Closed set of install actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Instruction {
    Copy(CopyFile),
    Mkdir(MakeDir),
    Submodule(Submodule),
    #[serde(rename = "generatefile")]
    GenerateFile(GenerateFile),
    #[serde(rename = "iniedit")]
    IniEdit(IniEdit),
    Unsupported(UnsupportedFeature),
    Attribute(SetAttribute),
    #[serde(rename = "setmodtype")]
    SetModType(SetModType),
    Error(InstallerError),
    Rule(AddRule),
}

impl Instruction {
    pub fn copy(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Instruction::Copy(CopyFile {
            source: source.into(),
            destination: destination.into(),
        })
    }

    pub fn mkdir(destination: impl Into<String>) -> Self {
        Instruction::Mkdir(MakeDir {
            destination: destination.into(),
        })
    }

    /// The destination path this instruction writes to, if any
    pub fn destination(&self) -> Option<&str> {
        match self {
            Instruction::Copy(c) => Some(&c.destination),
            Instruction::Mkdir(m) => Some(&m.destination),
            Instruction::GenerateFile(g) => Some(&g.destination),
            Instruction::IniEdit(i) => Some(&i.destination),
            _ => None,
        }
    }
}

/// Instructions partitioned by type, processing order preserved within each
/// group
#[derive(Debug, Default)]
pub struct InstructionGroups {
    pub copies: Vec<CopyFile>,
    pub mkdirs: Vec<MakeDir>,
    pub generated: Vec<GenerateFile>,
    pub ini_edits: Vec<IniEdit>,
    pub submodules: Vec<Submodule>,
    pub attributes: Vec<SetAttribute>,
    pub mod_types: Vec<SetModType>,
    pub rules: Vec<ModRule>,
    pub errors: Vec<InstallerError>,
    pub unsupported: Vec<UnsupportedFeature>,
}

impl InstructionGroups {
    pub fn partition(instructions: Vec<Instruction>) -> Self {
        let mut groups = Self::default();
        for instruction in instructions {
            match instruction {
                Instruction::Copy(c) => groups.copies.push(c),
                Instruction::Mkdir(m) => groups.mkdirs.push(m),
                Instruction::GenerateFile(g) => groups.generated.push(g),
                Instruction::IniEdit(i) => groups.ini_edits.push(i),
                Instruction::Submodule(s) => groups.submodules.push(s),
                Instruction::Attribute(a) => groups.attributes.push(a),
                Instruction::SetModType(t) => groups.mod_types.push(t),
                Instruction::Rule(r) => groups.rules.push(r.rule),
                Instruction::Error(e) => groups.errors.push(e),
                Instruction::Unsupported(u) => groups.unsupported.push(u),
            }
        }
        groups
    }

    /// Whether any installer-reported error is fatal
    pub fn has_fatal_error(&self) -> bool {
        self.errors.iter().any(InstallerError::is_fatal)
    }
}

#[cfg(windows)]
const MAX_DESTINATION_PATH: usize = 260;
#[cfg(not(windows))]
const MAX_DESTINATION_PATH: usize = 4096;

/// File names Windows reserves for devices, rejected in any path component
const RESERVED_NAMES: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Normalise an instruction destination to a safe relative path
///
/// A leading separator is tolerated (several installer formats emit them).
/// Forward slashes become backslashes on Windows; elsewhere the path is
/// kept as written. Traversal components and reserved device names are
/// rejected.
pub fn sanitize_destination(destination: &str) -> Result<String> {
    let trimmed = destination.trim_start_matches(['/', '\\']);

    let converted = if cfg!(windows) {
        trimmed.replace('/', "\\")
    } else {
        trimmed.to_owned()
    };

    for component in converted.split(['/', '\\']) {
        if component == ".." {
            return Err(InstallError::DataInvalid(format!(
                "destination '{}' escapes the install directory",
                destination
            )));
        }
        let stem = component
            .split('.')
            .next()
            .unwrap_or(component)
            .to_lowercase();
        if RESERVED_NAMES.contains(&stem.as_str()) {
            return Err(InstallError::DataInvalid(format!(
                "destination '{}' contains the reserved name '{}'",
                destination, component
            )));
        }
    }

    Ok(converted)
}

/// Sanitize and resolve a destination against its base directory
///
/// The joined path is re-checked for containment and OS path-length limits.
pub fn resolve_destination(base: &Path, destination: &str) -> Result<PathBuf> {
    let relative = sanitize_destination(destination)?;
    let resolved = base.join(&relative);

    if !resolved.starts_with(base) {
        return Err(InstallError::DataInvalid(format!(
            "destination '{}' escapes the install directory",
            destination
        )));
    }
    if resolved.as_os_str().len() > MAX_DESTINATION_PATH {
        return Err(InstallError::DataInvalid(format!(
            "destination '{}' exceeds the path length limit",
            destination
        )));
    }

    Ok(resolved)
}
