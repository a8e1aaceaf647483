//! Core data types for wasi-prep.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// One of the four fixed flag-preset keys emitted by the flag composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum)]
pub enum FlagField {
    /// Compile flags shared by every native dependency
    #[value(name = "compile-common", alias = "cflags-common")]
    CompileCommon,
    /// Compile flags for the scripting runtime (Lua)
    #[value(name = "runtime-compile", alias = "lua-cflags")]
    RuntimeCompile,
    /// Link flags shared by every native dependency
    #[value(name = "link-common", alias = "ldflags-common")]
    LinkCommon,
    /// Link flags for the scripting runtime (Lua)
    #[value(name = "runtime-link", alias = "lua-ldflags")]
    RuntimeLink,
}

impl FlagField {
    pub const ALL: [FlagField; 4] = [
        FlagField::CompileCommon,
        FlagField::RuntimeCompile,
        FlagField::LinkCommon,
        FlagField::RuntimeLink,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            FlagField::CompileCommon => "compile-common",
            FlagField::RuntimeCompile => "runtime-compile",
            FlagField::LinkCommon => "link-common",
            FlagField::RuntimeLink => "runtime-link",
        }
    }
}

impl fmt::Display for FlagField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Composed flag strings keyed by [`FlagField`]. Always holds all four keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSet {
    fields: BTreeMap<FlagField, String>,
}

impl FlagSet {
    pub(crate) fn new(fields: BTreeMap<FlagField, String>) -> Self {
        FlagSet { fields }
    }

    pub fn get(&self, field: FlagField) -> &str {
        self.fields.get(&field).map(String::as_str).unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = (FlagField, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// Vendored dependency families the patch orchestrator knows how to adapt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DependencyFamily {
    /// PUC Lua 5.1 interpreter sources
    Lua,
    /// luv, the libuv binding layer for Lua
    Luv,
    /// libuv event loop (WASI platform stub only)
    Libuv,
}

impl DependencyFamily {
    /// Directory name under `<build-dir>/src/`
    pub fn canonical_name(&self) -> &'static str {
        match self {
            DependencyFamily::Lua => "lua",
            DependencyFamily::Luv => "luv",
            DependencyFamily::Libuv => "libuv",
        }
    }
}

impl FromStr for DependencyFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lua" => Ok(DependencyFamily::Lua),
            "luv" => Ok(DependencyFamily::Luv),
            "libuv" => Ok(DependencyFamily::Libuv),
            other => Err(format!("unknown dependency family: {}", other)),
        }
    }
}

impl fmt::Display for DependencyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// A single download-and-extract request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveJob {
    pub url: String,
    /// Where the downloaded archive is kept between runs
    pub archive_path: PathBuf,
    /// Extraction destination
    pub dest_dir: PathBuf,
    /// Path whose existence means the job already completed
    pub expected_marker: PathBuf,
}

/// Archive container formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
    TarXz,
    Zip,
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::TarXz => "tar.xz",
            ArchiveFormat::Zip => "zip",
        };
        f.write_str(s)
    }
}

/// What the fetcher actually did for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Marker present: neither download nor extraction ran
    AlreadyExtracted,
    Extracted {
        /// Bytes transferred, or `None` when a cached archive was reused
        downloaded: Option<u64>,
        format: ArchiveFormat,
    },
}

/// Inputs shared by every patch step of one orchestrator run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchContext {
    /// Cross compiler path written into the build config
    pub cc: String,
    /// Composed compile flags
    pub cflags: String,
    /// Composed link flags; empty means "leave link lines alone"
    pub ldflags: String,
    /// Install prefix baked into the runtime config header
    pub install_dir: String,
}

/// How a patch step stays safe under re-application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Idempotence {
    /// Re-matching the rewritten text reproduces the same result
    Natural,
    /// A presence check on the inserted text short-circuits re-application
    Guarded,
    /// Whole body or file replacement; recorded in the tree ledger and
    /// recognised by its canonical replacement text
    ReplaceOnce,
}

/// Result of running one patch step against one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The file was rewritten
    Applied,
    /// The step's applied-predicate already held; nothing written
    AlreadyApplied,
    /// The ledger says this replace-once step ran before
    SkippedByLedger,
    /// The step has nothing to do with the given inputs (e.g. empty link flags)
    NotRequested,
    /// The text the step anchors on is absent; nothing written
    PreconditionMissing,
    /// The step wrote the file but its applied-predicate still fails
    VerificationFailed,
}

impl StepOutcome {
    /// Outcomes that deserve a warning in the run summary
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            StepOutcome::PreconditionMissing | StepOutcome::VerificationFailed
        )
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepOutcome::Applied => "applied",
            StepOutcome::AlreadyApplied => "already applied",
            StepOutcome::SkippedByLedger => "skipped (ledger)",
            StepOutcome::NotRequested => "not requested",
            StepOutcome::PreconditionMissing => "precondition missing",
            StepOutcome::VerificationFailed => "verification failed",
        };
        f.write_str(s)
    }
}
