//! Unified error type hierarchy for wasi-prep
//!
//! Provides structured error handling with ConfigError, FetchError, PatchError
//! and the process-level AppError.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration resolution errors (precondition failures).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required input was given neither on the command line nor in the environment
    #[error("{what} not provided (use {flag} or {env})")]
    MissingInput {
        what: &'static str,
        flag: &'static str,
        env: &'static str,
    },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error during config operations: {0}")]
    IoError(#[from] io::Error),
}

/// Toolchain archive download and extraction errors.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("GET {url} failed with HTTP status {status}")]
    Http { url: String, status: u16 },

    #[error("Transfer of {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Extraction of {archive} failed: {reason}")]
    Extraction { archive: PathBuf, reason: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FetchError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Source tree patching errors.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Source dir not found: {0}")]
    SourceDirNotFound(PathBuf),

    #[error("Patch target file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Patch state ledger is unreadable: {0}")]
    LedgerCorrupt(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PatchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PatchError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Host tool invocation errors.
#[derive(Error, Debug)]
pub enum HostToolError {
    #[error("{tool} not found: {path}")]
    NotFound { tool: &'static str, path: PathBuf },

    #[error("Command '{cmd}' failed: {reason}")]
    CommandFailed { cmd: String, reason: String },
}

/// Global error type for every wasi-prep entry point
///
/// Each subcommand is a standalone invocation, so the error is only ever
/// rendered as a diagnostic plus an exit code.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    HostTool(#[from] HostToolError),
}

impl AppError {
    /// Get a user-facing error message suitable for a terminal diagnostic
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config(e) => format!("Invalid invocation: {}", e),
            AppError::Fetch(e) => format!("Toolchain fetch failed: {}", e),
            AppError::Patch(e) => format!("Source patching failed: {}", e),
            AppError::HostTool(e) => format!("Host tool failed: {}", e),
        }
    }

    /// Process exit code: 2 for precondition errors, 3 for missing resources,
    /// 1 for I/O and transfer failures
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(ConfigError::MissingInput { .. })
            | AppError::Config(ConfigError::ValidationFailed(_)) => 2,
            AppError::Patch(PatchError::SourceDirNotFound(_))
            | AppError::Patch(PatchError::FileNotFound(_))
            | AppError::HostTool(HostToolError::NotFound { .. }) => 3,
            _ => 1,
        }
    }
}
