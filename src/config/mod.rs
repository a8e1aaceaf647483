//! Configuration module for wasi-prep invocations.
//!
//! Every subcommand works from an explicit settings struct. The structs are
//! built once in `main` from command-line values and the legacy environment
//! variables; nothing below this layer reads the process environment.
//!
//! # Module Structure
//!
//! - `loader`: CLI + environment resolution into settings structs
//!
//! # Resolution Rules
//!
//! 1. A non-empty command-line value wins
//! 2. Otherwise a non-empty environment variable is used
//! 3. Otherwise the input is absent; required inputs fail with
//!    [`ConfigError::MissingInput`](crate::error::ConfigError::MissingInput)

pub mod loader;

use std::collections::HashMap;
use std::path::PathBuf;

use crate::models::{ArchiveJob, DependencyFamily, FlagField, PatchContext};
use crate::system::paths::Candidate;

pub use loader::{
    resolve_fetch, resolve_flags, resolve_host_gen, resolve_patch, resolve_repo, FlagInputs,
    HostGenInputs, PatchInputs,
};

/// Legacy environment variable names
pub const ENV_BUILD_DIR: &str = "DEPS_BUILD_DIR";
pub const ENV_INSTALL_DIR: &str = "DEPS_INSTALL_DIR";
pub const ENV_CC: &str = "LUA_WASM_CC";
pub const ENV_CFLAGS: &str = "LUA_WASM_CFLAGS";
pub const ENV_LDFLAGS: &str = "LUA_WASM_LDFLAGS";
pub const ENV_HOST_LUA: &str = "HOST_LUA_PRG";
pub const ENV_HOST_NLUA: &str = "HOST_NLUA0";
/// Log level override (`error`, `warn`, `info`, `debug`, `trace`)
pub const ENV_LOG: &str = "WASI_PREP_LOG";

/// Read-only view of environment variables
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Inputs of the `fetch` subcommand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub job: ArchiveJob,
}

/// Inputs of the `flags` subcommand, with defaults already applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSettings {
    pub field: FlagField,
    pub patch_dir: PathBuf,
    pub sysroot: PathBuf,
    pub eh: String,
}

/// Inputs of the `patch` subcommand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSettings {
    pub family: DependencyFamily,
    /// Root of the dependency checkout
    pub tree_root: PathBuf,
    pub ctx: PatchContext,
    /// Ignore the applied-step ledger
    pub force: bool,
}

/// Inputs of the `host-lua-gen` subcommand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostGenSettings {
    /// Interpreter lookup chain, first existing wins
    pub lua_candidates: Vec<Candidate>,
    /// nlua library lookup chain, first existing wins
    pub nlua_candidates: Vec<Candidate>,
    /// nlua library passed by the caller, used when no candidate exists
    pub nlua_arg: PathBuf,
    pub preload: String,
    pub srcdir: String,
    pub gendir: String,
    pub extra: Vec<String>,
}
