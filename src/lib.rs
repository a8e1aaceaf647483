//! wasi-prep: WASI dependency preparation
//!
//! This crate prepares vendored native dependencies (Lua, luv, libuv) for a
//! cross build targeting `wasm32-wasi`. It fetches the SDK archive, emits the
//! shared compile/link flag presets, and rewrites dependency sources in place
//! so they build under WASI's restricted environment.
//!
//! The system is organized into functional modules:
//! - **error**: Unified error type hierarchy
//! - **models**: Core data structures and types
//! - **config**: CLI + environment resolution into settings structs
//! - **system**: Repository path resolution and host tool invocation
//! - **toolchain**: Flag presets, archive fetching and extraction
//! - **patcher**: Patch steps and the single-step driver
//! - **orchestrator**: Per-tree step sequencing and the applied-step ledger
//! - **log_collector**: `log` backend for stderr and an optional log file

// Core foundational modules
pub mod error;
pub mod models;

// Settings resolution
pub mod config;

// Repository layout and host tools
pub mod system;

// Toolchain flags and SDK fetching
pub mod toolchain;

// Source patching
pub mod patcher;
pub mod orchestrator;

// Logging backend
pub mod log_collector;

// Re-export the log crate for macro usage
pub use log;

pub use error::{AppError, ConfigError, FetchError, HostToolError, PatchError};
pub use log_collector::{LogCollector, LogLine};
pub use models::{DependencyFamily, FlagField, FlagSet, PatchContext, StepOutcome};
pub use orchestrator::{patch_tree, PatchReport};
pub use toolchain::flags::compose;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
