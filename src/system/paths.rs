//! Repository path registry anchored on `patches/wasi-shim`
//!
//! Every default location the tool uses (patch dir, WASI sysroot, host build
//! outputs) is derived from one repository root. The root is found by walking
//! upward from a start directory until a directory containing
//! `patches/wasi-shim` is reached.

use std::path::{Path, PathBuf};

/// Relative path whose presence marks the repository root
pub const ANCHOR: &str = "patches/wasi-shim";

/// Canonical repository layout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoPaths {
    /// Repository root
    root: PathBuf,

    /// Whether the root was confirmed by the anchor (or given explicitly)
    anchored: bool,
}

impl RepoPaths {
    /// Use an explicitly given root.
    pub fn at(root: PathBuf) -> Self {
        RepoPaths {
            root,
            anchored: true,
        }
    }

    /// Discover the root from `start`; falls back to `start` itself when no
    /// ancestor carries the anchor.
    pub fn discover(start: &Path) -> Self {
        match find_anchor(start) {
            Some(root) => {
                log::debug!("[Paths] Repository root: {}", root.display());
                RepoPaths {
                    root,
                    anchored: true,
                }
            }
            None => {
                log::debug!(
                    "[Paths] No {} above {}, using it as repository root",
                    ANCHOR,
                    start.display()
                );
                RepoPaths {
                    root: start.to_path_buf(),
                    anchored: false,
                }
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    /// Default patch directory: `<root>/patches`
    pub fn patch_dir(&self) -> PathBuf {
        self.root.join("patches")
    }

    /// Default WASI sysroot: `<root>/.toolchains/wasi-sdk/share/wasi-sysroot`
    pub fn sysroot(&self) -> PathBuf {
        self.root
            .join(".toolchains")
            .join("wasi-sdk")
            .join("share")
            .join("wasi-sysroot")
    }

    /// Host-built Lua interpreter: `<root>/build-host/lua-src/src/lua`
    pub fn host_lua(&self) -> PathBuf {
        self.root.join("build-host/lua-src/src/lua")
    }

    /// Host-built nlua library: `<root>/build-host/libnlua0-host.so`
    pub fn host_nlua(&self) -> PathBuf {
        self.root.join("build-host/libnlua0-host.so")
    }
}

/// Walk upward from `start_path` looking for [`ANCHOR`].
pub fn find_anchor(start_path: &Path) -> Option<PathBuf> {
    let mut current = start_path.to_path_buf();
    loop {
        if current.join(ANCHOR).is_dir() {
            return Some(current);
        }
        match current.parent() {
            Some(parent) if parent != current => current = parent.to_path_buf(),
            _ => return None,
        }
    }
}

/// One entry of an ordered lookup chain
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Where the path came from (env var name, "default", ...)
    pub source: &'static str,
    pub path: PathBuf,
}

impl Candidate {
    pub fn new(source: &'static str, path: impl Into<PathBuf>) -> Self {
        Candidate {
            source,
            path: path.into(),
        }
    }
}

/// First candidate whose path exists on disk.
pub fn resolve_first_existing(candidates: &[Candidate]) -> Option<&Candidate> {
    let found = candidates.iter().find(|c| c.path.exists());
    match found {
        Some(c) => log::debug!("[Paths] Using {} ({})", c.path.display(), c.source),
        None => log::debug!(
            "[Paths] None of {} candidate(s) exist",
            candidates.len()
        ),
    }
    found
}
