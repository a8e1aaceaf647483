//! CLI + environment resolution into settings structs.

use std::path::{Path, PathBuf};

use crate::config::{
    EnvSource, FetchSettings, FlagSettings, HostGenSettings, PatchSettings, ENV_BUILD_DIR,
    ENV_CC, ENV_CFLAGS, ENV_HOST_LUA, ENV_HOST_NLUA, ENV_INSTALL_DIR, ENV_LDFLAGS,
};
use crate::error::ConfigError;
use crate::models::{ArchiveJob, DependencyFamily, FlagField, PatchContext};
use crate::system::paths::{Candidate, RepoPaths};

/// Raw `flags` inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagInputs {
    pub field: FlagField,
    pub patch_dir: Option<PathBuf>,
    pub sysroot: Option<PathBuf>,
    pub eh: String,
}

/// Raw `patch` inputs as given on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchInputs {
    pub build_dir: Option<String>,
    pub install_dir: Option<String>,
    pub cc: Option<String>,
    pub cflags: Option<String>,
    pub ldflags: Option<String>,
    pub src: Option<PathBuf>,
    pub force: bool,
}

/// Raw `host-lua-gen` inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostGenInputs {
    pub preload: String,
    pub srcdir: String,
    pub nlua_arg: String,
    pub gendir: String,
    pub extra: Vec<String>,
}

/// CLI value if non-empty, else the environment variable if non-empty.
pub fn pick(cli: Option<&str>, env: &dyn EnvSource, key: &str) -> Option<String> {
    cli.map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| {
            env.var(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
}

fn require(
    value: Option<String>,
    what: &'static str,
    flag: &'static str,
    env: &'static str,
) -> Result<String, ConfigError> {
    value.ok_or(ConfigError::MissingInput { what, flag, env })
}

/// Repository layout: explicit root, else anchor search from `cwd`.
pub fn resolve_repo(explicit: Option<PathBuf>, cwd: &Path) -> RepoPaths {
    match explicit {
        Some(root) if !root.as_os_str().is_empty() => RepoPaths::at(root),
        _ => RepoPaths::discover(cwd),
    }
}

/// Validate `fetch` inputs.
pub fn resolve_fetch(
    url: &str,
    archive: PathBuf,
    dest: PathBuf,
    expected: PathBuf,
) -> Result<FetchSettings, ConfigError> {
    if url.trim().is_empty() {
        return Err(ConfigError::ValidationFailed("--url must not be empty".to_string()));
    }
    for (flag, path) in [("--archive", &archive), ("--dest", &dest), ("--expected", &expected)] {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(format!(
                "{} must not be empty",
                flag
            )));
        }
    }
    Ok(FetchSettings {
        job: ArchiveJob {
            url: url.trim().to_string(),
            archive_path: archive,
            dest_dir: dest,
            expected_marker: expected,
        },
    })
}

/// Apply repository defaults to `flags` inputs.
pub fn resolve_flags(inputs: FlagInputs, repo: &RepoPaths) -> FlagSettings {
    FlagSettings {
        field: inputs.field,
        patch_dir: inputs.patch_dir.unwrap_or_else(|| repo.patch_dir()),
        sysroot: inputs.sysroot.unwrap_or_else(|| repo.sysroot()),
        eh: inputs.eh,
    }
}

/// Resolve `patch` inputs for one family.
///
/// Lua needs a build dir (unless `--src`), an install dir and a compiler;
/// luv and libuv only need a build dir (unless `--src`).
pub fn resolve_patch(
    family: DependencyFamily,
    inputs: &PatchInputs,
    env: &dyn EnvSource,
) -> Result<PatchSettings, ConfigError> {
    let build_dir = pick(inputs.build_dir.as_deref(), env, ENV_BUILD_DIR);
    let install_dir = pick(inputs.install_dir.as_deref(), env, ENV_INSTALL_DIR);
    let cc = pick(inputs.cc.as_deref(), env, ENV_CC);

    let src = inputs
        .src
        .clone()
        .filter(|p| !p.as_os_str().is_empty());

    let tree_root = match src {
        Some(src) => src,
        None => {
            let build_dir = require(build_dir, "build dir", "--build-dir", ENV_BUILD_DIR)?;
            PathBuf::from(build_dir)
                .join("src")
                .join(family.canonical_name())
        }
    };

    let (install_dir, cc) = if family == DependencyFamily::Lua {
        (
            require(install_dir, "install dir", "--install-dir", ENV_INSTALL_DIR)?,
            require(cc, "compiler", "--cc", ENV_CC)?,
        )
    } else {
        (install_dir.unwrap_or_default(), cc.unwrap_or_default())
    };

    let ctx = PatchContext {
        cc,
        cflags: pick(inputs.cflags.as_deref(), env, ENV_CFLAGS).unwrap_or_default(),
        ldflags: pick(inputs.ldflags.as_deref(), env, ENV_LDFLAGS).unwrap_or_default(),
        install_dir,
    };

    Ok(PatchSettings {
        family,
        tree_root,
        ctx,
        force: inputs.force,
    })
}

/// Build the host Lua and nlua lookup chains.
pub fn resolve_host_gen(
    inputs: HostGenInputs,
    repo: &RepoPaths,
    env: &dyn EnvSource,
) -> HostGenSettings {
    let mut lua_candidates = Vec::new();
    if let Some(lua) = pick(None, env, ENV_HOST_LUA) {
        lua_candidates.push(Candidate::new(ENV_HOST_LUA, lua));
    }
    lua_candidates.push(Candidate::new("default", repo.host_lua()));

    let mut nlua_candidates = Vec::new();
    if let Some(nlua) = pick(None, env, ENV_HOST_NLUA) {
        nlua_candidates.push(Candidate::new(ENV_HOST_NLUA, nlua));
    }
    nlua_candidates.push(Candidate::new("default", repo.host_nlua()));

    HostGenSettings {
        lua_candidates,
        nlua_candidates,
        nlua_arg: PathBuf::from(inputs.nlua_arg),
        preload: inputs.preload,
        srcdir: inputs.srcdir,
        gendir: inputs.gendir,
        extra: inputs.extra,
    }
}
