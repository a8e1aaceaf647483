//! Host Lua code-generation wrapper.
//!
//! Code generators run during a cross build must use the native host Lua and
//! nlua library, never the wasm ones the build is producing. The interpreter
//! and library are picked from ordered candidate chains.

use std::path::PathBuf;
use std::process::Command;

use crate::config::HostGenSettings;
use crate::error::HostToolError;
use crate::system::paths::resolve_first_existing;

/// Fully resolved generator invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLuaInvocation {
    pub lua: PathBuf,
    pub args: Vec<String>,
}

impl HostLuaInvocation {
    /// Pick the interpreter and nlua library and assemble the argument list:
    /// `<preload> <srcdir> <nlua> <gendir> [extra...]`.
    pub fn resolve(settings: &HostGenSettings) -> Result<Self, HostToolError> {
        let lua = resolve_first_existing(&settings.lua_candidates)
            .map(|c| c.path.clone())
            .ok_or_else(|| HostToolError::NotFound {
                tool: "host Lua",
                path: settings
                    .lua_candidates
                    .last()
                    .map(|c| c.path.clone())
                    .unwrap_or_default(),
            })?;

        let nlua = resolve_first_existing(&settings.nlua_candidates)
            .map(|c| c.path.clone())
            .unwrap_or_else(|| settings.nlua_arg.clone());

        let mut args = vec![
            settings.preload.clone(),
            settings.srcdir.clone(),
            nlua.to_string_lossy().into_owned(),
            settings.gendir.clone(),
        ];
        args.extend(settings.extra.iter().cloned());

        Ok(HostLuaInvocation { lua, args })
    }

    /// Render for diagnostics
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.lua.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    /// Run with inherited stdio; a non-zero exit is an error.
    pub fn run(&self) -> Result<(), HostToolError> {
        let cmd = self.command_line();
        log::debug!("[HostLua] Running: {}", cmd);

        let status = Command::new(&self.lua)
            .args(&self.args)
            .status()
            .map_err(|e| HostToolError::CommandFailed {
                cmd: cmd.clone(),
                reason: e.to_string(),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(HostToolError::CommandFailed {
                cmd,
                reason: match status.code() {
                    Some(code) => format!("exited with status {}", code),
                    None => "terminated by signal".to_string(),
                },
            })
        }
    }
}

/// Resolve and run the host code generator.
pub fn run_host_lua_gen(settings: &HostGenSettings) -> Result<(), HostToolError> {
    let invocation = HostLuaInvocation::resolve(settings)?;
    log::info!("[HostLua] Using {}", invocation.lua.display());
    invocation.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::paths::Candidate;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::tempdir;

    fn settings(root: &Path) -> HostGenSettings {
        HostGenSettings {
            lua_candidates: vec![
                Candidate::new("HOST_LUA_PRG", root.join("env-lua")),
                Candidate::new("default", root.join("build-host/lua-src/src/lua")),
            ],
            nlua_candidates: vec![
                Candidate::new("HOST_NLUA0", root.join("env-nlua.so")),
                Candidate::new("default", root.join("build-host/libnlua0-host.so")),
            ],
            nlua_arg: PathBuf::from("/cross/libnlua0.so"),
            preload: "preload.lua".to_string(),
            srcdir: "src".to_string(),
            gendir: "gen".to_string(),
            extra: vec!["--flag".to_string(), "x".to_string()],
        }
    }

    fn script(path: &Path, body: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_missing_host_lua_is_fatal() {
        let temp = tempdir().expect("Failed to create temp dir");
        let err = HostLuaInvocation::resolve(&settings(temp.path())).unwrap_err();
        assert!(matches!(err, HostToolError::NotFound { tool: "host Lua", .. }));
    }

    #[test]
    fn test_falls_back_to_caller_nlua() {
        let temp = tempdir().expect("Failed to create temp dir");
        let lua = temp.path().join("build-host/lua-src/src/lua");
        script(&lua, "exit 0");

        let inv = HostLuaInvocation::resolve(&settings(temp.path())).unwrap();
        assert_eq!(inv.lua, lua);
        assert_eq!(
            inv.args,
            vec!["preload.lua", "src", "/cross/libnlua0.so", "gen", "--flag", "x"]
        );
    }

    #[test]
    fn test_env_candidates_win() {
        let temp = tempdir().expect("Failed to create temp dir");
        script(&temp.path().join("env-lua"), "exit 0");
        script(&temp.path().join("build-host/lua-src/src/lua"), "exit 0");
        fs::write(temp.path().join("env-nlua.so"), "").unwrap();
        fs::write(temp.path().join("build-host/libnlua0-host.so"), "").unwrap();

        let inv = HostLuaInvocation::resolve(&settings(temp.path())).unwrap();
        assert_eq!(inv.lua, temp.path().join("env-lua"));
        assert_eq!(inv.args[2], temp.path().join("env-nlua.so").to_string_lossy());
    }

    #[test]
    fn test_run_passes_arguments_and_reports_failure() {
        let temp = tempdir().expect("Failed to create temp dir");
        let out = temp.path().join("args.txt");
        script(
            &temp.path().join("env-lua"),
            &format!("echo \"$@\" > {}", out.display()),
        );

        run_host_lua_gen(&settings(temp.path())).unwrap();
        let recorded = fs::read_to_string(&out).unwrap();
        assert_eq!(
            recorded.trim(),
            "preload.lua src /cross/libnlua0.so gen --flag x"
        );

        script(&temp.path().join("env-lua"), "exit 3");
        let err = run_host_lua_gen(&settings(temp.path())).unwrap_err();
        assert!(
            matches!(err, HostToolError::CommandFailed { ref reason, .. } if reason.contains("status 3"))
        );
    }
}
