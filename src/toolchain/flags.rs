//! Shared WASI compiler/linker flag presets.
//!
//! Every preset is plain string composition over the inputs. Paths are embedded
//! verbatim; callers that want absolute paths must absolutize before calling.

use std::collections::BTreeMap;
use std::path::Path;

use crate::models::{FlagField, FlagSet};

/// Target triple passed to the link step
pub const WASI_TARGET: &str = "wasm32-wasi";

/// Sub-flag pair the link step never consumes. Passing it to clang at link time
/// only produces "argument unused during compilation" noise.
pub const LINK_INVALID_EH_PAIR: &str = "-mllvm -wasm-enable-sjlj";

/// Shim header force-included into every translation unit
pub const SHIM_HEADER: &str = "wasi-shim/wasi_env_shim.h";

/// Extra include directory holding replacement system headers
pub const SHIM_INCLUDE_DIR: &str = "wasi-shim/include";

/// Join the non-empty pieces with single spaces.
fn join_flags<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Remove the link-stage-invalid pair from an exception-handling flag string.
///
/// Only the one named pair is special-cased; everything else passes through.
///
/// ```
/// use wasi_prep::toolchain::flags::strip_link_invalid;
///
/// assert_eq!(
///     strip_link_invalid("-mllvm -wasm-enable-sjlj -fno-exceptions"),
///     "-fno-exceptions"
/// );
/// ```
pub fn strip_link_invalid(eh_flags: &str) -> String {
    let removed = eh_flags.replace(LINK_INVALID_EH_PAIR, "");
    join_flags(removed.split_whitespace())
}

fn shim_flags(patch_dir: &Path) -> [String; 2] {
    let patch_dir = patch_dir.display();
    [
        format!("-I{}/{}", patch_dir, SHIM_INCLUDE_DIR),
        format!("-include {}/{}", patch_dir, SHIM_HEADER),
    ]
}

/// Compose all four flag presets.
pub fn compose(patch_dir: &Path, sysroot: &Path, eh_flags: &str) -> FlagSet {
    let [include, force_include] = shim_flags(patch_dir);

    let compile_common = join_flags([
        eh_flags,
        "-D_WASI_EMULATED_SIGNAL",
        "-DNDEBUG",
        "-DNVIM_LOG_DEBUG",
        include.as_str(),
        force_include.as_str(),
    ]);

    let runtime_compile = join_flags([
        eh_flags,
        "-D_WASI_EMULATED_SIGNAL",
        include.as_str(),
        force_include.as_str(),
    ]);

    let target = format!("--target={}", WASI_TARGET);
    let sysroot = format!("--sysroot={}", sysroot.display());
    let eh_link = strip_link_invalid(eh_flags);
    let link_common = join_flags([
        target.as_str(),
        sysroot.as_str(),
        eh_link.as_str(),
        "-Wl,--allow-undefined",
        "-lwasi-emulated-signal",
        "-lsetjmp",
        "-Qunused-arguments",
    ]);

    log::debug!("[Flags] Composed presets for patch dir {}", patch_dir.display());

    let mut fields = BTreeMap::new();
    fields.insert(FlagField::CompileCommon, compile_common);
    fields.insert(FlagField::RuntimeCompile, runtime_compile);
    fields.insert(FlagField::RuntimeLink, link_common.clone());
    fields.insert(FlagField::LinkCommon, link_common);
    FlagSet::new(fields)
}
