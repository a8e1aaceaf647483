//! Lua (PUC 5.1) build and source adaptation for WASI.
//!
//! Targets, relative to the Lua checkout:
//! - `src/Makefile`: compiler, flags, build targets
//! - `Makefile`: install destinations and recipe
//! - `src/luaconf.h`: readline, root path, temp-name macros
//! - `src/loslib.c`, `src/liolib.c`: process spawning and tmpfile
//! - `src/lua.c`: signal registration

use once_cell::sync::Lazy;
use regex::Regex;

use super::templates::{
    LUA_ALL_TARGETS, LUA_EXTRA_CFLAGS, LUA_INSTALL_RECIPE, LUA_IO_TMPFILE_STUB,
    LUA_OS_EXECUTE_STUB, LUA_SIGNAL_GUARD, LUA_SIGNAL_INCLUDE, LUA_TMPNAMBUFSIZE_DEFINE,
    LUA_TMPNAM_DEFINE,
};
use super::{
    always, replace_first_literal, replace_literal, set_assignment, PatchStep,
};
use crate::models::{Idempotence, PatchContext};

pub const BUILD_MAKEFILE: &str = "src/Makefile";
pub const ROOT_MAKEFILE: &str = "Makefile";
pub const LUACONF: &str = "src/luaconf.h";
pub const LOSLIB: &str = "src/loslib.c";
pub const LIOLIB: &str = "src/liolib.c";
pub const LUA_CLI: &str = "src/lua.c";

// Pre-compiled regex patterns (compiled once at startup)
static CC_ASSIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(CC\s*=).*$").expect("Invalid CC regex"));
static CFLAGS_ASSIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(CFLAGS\s*=).*$").expect("Invalid CFLAGS regex"));
static MYCFLAGS_ASSIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(MYCFLAGS\s*=).*$").expect("Invalid MYCFLAGS regex"));
static MYLDFLAGS_ASSIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(MYLDFLAGS\s*=).*$").expect("Invalid MYLDFLAGS regex"));
static MYLIBS_ASSIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(MYLIBS\s*=).*$").expect("Invalid MYLIBS regex"));
static ALL_T_ASSIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(ALL_T\s*=).*$").expect("Invalid ALL_T regex"));
static TO_BIN_ASSIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(TO_BIN\s*=).*$").expect("Invalid TO_BIN regex"));
static TO_MAN_ASSIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(TO_MAN\s*=).*$").expect("Invalid TO_MAN regex"));
static INSTALL_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^install: dummy\n").expect("Invalid install header regex"));
static NEXT_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\w").expect("Invalid rule regex"));
static READLINE_DEFINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^#define LUA_USE_READLINE.*\n").expect("Invalid readline regex")
});
static ROOT_DEFINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^#define LUA_ROOT[ \t]*".*?""#).expect("Invalid LUA_ROOT regex")
});
static TMPNAMBUFSIZE_DEFINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^#define LUA_TMPNAMBUFSIZE.*").expect("Invalid LUA_TMPNAMBUFSIZE regex")
});
// Takes backslash-continued lines along so multi-line definitions do not leave
// orphaned continuation lines behind.
static TMPNAM_DEFINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^#define lua_tmpnam\(b,e\)(?:.*\\\n)*.*").expect("Invalid lua_tmpnam regex")
});
static OS_EXECUTE_BODY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)static int os_execute .*?return 1;\s*}\n").expect("Invalid os_execute regex")
});
static IO_TMPFILE_BODY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)static int io_tmpfile \(lua_State \*L\) \{.*?\n}\n")
        .expect("Invalid io_tmpfile regex")
});

/// Compile flags written into the Lua build: composed flags plus fixed extras.
pub fn lua_cflags(ctx: &PatchContext) -> String {
    let cflags = ctx.cflags.trim();
    if cflags.is_empty() {
        LUA_EXTRA_CFLAGS.to_string()
    } else {
        format!("{} {}", cflags, LUA_EXTRA_CFLAGS)
    }
}

// ----------------------------------------------------------------------------
// src/Makefile
// ----------------------------------------------------------------------------

fn has_cc(text: &str, _: &PatchContext) -> bool {
    CC_ASSIGN.is_match(text)
}

fn set_compiler(text: &str, ctx: &PatchContext) -> String {
    set_assignment(&CC_ASSIGN, text, &ctx.cc)
}

fn has_cflags(text: &str, _: &PatchContext) -> bool {
    CFLAGS_ASSIGN.is_match(text) || MYCFLAGS_ASSIGN.is_match(text)
}

fn set_compile_flags(text: &str, ctx: &PatchContext) -> String {
    let flags = lua_cflags(ctx);
    let text = set_assignment(&CFLAGS_ASSIGN, text, &flags);
    set_assignment(&MYCFLAGS_ASSIGN, &text, &flags)
}

fn wants_link_flags(ctx: &PatchContext) -> bool {
    !ctx.ldflags.trim().is_empty()
}

fn has_ldflags(text: &str, _: &PatchContext) -> bool {
    MYLDFLAGS_ASSIGN.is_match(text) || MYLIBS_ASSIGN.is_match(text)
}

fn set_link_flags(text: &str, ctx: &PatchContext) -> String {
    let ldflags = ctx.ldflags.trim();
    let text = set_assignment(&MYLDFLAGS_ASSIGN, text, ldflags);
    set_assignment(&MYLIBS_ASSIGN, &text, ldflags)
}

fn has_all_t(text: &str, _: &PatchContext) -> bool {
    ALL_T_ASSIGN.is_match(text)
}

fn restrict_targets(text: &str, _: &PatchContext) -> String {
    set_assignment(&ALL_T_ASSIGN, text, LUA_ALL_TARGETS)
}

// ----------------------------------------------------------------------------
// Makefile (root)
// ----------------------------------------------------------------------------

fn has_install_paths(text: &str, _: &PatchContext) -> bool {
    TO_BIN_ASSIGN.is_match(text) || TO_MAN_ASSIGN.is_match(text)
}

fn strip_install_paths(text: &str, _: &PatchContext) -> String {
    let text = set_assignment(&TO_BIN_ASSIGN, text, "");
    set_assignment(&TO_MAN_ASSIGN, &text, "")
}

/// Byte range of the `install: dummy` recipe: from its header up to the next
/// line that starts a new rule or assignment.
fn install_recipe_span(text: &str) -> Option<(usize, usize)> {
    let header = INSTALL_HEADER.find(text)?;
    let next = NEXT_RULE.find_at(text, header.end())?;
    Some((header.start(), next.start()))
}

fn has_install_recipe(text: &str, _: &PatchContext) -> bool {
    install_recipe_span(text).is_some()
}

fn rewrite_install_recipe(text: &str, _: &PatchContext) -> String {
    match install_recipe_span(text) {
        Some((start, end)) => format!("{}{}{}", &text[..start], LUA_INSTALL_RECIPE, &text[end..]),
        None => text.to_string(),
    }
}

// ----------------------------------------------------------------------------
// src/luaconf.h
// ----------------------------------------------------------------------------

fn has_luaconf_anchors(text: &str, _: &PatchContext) -> bool {
    ROOT_DEFINE.is_match(text) || TMPNAM_DEFINE.is_match(text)
}

fn rewrite_luaconf(text: &str, ctx: &PatchContext) -> String {
    let root = format!("#define LUA_ROOT \"{}\"", ctx.install_dir);
    let text = replace_literal(&READLINE_DEFINE, text, "");
    let text = replace_literal(&ROOT_DEFINE, &text, &root);
    let text = replace_literal(&TMPNAMBUFSIZE_DEFINE, &text, LUA_TMPNAMBUFSIZE_DEFINE);
    replace_literal(&TMPNAM_DEFINE, &text, LUA_TMPNAM_DEFINE)
}

// ----------------------------------------------------------------------------
// src/loslib.c, src/liolib.c
// ----------------------------------------------------------------------------

fn has_os_execute(text: &str, _: &PatchContext) -> bool {
    OS_EXECUTE_BODY.is_match(text)
}

fn os_execute_stubbed(text: &str, _: &PatchContext) -> bool {
    text.contains(LUA_OS_EXECUTE_STUB)
}

fn stub_os_execute(text: &str, _: &PatchContext) -> String {
    replace_first_literal(&OS_EXECUTE_BODY, text, LUA_OS_EXECUTE_STUB)
}

fn has_io_tmpfile(text: &str, _: &PatchContext) -> bool {
    IO_TMPFILE_BODY.is_match(text)
}

fn io_tmpfile_stubbed(text: &str, _: &PatchContext) -> bool {
    text.contains(LUA_IO_TMPFILE_STUB)
}

fn stub_io_tmpfile(text: &str, _: &PatchContext) -> String {
    replace_first_literal(&IO_TMPFILE_BODY, text, LUA_IO_TMPFILE_STUB)
}

// ----------------------------------------------------------------------------
// src/lua.c
// ----------------------------------------------------------------------------

fn has_signal_include(text: &str, _: &PatchContext) -> bool {
    text.contains(LUA_SIGNAL_INCLUDE)
}

fn signal_guarded(text: &str, _: &PatchContext) -> bool {
    text.contains(LUA_SIGNAL_GUARD)
}

fn guard_signal(text: &str, _: &PatchContext) -> String {
    let guarded = format!("{}{}", LUA_SIGNAL_INCLUDE, LUA_SIGNAL_GUARD);
    text.replacen(LUA_SIGNAL_INCLUDE, &guarded, 1)
}

/// Lua steps in application order.
pub const STEPS: &[PatchStep] = &[
    PatchStep {
        name: "set-compiler",
        target: BUILD_MAKEFILE,
        idempotence: Idempotence::Natural,
        requested: always,
        precondition: has_cc,
        is_applied: None,
        apply: set_compiler,
    },
    PatchStep {
        name: "set-compile-flags",
        target: BUILD_MAKEFILE,
        idempotence: Idempotence::Natural,
        requested: always,
        precondition: has_cflags,
        is_applied: None,
        apply: set_compile_flags,
    },
    PatchStep {
        name: "set-link-flags",
        target: BUILD_MAKEFILE,
        idempotence: Idempotence::Natural,
        requested: wants_link_flags,
        precondition: has_ldflags,
        is_applied: None,
        apply: set_link_flags,
    },
    PatchStep {
        name: "restrict-build-targets",
        target: BUILD_MAKEFILE,
        idempotence: Idempotence::Natural,
        requested: always,
        precondition: has_all_t,
        is_applied: None,
        apply: restrict_targets,
    },
    PatchStep {
        name: "strip-install-paths",
        target: ROOT_MAKEFILE,
        idempotence: Idempotence::Natural,
        requested: always,
        precondition: has_install_paths,
        is_applied: None,
        apply: strip_install_paths,
    },
    PatchStep {
        name: "rewrite-install-recipe",
        target: ROOT_MAKEFILE,
        idempotence: Idempotence::Natural,
        requested: always,
        precondition: has_install_recipe,
        is_applied: None,
        apply: rewrite_install_recipe,
    },
    PatchStep {
        name: "rewrite-luaconf",
        target: LUACONF,
        idempotence: Idempotence::Natural,
        requested: always,
        precondition: has_luaconf_anchors,
        is_applied: None,
        apply: rewrite_luaconf,
    },
    PatchStep {
        name: "stub-os-execute",
        target: LOSLIB,
        idempotence: Idempotence::ReplaceOnce,
        requested: always,
        precondition: has_os_execute,
        is_applied: Some(os_execute_stubbed),
        apply: stub_os_execute,
    },
    PatchStep {
        name: "stub-io-tmpfile",
        target: LIOLIB,
        idempotence: Idempotence::ReplaceOnce,
        requested: always,
        precondition: has_io_tmpfile,
        is_applied: Some(io_tmpfile_stubbed),
        apply: stub_io_tmpfile,
    },
    PatchStep {
        name: "neutralize-signal",
        target: LUA_CLI,
        idempotence: Idempotence::Guarded,
        requested: always,
        precondition: has_signal_include,
        is_applied: Some(signal_guarded),
        apply: guard_signal,
    },
];
