//! libuv WASI platform stub (`src/wasi/stub.c`) completion.
//!
//! Some upstream archives ship a truncated stub: the UTF-16/WTF-8 helper tail
//! is cut off and the single-threaded primitives are missing. The tail is
//! restored first so that appending never lands inside a half-written
//! function, then only the primitives without a definition are appended.

use once_cell::sync::Lazy;
use regex::Regex;

use super::templates::{LIBUV_EXTRA_HEADER, LIBUV_PRIMITIVES, LIBUV_UTF16_TAIL};
use super::{always, any_text, PatchStep};
use crate::models::{Idempotence, PatchContext};

pub const WASI_STUB: &str = "src/wasi/stub.c";

/// First symbol of the helper tail
const UTF16_ANCHOR: &str = "int uv_utf16_to_wtf8";

/// Symbols whose absence marks the stub as incomplete
const REQUIRED_SYMBOLS: &[&str] = &["uv_gettimeofday", "uv_thread_self"];

/// Matches a definition (not a declaration or call) of `name` at line start.
fn definition_regex(name: &str) -> Regex {
    let pattern = format!(
        r"(?m)^[A-Za-z_][\w \t\*]*\b{}\s*\([^;{{]*\)\s*\{{",
        regex::escape(name)
    );
    Regex::new(&pattern).expect("Invalid definition regex")
}

static PRIMITIVE_DEFS: Lazy<Vec<(&'static str, Regex, &'static str)>> = Lazy::new(|| {
    LIBUV_PRIMITIVES
        .iter()
        .map(|(name, body)| (*name, definition_regex(name), *body))
        .collect()
});

/// Whether `text` defines the primitive `name`.
pub fn defines(text: &str, name: &str) -> bool {
    PRIMITIVE_DEFS
        .iter()
        .find(|(n, _, _)| *n == name)
        .map(|(_, re, _)| re.is_match(text))
        .unwrap_or_else(|| definition_regex(name).is_match(text))
}

/// Primitives with no definition in `text`, in canonical order.
pub fn missing_primitives(text: &str) -> Vec<&'static str> {
    PRIMITIVE_DEFS
        .iter()
        .filter(|(_, re, _)| !re.is_match(text))
        .map(|(name, _, _)| *name)
        .collect()
}

// ----------------------------------------------------------------------------
// restore-utf16-helpers
// ----------------------------------------------------------------------------

fn has_utf16_anchor(text: &str, _: &PatchContext) -> bool {
    text.contains(UTF16_ANCHOR)
}

fn utf16_tail_restored(text: &str, _: &PatchContext) -> bool {
    text.contains(LIBUV_UTF16_TAIL)
}

fn restore_utf16_tail(text: &str, _: &PatchContext) -> String {
    match text.find(UTF16_ANCHOR) {
        Some(at) => format!("{}{}", &text[..at], LIBUV_UTF16_TAIL),
        None => text.to_string(),
    }
}

// ----------------------------------------------------------------------------
// append-platform-primitives
// ----------------------------------------------------------------------------

fn primitives_present(text: &str, _: &PatchContext) -> bool {
    REQUIRED_SYMBOLS.iter().all(|name| defines(text, name))
}

fn append_primitives(text: &str, _: &PatchContext) -> String {
    let mut out = text.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }

    let missing: Vec<_> = PRIMITIVE_DEFS
        .iter()
        .filter(|(_, re, _)| !re.is_match(text))
        .collect();
    if !missing.is_empty() {
        out.push_str(LIBUV_EXTRA_HEADER);
        for (i, (_, _, body)) in missing.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(body);
        }
    }

    if !out.contains("uv_utf16_to_wtf8") {
        out.push('\n');
        out.push_str(LIBUV_UTF16_TAIL);
    }
    out
}

/// libuv steps in application order.
pub const STEPS: &[PatchStep] = &[
    PatchStep {
        name: "restore-utf16-helpers",
        target: WASI_STUB,
        idempotence: Idempotence::Guarded,
        requested: always,
        precondition: has_utf16_anchor,
        is_applied: Some(utf16_tail_restored),
        apply: restore_utf16_tail,
    },
    PatchStep {
        name: "append-platform-primitives",
        target: WASI_STUB,
        idempotence: Idempotence::Guarded,
        requested: always,
        precondition: any_text,
        is_applied: Some(primitives_present),
        apply: append_primitives,
    },
];
