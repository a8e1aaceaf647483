//! luv (libuv Lua bindings) source adaptation for WASI.
//!
//! Functions that cannot work on WASI are replaced by stubs that return
//! `UV_ENOSYS`. A stubbed function is never matched again: several stubs are
//! single-line and the body regexes would otherwise run on into the next
//! function.

use once_cell::sync::Lazy;
use regex::Regex;

use super::templates::{
    LUV_DNS_STUB, LUV_GETGID_STUB, LUV_GETUID_STUB, LUV_PROTO_NUM_TO_STRING_STUB,
    LUV_PROTO_STRING_TO_NUM_STUB, LUV_QUEUE_WORK_STUB, LUV_SETGID_STUB, LUV_SETUID_STUB,
    LUV_SIGNAL_GUARD, LUV_UV_INCLUDE,
};
use super::{always, replace_first_literal, PatchStep};
use crate::models::{Idempotence, PatchContext};

pub const LUV_HEADER: &str = "src/luv.h";
pub const CONSTANTS: &str = "src/constants.c";
pub const MISC: &str = "src/misc.c";
pub const WORK: &str = "src/work.c";
pub const DNS: &str = "src/dns.c";

/// A function body pattern paired with the stub that replaces it
type StubRule = (Regex, &'static str);

fn rule(pattern: &str, stub: &'static str) -> StubRule {
    (Regex::new(pattern).expect("Invalid stub regex"), stub)
}

static PROTO_RULES: Lazy<Vec<StubRule>> = Lazy::new(|| {
    vec![
        rule(
            r"(?s)static int luv_proto_string_to_num\(.*?\n}\n",
            LUV_PROTO_STRING_TO_NUM_STUB,
        ),
        rule(
            r"(?s)static const char\* luv_proto_num_to_string\(.*?\n}\n",
            LUV_PROTO_NUM_TO_STRING_STUB,
        ),
    ]
});

static IDENTITY_RULES: Lazy<Vec<StubRule>> = Lazy::new(|| {
    vec![
        rule(r"(?s)static int luv_getuid\(lua_State\* L\)\s*\{.*?\n}\n", LUV_GETUID_STUB),
        rule(r"(?s)static int luv_getgid\(lua_State\* L\)\s*\{.*?\n}\n", LUV_GETGID_STUB),
        rule(r"(?s)static int luv_setuid\(lua_State\* L\)\s*\{.*?\n}\n", LUV_SETUID_STUB),
        rule(r"(?s)static int luv_setgid\(lua_State\* L\)\s*\{.*?\n}\n", LUV_SETGID_STUB),
    ]
});

static QUEUE_WORK_RULES: Lazy<Vec<StubRule>> = Lazy::new(|| {
    vec![rule(
        r"(?s)static int luv_queue_work\(lua_State\* L\)\s*\{.*?\n}\n",
        LUV_QUEUE_WORK_STUB,
    )]
});

/// Every function of the table is either already stubbed or still has a body
/// the rule can find.
fn stubbable(text: &str, rules: &[StubRule]) -> bool {
    rules
        .iter()
        .all(|(re, stub)| text.contains(stub) || re.is_match(text))
}

fn all_stubbed(text: &str, rules: &[StubRule]) -> bool {
    rules.iter().all(|(_, stub)| text.contains(stub))
}

fn stub_functions(text: &str, rules: &[StubRule]) -> String {
    let mut out = text.to_string();
    for (re, stub) in rules {
        if !out.contains(stub) {
            out = replace_first_literal(re, &out, stub);
        }
    }
    out
}

// ----------------------------------------------------------------------------
// src/luv.h
// ----------------------------------------------------------------------------

fn has_uv_include(text: &str, _: &PatchContext) -> bool {
    text.contains(LUV_UV_INCLUDE)
}

fn emulation_guarded(text: &str, _: &PatchContext) -> bool {
    text.contains(LUV_SIGNAL_GUARD)
}

fn add_emulation_guard(text: &str, _: &PatchContext) -> String {
    let guarded = format!("{}{}", LUV_SIGNAL_GUARD, LUV_UV_INCLUDE);
    text.replacen(LUV_UV_INCLUDE, &guarded, 1)
}

// ----------------------------------------------------------------------------
// src/constants.c, src/misc.c, src/work.c
// ----------------------------------------------------------------------------

fn has_proto_lookups(text: &str, _: &PatchContext) -> bool {
    stubbable(text, &PROTO_RULES)
}

fn proto_lookups_stubbed(text: &str, _: &PatchContext) -> bool {
    all_stubbed(text, &PROTO_RULES)
}

fn stub_proto_lookups(text: &str, _: &PatchContext) -> String {
    stub_functions(text, &PROTO_RULES)
}

fn has_identity_calls(text: &str, _: &PatchContext) -> bool {
    stubbable(text, &IDENTITY_RULES)
}

fn identity_calls_stubbed(text: &str, _: &PatchContext) -> bool {
    all_stubbed(text, &IDENTITY_RULES)
}

fn stub_identity_calls(text: &str, _: &PatchContext) -> String {
    stub_functions(text, &IDENTITY_RULES)
}

fn has_queue_work(text: &str, _: &PatchContext) -> bool {
    stubbable(text, &QUEUE_WORK_RULES)
}

fn queue_work_stubbed(text: &str, _: &PatchContext) -> bool {
    all_stubbed(text, &QUEUE_WORK_RULES)
}

fn stub_queue_work(text: &str, _: &PatchContext) -> String {
    stub_functions(text, &QUEUE_WORK_RULES)
}

// ----------------------------------------------------------------------------
// src/dns.c
// ----------------------------------------------------------------------------

/// Upstream resolver code is still present
fn uses_resolver(text: &str, _: &PatchContext) -> bool {
    text.contains("<netdb.h>") || text.contains("struct addrinfo")
}

fn dns_stubbed(text: &str, _: &PatchContext) -> bool {
    text == LUV_DNS_STUB
}

fn stub_dns(_: &str, _: &PatchContext) -> String {
    LUV_DNS_STUB.to_string()
}

/// luv steps in application order.
pub const STEPS: &[PatchStep] = &[
    PatchStep {
        name: "add-emulation-guard",
        target: LUV_HEADER,
        idempotence: Idempotence::Guarded,
        requested: always,
        precondition: has_uv_include,
        is_applied: Some(emulation_guarded),
        apply: add_emulation_guard,
    },
    PatchStep {
        name: "stub-protocol-lookups",
        target: CONSTANTS,
        idempotence: Idempotence::ReplaceOnce,
        requested: always,
        precondition: has_proto_lookups,
        is_applied: Some(proto_lookups_stubbed),
        apply: stub_proto_lookups,
    },
    PatchStep {
        name: "stub-identity-calls",
        target: MISC,
        idempotence: Idempotence::ReplaceOnce,
        requested: always,
        precondition: has_identity_calls,
        is_applied: Some(identity_calls_stubbed),
        apply: stub_identity_calls,
    },
    PatchStep {
        name: "stub-queue-work",
        target: WORK,
        idempotence: Idempotence::ReplaceOnce,
        requested: always,
        precondition: has_queue_work,
        is_applied: Some(queue_work_stubbed),
        apply: stub_queue_work,
    },
    PatchStep {
        name: "stub-dns",
        target: DNS,
        idempotence: Idempotence::ReplaceOnce,
        requested: always,
        precondition: uses_resolver,
        is_applied: Some(dns_stubbed),
        apply: stub_dns,
    },
];
