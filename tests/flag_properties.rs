//! Property tests for the flag preset composer.

use std::path::PathBuf;

use proptest::prelude::*;
use wasi_prep::toolchain::flags::{strip_link_invalid, LINK_INVALID_EH_PAIR};
use wasi_prep::{compose, FlagField};

const EH_TOKENS: &[&str] = &[
    "-mllvm -wasm-enable-sjlj",
    "-fwasm-exceptions",
    "-fno-exceptions",
    "-mllvm -wasm-enable-eh",
    "-DLUAI_THROW_WASM",
];

fn eh_flags() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(EH_TOKENS), 0..6).prop_map(|t| t.join(" "))
}

fn dir() -> impl Strategy<Value = PathBuf> {
    "/[a-z]{1,8}(/[a-z0-9_-]{1,8}){0,3}".prop_map(PathBuf::from)
}

proptest! {
    #[test]
    fn compose_is_deterministic(patch in dir(), sysroot in dir(), eh in eh_flags()) {
        prop_assert_eq!(compose(&patch, &sysroot, &eh), compose(&patch, &sysroot, &eh));
    }

    #[test]
    fn link_presets_never_carry_the_sjlj_pair(patch in dir(), sysroot in dir(), eh in eh_flags()) {
        let flags = compose(&patch, &sysroot, &eh);
        for field in [FlagField::LinkCommon, FlagField::RuntimeLink] {
            prop_assert!(!flags.get(field).contains(LINK_INVALID_EH_PAIR));
        }
        prop_assert_eq!(flags.get(FlagField::LinkCommon), flags.get(FlagField::RuntimeLink));
    }

    #[test]
    fn other_eh_tokens_survive_stripping(eh in eh_flags()) {
        let stripped = strip_link_invalid(&eh);
        for token in EH_TOKENS.iter().filter(|t| **t != LINK_INVALID_EH_PAIR) {
            prop_assert_eq!(stripped.matches(token).count(), eh.matches(token).count());
        }
        prop_assert!(!stripped.contains("  "));
        prop_assert!(!stripped.starts_with(' '));
    }

    #[test]
    fn compile_presets_lead_with_eh_flags(patch in dir(), sysroot in dir(), eh in eh_flags()) {
        let flags = compose(&patch, &sysroot, &eh);
        for field in [FlagField::CompileCommon, FlagField::RuntimeCompile] {
            let value = flags.get(field);
            prop_assert!(value.starts_with(eh.trim()));
            let include = format!("-I{}/wasi-shim/include", patch.display());
            prop_assert!(value.contains(&include));
        }
    }

    #[test]
    fn sysroot_is_embedded_verbatim(patch in dir(), sysroot in dir()) {
        let flags = compose(&patch, &sysroot, "");
        let expected = format!("--target=wasm32-wasi --sysroot={} ", sysroot.display());
        prop_assert!(flags.get(FlagField::LinkCommon).starts_with(&expected));
    }
}

#[test]
fn test_link_stripping_example() {
    assert_eq!(
        strip_link_invalid("-mllvm -wasm-enable-sjlj -fno-exceptions"),
        "-fno-exceptions"
    );
}
