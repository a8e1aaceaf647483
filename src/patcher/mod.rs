//! Source patching for vendored dependencies.
//!
//! A patch is a table of [`PatchStep`]s. Each step targets one file relative to
//! the tree root and declares how it stays safe under re-application
//! ([`Idempotence`]). [`SourcePatcher::run_step`] is the single place that
//! reads, checks, rewrites and verifies a file, so "the anchor text is gone"
//! surfaces as [`StepOutcome::PreconditionMissing`] instead of a silent no-op.

pub mod libuv;
pub mod lua;
pub mod luv;
pub mod templates;

#[cfg(test)]
mod tests;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use regex::{Captures, Regex};
use tempfile::NamedTempFile;

use crate::error::PatchError;
use crate::models::{DependencyFamily, Idempotence, PatchContext, StepOutcome};

/// Result type for patching operations
pub type PatchResult<T> = std::result::Result<T, PatchError>;

/// Text predicate evaluated against a target file
pub type Predicate = fn(&str, &PatchContext) -> bool;

/// Pure text rewrite of a target file
pub type Rewrite = fn(&str, &PatchContext) -> String;

/// One atomic textual transformation of one file.
#[derive(Clone, Copy)]
pub struct PatchStep {
    /// Stable identifier, also the ledger key
    pub name: &'static str,
    /// Target file relative to the tree root
    pub target: &'static str,
    pub idempotence: Idempotence,
    /// Whether the inputs ask for this step at all
    pub requested: fn(&PatchContext) -> bool,
    /// The anchor text the rewrite needs is present
    pub precondition: Predicate,
    /// The file already carries the result. `None` means the rewrite is its
    /// own fixed point: applied iff rewriting changes nothing.
    pub is_applied: Option<Predicate>,
    pub apply: Rewrite,
}

impl std::fmt::Debug for PatchStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchStep")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("idempotence", &self.idempotence)
            .finish()
    }
}

impl PatchStep {
    /// Check whether `text` already carries this step's result.
    pub fn applied_to(&self, text: &str, ctx: &PatchContext) -> bool {
        match self.is_applied {
            Some(pred) => pred(text, ctx),
            None => (self.precondition)(text, ctx) && (self.apply)(text, ctx) == text,
        }
    }
}

/// Step that runs whenever its family runs
pub fn always(_: &PatchContext) -> bool {
    true
}

/// Precondition that holds for any content (whole-file replacement)
pub fn any_text(_: &str, _: &PatchContext) -> bool {
    true
}

/// Ordered step table for a dependency family.
pub fn steps_for(family: DependencyFamily) -> &'static [PatchStep] {
    match family {
        DependencyFamily::Lua => lua::STEPS,
        DependencyFamily::Luv => luv::STEPS,
        DependencyFamily::Libuv => libuv::STEPS,
    }
}

/// Look up a single step of a family by name.
pub fn find_step(family: DependencyFamily, name: &str) -> Option<&'static PatchStep> {
    steps_for(family).iter().find(|s| s.name == name)
}

// ============================================================================
// SHARED REWRITE HELPERS
// ============================================================================

/// Rewrite every `VAR = ...` line matched by `re` (capture 1 = `VAR =`) to
/// carry `value` instead. An empty value blanks the assignment.
pub(crate) fn set_assignment(re: &Regex, text: &str, value: &str) -> String {
    re.replace_all(text, |caps: &Captures| {
        if value.is_empty() {
            caps[1].to_string()
        } else {
            format!("{} {}", &caps[1], value)
        }
    })
    .into_owned()
}

/// Replace every match of `re` with `replacement`, taken literally.
pub(crate) fn replace_literal(re: &Regex, text: &str, replacement: &str) -> String {
    re.replace_all(text, regex::NoExpand(replacement)).into_owned()
}

/// Replace the first match of `re` with `replacement`, taken literally.
pub(crate) fn replace_first_literal(re: &Regex, text: &str, replacement: &str) -> String {
    re.replace(text, regex::NoExpand(replacement)).into_owned()
}

// ============================================================================
// FILE DRIVER
// ============================================================================

/// Applies patch steps to one vendored source tree.
#[derive(Debug)]
pub struct SourcePatcher {
    /// Root of the dependency checkout
    src_dir: PathBuf,
}

impl SourcePatcher {
    /// Create a patcher for an existing source tree
    pub fn new(src_dir: PathBuf) -> PatchResult<Self> {
        if !src_dir.is_dir() {
            return Err(PatchError::SourceDirNotFound(src_dir));
        }
        Ok(SourcePatcher { src_dir })
    }

    pub fn src_dir(&self) -> &Path {
        &self.src_dir
    }

    /// Resolve a step's target inside the tree
    pub fn target_path(&self, step: &PatchStep) -> PathBuf {
        self.src_dir.join(step.target)
    }

    /// Read a target file. A missing file is fatal.
    pub fn read_target(&self, step: &PatchStep) -> PatchResult<String> {
        let path = self.target_path(step);
        if !path.is_file() {
            return Err(PatchError::FileNotFound(path));
        }
        fs::read_to_string(&path).map_err(|e| PatchError::io(path, e))
    }

    /// Replace a target file's content via write-to-temp + rename, keeping
    /// the original permissions.
    pub fn write_target(&self, step: &PatchStep, content: &str) -> PatchResult<()> {
        let path = self.target_path(step);
        let parent = path.parent().unwrap_or(&self.src_dir).to_path_buf();
        let perms = fs::metadata(&path)
            .map_err(|e| PatchError::io(&path, e))?
            .permissions();

        let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| PatchError::io(&parent, e))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| PatchError::io(&path, e))?;
        tmp.as_file()
            .set_permissions(perms)
            .map_err(|e| PatchError::io(&path, e))?;
        tmp.persist(&path)
            .map_err(|e| PatchError::io(&path, e.error))?;
        Ok(())
    }

    /// Run one step: check, rewrite, verify.
    ///
    /// `recorded` tells whether a ledger already lists this step for the tree;
    /// only [`Idempotence::ReplaceOnce`] steps honour it, and only while the
    /// file no longer carries the upstream anchor text. A recorded step whose
    /// file is back to upstream text is applied again.
    pub fn run_step(
        &self,
        step: &PatchStep,
        ctx: &PatchContext,
        recorded: bool,
    ) -> PatchResult<StepOutcome> {
        if !(step.requested)(ctx) {
            log::debug!("[Patcher] [{}] Not requested by inputs", step.name);
            return Ok(StepOutcome::NotRequested);
        }

        let text = self.read_target(step)?;

        if step.applied_to(&text, ctx) {
            log::debug!("[Patcher] [{}] Already applied to {}", step.name, step.target);
            return Ok(StepOutcome::AlreadyApplied);
        }

        let anchored = (step.precondition)(&text, ctx);

        if recorded && step.idempotence == Idempotence::ReplaceOnce {
            if !anchored {
                log::debug!(
                    "[Patcher] [{}] Recorded in ledger and edited locally, skipping",
                    step.name
                );
                return Ok(StepOutcome::SkippedByLedger);
            }
            log::warn!(
                "[Patcher] [{}] Recorded in ledger but {} carries upstream text again; re-applying",
                step.name,
                self.target_path(step).display()
            );
        }

        if !anchored {
            log::warn!(
                "[Patcher] [{}] Anchor text not found in {}; step did nothing",
                step.name,
                self.target_path(step).display()
            );
            return Ok(StepOutcome::PreconditionMissing);
        }

        let patched = (step.apply)(&text, ctx);
        if patched != text {
            self.write_target(step, &patched)?;
        }

        if !step.applied_to(&patched, ctx) {
            log::warn!(
                "[Patcher] [{}] Rewrote {} but the result does not verify",
                step.name,
                step.target
            );
            return Ok(StepOutcome::VerificationFailed);
        }

        log::info!("[Patcher] [{}] Patched {}", step.name, step.target);
        Ok(StepOutcome::Applied)
    }
}

/// Apply a single step to a tree without consulting any ledger.
pub fn apply_step(
    tree_root: &Path,
    step: &PatchStep,
    ctx: &PatchContext,
) -> PatchResult<StepOutcome> {
    SourcePatcher::new(tree_root.to_path_buf())?.run_step(step, ctx, false)
}
