//! Patch orchestration: run a family's ordered step table over one tree.
//!
//! The orchestrator owns the ledger. Steps that replace whole function bodies
//! are recorded once applied. A rebuild skips a recorded step whose file was
//! edited locally; a file that carries upstream text again is patched again.

pub mod checkpoint;

use std::path::{Path, PathBuf};

pub use checkpoint::{PatchLedger, StepRecord, LEDGER_FILE};

use crate::error::PatchError;
use crate::models::{DependencyFamily, Idempotence, PatchContext, StepOutcome};
use crate::patcher::{steps_for, SourcePatcher};

/// Outcome of one family run over one tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    pub family: DependencyFamily,
    pub tree_root: PathBuf,
    /// Step name and outcome, in application order
    pub outcomes: Vec<(&'static str, StepOutcome)>,
}

impl PatchReport {
    pub fn count(&self, outcome: StepOutcome) -> usize {
        self.outcomes.iter().filter(|(_, o)| *o == outcome).count()
    }

    /// Steps that ran but could not confirm their effect
    pub fn warnings(&self) -> Vec<&'static str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_warning())
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn outcome_of(&self, step: &str) -> Option<StepOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| *name == step)
            .map(|(_, o)| *o)
    }
}

/// Apply every step of `family` to the tree at `tree_root`, in order.
///
/// With `force`, the ledger is neither consulted nor required to be readable;
/// steps still report `AlreadyApplied` when the file content says so.
/// The first fatal error stops the run after the ledger has been saved.
pub fn patch_tree(
    tree_root: &Path,
    family: DependencyFamily,
    ctx: &PatchContext,
    force: bool,
) -> Result<PatchReport, PatchError> {
    let patcher = SourcePatcher::new(tree_root.to_path_buf())?;
    log::info!(
        "[Patcher] Patching {} tree at {}",
        family,
        patcher.src_dir().display()
    );

    let mut ledger = match PatchLedger::load(tree_root, family) {
        Ok(ledger) => ledger,
        Err(e) if force => {
            log::warn!("[Patcher] Ignoring ledger (--force): {}", e);
            PatchLedger::new(family)
        }
        Err(e) => return Err(e),
    };

    let mut report = PatchReport {
        family,
        tree_root: tree_root.to_path_buf(),
        outcomes: Vec::new(),
    };
    let mut dirty = false;

    for step in steps_for(family) {
        let recorded = !force && ledger.contains(step.name);
        let outcome = match patcher.run_step(step, ctx, recorded) {
            Ok(outcome) => outcome,
            Err(e) => {
                if dirty {
                    ledger.save(tree_root)?;
                }
                return Err(e);
            }
        };

        if step.idempotence == Idempotence::ReplaceOnce
            && matches!(outcome, StepOutcome::Applied | StepOutcome::AlreadyApplied)
            && !ledger.contains(step.name)
        {
            ledger.record(step.name);
            dirty = true;
        }
        report.outcomes.push((step.name, outcome));
    }

    if dirty {
        ledger.save(tree_root)?;
    }

    let warnings = report.warnings();
    log::info!(
        "[Patcher] {} done: {} applied, {} already applied, {} skipped by ledger, {} warning(s)",
        family,
        report.count(StepOutcome::Applied),
        report.count(StepOutcome::AlreadyApplied),
        report.count(StepOutcome::SkippedByLedger),
        warnings.len()
    );
    if !warnings.is_empty() {
        log::warn!("[Patcher] Steps needing attention: {}", warnings.join(", "));
    }

    Ok(report)
}
