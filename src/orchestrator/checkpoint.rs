//! Per-tree ledger of applied patch steps.
//!
//! Stored as `<tree>/.wasi-prep-state.json`. Only steps whose rewrite cannot be
//! safely re-run consult it; every other step re-derives its state from the
//! file content.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::PatchError;
use crate::models::DependencyFamily;

/// Ledger file name inside a dependency tree
pub const LEDGER_FILE: &str = ".wasi-prep-state.json";

/// One recorded step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub applied_at: DateTime<Utc>,
}

/// Serialized ledger content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchLedger {
    pub family: DependencyFamily,
    #[serde(default)]
    pub steps: BTreeMap<String, StepRecord>,
}

impl PatchLedger {
    pub fn new(family: DependencyFamily) -> Self {
        PatchLedger {
            family,
            steps: BTreeMap::new(),
        }
    }

    /// Ledger location for a tree
    pub fn path_for(tree_root: &Path) -> PathBuf {
        tree_root.join(LEDGER_FILE)
    }

    /// Load the ledger of a tree. A missing file yields an empty ledger; a
    /// ledger written for another family is rejected.
    pub fn load(tree_root: &Path, family: DependencyFamily) -> Result<Self, PatchError> {
        let path = Self::path_for(tree_root);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PatchLedger::new(family));
            }
            Err(e) => return Err(PatchError::io(path, e)),
        };

        let ledger: PatchLedger = serde_json::from_str(&content)
            .map_err(|e| PatchError::LedgerCorrupt(format!("{}: {}", path.display(), e)))?;

        if ledger.family != family {
            return Err(PatchError::LedgerCorrupt(format!(
                "{} belongs to {}, not {}",
                path.display(),
                ledger.family,
                family
            )));
        }

        log::debug!(
            "[Patcher] Loaded ledger with {} recorded step(s) from {}",
            ledger.steps.len(),
            path.display()
        );
        Ok(ledger)
    }

    /// Write the ledger atomically (temp file + rename).
    pub fn save(&self, tree_root: &Path) -> Result<(), PatchError> {
        let path = Self::path_for(tree_root);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PatchError::LedgerCorrupt(e.to_string()))?;

        let mut tmp = NamedTempFile::new_in(tree_root).map_err(|e| PatchError::io(tree_root, e))?;
        writeln!(tmp, "{}", json).map_err(|e| PatchError::io(&path, e))?;
        tmp.persist(&path)
            .map_err(|e| PatchError::io(&path, e.error))?;
        Ok(())
    }

    pub fn contains(&self, step: &str) -> bool {
        self.steps.contains_key(step)
    }

    /// Record a step, keeping the first timestamp if it was already recorded.
    pub fn record(&mut self, step: &str) {
        self.steps
            .entry(step.to_string())
            .or_insert_with(|| StepRecord {
                applied_at: Utc::now(),
            });
    }
}
