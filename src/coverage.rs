//! Coverage-guided test selection

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backend::{TestId, TestSelection};
use crate::error::{MutationError, Result};
use crate::mutant::MutantId;

/// Which tests reach each mutant, recorded by an instrumented baseline run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageMap {
    tests_by_mutant: BTreeMap<MutantId, BTreeSet<TestId>>,
}

impl CoverageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `test` reached `mutant`
    pub fn record(&mut self, mutant: MutantId, test: impl Into<TestId>) {
        self.tests_by_mutant
            .entry(mutant)
            .or_default()
            .insert(test.into());
    }

    pub fn tests_for(&self, mutant: MutantId) -> Option<&BTreeSet<TestId>> {
        self.tests_by_mutant.get(&mutant)
    }

    /// Tests to run for `mutant`; empty when no test reaches it
    pub fn selection_for(&self, mutant: MutantId) -> TestSelection {
        TestSelection::Only(self.tests_for(mutant).cloned().unwrap_or_default())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MutationError::FileReadError {
            file: path.to_path_buf(),
            error: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| MutationError::ConfigError {
            message: format!("Failed to parse coverage file '{}': {}", path.display(), e),
        })
    }
}

/// Selection for `mutant` given optional coverage data
pub fn select_tests(coverage: Option<&CoverageMap>, mutant: MutantId) -> TestSelection {
    match coverage {
        Some(map) => map.selection_for(mutant),
        None => TestSelection::All,
    }
}
