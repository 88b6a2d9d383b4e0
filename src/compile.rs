//! Building the instrumented artifact
//!
//! All mutants go into one build. When that build fails, the baseline is
//! compiled on its own to tell a broken project from broken mutants; faulty
//! mutants are then isolated by bisection, marked `CompileError` and left out
//! of the next attempt.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::backend::Builder;
use crate::codegen::SourceUnit;
use crate::error::{MutationError, Result};
use crate::injector::{self, InstrumentedUnit};
use crate::mutant::{Mutant, MutantId};

/// The single instrumented build of a run
#[derive(Debug)]
pub struct CompiledBuild<A> {
    pub artifact: A,
    pub units: Vec<InstrumentedUnit>,
    /// Mutants excluded from the build, with the reason
    pub compile_errors: BTreeMap<MutantId, String>,
    /// Number of compiler invocations it took
    pub attempts: usize,
}

/// Instruments source units with a chosen subset of mutants
pub struct Instrumenter<'a> {
    units: &'a [SourceUnit],
    crate_roots: &'a [PathBuf],
    mutants: &'a [Mutant],
}

impl<'a> Instrumenter<'a> {
    /// `crate_roots` are the roots of every crate the units are compiled
    /// into; each gets its own copy of the runtime module.
    pub fn new(units: &'a [SourceUnit], crate_roots: &'a [PathBuf], mutants: &'a [Mutant]) -> Self {
        Self {
            units,
            crate_roots,
            mutants,
        }
    }

    /// Instrument every unit with the mutants in `ids`. Returns the units
    /// and the mutants that could not be injected.
    pub fn instrument(
        &self,
        ids: &BTreeSet<MutantId>,
    ) -> Result<(Vec<InstrumentedUnit>, Vec<MutationError>)> {
        if self.crate_roots.is_empty() {
            return Err(MutationError::ConfigError {
                message: "no crate root to add the runtime selector to".to_string(),
            });
        }
        if let Some(missing) = self
            .crate_roots
            .iter()
            .find(|root| !self.units.iter().any(|u| &u.path == *root))
        {
            return Err(MutationError::ConfigError {
                message: format!(
                    "crate root '{}' is not among the loaded source files",
                    missing.display()
                ),
            });
        }
        let selected: Vec<&Mutant> = self.mutants.iter().filter(|m| ids.contains(&m.id)).collect();
        let mut units = Vec::with_capacity(self.units.len());
        let mut conflicts = Vec::new();
        for unit in self.units {
            let mut injection = injector::inject(&unit.path, &unit.tree, selected.iter().copied());
            if self.crate_roots.contains(&unit.path) {
                injector::add_runtime(&mut injection.unit.tree);
            }
            conflicts.append(&mut injection.conflicts);
            units.push(injection.unit);
        }
        Ok((units, conflicts))
    }
}

/// Compile every mutant into one artifact, excluding the ones that break it.
pub fn compile_isolating<B: Builder>(
    builder: &B,
    instrumenter: &Instrumenter<'_>,
) -> Result<CompiledBuild<B::Artifact>> {
    let mut compile_errors = BTreeMap::new();
    let all: BTreeSet<MutantId> = instrumenter.mutants.iter().map(|m| m.id).collect();
    let (_, conflicts) = instrumenter.instrument(&all)?;
    for conflict in conflicts {
        if let MutationError::InjectionConflict { id, reason, .. } = conflict {
            compile_errors.insert(id, format!("injection conflict: {}", reason));
        }
    }

    let mut bisector = Bisector {
        builder,
        instrumenter,
        attempts: 0,
    };
    let mut candidates: BTreeSet<MutantId> = all
        .into_iter()
        .filter(|id| !compile_errors.contains_key(id))
        .collect();
    let mut baseline_checked = false;

    loop {
        let (units, _) = instrumenter.instrument(&candidates)?;
        bisector.attempts += 1;
        let diagnostics = match builder.compile(&units) {
            Ok(artifact) => {
                tracing::info!(
                    "instrumented build ready: {} mutant(s), {} excluded, {} compile attempt(s)",
                    candidates.len(),
                    compile_errors.len(),
                    bisector.attempts
                );
                return Ok(CompiledBuild {
                    artifact,
                    units,
                    compile_errors,
                    attempts: bisector.attempts,
                });
            }
            Err(diagnostics) => diagnostics,
        };

        if candidates.is_empty() {
            return Err(MutationError::CompileFailure { diagnostics });
        }
        if !baseline_checked {
            if bisector.fails(&BTreeSet::new())? {
                return Err(MutationError::CompileFailure { diagnostics });
            }
            baseline_checked = true;
        }

        tracing::warn!(
            "instrumented build failed with {} diagnostic(s); isolating faulty mutants",
            diagnostics.len()
        );
        let suspects: Vec<MutantId> = candidates.iter().copied().collect();
        let faulty = bisector.isolate(&suspects)?;
        let reason = diagnostics
            .first()
            .map(|d| d.rendered.lines().next().unwrap_or_default().to_string())
            .unwrap_or_else(|| "build failed".to_string());
        for id in faulty {
            tracing::debug!("mutant {} excluded: does not compile", id);
            candidates.remove(&id);
            compile_errors.insert(id, reason.clone());
        }
    }
}

struct Bisector<'a, 'i, B: Builder> {
    builder: &'a B,
    instrumenter: &'a Instrumenter<'i>,
    attempts: usize,
}

impl<B: Builder> Bisector<'_, '_, B> {
    fn fails(&mut self, ids: &BTreeSet<MutantId>) -> Result<bool> {
        let (units, _) = self.instrumenter.instrument(ids)?;
        self.attempts += 1;
        Ok(self.builder.compile(&units).is_err())
    }

    /// Find the mutants in `suspects` that break the build. `suspects` is
    /// known to fail. When a failure only shows up for a combination, the
    /// whole combination is returned.
    fn isolate(&mut self, suspects: &[MutantId]) -> Result<Vec<MutantId>> {
        if suspects.len() <= 1 {
            return Ok(suspects.to_vec());
        }
        let (left, right) = suspects.split_at(suspects.len() / 2);
        let left_fails = self.fails(&left.iter().copied().collect())?;
        let right_fails = self.fails(&right.iter().copied().collect())?;
        if !left_fails && !right_fails {
            return Ok(suspects.to_vec());
        }
        let mut faulty = Vec::new();
        if left_fails {
            faulty.extend(self.isolate(left)?);
        }
        if right_fails {
            faulty.extend(self.isolate(right)?);
        }
        Ok(faulty)
    }
}
