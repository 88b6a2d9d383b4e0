//! End-to-end mutation run
//!
//! catalog -> instrumented build -> baseline -> coverage -> execution -> report

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::backend::{Builder, CancellationToken, RunnerError, TestRunner};
use crate::catalog::CatalogBuilder;
use crate::codegen::SourceUnit;
use crate::compile::{compile_isolating, Instrumenter};
use crate::config::Config;
use crate::coverage::CoverageMap;
use crate::error::{MutationError, Result};
use crate::mutant::{IdAllocator, Mutant, MutantStatus};
use crate::mutators::MutatorRegistry;
use crate::report::{aggregate, MutationReport, ScoreOptions};
use crate::scheduler::{measure_baseline, Scheduler, SchedulerOptions};

/// Parsed sources of a project and the mutants found in them
#[derive(Debug)]
pub struct Catalog {
    pub units: Vec<SourceUnit>,
    /// Roots of the library and binary crates, each given the runtime selector
    pub crate_roots: Vec<PathBuf>,
    pub mutants: Vec<Mutant>,
}

/// Load the configured files and enumerate their mutants.
///
/// Every crate root is always loaded, since the runtime selector lives
/// there, but a root is only mutated when it is one of the configured files.
pub fn build_catalog(config: &Config, project_dir: &Path, registry: &MutatorRegistry) -> Result<Catalog> {
    let files = config.source_files(project_dir)?;
    let crate_roots = config.target_roots(project_dir);
    let mut units = Vec::with_capacity(files.len() + crate_roots.len());
    for file in &files {
        units.push(SourceUnit::load(project_dir, file)?);
    }
    for root in crate_roots.iter().filter(|root| !files.contains(root)) {
        units.push(SourceUnit::load(project_dir, root)?);
    }

    let builder = CatalogBuilder::new(registry);
    let mut ids = IdAllocator::new();
    let mut mutants = Vec::new();
    for unit in units.iter().filter(|u| files.contains(&u.path)) {
        let options = config.catalog_options(&unit.path);
        let found = builder.build(&unit.path, &unit.tree, &options, &mut ids);
        tracing::debug!("{}: {} mutant(s)", unit.path.display(), found.len());
        mutants.extend(found);
    }
    tracing::info!(
        "cataloged {} mutant(s) in {} file(s)",
        mutants.len(),
        files.len()
    );
    Ok(Catalog {
        units,
        crate_roots,
        mutants,
    })
}

/// Knobs for one run
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub scheduler: SchedulerOptions,
    pub coverage_analysis: bool,
    /// Load coverage from this file instead of capturing it
    pub coverage_file: Option<PathBuf>,
    pub score: ScoreOptions,
}

impl EngineOptions {
    pub fn from_config(config: &Config, project_dir: &Path) -> Self {
        Self {
            scheduler: config.scheduler_options(),
            coverage_analysis: config.settings.coverage_analysis,
            coverage_file: config
                .settings
                .coverage_file
                .as_ref()
                .map(|file| project_dir.join(file)),
            score: config.settings.score,
        }
    }
}

/// Runs a catalog against a build and test backend
pub struct Engine<'a, B, R> {
    builder: &'a B,
    runner: &'a R,
    options: EngineOptions,
    cancel: CancellationToken,
}

impl<'a, B, R> Engine<'a, B, R>
where
    B: Builder,
    R: TestRunner<Artifact = B::Artifact>,
{
    pub fn new(builder: &'a B, runner: &'a R, options: EngineOptions, cancel: CancellationToken) -> Self {
        Self {
            builder,
            runner,
            options,
            cancel,
        }
    }

    /// Execute every mutant of `catalog` and aggregate the verdicts.
    ///
    /// A cancelled run still produces a report; mutants that never ran are
    /// `Ignored`.
    pub fn run(&self, catalog: Catalog) -> Result<MutationReport> {
        let started = Instant::now();
        let Catalog {
            units,
            crate_roots,
            mut mutants,
        } = catalog;

        let build = {
            let instrumenter = Instrumenter::new(&units, &crate_roots, &mutants);
            compile_isolating(self.builder, &instrumenter)?
        };
        for mutant in mutants.iter_mut() {
            if let Some(reason) = build.compile_errors.get(&mutant.id) {
                mutant.set_status(MutantStatus::CompileError, Some(reason.clone()));
            }
        }

        let baseline = measure_baseline(self.runner, &build.artifact, &self.cancel)?;
        let coverage = self.capture_coverage(&build.artifact)?;

        let scheduler = Scheduler::new(
            self.runner,
            &build.artifact,
            self.options.scheduler.clone(),
            self.cancel.clone(),
        );
        let summary = scheduler.execute(&mut mutants, coverage.as_ref(), &baseline)?;
        if summary.cancelled {
            tracing::warn!("run cancelled after {} mutant(s)", summary.executed);
        }

        Ok(aggregate(&mutants, self.options.score)
            .with_cancelled(summary.cancelled)
            .with_duration(started.elapsed()))
    }

    fn capture_coverage(&self, artifact: &B::Artifact) -> Result<Option<CoverageMap>> {
        if !self.options.coverage_analysis || self.cancel.is_cancelled() {
            return Ok(None);
        }
        if let Some(file) = &self.options.coverage_file {
            let coverage = CoverageMap::load(file)?;
            tracing::info!("loaded coverage from {}", file.display());
            return Ok(Some(coverage));
        }
        match self.runner.capture_coverage(artifact, &self.cancel) {
            Ok(coverage) => Ok(coverage),
            Err(RunnerError::Spawn(reason)) => Err(MutationError::Infrastructure { reason }),
            Err(RunnerError::Crashed(reason)) => {
                tracing::warn!("coverage capture failed, running all tests: {}", reason);
                Ok(None)
            }
        }
    }
}
