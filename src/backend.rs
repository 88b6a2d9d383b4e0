//! Build and test collaborators
//!
//! The engine never compiles or runs anything itself. It hands instrumented
//! trees to a [`Builder`] and drives a [`TestRunner`] against the resulting
//! artifact, one active mutant id per run.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::coverage::CoverageMap;
use crate::error::Diagnostic;
use crate::injector::InstrumentedUnit;
use crate::mutant::MutantId;

/// Opaque test identifier as understood by the runner
pub type TestId = String;

/// Which tests a run executes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestSelection {
    All,
    Only(BTreeSet<TestId>),
}

impl TestSelection {
    pub fn is_empty(&self) -> bool {
        matches!(self, TestSelection::Only(tests) if tests.is_empty())
    }

    /// Whether two selections could execute a common test
    pub fn overlaps(&self, other: &TestSelection) -> bool {
        match (self, other) {
            (TestSelection::Only(a), TestSelection::Only(b)) => !a.is_disjoint(b),
            _ => !self.is_empty() && !other.is_empty(),
        }
    }
}

/// Run-wide cancellation flag, cheap to clone and share with workers
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// How the control value reaches a test process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    /// Every run gets its own process environment; runs never see each
    /// other's active mutant.
    PerProcess,
    /// Concurrent runs share the control value; runs touching a common test
    /// must not overlap.
    Shared,
}

/// One request to execute tests against the instrumented artifact
#[derive(Debug, Clone)]
pub struct RunRequest<'a> {
    pub active: MutantId,
    pub tests: &'a TestSelection,
    pub deadline: Option<Duration>,
    pub cancel: &'a CancellationToken,
}

/// How the test process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Success,
    Failure(i32),
    /// Terminated by a signal or an abort
    Crashed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub name: TestId,
    pub passed: bool,
    pub duration: Option<Duration>,
}

/// Observed result of one test run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub tests: Vec<TestResult>,
    pub exit: ExitKind,
    pub timed_out: bool,
    /// The run was stopped because the cancellation token fired
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn failed_tests(&self) -> impl Iterator<Item = &TestResult> {
        self.tests.iter().filter(|t| !t.passed)
    }

    pub fn all_passed(&self) -> bool {
        self.exit == ExitKind::Success && self.tests.iter().all(|t| t.passed)
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    /// The test process could not be started at all
    #[error("failed to spawn test process: {0}")]
    Spawn(String),
    /// The worker died while executing
    #[error("test worker crashed: {0}")]
    Crashed(String),
}

/// Compiles instrumented compilation units
pub trait Builder {
    type Artifact: Send + Sync;

    fn compile(&self, units: &[InstrumentedUnit]) -> Result<Self::Artifact, Vec<Diagnostic>>;
}

/// Executes tests against a build artifact
pub trait TestRunner: Sync {
    type Artifact: Send + Sync;

    fn isolation(&self) -> Isolation {
        Isolation::PerProcess
    }

    fn run(&self, artifact: &Self::Artifact, request: &RunRequest<'_>) -> Result<RunOutcome, RunnerError>;

    /// Record which tests reach which mutants. `None` when unsupported.
    fn capture_coverage(
        &self,
        _artifact: &Self::Artifact,
        _cancel: &CancellationToken,
    ) -> Result<Option<CoverageMap>, RunnerError> {
        Ok(None)
    }
}
