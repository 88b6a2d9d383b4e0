//! Mutant execution scheduling
//!
//! Every mutant starts `Pending` and moves exactly once to a terminal status.
//! Mutants are dispatched to a bounded pool of worker threads that all run
//! tests against the same instrumented artifact; each worker owns the status
//! of the mutant it executes until it records a verdict.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crossbeam_deque::{Injector, Steal, Stealer, Worker as DequeWorker};

use crate::backend::{
    CancellationToken, ExitKind, Isolation, RunOutcome, RunRequest, RunnerError, TestId,
    TestRunner, TestSelection,
};
use crate::coverage::{select_tests, CoverageMap};
use crate::error::{MutationError, Result};
use crate::mutant::{Mutant, MutantId, MutantStatus};

/// Deadline derivation from baseline timing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeoutPolicy {
    pub multiplier: f64,
    pub margin: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            multiplier: 1.5,
            margin: Duration::from_secs(5),
        }
    }
}

impl TimeoutPolicy {
    /// Baseline time of the selected tests (the whole baseline run when
    /// per-test timings are unknown) times the multiplier, plus the margin.
    pub fn deadline(&self, baseline: &BaselineTiming, tests: &TestSelection) -> Duration {
        let base = match tests {
            TestSelection::Only(selected)
                if selected.iter().all(|t| baseline.per_test.contains_key(t)) =>
            {
                selected.iter().map(|t| baseline.per_test[t]).sum()
            }
            _ => baseline.total,
        };
        base.mul_f64(self.multiplier) + self.margin
    }
}

/// Timings of the unmutated test run
#[derive(Debug, Clone, Default)]
pub struct BaselineTiming {
    pub total: Duration,
    pub per_test: HashMap<TestId, Duration>,
}

/// Run every test against the baseline. Every test must pass.
pub fn measure_baseline<R: TestRunner>(
    runner: &R,
    artifact: &R::Artifact,
    cancel: &CancellationToken,
) -> Result<BaselineTiming> {
    let all = TestSelection::All;
    let request = RunRequest {
        active: MutantId::BASELINE,
        tests: &all,
        deadline: None,
        cancel,
    };
    let outcome = runner.run(artifact, &request).map_err(|e| match e {
        RunnerError::Spawn(reason) => MutationError::Infrastructure { reason },
        RunnerError::Crashed(reason) => MutationError::InitialTestRunFailed { reason },
    })?;
    if !outcome.cancelled && !outcome.all_passed() {
        let failing: Vec<&str> = outcome.failed_tests().map(|t| t.name.as_str()).collect();
        let reason = if outcome.timed_out {
            "baseline run timed out".to_string()
        } else if failing.is_empty() {
            format!("test process ended with {:?}", outcome.exit)
        } else {
            format!("failing tests: {}", failing.join(", "))
        };
        return Err(MutationError::InitialTestRunFailed { reason });
    }
    tracing::info!(
        "baseline: {} test(s) passed in {:.2}s",
        outcome.tests.len(),
        outcome.elapsed.as_secs_f64()
    );
    Ok(BaselineTiming {
        total: outcome.elapsed,
        per_test: outcome
            .tests
            .iter()
            .filter_map(|t| t.duration.map(|d| (t.name.clone(), d)))
            .collect(),
    })
}

/// Terminal outcome of one mutant
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub status: MutantStatus,
    pub detail: Option<String>,
    pub duration: Option<Duration>,
}

impl Verdict {
    pub fn new(status: MutantStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: Some(detail.into()),
            duration: None,
        }
    }
}

/// Decide a verdict from an observed run
pub fn classify(outcome: &RunOutcome) -> Verdict {
    let mut verdict = if outcome.timed_out {
        Verdict::new(MutantStatus::Timeout, "exceeded deadline")
    } else if let Some(test) = outcome.failed_tests().next() {
        Verdict::new(MutantStatus::Killed, format!("killed by {}", test.name))
    } else {
        match outcome.exit {
            ExitKind::Success => Verdict {
                status: MutantStatus::Survived,
                detail: None,
                duration: None,
            },
            ExitKind::Failure(code) => Verdict::new(
                MutantStatus::Killed,
                format!("test process exited with code {}", code),
            ),
            ExitKind::Crashed => Verdict::new(MutantStatus::Killed, "test process crashed"),
        }
    };
    verdict.duration = Some(outcome.elapsed);
    verdict
}

const PENDING: u8 = 0;

fn encode(status: MutantStatus) -> u8 {
    match status {
        MutantStatus::Pending => PENDING,
        MutantStatus::Killed => 1,
        MutantStatus::Survived => 2,
        MutantStatus::Timeout => 3,
        MutantStatus::CompileError => 4,
        MutantStatus::Ignored => 5,
        MutantStatus::NoCoverage => 6,
    }
}

fn decode(value: u8) -> MutantStatus {
    match value {
        1 => MutantStatus::Killed,
        2 => MutantStatus::Survived,
        3 => MutantStatus::Timeout,
        4 => MutantStatus::CompileError,
        5 => MutantStatus::Ignored,
        6 => MutantStatus::NoCoverage,
        _ => MutantStatus::Pending,
    }
}

struct Slot {
    state: AtomicU8,
    verdict: OnceLock<Verdict>,
}

/// Per-mutant status cells updated without a global lock
pub struct StatusTable {
    slots: Vec<Slot>,
    index: HashMap<MutantId, usize>,
}

impl StatusTable {
    pub fn new(mutants: &[Mutant]) -> Self {
        let slots = mutants
            .iter()
            .map(|m| {
                let verdict = OnceLock::new();
                if m.status.is_terminal() {
                    let _ = verdict.set(Verdict {
                        status: m.status,
                        detail: m.detail.clone(),
                        duration: m.duration,
                    });
                }
                Slot {
                    state: AtomicU8::new(encode(m.status)),
                    verdict,
                }
            })
            .collect();
        let index = mutants.iter().enumerate().map(|(i, m)| (m.id, i)).collect();
        Self { slots, index }
    }

    pub fn status(&self, id: MutantId) -> Option<MutantStatus> {
        self.index
            .get(&id)
            .map(|&i| decode(self.slots[i].state.load(Ordering::Acquire)))
    }

    /// Move `id` from `Pending` to the verdict's status. Returns false when
    /// the mutant is unknown or already terminal.
    pub fn transition(&self, id: MutantId, verdict: Verdict) -> bool {
        let Some(&i) = self.index.get(&id) else {
            return false;
        };
        if !verdict.status.is_terminal() {
            return false;
        }
        let slot = &self.slots[i];
        let won = slot
            .state
            .compare_exchange(PENDING, encode(verdict.status), Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            let _ = slot.verdict.set(verdict);
        }
        won
    }

    pub fn pending(&self) -> Vec<MutantId> {
        let mut ids: Vec<MutantId> = self
            .index
            .iter()
            .filter(|(_, &i)| self.slots[i].state.load(Ordering::Acquire) == PENDING)
            .map(|(&id, _)| id)
            .collect();
        ids.sort();
        ids
    }

    fn verdict(&self, id: MutantId) -> Option<&Verdict> {
        self.index.get(&id).and_then(|&i| self.slots[i].verdict.get())
    }
}

/// One mutant ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: MutantId,
    pub tests: TestSelection,
}

/// Mutants that may execute at the same time
#[derive(Debug, Clone, PartialEq)]
pub struct MutantBatch {
    pub jobs: Vec<Job>,
}

impl MutantBatch {
    pub fn ids(&self) -> Vec<MutantId> {
        self.jobs.iter().map(|j| j.id).collect()
    }
}

/// Group jobs into batches that are safe to run concurrently.
///
/// With per-process isolation every job goes into a single batch. With a
/// shared control value, jobs are packed first-fit into batches whose test
/// selections are pairwise disjoint; a job selecting every test is alone.
pub fn plan_batches(jobs: Vec<Job>, isolation: Isolation) -> Vec<MutantBatch> {
    if jobs.is_empty() {
        return Vec::new();
    }
    match isolation {
        Isolation::PerProcess => vec![MutantBatch { jobs }],
        Isolation::Shared => {
            let mut batches: Vec<MutantBatch> = Vec::new();
            for job in jobs {
                let fit = batches
                    .iter_mut()
                    .find(|batch| batch.jobs.iter().all(|other| !other.tests.overlaps(&job.tests)));
                match fit {
                    Some(batch) => batch.jobs.push(job),
                    None => batches.push(MutantBatch { jobs: vec![job] }),
                }
            }
            batches
        }
    }
}

/// Lifecycle of a scheduling run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
}

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub concurrency: usize,
    pub timeout: TimeoutPolicy,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            concurrency: num_cpus::get(),
            timeout: TimeoutPolicy::default(),
        }
    }
}

/// Summary of one scheduling run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub executed: usize,
    pub cancelled: bool,
}

/// Drives test runs for every pending mutant
pub struct Scheduler<'a, R: TestRunner> {
    runner: &'a R,
    artifact: &'a R::Artifact,
    options: SchedulerOptions,
    cancel: CancellationToken,
    state: AtomicU8,
}

impl<'a, R: TestRunner> Scheduler<'a, R> {
    pub fn new(
        runner: &'a R,
        artifact: &'a R::Artifact,
        options: SchedulerOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            runner,
            artifact,
            options,
            cancel,
            state: AtomicU8::new(0),
        }
    }

    pub fn state(&self) -> RunState {
        match self.state.load(Ordering::Acquire) {
            0 => RunState::NotStarted,
            1 => RunState::Running,
            _ => RunState::Completed,
        }
    }

    /// Execute every pending mutant and write the verdicts back.
    ///
    /// Mutants that are still pending when the run ends (cancellation or an
    /// infrastructure failure) are marked `Ignored`.
    pub fn execute(
        &self,
        mutants: &mut [Mutant],
        coverage: Option<&CoverageMap>,
        baseline: &BaselineTiming,
    ) -> Result<ExecutionSummary> {
        self.state.store(1, Ordering::Release);
        let table = StatusTable::new(mutants);

        let mut jobs = Vec::new();
        for id in table.pending() {
            let tests = select_tests(coverage, id);
            if tests.is_empty() {
                tracing::debug!("mutant {} is not covered by any test", id);
                table.transition(id, Verdict::new(MutantStatus::NoCoverage, "no test covers this mutant"));
            } else {
                jobs.push(Job { id, tests });
            }
        }

        let batches = plan_batches(jobs, self.runner.isolation());
        tracing::info!(
            "scheduling {} mutant(s) in {} batch(es) on {} worker(s)",
            batches.iter().map(|b| b.jobs.len()).sum::<usize>(),
            batches.len(),
            self.options.concurrency.max(1)
        );

        let failure = OnceLock::new();
        let mut executed = 0;
        for batch in &batches {
            if self.cancel.is_cancelled() {
                break;
            }
            executed += self.run_batch(batch, &table, baseline, &failure);
        }

        let cancelled = self.cancel.is_cancelled();
        for id in table.pending() {
            let reason = if cancelled { "run cancelled" } else { "not executed" };
            table.transition(id, Verdict::new(MutantStatus::Ignored, reason));
        }
        for mutant in mutants.iter_mut() {
            if let Some(verdict) = table.verdict(mutant.id) {
                mutant.set_status(verdict.status, verdict.detail.clone());
                mutant.duration = verdict.duration;
            }
        }
        self.state.store(2, Ordering::Release);

        if let Some(reason) = failure.into_inner() {
            return Err(MutationError::Infrastructure { reason });
        }
        Ok(ExecutionSummary {
            executed,
            cancelled,
        })
    }

    fn run_batch(
        &self,
        batch: &MutantBatch,
        table: &StatusTable,
        baseline: &BaselineTiming,
        failure: &OnceLock<String>,
    ) -> usize {
        let injector = Injector::new();
        for job in &batch.jobs {
            injector.push(job);
        }
        let workers = self.options.concurrency.clamp(1, batch.jobs.len().max(1));
        let locals: Vec<DequeWorker<&Job>> = (0..workers).map(|_| DequeWorker::new_fifo()).collect();
        let stealers: Vec<Stealer<&Job>> = locals.iter().map(|w| w.stealer()).collect();

        std::thread::scope(|scope| {
            let handles: Vec<_> = locals
                .into_iter()
                .map(|local| {
                    let injector = &injector;
                    let stealers = &stealers;
                    scope.spawn(move || {
                        let mut executed = 0;
                        while !self.cancel.is_cancelled() {
                            let Some(job) = find_job(&local, injector, stealers) else {
                                break;
                            };
                            if self.run_job(job, table, baseline, failure) {
                                executed += 1;
                            }
                        }
                        executed
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or(0))
                .sum()
        })
    }

    /// Returns whether the job reached a terminal status.
    fn run_job(
        &self,
        job: &Job,
        table: &StatusTable,
        baseline: &BaselineTiming,
        failure: &OnceLock<String>,
    ) -> bool {
        let deadline = self.options.timeout.deadline(baseline, &job.tests);
        let request = RunRequest {
            active: job.id,
            tests: &job.tests,
            deadline: Some(deadline),
            cancel: &self.cancel,
        };
        let started = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.runner.run(self.artifact, &request)));
        if self.cancel.is_cancelled() && !matches!(result, Ok(Err(RunnerError::Spawn(_)))) {
            tracing::debug!("mutant {}: run interrupted by cancellation", job.id);
            return false;
        }
        let mut verdict = match result {
            Ok(Ok(outcome)) if outcome.cancelled => return false,
            Ok(Ok(outcome)) => classify(&outcome),
            Ok(Err(RunnerError::Spawn(reason))) => {
                tracing::error!("mutant {}: {}", job.id, reason);
                let _ = failure.set(reason);
                self.cancel.cancel();
                return false;
            }
            Ok(Err(RunnerError::Crashed(reason))) => {
                tracing::warn!("mutant {}: worker crashed: {}", job.id, reason);
                Verdict::new(MutantStatus::Killed, format!("worker crashed: {}", reason))
            }
            Err(_) => {
                tracing::warn!("mutant {}: test runner panicked", job.id);
                Verdict::new(MutantStatus::Killed, "test runner panicked")
            }
        };
        if verdict.duration.is_none() {
            verdict.duration = Some(started.elapsed());
        }
        tracing::debug!("mutant {}: {:?}", job.id, verdict.status);
        table.transition(job.id, verdict)
    }
}

fn find_job<'j>(
    local: &DequeWorker<&'j Job>,
    injector: &Injector<&'j Job>,
    stealers: &[Stealer<&'j Job>],
) -> Option<&'j Job> {
    if let Some(job) = local.pop() {
        return Some(job);
    }
    loop {
        match injector.steal_batch_and_pop(local) {
            Steal::Success(job) => return Some(job),
            Steal::Empty => break,
            Steal::Retry => continue,
        }
    }
    for stealer in stealers {
        loop {
            match stealer.steal() {
                Steal::Success(job) => return Some(job),
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TestResult;
    use crate::mutant::{Mutation, MutationKind};
    use std::collections::{BTreeSet, HashSet};
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum Behavior {
        Pass,
        Fail,
        Hang,
        Crash,
        Panic,
        Spawn,
        /// Killed by the same Ctrl-C that cancelled the run
        Interrupted,
    }

    struct FakeRunner {
        behavior: HashMap<MutantId, Behavior>,
        isolation: Isolation,
        runs: Mutex<Vec<MutantId>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        /// Cancel the run while the n-th run is in flight
        cancel_on_run: Option<usize>,
    }

    impl FakeRunner {
        fn new(behavior: &[(u64, Behavior)]) -> Self {
            Self {
                behavior: behavior.iter().map(|&(id, b)| (MutantId(id), b)).collect(),
                isolation: Isolation::PerProcess,
                runs: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                cancel_on_run: None,
            }
        }

        fn ran(&self) -> Vec<MutantId> {
            let mut runs = self.runs.lock().unwrap().clone();
            runs.sort();
            runs
        }
    }

    impl TestRunner for FakeRunner {
        type Artifact = ();

        fn isolation(&self) -> Isolation {
            self.isolation
        }

        fn run(&self, _: &(), request: &RunRequest<'_>) -> std::result::Result<RunOutcome, RunnerError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let count = {
                let mut runs = self.runs.lock().unwrap();
                runs.push(request.active);
                runs.len()
            };
            if self.cancel_on_run == Some(count) {
                request.cancel.cancel();
            }

            let behavior = self
                .behavior
                .get(&request.active)
                .copied()
                .unwrap_or(Behavior::Pass);
            let mut outcome = RunOutcome {
                tests: vec![TestResult {
                    name: "tests::it_works".to_string(),
                    passed: true,
                    duration: None,
                }],
                exit: ExitKind::Success,
                timed_out: false,
                cancelled: false,
                elapsed: Duration::from_millis(5),
            };
            match behavior {
                Behavior::Pass => {}
                Behavior::Fail => {
                    outcome.tests[0].passed = false;
                    outcome.exit = ExitKind::Failure(101);
                }
                Behavior::Hang => outcome.timed_out = true,
                Behavior::Crash => return Err(RunnerError::Crashed("signal 11".to_string())),
                Behavior::Panic => panic!("runner bug"),
                Behavior::Spawn => return Err(RunnerError::Spawn("no such file".to_string())),
                Behavior::Interrupted => outcome.exit = ExitKind::Crashed,
            }
            Ok(outcome)
        }
    }

    fn mutants(count: u64) -> Vec<Mutant> {
        let node: syn::Expr = syn::parse_quote!(true);
        (1..=count)
            .map(|id| {
                let mutation = Mutation::new(
                    &node,
                    syn::parse_quote!(false),
                    MutationKind::Boolean,
                    "Boolean mutation",
                );
                Mutant::new(MutantId(id), PathBuf::from("src/lib.rs"), mutation)
            })
            .collect()
    }

    fn statuses(mutants: &[Mutant]) -> Vec<MutantStatus> {
        mutants.iter().map(|m| m.status).collect()
    }

    fn options(concurrency: usize) -> SchedulerOptions {
        SchedulerOptions {
            concurrency,
            timeout: TimeoutPolicy::default(),
        }
    }

    #[test]
    fn test_verdicts_follow_run_outcomes() {
        let runner = FakeRunner::new(&[
            (1, Behavior::Fail),
            (2, Behavior::Pass),
            (3, Behavior::Hang),
            (4, Behavior::Crash),
            (5, Behavior::Panic),
        ]);
        let mut mutants = mutants(5);
        let scheduler = Scheduler::new(&runner, &(), options(2), CancellationToken::new());
        assert_eq!(scheduler.state(), RunState::NotStarted);
        let summary = scheduler
            .execute(&mut mutants, None, &BaselineTiming::default())
            .unwrap();
        assert_eq!(scheduler.state(), RunState::Completed);
        assert_eq!(summary, ExecutionSummary { executed: 5, cancelled: false });
        assert_eq!(
            statuses(&mutants),
            vec![
                MutantStatus::Killed,
                MutantStatus::Survived,
                MutantStatus::Timeout,
                MutantStatus::Killed,
                MutantStatus::Killed,
            ]
        );
        assert_eq!(mutants[0].detail.as_deref(), Some("killed by tests::it_works"));
        assert!(mutants[3].detail.as_deref().unwrap().contains("signal 11"));
    }

    #[test]
    fn test_uncovered_mutant_is_never_dispatched() {
        let runner = FakeRunner::new(&[]);
        let mut mutants = mutants(3);
        let mut coverage = CoverageMap::new();
        coverage.record(MutantId(1), "tests::a");
        coverage.record(MutantId(3), "tests::b");
        let scheduler = Scheduler::new(&runner, &(), options(4), CancellationToken::new());
        scheduler
            .execute(&mut mutants, Some(&coverage), &BaselineTiming::default())
            .unwrap();
        assert_eq!(mutants[1].status, MutantStatus::NoCoverage);
        assert_eq!(runner.ran(), vec![MutantId(1), MutantId(3)]);
    }

    #[test]
    fn test_cancellation_marks_pending_ignored() {
        let mut runner = FakeRunner::new(&[(1, Behavior::Fail), (2, Behavior::Fail)]);
        runner.cancel_on_run = Some(4);
        let mut mutants = mutants(10);
        let scheduler = Scheduler::new(&runner, &(), options(1), CancellationToken::new());
        let summary = scheduler
            .execute(&mut mutants, None, &BaselineTiming::default())
            .unwrap();
        assert!(summary.cancelled);
        let ignored = mutants.iter().filter(|m| m.status == MutantStatus::Ignored).count();
        let terminal_run = mutants
            .iter()
            .filter(|m| matches!(m.status, MutantStatus::Killed | MutantStatus::Survived))
            .count();
        assert_eq!(terminal_run, 3);
        assert_eq!(ignored, 7);
        assert!(mutants.iter().all(|m| m.status != MutantStatus::Pending));
    }

    #[test]
    fn test_interrupted_run_is_not_a_verdict() {
        let mut runner = FakeRunner::new(&[(1, Behavior::Interrupted), (2, Behavior::Fail)]);
        runner.cancel_on_run = Some(1);
        let mut mutants = mutants(3);
        let scheduler = Scheduler::new(&runner, &(), options(1), CancellationToken::new());
        let summary = scheduler
            .execute(&mut mutants, None, &BaselineTiming::default())
            .unwrap();
        assert_eq!(summary, ExecutionSummary { executed: 0, cancelled: true });
        assert_eq!(runner.ran(), vec![MutantId(1)]);
        assert_eq!(
            statuses(&mutants),
            vec![MutantStatus::Ignored, MutantStatus::Ignored, MutantStatus::Ignored]
        );
    }

    #[test]
    fn test_spawn_failure_is_fatal() {
        let runner = FakeRunner::new(&[(1, Behavior::Spawn)]);
        let mut mutants = mutants(4);
        let scheduler = Scheduler::new(&runner, &(), options(1), CancellationToken::new());
        let result = scheduler.execute(&mut mutants, None, &BaselineTiming::default());
        assert!(matches!(result, Err(MutationError::Infrastructure { .. })));
        assert!(mutants.iter().all(|m| m.status == MutantStatus::Ignored));
    }

    #[test]
    fn test_concurrency_is_bounded() {
        let runner = FakeRunner::new(&[]);
        let mut mutants = mutants(12);
        let scheduler = Scheduler::new(&runner, &(), options(3), CancellationToken::new());
        scheduler
            .execute(&mut mutants, None, &BaselineTiming::default())
            .unwrap();
        assert!(runner.max_in_flight.load(Ordering::SeqCst) <= 3);
        assert_eq!(runner.ran().len(), 12);
        let unique: HashSet<_> = runner.ran().into_iter().collect();
        assert_eq!(unique.len(), 12);
    }

    #[test]
    fn test_shared_runner_never_overlaps_covering_tests() {
        let mut runner = FakeRunner::new(&[(2, Behavior::Fail)]);
        runner.isolation = Isolation::Shared;
        let mut mutants = mutants(4);
        let mut coverage = CoverageMap::new();
        for id in 1..=4 {
            coverage.record(MutantId(id), "tests::a");
        }
        let scheduler = Scheduler::new(&runner, &(), options(4), CancellationToken::new());
        let summary = scheduler
            .execute(&mut mutants, Some(&coverage), &BaselineTiming::default())
            .unwrap();
        assert_eq!(summary.executed, 4);
        assert_eq!(runner.ran().len(), 4);
        assert_eq!(runner.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(
            statuses(&mutants),
            vec![
                MutantStatus::Survived,
                MutantStatus::Killed,
                MutantStatus::Survived,
                MutantStatus::Survived,
            ]
        );
    }

    #[test]
    fn test_already_terminal_mutants_are_kept() {
        let runner = FakeRunner::new(&[]);
        let mut mutants = mutants(2);
        mutants[0].set_status(MutantStatus::CompileError, Some("E0308".to_string()));
        let scheduler = Scheduler::new(&runner, &(), options(1), CancellationToken::new());
        scheduler
            .execute(&mut mutants, None, &BaselineTiming::default())
            .unwrap();
        assert_eq!(mutants[0].status, MutantStatus::CompileError);
        assert_eq!(runner.ran(), vec![MutantId(2)]);
    }

    #[test]
    fn test_status_transition_happens_once() {
        let table = StatusTable::new(&mutants(1));
        assert!(table.transition(MutantId(1), Verdict::new(MutantStatus::Killed, "first")));
        assert!(!table.transition(MutantId(1), Verdict::new(MutantStatus::Survived, "second")));
        assert_eq!(table.status(MutantId(1)), Some(MutantStatus::Killed));
        assert!(!table.transition(MutantId(9), Verdict::new(MutantStatus::Killed, "unknown")));
    }

    fn job(id: u64, tests: &[&str]) -> Job {
        Job {
            id: MutantId(id),
            tests: TestSelection::Only(tests.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>()),
        }
    }

    #[test]
    fn test_shared_isolation_batches_disjoint_tests() {
        let jobs = vec![
            job(1, &["a"]),
            job(2, &["b"]),
            job(3, &["a", "c"]),
            Job {
                id: MutantId(4),
                tests: TestSelection::All,
            },
            job(5, &["c"]),
        ];
        let batches = plan_batches(jobs, Isolation::Shared);
        let ids: Vec<Vec<u64>> = batches
            .iter()
            .map(|b| b.ids().into_iter().map(|id| id.0).collect())
            .collect();
        assert_eq!(ids, vec![vec![1, 2, 5], vec![3], vec![4]]);
    }

    #[test]
    fn test_per_process_isolation_is_one_batch() {
        let jobs = vec![job(1, &["a"]), job(2, &["a"])];
        let batches = plan_batches(jobs, Isolation::PerProcess);
        assert_eq!(batches.len(), 1);
        assert!(plan_batches(Vec::new(), Isolation::Shared).is_empty());
    }

    #[test]
    fn test_deadline_uses_selected_test_timings() {
        let policy = TimeoutPolicy {
            multiplier: 2.0,
            margin: Duration::from_millis(100),
        };
        let baseline = BaselineTiming {
            total: Duration::from_secs(10),
            per_test: [
                ("a".to_string(), Duration::from_millis(200)),
                ("b".to_string(), Duration::from_millis(300)),
            ]
            .into_iter()
            .collect(),
        };
        assert_eq!(
            policy.deadline(&baseline, &job(1, &["a", "b"]).tests),
            Duration::from_millis(1100)
        );
        assert_eq!(
            policy.deadline(&baseline, &job(1, &["a", "unknown"]).tests),
            Duration::from_millis(20_100)
        );
        assert_eq!(
            policy.deadline(&baseline, &TestSelection::All),
            Duration::from_millis(20_100)
        );
    }

    #[test]
    fn test_baseline_must_pass() {
        let runner = FakeRunner::new(&[(0, Behavior::Fail)]);
        let result = measure_baseline(&runner, &(), &CancellationToken::new());
        assert!(matches!(result, Err(MutationError::InitialTestRunFailed { .. })));

        let runner = FakeRunner::new(&[]);
        let timing = measure_baseline(&runner, &(), &CancellationToken::new()).unwrap();
        assert_eq!(timing.total, Duration::from_millis(5));
    }
}
