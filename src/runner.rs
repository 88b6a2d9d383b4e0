//! Cargo build and test backend
//!
//! The project is copied once into a scratch directory. Instrumented sources
//! are written over the copy, `cargo test --no-run` builds the test
//! executables, and each run launches those executables directly with the
//! active mutant id in its environment.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::backend::{
    Builder, CancellationToken, ExitKind, Isolation, RunOutcome, RunRequest, RunnerError,
    TestResult, TestRunner, TestSelection,
};
use crate::codegen::write_unit;
use crate::coverage::CoverageMap;
use crate::error::{Diagnostic, MutationError, Result};
use crate::injector::{InstrumentedUnit, ACTIVE_MUTANT_ENV, COVERAGE_FILE_ENV};
use crate::mutant::MutantId;

const SKIP_NAMES: &[&str] = &[".git", ".hg", ".svn", "target", ".idea", ".vscode"];

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A Cargo package prepared for instrumented builds
pub struct CargoProject {
    workspace: TempDir,
    target_dir: PathBuf,
}

/// Test executables produced by one build
#[derive(Debug, Clone, Default)]
pub struct TestBinaries {
    pub executables: Vec<TestExecutable>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestExecutable {
    /// Prefix of every test id coming from this executable
    pub name: String,
    pub path: PathBuf,
}

impl CargoProject {
    /// Copy `project_dir` into a scratch directory
    pub fn prepare(project_dir: &Path) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .map_err(|e| MutationError::FileReadError {
                file: project_dir.to_path_buf(),
                error: e.to_string(),
            })?;
        if !project_dir.join("Cargo.toml").exists() {
            return Err(MutationError::ConfigError {
                message: format!("'{}' is not a Cargo package", project_dir.display()),
            });
        }
        let workspace = tempfile::Builder::new()
            .prefix("mutation-engine-")
            .tempdir()
            .map_err(|e| MutationError::Infrastructure {
                reason: format!("Failed to create temp directory: {}", e),
            })?;
        copy_project(&project_dir, workspace.path())?;
        let target_dir = project_dir.join("target").join("mutation-engine");
        tracing::debug!(
            "copied {} to {}",
            project_dir.display(),
            workspace.path().display()
        );
        Ok(Self {
            workspace,
            target_dir,
        })
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    fn coverage_file(&self) -> PathBuf {
        self.workspace().join(".mutation-coverage")
    }
}

fn should_skip(name: &str) -> bool {
    SKIP_NAMES.contains(&name)
}

fn copy_project(src: &Path, dst: &Path) -> Result<()> {
    let walker = WalkDir::new(src)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !should_skip(&entry.file_name().to_string_lossy()));
    for entry in walker {
        let entry = entry.map_err(|e| MutationError::FileReadError {
            file: src.to_path_buf(),
            error: e.to_string(),
        })?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);
        let copied = if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target).map(|_| ())
        } else {
            // Skip symlinks and other special files
            Ok(())
        };
        copied.map_err(|e| MutationError::WriteError {
            file: target.clone(),
            error: e.to_string(),
        })?;
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
enum CargoMessage {
    CompilerArtifact {
        target: ArtifactTarget,
        profile: ArtifactProfile,
        executable: Option<PathBuf>,
    },
    CompilerMessage {
        message: CompilerDiagnostic,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ArtifactTarget {
    name: String,
    kind: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ArtifactProfile {
    test: bool,
}

#[derive(Debug, Deserialize)]
struct CompilerDiagnostic {
    level: String,
    rendered: Option<String>,
}

/// Parse `cargo --message-format=json` output into test executables and
/// error diagnostics
fn parse_build_messages(stdout: &str) -> (TestBinaries, Vec<Diagnostic>) {
    let mut binaries = TestBinaries::default();
    let mut diagnostics = Vec::new();
    let mut seen = BTreeSet::new();
    for line in stdout.lines().filter(|l| l.starts_with('{')) {
        let Ok(message) = serde_json::from_str::<CargoMessage>(line) else {
            continue;
        };
        match message {
            CargoMessage::CompilerArtifact {
                target,
                profile,
                executable: Some(path),
            } if profile.test => {
                let mut name = target.name.clone();
                if !seen.insert(name.clone()) {
                    name = format!("{}.{}", target.name, target.kind.join("+"));
                    seen.insert(name.clone());
                }
                binaries.executables.push(TestExecutable { name, path });
            }
            CargoMessage::CompilerMessage { message } if message.level == "error" => {
                if let Some(rendered) = message.rendered {
                    diagnostics.push(Diagnostic::new(rendered));
                }
            }
            _ => {}
        }
    }
    (binaries, diagnostics)
}

impl Builder for CargoProject {
    type Artifact = TestBinaries;

    fn compile(&self, units: &[InstrumentedUnit]) -> std::result::Result<TestBinaries, Vec<Diagnostic>> {
        for unit in units {
            write_unit(self.workspace(), &unit.path, &unit.tree)
                .map_err(|e| vec![Diagnostic::new(e.to_string())])?;
        }
        let started = Instant::now();
        let output = Command::new("cargo")
            .args(["test", "--no-run", "--message-format=json"])
            .current_dir(self.workspace())
            .env("CARGO_TARGET_DIR", &self.target_dir)
            .output()
            .map_err(|e| vec![Diagnostic::new(format!("Failed to run cargo: {}", e))])?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (binaries, mut diagnostics) = parse_build_messages(&stdout);
        if !output.status.success() {
            if diagnostics.is_empty() {
                diagnostics.push(Diagnostic::new(String::from_utf8_lossy(&output.stderr)));
            }
            return Err(diagnostics);
        }
        tracing::debug!(
            "built {} test executable(s) in {:.2}s",
            binaries.executables.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(binaries)
    }
}

impl TestRunner for CargoProject {
    type Artifact = TestBinaries;

    fn isolation(&self) -> Isolation {
        Isolation::PerProcess
    }

    fn run(&self, artifact: &TestBinaries, request: &RunRequest<'_>) -> std::result::Result<RunOutcome, RunnerError> {
        run_executables(&artifact.executables, self.workspace(), request)
    }

    fn capture_coverage(
        &self,
        artifact: &TestBinaries,
        cancel: &CancellationToken,
    ) -> std::result::Result<Option<CoverageMap>, RunnerError> {
        capture_coverage_in(&artifact.executables, self.workspace(), &self.coverage_file(), cancel)
    }
}

/// Run every test on its own with the baseline active and record the
/// mutant ids it reaches. `None` when the run is cancelled.
fn capture_coverage_in(
    executables: &[TestExecutable],
    working_dir: &Path,
    coverage_file: &Path,
    cancel: &CancellationToken,
) -> std::result::Result<Option<CoverageMap>, RunnerError> {
    let mut map = CoverageMap::new();
    for executable in executables {
        for test in list_tests(executable, working_dir)? {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let _ = std::fs::remove_file(coverage_file);
            let launch = Launch {
                executable,
                filters: std::slice::from_ref(&test),
                active: MutantId::BASELINE,
                coverage_file: Some(coverage_file),
            };
            if launch.run(working_dir, None, cancel)?.cancelled {
                return Ok(None);
            }
            let hits = std::fs::read_to_string(coverage_file).unwrap_or_default();
            for id in hits.lines().filter_map(|l| l.trim().parse::<u64>().ok()) {
                map.record(MutantId(id), format!("{}::{}", executable.name, test));
            }
        }
    }
    let _ = std::fs::remove_file(coverage_file);
    Ok(Some(map))
}

/// Run the selected tests of every executable, one executable after another
fn run_executables(
    executables: &[TestExecutable],
    working_dir: &Path,
    request: &RunRequest<'_>,
) -> std::result::Result<RunOutcome, RunnerError> {
    let started = Instant::now();
    let mut outcome = RunOutcome {
        tests: Vec::new(),
        exit: ExitKind::Success,
        timed_out: false,
        cancelled: false,
        elapsed: Duration::ZERO,
    };
    for executable in executables {
        let filters: Vec<String> = match request.tests {
            TestSelection::All => Vec::new(),
            TestSelection::Only(tests) => {
                let selected: Vec<String> = tests
                    .iter()
                    .filter_map(|id| id.split_once("::"))
                    .filter(|(binary, _)| *binary == executable.name)
                    .map(|(_, test)| test.to_string())
                    .collect();
                if selected.is_empty() {
                    continue;
                }
                selected
            }
        };
        let remaining = request
            .deadline
            .map(|deadline| deadline.saturating_sub(started.elapsed()));
        let launch = Launch {
            executable,
            filters: &filters,
            active: request.active,
            coverage_file: None,
        };
        let run = launch.run(working_dir, remaining, request.cancel)?;
        outcome.tests.extend(run.tests);
        if outcome.exit == ExitKind::Success {
            outcome.exit = run.exit;
        }
        if run.timed_out || run.cancelled {
            outcome.timed_out = run.timed_out;
            outcome.cancelled = run.cancelled;
            break;
        }
    }
    outcome.elapsed = started.elapsed();
    Ok(outcome)
}

/// One launch of a test executable
struct Launch<'a> {
    executable: &'a TestExecutable,
    /// Exact test names; every test when empty
    filters: &'a [String],
    active: MutantId,
    coverage_file: Option<&'a Path>,
}

impl Launch<'_> {
    fn command(&self, working_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.executable.path);
        if !self.filters.is_empty() {
            cmd.arg("--exact").args(self.filters);
        }
        cmd.current_dir(working_dir)
            .env(ACTIVE_MUTANT_ENV, self.active.to_string())
            .env_remove(COVERAGE_FILE_ENV)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(file) = self.coverage_file {
            cmd.env(COVERAGE_FILE_ENV, file);
        }
        cmd
    }

    fn run(
        &self,
        working_dir: &Path,
        deadline: Option<Duration>,
        cancel: &CancellationToken,
    ) -> std::result::Result<RunOutcome, RunnerError> {
        let started = Instant::now();
        let mut child = self.command(working_dir).spawn().map_err(|e| {
            RunnerError::Spawn(format!("{}: {}", self.executable.path.display(), e))
        })?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let (status, timed_out, cancelled) = loop {
            match child.try_wait() {
                Ok(Some(status)) => break (Some(status), false, false),
                Ok(None) => {
                    if deadline.is_some_and(|d| started.elapsed() > d) {
                        stop(&mut child);
                        break (None, true, false);
                    }
                    if cancel.is_cancelled() {
                        stop(&mut child);
                        break (None, false, true);
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    stop(&mut child);
                    return Err(RunnerError::Crashed(e.to_string()));
                }
            }
        };

        // Ctrl-C reaches the test processes too, so an exit seen after
        // cancellation says nothing about the mutant.
        let cancelled = cancelled || cancel.is_cancelled();
        let elapsed = started.elapsed();
        // A killed process may leave children holding the pipes open, so
        // its output is not waited for.
        let stdout = match status {
            Some(_) => {
                let _ = join_output(stderr);
                join_output(stdout)
            }
            None => String::new(),
        };
        let tests = stdout
            .lines()
            .filter_map(parse_test_line)
            .map(|(name, passed)| TestResult {
                name: format!("{}::{}", self.executable.name, name),
                passed,
                duration: None,
            })
            .collect();
        Ok(RunOutcome {
            tests,
            exit: status.map(exit_kind).unwrap_or(ExitKind::Crashed),
            timed_out,
            cancelled,
            elapsed,
        })
    }
}

fn stop(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join_output(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

fn exit_kind(status: ExitStatus) -> ExitKind {
    match status.code() {
        Some(0) => ExitKind::Success,
        Some(code) => ExitKind::Failure(code),
        None => ExitKind::Crashed,
    }
}

/// Parse a libtest result line such as `test math::tests::add ... ok`
fn parse_test_line(line: &str) -> Option<(String, bool)> {
    let rest = line.strip_prefix("test ")?;
    let (name, result) = rest.rsplit_once(" ... ")?;
    let name = name.strip_suffix(" - should panic").unwrap_or(name);
    match result.trim() {
        "ok" => Some((name.to_string(), true)),
        "FAILED" => Some((name.to_string(), false)),
        _ => None,
    }
}

/// Names of the tests an executable contains
fn list_tests(executable: &TestExecutable, working_dir: &Path) -> std::result::Result<Vec<String>, RunnerError> {
    let output = Command::new(&executable.path)
        .args(["--list", "--format", "terse"])
        .current_dir(working_dir)
        .output()
        .map_err(|e| RunnerError::Spawn(format!("{}: {}", executable.path.display(), e)))?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .filter_map(|line| line.strip_suffix(": test"))
        .map(str::to_string)
        .collect())
}
