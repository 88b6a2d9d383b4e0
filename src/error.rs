//! Error types for mutation testing

use std::path::PathBuf;
use thiserror::Error;

use crate::mutant::MutantId;

/// Errors that can occur during mutation testing
///
/// Per-mutant failures (`MutatorInternal`, `InjectionConflict`) are recorded
/// and isolated by the engine; the remaining variants end the run.
#[derive(Debug, Error)]
pub enum MutationError {
    /// A single pattern mutator failed on a node
    #[error("Mutator '{mutator}' failed at {}:{line}: {reason}", file.display())]
    MutatorInternal {
        mutator: &'static str,
        file: PathBuf,
        line: usize,
        reason: String,
    },

    /// A mutant could not be wrapped in a selector
    #[error("Mutant {id} could not be injected into {}: {reason}", file.display())]
    InjectionConflict {
        id: MutantId,
        file: PathBuf,
        reason: String,
    },

    /// The build fails without any mutant in it, so no mutant can be blamed
    #[error("Instrumented build failed\n{}", format_diagnostics(diagnostics))]
    CompileFailure { diagnostics: Vec<Diagnostic> },

    /// The unmutated test suite does not pass
    #[error("Initial test run failed: {reason}")]
    InitialTestRunFailed { reason: String },

    /// Workers could not be started or the build tool is unusable
    #[error("Infrastructure failure: {reason}")]
    Infrastructure { reason: String },

    /// Failed to read source file
    #[error("Failed to read file '{}': {error}", file.display())]
    FileReadError { file: PathBuf, error: String },

    /// Failed to parse source file as Rust
    #[error("Failed to parse '{}' as Rust: {error}", file.display())]
    ParseError { file: PathBuf, error: String },

    /// Failed to write instrumented file
    #[error("Failed to write file '{}': {error}", file.display())]
    WriteError { file: PathBuf, error: String },

    /// Failed to serialize a report
    #[error("Failed to serialize report: {error}")]
    SerializeError { error: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

/// A single compiler message, as reported by the build collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub rendered: String,
}

impl Diagnostic {
    pub fn new(rendered: impl Into<String>) -> Self {
        Self {
            rendered: rendered.into(),
        }
    }
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.rendered.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type for mutation operations
pub type Result<T> = std::result::Result<T, MutationError>;
