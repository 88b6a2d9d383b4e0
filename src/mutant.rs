//! Core mutation data model
//!
//! A [`Mutation`] is a proposed replacement produced by one mutator. Once the
//! catalog builder accepts it, it becomes a [`Mutant`] with a stable
//! [`MutantId`] and an execution status.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use syn::spanned::Spanned;

/// Aggressiveness tier gating which mutators run.
///
/// Levels are totally ordered; enabling a level enables every mutator of a
/// lower level as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationLevel {
    Basic,
    Standard,
    Advanced,
    Complete,
}

impl Default for MutationLevel {
    fn default() -> Self {
        MutationLevel::Standard
    }
}

/// Family of syntactic pattern a mutation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Arithmetic,
    Assignment,
    Bitwise,
    Boolean,
    Equality,
    Logical,
    Method,
    Number,
    String,
    Unary,
}

impl MutationKind {
    pub const ALL: [MutationKind; 10] = [
        MutationKind::Arithmetic,
        MutationKind::Assignment,
        MutationKind::Bitwise,
        MutationKind::Boolean,
        MutationKind::Equality,
        MutationKind::Logical,
        MutationKind::Method,
        MutationKind::Number,
        MutationKind::String,
        MutationKind::Unary,
    ];
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationKind::Arithmetic => "arithmetic",
            MutationKind::Assignment => "assignment",
            MutationKind::Bitwise => "bitwise",
            MutationKind::Boolean => "boolean",
            MutationKind::Equality => "equality",
            MutationKind::Logical => "logical",
            MutationKind::Method => "method",
            MutationKind::Number => "number",
            MutationKind::String => "string",
            MutationKind::Unary => "unary",
        };
        f.write_str(name)
    }
}

/// Line (1-indexed) and column (1-indexed) in a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// Source range covered by a syntax node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: Position,
    pub end: Position,
}

impl SourceSpan {
    /// The span of a node, from its first to its last token.
    pub fn of<T: Spanned>(node: &T) -> Self {
        let span = node.span();
        let start = span.start();
        let end = span.end();
        Self {
            start: Position {
                line: start.line,
                column: start.column + 1,
            },
            end: Position {
                line: end.line,
                column: end.column + 1,
            },
        }
    }

    /// A span covering whole lines `first..=last`.
    pub fn lines(first: usize, last: usize) -> Self {
        Self {
            start: Position {
                line: first,
                column: 1,
            },
            end: Position {
                line: last,
                column: usize::MAX,
            },
        }
    }

    pub fn intersects(&self, other: &SourceSpan) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start.line, self.start.column)
    }
}

/// A proposed (original, replacement) pair produced by a single mutator call
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub original: syn::Expr,
    pub replacement: syn::Expr,
    pub span: SourceSpan,
    pub kind: MutationKind,
    pub display_name: String,
}

impl Mutation {
    /// Build a mutation whose original is exactly `node`.
    pub fn new(
        node: &syn::Expr,
        replacement: syn::Expr,
        kind: MutationKind,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            original: node.clone(),
            replacement,
            span: SourceSpan::of(node),
            kind,
            display_name: display_name.into(),
        }
    }
}

/// Process-unique mutant identifier. `0` is reserved for the unmutated baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutantId(pub u64);

impl MutantId {
    pub const BASELINE: MutantId = MutantId(0);
}

impl fmt::Display for MutantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out increasing mutant ids across every compilation unit of a run
#[derive(Debug)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> MutantId {
        let id = MutantId(self.next);
        self.next += 1;
        id
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Status of a mutant. Every status other than `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutantStatus {
    Pending,
    /// A test failed or the test process crashed
    Killed,
    /// Every selected test passed
    Survived,
    /// The test run exceeded its deadline
    Timeout,
    /// The mutant could not be built
    CompileError,
    /// Not executed, usually because the run was cancelled
    Ignored,
    /// No test exercises the mutant
    NoCoverage,
}

impl MutantStatus {
    pub fn is_terminal(self) -> bool {
        self != MutantStatus::Pending
    }

    /// Whether the test suite detected the mutant
    pub fn is_detected(self) -> bool {
        matches!(self, MutantStatus::Killed | MutantStatus::Timeout)
    }
}

/// An accepted mutation with its identity and execution outcome
#[derive(Debug, Clone)]
pub struct Mutant {
    pub id: MutantId,
    pub file: PathBuf,
    pub mutation: Mutation,
    pub status: MutantStatus,
    /// Why the mutant reached its status (failing test, crash message, ...)
    pub detail: Option<String>,
    pub duration: Option<Duration>,
}

impl Mutant {
    pub fn new(id: MutantId, file: PathBuf, mutation: Mutation) -> Self {
        Self {
            id,
            file,
            mutation,
            status: MutantStatus::Pending,
            detail: None,
            duration: None,
        }
    }

    pub fn set_status(&mut self, status: MutantStatus, detail: Option<String>) {
        self.status = status;
        self.detail = detail;
    }
}
