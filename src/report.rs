//! Report generation for mutation testing results
//!
//! This module aggregates mutant statuses into a score and formats the
//! results for the console or as JSON.

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::codegen::expr_to_source;
use crate::error::{MutationError, Result};
use crate::mutant::{Mutant, MutantId, MutantStatus, MutationKind, SourceSpan};

/// Which non-executed statuses count against the score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreOptions {
    pub include_no_coverage: bool,
    pub include_compile_errors: bool,
    pub include_ignored: bool,
}

/// One mutant as it appears in the report
#[derive(Debug, Clone, Serialize)]
pub struct MutantRecord {
    pub id: MutantId,
    pub file: PathBuf,
    pub span: SourceSpan,
    pub kind: MutationKind,
    pub display_name: String,
    pub original: String,
    pub replacement: String,
    pub status: MutantStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u128>,
}

impl MutantRecord {
    fn location(&self) -> String {
        format!("{}:{}", self.file.display(), self.span)
    }
}

/// Number of mutants per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub killed: usize,
    pub survived: usize,
    pub timeout: usize,
    pub compile_error: usize,
    pub ignored: usize,
    pub no_coverage: usize,
    pub pending: usize,
}

impl StatusCounts {
    fn add(&mut self, status: MutantStatus) {
        match status {
            MutantStatus::Pending => self.pending += 1,
            MutantStatus::Killed => self.killed += 1,
            MutantStatus::Survived => self.survived += 1,
            MutantStatus::Timeout => self.timeout += 1,
            MutantStatus::CompileError => self.compile_error += 1,
            MutantStatus::Ignored => self.ignored += 1,
            MutantStatus::NoCoverage => self.no_coverage += 1,
        }
    }
}

/// Summary report of mutation testing
#[derive(Debug, Clone, Serialize)]
pub struct MutationReport {
    pub mutants: Vec<MutantRecord>,
    pub counts: StatusCounts,
    /// Detected / (detected + undetected); `None` when nothing was scored
    pub score: Option<f64>,
    pub score_options: ScoreOptions,
    pub cancelled: bool,
    pub total_duration_ms: u128,
}

/// Build a report from mutants in their final state
pub fn aggregate(mutants: &[Mutant], options: ScoreOptions) -> MutationReport {
    let mut records: Vec<MutantRecord> = mutants
        .iter()
        .map(|m| MutantRecord {
            id: m.id,
            file: m.file.clone(),
            span: m.mutation.span,
            kind: m.mutation.kind,
            display_name: m.mutation.display_name.clone(),
            original: expr_to_source(&m.mutation.original),
            replacement: expr_to_source(&m.mutation.replacement),
            status: m.status,
            detail: m.detail.clone(),
            duration_ms: m.duration.map(|d| d.as_millis()),
        })
        .collect();
    records.sort_by_key(|r| r.id);

    let mut counts = StatusCounts::default();
    for record in &records {
        counts.add(record.status);
    }

    MutationReport {
        score: score(&counts, options),
        counts,
        mutants: records,
        score_options: options,
        cancelled: false,
        total_duration_ms: 0,
    }
}

fn score(counts: &StatusCounts, options: ScoreOptions) -> Option<f64> {
    let detected = counts.killed + counts.timeout;
    let mut denominator = detected + counts.survived;
    if options.include_no_coverage {
        denominator += counts.no_coverage;
    }
    if options.include_compile_errors {
        denominator += counts.compile_error;
    }
    if options.include_ignored {
        denominator += counts.ignored;
    }
    if denominator == 0 {
        return None;
    }
    Some(detected as f64 / denominator as f64)
}

/// Round `value` to `places` decimals, ties to even
pub fn round_half_even(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    let scaled = value * factor;
    let floor = scaled.floor();
    let diff = scaled - floor;
    let rounded = if (diff - 0.5).abs() < 1e-9 {
        if floor % 2.0 == 0.0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        scaled.round()
    };
    rounded / factor
}

impl MutationReport {
    pub fn with_cancelled(mut self, cancelled: bool) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration_ms = duration.as_millis();
        self
    }

    pub fn total(&self) -> usize {
        self.mutants.len()
    }

    pub fn killed(&self) -> usize {
        self.counts.killed
    }

    pub fn survived(&self) -> usize {
        self.counts.survived
    }

    /// Score as a percentage rounded half-to-even to two decimals
    pub fn display_score(&self) -> Option<f64> {
        self.score.map(|s| round_half_even(s * 100.0, 2))
    }

    /// Get surviving mutants (test gaps)
    pub fn surviving_mutants(&self) -> Vec<&MutantRecord> {
        self.mutants
            .iter()
            .filter(|r| r.status == MutantStatus::Survived)
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| MutationError::SerializeError {
            error: e.to_string(),
        })
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| MutationError::WriteError {
            file: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Print the report to stdout
    pub fn print(&self) {
        println!();
        println!("{}", "Mutation Testing Report".bold());
        println!("{}", "=".repeat(60));
        println!();

        for record in &self.mutants {
            let status_str = match record.status {
                MutantStatus::Killed => "[KILLED]".green().bold(),
                MutantStatus::Survived => "[SURVIVED]".red().bold(),
                MutantStatus::Timeout => "[TIMEOUT]".green().bold(),
                MutantStatus::CompileError => "[COMPILE ERROR]".yellow().bold(),
                MutantStatus::Ignored => "[IGNORED]".dimmed().bold(),
                MutantStatus::NoCoverage => "[NO COVERAGE]".yellow().bold(),
                MutantStatus::Pending => "[PENDING]".dimmed().bold(),
            };
            println!(
                "{} {} - {} -> {}",
                status_str,
                format!("#{}", record.id).dimmed(),
                record.original,
                record.replacement
            );
            println!(
                "        {} ({})",
                record.location().dimmed(),
                record.display_name
            );
            if let Some(detail) = &record.detail {
                if record.status != MutantStatus::Survived {
                    println!("        {}", detail.dimmed());
                }
            }
        }

        println!();
        println!("{}", "Summary".bold());
        println!("{}", "-".repeat(40));
        println!("Total mutants:     {}", self.total());
        println!(
            "Killed:            {} {}",
            self.counts.killed,
            "(good - tests caught the mutation)".dimmed()
        );
        println!(
            "Survived:          {} {}",
            self.counts.survived,
            "(bad - tests missed the mutation)".dimmed()
        );
        if self.counts.timeout > 0 {
            println!("Timeouts:          {}", self.counts.timeout);
        }
        if self.counts.no_coverage > 0 {
            println!("No coverage:       {}", self.counts.no_coverage);
        }
        if self.counts.compile_error > 0 {
            println!("Compile errors:    {}", self.counts.compile_error);
        }
        if self.counts.ignored > 0 {
            println!("Ignored:           {}", self.counts.ignored);
        }

        println!();
        match self.display_score() {
            Some(score) => {
                let score_str = format!("{:.2}%", score);
                let score_colored = if score >= 90.0 {
                    score_str.green().bold()
                } else if score >= 70.0 {
                    score_str.yellow().bold()
                } else {
                    score_str.red().bold()
                };
                println!("Mutation Score:    {}", score_colored);
            }
            None => println!("Mutation Score:    {}", "n/a".dimmed()),
        }
        println!(
            "Duration:          {}",
            format_duration(Duration::from_millis(self.total_duration_ms as u64))
        );
        if self.cancelled {
            println!("{}", "Run was cancelled; pending mutants were ignored".yellow());
        }

        let survivors = self.surviving_mutants();
        if !survivors.is_empty() {
            println!();
            println!("{}", "Surviving Mutants (improve your tests!)".red().bold());
            println!("{}", "-".repeat(40));
            for record in survivors {
                println!(
                    "  • {} -> {}",
                    record.original.yellow(),
                    record.replacement.yellow()
                );
                println!("    {} at {}", record.display_name, record.location());
            }
        }
    }
}

/// Format duration in a human-readable way
fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = (secs / 60.0).floor();
        let remaining_secs = secs % 60.0;
        format!("{}m {:.0}s", mins, remaining_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutant::Mutation;
    use pretty_assertions::assert_eq;

    fn mutants(statuses: &[MutantStatus]) -> Vec<Mutant> {
        let node: syn::Expr = syn::parse_quote!(a + b);
        statuses
            .iter()
            .enumerate()
            .map(|(i, &status)| {
                let mutation = Mutation::new(
                    &node,
                    syn::parse_quote!(a - b),
                    MutationKind::Arithmetic,
                    "Arithmetic mutation",
                );
                let mut mutant = Mutant::new(MutantId(i as u64 + 1), PathBuf::from("src/math.rs"), mutation);
                mutant.set_status(status, None);
                mutant
            })
            .collect()
    }

    fn statuses(killed: usize, timeout: usize, survived: usize) -> Vec<MutantStatus> {
        let mut all = vec![MutantStatus::Killed; killed];
        all.extend(vec![MutantStatus::Timeout; timeout]);
        all.extend(vec![MutantStatus::Survived; survived]);
        all
    }

    #[test]
    fn test_score_counts_timeouts_as_detected() {
        let report = aggregate(&mutants(&statuses(7, 1, 2)), ScoreOptions::default());
        assert_eq!(report.score, Some(0.8));
        assert_eq!(report.display_score(), Some(80.0));
    }

    #[test]
    fn test_unexecuted_statuses_excluded_by_default() {
        let mut all = statuses(3, 0, 1);
        all.extend([
            MutantStatus::NoCoverage,
            MutantStatus::CompileError,
            MutantStatus::Ignored,
        ]);
        let report = aggregate(&mutants(&all), ScoreOptions::default());
        assert_eq!(report.score, Some(0.75));

        let options = ScoreOptions {
            include_no_coverage: true,
            include_compile_errors: true,
            include_ignored: false,
        };
        let report = aggregate(&mutants(&all), options);
        assert_eq!(report.score, Some(0.5));
    }

    #[test]
    fn test_score_without_executed_mutants() {
        let report = aggregate(&mutants(&[MutantStatus::NoCoverage]), ScoreOptions::default());
        assert_eq!(report.score, None);
        assert_eq!(report.display_score(), None);
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(round_half_even(0.125, 2), 0.12);
        assert_eq!(round_half_even(0.375, 2), 0.38);
        assert_eq!(round_half_even(66.666666, 2), 66.67);
        assert_eq!(round_half_even(2.5, 0), 2.0);
    }

    #[test]
    fn test_report_is_deterministic() {
        let all = statuses(2, 1, 3);
        let first = aggregate(&mutants(&all), ScoreOptions::default());
        let second = aggregate(&mutants(&all), ScoreOptions::default());
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }

    #[test]
    fn test_json_record_fields() {
        let report = aggregate(&mutants(&statuses(1, 0, 0)), ScoreOptions::default());
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        let record = &value["mutants"][0];
        assert_eq!(record["id"], 1);
        assert_eq!(record["status"], "killed");
        assert_eq!(record["kind"], "arithmetic");
        assert_eq!(record["original"], "a + b");
        assert_eq!(record["replacement"], "a - b");
        assert_eq!(value["counts"]["killed"], 1);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_secs(75)), "1m 15s");
    }
}
