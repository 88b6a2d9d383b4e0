//! Configuration file parsing for mutation testing

use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use walkdir::WalkDir;

use crate::catalog::CatalogOptions;
use crate::error::{MutationError, Result};
use crate::mutant::{MutationKind, MutationLevel, SourceSpan};
use crate::report::ScoreOptions;
use crate::scheduler::{SchedulerOptions, TimeoutPolicy};

/// Top-level configuration structure
#[derive(Debug, Deserialize)]
pub struct Config {
    pub version: String,
    /// Library crate root, relative to the project. Binary roots under
    /// `src/` are found on disk.
    #[serde(default = "default_crate_root")]
    pub crate_root: PathBuf,
    /// Files to mutate. Empty means every `.rs` file under `src/`.
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub settings: Settings,
}

fn default_crate_root() -> PathBuf {
    PathBuf::from("src/lib.rs")
}

/// Global settings for mutation testing
#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub level: MutationLevel,
    /// Enabled mutation kinds; every kind when omitted
    #[serde(default)]
    pub kinds: Option<Vec<MutationKind>>,
    #[serde(default)]
    pub disabled_kinds: Vec<MutationKind>,
    #[serde(default)]
    pub exclude: Vec<ExcludedRegion>,
    /// Worker threads; number of CPUs when omitted
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub timeout: TimeoutSettings,
    #[serde(default = "default_true")]
    pub coverage_analysis: bool,
    /// Coverage map (JSON) to use instead of capturing one, relative to the
    /// project
    #[serde(default)]
    pub coverage_file: Option<PathBuf>,
    #[serde(default)]
    pub score: ScoreOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            level: MutationLevel::default(),
            kinds: None,
            disabled_kinds: Vec::new(),
            exclude: Vec::new(),
            concurrency: None,
            timeout: TimeoutSettings::default(),
            coverage_analysis: true,
            coverage_file: None,
            score: ScoreOptions::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_margin_ms")]
    pub margin_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            multiplier: default_multiplier(),
            margin_ms: default_margin_ms(),
        }
    }
}

fn default_multiplier() -> f64 {
    1.5
}

fn default_margin_ms() -> u64 {
    5000
}

/// Source lines that must not be mutated. Without `lines` the whole file is excluded.
#[derive(Debug, Deserialize, Clone)]
pub struct ExcludedRegion {
    pub file: PathBuf,
    #[serde(default)]
    pub lines: Option<(usize, usize)>,
}

impl ExcludedRegion {
    fn span(&self) -> SourceSpan {
        match self.lines {
            Some((first, last)) => SourceSpan::lines(first, last),
            None => SourceSpan::lines(1, usize::MAX),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MutationError::ConfigError {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::parse(&content).map_err(|e| MutationError::ConfigError {
            message: format!("Failed to parse config file '{}': {}", path.display(), e),
        })
    }

    pub fn parse(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Check settings that serde cannot
    pub fn validate(&self) -> Result<()> {
        let settings = &self.settings;
        if settings.concurrency == Some(0) {
            return Err(MutationError::ConfigError {
                message: "concurrency must be at least 1".to_string(),
            });
        }
        if !settings.timeout.multiplier.is_finite() || settings.timeout.multiplier < 1.0 {
            return Err(MutationError::ConfigError {
                message: format!(
                    "timeout multiplier must be at least 1.0, got {}",
                    settings.timeout.multiplier
                ),
            });
        }
        for region in &settings.exclude {
            if let Some((first, last)) = region.lines {
                if first == 0 || last < first {
                    return Err(MutationError::ConfigError {
                        message: format!(
                            "invalid excluded lines [{}, {}] in '{}'",
                            first,
                            last,
                            region.file.display()
                        ),
                    });
                }
            }
        }
        if self.enabled_kinds().is_empty() {
            return Err(MutationError::ConfigError {
                message: "every mutation kind is disabled".to_string(),
            });
        }
        Ok(())
    }

    pub fn enabled_kinds(&self) -> BTreeSet<MutationKind> {
        let enabled: BTreeSet<MutationKind> = match &self.settings.kinds {
            Some(kinds) => kinds.iter().copied().collect(),
            None => MutationKind::ALL.into_iter().collect(),
        };
        enabled
            .into_iter()
            .filter(|k| !self.settings.disabled_kinds.contains(k))
            .collect()
    }

    /// Catalog options for one file, with that file's excluded regions
    pub fn catalog_options(&self, file: &Path) -> CatalogOptions {
        CatalogOptions {
            level: self.settings.level,
            kinds: self.enabled_kinds(),
            excluded: self
                .settings
                .exclude
                .iter()
                .filter(|region| region.file == file)
                .map(ExcludedRegion::span)
                .collect(),
        }
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            concurrency: self.settings.concurrency.unwrap_or_else(num_cpus::get),
            timeout: TimeoutPolicy {
                multiplier: self.settings.timeout.multiplier,
                margin: Duration::from_millis(self.settings.timeout.margin_ms),
            },
        }
    }

    /// Roots of every crate built from `src/`: the configured crate root,
    /// `src/main.rs`, and each binary under `src/bin/`. Each of them gets the
    /// runtime selector module.
    pub fn target_roots(&self, project_dir: &Path) -> Vec<PathBuf> {
        let mut candidates = vec![self.crate_root.clone(), PathBuf::from("src/main.rs")];
        let bin = project_dir.join("src").join("bin");
        for entry in WalkDir::new(&bin)
            .min_depth(1)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
        {
            let path = entry.path();
            let is_root = match entry.depth() {
                1 => path.extension().is_some_and(|ext| ext == "rs"),
                _ => entry.file_name() == "main.rs",
            };
            if entry.file_type().is_file() && is_root {
                if let Ok(relative) = path.strip_prefix(project_dir) {
                    candidates.push(relative.to_path_buf());
                }
            }
        }

        let mut roots: Vec<PathBuf> = Vec::new();
        for candidate in candidates {
            if project_dir.join(&candidate).is_file() && !roots.contains(&candidate) {
                roots.push(candidate);
            }
        }
        if roots.is_empty() {
            roots.push(self.crate_root.clone());
        }
        roots
    }

    /// Files to mutate, relative to `project_dir`, in a stable order
    pub fn source_files(&self, project_dir: &Path) -> Result<Vec<PathBuf>> {
        if !self.files.is_empty() {
            return Ok(self.files.clone());
        }
        let src = project_dir.join("src");
        let mut files = Vec::new();
        for entry in WalkDir::new(&src).sort_by_file_name() {
            let entry = entry.map_err(|e| MutationError::FileReadError {
                file: src.clone(),
                error: e.to_string(),
            })?;
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "rs") {
                if let Ok(relative) = path.strip_prefix(project_dir) {
                    files.push(relative.to_path_buf());
                }
            }
        }
        Ok(files)
    }
}
