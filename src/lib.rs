//! Mutation Testing Engine for Rust
//!
//! This library finds mutation sites in Rust sources, compiles every mutant
//! into a single instrumented build (mutant schemata) and activates one
//! mutant per test run through an environment variable. Each mutant ends up
//! killed, survived, timed out, or skipped with a reason, and the report
//! scores the test suite.
//!
//! # Example Configuration
//!
//! ```yaml
//! version: "1.0"
//! crate_root: src/lib.rs
//! settings:
//!   level: standard
//!   disabled_kinds: [string]
//!   concurrency: 4
//!   timeout:
//!     multiplier: 1.5
//!     margin_ms: 5000
//!   exclude:
//!     - file: src/generated.rs
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use mutation_engine::{build_catalog, CancellationToken, CargoProject, Config, Engine, EngineOptions, MutatorRegistry};
//! use std::path::Path;
//!
//! let project_dir = Path::new(".");
//! let config = Config::load(Path::new("mutations.yaml")).unwrap();
//! let catalog = build_catalog(&config, project_dir, &MutatorRegistry::standard()).unwrap();
//! let cargo = CargoProject::prepare(project_dir).unwrap();
//! let engine = Engine::new(&cargo, &cargo, EngineOptions::from_config(&config, project_dir), CancellationToken::new());
//! let report = engine.run(catalog).unwrap();
//! report.print();
//! ```

pub mod backend;
pub mod catalog;
pub mod codegen;
pub mod compile;
pub mod config;
pub mod coverage;
pub mod engine;
pub mod error;
pub mod injector;
pub mod mutant;
pub mod mutators;
pub mod report;
pub mod runner;
pub mod scheduler;

// Re-export main types at crate root
pub use backend::{Builder, CancellationToken, Isolation, TestRunner, TestSelection};
pub use catalog::{CatalogBuilder, CatalogOptions};
pub use config::{Config, Settings};
pub use engine::{build_catalog, Catalog, Engine, EngineOptions};
pub use error::{MutationError, Result};
pub use mutant::{Mutant, MutantId, MutantStatus, Mutation, MutationKind, MutationLevel};
pub use mutators::{Mutator, MutatorRegistry};
pub use report::{aggregate, MutationReport, ScoreOptions};
pub use runner::CargoProject;
