//! dockaudit - static security and hygiene audit for Dockerfiles.
//!
//! dockaudit reads Dockerfiles without a container engine or registry,
//! turns each into a read-only model, and runs heuristic rule packs over it.
//!
//! # Architecture
//!
//! - `dockerfile`: discovery, tokenizing, the build-file model and the
//!   derived-fact extractors every rule pack queries
//! - `rules`: the `RulePack` trait, the built-in packs, inline suppressions
//!   and the `Runner`
//! - `config`: YAML configuration schema
//! - `report`: Output formatting (pretty, JSON, SARIF, lines)
//!
//! # Adding a Rule Pack
//!
//! See `src/rules/packs/` for examples. Implement `RulePack` and add the
//! pack to the registry in `rules/pack.rs`.

pub mod cli;
pub mod config;
pub mod dockerfile;
pub mod report;
pub mod rules;

pub use config::Config;
pub use dockerfile::{BuildFileModel, BuildFileTarget, FactSheet, Instruction, PackageInstall};
pub use rules::{AuditResult, Finding, RulePack, Runner, Severity};
