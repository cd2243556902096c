//! # sops-check-core
//!
//! Policy checks for the trust anchors of SOPS encrypted files.
//!
//! A policy is a tree of declarative rules ([`RuleConfig`]) that is compiled
//! once into a [`Rule`] and evaluated against the trust anchors (master keys)
//! found in each file's `sops` metadata. This crate provides:
//!
//! - [`Config`] for loading policies from YAML or TOML files and URLs
//! - [`rules`] for compiling, evaluating and explaining rules
//! - [`sops`] for discovering SOPS files and extracting their trust anchors
//! - [`Checker`] for orchestrating a check over a directory tree
//! - [`SarifLog`] for writing findings as a SARIF report
//!
//! ## Example
//!
//! ```no_run
//! use sops_check_core::{Checker, Config};
//!
//! let config = Config::load(".sops-check.yaml")?;
//! let checker = Checker::builder().root(".").config(config).build()?;
//!
//! let report = checker.check()?;
//! if let Some(violation) = report.violation() {
//!     eprintln!("{violation}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod checker;
mod config;
pub mod rules;
pub mod sarif;
pub mod sops;
pub mod utils;

pub use checker::{CheckReport, Checker, CheckerBuilder, CheckerError, FileOutcome, PolicyViolation};
pub use config::{is_url, Config, ConfigError, ConfigFormat, RuleConfig};
pub use rules::{compile, CompileError, DiagnosticEntry, EvalContext, EvalResult, Rule};
pub use sarif::{SarifError, SarifLog};
pub use sops::{DiscoveryError, SopsFile};
