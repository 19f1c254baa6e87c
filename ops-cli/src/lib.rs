//! Offline claim tooling for the RustCare claims engine.
//!
//! A scenario file describes one plan with its tariffs, item mappings and
//! coverage rules, plus a single encounter to bill. The CLI loads it into an
//! in-memory engine and either prints the computed claim or reports what
//! stands between the claim and approval.
//!
//! ```bash
//! rustcare-claims quote demos/nhis-opd.yaml
//! rustcare-claims --format yaml quote demos/nhis-opd.yaml --summary
//! rustcare-claims check-approval demos/nhis-opd.yaml
//! rustcare-claims --config claims.yaml settings
//! ```

pub mod cli;
pub mod commands;
pub mod scenario;

pub use cli::{Cli, Command, OutputFormat};
pub use commands::{check_approval, classify, load_settings, quote, render, ApprovalReport};
pub use scenario::{LoadedScenario, Scenario};
