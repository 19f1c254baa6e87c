//! Settings for the claims engine
//! 
//! Settings are layered, later sources overriding earlier ones:
//! 
//! 1. Built-in defaults ([`EngineSettings::default`])
//! 2. An optional YAML, TOML or JSON file
//! 3. `RUSTCARE_`-prefixed environment variables, with `__` separating
//!    nested keys (`RUSTCARE_LOGGING__LEVEL=debug`)
//! 
//! The merged result is validated before it is handed out.
//! 
//! # Example
//! 
//! ```rust
//! use config_engine::{BatchRejectionPolicy, ConfigEngine};
//! 
//! let settings = ConfigEngine::new()
//!     .with_yaml("batch_rejection_policy: reopen_for_correction")
//!     .without_env()
//!     .load()
//!     .unwrap();
//! assert_eq!(settings.batch_rejection_policy, BatchRejectionPolicy::ReopenForCorrection);
//! ```

pub mod engine;
pub mod settings;
pub mod validation;
pub mod error;

pub use engine::*;
pub use settings::*;
pub use error::*;
