//! Common error handling utilities for the RustCare claims engine
//! 
//! Every crate in the workspace keeps its own `thiserror` enum, but all of
//! them classify into the same small taxonomy so callers can decide what to
//! do with a failure without matching on crate-specific variants.
//! 
//! # Error Categories
//! 
//! - **Validation**: a guard was not met (missing primary diagnosis, missing
//!   G-DRG tariff, missing rejection reason). State is left unchanged.
//! - **Conflict**: another request got there first (`ItemAlreadyClaimed`,
//!   batch membership). Retryable after a re-fetch.
//! - **ImmutableState**: the target is in a state that forbids the edit.
//! - **NotFound**: unknown identifier.
//! - **Internal**: storage, audit log or configuration failures.
//! 
//! # Example
//! 
//! ```rust
//! use error_common::{Categorized, ErrorCategory};
//! 
//! fn should_retry(err: &dyn Categorized) -> bool {
//!     err.category() == ErrorCategory::Conflict
//! }
//! ```

pub mod types;
pub mod codes;
pub mod reporting;

pub use types::*;
pub use reporting::*;
