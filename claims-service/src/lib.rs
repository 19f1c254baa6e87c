//! Claims Service for insurance claim processing
//! 
//! Turns billable records into insurance claims and carries them to payment:
//! - Claim aggregation: lines priced through scheme tariffs, coverage
//!   resolved per line, rollups derived from the lines
//! - Claim lifecycle: draft → pending vetting → vetted → submitted →
//!   processing → completed, with rejection and cloning
//! - Submission batches with snapshotted member amounts, per-claim
//!   adjudication and payment reconciliation
//! - Append-only status history and transition events
//! 
//! # Example
//! 
//! ```rust,no_run
//! use claims_service::ClaimsEngine;
//! use config_engine::EngineSettings;
//! use insurance_service::InsuranceService;
//! use std::sync::Arc;
//! 
//! # async fn run() -> Result<(), claims_service::ClaimsError> {
//! let engine = ClaimsEngine::new(EngineSettings::default(), Arc::new(InsuranceService::new()));
//! let batch = engine.create_batch(uuid::Uuid::new_v4(), "claims-officer", None).await?;
//! assert_eq!(engine.batch_history(batch.id).await?.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod service;
pub mod batch_service;
pub mod models;
pub mod aggregator;
pub mod lifecycle;
pub mod batch;
pub mod history;
pub mod repository;
pub mod locks;
pub mod numbering;
pub mod events;
pub mod reporting;
pub mod error;

pub use service::*;
pub use models::*;
pub use aggregator::*;
pub use history::*;
pub use repository::*;
pub use events::*;
pub use reporting::*;
pub use error::*;
