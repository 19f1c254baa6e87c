//! Insurance Service for the claims engine
//! 
//! Provides the pricing and coverage side of claim processing:
//! - Insurance plan registration with per-category default copays
//! - Scheme tariff registry (NHIS price list, G-DRG case rates)
//! - Item mapping from internal drugs/services/procedures to tariff entries
//! - Plan-scoped coverage rules with an unmapped-item fallback
//! - Coverage resolution: how much of a line the insurer pays and what the
//!   patient owes
//! 
//! Everything here is synchronous, bounded computation over in-memory state.
//! Claim persistence and lifecycle live in `claims-service`.

pub mod service;
pub mod models;
pub mod money;
pub mod tariffs;
pub mod mapping;
pub mod rules;
pub mod resolver;
pub mod error;

pub use service::*;
pub use models::*;
pub use tariffs::*;
pub use mapping::*;
pub use rules::*;
pub use resolver::*;
pub use error::*;
