//! In-process event bus for the claims engine
//! 
//! The engine publishes one event per claim or batch status transition.
//! Notification and reporting collaborators subscribe with a subject
//! pattern and receive every matching event synchronously, in publish order.
//! 
//! # Subject Patterns
//! 
//! - `claim.status_changed`: exact subject
//! - `claim.*`: every subject under `claim.`
//! - `*`: everything
//! 
//! # Example
//! 
//! ```rust
//! use events_bus::{Event, EventBus};
//! use serde_json::json;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//! 
//! let bus = EventBus::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = seen.clone();
//! bus.subscribe("claim.*", move |_event| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//!     Ok(())
//! }).unwrap();
//! 
//! bus.publish(Event::new("claim.status_changed", uuid::Uuid::new_v4(), json!({ "to": "vetted" })));
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

pub mod bus;
pub mod event;
pub mod error;

pub use bus::*;
pub use event::*;
pub use error::*;
