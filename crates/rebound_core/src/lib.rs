//! Rebound Core Runtime
//!
//! This crate provides the foundational primitives shared by the Rebound
//! animation system:
//!
//! - **Subscribers**: Callback registries that isolate panicking consumers
//! - **Value Sources**: A common read/subscribe surface for animated, directly
//!   driven and derived values
//! - **Errors**: Recoverable error kinds that are logged rather than surfaced
//!
//! # Example
//!
//! ```rust
//! use rebound_core::Subscribers;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! let subscribers = Subscribers::<f64>::new();
//! let seen = Arc::new(AtomicU32::new(0));
//!
//! let seen_clone = seen.clone();
//! subscribers.insert(Arc::new(move |_value: &f64| {
//!     seen_clone.fetch_add(1, Ordering::SeqCst);
//! }));
//!
//! subscribers.notify(&1.0);
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

pub mod error;
pub mod subscribers;
pub mod sync;
pub mod value;

pub use error::{Error, Result};
pub use subscribers::{call_isolated, Callback, SubscriptionId, Subscribers};
pub use sync::lock;
pub use value::{finite_or_zero, sanitize, IntoSource, SourceRef, ValueSource};
