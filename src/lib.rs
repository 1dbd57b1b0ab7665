//! Reconciliation core for controllers.
//!
//! A [`Reflector`] lists and watches a remote collection into a local
//! [`Indexer`]; every change becomes an [`ObjectKey`] on a deduplicating,
//! rate-limited [`RateLimitingQueue`]; a pool of workers drains the queue
//! through a [`Reconciler`] once the cache has synced.
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(());
//! let controller = ControllerBuilder::<Pod>::new(shutdown_rx)?
//!     .build(list_watch, |ctx| StdoutReconciler::new(ctx.indexer.clone()))?;
//! tokio::spawn(controller.run());
//! ```
mod cache;
mod config;
mod controller;
mod errors;
mod informer;
pub mod metrics;
mod utils;
mod workqueue;

pub use cache::*;
pub use config::*;
pub use controller::*;
pub use errors::*;
pub use informer::*;
pub use workqueue::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
