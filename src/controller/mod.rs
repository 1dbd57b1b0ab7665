//! Worker pool and orchestration on top of the informer and the work queue.
mod builder;
mod context;
#[allow(clippy::module_inception)]
mod controller;
mod error_reporter;
mod reconciler;
mod worker;

pub use builder::*;
pub use context::*;
pub use controller::*;
pub use error_reporter::*;
pub use reconciler::*;
pub(crate) use worker::*;
