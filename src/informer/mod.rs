//! List-then-watch machinery feeding the local cache.
mod event_handler;
mod list_watch;
mod reflector;

pub use event_handler::*;
pub use list_watch::*;
pub use reflector::*;
