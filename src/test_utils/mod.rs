//! the test_utils folder here will share fixtures between unit tests of
//! different modules
mod common;
mod fake_list_watch;
mod recording_handler;

pub use common::*;
pub use fake_list_watch::*;
pub use recording_handler::*;
