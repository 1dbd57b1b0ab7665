//! Local indexed cache and the key extraction it is addressed by.

mod delta;
mod key;
mod store;

pub use delta::*;
pub use key::*;
pub use store::*;
