//! Observer broadcast subsystem.
//!
//! Routes a message to a set of registered observers, each of which answers
//! with a coroutine:
//! - [`core`]: the [`Observer`] contract and the [`Observable`] dispatcher
//! - [`tee`]: the coroutine that merges several observer outputs into one

pub mod core;
pub mod tee;

pub use self::core::{Observable, Observer};
pub use tee::Tee;
