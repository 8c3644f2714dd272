//! Cooperative-multitasking runtime for asynchronous I/O.
//!
//! This crate provides a single-threaded scheduler that lets many
//! suspendable computations behave like nested function calls — one
//! coroutine can delegate work to another and receive its result — while
//! the whole chain transparently suspends on I/O and is resumed later by
//! an event loop.
//!
//! # Architecture
//!
//! - **Coroutine**: the suspend/resume primitive; emits values, delegates,
//!   or completes, with failures carried like exceptions
//! - **Compose**: the trampoline turning a stack of coroutines into one
//!   logical call chain with call/return/exception semantics
//! - **Reactor**: the readiness-multiplexing event loop over poll(2), with
//!   one-shot timers and priority-decay fairness
//! - **Observable**: publish/notify broadcast that fans a message out to
//!   observers, merges their output streams, and rolls partially committed
//!   side effects back through compensating undo
//! - **Notifier**: the sole cross-thread boundary, for re-entering the
//!   single-threaded model from worker threads
//! - **ReactorBuilder**: fluent builder for reactor instantiation

mod builder;
pub mod compose;
mod failure;
pub mod observable;
pub mod reactor;

pub use builder::ReactorBuilder;
pub use compose::{Compose, Coroutine, Step, Value};
pub use failure::{Failure, FailureKind};
pub use observable::{Observable, Observer, Tee};
pub use reactor::{DEFAULTPRIO, MAXPRIO, Notifier, Reactor, ReactorError, TimerToken};
