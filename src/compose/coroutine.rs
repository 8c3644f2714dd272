//! The coroutine contract consumed by the composition engine.
//!
//! A coroutine is a resumable computation. Each time it is resumed it either
//! suspends while emitting an output, delegates to a nested coroutine, or
//! completes; failing is the fourth outcome, carried on the `Err` side of the
//! result. The engine is the only component that drives coroutines once they
//! are handed to it.

use crate::failure::Failure;

use std::fmt;

/// A single datum flowing through a composition.
///
/// The runtime is byte-stream oriented: handlers produce and consume chunks
/// of bytes, and the broadcast merge concatenates them.
pub type Value = Vec<u8>;

/// What a coroutine does when resumed.
pub enum Step {
    /// Suspend. `Some` hands an output to the driver; `None` asks the driver
    /// for the next input without producing anything.
    Emit(Option<Value>),
    /// Hand control to a nested coroutine until it completes.
    Delegate(Box<dyn Coroutine>),
    /// Complete. Any carried values are replayed into the caller's input
    /// before anything already queued for it.
    Done(Vec<Value>),
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Emit(value) => f.debug_tuple("Emit").field(value).finish(),
            Step::Delegate(_) => f.write_str("Delegate(..)"),
            Step::Done(values) => f.debug_tuple("Done").field(values).finish(),
        }
    }
}

/// A resumable unit of computation.
///
/// Implementations are explicit state machines: each `resume` consumes one
/// input and advances to the next suspension point. A coroutine must not be
/// resumed again after it reported [`Step::Done`] or failed.
pub trait Coroutine {
    /// Resumes the coroutine with the next input value.
    ///
    /// The first resume of a fresh coroutine carries no value; a coroutine
    /// receives data only at a suspension point that asked for it.
    fn resume(&mut self, input: Option<Value>) -> Result<Step, Failure>;

    /// Injects a failure at the current suspension point.
    ///
    /// The default refuses to handle it, so the failure propagates to the
    /// next enclosing frame exactly like an exception in a call stack.
    fn throw(&mut self, failure: Failure) -> Result<Step, Failure> {
        Err(failure)
    }

    /// Tears the coroutine down before it has completed.
    fn close(&mut self) {}
}

impl fmt::Debug for dyn Coroutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<coroutine>")
    }
}
