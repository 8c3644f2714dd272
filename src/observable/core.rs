//! Observer registration and message dispatch.
//!
//! An [`Observable`] owns an ordered list of observers. Dispatch comes in
//! two flavors:
//! - [`Observable::notify_all`]: every observer receives the message; the
//!   invocation phase is all-or-nothing, rolled back through `undo` on
//!   failure, and the resulting coroutines are merged by [`Tee`].
//! - [`Observable::notify_any`]: the first observer that does not decline
//!   satisfies the message and its coroutine is returned unmodified.

use crate::compose::coroutine::{Coroutine, Value};
use crate::failure::{Failure, FailureKind};
use crate::observable::tee::Tee;

/// A listener registered with an [`Observable`].
pub trait Observer {
    /// Handles a message, answering with the coroutine that will produce
    /// the observer's output stream.
    ///
    /// Returning a failure of kind [`FailureKind::Decline`] opts out of the
    /// message without being treated as an error.
    fn notify(&mut self, message: &str, args: &[Value]) -> Result<Box<dyn Coroutine>, Failure>;

    /// Reverses any side effect a successful `notify` already committed.
    ///
    /// Called, in reverse registration order, on every observer that had
    /// succeeded when a later observer fails during a broadcast.
    fn undo(&mut self) -> Result<(), Failure> {
        Ok(())
    }
}

/// An ordered set of observers and the dispatch logic over them.
///
/// Registration order determines broadcast order, merge order, and (in
/// reverse) undo order.
pub struct Observable {
    name: Option<String>,
    observers: Vec<Box<dyn Observer>>,
}

impl Observable {
    /// Creates an observable with no observers.
    pub fn new() -> Self {
        Self {
            name: None,
            observers: Vec::new(),
        }
    }

    /// Creates a named observable.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            observers: Vec::new(),
        }
    }

    /// The observable's name, if it has one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Appends an observer. Broadcast order is registration order.
    pub fn add_observer(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Broadcasts a message to every observer, in registration order.
    ///
    /// Observers that decline are skipped. If an observer fails, every
    /// previously succeeded observer's `undo` runs in reverse registration
    /// order and the original failure is returned; a failure from `undo`
    /// itself takes its place. With exactly one resulting coroutine it is
    /// returned unmodified; otherwise the results are merged by [`Tee`].
    pub fn notify_all(
        &mut self,
        message: &str,
        args: &[Value],
    ) -> Result<Box<dyn Coroutine>, Failure> {
        let mut succeeded: Vec<usize> = Vec::new();
        let mut sinks: Vec<Box<dyn Coroutine>> = Vec::new();

        for index in 0..self.observers.len() {
            match self.observers[index].notify(message, args) {
                Ok(sink) => {
                    succeeded.push(index);
                    sinks.push(sink);
                }
                Err(failure) if failure.kind() == FailureKind::Decline => continue,
                Err(failure) => {
                    for &done in succeeded.iter().rev() {
                        self.observers[done].undo()?;
                    }
                    return Err(failure);
                }
            }
        }

        if sinks.len() == 1 {
            return Ok(sinks.remove(0));
        }
        Ok(Box::new(Tee::new(sinks)))
    }

    /// Dispatches a message to the first observer that accepts it.
    ///
    /// Observers that decline are skipped; any other failure propagates.
    /// If every observer declines, a no-responder failure naming the
    /// message and the observer count is returned.
    pub fn notify_any(
        &mut self,
        message: &str,
        args: &[Value],
    ) -> Result<Box<dyn Coroutine>, Failure> {
        let count = self.observers.len();
        for observer in &mut self.observers {
            match observer.notify(message, args) {
                Ok(sink) => return Ok(sink),
                Err(failure) if failure.kind() == FailureKind::Decline => continue,
                Err(failure) => return Err(failure),
            }
        }
        Err(Failure::no_responder(message, count))
    }
}

impl Default for Observable {
    fn default() -> Self {
        Self::new()
    }
}

/// An observable forwards notifications to its own observers, so
/// observables compose into trees.
impl Observer for Observable {
    fn notify(&mut self, message: &str, args: &[Value]) -> Result<Box<dyn Coroutine>, Failure> {
        self.notify_all(message, args)
    }
}
