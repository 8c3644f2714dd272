//! Fluent builder for Reactor construction.
//!
//! Provides a builder pattern interface for creating and configuring
//! Reactor instances.

use crate::reactor::core::{DEFAULTPRIO, MAXPRIO, Reactor, ReactorError};

/// Builder for constructing [`Reactor`] instances with a fluent API.
///
/// # Example
/// ```ignore
/// let reactor = ReactorBuilder::new()
///     .default_priority(1)
///     .enable_notifier()
///     .build()?;
/// ```
pub struct ReactorBuilder {
    default_priority: usize,
    notifier: bool,
}

impl Default for ReactorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReactorBuilder {
    /// Creates a new reactor builder.
    pub fn new() -> Self {
        Self {
            default_priority: DEFAULTPRIO,
            notifier: false,
        }
    }

    /// Sets the priority used by registrations that do not pass one
    /// explicitly. Must lie in `[0, MAXPRIO)`; validated at `build()`.
    pub fn default_priority(mut self, prio: usize) -> Self {
        self.default_priority = prio;
        self
    }

    /// Sets up the cross-thread notifier during `build()`, so the first
    /// call to [`Reactor::notifier`] cannot fail later.
    pub fn enable_notifier(mut self) -> Self {
        self.notifier = true;
        self
    }

    /// Builds and returns a configured [`Reactor`] instance.
    pub fn build(self) -> Result<Reactor, ReactorError> {
        if self.default_priority >= MAXPRIO {
            return Err(ReactorError::InvalidPriority(self.default_priority));
        }
        let mut reactor = Reactor::with_default_priority(self.default_priority);
        if self.notifier {
            reactor.notifier()?;
        }
        Ok(reactor)
    }
}
