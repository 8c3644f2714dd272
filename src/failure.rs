//! Failure values that travel through coroutine stacks.
//!
//! A [`Failure`] plays the role an exception plays in an ordinary call stack:
//! raised inside a frame, observed by every enclosing frame in turn, and
//! recoverable by any frame that chooses to handle it. The reactor routes
//! failures by [`FailureKind`]: ordinary errors are isolated per registration,
//! invariant violations always escape the loop.

use thiserror::Error;

/// Classifies a [`Failure`] for routing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// An ordinary error, recoverable by any enclosing frame.
    Error,
    /// An observer opting out of a broadcast message. Only meaningful during
    /// dispatch; never treated as an error there.
    Decline,
    /// Every observer declined an any-dispatch.
    NoResponder,
    /// A broken internal invariant. The reactor never isolates these.
    Invariant,
}

/// A failure propagating through a composition, frame by frame.
///
/// Failures carry a message, a [`FailureKind`], and optionally the failure
/// that caused them, so that a frame which handles a nested failure and
/// raises its own can keep the original attached.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct Failure {
    message: String,
    kind: FailureKind,
    #[source]
    cause: Option<Box<Failure>>,
}

impl Failure {
    /// Creates an ordinary failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: FailureKind::Error,
            cause: None,
        }
    }

    /// Creates the distinguished decline signal used by any-dispatch.
    pub fn decline() -> Self {
        Self {
            message: String::from("message declined"),
            kind: FailureKind::Decline,
            cause: None,
        }
    }

    /// Creates the failure raised when every observer declined a message.
    pub fn no_responder(message: &str, observers: usize) -> Self {
        Self {
            message: format!("none of the {observers} observers respond to {message}(...)"),
            kind: FailureKind::NoResponder,
            cause: None,
        }
    }

    /// Creates an invariant violation. The reactor lets these escape instead
    /// of isolating them, so test assertions stay fatal.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: FailureKind::Invariant,
            cause: None,
        }
    }

    /// Attaches the failure that caused this one.
    pub fn with_cause(mut self, cause: Failure) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The failure's classification.
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// The failure this one was caused by, if any.
    pub fn cause(&self) -> Option<&Failure> {
        self.cause.as_deref()
    }

    /// Whether this is the decline signal.
    pub fn is_decline(&self) -> bool {
        self.kind == FailureKind::Decline
    }

    /// Whether this is an invariant violation.
    pub fn is_invariant(&self) -> bool {
        self.kind == FailureKind::Invariant
    }
}
