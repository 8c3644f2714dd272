//! Event-driven I/O reactor module.
//!
//! This module provides readiness-driven scheduling over poll(2):
//! - [`core`]: the event loop, registration tables and priority fairness
//! - [`poller`]: the poll(2) multiplex-wait wrapper
//! - [`timer`]: deadline-ordered one-shot timers
//! - [`notify`]: cross-thread job handoff through an internal socket pair

pub mod core;
pub mod notify;
pub mod poller;
pub mod timer;

pub use self::core::{DEFAULTPRIO, MAXPRIO, Reactor, ReactorError};
pub use notify::Notifier;
pub use timer::TimerToken;
