//! The trampoline that composes a stack of coroutines into one.
//!
//! [`Compose`] lets a coroutine delegate work to another coroutine and
//! receive its results, with failures propagating frame by frame, exactly as
//! if each delegation were an ordinary function call. The composition is
//! itself a [`Coroutine`], so an external driver resumes it like any other
//! and compositions nest transparently.
//!
//! # How a step runs
//!
//! Each external resume (or throw) drives the top of the call stack until
//! either an output surfaces to the driver or the stack empties:
//!
//! 1. A pending failure is thrown into the top frame; otherwise the front
//!    pending message is delivered to it.
//! 2. `Delegate` pushes the nested frame and queues its start input.
//! 3. `Emit(Some(..))` surfaces to the driver. `Emit(None)` surfaces only
//!    when no messages are queued; otherwise the next queued message is
//!    delivered instead, which is what replays a delegate's leftover data
//!    into its caller before any externally supplied value.
//! 4. `Done` pops the frame and queues its values (or one empty input) at
//!    the front for the caller.
//! 5. A failure pops the frame and is thrown into the new top; with the
//!    stack empty it reaches the external driver.

use crate::compose::coroutine::{Coroutine, Step, Value};
use crate::failure::Failure;

use std::collections::VecDeque;

/// A stack of coroutines driven as one logical call chain.
pub struct Compose {
    stack: Vec<Box<dyn Coroutine>>,
    messages: VecDeque<Option<Value>>,
    pending: Option<Failure>,
    started: bool,
    emitted_data: bool,
}

impl Compose {
    /// Creates a composition around the initial coroutine.
    pub fn new(initial: Box<dyn Coroutine>) -> Self {
        let mut messages = VecDeque::new();
        // the start input for the initial frame
        messages.push_back(None);

        Self {
            stack: vec![initial],
            messages,
            pending: None,
            started: false,
            emitted_data: false,
        }
    }

    /// Number of frames currently on the call stack.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn run(&mut self) -> Result<Step, Failure> {
        loop {
            let Some(top) = self.stack.last_mut() else {
                break;
            };

            let step = match self.pending.take() {
                Some(failure) => top.throw(failure),
                None => {
                    let message = self.messages.pop_front().unwrap_or(None);
                    top.resume(message)
                }
            };

            match step {
                Ok(Step::Delegate(nested)) => {
                    self.stack.push(nested);
                    self.messages.push_front(None);
                }
                Ok(Step::Emit(value)) => {
                    if value.is_none() && !self.messages.is_empty() {
                        // The frame asked for input while replayed data is
                        // queued; deliver that instead of suspending.
                        continue;
                    }
                    self.emitted_data = value.is_some();
                    return Ok(Step::Emit(value));
                }
                Ok(Step::Done(values)) => {
                    // a completed frame needs no close
                    self.stack.pop();
                    if values.is_empty() {
                        self.messages.push_front(None);
                    } else {
                        for value in values.into_iter().rev() {
                            self.messages.push_front(Some(value));
                        }
                    }
                }
                Err(failure) => {
                    self.stack.pop();
                    self.pending = Some(failure);
                }
            }
        }

        if let Some(failure) = self.pending.take() {
            return Err(failure);
        }

        // Values the outermost frame left behind surface as the
        // composition's own return values, so nested compositions behave
        // exactly like a flattened stack.
        let leftovers = self.messages.drain(..).flatten().collect();
        Ok(Step::Done(leftovers))
    }
}

impl Coroutine for Compose {
    fn resume(&mut self, input: Option<Value>) -> Result<Step, Failure> {
        if !self.started {
            self.started = true;
            if input.is_some() {
                return Err(Failure::invariant(
                    "cannot accept data before the first suspension",
                ));
            }
            return self.run();
        }

        if self.stack.is_empty() {
            return Ok(Step::Done(Vec::new()));
        }

        if self.emitted_data && input.is_some() {
            // After a real output the driver must resume empty first. The
            // violation is charged to the top frame so an enclosing frame
            // can observe it.
            self.emitted_data = false;
            if let Some(mut top) = self.stack.pop() {
                top.close();
            }
            self.pending = Some(Failure::invariant(
                "cannot accept data after an emitted value; resume empty first",
            ));
            return self.run();
        }

        self.emitted_data = false;
        self.messages.push_front(input);
        self.run()
    }

    fn throw(&mut self, failure: Failure) -> Result<Step, Failure> {
        if !self.started {
            self.started = true;
            // the start input is superseded by the injected failure
            self.messages.clear();
        }
        if self.stack.is_empty() {
            return Err(failure);
        }
        self.pending = Some(failure);
        self.run()
    }

    fn close(&mut self) {
        while let Some(mut frame) = self.stack.pop() {
            frame.close();
        }
        self.messages.clear();
        self.pending = None;
    }
}
