//! The merge coroutine behind multi-observer broadcasts.

use crate::compose::coroutine::{Coroutine, Step, Value};
use crate::compose::engine::Compose;
use crate::failure::Failure;

/// Merges several coroutines into one.
///
/// Each resume forwards the identical input to every remaining member and
/// concatenates their emitted bytes, in registration order, into a single
/// output. A member that completes or fails leaves the fan-out silently;
/// the merge completes once no members remain.
///
/// Members are driven through [`Compose`], so an observer's coroutine may
/// itself delegate.
pub struct Tee {
    members: Vec<Compose>,
}

impl Tee {
    /// Creates a merge over the given member coroutines.
    pub fn new(sinks: Vec<Box<dyn Coroutine>>) -> Self {
        Self {
            members: sinks.into_iter().map(Compose::new).collect(),
        }
    }

    /// Number of members still being fanned out to.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

impl Coroutine for Tee {
    fn resume(&mut self, input: Option<Value>) -> Result<Step, Failure> {
        if self.members.is_empty() {
            return Ok(Step::Done(Vec::new()));
        }

        let mut output = Value::new();
        let mut kept = Vec::with_capacity(self.members.len());

        for mut member in self.members.drain(..) {
            match member.resume(input.clone()) {
                Ok(Step::Emit(Some(value))) => {
                    output.extend_from_slice(&value);
                    kept.push(member);
                }
                Ok(Step::Emit(None)) => kept.push(member),
                // a composition never surfaces Delegate; completed and
                // failed members leave the fan-out
                Ok(Step::Delegate(_)) | Ok(Step::Done(_)) | Err(_) => {}
            }
        }

        self.members = kept;
        if self.members.is_empty() {
            Ok(Step::Done(Vec::new()))
        } else {
            Ok(Step::Emit(Some(output)))
        }
    }

    fn throw(&mut self, failure: Failure) -> Result<Step, Failure> {
        self.close();
        Err(failure)
    }

    fn close(&mut self) {
        for member in &mut self.members {
            member.close();
        }
        self.members.clear();
    }
}
