#![allow(dead_code)]

use weft::{Coroutine, Failure, Observer, Step, Value};

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Shared event log, so tests can observe coroutines after moving them
/// into a composition.
pub type Log = Rc<RefCell<Vec<Event>>>;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Resumed(&'static str, Option<Value>),
    Thrown(&'static str, String),
    Closed(&'static str),
    Notified(&'static str, String),
    Undone(&'static str),
}

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// One scripted reaction of a [`Script`] coroutine.
pub enum Action {
    Emit(Option<Value>),
    Delegate(Box<dyn Coroutine>),
    Done(Vec<Value>),
    Fail(Failure),
}

/// A coroutine driven by a fixed list of actions, recording everything
/// that happens to it.
pub struct Script {
    name: &'static str,
    actions: VecDeque<Action>,
    log: Log,
    handles_failures: bool,
}

impl Script {
    /// A script that propagates injected failures, like a plain frame with
    /// no failure handling.
    pub fn new(name: &'static str, log: &Log, actions: Vec<Action>) -> Self {
        Self {
            name,
            actions: actions.into(),
            log: log.clone(),
            handles_failures: false,
        }
    }

    /// A script that swallows injected failures and continues with its
    /// remaining actions.
    pub fn handling(name: &'static str, log: &Log, actions: Vec<Action>) -> Self {
        Self {
            handles_failures: true,
            ..Self::new(name, log, actions)
        }
    }

    fn next_action(&mut self) -> Result<Step, Failure> {
        match self.actions.pop_front() {
            Some(Action::Emit(value)) => Ok(Step::Emit(value)),
            Some(Action::Delegate(nested)) => Ok(Step::Delegate(nested)),
            Some(Action::Done(values)) => Ok(Step::Done(values)),
            Some(Action::Fail(failure)) => Err(failure),
            None => Ok(Step::Done(Vec::new())),
        }
    }
}

impl Coroutine for Script {
    fn resume(&mut self, input: Option<Value>) -> Result<Step, Failure> {
        self.log
            .borrow_mut()
            .push(Event::Resumed(self.name, input.clone()));
        self.next_action()
    }

    fn throw(&mut self, failure: Failure) -> Result<Step, Failure> {
        self.log
            .borrow_mut()
            .push(Event::Thrown(self.name, failure.message().to_string()));
        if self.handles_failures {
            self.next_action()
        } else {
            Err(failure)
        }
    }

    fn close(&mut self) {
        self.log.borrow_mut().push(Event::Closed(self.name));
    }
}

/// How a [`Probe`] observer answers its next notification.
pub enum Reply {
    Answer(Vec<Action>),
    Decline,
    Fail(&'static str),
}

/// An observer that records notifications and undos on the shared log.
///
/// Its answering coroutine is a [`Script`] under the same name, logging to
/// the same place.
pub struct Probe {
    name: &'static str,
    log: Log,
    reply: Option<Reply>,
    undo_failure: Option<&'static str>,
}

impl Probe {
    pub fn answering(name: &'static str, log: &Log, actions: Vec<Action>) -> Box<Self> {
        Box::new(Self {
            name,
            log: log.clone(),
            reply: Some(Reply::Answer(actions)),
            undo_failure: None,
        })
    }

    pub fn declining(name: &'static str, log: &Log) -> Box<Self> {
        Box::new(Self {
            name,
            log: log.clone(),
            reply: Some(Reply::Decline),
            undo_failure: None,
        })
    }

    pub fn failing(name: &'static str, log: &Log, message: &'static str) -> Box<Self> {
        Box::new(Self {
            name,
            log: log.clone(),
            reply: Some(Reply::Fail(message)),
            undo_failure: None,
        })
    }

    pub fn with_failing_undo(mut self: Box<Self>, message: &'static str) -> Box<Self> {
        self.undo_failure = Some(message);
        self
    }
}

impl Observer for Probe {
    fn notify(&mut self, message: &str, _args: &[Value]) -> Result<Box<dyn Coroutine>, Failure> {
        self.log
            .borrow_mut()
            .push(Event::Notified(self.name, message.to_string()));
        match self.reply.take() {
            Some(Reply::Answer(actions)) => {
                Ok(Box::new(Script::new(self.name, &self.log, actions)))
            }
            Some(Reply::Decline) => Err(Failure::decline()),
            Some(Reply::Fail(message)) => Err(Failure::new(message)),
            None => Ok(Box::new(Script::new(self.name, &self.log, Vec::new()))),
        }
    }

    fn undo(&mut self) -> Result<(), Failure> {
        self.log.borrow_mut().push(Event::Undone(self.name));
        match self.undo_failure {
            Some(message) => Err(Failure::new(message)),
            None => Ok(()),
        }
    }
}

pub fn bytes(text: &str) -> Value {
    text.as_bytes().to_vec()
}

/// Every input the named script received, in order.
pub fn inputs_of(log: &Log, name: &'static str) -> Vec<Option<Value>> {
    log.borrow()
        .iter()
        .filter_map(|event| match event {
            Event::Resumed(n, input) if *n == name => Some(input.clone()),
            _ => None,
        })
        .collect()
}

pub fn pipe_pair() -> (i32, i32) {
    let mut fds = [0i32; 2];
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    assert_eq!(rc, 0, "pipe() failed");
    (fds[0], fds[1])
}

pub fn make_readable(write_fd: i32) {
    let byte = [42u8];
    let n = unsafe { libc::write(write_fd, byte.as_ptr() as *const libc::c_void, 1) };
    assert_eq!(n, 1, "write() failed");
}

pub fn close_fd(fd: i32) {
    unsafe { libc::close(fd) };
}
