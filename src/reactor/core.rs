//! The single-threaded event loop.
//!
//! The reactor multiplexes readable/writable handles and one-shot timers,
//! invoking registered callbacks when they become ready. Scheduling is
//! run-to-completion: a callback runs on the reactor's own thread and may
//! freely mutate the registration tables while it does. Additions take
//! effect with the next step; removals take effect immediately, even for a
//! handle already selected as ready in the current step.
//!
//! Fairness follows a priority-decay rule: a rotating cursor advances once
//! per step, and a registration is serviced only when its priority is at or
//! below the cursor. Priority 0 handles are serviced every step; priority
//! `p` handles on `(MAXPRIO - p)` of every `MAXPRIO` steps.
//!
//! An ordinary failure escaping a callback is logged and the offending
//! registration dropped; the loop continues. Invariant violations are never
//! isolated — they escape `step()` so test assertions stay fatal.

use crate::failure::Failure;
use crate::reactor::notify::{Notifier, Shared};
use crate::reactor::poller;
use crate::reactor::timer::{TimerToken, Timers};

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Exclusive upper bound for registration priorities.
pub const MAXPRIO: usize = 10;

/// Priority used when none is given.
pub const DEFAULTPRIO: usize = 0;

type HandlerCallback = Rc<RefCell<dyn FnMut(&mut Reactor) -> Result<(), Failure>>>;

/// Errors surfaced by the reactor's registration and stepping API.
#[derive(Debug, Error)]
pub enum ReactorError {
    #[error("invalid priority: {0}")]
    InvalidPriority(usize),
    #[error("handle {0} is suspended")]
    Suspended(RawFd),
    #[error("handle {0} is not suspended")]
    NotSuspended(RawFd),
    #[error("no handle is currently being serviced")]
    NoCurrentHandle,
    #[error("invariant violation: {0}")]
    Invariant(#[source] Failure),
    #[error(transparent)]
    Io(#[from] io::Error),
}

struct Registration {
    callback: HandlerCallback,
    prio: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Read,
    Write,
}

struct NotifyHandle {
    read_fd: RawFd,
    shared: Arc<Shared>,
}

/// The readiness-multiplexing event loop.
pub struct Reactor {
    readers: HashMap<RawFd, Registration>,
    writers: HashMap<RawFd, Registration>,
    suspended: HashMap<RawFd, Registration>,
    timers: Timers,
    prio: usize,
    default_prio: usize,
    current: Option<RawFd>,
    notify: Option<NotifyHandle>,
}

impl Reactor {
    /// Creates a reactor with no registrations.
    pub fn new() -> Self {
        Self::with_default_priority(DEFAULTPRIO)
    }

    pub(crate) fn with_default_priority(default_prio: usize) -> Self {
        Self {
            readers: HashMap::new(),
            writers: HashMap::new(),
            suspended: HashMap::new(),
            timers: Timers::new(),
            prio: 0,
            default_prio,
            current: None,
            notify: None,
        }
    }

    /// Registers interest in `fd` becoming readable, at the default
    /// priority. Effective starting with the next step.
    pub fn add_reader(
        &mut self,
        fd: RawFd,
        callback: impl FnMut(&mut Reactor) -> Result<(), Failure> + 'static,
    ) -> Result<(), ReactorError> {
        let prio = self.default_prio;
        self.add_reader_with_prio(fd, callback, prio)
    }

    /// Registers interest in `fd` becoming readable at an explicit
    /// priority in `[0, MAXPRIO)`.
    pub fn add_reader_with_prio(
        &mut self,
        fd: RawFd,
        callback: impl FnMut(&mut Reactor) -> Result<(), Failure> + 'static,
        prio: usize,
    ) -> Result<(), ReactorError> {
        self.check_registration(fd, prio)?;
        self.readers.insert(
            fd,
            Registration {
                callback: Rc::new(RefCell::new(callback)),
                prio,
            },
        );
        Ok(())
    }

    /// Registers interest in `fd` becoming writable, at the default
    /// priority. Effective starting with the next step.
    pub fn add_writer(
        &mut self,
        fd: RawFd,
        callback: impl FnMut(&mut Reactor) -> Result<(), Failure> + 'static,
    ) -> Result<(), ReactorError> {
        let prio = self.default_prio;
        self.add_writer_with_prio(fd, callback, prio)
    }

    /// Registers interest in `fd` becoming writable at an explicit
    /// priority in `[0, MAXPRIO)`.
    pub fn add_writer_with_prio(
        &mut self,
        fd: RawFd,
        callback: impl FnMut(&mut Reactor) -> Result<(), Failure> + 'static,
        prio: usize,
    ) -> Result<(), ReactorError> {
        self.check_registration(fd, prio)?;
        self.writers.insert(
            fd,
            Registration {
                callback: Rc::new(RefCell::new(callback)),
                prio,
            },
        );
        Ok(())
    }

    /// Deregisters the reader on `fd`. Effective immediately, even for a
    /// handle already selected as ready in the current step.
    pub fn remove_reader(&mut self, fd: RawFd) {
        self.readers.remove(&fd);
    }

    /// Deregisters the writer on `fd`. Effective immediately.
    pub fn remove_writer(&mut self, fd: RawFd) {
        self.writers.remove(&fd);
    }

    /// Schedules `callback` to run once after `timeout`.
    pub fn add_timer(
        &mut self,
        timeout: Duration,
        callback: impl FnOnce(&mut Reactor) -> Result<(), Failure> + 'static,
    ) -> TimerToken {
        self.timers.add(Instant::now() + timeout, Box::new(callback))
    }

    /// Cancels a timer. A token whose timer already fired is ignored.
    pub fn remove_timer(&mut self, token: TimerToken) {
        self.timers.remove(token);
    }

    /// Parks the registration of the handle currently being serviced.
    ///
    /// Only valid from within a callback. The handle stops being serviced
    /// until `resume_reader` or `resume_writer` moves it back.
    pub fn suspend(&mut self) -> Result<RawFd, ReactorError> {
        let Some(fd) = self.current else {
            return Err(ReactorError::NoCurrentHandle);
        };
        let registration = self.readers.remove(&fd).or(self.writers.remove(&fd));
        if let Some(registration) = registration {
            self.suspended.insert(fd, registration);
        }
        Ok(fd)
    }

    /// Moves a suspended handle back into the readers table.
    pub fn resume_reader(&mut self, fd: RawFd) -> Result<(), ReactorError> {
        match self.suspended.remove(&fd) {
            Some(registration) => {
                self.readers.insert(fd, registration);
                Ok(())
            }
            None => Err(ReactorError::NotSuspended(fd)),
        }
    }

    /// Moves a suspended handle back into the writers table.
    pub fn resume_writer(&mut self, fd: RawFd) -> Result<(), ReactorError> {
        match self.suspended.remove(&fd) {
            Some(registration) => {
                self.writers.insert(fd, registration);
                Ok(())
            }
            None => Err(ReactorError::NotSuspended(fd)),
        }
    }

    /// Silently drops `fd` from every registration table.
    pub fn cleanup(&mut self, fd: RawFd) {
        self.readers.remove(&fd);
        self.writers.remove(&fd);
        self.suspended.remove(&fd);
    }

    /// Number of reader and writer registrations, not counting the
    /// internal notifier handle.
    pub fn open_handles(&self) -> usize {
        self.external_readers() + self.writers.len()
    }

    /// Returns a handle for posting jobs from other threads.
    ///
    /// The first call sets up an internal socket pair and registers its
    /// read end; later calls reuse it.
    pub fn notifier(&mut self) -> io::Result<Notifier> {
        if let Some(notify) = &self.notify {
            return Ok(Notifier::new(notify.shared.clone()));
        }

        let mut fds = [0 as RawFd; 2];
        let rc =
            unsafe { libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, fds.as_mut_ptr()) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        let (read_fd, write_fd) = (fds[0], fds[1]);
        poller::set_nonblocking(read_fd);
        poller::set_nonblocking(write_fd);

        let shared = Arc::new(Shared::new(write_fd));
        self.notify = Some(NotifyHandle {
            read_fd,
            shared: shared.clone(),
        });

        let drain = {
            let shared = shared.clone();
            move |reactor: &mut Reactor| -> Result<(), Failure> {
                let mut buffer = [0u8; 64];
                loop {
                    let n = unsafe {
                        libc::read(
                            read_fd,
                            buffer.as_mut_ptr() as *mut libc::c_void,
                            buffer.len(),
                        )
                    };
                    if n < buffer.len() as isize {
                        break;
                    }
                }
                for job in shared.take_jobs() {
                    if let Err(failure) = job(reactor) {
                        if failure.is_invariant() {
                            return Err(failure);
                        }
                        tracing::error!(error = %failure, "posted job failed; discarded");
                    }
                }
                Ok(())
            }
        };
        // registered like any reader, but invisible to open_handles() and
        // to run()'s exhaustion check
        if self.add_reader(read_fd, drain).is_err() {
            return Err(io::Error::from(io::ErrorKind::InvalidInput));
        }

        Ok(Notifier::new(shared))
    }

    /// Runs one iteration of the loop: advance the priority cursor, wait
    /// for readiness or the nearest timer deadline, fire expired timers,
    /// then service ready handles.
    pub fn step(&mut self) -> Result<(), ReactorError> {
        self.prio = (self.prio + 1) % MAXPRIO;

        let timeout = self
            .timers
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()));
        let readers: Vec<RawFd> = self.readers.keys().copied().collect();
        let writers: Vec<RawFd> = self.writers.keys().copied().collect();

        let ready = match poller::wait(&readers, &writers, timeout) {
            Ok(ready) => ready,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(error) if error.raw_os_error() == Some(libc::EBADF) => {
                tracing::error!(%error, "wait failed on an invalid handle");
                self.drop_first_bad_handle();
                return Ok(());
            }
            Err(error) => return Err(ReactorError::Io(error)),
        };

        self.fire_timers()?;
        self.service(&ready.readable, Mode::Read)?;
        self.service(&ready.writable, Mode::Write)?;
        Ok(())
    }

    /// Repeats `step()` until every registration is exhausted, then shuts
    /// down. An error escaping a step still runs shutdown first.
    pub fn run(&mut self) -> Result<(), ReactorError> {
        let result = loop {
            if !self.has_work() {
                break Ok(());
            }
            if let Err(error) = self.step() {
                break Err(error);
            }
        };
        self.shutdown();
        result
    }

    /// Closes every registered handle, including suspended ones, and
    /// clears all tables.
    pub fn shutdown(&mut self) {
        let mut handles: Vec<RawFd> = self
            .readers
            .keys()
            .chain(self.writers.keys())
            .chain(self.suspended.keys())
            .copied()
            .collect();
        handles.sort_unstable();
        handles.dedup();
        for fd in handles {
            tracing::info!(fd, "reactor shutdown: closing handle");
            unsafe {
                libc::close(fd);
            }
        }
        self.readers.clear();
        self.writers.clear();
        self.suspended.clear();
        self.timers = Timers::new();
        self.notify = None;
    }

    fn check_registration(&self, fd: RawFd, prio: usize) -> Result<(), ReactorError> {
        if prio >= MAXPRIO {
            return Err(ReactorError::InvalidPriority(prio));
        }
        if self.suspended.contains_key(&fd) {
            return Err(ReactorError::Suspended(fd));
        }
        Ok(())
    }

    fn external_readers(&self) -> usize {
        let internal = self.notify.as_ref().map(|notify| notify.read_fd);
        self.readers
            .keys()
            .filter(|fd| Some(**fd) != internal)
            .count()
    }

    fn has_work(&self) -> bool {
        self.external_readers() > 0 || !self.writers.is_empty() || !self.timers.is_empty()
    }

    fn fire_timers(&mut self) -> Result<(), ReactorError> {
        loop {
            let Some(entry) = self.timers.pop_expired(Instant::now()) else {
                return Ok(());
            };
            // the entry is already removed, so the callback may re-register
            if let Err(failure) = (entry.callback)(self) {
                if failure.is_invariant() {
                    return Err(ReactorError::Invariant(failure));
                }
                tracing::error!(error = %failure, "timer callback failed; discarded");
            }
        }
    }

    fn service(&mut self, ready: &[RawFd], mode: Mode) -> Result<(), ReactorError> {
        for &fd in ready {
            let table = match mode {
                Mode::Read => &self.readers,
                Mode::Write => &self.writers,
            };
            // removed earlier in this step
            let Some(registration) = table.get(&fd) else {
                continue;
            };
            if registration.prio > self.prio {
                continue;
            }

            let callback = Rc::clone(&registration.callback);
            self.current = Some(fd);
            let result = {
                let mut callback = callback.borrow_mut();
                (&mut *callback)(self)
            };
            self.current = None;

            if let Err(failure) = result {
                if failure.is_invariant() {
                    return Err(ReactorError::Invariant(failure));
                }
                tracing::error!(fd, error = %failure, "handler failed; removing registration");
                let table = match mode {
                    Mode::Read => &mut self.readers,
                    Mode::Write => &mut self.writers,
                };
                table.remove(&fd);
            }
        }
        Ok(())
    }

    fn drop_first_bad_handle(&mut self) {
        let readers: Vec<RawFd> = self.readers.keys().copied().collect();
        for fd in readers {
            if poller::is_bad(fd) {
                tracing::error!(fd, "dropping invalid reader handle");
                self.readers.remove(&fd);
                return;
            }
        }
        let writers: Vec<RawFd> = self.writers.keys().copied().collect();
        for fd in writers {
            if poller::is_bad(fd) {
                tracing::error!(fd, "dropping invalid writer handle");
                self.writers.remove(&fd);
                return;
            }
        }
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}
