//! Cross-thread handoff into the reactor.
//!
//! The reactor thread never blocks on anything but its multiplex wait, and
//! no other thread ever touches its tables. Work finished elsewhere (the
//! blocking-call thread pool, most commonly) re-enters the single-threaded
//! model through a [`Notifier`]: jobs go onto a mutex-guarded queue — the
//! sole synchronization boundary — and a byte written to an internal socket
//! pair wakes the blocked wait so the jobs run on the reactor thread during
//! its next step.

use crate::failure::Failure;
use crate::reactor::core::Reactor;

use std::collections::VecDeque;
use std::os::fd::RawFd;
use std::sync::{Arc, Mutex};

pub(crate) type Job = Box<dyn FnOnce(&mut Reactor) -> Result<(), Failure> + Send>;

pub(crate) struct Shared {
    jobs: Mutex<VecDeque<Job>>,
    write_fd: RawFd,
}

impl Shared {
    pub(crate) fn new(write_fd: RawFd) -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
            write_fd,
        }
    }

    pub(crate) fn take_jobs(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().drain(..).collect()
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.write_fd);
        }
    }
}

/// Posts work onto the reactor thread from other threads.
///
/// Cloneable and `Send`; obtained from [`Reactor::notifier`]. Each posted
/// job runs on the reactor thread on its next step, with full access to the
/// reactor's registration tables.
#[derive(Clone)]
pub struct Notifier {
    shared: Arc<Shared>,
}

impl Notifier {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Enqueues a job and wakes the reactor's multiplex wait.
    pub fn post(&self, job: impl FnOnce(&mut Reactor) -> Result<(), Failure> + Send + 'static) {
        self.shared.jobs.lock().unwrap().push_back(Box::new(job));

        // One byte is enough; a full buffer already means a wakeup is
        // pending. MSG_NOSIGNAL keeps a post after shutdown from raising
        // SIGPIPE — the job is simply never picked up.
        let byte = [1u8];
        unsafe {
            libc::send(
                self.shared.write_fd,
                byte.as_ptr() as *const libc::c_void,
                1,
                libc::MSG_NOSIGNAL,
            );
        }
    }
}
