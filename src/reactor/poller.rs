//! poll(2)-based readiness multiplexing.

use libc::{POLLERR, POLLHUP, POLLIN, POLLNVAL, POLLOUT, nfds_t, poll, pollfd};

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// Handles reported ready by a single wait.
pub(crate) struct Ready {
    pub(crate) readable: Vec<RawFd>,
    pub(crate) writable: Vec<RawFd>,
}

/// Waits for readiness on the given handles, up to `timeout`.
///
/// `None` waits unbounded. A handle the kernel reports as invalid surfaces
/// as an `EBADF` error so the caller can probe and drop it.
pub(crate) fn wait(
    readers: &[RawFd],
    writers: &[RawFd],
    timeout: Option<Duration>,
) -> io::Result<Ready> {
    let mut entries: Vec<pollfd> = Vec::with_capacity(readers.len() + writers.len());
    for &fd in readers {
        entries.push(pollfd {
            fd,
            events: POLLIN,
            revents: 0,
        });
    }
    for &fd in writers {
        if let Some(entry) = entries.iter_mut().find(|entry| entry.fd == fd) {
            entry.events |= POLLOUT;
        } else {
            entries.push(pollfd {
                fd,
                events: POLLOUT,
                revents: 0,
            });
        }
    }

    let count = unsafe { poll(entries.as_mut_ptr(), entries.len() as nfds_t, timeout_ms(timeout)) };
    if count < 0 {
        return Err(io::Error::last_os_error());
    }

    let mut ready = Ready {
        readable: Vec::new(),
        writable: Vec::new(),
    };
    for entry in &entries {
        if entry.revents == 0 {
            continue;
        }
        if entry.revents & POLLNVAL != 0 {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }
        if entry.events & POLLIN != 0 && entry.revents & (POLLIN | POLLERR | POLLHUP) != 0 {
            ready.readable.push(entry.fd);
        }
        if entry.events & POLLOUT != 0 && entry.revents & (POLLOUT | POLLERR | POLLHUP) != 0 {
            ready.writable.push(entry.fd);
        }
    }
    Ok(ready)
}

/// Reports whether the kernel considers the handle invalid.
pub(crate) fn is_bad(fd: RawFd) -> bool {
    let mut probe = [pollfd {
        fd,
        events: 0,
        revents: 0,
    }];
    let count = unsafe { poll(probe.as_mut_ptr(), 1, 0) };
    if count < 0 {
        return true;
    }
    probe[0].revents & POLLNVAL != 0
}

pub(crate) fn set_nonblocking(fd: RawFd) {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };

    unsafe {
        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
    }
}

// poll() takes milliseconds; round up so a wait never wakes short of the
// deadline it was computed from.
fn timeout_ms(timeout: Option<Duration>) -> i32 {
    match timeout {
        Some(timeout) => {
            let millis = timeout
                .as_secs()
                .saturating_mul(1000)
                .saturating_add(u64::from(timeout.subsec_nanos().div_ceil(1_000_000)));
            millis.min(i32::MAX as u64) as i32
        }
        None => -1,
    }
}
