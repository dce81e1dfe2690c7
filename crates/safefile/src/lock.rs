//! Advisory file locking with a timeout bound.
//!
//! Wraps `flock(2)` in non-blocking attempts polled with jitter until a
//! deadline. Enforcement is cooperative: only processes that also take the
//! lock are excluded. Locks are scoped to the open file description, so two
//! handles on the same file contend even within one process.
//!
//! Acquisition returns a [`FlockGuard`] that releases the lock when dropped,
//! on every exit path.

use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Default bound on lock acquisition.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval between non-blocking lock attempts.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Maximum jitter added to the poll interval (milliseconds).
const LOCK_POLL_JITTER_MS: u64 = 10;

/// Requested lock mode.
///
/// Shared locks permit concurrent readers; an exclusive lock excludes every
/// other holder, shared or exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// `LOCK_SH`: concurrent with other shared holders.
    Shared,
    /// `LOCK_EX`: excludes all other holders.
    Exclusive,
}

/// Errors from lock acquisition.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LockError {
    /// The lock was not obtained before the timeout elapsed.
    #[error("lock acquisition timed out after {elapsed_secs}s")]
    TimedOut {
        /// How long we waited.
        elapsed_secs: u64,
    },

    /// Unexpected OS error while attempting the lock.
    #[error("lock acquisition failed: {0}")]
    Io(#[from] io::Error),
}

/// RAII guard for an acquired advisory lock.
///
/// The lock is released when the guard drops. A failed release is logged and
/// swallowed; closing the file handle releases the lock regardless.
#[derive(Debug)]
pub struct FlockGuard<'a> {
    file: &'a File,
}

impl Drop for FlockGuard<'_> {
    fn drop(&mut self) {
        let fd = self.file.as_raw_fd();
        // SAFETY: flock is a standard POSIX call. fd is a valid descriptor
        // owned by the borrowed `File`. LOCK_UN releases our lock only.
        #[allow(unsafe_code)]
        let result = unsafe { libc::flock(fd, libc::LOCK_UN) };
        if result != 0 {
            let err = io::Error::last_os_error();
            tracing::warn!(err = %err, "failed to release advisory lock");
        }
    }
}

/// Try to place an advisory lock on a file (non-blocking).
///
/// Returns `Ok(true)` if the lock was acquired, `Ok(false)` if another
/// holder excludes us.
fn try_flock(file: &File, mode: LockMode) -> io::Result<bool> {
    let operation = match mode {
        LockMode::Shared => libc::LOCK_SH,
        LockMode::Exclusive => libc::LOCK_EX,
    };
    let fd = file.as_raw_fd();
    // SAFETY: flock is a standard POSIX call. fd is a valid descriptor owned
    // by `file`. LOCK_NB makes the attempt non-blocking.
    #[allow(unsafe_code)]
    let result = unsafe { libc::flock(fd, operation | libc::LOCK_NB) };
    if result == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Ok(false);
    }
    Err(err)
}

/// Acquire an advisory lock, polling with jitter until success or timeout.
///
/// The attempt is bounded by `timeout`; on expiry the call fails with
/// [`LockError::TimedOut`] and is not retried.
///
/// # Errors
///
/// Returns [`LockError::TimedOut`] when the deadline elapses, or
/// [`LockError::Io`] on any other OS error.
pub fn flock(file: &File, mode: LockMode, timeout: Duration) -> Result<FlockGuard<'_>, LockError> {
    let start = Instant::now();
    loop {
        if try_flock(file, mode)? {
            return Ok(FlockGuard { file });
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(LockError::TimedOut {
                elapsed_secs: elapsed.as_secs(),
            });
        }
        tracing::debug!(mode = ?mode, "waiting for advisory lock");
        let jitter_ms = rand::random::<u64>() % (LOCK_POLL_JITTER_MS + 1);
        std::thread::sleep(LOCK_POLL_INTERVAL + Duration::from_millis(jitter_ms));
    }
}

/// Acquire a shared lock bounded by `timeout`.
///
/// # Errors
///
/// See [`flock`].
pub fn flock_shared(file: &File, timeout: Duration) -> Result<FlockGuard<'_>, LockError> {
    flock(file, LockMode::Shared, timeout)
}

/// Acquire an exclusive lock bounded by `timeout`.
///
/// # Errors
///
/// See [`flock`].
pub fn flock_exclusive(file: &File, timeout: Duration) -> Result<FlockGuard<'_>, LockError> {
    flock(file, LockMode::Exclusive, timeout)
}
