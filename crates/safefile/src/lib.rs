//! Safe file operations for config and state files.
//!
//! Reading and writing a file that other processes may also be touching
//! should not require hand-rolling locking and fsync discipline each time.
//! This crate wraps those operations behind a small surface:
//!
//! - **Advisory locking with a timeout**: every read takes a shared
//!   `flock(2)` lock, every write an exclusive one, bounded by a
//!   configurable timeout ([`flock_shared`], [`flock_exclusive`]).
//! - **Locked reads** of text ([`read`]) and JSON ([`read_json`]), with a
//!   configurable fallback for missing files and optional encoding
//!   sanitation ([`scrub`]).
//! - **Locked writes** in place ([`write`], [`append`]) or via atomic
//!   replace ([`atomic_write`]), with optional flush + fsync durability and
//!   ownership/permission reconciliation afterwards.
//! - **Metadata operations**: [`touch`] and [`change_access`].
//!
//! Locking is cooperative and per-file; this is not a distributed lock and
//! not a transactional multi-file store. Unix only (`flock`, `chown`,
//! permission masks).
//!
//! ```
//! use safefile::{read, write, FileOptions};
//!
//! let dir = tempfile::tempdir()?;
//! let path = dir.path().join("state.txt");
//! write(&path, "ready", &FileOptions::default())?;
//! assert_eq!(read(&path, &FileOptions::default())?, "ready\n");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod access;
pub mod error;
pub mod lock;
pub mod options;
pub mod read;
pub mod scrub;
pub mod write;

pub use access::change_access;
pub use error::Error;
pub use lock::{
    flock, flock_exclusive, flock_shared, FlockGuard, LockError, LockMode, DEFAULT_LOCK_TIMEOUT,
};
pub use options::{FileOptions, Identity, ScrubEncoding, DEFAULT_PERMISSION};
pub use read::{read, read_json};
pub use scrub::scrub;
pub use write::{append, atomic_write, atomic_write_json, touch, write, write_json};
