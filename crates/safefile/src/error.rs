//! Unified error taxonomy for all file operations.
//!
//! Every failure surfaces as one [`Error`] variant with a message naming the
//! path and, where applicable, the cause. There is no partial-success
//! signaling: a call either completes or returns exactly one of these.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the locked-file engines.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The file could not be opened or read (missing, permission, I/O).
    ///
    /// Only raised when `raise_on_missing` is in effect; otherwise the read
    /// engines return the caller's fallback value instead.
    #[error("Cannot read {}", path.display())]
    Read {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The shared lock could not be acquired within the timeout.
    ///
    /// A lock timeout is never treated as a missing file, regardless of
    /// `raise_on_missing`.
    #[error("Cannot read {} because it is locked", path.display())]
    ReadLocked {
        /// Path whose lock timed out.
        path: PathBuf,
    },

    /// The file was read but its content is not valid JSON.
    #[error("Cannot parse {}", path.display())]
    Parse {
        /// Path whose content failed to decode.
        path: PathBuf,
        /// Underlying decode error.
        source: serde_json::Error,
    },

    /// The exclusive lock could not be acquired within the timeout.
    #[error("Unable to write {} because it is locked", path.display())]
    WriteLocked {
        /// Path whose lock timed out.
        path: PathBuf,
    },

    /// Any other OS-level failure during open/write/rename.
    #[error("Unable to write {} with {source}", path.display())]
    Write {
        /// Path that could not be written.
        path: PathBuf,
        /// Underlying I/O error, embedded in the message.
        source: io::Error,
    },

    /// Owner, group, or permission change failed.
    ///
    /// The caller cannot distinguish which of the three failed.
    #[error("Unable to change access on {}", path.display())]
    Access {
        /// Path whose metadata could not be changed.
        path: PathBuf,
        /// Underlying OS error.
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn read(path: &std::path::Path, source: io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn write(path: &std::path::Path, source: io::Error) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            source,
        }
    }
}
