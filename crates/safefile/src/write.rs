//! Exclusive-locked file writes: in-place, append, atomic replace, touch.
//!
//! All write paths share one shape: resolve options against the pre-existing
//! file, ensure parent directories, open, take the exclusive lock, transfer
//! data, optionally flush + fsync, close, then reconcile ownership and
//! permissions. Reconciliation runs after close because the open-time
//! permission is subject to the umask.
//!
//! `write` truncates in place and therefore has a window where a concurrent
//! reader can observe an empty or partial file; `atomic_write` closes that
//! window by writing a temporary file in the target's directory and renaming
//! it over the target in a single filesystem operation.
//!
//! Directory creation and access reconciliation happen outside the per-file
//! lock; concurrent writers racing on those phases are best-effort.

use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use filetime::FileTime;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::access::change_access;
use crate::error::Error;
use crate::lock::{flock_exclusive, LockError};
use crate::options::{FileOptions, WriteContext};

/// Write the textual representation of `data` to `path`, truncating any
/// prior content.
///
/// The file is created if absent (parent directories included). Data is
/// written line-wise: a trailing newline is appended when `data` does not
/// already end with one. With `flush`, in-process buffers are flushed and
/// the file is fsynced before returning.
///
/// After the handle closes, ownership and permission are reconciled: an
/// explicit option wins, else a pre-existing file keeps its prior
/// owner/group/mode, else the freshly created file is set to exactly
/// `0o644`.
///
/// # Errors
///
/// - [`Error::WriteLocked`] when the exclusive lock times out.
/// - [`Error::Write`] on any other OS-level failure.
/// - [`Error::Access`] when reconciliation fails.
pub fn write(
    path: impl AsRef<Path>,
    data: impl Display,
    options: &FileOptions,
) -> Result<(), Error> {
    let path = path.as_ref();
    let mut open_options = OpenOptions::new();
    open_options.write(true).create(true).truncate(true);
    write_with(path, &data.to_string(), options, open_options)
}

/// Append the textual representation of `data` to `path`.
///
/// Identical to [`write`] except the file is opened in append-create mode
/// instead of truncate-create mode.
///
/// # Errors
///
/// See [`write`].
pub fn append(
    path: impl AsRef<Path>,
    data: impl Display,
    options: &FileOptions,
) -> Result<(), Error> {
    let path = path.as_ref();
    let mut open_options = OpenOptions::new();
    open_options.append(true).create(true);
    write_with(path, &data.to_string(), options, open_options)
}

/// Serialize `data` as pretty-printed JSON and [`write`] it.
///
/// # Errors
///
/// See [`write`]; a serialization failure maps to [`Error::Write`].
pub fn write_json<T>(path: impl AsRef<Path>, data: &T, options: &FileOptions) -> Result<(), Error>
where
    T: Serialize + ?Sized,
{
    let path = path.as_ref();
    write(path, to_pretty_json(path, data)?, options)
}

/// Replace the content of `path` atomically.
///
/// Data is written to a temporary file in the target's directory (same
/// filesystem, so the final rename is atomic), optionally flushed + fsynced,
/// then renamed over the target under an exclusive lock on the target path.
/// A concurrent reader observes either the fully-old or fully-new content,
/// never an intermediate state. Ownership and permission are reconciled as
/// in [`write`].
///
/// # Errors
///
/// See [`write`].
pub fn atomic_write(
    path: impl AsRef<Path>,
    data: impl Display,
    options: &FileOptions,
) -> Result<(), Error> {
    let path = path.as_ref();
    let data = data.to_string();
    let context = WriteContext::resolve(path, options);
    ensure_parent_dir(path).map_err(|source| Error::write(path, source))?;

    let temp = NamedTempFile::new_in(parent_dir(path))
        .map_err(|source| Error::write(path, source))?;
    write_line(temp.as_file(), &data).map_err(|source| Error::write(path, source))?;
    if context.flush() {
        sync_handle(temp.as_file()).map_err(|source| Error::write(path, source))?;
    }

    // The rename happens under the target's exclusive lock; the locked
    // handle keeps pointing at the replaced inode afterwards, which is fine
    // because it is dropped without further use.
    let target = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .mode(context.creation_permission())
        .open(path)
        .map_err(|source| Error::write(path, source))?;
    let guard = flock_exclusive(&target, options.timeout).map_err(|err| lock_error(path, err))?;
    temp.persist(path)
        .map_err(|err| Error::write(path, err.error))?;
    drop(guard);
    drop(target);

    reconcile(path, &context)
}

/// Serialize `data` as pretty-printed JSON and [`atomic_write`] it.
///
/// The combination for state files that must never be observed truncated.
///
/// # Errors
///
/// See [`atomic_write`]; a serialization failure maps to [`Error::Write`].
pub fn atomic_write_json<T>(
    path: impl AsRef<Path>,
    data: &T,
    options: &FileOptions,
) -> Result<(), Error>
where
    T: Serialize + ?Sized,
{
    let path = path.as_ref();
    atomic_write(path, to_pretty_json(path, data)?, options)
}

/// Create `path` if absent and update its metadata.
///
/// No content is written. Ownership follows the same resolution as the
/// write paths; the permission is changed only when explicitly supplied.
/// The access and modification times are set to `mtime` when given, else to
/// the current time.
///
/// # Errors
///
/// - [`Error::Write`] when the file cannot be created or its times cannot
///   be set.
/// - [`Error::Access`] when the ownership/permission change fails.
pub fn touch(path: impl AsRef<Path>, options: &FileOptions) -> Result<(), Error> {
    let path = path.as_ref();
    let context = WriteContext::resolve(path, options);
    ensure_parent_dir(path).map_err(|source| Error::write(path, source))?;

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .mode(context.creation_permission())
        .open(path)
        .map_err(|source| Error::write(path, source))?;
    drop(file);

    change_access(
        path,
        context.owner(),
        context.group(),
        context.explicit_permission(),
    )?;

    let mtime = options
        .mtime
        .map_or_else(FileTime::now, FileTime::from_system_time);
    filetime::set_file_times(path, mtime, mtime).map_err(|source| Error::write(path, source))
}

/// Shared body of `write` and `append`: open, lock, transfer, sync, close,
/// reconcile.
fn write_with(
    path: &Path,
    data: &str,
    options: &FileOptions,
    mut open_options: OpenOptions,
) -> Result<(), Error> {
    let context = WriteContext::resolve(path, options);
    ensure_parent_dir(path).map_err(|source| Error::write(path, source))?;

    let file = open_options
        .mode(context.creation_permission())
        .open(path)
        .map_err(|source| Error::write(path, source))?;
    {
        let _guard =
            flock_exclusive(&file, options.timeout).map_err(|err| lock_error(path, err))?;
        write_line(&file, data).map_err(|source| Error::write(path, source))?;
        if context.flush() {
            sync_handle(&file).map_err(|source| Error::write(path, source))?;
        }
    }
    drop(file);

    reconcile(path, &context)
}

/// Write `data` followed by a newline when it does not already end with one.
fn write_line(mut handle: &File, data: &str) -> io::Result<()> {
    handle.write_all(data.as_bytes())?;
    if !data.ends_with('\n') {
        handle.write_all(b"\n")?;
    }
    Ok(())
}

/// Flush in-process buffers, then force the OS cache to stable storage.
fn sync_handle(mut handle: &File) -> io::Result<()> {
    handle.flush()?;
    handle.sync_all()
}

/// Post-close ownership/permission reconciliation for the write paths.
fn reconcile(path: &Path, context: &WriteContext) -> Result<(), Error> {
    change_access(
        path,
        context.owner(),
        context.group(),
        Some(context.reconcile_permission()),
    )
}

fn lock_error(path: &Path, err: LockError) -> Error {
    match err {
        LockError::TimedOut { .. } => Error::WriteLocked {
            path: path.to_path_buf(),
        },
        LockError::Io(source) => Error::write(path, source),
    }
}

fn to_pretty_json<T>(path: &Path, data: &T) -> Result<String, Error>
where
    T: Serialize + ?Sized,
{
    serde_json::to_string_pretty(data).map_err(|source| {
        Error::write(path, io::Error::new(io::ErrorKind::InvalidData, source))
    })
}

/// Create the target's parent directories (idempotent).
fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Directory that must hold the temporary file for a same-filesystem rename.
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
