//! Shared-locked file reads.
//!
//! The internal primitive returns an enumerated outcome instead of using
//! errors for control flow: a file that cannot be opened or read yields
//! [`ReadOutcome::Fallback`], which the public entry points turn into either
//! the caller's fallback value or [`Error::Read`] depending on
//! `raise_on_missing`. A lock timeout is always an error; it is never
//! treated as a missing file.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::lock::{flock_shared, LockError};
use crate::options::FileOptions;
use crate::scrub::scrub;

/// Outcome of the locked read primitive.
pub(crate) enum ReadOutcome {
    /// The file was read in full under a shared lock.
    Content(Vec<u8>),
    /// The file could not be opened or read (missing, permission, I/O).
    Fallback(io::Error),
}

/// Open `path` read-only, take a shared lock, and read everything.
///
/// Lock failures are hard errors; open/read failures are the fallback
/// outcome for the caller to interpret.
fn read_outcome(path: &Path, options: &FileOptions) -> Result<ReadOutcome, Error> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(source) => return Ok(ReadOutcome::Fallback(source)),
    };
    let _guard = flock_shared(&file, options.timeout).map_err(|err| match err {
        LockError::TimedOut { .. } => Error::ReadLocked {
            path: path.to_path_buf(),
        },
        LockError::Io(source) => Error::read(path, source),
    })?;
    let mut buf = Vec::new();
    match (&file).read_to_end(&mut buf) {
        Ok(_) => Ok(ReadOutcome::Content(buf)),
        Err(source) => Ok(ReadOutcome::Fallback(source)),
    }
}

/// Decode raw content as text, scrubbing when requested.
fn decode(path: &Path, bytes: Vec<u8>, options: &FileOptions) -> Result<String, Error> {
    match options.scrub_encoding.replacement() {
        Some(replacement) => Ok(scrub(&bytes, replacement)),
        None => String::from_utf8(bytes).map_err(|source| {
            Error::read(path, io::Error::new(io::ErrorKind::InvalidData, source))
        }),
    }
}

/// Read the entire content of `path` under a shared lock.
///
/// A missing or unreadable file returns `value_on_missing` when
/// `raise_on_missing` is false. Content must be valid UTF-8 unless
/// `scrub_encoding` is set, in which case invalid sequences are replaced.
///
/// # Errors
///
/// - [`Error::ReadLocked`] when the shared lock times out, regardless of
///   `raise_on_missing`.
/// - [`Error::Read`] when the file cannot be opened or read and
///   `raise_on_missing` is true, or when the content is not valid UTF-8 and
///   no scrub was requested.
pub fn read(path: impl AsRef<Path>, options: &FileOptions) -> Result<String, Error> {
    let path = path.as_ref();
    match read_outcome(path, options)? {
        ReadOutcome::Content(bytes) => decode(path, bytes, options),
        ReadOutcome::Fallback(source) => {
            if options.raise_on_missing {
                Err(Error::read(path, source))
            } else {
                Ok(options.value_on_missing.clone())
            }
        },
    }
}

/// Read and decode `path` as JSON under a shared lock.
///
/// A missing or unreadable file yields `T::default()` when
/// `raise_on_missing` is false (the empty mapping, for map types).
///
/// # Errors
///
/// - [`Error::ReadLocked`] when the shared lock times out.
/// - [`Error::Read`] for a missing file with `raise_on_missing` true.
/// - [`Error::Parse`] when the content is not valid JSON; a decode failure
///   is never treated as a missing file.
pub fn read_json<T>(path: impl AsRef<Path>, options: &FileOptions) -> Result<T, Error>
where
    T: DeserializeOwned + Default,
{
    let path = path.as_ref();
    match read_outcome(path, options)? {
        ReadOutcome::Content(bytes) => {
            let text = decode(path, bytes, options)?;
            serde_json::from_str(&text).map_err(|source| Error::Parse {
                path: path.to_path_buf(),
                source,
            })
        },
        ReadOutcome::Fallback(source) => {
            if options.raise_on_missing {
                Err(Error::read(path, source))
            } else {
                Ok(T::default())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs::{self, OpenOptions};
    use std::time::Duration;

    use super::*;
    use crate::lock::flock_exclusive;

    #[test]
    fn reads_existing_content() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("f");
        fs::write(&path, b"content\n").expect("seed file");

        let content = read(&path, &FileOptions::default()).expect("read");
        assert_eq!(content, "content\n");
    }

    #[test]
    fn missing_file_raises_by_default() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nofile");

        let err = read(&path, &FileOptions::default()).expect_err("must fail");
        assert_eq!(err.to_string(), format!("Cannot read {}", path.display()));
    }

    #[test]
    fn missing_file_returns_fallback_when_requested() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nofile");

        let options = FileOptions::new()
            .raise_on_missing(false)
            .value_on_missing("X");
        let content = read(&path, &options).expect("fallback");
        assert_eq!(content, "X");
    }

    #[test]
    fn lock_timeout_is_never_missing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("f");
        fs::write(&path, b"content").expect("seed file");

        let holder = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .expect("open holder");
        let _guard = flock_exclusive(&holder, Duration::from_millis(50)).expect("hold lock");

        let options = FileOptions::new()
            .timeout(Duration::from_millis(50))
            .raise_on_missing(false)
            .value_on_missing("X");
        let err = read(&path, &options).expect_err("must time out");
        assert_eq!(
            err.to_string(),
            format!("Cannot read {} because it is locked", path.display())
        );
    }

    #[test]
    fn scrub_replaces_invalid_sequences() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("f");
        fs::write(&path, b"a\xffb").expect("seed file");

        let dropped = read(&path, &FileOptions::new().scrub_encoding()).expect("scrubbed");
        assert_eq!(dropped, "ab");

        let replaced =
            read(&path, &FileOptions::new().scrub_encoding_with("?")).expect("scrubbed");
        assert_eq!(replaced, "a?b");
    }

    #[test]
    fn invalid_utf8_without_scrub_is_a_read_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("f");
        fs::write(&path, b"a\xffb").expect("seed file");

        let err = read(&path, &FileOptions::default()).expect_err("must fail");
        assert!(matches!(err, Error::Read { .. }));
    }

    #[test]
    fn read_json_decodes_mapping() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("f.json");
        fs::write(&path, br#"{"key":"value"}"#).expect("seed file");

        let decoded: BTreeMap<String, String> =
            read_json(&path, &FileOptions::default()).expect("decode");
        assert_eq!(decoded.get("key").map(String::as_str), Some("value"));
    }

    #[test]
    fn read_json_missing_yields_default_when_requested() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nofile.json");

        let decoded: BTreeMap<String, String> =
            read_json(&path, &FileOptions::new().raise_on_missing(false)).expect("default");
        assert!(decoded.is_empty());
    }

    #[test]
    fn read_json_missing_raises_by_default() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nofile.json");

        let result: Result<BTreeMap<String, String>, Error> =
            read_json(&path, &FileOptions::default());
        let err = result.expect_err("must fail");
        assert_eq!(err.to_string(), format!("Cannot read {}", path.display()));
    }

    #[test]
    fn read_json_decode_failure_is_parse_not_missing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("f.json");
        fs::write(&path, b"I am not json").expect("seed file");

        let options = FileOptions::new().raise_on_missing(false);
        let result: Result<BTreeMap<String, String>, Error> = read_json(&path, &options);
        let err = result.expect_err("must fail");
        assert_eq!(err.to_string(), format!("Cannot parse {}", path.display()));
    }
}
