//! Call options and write-path option resolution.
//!
//! [`FileOptions`] enumerates every recognized option as a typed field with
//! a documented default; there is no dynamic options bag. Options arriving
//! from serialized configuration deserialize through an explicit boundary
//! that maps the legacy `mode`/`perm` spellings onto the one canonical
//! `permission` field and rejects unknown keys.
//!
//! [`WriteContext`] is the resolved form consumed by the write engines: the
//! target's pre-existing uid/gid/mode are snapshotted in a single metadata
//! read and used as fallbacks for whatever the caller did not specify.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Deserialize;

use crate::lock::DEFAULT_LOCK_TIMEOUT;

/// Global default permission for files created by the write engines.
pub const DEFAULT_PERMISSION: u32 = 0o644;

/// A user or group, by name or numeric id.
///
/// Names are resolved against the system user/group database at the point of
/// use ([`crate::change_access`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// A name to look up (e.g. `"daemon"`).
    Name(String),
    /// A raw numeric id.
    Id(u32),
}

impl From<u32> for Identity {
    fn from(id: u32) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for Identity {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Identity {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// Encoding-scrub behavior for the read engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScrubEncoding {
    /// No scrubbing; content must already be valid UTF-8.
    #[default]
    Off,
    /// Drop invalid sequences (replace with the empty string).
    Scrub,
    /// Replace invalid sequences with the given string.
    ScrubWith(String),
}

impl ScrubEncoding {
    /// The replacement string to apply, or `None` when scrubbing is off.
    #[must_use]
    pub fn replacement(&self) -> Option<&str> {
        match self {
            Self::Off => None,
            Self::Scrub => Some(""),
            Self::ScrubWith(replacement) => Some(replacement),
        }
    }
}

/// Options for a single read/write/touch call.
///
/// Constructed at call entry and discarded after; the struct is plain data
/// and carries no handles.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOptions {
    /// Bound on lock acquisition. Default 10s.
    pub timeout: Duration,
    /// Raise [`crate::Error::Read`] when the file is missing. Default true.
    pub raise_on_missing: bool,
    /// Value returned by `read` for a missing file when `raise_on_missing`
    /// is false. Default empty.
    pub value_on_missing: String,
    /// Encoding scrub applied to read content. Default off.
    pub scrub_encoding: ScrubEncoding,
    /// Flush in-process buffers and fsync to storage before returning from a
    /// write. Default false.
    pub flush: bool,
    /// Owner applied after a write; falls back to the pre-existing file's
    /// owner when unset.
    pub owner: Option<Identity>,
    /// Group applied after a write; same fallback as `owner`.
    pub group: Option<Identity>,
    /// Permission mask; the single canonical permission field.
    pub permission: Option<u32>,
    /// Modification time for `touch`.
    pub mtime: Option<SystemTime>,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_LOCK_TIMEOUT,
            raise_on_missing: true,
            value_on_missing: String::new(),
            scrub_encoding: ScrubEncoding::Off,
            flush: false,
            owner: None,
            group: None,
            permission: None,
            mtime: None,
        }
    }
}

impl FileOptions {
    /// Options with every default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lock-acquisition timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set whether a missing file raises or falls back.
    #[must_use]
    pub fn raise_on_missing(mut self, raise_on_missing: bool) -> Self {
        self.raise_on_missing = raise_on_missing;
        self
    }

    /// Set the fallback value for a missing file.
    #[must_use]
    pub fn value_on_missing(mut self, value: impl Into<String>) -> Self {
        self.value_on_missing = value.into();
        self
    }

    /// Drop invalid encoding sequences from read content.
    #[must_use]
    pub fn scrub_encoding(mut self) -> Self {
        self.scrub_encoding = ScrubEncoding::Scrub;
        self
    }

    /// Replace invalid encoding sequences in read content.
    #[must_use]
    pub fn scrub_encoding_with(mut self, replacement: impl Into<String>) -> Self {
        self.scrub_encoding = ScrubEncoding::ScrubWith(replacement.into());
        self
    }

    /// Request flush + durable sync on write.
    #[must_use]
    pub fn flush(mut self, flush: bool) -> Self {
        self.flush = flush;
        self
    }

    /// Set the owner applied after a write.
    #[must_use]
    pub fn owner(mut self, owner: impl Into<Identity>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Set the group applied after a write.
    #[must_use]
    pub fn group(mut self, group: impl Into<Identity>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set the permission mask.
    #[must_use]
    pub fn permission(mut self, permission: u32) -> Self {
        self.permission = Some(permission);
        self
    }

    /// Set the modification time for `touch`.
    #[must_use]
    pub fn mtime(mut self, mtime: SystemTime) -> Self {
        self.mtime = Some(mtime);
        self
    }
}

impl<'de> Deserialize<'de> for FileOptions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        RawFileOptions::deserialize(deserializer).map(RawFileOptions::into_options)
    }
}

/// Deserialization boundary for serialized option maps.
///
/// Migration window: the permission value may be spelled `permission`,
/// `mode`, or `perm`. The mapping below resolves them to the canonical field
/// with precedence `mode` > `perm` > `permission`, so callers still on the
/// legacy names keep their meaning. Unknown keys are rejected.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFileOptions {
    /// Lock timeout in seconds.
    timeout: Option<u64>,
    raise_on_missing: Option<bool>,
    value_on_missing: Option<String>,
    scrub_encoding: Option<RawScrub>,
    flush: Option<bool>,
    owner: Option<RawIdentity>,
    group: Option<RawIdentity>,
    permission: Option<u32>,
    mode: Option<u32>,
    perm: Option<u32>,
    /// Modification time as seconds since the Unix epoch.
    mtime: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawIdentity {
    Id(u32),
    Name(String),
}

impl From<RawIdentity> for Identity {
    fn from(raw: RawIdentity) -> Self {
        match raw {
            RawIdentity::Id(id) => Self::Id(id),
            RawIdentity::Name(name) => Self::Name(name),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScrub {
    Enabled(bool),
    Replacement(String),
}

impl From<RawScrub> for ScrubEncoding {
    fn from(raw: RawScrub) -> Self {
        match raw {
            RawScrub::Enabled(true) => Self::Scrub,
            RawScrub::Enabled(false) => Self::Off,
            RawScrub::Replacement(replacement) => Self::ScrubWith(replacement),
        }
    }
}

impl RawFileOptions {
    fn into_options(self) -> FileOptions {
        let defaults = FileOptions::default();
        FileOptions {
            timeout: self.timeout.map_or(defaults.timeout, Duration::from_secs),
            raise_on_missing: self.raise_on_missing.unwrap_or(defaults.raise_on_missing),
            value_on_missing: self.value_on_missing.unwrap_or_default(),
            scrub_encoding: self
                .scrub_encoding
                .map(ScrubEncoding::from)
                .unwrap_or_default(),
            flush: self.flush.unwrap_or(false),
            owner: self.owner.map(Identity::from),
            group: self.group.map(Identity::from),
            permission: self.mode.or(self.perm).or(self.permission),
            mtime: self
                .mtime
                .map(|secs| UNIX_EPOCH + Duration::from_secs(secs)),
        }
    }
}

/// Resolved owner/group/permission for one write-path call.
///
/// The resolver is pure apart from a single metadata read of the target: if
/// the file pre-exists, its uid/gid/mode are captured once, before any
/// mutation, and used as fallbacks.
#[derive(Debug)]
pub(crate) struct WriteContext {
    owner: Option<Identity>,
    group: Option<Identity>,
    permission: Option<u32>,
    existing_mode: Option<u32>,
    flush: bool,
}

impl WriteContext {
    pub(crate) fn resolve(path: &Path, options: &FileOptions) -> Self {
        let existing = fs::metadata(path).ok();
        Self {
            owner: options
                .owner
                .clone()
                .or_else(|| existing.as_ref().map(|meta| Identity::Id(meta.uid()))),
            group: options
                .group
                .clone()
                .or_else(|| existing.as_ref().map(|meta| Identity::Id(meta.gid()))),
            permission: options.permission,
            existing_mode: existing.as_ref().map(|meta| meta.mode() & 0o7777),
            flush: options.flush,
        }
    }

    pub(crate) fn owner(&self) -> Option<&Identity> {
        self.owner.as_ref()
    }

    pub(crate) fn group(&self) -> Option<&Identity> {
        self.group.as_ref()
    }

    pub(crate) fn flush(&self) -> bool {
        self.flush
    }

    /// Permission applied at file-creation time.
    ///
    /// Explicit option, else the global default. The OS subjects this value
    /// to the umask; reconciliation corrects it after close.
    pub(crate) fn creation_permission(&self) -> u32 {
        self.permission.unwrap_or(DEFAULT_PERMISSION)
    }

    /// Permission applied by post-close reconciliation on write paths.
    ///
    /// Explicit option, else the pre-existing file's mode, else the global
    /// default. The pre-existing fallback keeps an untouched `0o777` file at
    /// `0o777`; the global default corrects a freshly created file to
    /// exactly `0o644` regardless of umask.
    pub(crate) fn reconcile_permission(&self) -> u32 {
        self.permission
            .or(self.existing_mode)
            .unwrap_or(DEFAULT_PERMISSION)
    }

    /// Explicit permission only; `touch` leaves the mode alone otherwise.
    pub(crate) fn explicit_permission(&self) -> Option<u32> {
        self.permission
    }
}
