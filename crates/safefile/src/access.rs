//! Ownership and permission changes.
//!
//! One entry point, [`change_access`], applies whatever subset of
//! owner/group/permission the caller supplies. Any OS-level failure is
//! normalized to [`Error::Access`] for the path; the caller cannot
//! distinguish which of the three changes failed.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use nix::unistd::{self, Gid, Group, Uid, User};

use crate::error::Error;
use crate::options::Identity;

/// Apply owner, group, and permission changes to `path`.
///
/// The owner/group change is skipped when both are unset; the permission
/// change is skipped when unset. Identity names are resolved against the
/// system user/group database.
///
/// # Errors
///
/// Returns [`Error::Access`] on any failure: unknown name, vanished path,
/// insufficient privilege.
pub fn change_access(
    path: &Path,
    owner: Option<&Identity>,
    group: Option<&Identity>,
    permission: Option<u32>,
) -> Result<(), Error> {
    apply(path, owner, group, permission).map_err(|source| Error::Access {
        path: path.to_path_buf(),
        source,
    })
}

fn apply(
    path: &Path,
    owner: Option<&Identity>,
    group: Option<&Identity>,
    permission: Option<u32>,
) -> io::Result<()> {
    let uid = owner.map(resolve_uid).transpose()?;
    let gid = group.map(resolve_gid).transpose()?;
    if uid.is_some() || gid.is_some() {
        unistd::chown(path, uid, gid).map_err(io::Error::from)?;
    }
    if let Some(permission) = permission {
        fs::set_permissions(path, fs::Permissions::from_mode(permission))?;
    }
    Ok(())
}

fn resolve_uid(identity: &Identity) -> io::Result<Uid> {
    match identity {
        Identity::Id(id) => Ok(Uid::from_raw(*id)),
        Identity::Name(name) => {
            let user = User::from_name(name)
                .map_err(io::Error::from)?
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::NotFound, format!("unknown user {name}"))
                })?;
            Ok(user.uid)
        },
    }
}

fn resolve_gid(identity: &Identity) -> io::Result<Gid> {
    match identity {
        Identity::Id(id) => Ok(Gid::from_raw(*id)),
        Identity::Name(name) => {
            let group = Group::from_name(name)
                .map_err(io::Error::from)?
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::NotFound, format!("unknown group {name}"))
                })?;
            Ok(group.gid)
        },
    }
}
