//! Directory access grants.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{error, info};

use crate::err::*;
use crate::identity::Identity;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessRights {
    ReadWriteCreate,
    FullControl,
}

impl Default for AccessRights {
    fn default() -> AccessRights {
        AccessRights::ReadWriteCreate
    }
}

impl fmt::Display for AccessRights {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            AccessRights::ReadWriteCreate => "read/write/create",
            AccessRights::FullControl => "full control",
        })
    }
}

impl FromStr for AccessRights {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<AccessRights, ProvisionError> {
        match s {
            "rwc" => Ok(AccessRights::ReadWriteCreate),
            "full" => Ok(AccessRights::FullControl),
            _ => Err(ProvisionError::Usage(
                format!("unknown access rights '{}' (expected rwc or full)", s))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryGrant {
    pub identity: Identity,
    pub path: PathBuf,
    pub rights: AccessRights,
}

/// Per-path access control lists.
pub trait AclStore {
    fn path_exists(&self, path: &Path) -> bool;

    /// Add or update the entry for `identity` on `path` so that it
    /// carries exactly `rights`.  Entries for other accounts are kept.
    fn set_entry(&mut self, identity: &Identity, path: &Path,
                 rights: AccessRights) -> Result<(), ProvisionError>;
}

pub struct DirectoryAccessGrantor<'a> {
    acls: &'a mut dyn AclStore,
}

impl<'a> DirectoryAccessGrantor<'a> {
    pub fn new(acls: &'a mut dyn AclStore) -> DirectoryAccessGrantor<'a> {
        DirectoryAccessGrantor { acls: acls }
    }

    pub fn grant(&mut self, identity: &Identity, path: &Path,
                 rights: AccessRights) -> Result<(), ProvisionError> {
        identity.require_exists()?;
        if !self.acls.path_exists(path) {
            return Err(ProvisionError::PathNotFound(path.to_path_buf()));
        }
        self.acls.set_entry(identity, path, rights)?;
        info!(account = identity.name(), path = %path.display(),
              rights = %rights, "granted directory access");
        Ok(())
    }

    /// Grant `rights` on each path in turn.  A failure on one path does
    /// not stop the others; the result is an error if any path failed.
    pub fn grant_all(&mut self, identity: &Identity, paths: &[PathBuf],
                     rights: AccessRights)
                     -> Result<Vec<DirectoryGrant>, ProvisionError> {
        identity.require_exists()?;
        let mut granted = Vec::new();
        let mut failed = 0;
        for path in paths {
            match self.grant(identity, path, rights) {
                Ok(()) => granted.push(DirectoryGrant {
                    identity: identity.clone(),
                    path: path.clone(),
                    rights: rights,
                }),
                Err(e) => {
                    error!("{}", e);
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            Err(ProvisionError::DirectoryGrantsFailed {
                failed: failed,
                total: paths.len(),
            })
        } else {
            Ok(granted)
        }
    }
}
