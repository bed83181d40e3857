//! Creation of the per-group cgroup (v1) hierarchy that the sandbox
//! places its processes into.
//!
//! For isolation group `G` the finished layout is
//!
//! ```text
//! <root>/blkio/G/
//! <root>/cpuacct/G/
//! <root>/memory/G/
//! <root>/pids/G/
//! <root>/freezer/G/
//! ```
//!
//! every one of them (and the control files the kernel puts inside)
//! owned by the account that will run the sandbox.  The cgroup
//! filesystem does not survive a reboot, so this has to be redone
//! after every restart.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::err::*;

/// Where the v1 hierarchies are normally mounted.
pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// Isolation group used by the sandbox.
pub const DEFAULT_GROUP: &str = "sp";

pub const MAX_GROUP_NAME_LEN: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Subsystem {
    Blkio,
    Cpuacct,
    Memory,
    Pids,
    Freezer,
}

impl Subsystem {
    /// Every subsystem a group needs, in provisioning order.
    pub const ALL: [Subsystem; 5] = [
        Subsystem::Blkio,
        Subsystem::Cpuacct,
        Subsystem::Memory,
        Subsystem::Pids,
        Subsystem::Freezer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Subsystem::Blkio => "blkio",
            Subsystem::Cpuacct => "cpuacct",
            Subsystem::Memory => "memory",
            Subsystem::Pids => "pids",
            Subsystem::Freezer => "freezer",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CgroupSpec {
    pub group: String,
    pub subsystem: Subsystem,
}

impl CgroupSpec {
    /// One spec per subsystem, in provisioning order.
    pub fn for_group(group: &str) -> Vec<CgroupSpec> {
        Subsystem::ALL.iter()
            .map(|&s| CgroupSpec { group: String::from(group), subsystem: s })
            .collect()
    }

    pub fn path(&self, root: &Path) -> PathBuf {
        root.join(self.subsystem.name()).join(&self.group)
    }
}

/// Result of provisioning one subsystem directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CgroupDir {
    pub subsystem: Subsystem,
    pub path: PathBuf,
    pub created: bool,
}

pub fn validate_group_name(name: &str) -> Result<(), ProvisionError> {
    let reject = |reason| Err(ProvisionError::InvalidGroupName {
        name: String::from(name),
        reason: reason,
    });
    if name.is_empty() {
        return reject("empty");
    }
    if name.len() > MAX_GROUP_NAME_LEN {
        return reject("too long");
    }
    if name == "." || name == ".." {
        return reject("reserved");
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric()
                         || c == '_' || c == '-' || c == '.') {
        return reject("invalid character");
    }
    Ok(())
}

/// The cgroup filesystem.
pub trait CgroupFs {
    fn root(&self) -> &Path;

    /// Create `path` unless it already exists.  True if it was created.
    fn ensure_dir(&mut self, path: &Path) -> Result<bool, ProvisionError>;

    /// Fails with `UnknownIdentity` if `owner` has no account.
    fn check_owner(&self, owner: &str) -> Result<(), ProvisionError>;

    /// Give `path` and everything beneath it to `owner`.
    fn chown_recursive(&mut self, path: &Path, owner: &str)
                       -> Result<(), ProvisionError>;
}

pub struct CgroupProvisioner<'a> {
    fs: &'a mut dyn CgroupFs,
}

impl<'a> CgroupProvisioner<'a> {
    pub fn new(fs: &'a mut dyn CgroupFs) -> CgroupProvisioner<'a> {
        CgroupProvisioner { fs: fs }
    }

    /// Make sure every subsystem directory for `group` exists and
    /// belongs to `owner`.  Ownership is reapplied even to directories
    /// that were already there.  The first failure aborts the rest.
    pub fn provision(&mut self, group: &str, owner: &str)
                     -> Result<Vec<CgroupDir>, ProvisionError> {
        validate_group_name(group)?;
        self.fs.check_owner(owner)?;
        let mut dirs = Vec::with_capacity(Subsystem::ALL.len());
        for spec in CgroupSpec::for_group(group) {
            let path = spec.path(self.fs.root());
            let created = self.fs.ensure_dir(&path)?;
            if created {
                info!(path = %path.display(), "created cgroup");
            } else {
                debug!(path = %path.display(), "cgroup already present");
            }
            self.fs.chown_recursive(&path, owner)?;
            debug!(path = %path.display(), owner = owner, "ownership applied");
            dirs.push(CgroupDir {
                subsystem: spec.subsystem,
                path: path,
                created: created,
            });
        }
        Ok(dirs)
    }
}

#[cfg(unix)]
pub use self::host::HostCgroupFs;

#[cfg(unix)]
mod host {
    use std::fs;
    use std::io::ErrorKind;
    use std::path::{Path, PathBuf};

    use nix::unistd::{fchownat, FchownatFlags, Gid, Uid, User};

    use super::CgroupFs;
    use crate::err::*;

    /// A directory, not a symlink to one.
    fn is_real_dir(path: &Path) -> bool {
        fs::symlink_metadata(path).map(|m| m.is_dir()).unwrap_or(false)
    }

    /// Real cgroup hierarchy rooted at `root`.
    pub struct HostCgroupFs {
        root: PathBuf,
    }

    impl HostCgroupFs {
        pub fn new<P: Into<PathBuf>>(root: P) -> HostCgroupFs {
            HostCgroupFs { root: root.into() }
        }

        fn owner_ids(owner: &str) -> Result<(Uid, Gid), ProvisionError> {
            match User::from_name(owner)
                .map_err(|e| map_nix_err(e, format!("look up {}", owner)))? {
                Some(u) => Ok((u.uid, u.gid)),
                None => Err(ProvisionError::UnknownIdentity(String::from(owner))),
            }
        }

        fn chown_tree(path: &Path, uid: Uid, gid: Gid)
                      -> Result<(), ProvisionError> {
            fchownat(None, path, Some(uid), Some(gid),
                     FchownatFlags::NoFollowSymlink)
                .map_err(|e| map_nix_err(e, format!("chown {}",
                                                    path.display())))?;

            let meta = fs::symlink_metadata(path)
                .map_err(|e| map_io_err(e, format!("stat {}",
                                                   path.display())))?;
            if !meta.is_dir() {
                return Ok(());
            }
            let entries = fs::read_dir(path)
                .map_err(|e| map_io_err(e, format!("read {}",
                                                   path.display())))?;
            for entry in entries {
                let entry = entry
                    .map_err(|e| map_io_err(e, format!("read {}",
                                                       path.display())))?;
                HostCgroupFs::chown_tree(&entry.path(), uid, gid)?;
            }
            Ok(())
        }
    }

    impl CgroupFs for HostCgroupFs {
        fn root(&self) -> &Path {
            &self.root
        }

        fn ensure_dir(&mut self, path: &Path) -> Result<bool, ProvisionError> {
            match fs::create_dir(path) {
                Ok(()) => Ok(true),
                Err(ref e) if e.kind() == ErrorKind::AlreadyExists
                    && is_real_dir(path) => Ok(false),
                Err(e) => {
                    let detail = if e.kind() == ErrorKind::NotFound {
                        format!("mkdir {} (is the hierarchy mounted?)",
                                path.display())
                    } else {
                        format!("mkdir {}", path.display())
                    };
                    Err(map_io_err(e, detail))
                }
            }
        }

        fn check_owner(&self, owner: &str) -> Result<(), ProvisionError> {
            HostCgroupFs::owner_ids(owner).map(|_| ())
        }

        fn chown_recursive(&mut self, path: &Path, owner: &str)
                           -> Result<(), ProvisionError> {
            let (uid, gid) = HostCgroupFs::owner_ids(owner)?;
            HostCgroupFs::chown_tree(path, uid, gid)
        }
    }
}
