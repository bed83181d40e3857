//! Unix variant: accounts come from the passwd database, and the only
//! thing provisioned is the cgroup hierarchy.

use std::env;
use std::path::PathBuf;

use nix::unistd::{getuid, geteuid, Uid, User};

use super::{Capability, PlatformCapability};
use crate::cgroup::{CgroupFs, HostCgroupFs, CGROUP_ROOT};
use crate::err::*;
use crate::identity::{Credential, IdentityStore};

pub struct UnixIdentityStore;

impl UnixIdentityStore {
    /// The operator's uid.  When running as root under sudo, this is
    /// the account that invoked sudo, not root.
    fn operator_uid() -> Uid {
        if geteuid().is_root() {
            if let Some(uid) = env::var("SUDO_UID").ok()
                .and_then(|s| s.parse::<u32>().ok()) {
                return Uid::from_raw(uid);
            }
        }
        getuid()
    }
}

impl IdentityStore for UnixIdentityStore {
    fn exists(&self, name: &str) -> Result<bool, ProvisionError> {
        User::from_name(name)
            .map(|u| u.is_some())
            .map_err(|e| map_nix_err(e, format!("look up {}", name)))
    }

    fn create(&mut self, _name: &str, _credential: &Credential)
              -> Result<(), ProvisionError> {
        Err(ProvisionError::Unsupported(Capability::CreateIdentity.describe()))
    }

    fn session_identity(&self) -> Result<String, ProvisionError> {
        let uid = UnixIdentityStore::operator_uid();
        match User::from_uid(uid)
            .map_err(|e| map_nix_err(e, format!("look up uid {}", uid)))? {
            Some(u) => Ok(u.name),
            None => Err(ProvisionError::UnknownIdentity(format!("uid {}", uid))),
        }
    }
}

pub struct LinuxCgroupProvisioner {
    identities: UnixIdentityStore,
    cgroups: HostCgroupFs,
}

impl LinuxCgroupProvisioner {
    pub fn new() -> LinuxCgroupProvisioner {
        LinuxCgroupProvisioner::with_root(CGROUP_ROOT)
    }

    /// Use a cgroup hierarchy mounted somewhere other than the usual place.
    pub fn with_root<P: Into<PathBuf>>(root: P) -> LinuxCgroupProvisioner {
        LinuxCgroupProvisioner {
            identities: UnixIdentityStore,
            cgroups: HostCgroupFs::new(root),
        }
    }
}

impl PlatformCapability for LinuxCgroupProvisioner {
    fn name(&self) -> &'static str {
        "linux-cgroup"
    }

    fn supports(&self, capability: Capability) -> bool {
        capability == Capability::Cgroups
    }

    fn identities(&mut self) -> &mut dyn IdentityStore {
        &mut self.identities
    }

    fn cgroups(&mut self) -> Option<&mut dyn CgroupFs> {
        Some(&mut self.cgroups)
    }
}
