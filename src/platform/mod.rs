//! The host operating system, as seen by the orchestrator.
//!
//! Exactly one variant is compiled in: `WindowsSecurityProvisioner` on
//! Windows (accounts, privileges, ACLs) and `LinuxCgroupProvisioner` on
//! Unix (accounts for lookup only, cgroups).

use crate::acl::AclStore;
use crate::cgroup::CgroupFs;
use crate::identity::IdentityStore;
use crate::privilege::PrivilegePolicy;

#[cfg(unix)]
mod linux;
#[cfg(unix)]
pub use self::linux::{LinuxCgroupProvisioner, UnixIdentityStore};

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use self::windows::WindowsSecurityProvisioner;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    CreateIdentity,
    Privileges,
    DirectoryAcl,
    Cgroups,
}

impl Capability {
    pub fn describe(self) -> &'static str {
        match self {
            Capability::CreateIdentity => "Account creation",
            Capability::Privileges => "Privilege assignment",
            Capability::DirectoryAcl => "Directory access control",
            Capability::Cgroups => "Cgroup provisioning",
        }
    }
}

pub trait PlatformCapability {
    fn name(&self) -> &'static str;

    fn supports(&self, capability: Capability) -> bool;

    fn identities(&mut self) -> &mut dyn IdentityStore;

    fn privileges(&mut self) -> Option<&mut dyn PrivilegePolicy> {
        None
    }

    fn acls(&mut self) -> Option<&mut dyn AclStore> {
        None
    }

    fn cgroups(&mut self) -> Option<&mut dyn CgroupFs> {
        None
    }
}

#[cfg(unix)]
pub type HostPlatform = LinuxCgroupProvisioner;
#[cfg(windows)]
pub type HostPlatform = WindowsSecurityProvisioner;

/// The platform variant this program was built for.
pub fn host() -> HostPlatform {
    HostPlatform::new()
}
