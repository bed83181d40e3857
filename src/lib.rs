//! Shared code for the two provisioning programs: everything the
//! sandbox needs from the host before it can run untrusted code.

extern crate clap;
extern crate libc;
#[cfg(unix)]
extern crate nix;
extern crate thiserror;
extern crate tracing;
extern crate tracing_subscriber;
#[cfg(windows)]
extern crate windows_sys;

mod err;
pub use err::*;

pub mod acl;
pub mod cgroup;
pub mod confirm;
pub mod identity;
pub mod logging;
pub mod orchestrator;
pub mod platform;
pub mod privilege;
pub mod request;

#[cfg(test)]
mod testing;

pub use acl::{AccessRights, AclStore, DirectoryAccessGrantor, DirectoryGrant};
pub use cgroup::{CgroupFs, CgroupProvisioner, CgroupSpec, Subsystem};
pub use confirm::{ConfirmationSource, FixedAnswer, TerminalPrompt};
pub use identity::{Credential, Identity, IdentityRequest, IdentityResolver, IdentityStore};
pub use orchestrator::{Orchestrator, Outcome};
pub use platform::{Capability, PlatformCapability};
pub use privilege::{PrivilegeGrantor, PrivilegeKind, PrivilegePolicy};
pub use request::ProvisioningRequest;
