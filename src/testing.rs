//! In-memory host used by the unit tests.  Implements every backend
//! and counts the mutations it is asked to perform.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::acl::{AccessRights, AclStore};
use crate::cgroup::{CgroupFs, CGROUP_ROOT};
use crate::err::*;
use crate::identity::{Credential, Identity, IdentityStore};
use crate::platform::{Capability, PlatformCapability};
use crate::privilege::{PrivilegeKind, PrivilegePolicy};

pub struct MemoryHost {
    session: String,
    users: BTreeMap<String, Option<String>>,
    privileges: BTreeMap<String, BTreeSet<PrivilegeKind>>,
    paths: BTreeSet<PathBuf>,
    acls: BTreeMap<PathBuf, BTreeMap<String, AccessRights>>,
    cgroup_root: PathBuf,
    cgroups: BTreeMap<PathBuf, Option<String>>,
    unsupported: Vec<Capability>,
    deny_policy: bool,
    deny_policy_lookup: bool,
    deny_cgroups: bool,
    mutations: usize,
    chown_calls: usize,
    cgroup_attempts: usize,
}

impl MemoryHost {
    /// A host whose only account is the operator's own.
    pub fn new(session: &str) -> MemoryHost {
        let mut users = BTreeMap::new();
        users.insert(String::from(session), None);
        MemoryHost {
            session: String::from(session),
            users: users,
            privileges: BTreeMap::new(),
            paths: BTreeSet::new(),
            acls: BTreeMap::new(),
            cgroup_root: PathBuf::from(CGROUP_ROOT),
            cgroups: BTreeMap::new(),
            unsupported: Vec::new(),
            deny_policy: false,
            deny_policy_lookup: false,
            deny_cgroups: false,
            mutations: 0,
            chown_calls: 0,
            cgroup_attempts: 0,
        }
    }

    pub fn with_user(mut self, name: &str) -> MemoryHost {
        self.users.insert(String::from(name), None);
        self
    }

    pub fn with_path(mut self, path: &str) -> MemoryHost {
        self.paths.insert(PathBuf::from(path));
        self
    }

    pub fn without(mut self, capability: Capability) -> MemoryHost {
        self.unsupported.push(capability);
        self
    }

    pub fn deny_policy(mut self) -> MemoryHost {
        self.deny_policy = true;
        self
    }

    /// Make reading an account's current privileges fail.
    pub fn deny_policy_lookup(mut self) -> MemoryHost {
        self.deny_policy_lookup = true;
        self
    }

    pub fn deny_cgroups(mut self) -> MemoryHost {
        self.deny_cgroups = true;
        self
    }

    pub fn has_user(&self, name: &str) -> bool {
        self.users.contains_key(name)
    }

    pub fn password_of(&self, name: &str) -> Option<&str> {
        self.users.get(name).and_then(|p| p.as_ref()).map(String::as_str)
    }

    pub fn privileges_of(&self, name: &str) -> BTreeSet<PrivilegeKind> {
        self.privileges.get(name).cloned().unwrap_or_default()
    }

    pub fn acl_entry(&self, path: &str, name: &str) -> Option<AccessRights> {
        self.acls.get(Path::new(path)).and_then(|a| a.get(name)).cloned()
    }

    pub fn acl_len(&self, path: &str) -> usize {
        self.acls.get(Path::new(path)).map_or(0, |a| a.len())
    }

    pub fn cgroup_dirs(&self) -> BTreeMap<PathBuf, Option<String>> {
        self.cgroups.clone()
    }

    pub fn mutations(&self) -> usize {
        self.mutations
    }

    pub fn chown_calls(&self) -> usize {
        self.chown_calls
    }

    pub fn cgroup_attempts(&self) -> usize {
        self.cgroup_attempts
    }
}

impl IdentityStore for MemoryHost {
    fn exists(&self, name: &str) -> Result<bool, ProvisionError> {
        Ok(self.users.contains_key(name))
    }

    fn create(&mut self, name: &str, credential: &Credential)
              -> Result<(), ProvisionError> {
        self.mutations += 1;
        self.users.insert(String::from(name),
                          Some(String::from(credential.expose())));
        Ok(())
    }

    fn session_identity(&self) -> Result<String, ProvisionError> {
        Ok(self.session.clone())
    }
}

impl PrivilegePolicy for MemoryHost {
    fn held(&self, identity: &Identity)
            -> Result<BTreeSet<PrivilegeKind>, ProvisionError> {
        if self.deny_policy_lookup {
            return Err(map_os_err(5, String::from("LsaOpenPolicy")));
        }
        Ok(self.privileges_of(identity.name()))
    }

    fn add(&mut self, identity: &Identity, privilege: PrivilegeKind)
           -> Result<(), ProvisionError> {
        if self.deny_policy {
            return Err(map_os_err(5, String::from("LsaOpenPolicy")));
        }
        self.mutations += 1;
        self.privileges.entry(String::from(identity.name()))
            .or_insert_with(BTreeSet::new)
            .insert(privilege);
        Ok(())
    }
}

impl AclStore for MemoryHost {
    fn path_exists(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    fn set_entry(&mut self, identity: &Identity, path: &Path,
                 rights: AccessRights) -> Result<(), ProvisionError> {
        self.mutations += 1;
        self.acls.entry(path.to_path_buf())
            .or_insert_with(BTreeMap::new)
            .insert(String::from(identity.name()), rights);
        Ok(())
    }
}

impl CgroupFs for MemoryHost {
    fn root(&self) -> &Path {
        &self.cgroup_root
    }

    fn ensure_dir(&mut self, path: &Path) -> Result<bool, ProvisionError> {
        self.cgroup_attempts += 1;
        if self.deny_cgroups {
            return Err(ProvisionError::PermissionDenied {
                detail: format!("mkdir {}", path.display()),
            });
        }
        if self.cgroups.contains_key(path) {
            return Ok(false);
        }
        self.mutations += 1;
        self.cgroups.insert(path.to_path_buf(), None);
        Ok(true)
    }

    fn check_owner(&self, owner: &str) -> Result<(), ProvisionError> {
        if self.users.contains_key(owner) {
            Ok(())
        } else {
            Err(ProvisionError::UnknownIdentity(String::from(owner)))
        }
    }

    fn chown_recursive(&mut self, path: &Path, owner: &str)
                       -> Result<(), ProvisionError> {
        if !self.users.contains_key(owner) {
            return Err(ProvisionError::UnknownIdentity(String::from(owner)));
        }
        self.mutations += 1;
        self.chown_calls += 1;
        self.cgroups.insert(path.to_path_buf(), Some(String::from(owner)));
        Ok(())
    }
}

impl PlatformCapability for MemoryHost {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn supports(&self, capability: Capability) -> bool {
        !self.unsupported.contains(&capability)
    }

    fn identities(&mut self) -> &mut dyn IdentityStore {
        self
    }

    fn privileges(&mut self) -> Option<&mut dyn PrivilegePolicy> {
        Some(self)
    }

    fn acls(&mut self) -> Option<&mut dyn AclStore> {
        Some(self)
    }

    fn cgroups(&mut self) -> Option<&mut dyn CgroupFs> {
        Some(self)
    }
}
