//! Granting the OS privileges a process needs in order to impersonate
//! another account and start processes under it.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use crate::err::*;
use crate::identity::Identity;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrivilegeKind {
    AssignPrimaryToken,
    ActAsTrustedComputingBase,
    IncreaseQuota,
}

impl PrivilegeKind {
    /// The complete set, in grant order.
    pub const ALL: [PrivilegeKind; 3] = [
        PrivilegeKind::AssignPrimaryToken,
        PrivilegeKind::ActAsTrustedComputingBase,
        PrivilegeKind::IncreaseQuota,
    ];

    /// Name of the right in the local security policy database.
    pub fn policy_name(self) -> &'static str {
        match self {
            PrivilegeKind::AssignPrimaryToken => "SeAssignPrimaryTokenPrivilege",
            PrivilegeKind::ActAsTrustedComputingBase => "SeTcbPrivilege",
            PrivilegeKind::IncreaseQuota => "SeIncreaseQuotaPrivilege",
        }
    }

    pub fn all() -> BTreeSet<PrivilegeKind> {
        PrivilegeKind::ALL.iter().cloned().collect()
    }
}

impl fmt::Display for PrivilegeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.policy_name())
    }
}

impl FromStr for PrivilegeKind {
    type Err = ProvisionError;

    /// Accepts the policy name ("SeTcbPrivilege") or the short form
    /// ("tcb", "assign-primary-token"), case-insensitively.
    fn from_str(s: &str) -> Result<PrivilegeKind, ProvisionError> {
        let key: String = s.chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "seassignprimarytokenprivilege" | "assignprimarytoken" => {
                Ok(PrivilegeKind::AssignPrimaryToken)
            }
            "setcbprivilege" | "tcb" | "actastrustedcomputingbase" => {
                Ok(PrivilegeKind::ActAsTrustedComputingBase)
            }
            "seincreasequotaprivilege" | "increasequota" => {
                Ok(PrivilegeKind::IncreaseQuota)
            }
            _ => Err(ProvisionError::InvalidPrivilege(String::from(s))),
        }
    }
}

/// The host's local security policy.
pub trait PrivilegePolicy {
    /// Privileges from the fixed set currently assigned to `identity`.
    fn held(&self, identity: &Identity)
            -> Result<BTreeSet<PrivilegeKind>, ProvisionError>;

    fn add(&mut self, identity: &Identity, privilege: PrivilegeKind)
           -> Result<(), ProvisionError>;
}

pub struct PrivilegeGrantor<'a> {
    policy: &'a mut dyn PrivilegePolicy,
}

impl<'a> PrivilegeGrantor<'a> {
    pub fn new(policy: &'a mut dyn PrivilegePolicy) -> PrivilegeGrantor<'a> {
        PrivilegeGrantor { policy: policy }
    }

    /// Grant every privilege in `privileges` that `identity` does not
    /// already hold.  Returns the ones actually added.  The change
    /// only applies to sessions started after a restart or fresh logon.
    pub fn grant(&mut self, identity: &Identity,
                 privileges: &BTreeSet<PrivilegeKind>)
                 -> Result<Vec<PrivilegeKind>, ProvisionError> {
        identity.require_exists()?;
        let first = match privileges.iter().next() {
            Some(&p) => p,
            None => return Ok(Vec::new()),
        };
        // A failed lookup is charged to the first privilege requested.
        let held = self.policy.held(identity)
            .map_err(|e| grant_failure(identity, first, e))?;
        let mut added = Vec::new();
        for &p in privileges {
            if held.contains(&p) {
                debug!(account = identity.name(), privilege = p.policy_name(),
                       "already held");
                continue;
            }
            self.policy.add(identity, p)
                .map_err(|e| grant_failure(identity, p, e))?;
            info!(account = identity.name(), privilege = p.policy_name(),
                  "granted");
            added.push(p);
        }
        Ok(added)
    }
}

fn grant_failure(identity: &Identity, privilege: PrivilegeKind,
                 e: ProvisionError) -> ProvisionError {
    match e {
        ProvisionError::PrivilegeGrantFailure { .. } => e,
        other => ProvisionError::PrivilegeGrantFailure {
            identity: String::from(identity.name()),
            privilege: privilege,
            detail: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryHost;

    #[test]
    fn parses_policy_and_short_names() {
        assert_eq!("SeTcbPrivilege".parse::<PrivilegeKind>().unwrap(),
                   PrivilegeKind::ActAsTrustedComputingBase);
        assert_eq!("tcb".parse::<PrivilegeKind>().unwrap(),
                   PrivilegeKind::ActAsTrustedComputingBase);
        assert_eq!("increase-quota".parse::<PrivilegeKind>().unwrap(),
                   PrivilegeKind::IncreaseQuota);
        assert_eq!("assign_primary_token".parse::<PrivilegeKind>().unwrap(),
                   PrivilegeKind::AssignPrimaryToken);
    }

    #[test]
    fn rejects_unknown_privilege_names() {
        assert!(matches!("SeDebugPrivilege".parse::<PrivilegeKind>(),
                         Err(ProvisionError::InvalidPrivilege(_))));
    }

    #[test]
    fn unresolved_identity_is_refused_without_mutation() {
        let mut host = MemoryHost::new("operator");
        let err = PrivilegeGrantor::new(&mut host)
            .grant(&Identity::unresolved("nobody"), &PrivilegeKind::all());
        assert!(matches!(err, Err(ProvisionError::UnknownIdentity(_))));
        assert_eq!(host.mutations(), 0);
    }

    #[test]
    fn granting_twice_is_idempotent() {
        let mut host = MemoryHost::new("operator").with_user("svc");
        let svc = Identity::resolved("svc");
        let first = PrivilegeGrantor::new(&mut host)
            .grant(&svc, &PrivilegeKind::all()).unwrap();
        assert_eq!(first.len(), 3);
        let after_first = host.privileges_of("svc");

        let second = PrivilegeGrantor::new(&mut host)
            .grant(&svc, &PrivilegeKind::all()).unwrap();
        assert!(second.is_empty());
        assert_eq!(host.privileges_of("svc"), after_first);
        assert_eq!(host.mutations(), 3);
    }

    #[test]
    fn policy_errors_become_grant_failures() {
        let mut host = MemoryHost::new("operator").with_user("svc").deny_policy();
        let err = PrivilegeGrantor::new(&mut host)
            .grant(&Identity::resolved("svc"), &PrivilegeKind::all());
        match err {
            Err(ProvisionError::PrivilegeGrantFailure { identity, privilege, .. }) => {
                assert_eq!(identity, "svc");
                assert_eq!(privilege, PrivilegeKind::AssignPrimaryToken);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn failed_lookup_becomes_grant_failure() {
        let mut host = MemoryHost::new("operator").with_user("svc").deny_policy_lookup();
        let mut wanted = BTreeSet::new();
        wanted.insert(PrivilegeKind::IncreaseQuota);
        let err = PrivilegeGrantor::new(&mut host)
            .grant(&Identity::resolved("svc"), &wanted);
        match err {
            Err(ProvisionError::PrivilegeGrantFailure { identity, privilege, detail }) => {
                assert_eq!(identity, "svc");
                assert_eq!(privilege, PrivilegeKind::IncreaseQuota);
                assert!(detail.contains("LsaOpenPolicy"), "{}", detail);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(host.mutations(), 0);
    }
}
