//! Validates a request, asks for confirmation, and runs the steps in
//! order: account, privileges, directory grants, cgroups.
//!
//! Nothing is rolled back.  A failed step leaves whatever earlier steps
//! did in place; since every step is idempotent, rerunning the same
//! request after fixing the cause finishes the job.

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::acl::{DirectoryAccessGrantor, DirectoryGrant};
use crate::cgroup::{validate_group_name, CgroupDir, CgroupProvisioner, Subsystem};
use crate::confirm::ConfirmationSource;
use crate::err::*;
use crate::identity::{Identity, IdentityRequest, IdentityResolver};
use crate::platform::{Capability, PlatformCapability};
use crate::privilege::{PrivilegeGrantor, PrivilegeKind};
use crate::request::{ProvisioningRequest, RunnerTarget};

/// What a successful run did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    pub identity: Option<Identity>,
    pub runner: Option<Identity>,
    pub privileges_added: Vec<PrivilegeKind>,
    pub privileges_already_held: Vec<PrivilegeKind>,
    pub directories: Vec<DirectoryGrant>,
    pub cgroups: Vec<CgroupDir>,
    /// Privileges were assigned; they only apply to new logon sessions.
    pub restart_required: bool,
}

impl Outcome {
    /// Human-readable summary, one line per item.
    pub fn report(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(ref id) = self.identity {
            lines.push(format!("Target account: {}", id));
        }
        if let Some(ref runner) = self.runner {
            for p in &self.privileges_added {
                lines.push(format!("Granted {} to {}", p, runner));
            }
            for p in &self.privileges_already_held {
                lines.push(format!("{} already held by {}", p, runner));
            }
        }
        for g in &self.directories {
            lines.push(format!("Granted {} on {} to {}",
                               g.rights, g.path.display(), g.identity));
        }
        for c in &self.cgroups {
            lines.push(format!("{} {}",
                               if c.created { "Created" } else { "Already present:" },
                               c.path.display()));
        }
        if self.restart_required {
            lines.push(String::from(
                "Restart the computer (or at least log in again) before \
                 the new privileges can be used."));
        }
        lines
    }
}

fn privilege_list(privileges: &BTreeSet<PrivilegeKind>) -> String {
    privileges.iter().map(|p| p.policy_name()).collect::<Vec<_>>().join(", ")
}

pub struct Orchestrator<'a> {
    platform: &'a mut dyn PlatformCapability,
    confirm: &'a mut dyn ConfirmationSource,
}

impl<'a> Orchestrator<'a> {
    pub fn new(platform: &'a mut dyn PlatformCapability,
               confirm: &'a mut dyn ConfirmationSource) -> Orchestrator<'a> {
        Orchestrator { platform: platform, confirm: confirm }
    }

    fn require(&self, capability: Capability) -> Result<(), ProvisionError> {
        if self.platform.supports(capability) {
            Ok(())
        } else {
            Err(ProvisionError::Unsupported(capability.describe()))
        }
    }

    fn require_existing(&mut self, name: &str) -> Result<(), ProvisionError> {
        if self.platform.identities().exists(name)? {
            Ok(())
        } else {
            Err(ProvisionError::UnknownIdentity(String::from(name)))
        }
    }

    /// Check everything that can be checked without changing the host,
    /// and describe what would be done, one line per step.
    pub fn validate(&mut self, req: &ProvisioningRequest)
                    -> Result<Vec<String>, ProvisionError> {
        let mut plan = Vec::new();

        if let Some(ref ident) = req.identity {
            ident.validate()?;
        }
        if !req.directories.is_empty() && req.identity.is_none() {
            return Err(ProvisionError::MissingTargetIdentity);
        }

        if let Some(ref ident) = req.identity {
            match *ident {
                IdentityRequest::Create { .. } => {
                    self.require(Capability::CreateIdentity)?
                }
                IdentityRequest::Existing(ref name) => self.require_existing(name)?,
                IdentityRequest::Session => {
                    let name = self.platform.identities().session_identity()?;
                    self.require_existing(&name)?;
                }
            }
            plan.push(format!("Use {}", ident.describe()));
        }

        if let Some(ref p) = req.privileges {
            self.require(Capability::Privileges)?;
            let target = match p.target {
                RunnerTarget::Named(ref name) => {
                    self.require_existing(name)?;
                    format!("'{}'", name)
                }
                RunnerTarget::Default => match req.identity {
                    Some(ref ident) => ident.describe(),
                    None => IdentityRequest::Session.describe(),
                },
            };
            plan.push(format!("Grant {} to {}", privilege_list(&p.privileges), target));
        }

        if !req.directories.is_empty() {
            self.require(Capability::DirectoryAcl)?;
            for d in &req.directories {
                plan.push(format!("Grant {} on {}", req.rights, d.display()));
            }
        }

        if let Some(ref cg) = req.cgroup {
            self.require(Capability::Cgroups)?;
            validate_group_name(&cg.group)?;
            let owner = match cg.owner {
                Some(ref o) => o.clone(),
                None => self.platform.identities().session_identity()?,
            };
            self.require_existing(&owner)?;
            let root = match self.platform.cgroups() {
                Some(fs) => fs.root().to_path_buf(),
                None => return Err(ProvisionError::Unsupported(
                    Capability::Cgroups.describe())),
            };
            let subsystems = Subsystem::ALL.iter()
                .map(|s| s.name()).collect::<Vec<_>>().join(", ");
            plan.push(format!("Create cgroup '{}' for {} under {}, owned by '{}'",
                              cg.group, subsystems, root.display(), owner));
        }

        Ok(plan)
    }

    pub fn run(&mut self, req: &ProvisioningRequest) -> Result<Outcome, ProvisionError> {
        let mut outcome = Outcome::default();
        if req.is_empty() {
            info!("nothing to do");
            return Ok(outcome);
        }
        let plan = self.validate(req)?;
        if !self.confirm.confirm(&plan.join("\n"))? {
            return Err(ProvisionError::Cancelled);
        }
        info!(platform = self.platform.name(), steps = plan.len(), "provisioning");

        if let Some(ref ident) = req.identity {
            let mut resolver = IdentityResolver::new(self.platform.identities());
            outcome.identity = Some(resolver.resolve_or_create(ident)?);
        }

        if let Some(ref p) = req.privileges {
            let runner = {
                let mut resolver = IdentityResolver::new(self.platform.identities());
                match p.target {
                    RunnerTarget::Named(ref name) => resolver.resolve(name)?,
                    RunnerTarget::Default => match outcome.identity {
                        Some(ref id) => id.clone(),
                        None => resolver.resolve_or_create(&IdentityRequest::Session)?,
                    },
                }
            };
            let policy = self.platform.privileges()
                .ok_or(ProvisionError::Unsupported(Capability::Privileges.describe()))?;
            let added = PrivilegeGrantor::new(policy).grant(&runner, &p.privileges)?;
            outcome.privileges_already_held = p.privileges.iter()
                .filter(|k| !added.contains(*k))
                .cloned()
                .collect();
            outcome.privileges_added = added;
            outcome.runner = Some(runner);
            outcome.restart_required = true;
        }

        if let Err(e) = self.later_steps(req, &mut outcome) {
            if outcome.restart_required {
                warn!("privileges were already granted; a restart is still \
                       needed before they take effect");
            }
            return Err(e);
        }
        Ok(outcome)
    }

    fn later_steps(&mut self, req: &ProvisioningRequest, outcome: &mut Outcome)
                   -> Result<(), ProvisionError> {
        if !req.directories.is_empty() {
            let target = match outcome.identity {
                Some(ref id) => id.clone(),
                None => return Err(ProvisionError::MissingTargetIdentity),
            };
            let acls = self.platform.acls()
                .ok_or(ProvisionError::Unsupported(Capability::DirectoryAcl.describe()))?;
            outcome.directories = DirectoryAccessGrantor::new(acls)
                .grant_all(&target, &req.directories, req.rights)?;
        }

        if let Some(ref cg) = req.cgroup {
            let owner = match cg.owner {
                Some(ref o) => o.clone(),
                None => self.platform.identities().session_identity()?,
            };
            let fs = self.platform.cgroups()
                .ok_or(ProvisionError::Unsupported(Capability::Cgroups.describe()))?;
            outcome.cgroups = CgroupProvisioner::new(fs).provision(&cg.group, &owner)?;
        }
        Ok(())
    }
}
