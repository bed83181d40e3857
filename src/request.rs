//! The provisioning request, and the command line that produces it.

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::{App, AppSettings, Arg, ArgMatches};

use crate::acl::AccessRights;
use crate::cgroup::validate_group_name;
use crate::err::*;
use crate::identity::{Credential, IdentityRequest};
use crate::privilege::PrivilegeKind;

/// Who receives the privilege grant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunnerTarget {
    /// The resolved target identity, or the operator's own account if
    /// no target was given.
    Default,
    /// A specific account, which must already exist.
    Named(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrivilegeRequest {
    pub target: RunnerTarget,
    pub privileges: BTreeSet<PrivilegeKind>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CgroupRequest {
    pub group: String,
    /// Literal owner name; the operator's own account if None.
    pub owner: Option<String>,
}

/// Everything one run has been asked to do.  Built once, never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProvisioningRequest {
    pub identity: Option<IdentityRequest>,
    pub privileges: Option<PrivilegeRequest>,
    pub directories: Vec<PathBuf>,
    pub rights: AccessRights,
    pub cgroup: Option<CgroupRequest>,
    pub assume_yes: bool,
    pub verbose: bool,
}

impl ProvisioningRequest {
    /// The fixed request made by prepare-cgroups.
    pub fn cgroups(group: &str) -> ProvisioningRequest {
        ProvisioningRequest {
            cgroup: Some(CgroupRequest { group: String::from(group), owner: None }),
            ..ProvisioningRequest::default()
        }
    }

    /// True if nothing would change the host.  `rights`, `assume_yes`
    /// and `verbose` only tune the other steps.
    pub fn is_empty(&self) -> bool {
        self.identity.is_none()
            && self.privileges.is_none()
            && self.directories.is_empty()
            && self.cgroup.is_none()
    }
}

pub fn runner_app<'a, 'b>() -> App<'a, 'b> {
    App::new("prepare-runner")
        .about("Prepare a local account to run sandboxed programs.")
        .setting(AppSettings::ArgRequiredElseHelp)
        .arg(Arg::with_name("create-user")
             .long("create-user")
             .value_name("NAME")
             .takes_value(true)
             .conflicts_with("user")
             .help("Create a local account (requires --password)"))
        .arg(Arg::with_name("password")
             .long("password")
             .value_name("SECRET")
             .takes_value(true)
             .help("Password for the account created by --create-user"))
        .arg(Arg::with_name("runner")
             .long("runner")
             .value_name("NAME")
             .takes_value(true)
             .min_values(0)
             .max_values(1)
             .help("Grant the privileges needed to start processes as \
                    another account, to NAME or to the target account"))
        .arg(Arg::with_name("privilege")
             .long("privilege")
             .value_name("PRIVILEGE")
             .takes_value(true)
             .multiple(true)
             .number_of_values(1)
             .requires("runner")
             .help("Grant only this privilege (repeatable; default: all)"))
        .arg(Arg::with_name("dir")
             .long("dir")
             .value_name("PATH")
             .takes_value(true)
             .multiple(true)
             .use_delimiter(true)
             .require_delimiter(true)
             .help("Give the target account access to PATH[,PATH...]"))
        .arg(Arg::with_name("rights")
             .long("rights")
             .value_name("RIGHTS")
             .takes_value(true)
             .possible_values(&["rwc", "full"])
             .default_value("rwc")
             .help("Access granted by --dir"))
        .arg(Arg::with_name("user")
             .long("user")
             .value_name("NAME")
             .takes_value(true)
             .conflicts_with("current-user")
             .help("Target an existing account"))
        .arg(Arg::with_name("current-user")
             .long("current-user")
             .conflicts_with("create-user")
             .help("Target the account running this program"))
        .arg(Arg::with_name("yes")
             .short("y")
             .long("yes")
             .help("Do not ask for confirmation"))
        .arg(Arg::with_name("verbose")
             .short("v")
             .long("verbose")
             .help("Log each step"))
}

pub fn cgroups_app<'a, 'b>() -> App<'a, 'b> {
    App::new("prepare-cgroups")
        .about("Create the sandbox cgroups, owned by the invoking user. \
                Must be rerun after every reboot.")
        .arg(Arg::with_name("yes")
             .short("y")
             .long("yes")
             .help("Do not ask for confirmation"))
        .arg(Arg::with_name("verbose")
             .short("v")
             .long("verbose")
             .help("Log each step"))
}

/// Turn parsed prepare-runner options into a request.  Privilege names
/// are checked here; account names are checked by the orchestrator.
pub fn request_from_matches(m: &ArgMatches) -> Result<ProvisioningRequest, ProvisionError> {
    let identity = if let Some(name) = m.value_of("create-user") {
        Some(IdentityRequest::Create {
            name: String::from(name),
            credential: m.value_of("password").map(Credential::new),
        })
    } else if let Some(name) = m.value_of("user") {
        Some(IdentityRequest::Existing(String::from(name)))
    } else if m.is_present("current-user") {
        Some(IdentityRequest::Session)
    } else {
        None
    };

    if m.is_present("password") && !m.is_present("create-user") {
        return Err(ProvisionError::Usage(
            String::from("--password is only meaningful with --create-user")));
    }

    let privileges = if m.is_present("runner") {
        let target = match m.value_of("runner") {
            Some(name) => RunnerTarget::Named(String::from(name)),
            None => RunnerTarget::Default,
        };
        let privileges = match m.values_of("privilege") {
            Some(vals) => vals.map(|v| v.parse::<PrivilegeKind>())
                .collect::<Result<BTreeSet<_>, _>>()?,
            None => PrivilegeKind::all(),
        };
        Some(PrivilegeRequest { target: target, privileges: privileges })
    } else {
        None
    };

    let directories: Vec<PathBuf> = m.values_of("dir")
        .map(|vals| vals.filter(|v| !v.is_empty()).map(PathBuf::from).collect())
        .unwrap_or_default();

    let rights = match m.value_of("rights") {
        Some(r) => r.parse::<AccessRights>()?,
        None => AccessRights::default(),
    };

    Ok(ProvisioningRequest {
        identity: identity,
        privileges: privileges,
        directories: directories,
        rights: rights,
        cgroup: None,
        assume_yes: m.is_present("yes"),
        verbose: m.is_present("verbose"),
    })
}

pub fn cgroup_request_from_matches(m: &ArgMatches, group: &str)
                                   -> Result<ProvisioningRequest, ProvisionError> {
    validate_group_name(group)?;
    let mut req = ProvisioningRequest::cgroups(group);
    req.assume_yes = m.is_present("yes");
    req.verbose = m.is_present("verbose");
    Ok(req)
}
