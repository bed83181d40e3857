//! Error type and helper functions.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::privilege::PrivilegeKind;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("No such account '{0}'.")]
    UnknownIdentity(String),

    #[error("Creating account '{0}' requires a password.")]
    MissingCredential(String),

    #[error("Directory access requested, but no target account given \
             (use --user, --create-user or --current-user).")]
    MissingTargetIdentity,

    #[error("{}: no such file or directory.", .0.display())]
    PathNotFound(PathBuf),

    #[error("{detail}: permission denied (must be run as superuser).")]
    PermissionDenied { detail: String },

    #[error("Granting {privilege} to '{identity}' failed: {detail}.")]
    PrivilegeGrantFailure {
        identity: String,
        privilege: PrivilegeKind,
        detail: String,
    },

    #[error("{failed} of {total} directory grants failed.")]
    DirectoryGrantsFailed { failed: usize, total: usize },

    #[error("{0} is not supported on this platform.")]
    Unsupported(&'static str),

    #[error("Cancelled; nothing was changed.")]
    Cancelled,

    #[error("Invalid isolation group name '{name}': {reason}.")]
    InvalidGroupName { name: String, reason: &'static str },

    #[error("Unknown privilege '{0}'.")]
    InvalidPrivilege(String),

    #[error("{0}")]
    Usage(String),

    #[error("{detail}: {cause}.")]
    Io { cause: io::Error, detail: String },

    #[cfg(unix)]
    #[error("{detail}: {cause}.")]
    Nix { cause: nix::Error, detail: String },

    #[error("{detail}: system error {code}.")]
    Os { code: u32, detail: String },
}

impl ProvisionError {
    /// True for errors that are detected before anything on the host
    /// has been touched.
    pub fn is_validation(&self) -> bool {
        match *self {
            ProvisionError::UnknownIdentity(_)
            | ProvisionError::MissingCredential(_)
            | ProvisionError::MissingTargetIdentity
            | ProvisionError::Unsupported(_)
            | ProvisionError::Cancelled
            | ProvisionError::InvalidGroupName { .. }
            | ProvisionError::InvalidPrivilege(_)
            | ProvisionError::Usage(_) => true,
            _ => false,
        }
    }
}

fn is_elevation_errno(code: i32) -> bool {
    code == libc::EACCES || code == libc::EPERM
}

/// Wrap an I/O error.  EACCES and EPERM become `PermissionDenied`,
/// since every mutating filesystem step here needs the same elevation.
pub fn map_io_err(cause: io::Error, detail: String) -> ProvisionError {
    match cause.raw_os_error() {
        Some(code) if is_elevation_errno(code) => {
            ProvisionError::PermissionDenied { detail: detail }
        }
        _ => ProvisionError::Io { cause: cause, detail: detail },
    }
}

#[cfg(unix)]
pub fn map_nix_err(cause: nix::Error, detail: String) -> ProvisionError {
    if is_elevation_errno(cause as i32) {
        ProvisionError::PermissionDenied { detail: detail }
    } else {
        ProvisionError::Nix { cause: cause, detail: detail }
    }
}

pub fn map_os_err(code: u32, detail: String) -> ProvisionError {
    ProvisionError::Os { code: code, detail: detail }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eacces_maps_to_permission_denied() {
        let e = map_io_err(io::Error::from_raw_os_error(libc::EACCES),
                           String::from("mkdir /sys/fs/cgroup/memory/sp"));
        match e {
            ProvisionError::PermissionDenied { ref detail } => {
                assert!(detail.contains("memory/sp"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn other_io_errors_keep_their_cause() {
        let e = map_io_err(io::Error::from_raw_os_error(libc::ENOSPC),
                           String::from("mkdir"));
        assert!(matches!(e, ProvisionError::Io { .. }));
        assert!(!e.is_validation());
    }

    #[test]
    fn validation_errors_are_flagged() {
        assert!(ProvisionError::MissingTargetIdentity.is_validation());
        assert!(ProvisionError::UnknownIdentity("alice".into()).is_validation());
        assert!(!ProvisionError::PathNotFound("/data".into()).is_validation());
    }
}
