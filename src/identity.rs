//! Resolution and creation of the local account that sandboxed
//! programs will run under.

use std::fmt;

use tracing::{debug, info};

use crate::err::*;

/// A named local security principal.
///
/// Only the resolver hands out identities with `exists() == true`;
/// everything that grants rights to an account insists on one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    name: String,
    exists: bool,
}

impl Identity {
    /// An identity that has not been looked up.  Useless for granting
    /// anything; grant operations reject it with `UnknownIdentity`.
    pub fn unresolved<S: Into<String>>(name: S) -> Identity {
        Identity { name: name.into(), exists: false }
    }

    pub(crate) fn resolved<S: Into<String>>(name: S) -> Identity {
        Identity { name: name.into(), exists: true }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Fail with `UnknownIdentity` unless this identity was resolved.
    pub fn require_exists(&self) -> Result<&Identity, ProvisionError> {
        if self.exists {
            Ok(self)
        } else {
            Err(ProvisionError::UnknownIdentity(self.name.clone()))
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Password for a new account.  Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new<S: Into<String>>(secret: S) -> Credential {
        Credential(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Credential(****)")
    }
}

/// Where the target identity comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentityRequest {
    /// The account of the operator running this program.
    Session,
    /// An account that must already exist.
    Existing(String),
    /// An account to be created unless it already exists.
    Create { name: String, credential: Option<Credential> },
}

impl IdentityRequest {
    /// The pure pre-check: creation without a credential is refused
    /// before the identity store is even queried.
    pub fn validate(&self) -> Result<(), ProvisionError> {
        match *self {
            IdentityRequest::Create { ref name, credential: None } => {
                Err(ProvisionError::MissingCredential(name.clone()))
            }
            _ => Ok(()),
        }
    }

    pub fn describe(&self) -> String {
        match *self {
            IdentityRequest::Session => String::from("the current account"),
            IdentityRequest::Existing(ref n) => format!("account '{}'", n),
            IdentityRequest::Create { ref name, .. } => {
                format!("account '{}' (created if absent)", name)
            }
        }
    }
}

/// The host's account database, as far as this program needs it.
pub trait IdentityStore {
    /// Does an account with this name exist?
    fn exists(&self, name: &str) -> Result<bool, ProvisionError>;

    /// Durably add a new local account.
    fn create(&mut self, name: &str, credential: &Credential)
              -> Result<(), ProvisionError>;

    /// Name of the account the operator is running as.
    fn session_identity(&self) -> Result<String, ProvisionError>;
}

pub struct IdentityResolver<'a> {
    store: &'a mut dyn IdentityStore,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(store: &'a mut dyn IdentityStore) -> IdentityResolver<'a> {
        IdentityResolver { store: store }
    }

    /// Look up an existing account without ever creating one.
    pub fn resolve(&self, name: &str) -> Result<Identity, ProvisionError> {
        if self.store.exists(name)? {
            debug!(account = name, "account exists");
            Ok(Identity::resolved(name))
        } else {
            Err(ProvisionError::UnknownIdentity(String::from(name)))
        }
    }

    pub fn resolve_or_create(&mut self, request: &IdentityRequest)
                             -> Result<Identity, ProvisionError> {
        request.validate()?;
        match *request {
            IdentityRequest::Session => {
                let name = self.store.session_identity()?;
                self.resolve(&name)
            }
            IdentityRequest::Existing(ref name) => self.resolve(name),
            IdentityRequest::Create { ref name, ref credential } => {
                if self.store.exists(name)? {
                    info!(account = name.as_str(),
                          "account already exists, not creating it");
                    return Ok(Identity::resolved(name.as_str()));
                }
                // validate() has already rejected a missing credential.
                let credential = match *credential {
                    Some(ref c) => c,
                    None => {
                        return Err(ProvisionError::MissingCredential(
                            name.clone()))
                    }
                };
                self.store.create(name, credential)?;
                info!(account = name.as_str(), "created account");
                Ok(Identity::resolved(name.as_str()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryHost;

    #[test]
    fn create_without_credential_leaves_store_unchanged() {
        let mut host = MemoryHost::new("operator");
        let req = IdentityRequest::Create { name: "bob".into(), credential: None };
        let err = IdentityResolver::new(&mut host).resolve_or_create(&req);
        assert!(matches!(err, Err(ProvisionError::MissingCredential(ref n)) if n == "bob"));
        assert!(!host.has_user("bob"));
        assert_eq!(host.mutations(), 0);
    }

    #[test]
    fn create_adds_account() {
        let mut host = MemoryHost::new("operator");
        let req = IdentityRequest::Create {
            name: "bob".into(),
            credential: Some(Credential::new("x")),
        };
        let id = IdentityResolver::new(&mut host).resolve_or_create(&req).unwrap();
        assert_eq!(id.name(), "bob");
        assert!(id.exists());
        assert!(host.has_user("bob"));
        assert_eq!(host.password_of("bob"), Some("x"));
    }

    #[test]
    fn create_of_existing_account_does_not_mutate() {
        let mut host = MemoryHost::new("operator").with_user("bob");
        let req = IdentityRequest::Create {
            name: "bob".into(),
            credential: Some(Credential::new("new")),
        };
        let id = IdentityResolver::new(&mut host).resolve_or_create(&req).unwrap();
        assert!(id.exists());
        assert_eq!(host.mutations(), 0);
    }

    #[test]
    fn unknown_existing_account_is_rejected() {
        let mut host = MemoryHost::new("operator");
        let req = IdentityRequest::Existing("alice".into());
        let err = IdentityResolver::new(&mut host).resolve_or_create(&req);
        assert!(matches!(err, Err(ProvisionError::UnknownIdentity(ref n)) if n == "alice"));
        assert_eq!(host.mutations(), 0);
    }

    #[test]
    fn session_identity_is_the_default() {
        let mut host = MemoryHost::new("operator");
        let id = IdentityResolver::new(&mut host)
            .resolve_or_create(&IdentityRequest::Session)
            .unwrap();
        assert_eq!(id, Identity::resolved("operator"));
    }

    #[test]
    fn unresolved_identity_fails_require_exists() {
        let id = Identity::unresolved("ghost");
        assert!(matches!(id.require_exists(),
                         Err(ProvisionError::UnknownIdentity(_))));
    }

    #[test]
    fn credential_debug_is_redacted() {
        let c = Credential::new("hunter2");
        assert!(!format!("{:?}", c).contains("hunter2"));
    }
}
