//! Command-line requests that must be refused before the host is
//! touched.  They run against the real platform, so nothing here may
//! get past validation.

extern crate clap;
extern crate sp_provision;

use sp_provision::request::{request_from_matches, runner_app};
use sp_provision::{platform, FixedAnswer, Orchestrator, ProvisionError};

fn refuse(args: &[&str]) -> ProvisionError {
    let mut argv = vec!["prepare-runner"];
    argv.extend_from_slice(args);
    let m = runner_app().get_matches_from_safe(argv).unwrap();
    let req = request_from_matches(&m).unwrap();
    let mut host = platform::host();
    let err = Orchestrator::new(&mut host, &mut FixedAnswer(false))
        .run(&req)
        .unwrap_err();
    assert!(err.is_validation(), "{:?} is not a validation error", err);
    err
}

#[test]
fn create_user_without_password() {
    match refuse(&["--create-user", "bob"]) {
        ProvisionError::MissingCredential(name) => assert_eq!(name, "bob"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn unknown_explicit_user() {
    match refuse(&["--user", "no-such-account-sp-provision"]) {
        ProvisionError::UnknownIdentity(name) => {
            assert_eq!(name, "no-such-account-sp-provision")
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn directories_without_target() {
    assert!(matches!(refuse(&["--dir", "/data/in,/data/out"]),
                     ProvisionError::MissingTargetIdentity));
}

#[test]
fn unknown_runner() {
    let err = refuse(&["--runner", "no-such-account-sp-provision"]);
    assert!(matches!(err, ProvisionError::UnknownIdentity(_)
                          | ProvisionError::Unsupported(_)), "{:?}", err);
}

#[test]
fn help_is_not_a_request() {
    let err = runner_app().get_matches_from_safe(vec!["prepare-runner", "--help"])
        .unwrap_err();
    assert_eq!(err.kind, clap::ErrorKind::HelpDisplayed);
}
