/* Prepare a Windows account to run the sandbox.
 *
 * Copyright © 2026 Zack Weinberg
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 * http://www.apache.org/licenses/LICENSE-2.0
 * There is NO WARRANTY.
 *
 *     prepare-runner [--create-user NAME --password SECRET | --user NAME
 *                     | --current-user] [--runner [NAME]] [--dir PATH,...]
 *
 * --create-user adds a local account (left alone if it already exists).
 * --runner grants SeAssignPrimaryTokenPrivilege, SeTcbPrivilege and
 * SeIncreaseQuotaPrivilege, which the sandbox needs in order to start
 * processes as another account, to NAME or, without NAME, to the target
 * account (or the invoking account if there is none).  --dir gives the
 * target account access to each PATH; --rights full makes that full
 * control instead of read/write/create.
 *
 * Everything is validated before anything is changed, and the plan is
 * shown for confirmation unless -y is given.  Privilege changes only
 * take effect for new logon sessions, so a restart is needed afterward.
 *
 * This program must be run from an elevated (administrator) prompt.
 * Built for anything but Windows it can only look up accounts.
 */

extern crate sp_provision;

use std::io;
use std::process;

use std::io::Write;

use sp_provision::request::{request_from_matches, runner_app};
use sp_provision::{logging, platform};
use sp_provision::{FixedAnswer, Orchestrator, Outcome, ProvisionError, TerminalPrompt};

fn run() -> Result<Outcome, ProvisionError> {
    let matches = runner_app().get_matches();
    let req = request_from_matches(&matches)?;
    logging::init(req.verbose);

    let mut host = platform::host();
    if req.assume_yes {
        Orchestrator::new(&mut host, &mut FixedAnswer(true)).run(&req)
    } else {
        Orchestrator::new(&mut host, &mut TerminalPrompt).run(&req)
    }
}

fn main() {
    process::exit(match run() {
        Ok(outcome) => {
            for line in outcome.report() {
                println!("{}", line);
            }
            0
        }
        Err(e) => {
            let _ = writeln!(io::stderr(), "prepare-runner: {}", e);
            1
        }
    });
}
