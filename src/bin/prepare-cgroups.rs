/* Create the cgroups the sandbox puts its processes into.
 *
 * Copyright © 2026 Zack Weinberg
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 * http://www.apache.org/licenses/LICENSE-2.0
 * There is NO WARRANTY.
 *
 *     prepare-cgroups [-y] [-v]
 *
 * creates /sys/fs/cgroup/SUBSYSTEM/sp for each of blkio, cpuacct,
 * memory, pids and freezer, and hands each of them, recursively, to
 * the invoking user (the user who ran sudo, when run through sudo).
 * Directories that already exist are kept, but their ownership is
 * reapplied.  The first failure stops the run.
 *
 * The cgroup filesystem is not persistent: run this again after every
 * reboot.  It needs superuser privileges.
 */

extern crate sp_provision;

use std::io;
use std::process;

use std::io::Write;

use sp_provision::cgroup::DEFAULT_GROUP;
use sp_provision::request::{cgroup_request_from_matches, cgroups_app};
use sp_provision::{logging, platform};
use sp_provision::{FixedAnswer, Orchestrator, Outcome, ProvisionError, TerminalPrompt};

fn run() -> Result<Outcome, ProvisionError> {
    let matches = cgroups_app().get_matches();
    let req = cgroup_request_from_matches(&matches, DEFAULT_GROUP)?;
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
            let _ = writeln!(io::stderr(), "prepare-cgroups: {}", e);
            1
        }
    });
}
