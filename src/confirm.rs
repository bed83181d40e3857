//! Asking the operator before anything is changed.

use std::io::{self, BufRead, Write};

use crate::err::*;

pub trait ConfirmationSource {
    /// Show `prompt` and return the operator's yes/no decision.
    fn confirm(&mut self, prompt: &str) -> Result<bool, ProvisionError>;
}

/// Asks on the controlling terminal.  Blocks until a line is read;
/// EOF counts as "no".
pub struct TerminalPrompt;

impl ConfirmationSource for TerminalPrompt {
    fn confirm(&mut self, prompt: &str) -> Result<bool, ProvisionError> {
        let stdin = io::stdin();
        let mut stderr = io::stderr();
        write!(stderr, "{}\nProceed? [y/N] ", prompt)
            .and_then(|_| stderr.flush())
            .map_err(|e| map_io_err(e, String::from("stderr")))?;

        let mut line = String::new();
        stdin.lock().read_line(&mut line)
            .map_err(|e| map_io_err(e, String::from("stdin")))?;
        Ok(is_yes(&line))
    }
}

/// Always gives the same answer.  `FixedAnswer(true)` backs --yes.
pub struct FixedAnswer(pub bool);

impl ConfirmationSource for FixedAnswer {
    fn confirm(&mut self, _prompt: &str) -> Result<bool, ProvisionError> {
        Ok(self.0)
    }
}

fn is_yes(answer: &str) -> bool {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_explicit_yes_counts() {
        assert!(is_yes("y\n"));
        assert!(is_yes("  YES \n"));
        assert!(!is_yes("\n"));
        assert!(!is_yes(""));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn fixed_answer_ignores_prompt() {
        assert!(FixedAnswer(true).confirm("anything").unwrap());
        assert!(!FixedAnswer(false).confirm("anything").unwrap());
    }
}
