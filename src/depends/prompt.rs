//! Yes/no confirmation behind a trait, so the pipeline runs without a terminal.

use owo_colors::OwoColorize;
use std::io::{BufRead, IsTerminal, Write};

pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Asks on stdin. Anything but `y`/`yes` is a no, and so is a non-interactive stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            return false;
        }

        print!("{} {} [y/N] ", "::".cyan(), prompt);
        let _ = std::io::stdout().flush();

        let mut answer = String::new();
        if stdin.lock().read_line(&mut answer).is_err() {
            return false;
        }
        parse_answer(&answer)
    }
}

/// Answers every prompt the same way (`--yes`, `--keep-archives`, tests).
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

fn parse_answer(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
