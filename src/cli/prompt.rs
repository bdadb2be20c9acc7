//! Console implementation of the operator prompt.

use console::{style, Term};
use indicatif::ProgressBar;
use std::io::{self, BufRead};
use takeout_organizer::core::prompt::Prompt;
use takeout_organizer::error::PromptError;

/// Prompt over the controlling terminal.
///
/// Output is drawn while the progress bar is suspended so the two never
/// interleave. Piped input is read line by line from stdin; end of input
/// answers every question with an empty line.
pub struct TerminalPrompt {
    term: Term,
    progress: ProgressBar,
}

impl TerminalPrompt {
    pub fn new(progress: ProgressBar) -> Self {
        Self {
            term: Term::stdout(),
            progress,
        }
    }

    /// Ask for a path, falling back to `default` on an empty answer
    pub fn ask_path(&mut self, label: &str, default: &str) -> Result<String, PromptError> {
        let answer = self.ask(&format!("{} [{}]", label, default))?;
        if answer.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(answer)
        }
    }

    fn read_answer(term: &Term) -> io::Result<String> {
        if term.is_term() {
            return term.read_line();
        }
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    }
}

impl Prompt for TerminalPrompt {
    fn ask(&mut self, label: &str) -> Result<String, PromptError> {
        let term = &self.term;
        let answer = self.progress.suspend(|| {
            term.write_str(&format!("{} ", style(format!("{}:", label)).bold()))?;
            term.flush()?;
            Self::read_answer(term)
        })?;
        Ok(answer.trim().to_string())
    }

    fn show(&mut self, line: &str) {
        let term = &self.term;
        self.progress.suspend(|| {
            term.write_line(line).ok();
        });
    }
}
