//! # Prompt Module
//!
//! The operator boundary. Stages that need a decision (date patterns,
//! confirmation, album priority) talk to a [`Prompt`] instead of the
//! terminal, so the whole pipeline can run headless.
//!
//! The CLI implements this trait over the console; tests use
//! [`ScriptedPrompt`].

use crate::error::PromptError;
use std::collections::VecDeque;

/// Question-and-answer port to the operator
pub trait Prompt {
    /// Ask for a line of input; the answer is returned trimmed
    fn ask(&mut self, label: &str) -> Result<String, PromptError>;

    /// Yes/no question. An empty answer takes `default`.
    fn confirm(&mut self, label: &str, default: bool) -> Result<bool, PromptError> {
        let answer = self.ask(&format!("{} {}", label, if default { "[Y/n]" } else { "[y/N]" }))?;
        Ok(parse_yes_no(&answer, default))
    }

    /// Present a line of information
    fn show(&mut self, line: &str);
}

/// Interpret a yes/no answer
pub fn parse_yes_no(answer: &str, default: bool) -> bool {
    match answer.trim().to_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    }
}

/// Replays queued answers and records everything shown.
///
/// Once the queue is exhausted every question gets an empty answer, which
/// the pipeline treats as "stop" or "use the default".
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    asked: Vec<String>,
    shown: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
            shown: Vec::new(),
        }
    }

    /// Labels of every question asked, in order
    pub fn asked(&self) -> &[String] {
        &self.asked
    }

    /// Every line shown, in order
    pub fn shown(&self) -> &[String] {
        &self.shown
    }

    /// Answers not consumed yet
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompt for ScriptedPrompt {
    fn ask(&mut self, label: &str) -> Result<String, PromptError> {
        self.asked.push(label.to_string());
        Ok(self
            .answers
            .pop_front()
            .map(|a| a.trim().to_string())
            .unwrap_or_default())
    }

    fn show(&mut self, line: &str) {
        self.shown.push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_answers_replay_in_order() {
        let mut prompt = ScriptedPrompt::new(["first", "  second  "]);
        assert_eq!(prompt.ask("a").unwrap(), "first");
        assert_eq!(prompt.ask("b").unwrap(), "second");
        assert_eq!(prompt.ask("c").unwrap(), "");
        assert_eq!(prompt.asked(), &["a", "b", "c"]);
    }

    #[test]
    fn confirm_uses_default_on_empty() {
        let mut prompt = ScriptedPrompt::new(["", "YES", "nope"]);
        assert!(prompt.confirm("keep?", true).unwrap());
        assert!(prompt.confirm("keep?", false).unwrap());
        assert!(!prompt.confirm("keep?", true).unwrap());
        assert!(prompt.asked()[0].ends_with("[Y/n]"));
    }

    #[test]
    fn shown_lines_are_recorded() {
        let mut prompt = ScriptedPrompt::default();
        prompt.show("hello");
        assert_eq!(prompt.shown(), &["hello"]);
        assert_eq!(prompt.remaining(), 0);
    }
}
