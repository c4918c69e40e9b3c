//! Confirmation gate for destructive operations
//!
//! Dropping a whole table asks for `y`; deleting rows asks for the full word
//! `yes`. Answers are compared case-insensitively after removing the line
//! terminator, and anything else declines.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Answer that confirms dropping a table folder
pub const TABLE_DELETE_TOKEN: &str = "y";
/// Answer that confirms deleting selected rows
pub const ROW_DELETE_TOKEN: &str = "yes";

/// Something that can show text to an operator and read an answer back
pub trait Prompter: Send + Sync {
    /// Display informational text
    fn show(&self, text: &str);

    /// Ask a question and return the raw answer line
    fn ask(&self, question: &str) -> io::Result<String>;
}

/// How destructive operations are confirmed
pub enum ConfirmationPolicy {
    /// Ask an operator
    Prompt(Box<dyn Prompter>),
    /// Approve everything without asking
    AssumeYes,
    /// Decline everything without asking
    AssumeNo,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        ConfirmationPolicy::AssumeNo
    }
}

impl std::fmt::Debug for ConfirmationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfirmationPolicy::Prompt(_) => write!(f, "Prompt"),
            ConfirmationPolicy::AssumeYes => write!(f, "AssumeYes"),
            ConfirmationPolicy::AssumeNo => write!(f, "AssumeNo"),
        }
    }
}

impl ConfirmationPolicy {
    /// Policy that asks through the given prompter
    pub fn prompt(prompter: impl Prompter + 'static) -> Self {
        ConfirmationPolicy::Prompt(Box::new(prompter))
    }

    /// Ask `question`; true only if the answer equals `token`
    pub fn confirm(&self, question: &str, token: &str) -> io::Result<bool> {
        match self {
            ConfirmationPolicy::Prompt(prompter) => {
                let answer = prompter.ask(question)?;
                Ok(answer_matches(&answer, token))
            }
            ConfirmationPolicy::AssumeYes => {
                tracing::info!(question, "confirmation assumed");
                Ok(true)
            }
            ConfirmationPolicy::AssumeNo => {
                tracing::info!(question, "confirmation declined without prompting");
                Ok(false)
            }
        }
    }

    /// Show text to the operator, if there is one
    pub fn show(&self, text: &str) {
        if let ConfirmationPolicy::Prompt(prompter) = self {
            prompter.show(text);
        }
    }
}

fn answer_matches(answer: &str, token: &str) -> bool {
    answer
        .trim_end_matches(['\r', '\n'])
        .eq_ignore_ascii_case(token)
}

/// Interactive prompter on stderr/stdin
pub struct ConsolePrompter {
    color_choice: ColorChoice,
}

impl ConsolePrompter {
    pub fn new() -> Self {
        Self {
            color_choice: ColorChoice::Auto,
        }
    }

    pub fn with_color_choice(color_choice: ColorChoice) -> Self {
        Self { color_choice }
    }
}

impl Default for ConsolePrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for ConsolePrompter {
    fn show(&self, text: &str) {
        let mut stderr = StandardStream::stderr(self.color_choice);
        let _ = write!(stderr, "{}", text);
        if !text.ends_with('\n') {
            let _ = writeln!(stderr);
        }
    }

    fn ask(&self, question: &str) -> io::Result<String> {
        let mut stderr = StandardStream::stderr(self.color_choice);
        stderr.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
        write!(stderr, "{}", question)?;
        stderr.reset()?;
        stderr.flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(answer)
    }
}

#[derive(Debug, Default)]
struct Script {
    answers: VecDeque<String>,
    transcript: Vec<String>,
}

/// Prompter replaying canned answers; declines once the answers run out.
/// Clones share the same script and transcript.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompter {
    script: Arc<Mutex<Script>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Arc::new(Mutex::new(Script {
                answers: answers.into_iter().map(Into::into).collect(),
                transcript: Vec::new(),
            })),
        }
    }

    /// Everything shown or asked so far, in order
    pub fn transcript(&self) -> Vec<String> {
        self.script.lock().transcript.clone()
    }

    /// Answers not consumed yet
    pub fn remaining(&self) -> usize {
        self.script.lock().answers.len()
    }
}

impl Prompter for ScriptedPrompter {
    fn show(&self, text: &str) {
        self.script.lock().transcript.push(text.to_string());
    }

    fn ask(&self, question: &str) -> io::Result<String> {
        let mut script = self.script.lock();
        script.transcript.push(question.to_string());
        Ok(script.answers.pop_front().unwrap_or_default())
    }
}
