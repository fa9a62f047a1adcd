//! Line input
//!
//! `LineSource` is the only place the REPL blocks. `EditorSource` backs it
//! with rustyline for editing and in-memory recall; persistence stays with
//! `meta_services::History`.

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// What a single read produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    EndOfInput,
    /// Ctrl-C at the prompt.
    Interrupted,
    Failed(String),
}

pub trait LineSource {
    /// Block until a line is available.
    fn read_line(&mut self, prompt: &str) -> ReadOutcome;

    /// Offer an accepted line for in-session recall.
    fn remember(&mut self, _line: &str) {}
}

pub struct EditorSource {
    editor: DefaultEditor,
}

impl EditorSource {
    /// Create an editor whose recall starts with `entries`, oldest first.
    pub fn new(entries: &[String]) -> Result<Self, ReadlineError> {
        let mut editor = DefaultEditor::new()?;
        for entry in entries {
            editor.add_history_entry(entry.as_str())?;
        }
        Ok(Self { editor })
    }
}

impl LineSource for EditorSource {
    fn read_line(&mut self, prompt: &str) -> ReadOutcome {
        match self.editor.readline(prompt) {
            Ok(line) => ReadOutcome::Line(line),
            Err(ReadlineError::Eof) => ReadOutcome::EndOfInput,
            Err(ReadlineError::Interrupted) => ReadOutcome::Interrupted,
            Err(err) => ReadOutcome::Failed(err.to_string()),
        }
    }

    fn remember(&mut self, line: &str) {
        if let Err(err) = self.editor.add_history_entry(line) {
            tracing::debug!(%err, "line editor rejected history entry");
        }
    }
}
