//! REPL driver
//!
//! Per line: read, stop on `quit`/`exit`/end of input, open a request, run the
//! line as a script if it names an existing path or as inline code otherwise,
//! add it to the history when it is not blank, and close the request.

use crate::line_source::{LineSource, ReadOutcome};
use meta_sapi::{Engine, EvalOutcome, Lifecycle, LifecycleError};
use meta_services::History;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    EndOfInput,
    /// `quit` or `exit`.
    Keyword(String),
    Interrupted,
    ReadFailed(String),
}

/// How a line will be run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    Script(&'a Path),
    Inline(&'a str),
}

/// Result of one handled line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Script { completed: bool },
    Inline(EvalOutcome),
    /// The runtime refused to open the request; nothing ran.
    RequestFailed,
}

/// Exact, case-sensitive match.
pub fn is_exit_keyword(line: &str) -> bool {
    matches!(line, "quit" | "exit")
}

/// An existing path always wins over inline code.
pub fn classify(line: &str) -> Input<'_> {
    let path = Path::new(line);
    if !line.is_empty() && path.exists() {
        Input::Script(path)
    } else {
        Input::Inline(line)
    }
}

pub struct Repl<'a, E: Engine, S: LineSource> {
    lifecycle: &'a mut Lifecycle<E>,
    source: S,
    history: &'a mut History,
    prompt: String,
    lines_handled: usize,
}

impl<'a, E: Engine, S: LineSource> Repl<'a, E, S> {
    pub fn new(
        lifecycle: &'a mut Lifecycle<E>,
        source: S,
        history: &'a mut History,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            lifecycle,
            source,
            history,
            prompt: prompt.into(),
            lines_handled: 0,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn lines_handled(&self) -> usize {
        self.lines_handled
    }

    /// Loop until a terminating input. Only lifecycle misuse is an error;
    /// failures inside the runtime are its own to report.
    pub fn run(&mut self) -> Result<Termination, ReplError> {
        loop {
            let line = match self.source.read_line(&self.prompt) {
                ReadOutcome::Line(line) => line,
                ReadOutcome::EndOfInput => return Ok(Termination::EndOfInput),
                ReadOutcome::Interrupted => return Ok(Termination::Interrupted),
                ReadOutcome::Failed(reason) => {
                    tracing::warn!(%reason, "reading input failed");
                    return Ok(Termination::ReadFailed(reason));
                }
            };

            if is_exit_keyword(&line) {
                return Ok(Termination::Keyword(line));
            }

            self.handle_line(&line)?;
        }
    }

    /// Run one line inside its own request cycle.
    pub fn handle_line(&mut self, line: &str) -> Result<LineOutcome, ReplError> {
        self.lines_handled += 1;
        let mut request = match self.lifecycle.begin_request() {
            Ok(request) => request,
            Err(LifecycleError::RequestStartup) => {
                record(self.history, &mut self.source, line);
                return Ok(LineOutcome::RequestFailed);
            }
            Err(err) => return Err(err.into()),
        };

        let outcome = match classify(line) {
            Input::Script(path) => LineOutcome::Script {
                completed: request.execute_file(path)?,
            },
            Input::Inline(code) => LineOutcome::Inline(request.eval(code)),
        };
        tracing::debug!(line = self.lines_handled, ?outcome, "handled line");

        record(self.history, &mut self.source, line);
        drop(request);
        Ok(outcome)
    }
}

fn record<S: LineSource>(history: &mut History, source: &mut S, line: &str) {
    if !line.trim().is_empty() {
        history.add(line);
        source.remember(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meta_sapi::testing::{Call, RecordingEngine};
    use meta_sapi::meta_ffi::FAILURE;
    use meta_sapi::HostConfig;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Scripted {
        pending: VecDeque<ReadOutcome>,
        remembered: Vec<String>,
    }

    impl Scripted {
        fn lines(lines: &[&str]) -> Self {
            Self {
                pending: lines
                    .iter()
                    .map(|line| ReadOutcome::Line(line.to_string()))
                    .collect(),
                remembered: Vec::new(),
            }
        }
    }

    impl LineSource for Scripted {
        fn read_line(&mut self, _prompt: &str) -> ReadOutcome {
            self.pending.pop_front().unwrap_or(ReadOutcome::EndOfInput)
        }

        fn remember(&mut self, line: &str) {
            self.remembered.push(line.to_string());
        }
    }

    fn started(engine: RecordingEngine) -> Lifecycle<RecordingEngine> {
        let mut lifecycle = Lifecycle::new(engine, HostConfig::default()).unwrap();
        lifecycle.startup().unwrap();
        lifecycle.engine().clear();
        lifecycle
    }

    fn scratch_history() -> (tempfile::TempDir, History) {
        let dir = tempfile::tempdir().unwrap();
        let history = History::empty(dir.path().join(".php-meta-sapi-history"));
        (dir, history)
    }

    #[test]
    fn keywords_stop_without_running() {
        for keyword in ["quit", "exit"] {
            let mut lifecycle = started(RecordingEngine::new());
            let (_dir, mut history) = scratch_history();
            let mut repl = Repl::new(
                &mut lifecycle,
                Scripted::lines(&[keyword, "1+1"]),
                &mut history,
                "> ",
            );

            assert_eq!(repl.run().unwrap(), Termination::Keyword(keyword.to_string()));
            assert_eq!(repl.lines_handled(), 0);
            drop(repl);
            assert!(lifecycle.engine().calls().is_empty());
            assert!(history.entries().is_empty());
        }
    }

    #[test]
    fn keywords_are_case_sensitive() {
        assert!(is_exit_keyword("quit"));
        assert!(!is_exit_keyword("Quit"));
        assert!(!is_exit_keyword(" exit"));
        assert!(!is_exit_keyword("exit;"));
    }

    #[test]
    fn end_of_input_and_interrupts_are_distinct() {
        let mut lifecycle = started(RecordingEngine::new());
        let (_dir, mut history) = scratch_history();

        let source = Scripted::default();
        assert_eq!(
            Repl::new(&mut lifecycle, source, &mut history, "> ").run().unwrap(),
            Termination::EndOfInput
        );

        let mut source = Scripted::default();
        source.pending.push_back(ReadOutcome::Interrupted);
        assert_eq!(
            Repl::new(&mut lifecycle, source, &mut history, "> ").run().unwrap(),
            Termination::Interrupted
        );

        let mut source = Scripted::default();
        source.pending.push_back(ReadOutcome::Failed("tty gone".to_string()));
        assert_eq!(
            Repl::new(&mut lifecycle, source, &mut history, "> ").run().unwrap(),
            Termination::ReadFailed("tty gone".to_string())
        );
    }

    #[test]
    fn inline_expression_is_evaluated_and_dumped() {
        let mut lifecycle = started(RecordingEngine::new());
        let (_dir, mut history) = scratch_history();
        let mut repl = Repl::new(&mut lifecycle, Scripted::default(), &mut history, "> ");

        let outcome = repl.handle_line("1+1").unwrap();
        assert!(matches!(
            outcome,
            LineOutcome::Inline(EvalOutcome { dumped: true, .. })
        ));
        drop(repl);

        let engine = lifecycle.engine();
        assert_eq!(engine.output(), "int(2)\n");
        assert_eq!(
            engine.calls(),
            vec![
                Call::RequestStartup,
                Call::EvalString {
                    code: "(function() {\n1+1;\n})()".to_string(),
                    name: "php_meta_sapi".to_string(),
                },
                Call::TypeName,
                Call::VarDump,
                Call::RequestShutdown,
            ]
        );
        assert_eq!(history.entries(), ["1+1"]);
    }

    #[test]
    fn empty_line_still_brackets_a_request() {
        let mut lifecycle = started(RecordingEngine::new());
        let (_dir, mut history) = scratch_history();
        let mut repl = Repl::new(&mut lifecycle, Scripted::lines(&["", "   "]), &mut history, "> ");

        assert_eq!(repl.run().unwrap(), Termination::EndOfInput);
        assert!(repl.source().remembered.is_empty());
        drop(repl);

        let engine = lifecycle.engine();
        assert_eq!(engine.count(|c| *c == Call::RequestStartup), 2);
        assert_eq!(engine.count(|c| *c == Call::RequestShutdown), 2);
        assert!(history.entries().is_empty());
    }

    #[test]
    fn existing_path_runs_as_script_even_if_it_fails() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("script.php");
        std::fs::write(&script, "<?php this is not valid").unwrap();
        let line = script.to_str().unwrap().to_string();

        for completes in [true, false] {
            let mut engine = RecordingEngine::new();
            engine.execute_completes = completes;
            let mut lifecycle = started(engine);
            let (_history_dir, mut history) = scratch_history();
            let mut repl = Repl::new(&mut lifecycle, Scripted::default(), &mut history, "> ");

            assert_eq!(
                repl.handle_line(&line).unwrap(),
                LineOutcome::Script { completed: completes }
            );
            drop(repl);

            let engine = lifecycle.engine();
            assert_eq!(
                engine.calls(),
                vec![
                    Call::RequestStartup,
                    Call::StreamInitFilename { path: line.clone() },
                    Call::ExecuteScript,
                    Call::DestroyFileHandle,
                    Call::RequestShutdown,
                ]
            );
            assert_eq!(history.entries(), [line.clone()]);
        }
    }

    #[test]
    fn missing_path_is_inline_code() {
        assert_eq!(
            classify("./definitely-not-here.php"),
            Input::Inline("./definitely-not-here.php")
        );
        assert_eq!(classify(""), Input::Inline(""));
    }

    #[test]
    fn history_keeps_accepted_lines_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".php-meta-sapi-history");
        std::fs::write(&path, "echo 'earlier'\n").unwrap();
        let mut history = History::load(&path).unwrap();

        let mut lifecycle = started(RecordingEngine::new());
        let lines = ["$a = 1", "", "  return $a ", "$a = 1", "exit", "never"];
        let mut repl = Repl::new(&mut lifecycle, Scripted::lines(&lines), &mut history, "> ");
        assert_eq!(repl.run().unwrap(), Termination::Keyword("exit".to_string()));
        assert_eq!(repl.source().remembered, ["$a = 1", "  return $a ", "$a = 1"]);
        drop(repl);

        history.save().unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "echo 'earlier'\n$a = 1\n  return $a \n$a = 1\n"
        );
    }

    #[test]
    fn refused_request_moves_on_to_the_next_line() {
        let mut engine = RecordingEngine::new();
        engine.request_startup_status = FAILURE;
        let mut lifecycle = started(engine);
        let (_dir, mut history) = scratch_history();
        let mut repl = Repl::new(
            &mut lifecycle,
            Scripted::lines(&["1+1", "2+2"]),
            &mut history,
            "> ",
        );

        assert_eq!(repl.run().unwrap(), Termination::EndOfInput);
        assert_eq!(repl.lines_handled(), 2);
        drop(repl);

        let engine = lifecycle.engine();
        assert_eq!(engine.count(|c| *c == Call::RequestStartup), 2);
        assert_eq!(engine.count(|c| *c == Call::RequestShutdown), 0);
        assert_eq!(engine.count(|c| matches!(c, Call::EvalString { .. })), 0);
        assert_eq!(history.entries(), ["1+1", "2+2"]);
    }

    #[test]
    fn handling_lines_before_startup_is_an_error() {
        let mut lifecycle = Lifecycle::new(RecordingEngine::new(), HostConfig::default()).unwrap();
        let (_dir, mut history) = scratch_history();
        let mut repl = Repl::new(&mut lifecycle, Scripted::lines(&["1+1"]), &mut history, "> ");
        assert!(matches!(
            repl.run(),
            Err(ReplError::Lifecycle(LifecycleError::InvalidTransition { .. }))
        ));
    }
}
