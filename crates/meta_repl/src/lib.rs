//! Meta-SAPI REPL
//!
//! Reads one line at a time, runs it as a script path or inline code inside
//! its own request cycle, and records it in the history.

pub mod driver;
pub mod line_source;

pub use driver::{classify, is_exit_keyword, Input, LineOutcome, Repl, ReplError, Termination};
pub use line_source::{EditorSource, LineSource, ReadOutcome};
