//! Environment discovery for the embedded PHP runtime
//!
//! Locates the install prefix and shared library of the runtime by asking the
//! runtime's own configuration-query command.

pub mod locate;

pub use locate::{library_path_for_prefix, locate_library, query_prefix, LocateError};
