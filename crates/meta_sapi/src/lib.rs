//! PHP meta-SAPI host
//!
//! Implements the host side of the runtime's SAPI contract:
//! - Native string arena for every address handed to the runtime
//! - Host adapter (module descriptor and its hook table)
//! - Lifecycle controller with a per-line request bracket
//!
//! The runtime is reached only through the [`Engine`] trait, implemented for
//! [`meta_ffi::PhpLibrary`].

pub mod adapter;
pub mod arena;
pub mod engine;
pub mod lifecycle;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use arena::{ArenaError, NativeStr, StringArena};
pub use engine::Engine;
pub use lifecycle::{
    wrap_inline, EvalOutcome, HostConfig, Lifecycle, LifecycleError, LifecycleState, Request,
    DEFAULT_EVAL_NAME, DEFAULT_INI_ENTRIES,
};

pub use meta_ffi;

/// Host version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
