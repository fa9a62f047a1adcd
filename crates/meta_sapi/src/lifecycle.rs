//! Lifecycle controller
//!
//! Drives the runtime through
//! `Unstarted -> SignalsArmed -> HostTableRegistered -> GlobalStartupDone ->
//! (RequestActive <-> RequestIdle)* -> GlobalShutdownDone`.
//! A [`Request`] is the only way to execute anything, and dropping it always
//! closes the cycle it opened.

use crate::adapter::HostModule;
use crate::arena::ArenaError;
use crate::engine::Engine;
use meta_ffi::{FileHandle, SapiModule, Zval, SUCCESS};
use std::ffi::{CStr, CString};
use std::fmt;
use std::path::Path;
use std::ptr::NonNull;
use thiserror::Error;

/// Written newline-delimited into `ini_entries` at global startup.
pub const DEFAULT_INI_ENTRIES: &str = "html_errors=0\n\
implicit_flush=1\n\
output_buffering=0\n\
max_execution_time=0\n\
max_input_time=-1\n";

/// Script name reported by the runtime for inline code.
pub const DEFAULT_EVAL_NAME: &str = "php_meta_sapi";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unstarted,
    SignalsArmed,
    HostTableRegistered,
    GlobalStartupDone,
    RequestActive,
    RequestIdle,
    GlobalShutdownDone,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cannot move from {from} to {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error("runtime module startup failed")]
    ModuleStartup,

    #[error("runtime request startup failed")]
    RequestStartup,

    #[error("script path {path:?} contains a NUL byte")]
    PathContainsNul { path: String },

    #[error(transparent)]
    Arena(#[from] ArenaError),
}

/// Values fixed for the life of the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub ini_entries: String,
    pub eval_name: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            ini_entries: DEFAULT_INI_ENTRIES.to_string(),
            eval_name: DEFAULT_EVAL_NAME.to_string(),
        }
    }
}

/// Result of evaluating one line of inline code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalOutcome {
    /// The evaluation call itself reported success.
    pub succeeded: bool,
    /// Runtime type name of the result, when there is one.
    pub type_name: Option<String>,
    /// A dump of the result was written to the output hook.
    pub dumped: bool,
}

/// Wrap a line in an immediately-invoked closure so it can be evaluated as
/// a single expression.
pub fn wrap_inline(line: &str) -> String {
    format!("(function() {{\n{line};\n}})()")
}

pub struct Lifecycle<E: Engine> {
    // Boxed, leaked and reclaimed in `Drop`: the runtime keeps this address.
    host: NonNull<HostModule<E>>,
    state: LifecycleState,
}

impl<E: Engine> Lifecycle<E> {
    /// Allocate and populate the module descriptor. Nothing is called on the
    /// runtime yet.
    pub fn new(engine: E, config: HostConfig) -> Result<Self, LifecycleError> {
        let host = HostModule::new(engine, config.ini_entries, &config.eval_name)?;
        Ok(Self {
            host: NonNull::from(Box::leak(host)),
            state: LifecycleState::Unstarted,
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn engine(&self) -> &E {
        // SAFETY: `host` stays allocated for as long as `self` lives.
        unsafe { &(*self.host.as_ptr()).engine }
    }

    /// Arm signals, register the descriptor, then run its `startup` hook.
    pub fn startup(&mut self) -> Result<(), LifecycleError> {
        self.require_state(LifecycleState::Unstarted, LifecycleState::SignalsArmed)?;
        let module = self.module_ptr();

        // SAFETY: `Unstarted` guarantees nothing has been called yet, and the
        // descriptor outlives the runtime's use of it.
        unsafe {
            self.engine().signal_startup();
            self.transition(LifecycleState::SignalsArmed);

            self.engine().sapi_startup(module);
            self.transition(LifecycleState::HostTableRegistered);

            let startup = (*module).startup;
            let status = match startup {
                Some(hook) => hook(module),
                None => meta_ffi::FAILURE,
            };
            if status != SUCCESS {
                tracing::error!(status, "module startup hook failed");
                return Err(LifecycleError::ModuleStartup);
            }
        }

        self.transition(LifecycleState::GlobalStartupDone);
        Ok(())
    }

    /// Open one request cycle. The returned guard closes it on drop.
    pub fn begin_request(&mut self) -> Result<Request<'_, E>, LifecycleError> {
        if !matches!(
            self.state,
            LifecycleState::GlobalStartupDone | LifecycleState::RequestIdle
        ) {
            return Err(LifecycleError::InvalidTransition {
                from: self.state,
                to: LifecycleState::RequestActive,
            });
        }

        // SAFETY: global startup has completed and no request is open.
        let status = unsafe { self.engine().request_startup() };
        if status != SUCCESS {
            tracing::warn!(status, "request startup failed");
            self.transition(LifecycleState::RequestIdle);
            return Err(LifecycleError::RequestStartup);
        }

        self.transition(LifecycleState::RequestActive);
        Ok(Request { lifecycle: self })
    }

    /// Module shutdown, then SAPI shutdown, then the arena. Steps whose
    /// startup counterpart never ran are skipped.
    pub fn shutdown(&mut self) -> Result<(), LifecycleError> {
        let from = self.state;
        match from {
            LifecycleState::GlobalShutdownDone | LifecycleState::RequestActive => {
                return Err(LifecycleError::InvalidTransition {
                    from,
                    to: LifecycleState::GlobalShutdownDone,
                });
            }
            _ => {}
        }

        // SAFETY: no request is open, and each call is paired with a
        // startup step that has already run.
        unsafe {
            if matches!(
                from,
                LifecycleState::GlobalStartupDone | LifecycleState::RequestIdle
            ) {
                self.engine().module_shutdown();
            }
            if !matches!(from, LifecycleState::Unstarted | LifecycleState::SignalsArmed) {
                self.engine().sapi_shutdown();
            }
            (*self.host.as_ptr()).arena.borrow_mut().release_all();
        }

        self.transition(LifecycleState::GlobalShutdownDone);
        Ok(())
    }

    fn module_ptr(&self) -> *mut SapiModule {
        // `descriptor` is the first field of the `repr(C)` host module.
        self.host.as_ptr().cast::<SapiModule>()
    }

    fn eval_name(&self) -> &CStr {
        // SAFETY: the arena backing `eval_name` is only released by
        // `shutdown`, which cannot run while a request borrows `self`.
        unsafe { CStr::from_ptr((*self.host.as_ptr()).eval_name.as_ptr()) }
    }

    fn require_state(
        &self,
        from: LifecycleState,
        to: LifecycleState,
    ) -> Result<(), LifecycleError> {
        if self.state == from {
            Ok(())
        } else {
            Err(LifecycleError::InvalidTransition {
                from: self.state,
                to,
            })
        }
    }

    fn transition(&mut self, to: LifecycleState) {
        tracing::debug!(from = %self.state, %to, "lifecycle transition");
        self.state = to;
    }
}

impl<E: Engine> Drop for Lifecycle<E> {
    fn drop(&mut self) {
        if self.state != LifecycleState::GlobalShutdownDone {
            if let Err(err) = self.shutdown() {
                tracing::warn!(%err, "shutdown on drop failed");
            }
        }
        // SAFETY: `host` came from `Box::leak` in `new` and is freed only here.
        drop(unsafe { Box::from_raw(self.host.as_ptr()) });
    }
}

/// One open request cycle.
pub struct Request<'a, E: Engine> {
    lifecycle: &'a mut Lifecycle<E>,
}

impl<E: Engine> Request<'_, E> {
    /// Run the script at `path`. The file handle is destroyed whether or not
    /// the script completed. Returns what the runtime reported.
    pub fn execute_file(&mut self, path: &Path) -> Result<bool, LifecycleError> {
        let filename = path_to_cstring(path)?;
        let engine = self.lifecycle.engine();
        let mut handle = FileHandle::default();

        // SAFETY: a request is open; the handle is initialised before use
        // and destroyed exactly once.
        let completed = unsafe {
            engine.stream_init_filename(&mut handle, &filename);
            let completed = engine.execute_script(&mut handle);
            engine.destroy_file_handle(&mut handle);
            completed
        };

        tracing::debug!(path = %path.display(), completed, "executed script");
        Ok(completed)
    }

    /// Evaluate `line` wrapped by [`wrap_inline`], dumping any non-null result.
    pub fn eval(&mut self, line: &str) -> EvalOutcome {
        let code = wrap_inline(line);
        let engine = self.lifecycle.engine();
        let name = self.lifecycle.eval_name();
        let mut value = Zval::default();

        // SAFETY: a request is open; `value` is a zeroed slot owned by this
        // frame, and its contents belong to the request's memory arena.
        unsafe {
            let status = engine.eval_string(code.as_bytes(), &mut value, name);
            if status != SUCCESS {
                tracing::debug!(status, "inline evaluation failed");
                return EvalOutcome {
                    succeeded: false,
                    type_name: None,
                    dumped: false,
                };
            }

            let type_name = engine.type_name(&value);
            let dumped = type_name != "null";
            if dumped {
                engine.var_dump(&mut value);
            }
            EvalOutcome {
                succeeded: true,
                type_name: Some(type_name),
                dumped,
            }
        }
    }
}

impl<E: Engine> Drop for Request<'_, E> {
    fn drop(&mut self) {
        // SAFETY: this guard is the only open request.
        unsafe { self.lifecycle.engine().request_shutdown() };
        self.lifecycle.transition(LifecycleState::RequestIdle);
    }
}

#[cfg(unix)]
fn path_to_cstring(path: &Path) -> Result<CString, LifecycleError> {
    use std::os::unix::ffi::OsStrExt;
    CString::new(path.as_os_str().as_bytes()).map_err(|_| LifecycleError::PathContainsNul {
        path: path.display().to_string(),
    })
}

#[cfg(not(unix))]
fn path_to_cstring(path: &Path) -> Result<CString, LifecycleError> {
    CString::new(path.to_string_lossy().into_owned()).map_err(|_| {
        LifecycleError::PathContainsNul {
            path: path.display().to_string(),
        }
    })
}
