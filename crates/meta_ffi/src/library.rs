//! Shared library loading
//!
//! Every symbol is resolved when the library is opened. A missing one fails
//! the whole load; nothing is called until all of them are present.

use crate::abi::{FileHandle, ModuleHook, SapiModule, Zval};
use libloading::Library;
use std::ffi::{c_char, c_int, c_void};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BindError {
    #[error("failed to load runtime library {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("runtime library {path} does not export `{symbol}`: {source}")]
    MissingSymbol {
        path: PathBuf,
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },
}

/// Entry points of `libphp` used by the host.
#[derive(Clone, Copy)]
pub struct PhpApi {
    pub zend_signal_startup: unsafe extern "C" fn(),
    pub sapi_startup: unsafe extern "C" fn(module: *mut SapiModule),
    pub sapi_shutdown: unsafe extern "C" fn(),
    pub php_request_startup: unsafe extern "C" fn() -> c_int,
    pub php_request_shutdown: unsafe extern "C" fn(dummy: *mut c_void),
    pub php_module_startup:
        unsafe extern "C" fn(module: *mut SapiModule, additional_module: *mut c_void) -> c_int,
    pub php_module_shutdown: unsafe extern "C" fn(),
    pub php_module_shutdown_wrapper: ModuleHook,
    pub zend_eval_stringl_ex: unsafe extern "C" fn(
        code: *const c_char,
        code_len: usize,
        retval: *mut Zval,
        name: *const c_char,
        handle_exceptions: bool,
    ) -> c_int,
    pub zend_stream_init_filename:
        unsafe extern "C" fn(handle: *mut FileHandle, filename: *const c_char),
    pub php_execute_script: unsafe extern "C" fn(handle: *mut FileHandle) -> bool,
    pub zend_destroy_file_handle: unsafe extern "C" fn(handle: *mut FileHandle),
    pub php_var_dump: unsafe extern "C" fn(value: *mut Zval, level: c_int),
    pub zend_zval_type_name: unsafe extern "C" fn(value: *const Zval) -> *const c_char,
}

/// An opened `libphp` with its entry points bound.
pub struct PhpLibrary {
    api: PhpApi,
    path: PathBuf,
    // Unloading invalidates every pointer in `api`; keep it last so it drops last.
    _library: Library,
}

impl PhpLibrary {
    /// Open the library at `path` and bind every entry point.
    ///
    /// # Safety
    /// Loading runs the library's initialisers. `path` must name a build of
    /// the PHP embed SAPI whose exported signatures match [`PhpApi`].
    pub unsafe fn open(path: &Path) -> Result<Self, BindError> {
        let library = Library::new(path).map_err(|source| BindError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let api = PhpApi {
            zend_signal_startup: symbol(&library, path, b"zend_signal_startup\0")?,
            sapi_startup: symbol(&library, path, b"sapi_startup\0")?,
            sapi_shutdown: symbol(&library, path, b"sapi_shutdown\0")?,
            php_request_startup: symbol(&library, path, b"php_request_startup\0")?,
            php_request_shutdown: symbol(&library, path, b"php_request_shutdown\0")?,
            php_module_startup: symbol(&library, path, b"php_module_startup\0")?,
            php_module_shutdown: symbol(&library, path, b"php_module_shutdown\0")?,
            php_module_shutdown_wrapper: symbol(&library, path, b"php_module_shutdown_wrapper\0")?,
            zend_eval_stringl_ex: symbol(&library, path, b"zend_eval_stringl_ex\0")?,
            zend_stream_init_filename: symbol(&library, path, b"zend_stream_init_filename\0")?,
            php_execute_script: symbol(&library, path, b"php_execute_script\0")?,
            zend_destroy_file_handle: symbol(&library, path, b"zend_destroy_file_handle\0")?,
            php_var_dump: symbol(&library, path, b"php_var_dump\0")?,
            zend_zval_type_name: symbol(&library, path, b"zend_zval_type_name\0")?,
        };

        tracing::info!(library = %path.display(), "bound runtime library");

        Ok(Self {
            api,
            path: path.to_path_buf(),
            _library: library,
        })
    }

    pub fn api(&self) -> &PhpApi {
        &self.api
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

unsafe fn symbol<T: Copy>(
    library: &Library,
    path: &Path,
    name: &'static [u8],
) -> Result<T, BindError> {
    library
        .get::<T>(name)
        .map(|sym| *sym)
        .map_err(|source| BindError::MissingSymbol {
            path: path.to_path_buf(),
            symbol: symbol_name(name),
            source,
        })
}

fn symbol_name(name: &'static [u8]) -> &'static str {
    let trimmed = name.strip_suffix(b"\0").unwrap_or(name);
    std::str::from_utf8(trimmed).unwrap_or("<non-utf8 symbol>")
}
