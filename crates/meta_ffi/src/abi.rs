//! C layouts shared with the runtime
//!
//! Field order and widths follow `main/SAPI.h`, `Zend/zend_stream.h` and
//! `Zend/zend_types.h` of PHP 8.1+. The runtime keeps a copy of the module
//! struct and the addresses it contains, so every string pointer stored here
//! must outlive global shutdown.

use std::ffi::{c_char, c_int, c_uint, c_void};

/// `SUCCESS` in `zend_result`.
pub const SUCCESS: c_int = 0;
/// `FAILURE` in `zend_result`.
pub const FAILURE: c_int = -1;

pub type ModuleHook = unsafe extern "C" fn(module: *mut SapiModule) -> c_int;
pub type ActivateHook = unsafe extern "C" fn() -> c_int;
pub type UbWriteHook = unsafe extern "C" fn(text: *const c_char, len: usize) -> usize;
pub type FlushHook = unsafe extern "C" fn(server_context: *mut c_void);
pub type GetStatHook = unsafe extern "C" fn() -> *mut c_void;
pub type GetenvHook = unsafe extern "C" fn(name: *const c_char, len: usize) -> *mut c_char;
/// Declared `void (*)(int, const char *, ...)` by the runtime. Hosts written in
/// Rust cannot define C-variadic functions, so the slot is typed with its fixed
/// parameters only and format arguments are never read.
pub type SapiErrorHook = unsafe extern "C" fn(kind: c_int, message: *const c_char);
pub type HeaderHandlerHook =
    unsafe extern "C" fn(header: *mut c_void, op: c_int, headers: *mut c_void) -> c_int;
pub type SendHeadersHook = unsafe extern "C" fn(headers: *mut c_void) -> c_int;
pub type SendHeaderHook = unsafe extern "C" fn(header: *mut c_void, server_context: *mut c_void);
pub type ReadPostHook = unsafe extern "C" fn(buffer: *mut c_char, count: usize) -> usize;
pub type ReadCookiesHook = unsafe extern "C" fn() -> *mut c_char;
pub type RegisterServerVariablesHook = unsafe extern "C" fn(track_vars: *mut Zval);
pub type LogMessageHook = unsafe extern "C" fn(message: *const c_char, syslog_type: c_int);
pub type GetRequestTimeHook = unsafe extern "C" fn(request_time: *mut f64) -> c_int;
pub type TerminateProcessHook = unsafe extern "C" fn();
pub type DefaultPostReaderHook = unsafe extern "C" fn();
pub type TreatDataHook = unsafe extern "C" fn(arg: c_int, text: *mut c_char, dest: *mut Zval);
pub type GetFdHook = unsafe extern "C" fn(fd: *mut c_int) -> c_int;
pub type ForceHttp10Hook = unsafe extern "C" fn() -> c_int;
pub type GetTargetIdHook = unsafe extern "C" fn(id: *mut c_void) -> c_int;
pub type InputFilterHook = unsafe extern "C" fn(
    arg: c_int,
    var: *const c_char,
    val: *mut *mut c_char,
    val_len: usize,
    new_val_len: *mut usize,
) -> c_uint;
pub type IniDefaultsHook = unsafe extern "C" fn(configuration_hash: *mut c_void);
pub type InputFilterInitHook = unsafe extern "C" fn() -> c_uint;

/// `sapi_module_struct`. A `None` slot is a NULL pointer, which the runtime
/// checks before calling every optional hook.
#[repr(C)]
pub struct SapiModule {
    pub name: *mut c_char,
    pub pretty_name: *mut c_char,

    pub startup: Option<ModuleHook>,
    pub shutdown: Option<ModuleHook>,

    pub activate: Option<ActivateHook>,
    pub deactivate: Option<ActivateHook>,

    pub ub_write: Option<UbWriteHook>,
    pub flush: Option<FlushHook>,
    pub get_stat: Option<GetStatHook>,
    pub getenv: Option<GetenvHook>,

    pub sapi_error: Option<SapiErrorHook>,

    pub header_handler: Option<HeaderHandlerHook>,
    pub send_headers: Option<SendHeadersHook>,
    pub send_header: Option<SendHeaderHook>,

    pub read_post: Option<ReadPostHook>,
    pub read_cookies: Option<ReadCookiesHook>,

    pub register_server_variables: Option<RegisterServerVariablesHook>,
    pub log_message: Option<LogMessageHook>,
    pub get_request_time: Option<GetRequestTimeHook>,
    pub terminate_process: Option<TerminateProcessHook>,

    pub php_ini_path_override: *mut c_char,

    pub default_post_reader: Option<DefaultPostReaderHook>,
    pub treat_data: Option<TreatDataHook>,
    pub executable_location: *mut c_char,

    pub php_ini_ignore: c_int,
    pub php_ini_ignore_cwd: c_int,

    pub get_fd: Option<GetFdHook>,
    pub force_http_10: Option<ForceHttp10Hook>,
    pub get_target_uid: Option<GetTargetIdHook>,
    pub get_target_gid: Option<GetTargetIdHook>,

    pub input_filter: Option<InputFilterHook>,
    pub ini_defaults: Option<IniDefaultsHook>,
    pub phpinfo_as_text: c_int,

    pub ini_entries: *const c_char,
    pub additional_functions: *const c_void,
    pub input_filter_init: Option<InputFilterInitHook>,
}

impl Default for SapiModule {
    fn default() -> Self {
        // SAFETY: every field is a raw pointer, an `Option` of a function
        // pointer, or a `c_int`; all-zero is a valid value for each.
        unsafe { std::mem::zeroed() }
    }
}

/// `zend_file_handle`, treated as opaque. Initialised by
/// `zend_stream_init_filename` and torn down by `zend_destroy_file_handle`.
#[repr(C, align(8))]
pub struct FileHandle {
    opaque: [u8; 80],
}

impl Default for FileHandle {
    fn default() -> Self {
        Self { opaque: [0; 80] }
    }
}

/// `zval`, treated as opaque. An all-zero slot reads as `IS_UNDEF`, which
/// the runtime reports as type `null`.
#[repr(C, align(8))]
pub struct Zval {
    opaque: [u8; 16],
}

impl Default for Zval {
    fn default() -> Self {
        Self { opaque: [0; 16] }
    }
}
