//! The seam between the host and the runtime's exported entry points.

use meta_ffi::abi::ModuleHook;
use meta_ffi::{FileHandle, PhpLibrary, SapiModule, Zval};
use std::ffi::{c_int, CStr};

/// Entry points the host drives, one method per runtime symbol.
///
/// # Safety
/// Every method forwards to the runtime, which assumes its own call order:
/// signals armed before anything else, requests only between global startup
/// and shutdown, and so on. [`crate::Lifecycle`] is the only caller and
/// enforces that ordering.
pub trait Engine {
    /// `zend_signal_startup`
    unsafe fn signal_startup(&self);

    /// `sapi_startup`
    unsafe fn sapi_startup(&self, module: *mut SapiModule);

    /// `sapi_shutdown`
    unsafe fn sapi_shutdown(&self);

    /// `php_module_startup(module, NULL)`
    unsafe fn module_startup(&self, module: *mut SapiModule) -> c_int;

    /// `php_module_shutdown`
    unsafe fn module_shutdown(&self);

    /// Address of `php_module_shutdown_wrapper`, stored in the `shutdown` slot.
    fn shutdown_hook(&self) -> ModuleHook;

    /// `php_request_startup`
    unsafe fn request_startup(&self) -> c_int;

    /// `php_request_shutdown(NULL)`
    unsafe fn request_shutdown(&self);

    /// `zend_stream_init_filename`
    unsafe fn stream_init_filename(&self, handle: &mut FileHandle, path: &CStr);

    /// `php_execute_script`
    unsafe fn execute_script(&self, handle: &mut FileHandle) -> bool;

    /// `zend_destroy_file_handle`
    unsafe fn destroy_file_handle(&self, handle: &mut FileHandle);

    /// `zend_eval_stringl_ex(code, len, retval, name, true)`
    unsafe fn eval_string(&self, code: &[u8], retval: &mut Zval, name: &CStr) -> c_int;

    /// `zend_zval_type_name`
    unsafe fn type_name(&self, value: &Zval) -> String;

    /// `php_var_dump(value, 0)`
    unsafe fn var_dump(&self, value: &mut Zval);
}

impl Engine for PhpLibrary {
    unsafe fn signal_startup(&self) {
        (self.api().zend_signal_startup)()
    }

    unsafe fn sapi_startup(&self, module: *mut SapiModule) {
        (self.api().sapi_startup)(module)
    }

    unsafe fn sapi_shutdown(&self) {
        (self.api().sapi_shutdown)()
    }

    unsafe fn module_startup(&self, module: *mut SapiModule) -> c_int {
        (self.api().php_module_startup)(module, std::ptr::null_mut())
    }

    unsafe fn module_shutdown(&self) {
        (self.api().php_module_shutdown)()
    }

    fn shutdown_hook(&self) -> ModuleHook {
        self.api().php_module_shutdown_wrapper
    }

    unsafe fn request_startup(&self) -> c_int {
        (self.api().php_request_startup)()
    }

    unsafe fn request_shutdown(&self) {
        (self.api().php_request_shutdown)(std::ptr::null_mut())
    }

    unsafe fn stream_init_filename(&self, handle: &mut FileHandle, path: &CStr) {
        (self.api().zend_stream_init_filename)(handle, path.as_ptr())
    }

    unsafe fn execute_script(&self, handle: &mut FileHandle) -> bool {
        (self.api().php_execute_script)(handle)
    }

    unsafe fn destroy_file_handle(&self, handle: &mut FileHandle) {
        (self.api().zend_destroy_file_handle)(handle)
    }

    unsafe fn eval_string(&self, code: &[u8], retval: &mut Zval, name: &CStr) -> c_int {
        (self.api().zend_eval_stringl_ex)(
            code.as_ptr().cast(),
            code.len(),
            retval,
            name.as_ptr(),
            true,
        )
    }

    unsafe fn type_name(&self, value: &Zval) -> String {
        let name = (self.api().zend_zval_type_name)(value);
        if name.is_null() {
            return String::new();
        }
        CStr::from_ptr(name).to_string_lossy().into_owned()
    }

    unsafe fn var_dump(&self, value: &mut Zval) {
        (self.api().php_var_dump)(value, 0)
    }
}
