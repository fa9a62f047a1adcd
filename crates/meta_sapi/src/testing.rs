//! Recording engine for exercising the host without a native runtime.

use crate::adapter::{HostModule, MODULE_NAME};
use crate::engine::Engine;
use meta_ffi::abi::ModuleHook;
use meta_ffi::{FileHandle, SapiModule, Zval, SUCCESS};
use std::cell::{Cell, RefCell};
use std::ffi::{c_int, CStr};
use std::rc::Rc;

/// One runtime entry point invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SignalStartup,
    SapiStartup,
    /// `arena_live`: the host's interned strings were still readable.
    SapiShutdown { arena_live: bool },
    ModuleStartup { ini_entries: String },
    ModuleShutdown { arena_live: bool },
    RequestStartup,
    RequestShutdown,
    StreamInitFilename { path: String },
    ExecuteScript,
    DestroyFileHandle,
    EvalString { code: String, name: String },
    TypeName,
    VarDump,
}

/// Records every call and answers with the configured results.
pub struct RecordingEngine {
    log: Rc<RefCell<Vec<Call>>>,
    output: RefCell<String>,
    module: Cell<*mut SapiModule>,
    pub module_startup_status: c_int,
    pub request_startup_status: c_int,
    pub execute_completes: bool,
    pub eval_status: c_int,
    pub result_type: String,
    pub dump_rendering: String,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
            output: RefCell::new(String::new()),
            module: Cell::new(std::ptr::null_mut()),
            module_startup_status: SUCCESS,
            request_startup_status: SUCCESS,
            execute_completes: true,
            eval_status: SUCCESS,
            result_type: "int".to_string(),
            dump_rendering: "int(2)\n".to_string(),
        }
    }

    /// Shared handle to the call log, readable after the engine is dropped.
    pub fn log(&self) -> Rc<RefCell<Vec<Call>>> {
        Rc::clone(&self.log)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.borrow().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.log.borrow().iter().filter(|call| predicate(call)).count()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    /// Everything "dumped" so far.
    pub fn output(&self) -> String {
        self.output.borrow().clone()
    }

    fn record(&self, call: Call) {
        self.log.borrow_mut().push(call);
    }

    /// Whether the descriptor registered at `sapi_startup` still reads back
    /// through the host's arena.
    unsafe fn arena_live(&self) -> bool {
        let module = self.module.get();
        if module.is_null() {
            return false;
        }
        let host = module.cast::<HostModule<RecordingEngine>>();
        if (*host).arena.borrow().is_released() {
            return false;
        }
        let name_intact = CStr::from_ptr((*module).name).to_bytes() == MODULE_NAME.as_bytes();
        let ini = (*module).ini_entries;
        let ini_intact =
            ini.is_null() || CStr::from_ptr(ini).to_bytes() == (*host).ini_entries.as_bytes();
        name_intact && ini_intact
    }
}

impl Default for RecordingEngine {
    fn default() -> Self {
        Self::new()
    }
}

unsafe extern "C" fn recorded_shutdown_wrapper(_module: *mut SapiModule) -> c_int {
    SUCCESS
}

impl Engine for RecordingEngine {
    unsafe fn signal_startup(&self) {
        self.record(Call::SignalStartup);
    }

    unsafe fn sapi_startup(&self, module: *mut SapiModule) {
        self.module.set(module);
        self.record(Call::SapiStartup);
    }

    unsafe fn sapi_shutdown(&self) {
        let arena_live = self.arena_live();
        self.record(Call::SapiShutdown { arena_live });
    }

    unsafe fn module_startup(&self, module: *mut SapiModule) -> c_int {
        let ini = (*module).ini_entries;
        let ini_entries = if ini.is_null() {
            String::new()
        } else {
            CStr::from_ptr(ini).to_string_lossy().into_owned()
        };
        self.record(Call::ModuleStartup { ini_entries });
        self.module_startup_status
    }

    unsafe fn module_shutdown(&self) {
        let arena_live = self.arena_live();
        self.record(Call::ModuleShutdown { arena_live });
    }

    fn shutdown_hook(&self) -> ModuleHook {
        recorded_shutdown_wrapper
    }

    unsafe fn request_startup(&self) -> c_int {
        self.record(Call::RequestStartup);
        self.request_startup_status
    }

    unsafe fn request_shutdown(&self) {
        self.record(Call::RequestShutdown);
    }

    unsafe fn stream_init_filename(&self, _handle: &mut FileHandle, path: &CStr) {
        self.record(Call::StreamInitFilename {
            path: path.to_string_lossy().into_owned(),
        });
    }

    unsafe fn execute_script(&self, _handle: &mut FileHandle) -> bool {
        self.record(Call::ExecuteScript);
        self.execute_completes
    }

    unsafe fn destroy_file_handle(&self, _handle: &mut FileHandle) {
        self.record(Call::DestroyFileHandle);
    }

    unsafe fn eval_string(&self, code: &[u8], _retval: &mut Zval, name: &CStr) -> c_int {
        self.record(Call::EvalString {
            code: String::from_utf8_lossy(code).into_owned(),
            name: name.to_string_lossy().into_owned(),
        });
        self.eval_status
    }

    unsafe fn type_name(&self, _value: &Zval) -> String {
        self.record(Call::TypeName);
        self.result_type.clone()
    }

    unsafe fn var_dump(&self, _value: &mut Zval) {
        self.record(Call::VarDump);
        self.output.borrow_mut().push_str(&self.dump_rendering);
    }
}
