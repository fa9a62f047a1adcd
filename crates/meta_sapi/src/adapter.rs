//! Host adapter: the module descriptor and the hooks installed in it
//!
//! The runtime calls these synchronously on the thread that entered it. None
//! of them block beyond a write to the host's standard streams, and none may
//! unwind into C, so write failures are reported through return values only.

use crate::arena::{ArenaError, NativeStr, StringArena};
use crate::engine::Engine;
use meta_ffi::abi::ModuleHook;
use meta_ffi::{SapiModule, Zval, FAILURE};
use std::borrow::Cow;
use std::cell::RefCell;
use std::ffi::{c_char, c_int, c_void, CStr};
use std::io::{self, Write};

pub const MODULE_NAME: &str = "meta";
pub const PRETTY_NAME: &str = "PHP meta-SAPI";

/// The descriptor plus the host context its `startup` hook needs. `descriptor`
/// is the first field of a `repr(C)` struct, so a pointer to it is also a
/// pointer to the whole `HostModule`.
#[repr(C)]
pub(crate) struct HostModule<E: Engine> {
    pub(crate) descriptor: SapiModule,
    pub(crate) engine: E,
    pub(crate) arena: RefCell<StringArena>,
    pub(crate) ini_entries: String,
    pub(crate) eval_name: NativeStr,
}

impl<E: Engine> HostModule<E> {
    pub(crate) fn new(
        engine: E,
        ini_entries: String,
        eval_name: &str,
    ) -> Result<Box<Self>, ArenaError> {
        let mut arena = StringArena::new();
        let name = arena.intern(MODULE_NAME)?;
        let pretty_name = arena.intern(PRETTY_NAME)?;
        let eval_name = arena.intern(eval_name)?;

        let mut descriptor = SapiModule::default();
        descriptor.name = name.as_mut_ptr();
        descriptor.pretty_name = pretty_name.as_mut_ptr();
        install_hooks::<E>(&mut descriptor, engine.shutdown_hook());

        Ok(Box::new(Self {
            descriptor,
            engine,
            arena: RefCell::new(arena),
            ini_entries,
            eval_name,
        }))
    }
}

/// Fill every slot the runtime may call at any stage. Slots left `None` are
/// ones the runtime null-checks before use.
pub(crate) fn install_hooks<E: Engine>(descriptor: &mut SapiModule, shutdown: ModuleHook) {
    descriptor.startup = Some(startup_hook::<E>);
    descriptor.shutdown = Some(shutdown);
    descriptor.ub_write = Some(ub_write);
    descriptor.flush = Some(flush);
    descriptor.sapi_error = Some(sapi_error);
    descriptor.send_header = Some(send_header);
    descriptor.read_post = Some(read_post);
    descriptor.read_cookies = Some(read_cookies);
    descriptor.register_server_variables = Some(register_server_variables);
    descriptor.log_message = Some(log_message);
}

/// Sets `ini_entries`, then hands over to `php_module_startup`.
///
/// Only ever installed in the descriptor of a `HostModule<E>`, and only ever
/// called by the host with that descriptor's address.
unsafe extern "C" fn startup_hook<E: Engine>(module: *mut SapiModule) -> c_int {
    if module.is_null() {
        return FAILURE;
    }
    let host = module.cast::<HostModule<E>>();

    let interned = (*host).arena.borrow_mut().intern(&(*host).ini_entries);
    let ini = match interned {
        Ok(ini) => ini,
        Err(err) => {
            tracing::error!(%err, "cannot expose ini entries to the runtime");
            return FAILURE;
        }
    };
    (*module).ini_entries = ini.as_ptr();

    (*host).engine.module_startup(module)
}

unsafe extern "C" fn ub_write(text: *const c_char, len: usize) -> usize {
    let bytes = c_bytes(text, len);
    write_output(&mut io::stdout().lock(), bytes)
}

unsafe extern "C" fn flush(_server_context: *mut c_void) {
    if let Err(err) = io::stdout().lock().flush() {
        tracing::debug!(%err, "stdout flush failed");
    }
}

unsafe extern "C" fn sapi_error(kind: c_int, message: *const c_char) {
    let message = c_text(message);
    if has_format_arguments(&message) {
        tracing::debug!("sapi_error message printed without its format arguments");
    }
    let _ = writeln!(io::stderr().lock(), "{}", sapi_error_line(kind, &message));
}

unsafe extern "C" fn send_header(_header: *mut c_void, _server_context: *mut c_void) {}

unsafe extern "C" fn read_post(_buffer: *mut c_char, _count: usize) -> usize {
    0
}

unsafe extern "C" fn read_cookies() -> *mut c_char {
    std::ptr::null_mut()
}

unsafe extern "C" fn register_server_variables(_track_vars: *mut Zval) {}

unsafe extern "C" fn log_message(message: *const c_char, syslog_type: c_int) {
    let message = c_text(message);
    let _ = writeln!(io::stdout().lock(), "{}", log_message_line(syslog_type, &message));
}

/// Write all of `bytes`, returning how many were accepted before any error.
pub fn write_output<W: Write>(out: &mut W, bytes: &[u8]) -> usize {
    let mut written = 0;
    while written < bytes.len() {
        match out.write(&bytes[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    written
}

pub fn sapi_error_line(kind: c_int, message: &str) -> String {
    format!("sapi_error({kind}): {message}")
}

pub fn log_message_line(syslog_type: c_int, message: &str) -> String {
    format!("log_message({syslog_type}): {message}")
}

/// True if `message` still holds a printf conversion (`%%` excluded).
pub fn has_format_arguments(message: &str) -> bool {
    let mut chars = message.chars();
    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.next() {
                Some('%') => {}
                Some(_) => return true,
                None => return false,
            }
        }
    }
    false
}

unsafe fn c_bytes<'a>(ptr: *const c_char, len: usize) -> &'a [u8] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(ptr.cast::<u8>(), len)
    }
}

unsafe fn c_text<'a>(ptr: *const c_char) -> Cow<'a, str> {
    if ptr.is_null() {
        Cow::Borrowed("")
    } else {
        CStr::from_ptr(ptr).to_string_lossy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingEngine;

    struct Limited {
        accepted: Vec<u8>,
        limit: usize,
    }

    impl Write for Limited {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.accepted.len() >= self.limit {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
            }
            let take = buf.len().min(self.limit - self.accepted.len()).min(3);
            self.accepted.extend_from_slice(&buf[..take]);
            Ok(take)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn output_is_forwarded_verbatim() {
        let mut out = Vec::new();
        assert_eq!(write_output(&mut out, b"int(2)\n"), 7);
        assert_eq!(out, b"int(2)\n");
        assert_eq!(write_output(&mut out, b""), 0);
    }

    #[test]
    fn short_writes_report_accepted_bytes() {
        let mut out = Limited {
            accepted: Vec::new(),
            limit: 5,
        };
        assert_eq!(write_output(&mut out, b"hello world"), 5);
        assert_eq!(out.accepted, b"hello");
    }

    #[test]
    fn diagnostics_are_tagged_with_their_code() {
        assert_eq!(sapi_error_line(2, "boom"), "sapi_error(2): boom");
        assert_eq!(
            log_message_line(4, "PHP Warning:  oops"),
            "log_message(4): PHP Warning:  oops"
        );
    }

    #[test]
    fn format_conversions_are_detected() {
        assert!(has_format_arguments("Unable to open %s"));
        assert!(!has_format_arguments("100%% done"));
        assert!(!has_format_arguments("plain"));
        assert!(!has_format_arguments("trailing %"));
    }

    #[test]
    fn every_reachable_slot_is_filled() {
        let host = HostModule::new(RecordingEngine::new(), String::new(), "php_meta_sapi").unwrap();
        let module = &host.descriptor;

        assert!(module.startup.is_some());
        assert!(module.shutdown.is_some());
        assert!(module.ub_write.is_some());
        assert!(module.flush.is_some());
        assert!(module.sapi_error.is_some());
        assert!(module.send_header.is_some());
        assert!(module.read_post.is_some());
        assert!(module.read_cookies.is_some());
        assert!(module.register_server_variables.is_some());
        assert!(module.log_message.is_some());

        // Null-checked by the runtime.
        assert!(module.activate.is_none());
        assert!(module.header_handler.is_none());
        assert!(module.ini_entries.is_null());
    }

    #[test]
    fn descriptor_names_point_into_the_arena() {
        let host = HostModule::new(RecordingEngine::new(), String::new(), "php_meta_sapi").unwrap();
        let name = unsafe { CStr::from_ptr(host.descriptor.name) };
        let pretty = unsafe { CStr::from_ptr(host.descriptor.pretty_name) };

        assert_eq!(name.to_str().unwrap(), MODULE_NAME);
        assert_eq!(pretty.to_str().unwrap(), PRETTY_NAME);
        assert_eq!(host.arena.borrow().len(), 3);
    }

    #[test]
    fn request_hooks_are_inert() {
        unsafe {
            assert!(read_cookies().is_null());
            assert_eq!(read_post(std::ptr::null_mut(), 64), 0);
            send_header(std::ptr::null_mut(), std::ptr::null_mut());
            register_server_variables(std::ptr::null_mut());
            assert_eq!(ub_write(std::ptr::null(), 0), 0);
        }
    }

    #[test]
    fn diagnostic_hooks_accept_null_and_unformatted_messages() {
        unsafe {
            flush(std::ptr::null_mut());
            log_message(std::ptr::null(), 0);
            log_message(b"PHP Notice:  test\0".as_ptr().cast(), 5);
            sapi_error(0, std::ptr::null());
            sapi_error(1, b"Unable to open %s\0".as_ptr().cast());
        }
    }

    #[test]
    fn installed_hooks_are_callable_through_the_descriptor() {
        let host = HostModule::new(RecordingEngine::new(), String::new(), "php_meta_sapi").unwrap();
        let module = &host.descriptor;
        unsafe {
            (module.flush.unwrap())(std::ptr::null_mut());
            (module.log_message.unwrap())(std::ptr::null(), 0);
            (module.sapi_error.unwrap())(0, std::ptr::null());
            assert_eq!((module.ub_write.unwrap())(std::ptr::null(), 8), 0);
        }
    }
}
