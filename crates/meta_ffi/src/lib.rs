//! PHP Runtime Binding
//!
//! Raw layouts and symbol table of `libphp`, as seen by a SAPI host
//!
//! ## Architecture
//!
//! - **ABI:** `#[repr(C)]` mirrors of `sapi_module_struct`, `zend_file_handle`
//!   and `zval`, plus one typed function-pointer alias per hook slot
//! - **Library:** `PhpLibrary` opens the shared object and binds every entry
//!   point the host needs before any of them is called
//!
//! Nothing here calls into the runtime; see `meta_sapi` for that.

pub mod abi;
pub mod library;

pub use abi::{FileHandle, SapiModule, Zval, FAILURE, SUCCESS};
pub use library::{BindError, PhpApi, PhpLibrary};
