//! Native string arena
//!
//! Owns every NUL-terminated buffer whose address is handed to the runtime.
//! Buffers are never freed one at a time; `release_all` frees the lot once the
//! runtime has shut down.

use std::ffi::c_char;
use std::ptr::NonNull;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("string contains a NUL byte at offset {position}")]
    InteriorNul { position: usize },

    #[error("arena has already been released")]
    Released,
}

/// Address of an interned buffer. Valid until the owning arena is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeStr {
    ptr: NonNull<c_char>,
    len: usize,
}

impl NativeStr {
    pub fn as_ptr(&self) -> *const c_char {
        self.ptr.as_ptr()
    }

    /// Only for C slots declared `char *` that the runtime never writes through.
    pub fn as_mut_ptr(&self) -> *mut c_char {
        self.ptr.as_ptr()
    }

    /// Length in bytes, excluding the terminator.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

pub struct StringArena {
    // Leaked boxes, reclaimed in `release_all`.
    buffers: Vec<NonNull<[u8]>>,
    bytes_allocated: usize,
    released: bool,
}

impl StringArena {
    pub fn new() -> Self {
        Self {
            buffers: Vec::new(),
            bytes_allocated: 0,
            released: false,
        }
    }

    /// Copy `text` into a fresh zero-filled buffer of `text.len() + 1` bytes.
    pub fn intern(&mut self, text: &str) -> Result<NativeStr, ArenaError> {
        if self.released {
            return Err(ArenaError::Released);
        }
        if let Some(position) = text.bytes().position(|b| b == 0) {
            return Err(ArenaError::InteriorNul { position });
        }

        let mut buffer = vec![0u8; text.len() + 1].into_boxed_slice();
        buffer[..text.len()].copy_from_slice(text.as_bytes());
        self.bytes_allocated += buffer.len();

        let block = NonNull::from(Box::leak(buffer));
        self.buffers.push(block);

        Ok(NativeStr {
            ptr: block.cast::<c_char>(),
            len: text.len(),
        })
    }

    /// Free every buffer. Returns how many were freed; later calls free nothing.
    pub fn release_all(&mut self) -> usize {
        let count = self.buffers.len();
        for block in self.buffers.drain(..) {
            // SAFETY: each block came from `Box::leak` in `intern` and is
            // drained exactly once.
            drop(unsafe { Box::from_raw(block.as_ptr()) });
        }
        self.released = true;
        if count > 0 {
            tracing::debug!(count, bytes = self.bytes_allocated, "released native strings");
        }
        count
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Total bytes handed out, terminators included.
    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for StringArena {
    fn drop(&mut self) {
        if !self.released {
            self.release_all();
        }
    }
}

impl Default for StringArena {
    fn default() -> Self {
        Self::new()
    }
}
