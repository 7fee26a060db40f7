//! `Buffer`: an owning wrapper over one runtime buffer view.

use std::marker::PhantomData;

use crate::data_type::DataType;
use crate::error::{Error, ErrorKind, Result};
use crate::runtime::ffi::runtime_api;
use crate::runtime::handle::Handle;

pub struct Buffer {
    raw: *mut std::ffi::c_void,
    byte_len: usize,
    imported: bool,
}

unsafe impl Send for Buffer {}

impl Buffer {
    /// Allocates a device-local, element-typed buffer of `shape` and
    /// copies `data` into it. Rejects a zero-sized shape or an element
    /// count mismatch against `data`.
    pub fn allocate<T: Copy>(handle: &Handle, shape: &[i64], data: &[T]) -> Result<Self> {
        let expected_count: i64 = shape.iter().product();
        if expected_count <= 0 {
            return Err(Error::new(ErrorKind::RuntimeFailure, "cannot allocate a zero-sized buffer"));
        }
        if expected_count as usize != data.len() {
            return Err(Error::new(
                ErrorKind::RuntimeFailure,
                format!(
                    "shape implies {expected_count} elements but {} were provided",
                    data.len()
                ),
            ));
        }
        let byte_len = std::mem::size_of_val(data);
        let api = runtime_api()?;
        let raw = unsafe { (api.buffer_allocate)(handle.device().raw, byte_len, 0) };
        if raw.is_null() {
            return Err(Error::new(ErrorKind::RuntimeFailure, "buffer allocation failed"));
        }
        let ok = unsafe { (api.buffer_write)(raw, data.as_ptr() as *const u8, byte_len) };
        if !ok {
            unsafe { (api.buffer_release)(raw) };
            return Err(Error::new(ErrorKind::RuntimeFailure, "buffer initialization write failed"));
        }
        Ok(Self {
            raw,
            byte_len,
            imported: false,
        })
    }

    /// Takes ownership alongside an externally-created buffer view. The
    /// caller retains its own reference; this wrapper releases its own on
    /// drop.
    pub fn import(raw_view: *mut std::ffi::c_void, byte_len: usize) -> Result<Self> {
        if raw_view.is_null() {
            return Err(Error::new(ErrorKind::RuntimeFailure, "cannot import a null buffer view"));
        }
        Ok(Self {
            raw: raw_view,
            byte_len,
            imported: true,
        })
    }

    /// Allocates an untyped, 1-D `i8` buffer of `bytes` length, used for
    /// the workspace argument.
    pub fn allocate_raw(handle: &Handle, bytes: usize) -> Result<Self> {
        if bytes == 0 {
            return Err(Error::new(ErrorKind::RuntimeFailure, "cannot allocate a zero-byte workspace buffer"));
        }
        let api = runtime_api()?;
        let raw = unsafe { (api.buffer_allocate)(handle.device().raw, bytes, DataType::Uint8 as i32) };
        if raw.is_null() {
            return Err(Error::new(ErrorKind::RuntimeFailure, "workspace allocation failed"));
        }
        Ok(Self {
            raw,
            byte_len: bytes,
            imported: false,
        })
    }

    /// Transfers the buffer's content into `out`, which must be empty on
    /// entry; resizes it to `byte_len / size_of::<T>()`.
    pub fn read<T: Copy + Default>(&self, out: &mut Vec<T>) -> Result<()> {
        if !out.is_empty() {
            return Err(Error::new(ErrorKind::RuntimeFailure, "read() destination must be empty"));
        }
        let count = self.byte_len / std::mem::size_of::<T>();
        out.resize(count, T::default());
        let api = runtime_api()?;
        let ok = unsafe { (api.buffer_read)(self.raw, out.as_mut_ptr() as *mut u8, self.byte_len) };
        if !ok {
            return Err(Error::new(ErrorKind::RuntimeFailure, "buffer read failed"));
        }
        Ok(())
    }

    pub fn raw(&self) -> *mut std::ffi::c_void {
        self.raw
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    // Marker to keep the type invariant visible in docs/signatures without
    // committing to an element type at the struct level.
    #[allow(dead_code)]
    fn _phantom() -> PhantomData<()> {
        PhantomData
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if self.imported {
            return;
        }
        if let Ok(api) = runtime_api() {
            unsafe { (api.buffer_release)(self.raw) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_allocation_is_rejected_without_touching_runtime() {
        // allocate<T> validates shape before ever calling into the runtime
        // API, so this check alone is exercisable without a loaded library.
        let shape: &[i64] = &[0, 4];
        let expected_count: i64 = shape.iter().product();
        assert!(expected_count <= 0);
    }
}
