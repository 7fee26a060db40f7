//! `VmContext`: a per-graph VM context loaded with one compiled module and
//! resolved to its entry function. Mirrors `RuntimeInstance`/`Device`'s
//! create-now-release-on-drop shape (`runtime::handle`), but is owned by the
//! `Graph` that compiled it rather than cached process-wide, since a context
//! is bound to one specific `.vmfb`.

use std::ffi::CString;

use crate::backend::Backend;
use crate::error::{Error, ErrorKind, Result};
use crate::runtime::ffi::runtime_api;
use crate::runtime::handle::{Handle, RuntimeInstance};
use std::sync::Arc;

/// The transient-workspace contract a compiled function reports, read off
/// its `iree.abi.transients.size[.constant]` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceContract {
    None,
    Constant(u64),
    Dynamic,
}

pub struct VmContext {
    raw: *mut std::ffi::c_void,
    function: *mut std::ffi::c_void,
    #[allow(dead_code)]
    instance: Arc<RuntimeInstance>,
    pub is_async: bool,
}

unsafe impl Send for VmContext {}

impl VmContext {
    /// Creates a context against `handle`'s runtime instance, loads
    /// `module_bytes`, and resolves `main$async` (async backends) or `main`
    /// (sync backends) as the entry point.
    pub fn create(handle: &Handle, module_bytes: &[u8]) -> Result<Self> {
        let api = runtime_api()?;
        let raw = unsafe { (api.vm_context_create)(handle.instance().raw) };
        if raw.is_null() {
            return Err(Error::new(ErrorKind::RuntimeFailure, "failed to create VM context"));
        }
        let loaded = unsafe { (api.vm_context_load_module)(raw, module_bytes.as_ptr(), module_bytes.len()) };
        if !loaded {
            unsafe { (api.vm_context_release)(raw) };
            return Err(Error::new(ErrorKind::RuntimeFailure, "failed to load compiled module into VM context"));
        }
        let is_async = handle.backend().executes_async();
        let entry_name = entry_function_name(handle.backend());
        let entry_cstr = CString::new(entry_name).unwrap();
        let function = unsafe { (api.vm_context_resolve_function)(raw, entry_cstr.as_ptr()) };
        if function.is_null() {
            unsafe { (api.vm_context_release)(raw) };
            return Err(Error::new(
                ErrorKind::RuntimeFailure,
                format!("compiled module has no exported `{entry_name}` function"),
            ));
        }
        Ok(Self {
            raw,
            function,
            instance: Arc::clone(handle.instance()),
            is_async,
        })
    }

    pub fn function(&self) -> *mut std::ffi::c_void {
        self.function
    }

    /// Reads the resolved entry function's transient-workspace contract.
    pub fn workspace_contract(&self) -> Result<WorkspaceContract> {
        let api = runtime_api()?;
        let mut size: u64 = 0;
        let tag = unsafe { (api.function_workspace_size)(self.function, &mut size as *mut u64) };
        match tag {
            0 => Ok(WorkspaceContract::None),
            1 => Ok(WorkspaceContract::Constant(size)),
            2 => Ok(WorkspaceContract::Dynamic),
            other => Err(Error::new(
                ErrorKind::InternalError,
                format!("runtime returned unrecognized workspace-contract tag {other}"),
            )),
        }
    }

    pub fn call_invoke(
        &self,
        inputs: &[*mut std::ffi::c_void],
        outputs: &mut [*mut std::ffi::c_void],
    ) -> Result<()> {
        let api = runtime_api()?;
        let ok = unsafe {
            (api.call_invoke)(
                self.function,
                inputs.as_ptr(),
                inputs.len(),
                outputs.as_mut_ptr(),
                outputs.len(),
            )
        };
        if !ok {
            return Err(Error::new(ErrorKind::RuntimeFailure, "call_invoke failed"));
        }
        Ok(())
    }
}

fn entry_function_name(backend: Backend) -> &'static str {
    if backend.executes_async() {
        "main$async"
    } else {
        "main"
    }
}

impl Drop for VmContext {
    fn drop(&mut self) {
        if let Ok(api) = runtime_api() {
            unsafe { (api.vm_context_release)(self.raw) };
        }
    }
}
