//! Raw bindings to the IREE-family runtime's C API, loaded the same way as
//! the compiler (`compile::ffi_driver`): via `libloading` into a process
//! singleton, rather than a dedicated `-sys` crate (none of the retrieved
//! examples ship or depend on one, and fabricating a vendor crate is out of
//! bounds — see `DESIGN.md`).

use std::ffi::c_void;
use std::sync::OnceLock;

use crate::dllib::DynamicLibrary;
use crate::error::{Error, ErrorKind, Result};
use crate::support::external_tools;

pub type InstanceCreateFn = unsafe extern "C" fn() -> *mut c_void;
pub type InstanceReleaseFn = unsafe extern "C" fn(*mut c_void);
pub type DeviceCreateFn = unsafe extern "C" fn(*mut c_void, *const i8, i32) -> *mut c_void;
pub type DeviceReleaseFn = unsafe extern "C" fn(*mut c_void);
pub type VmContextCreateFn = unsafe extern "C" fn(*mut c_void) -> *mut c_void;
pub type VmContextReleaseFn = unsafe extern "C" fn(*mut c_void);
pub type VmContextLoadModuleFn = unsafe extern "C" fn(*mut c_void, *const u8, usize) -> bool;
/// Resolves an exported function by name within a loaded context. Returns
/// null if the module has no such export.
pub type VmContextResolveFunctionFn = unsafe extern "C" fn(*mut c_void, *const i8) -> *mut c_void;
/// Queries a resolved function's transient-workspace contract. Writes the
/// byte size to the out-param and returns a tag: 0 = no workspace, 1 = a
/// constant size (out-param valid), 2 = a dynamic (function-valued) size.
pub type FunctionWorkspaceSizeFn = unsafe extern "C" fn(*mut c_void, *mut u64) -> i32;
pub type BufferAllocateFn = unsafe extern "C" fn(*mut c_void, usize, i32) -> *mut c_void;
pub type BufferReleaseFn = unsafe extern "C" fn(*mut c_void);
pub type BufferReadFn = unsafe extern "C" fn(*mut c_void, *mut u8, usize) -> bool;
pub type BufferWriteFn = unsafe extern "C" fn(*mut c_void, *const u8, usize) -> bool;
pub type CallInvokeFn = unsafe extern "C" fn(*mut c_void, *const *mut c_void, usize, *mut *mut c_void, usize) -> bool;

pub struct RuntimeApi {
    pub instance_create: InstanceCreateFn,
    pub instance_release: InstanceReleaseFn,
    pub device_create: DeviceCreateFn,
    pub device_release: DeviceReleaseFn,
    pub vm_context_create: VmContextCreateFn,
    pub vm_context_release: VmContextReleaseFn,
    pub vm_context_load_module: VmContextLoadModuleFn,
    pub vm_context_resolve_function: VmContextResolveFunctionFn,
    pub function_workspace_size: FunctionWorkspaceSizeFn,
    pub buffer_allocate: BufferAllocateFn,
    pub buffer_release: BufferReleaseFn,
    pub buffer_read: BufferReadFn,
    pub buffer_write: BufferWriteFn,
    pub call_invoke: CallInvokeFn,
}

// SAFETY: function pointers are plain data once resolved; the library they
// point into outlives the process (see `load()`, which leaks it).
unsafe impl Send for RuntimeApi {}
unsafe impl Sync for RuntimeApi {}

static RUNTIME_API: OnceLock<RuntimeApi> = OnceLock::new();

macro_rules! bind {
    ($lib:expr, $name:literal) => {
        *$lib.get_symbol::<_>($name)?
    };
}

pub fn runtime_api() -> Result<&'static RuntimeApi> {
    if let Some(api) = RUNTIME_API.get() {
        return Ok(api);
    }
    let lib_path = external_tools::find_iree_compiler_lib()
        .map(|p| p.with_file_name(runtime_lib_name()))
        .filter(|p| p.is_file())
        .or_else(|| which_runtime_lib());
    let lib_path = lib_path.ok_or_else(|| {
        Error::new(
            ErrorKind::RuntimeFailure,
            "runtime shared library not found (set FUSILLI_IREE_RUNTIME_LIB_PATH)",
        )
    })?;
    let library = DynamicLibrary::open(lib_path.display().to_string())?;
    let library: &'static DynamicLibrary = Box::leak(Box::new(library));
    // SAFETY: symbol signatures are asserted by the type aliases above.
    let api = unsafe {
        RuntimeApi {
            instance_create: bind!(library, "ireeRuntimeInstanceCreate"),
            instance_release: bind!(library, "ireeRuntimeInstanceRelease"),
            device_create: bind!(library, "ireeRuntimeDeviceCreate"),
            device_release: bind!(library, "ireeRuntimeDeviceRelease"),
            vm_context_create: bind!(library, "ireeRuntimeVmContextCreate"),
            vm_context_release: bind!(library, "ireeRuntimeVmContextRelease"),
            vm_context_load_module: bind!(library, "ireeRuntimeVmContextLoadModule"),
            vm_context_resolve_function: bind!(library, "ireeRuntimeVmContextResolveFunction"),
            function_workspace_size: bind!(library, "ireeRuntimeFunctionWorkspaceSize"),
            buffer_allocate: bind!(library, "ireeRuntimeBufferAllocate"),
            buffer_release: bind!(library, "ireeRuntimeBufferRelease"),
            buffer_read: bind!(library, "ireeRuntimeBufferRead"),
            buffer_write: bind!(library, "ireeRuntimeBufferWrite"),
            call_invoke: bind!(library, "ireeRuntimeCallInvoke"),
        }
    };
    let _ = RUNTIME_API.set(api);
    Ok(RUNTIME_API.get().unwrap())
}

fn runtime_lib_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "IREERuntime.dll"
    } else if cfg!(target_os = "macos") {
        "libIREERuntime.dylib"
    } else {
        "libIREERuntime.so"
    }
}

fn which_runtime_lib() -> Option<std::path::PathBuf> {
    std::env::var_os("FUSILLI_IREE_RUNTIME_LIB_PATH")
        .map(std::path::PathBuf::from)
        .filter(|p| p.is_file())
}
