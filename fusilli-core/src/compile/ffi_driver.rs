//! In-process compile driver: loads the compiler's shared library into a
//! process-wide singleton and drives its C API directly, avoiding a
//! subprocess per compile. Grounded on the reference implementation's
//! `CompileContext`/`CompileSession` pair (`compile_session.h`).

use std::ffi::{c_void, CString};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use libloading::Symbol;

use crate::compile::command::CompileCommand;
use crate::dllib::DynamicLibrary;
use crate::error::{Error, ErrorKind, Result};
use crate::support::external_tools;

type GlobalInitializeFn = unsafe extern "C" fn();
type SessionCreateFn = unsafe extern "C" fn() -> *mut c_void;
type SessionDestroyFn = unsafe extern "C" fn(*mut c_void);
type SessionSetFlagsFn = unsafe extern "C" fn(*mut c_void, i32, *const *const i8) -> *mut c_void;
type InvocationCreateFn = unsafe extern "C" fn(*mut c_void) -> *mut c_void;
type InvocationDestroyFn = unsafe extern "C" fn(*mut c_void);
type InvocationParseSourceFn = unsafe extern "C" fn(*mut c_void, *const i8) -> bool;
type InvocationRunPipelineFn = unsafe extern "C" fn(*mut c_void) -> bool;
type InvocationOutputVmBytecodeFn = unsafe extern "C" fn(*mut c_void, *const i8) -> bool;
type ErrorDestroyFn = unsafe extern "C" fn(*mut c_void);

/// The fixed table of function pointers bound from the compiler's shared
/// library, mirroring `compile_session.h`'s member list.
struct CompilerApi {
    global_initialize: Symbol<'static, GlobalInitializeFn>,
    session_create: Symbol<'static, SessionCreateFn>,
    session_destroy: Symbol<'static, SessionDestroyFn>,
    session_set_flags: Symbol<'static, SessionSetFlagsFn>,
    invocation_create: Symbol<'static, InvocationCreateFn>,
    invocation_destroy: Symbol<'static, InvocationDestroyFn>,
    invocation_parse_source: Symbol<'static, InvocationParseSourceFn>,
    invocation_run_pipeline: Symbol<'static, InvocationRunPipelineFn>,
    invocation_output_vm_bytecode: Symbol<'static, InvocationOutputVmBytecodeFn>,
    #[allow(dead_code)]
    error_destroy: Symbol<'static, ErrorDestroyFn>,
}

/// Process-wide singleton: the library is loaded and globally initialized
/// once, then deliberately leaked for the lifetime of the process. We
/// never call a global-shutdown entry point, since the compiler library
/// disables itself permanently on shutdown, which would prevent reloading
/// the plugin within the same process — leaking the handle is the
/// intentional expression of that, not an oversight.
struct CompileContext {
    api: CompilerApi,
}

// SAFETY: the compiler library's C API is documented as safe to call from
// any thread as long as calls are serialized, which the `Mutex` below
// enforces.
unsafe impl Send for CompileContext {}

static COMPILE_CONTEXT: OnceLock<Mutex<CompileContext>> = OnceLock::new();

fn compile_context() -> Result<&'static Mutex<CompileContext>> {
    if COMPILE_CONTEXT.get().is_some() {
        return Ok(COMPILE_CONTEXT.get().unwrap());
    }
    let lib_path = external_tools::find_iree_compiler_lib().ok_or_else(|| {
        Error::new(
            ErrorKind::CompileFailure,
            "compiler shared library not found (set FUSILLI_IREE_COMPILER_LIB_PATH)",
        )
    })?;
    let library = DynamicLibrary::open(lib_path.display().to_string())?;
    let library: &'static DynamicLibrary = Box::leak(Box::new(library));
    // SAFETY: symbol signatures are asserted by the type aliases above,
    // matching the compiler toolchain's published C API.
    let api = unsafe {
        CompilerApi {
            global_initialize: library.get_symbol("ireeCompilerGlobalInitialize")?,
            session_create: library.get_symbol("ireeCompilerSessionCreate")?,
            session_destroy: library.get_symbol("ireeCompilerSessionDestroy")?,
            session_set_flags: library.get_symbol("ireeCompilerSessionSetFlags")?,
            invocation_create: library.get_symbol("ireeCompilerInvocationCreate")?,
            invocation_destroy: library.get_symbol("ireeCompilerInvocationDestroy")?,
            invocation_parse_source: library.get_symbol("ireeCompilerInvocationParseSource")?,
            invocation_run_pipeline: library.get_symbol("ireeCompilerInvocationRunPassPipeline")?,
            invocation_output_vm_bytecode: library
                .get_symbol("ireeCompilerInvocationOutputVMBytecode")?,
            error_destroy: library.get_symbol("ireeCompilerErrorDestroy")?,
        }
    };
    unsafe {
        (api.global_initialize)();
    }
    let ctx = CompileContext { api };
    let _ = COMPILE_CONTEXT.set(Mutex::new(ctx));
    Ok(COMPILE_CONTEXT.get().unwrap())
}

pub struct FfiDriver;

impl FfiDriver {
    pub fn discover() -> Result<Self> {
        let _ = compile_context()?;
        Ok(Self)
    }

    /// `to_command_string()` on the returned command must equal what
    /// `CliDriver` would have produced for the same (compiler, input,
    /// output, flags) tuple, so the cache can compare them interchangeably.
    pub fn build_command(
        &self,
        input_path: PathBuf,
        output_path: PathBuf,
        flags: Vec<String>,
    ) -> CompileCommand {
        CompileCommand::new("iree-compile", input_path, output_path, flags)
    }

    pub fn run(&self, command: &CompileCommand) -> Result<()> {
        let ctx_lock = compile_context()?;
        let ctx = ctx_lock.lock().unwrap();
        unsafe {
            let session = (ctx.api.session_create)();
            if session.is_null() {
                return Err(Error::new(ErrorKind::CompileFailure, "session create failed"));
            }
            let flag_cstrs: Vec<CString> = command
                .flags
                .iter()
                .map(|f| CString::new(f.as_str()).unwrap())
                .collect();
            let flag_ptrs: Vec<*const i8> = flag_cstrs.iter().map(|c| c.as_ptr()).collect();
            let err = (ctx.api.session_set_flags)(session, flag_ptrs.len() as i32, flag_ptrs.as_ptr());
            if !err.is_null() {
                (ctx.api.session_destroy)(session);
                return Err(Error::new(ErrorKind::CompileFailure, "failed to set session flags"));
            }

            let invocation = (ctx.api.invocation_create)(session);
            let input_cstr = CString::new(command.input_path.display().to_string()).unwrap();
            let parsed = (ctx.api.invocation_parse_source)(invocation, input_cstr.as_ptr());
            if !parsed {
                (ctx.api.invocation_destroy)(invocation);
                (ctx.api.session_destroy)(session);
                return Err(Error::new(ErrorKind::CompileFailure, "failed to parse source"));
            }

            let ran = (ctx.api.invocation_run_pipeline)(invocation);
            if !ran {
                (ctx.api.invocation_destroy)(invocation);
                (ctx.api.session_destroy)(session);
                return Err(Error::new(ErrorKind::CompileFailure, "compile pipeline failed"));
            }

            let output_cstr = CString::new(command.output_path.display().to_string()).unwrap();
            let wrote = (ctx.api.invocation_output_vm_bytecode)(invocation, output_cstr.as_ptr());

            (ctx.api.invocation_destroy)(invocation);
            (ctx.api.session_destroy)(session);

            if !wrote {
                return Err(Error::new(ErrorKind::CompileFailure, "failed to emit VM bytecode"));
            }
        }
        Ok(())
    }
}
