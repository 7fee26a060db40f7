//! Locating the compiler executable/library and GPU-enumeration tools on
//! the host. Inferred from the call sites in `backend.cc` (which invokes
//! `amd-smi`/`rocm_agent_enumerator` by bare name, relying on `$PATH`) since
//! the original has no dedicated discovery module; no crate in the
//! retrieved example pack offers a `which`-style abstraction either, so
//! this stays a thin wrapper over `std::env`/`std::path`.

use std::env;
use std::path::PathBuf;

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path).find_map(|dir| {
        let candidate = dir.join(name);
        candidate.is_file().then_some(candidate)
    })
}

/// Path to the `iree-compile`-equivalent executable, for the CLI driver.
pub fn find_iree_compile() -> Option<PathBuf> {
    if let Ok(p) = env::var("FUSILLI_IREE_COMPILE_PATH") {
        let p = PathBuf::from(p);
        if p.is_file() {
            return Some(p);
        }
    }
    find_on_path("iree-compile")
}

/// Path to the compiler's shared library, for the in-process FFI driver.
pub fn find_iree_compiler_lib() -> Option<PathBuf> {
    if let Ok(p) = env::var("FUSILLI_IREE_COMPILER_LIB_PATH") {
        let p = PathBuf::from(p);
        if p.is_file() {
            return Some(p);
        }
    }
    let name = if cfg!(target_os = "windows") {
        "IREECompiler.dll"
    } else if cfg!(target_os = "macos") {
        "libIREECompiler.dylib"
    } else {
        "libIREECompiler.so"
    };
    find_on_path(name)
}

/// Whether `amd-smi` (preferred) or `rocm_agent_enumerator` (fallback) is on
/// `$PATH`; `backend` autodetection only runs when one of these is present.
pub fn find_amd_smi() -> Option<PathBuf> {
    find_on_path("amd-smi")
}

pub fn find_rocm_agent_enumerator() -> Option<PathBuf> {
    find_on_path("rocm_agent_enumerator")
}
