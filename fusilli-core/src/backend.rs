//! Backend enum, per-backend compile flags, and GPU SKU autodetection.

use crate::error::{Error, ErrorKind, Result};
use crate::support::{config, external_tools, process};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Cpu,
    Amdgpu,
}

impl Backend {
    /// Whether `execute` returns before the dispatch completes.
    pub fn executes_async(self) -> bool {
        match self {
            Backend::Cpu => false,
            Backend::Amdgpu => true,
        }
    }

    /// The runtime's HAL driver name for this backend.
    pub fn hal_driver_name(self) -> &'static str {
        match self {
            Backend::Cpu => "local-task",
            Backend::Amdgpu => "hip",
        }
    }
}

/// Marketing-name -> IREE SKU table, consulted before falling back to the
/// architecture-name enumerator. Case-insensitive substring match, patterns
/// checked in order (see IREE's `KnownTargets.cpp`).
const SKU_TABLE: &[(&str, &str)] = &[
    // CDNA4
    ("mi355x", "mi355x"),
    ("mi350x", "mi350x"),
    // CDNA3
    ("mi325x", "mi325x"),
    ("mi308x", "mi308x"),
    ("mi300x", "mi300x"),
    ("mi300a", "mi300a"),
    // CDNA2
    ("mi250x", "mi250x"),
    ("mi250", "mi250"),
    ("mi210", "mi210"),
    // CDNA1
    ("mi100", "mi100"),
    // RDNA3 Pro
    ("w7900", "w7900"),
    ("w7800", "w7800"),
    ("w7700", "w7700"),
    ("v710", "v710"),
    // RDNA3 Consumer
    ("rx 7900 xtx", "rx7900xtx"),
    ("rx 7900 xt", "rx7900xt"),
    ("rx 7800 xt", "rx7800xt"),
    ("rx 7700 xt", "rx7700xt"),
    // RDNA4
    ("rx 9070 xt", "rx9070xt"),
    ("rx 9070", "rx9070"),
    ("rx 9060 xt", "rx9060xt"),
    ("r9700", "r9700"),
];

fn sku_from_marketing_name(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    SKU_TABLE
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, sku)| *sku)
}

/// Resolves the `--rocm-target=<sku>` value: first via `amd-smi`'s JSON
/// `market_name` field, then via `rocm_agent_enumerator`'s architecture
/// names (first non-`gfx000` line).
pub fn detect_amdgpu_target() -> Result<String> {
    if let Some(path) = external_tools::find_amd_smi() {
        if let Ok(json_text) = process::exec_capture(&path.to_string_lossy(), &["static", "--json"]) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&json_text) {
                if let Some(name) = value
                    .pointer("/0/asic/market_name")
                    .or_else(|| value.pointer("/market_name"))
                    .and_then(|v| v.as_str())
                {
                    if let Some(sku) = sku_from_marketing_name(name) {
                        return Ok(sku.to_string());
                    }
                }
            }
        }
    }
    if let Some(path) = external_tools::find_rocm_agent_enumerator() {
        let out = process::exec_capture(&path.to_string_lossy(), &[])?;
        if let Some(arch) = out.lines().find(|l| !l.trim().is_empty() && *l != "gfx000") {
            return Ok(arch.trim().to_string());
        }
    }
    Err(Error::new(
        ErrorKind::CompileFailure,
        "could not detect AMDGPU target: neither amd-smi nor rocm_agent_enumerator produced a usable result",
    ))
}

/// Builds the full flag list for `backend`, including the common
/// statistics-dump flags and `FUSILLI_EXTRA_COMPILER_FLAGS`.
pub fn compile_flags(backend: Backend, stats_path: &std::path::Path) -> Result<Vec<String>> {
    let mut flags = match backend {
        Backend::Cpu => vec![
            "--target-backends=llvm-cpu".to_string(),
            "--llvmcpu-target-cpu=host".to_string(),
            "--torch-externalize-transients".to_string(),
        ],
        Backend::Amdgpu => {
            let sku = detect_amdgpu_target()?;
            vec![
                "--target-backends=rocm".to_string(),
                format!("--rocm-target={sku}"),
                "-O3".to_string(),
                "--iree-preprocessing-pass-pipeline=builtin.module(util.func(iree-preprocessing-convert-conv-filter-to-channels-last,iree-preprocessing-pad-to-intrinsics))".to_string(),
                "--torch-externalize-transients".to_string(),
            ]
        }
    };
    flags.push("--scheduling-dump-statistics-format=json".to_string());
    flags.push(format!(
        "--scheduling-dump-statistics-file={}",
        stats_path.display()
    ));
    flags.extend(config::extra_compiler_flags());
    Ok(flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sku_lookup_is_case_insensitive() {
        assert_eq!(sku_from_marketing_name("AMD Instinct MI300X"), Some("mi300x"));
        assert_eq!(sku_from_marketing_name("Radeon RX 7900 XTX"), Some("rx7900xtx"));
        assert_eq!(sku_from_marketing_name("totally unknown card"), None);
    }

    #[test]
    fn async_flag_matches_backend() {
        assert!(!Backend::Cpu.executes_async());
        assert!(Backend::Amdgpu.executes_async());
    }
}
