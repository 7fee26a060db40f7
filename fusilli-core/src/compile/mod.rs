pub mod cli_driver;
pub mod command;
pub mod ffi_driver;

use std::path::PathBuf;

pub use cli_driver::CliDriver;
pub use command::CompileCommand;
pub use ffi_driver::FfiDriver;

use crate::error::Result;
use crate::support::config;

/// Either compile driver, selected by `FUSILLI_COMPILE_BACKEND_USE_CLI`
/// (FFI is the default). Both expose the same `build_command`/`run` shape
/// so `Graph::compile` does not need to know which one it holds.
pub enum CompileDriver {
    Cli(CliDriver),
    Ffi(FfiDriver),
}

impl CompileDriver {
    pub fn discover() -> Result<Self> {
        if config::use_cli_compile_backend() {
            Ok(CompileDriver::Cli(CliDriver::discover()?))
        } else {
            Ok(CompileDriver::Ffi(FfiDriver::discover()?))
        }
    }

    pub fn build_command(&self, input_path: PathBuf, output_path: PathBuf, flags: Vec<String>) -> CompileCommand {
        match self {
            CompileDriver::Cli(d) => d.build_command(input_path, output_path, flags),
            CompileDriver::Ffi(d) => d.build_command(input_path, output_path, flags),
        }
    }

    pub fn run(&self, command: &CompileCommand) -> Result<()> {
        match self {
            CompileDriver::Cli(d) => d.run(command),
            CompileDriver::Ffi(d) => d.run(command),
        }
    }
}
