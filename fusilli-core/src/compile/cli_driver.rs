//! Subprocess compile driver: shells out to the `iree-compile`-equivalent
//! executable. Mirrors the reference implementation's `execCommand`, a
//! `popen`-based helper; stderr is not captured on failure, a documented
//! limitation carried over unchanged.

use std::path::PathBuf;

use crate::compile::command::CompileCommand;
use crate::error::{Error, ErrorKind, Result};
use crate::support::{external_tools, process};

pub struct CliDriver {
    compiler_path: PathBuf,
}

impl CliDriver {
    pub fn discover() -> Result<Self> {
        let compiler_path = external_tools::find_iree_compile().ok_or_else(|| {
            Error::new(
                ErrorKind::CompileFailure,
                "iree-compile not found on PATH (set FUSILLI_IREE_COMPILE_PATH)",
            )
        })?;
        Ok(Self { compiler_path })
    }

    pub fn build_command(
        &self,
        input_path: PathBuf,
        output_path: PathBuf,
        flags: Vec<String>,
    ) -> CompileCommand {
        CompileCommand::new(
            self.compiler_path.display().to_string(),
            input_path,
            output_path,
            flags,
        )
    }

    pub fn run(&self, command: &CompileCommand) -> Result<()> {
        let ok = process::exec_status(&self.compiler_path.display().to_string(), &command.argv())?;
        if !ok {
            return Err(Error::new(
                ErrorKind::CompileFailure,
                format!("compile failed: {}", command.to_command_string()),
            ));
        }
        Ok(())
    }
}
