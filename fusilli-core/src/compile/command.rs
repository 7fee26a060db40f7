//! Shared compile-command representation. Both drivers (CLI subprocess and
//! in-process FFI) build one of these and serialize it identically via
//! `to_string`, so a cache-validity check can compare command text without
//! caring which driver produced it.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct CompileCommand {
    pub compiler: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub flags: Vec<String>,
}

/// Double-quotes an argument if it contains whitespace or shell
/// metacharacters, escaping embedded double quotes and backslashes.
pub fn escape_argument(arg: &str) -> String {
    let needs_quoting = arg.is_empty()
        || arg
            .chars()
            .any(|c| c.is_whitespace() || "\"'$`\\".contains(c));
    if !needs_quoting {
        return arg.to_string();
    }
    let mut escaped = String::with_capacity(arg.len() + 2);
    escaped.push('"');
    for c in arg.chars() {
        if c == '"' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('"');
    escaped
}

impl CompileCommand {
    pub fn new(compiler: impl Into<String>, input_path: PathBuf, output_path: PathBuf, flags: Vec<String>) -> Self {
        Self {
            compiler: compiler.into(),
            input_path,
            output_path,
            flags,
        }
    }

    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![self.input_path.display().to_string()];
        argv.extend(self.flags.iter().cloned());
        argv.push("-o".to_string());
        argv.push(self.output_path.display().to_string());
        argv
    }

    /// The exact line written to `iree-compile-command.txt`.
    pub fn to_command_string(&self) -> String {
        let mut parts = vec![escape_argument(&self.compiler)];
        parts.extend(self.argv().iter().map(|a| escape_argument(a)));
        format!("{}\n", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_spaces() {
        assert_eq!(escape_argument("--flag=a b"), "\"--flag=a b\"");
        assert_eq!(escape_argument("--flag=ab"), "--flag=ab");
    }

    #[test]
    fn escapes_embedded_quotes() {
        assert_eq!(escape_argument("a\"b"), "\"a\\\"b\"");
    }

    #[test]
    fn command_string_is_deterministic() {
        let cmd = CompileCommand::new(
            "iree-compile",
            PathBuf::from("/tmp/in.mlir"),
            PathBuf::from("/tmp/out.vmfb"),
            vec!["--target-backends=llvm-cpu".to_string()],
        );
        let a = cmd.to_command_string();
        let b = cmd.to_command_string();
        assert_eq!(a, b);
        assert!(a.starts_with("iree-compile /tmp/in.mlir"));
    }
}
