use std::backtrace::Backtrace;
use std::fmt;

/// Category of failure produced by any fusilli-core API.
///
/// Mirrors the error taxonomy the underlying graph/compile/runtime layers
/// actually distinguish on: callers match on `kind()` to decide whether a
/// failure is a user mistake (bad attribute, graph used out of order) or an
/// environment/toolchain problem (compile, runtime, filesystem).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required attribute was never set on a builder.
    AttributeNotSet,
    /// An attribute (or combination of attributes) violates an invariant.
    InvalidAttribute,
    /// The requested behavior is recognized but intentionally unsupported.
    NotImplemented,
    /// `compile`/`execute` called before `validate` succeeded.
    NotValidated,
    /// `execute` called before `compile` succeeded.
    NotCompiled,
    /// The compile driver (subprocess or in-process) reported failure.
    CompileFailure,
    /// The runtime reported failure invoking a compiled function.
    RuntimeFailure,
    /// A variant pack did not match the graph's expected operand set.
    VariantPackError,
    /// Cache directory or file I/O failed.
    FileSystemFailure,
    /// An invariant internal to fusilli-core was broken.
    InternalError,
}

impl ErrorKind {
    /// Severity this kind should be logged at (see `support::logging`).
    pub fn severity(self) -> tracing::Level {
        match self {
            ErrorKind::AttributeNotSet
            | ErrorKind::InvalidAttribute
            | ErrorKind::NotImplemented
            | ErrorKind::NotValidated
            | ErrorKind::NotCompiled
            | ErrorKind::VariantPackError => tracing::Level::WARN,
            ErrorKind::CompileFailure
            | ErrorKind::RuntimeFailure
            | ErrorKind::FileSystemFailure
            | ErrorKind::InternalError => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::AttributeNotSet => "attribute not set",
            ErrorKind::InvalidAttribute => "invalid attribute",
            ErrorKind::NotImplemented => "not implemented",
            ErrorKind::NotValidated => "graph not validated",
            ErrorKind::NotCompiled => "graph not compiled",
            ErrorKind::CompileFailure => "compile failure",
            ErrorKind::RuntimeFailure => "runtime failure",
            ErrorKind::VariantPackError => "variant pack error",
            ErrorKind::FileSystemFailure => "filesystem failure",
            ErrorKind::InternalError => "internal error",
        };
        f.write_str(s)
    }
}

/// The error type returned by every fallible fusilli-core API.
#[derive(thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    backtrace: Option<Backtrace>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let err = Self {
            kind,
            message: message.into(),
            backtrace: None,
        };
        err.bt()
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Captures a backtrace if `RUST_BACKTRACE` enables one; otherwise a
    /// cheap no-op. Mirrors the teacher's `Error::bt()` helper.
    fn bt(mut self) -> Self {
        let bt = Backtrace::capture();
        if bt.status() == std::backtrace::BacktraceStatus::Captured {
            self.backtrace = Some(bt);
        }
        self
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(bt) = &self.backtrace {
            write!(f, "\n{bt}")?;
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Builds an `Err(Error::new(kind, format!(...)))` and returns it.
#[macro_export]
macro_rules! fusilli_bail {
    ($kind:expr, $($arg:tt)*) => {
        return Err($crate::error::Error::new($kind, format!($($arg)*)))
    };
}

/// Returns early with an error unless `cond` holds.
#[macro_export]
macro_rules! fusilli_ensure {
    ($cond:expr, $kind:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::fusilli_bail!($kind, $($arg)*);
        }
    };
}
