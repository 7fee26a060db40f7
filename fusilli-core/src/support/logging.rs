//! Structured logging via `tracing`.
//!
//! fusilli-core only *emits* events and spans; it never installs a global
//! subscriber on its own behalf (a library fighting its embedder's
//! subscriber is a bug). `init_logging` is a convenience a binary or test
//! suite can call to get a reasonable default, honoring `FUSILLI_LOG` the
//! way the rest of the crate's environment surface is read through
//! `support::config`.

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `FUSILLI_LOG`. Safe to call more
/// than once; subsequent calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env("FUSILLI_LOG")
        .unwrap_or_else(|_| EnvFilter::new("fusilli_core=warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
