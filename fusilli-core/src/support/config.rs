//! Every environment variable fusilli-core reads, in one place.
//!
//! The reference implementation scatters `std::getenv` calls across
//! `cache.cc`, `backend.cc`, and `graph.h`; centralizing the reads here
//! means the parsing logic (quoting rules, boolean truthiness) is testable
//! without mutating process-wide environment state from many call sites.

use std::env;
use std::path::PathBuf;

/// `$FUSILLI_CACHE_DIR`, or the platform cache-directory default.
pub fn cache_root() -> PathBuf {
    if let Ok(dir) = env::var("FUSILLI_CACHE_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::cache_dir()
        .unwrap_or_else(env::temp_dir)
        .join("fusilli")
}

/// Whether the CLI subprocess compile driver should be used instead of the
/// default in-process FFI driver.
pub fn use_cli_compile_backend() -> bool {
    match env::var("FUSILLI_COMPILE_BACKEND_USE_CLI") {
        Ok(v) => !v.is_empty() && v != "0",
        Err(_) => false,
    }
}

/// Extra compiler flags appended to every backend's flag list, parsed from
/// `FUSILLI_EXTRA_COMPILER_FLAGS`. Tokens are space separated; a
/// double-quoted span is kept as one token (quotes stripped); single quotes
/// are literal characters, not quoting.
pub fn extra_compiler_flags() -> Vec<String> {
    match env::var("FUSILLI_EXTRA_COMPILER_FLAGS") {
        Ok(raw) => tokenize_flags(&raw),
        Err(_) => Vec::new(),
    }
}

fn tokenize_flags(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;
    for c in raw.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_plain_flags() {
        assert_eq!(
            tokenize_flags("--foo --bar=1"),
            vec!["--foo".to_string(), "--bar=1".to_string()]
        );
    }

    #[test]
    fn tokenizes_double_quoted_span() {
        assert_eq!(
            tokenize_flags(r#"--foo "a b c" --bar"#),
            vec!["--foo".to_string(), "a b c".to_string(), "--bar".to_string()]
        );
    }

    #[test]
    fn single_quotes_are_literal() {
        assert_eq!(
            tokenize_flags("--foo='bar baz'"),
            vec!["--foo='bar".to_string(), "baz'".to_string()]
        );
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        assert!(tokenize_flags("").is_empty());
        assert!(tokenize_flags("   ").is_empty());
    }
}
