//! Content-addressed on-disk compilation cache: a four-file bundle per
//! graph, with RAII cleanup ordered so files are removed before the
//! containing directory, and removed only if that leaves it empty.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, ErrorKind, Result};
use crate::support::config;

/// Which of the four cache files a path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachedAssetsType {
    Input,
    Output,
    Command,
    Statistics,
}

impl CachedAssetsType {
    fn file_name(self) -> &'static str {
        match self {
            CachedAssetsType::Input => "iree-compile-input.mlir",
            CachedAssetsType::Output => "iree-compile-output.vmfb",
            CachedAssetsType::Command => "iree-compile-command.txt",
            CachedAssetsType::Statistics => "iree-compile-statistics.json",
        }
    }
}

/// Replaces spaces with underscores and drops non-alphanumeric characters;
/// an empty result becomes `unnamed_graph`.
pub fn sanitize_graph_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if sanitized.is_empty() {
        "unnamed_graph".to_string()
    } else {
        sanitized
    }
}

pub fn cache_dir_for(graph_name: &str) -> PathBuf {
    config::cache_root().join(sanitize_graph_name(graph_name))
}

/// One file within a graph's cache directory, with optional remove-on-drop.
pub struct CacheFile {
    path: PathBuf,
    remove_on_drop: bool,
}

impl CacheFile {
    /// Creates (truncating) `<cache_dir_for(graph_name)>/<kind.file_name()>`
    /// and writes `contents` into it.
    pub fn create(graph_name: &str, kind: CachedAssetsType, contents: &[u8], remove: bool) -> Result<Self> {
        let dir = cache_dir_for(graph_name);
        fs::create_dir_all(&dir).map_err(|e| {
            Error::new(
                ErrorKind::FileSystemFailure,
                format!("failed to create cache dir {}: {e}", dir.display()),
            )
        })?;
        let path = dir.join(kind.file_name());
        fs::write(&path, contents).map_err(|e| {
            Error::new(
                ErrorKind::FileSystemFailure,
                format!("failed to write {}: {e}", path.display()),
            )
        })?;
        tracing::debug!(path = %path.display(), "wrote cache file");
        Ok(Self {
            path,
            remove_on_drop: remove,
        })
    }

    /// Opens an existing cache file; fails if absent.
    pub fn open(graph_name: &str, kind: CachedAssetsType) -> Result<Self> {
        let path = cache_dir_for(graph_name).join(kind.file_name());
        if !path.is_file() {
            return Err(Error::new(
                ErrorKind::FileSystemFailure,
                format!("cache file {} does not exist", path.display()),
            ));
        }
        Ok(Self {
            path,
            remove_on_drop: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|e| {
            Error::new(
                ErrorKind::FileSystemFailure,
                format!("failed to read {}: {e}", self.path.display()),
            )
        })
    }
}

impl Drop for CacheFile {
    fn drop(&mut self) {
        if self.remove_on_drop && self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove cache file");
            }
        }
    }
}

/// The four-file bundle for one graph. Field order matters: Rust drops
/// fields in declaration order, so the files are removed before
/// `remove_dir_if_empty` runs in this struct's own `Drop`.
pub struct CachedAssets {
    pub input: CacheFile,
    pub output: CacheFile,
    pub command: CacheFile,
    pub statistics: CacheFile,
    graph_name: String,
}

impl CachedAssets {
    pub fn new(
        graph_name: &str,
        input: CacheFile,
        output: CacheFile,
        command: CacheFile,
        statistics: CacheFile,
    ) -> Self {
        Self {
            input,
            output,
            command,
            statistics,
            graph_name: graph_name.to_string(),
        }
    }

    pub fn open_existing(graph_name: &str) -> Result<Self> {
        Ok(Self::new(
            graph_name,
            CacheFile::open(graph_name, CachedAssetsType::Input)?,
            CacheFile::open(graph_name, CachedAssetsType::Output)?,
            CacheFile::open(graph_name, CachedAssetsType::Command)?,
            CacheFile::open(graph_name, CachedAssetsType::Statistics)?,
        ))
    }

    pub fn read(&self, kind: CachedAssetsType) -> Result<Vec<u8>> {
        match kind {
            CachedAssetsType::Input => self.input.read(),
            CachedAssetsType::Output => self.output.read(),
            CachedAssetsType::Command => self.command.read(),
            CachedAssetsType::Statistics => self.statistics.read(),
        }
    }
}

impl Drop for CachedAssets {
    fn drop(&mut self) {
        let dir = cache_dir_for(&self.graph_name);
        if dir.is_dir() {
            match fs::read_dir(&dir) {
                Ok(mut entries) => {
                    if entries.next().is_none() {
                        let _ = fs::remove_dir(&dir);
                    }
                }
                Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "failed to inspect cache dir"),
            }
        }
    }
}

/// Cache-validity check: the candidate `generated_asm`/`command_text` must
/// byte-for-byte match what's already on disk. A freshly constructed graph
/// never holds a prior `CachedAssets` in memory, so it always regenerates
/// even if files happen to already exist on disk (a fresh instance never
/// trusts a pre-existing cache).
pub fn is_cache_valid(existing: &CachedAssets, generated_asm: &[u8], command_text: &[u8]) -> bool {
    match (existing.input.read(), existing.command.read()) {
        (Ok(stored_asm), Ok(stored_command)) => {
            stored_asm == generated_asm && stored_command == command_text
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_spaces_and_punctuation() {
        assert_eq!(sanitize_graph_name("my graph!"), "my_graph");
        assert_eq!(sanitize_graph_name("###"), "unnamed_graph");
        assert_eq!(sanitize_graph_name(""), "unnamed_graph");
    }

    #[test]
    fn cache_file_roundtrip_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("FUSILLI_CACHE_DIR", dir.path());
        {
            let f = CacheFile::create("g1", CachedAssetsType::Input, b"hello", true).unwrap();
            assert_eq!(f.read().unwrap(), b"hello");
            let path = f.path().to_path_buf();
            drop(f);
            assert!(!path.exists());
        }
        std::env::remove_var("FUSILLI_CACHE_DIR");
    }

    #[test]
    fn cached_assets_removes_directory_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("FUSILLI_CACHE_DIR", dir.path());
        let graph_name = "g2";
        let assets = CachedAssets::new(
            graph_name,
            CacheFile::create(graph_name, CachedAssetsType::Input, b"a", true).unwrap(),
            CacheFile::create(graph_name, CachedAssetsType::Output, b"b", true).unwrap(),
            CacheFile::create(graph_name, CachedAssetsType::Command, b"c", true).unwrap(),
            CacheFile::create(graph_name, CachedAssetsType::Statistics, b"d", true).unwrap(),
        );
        let cache_dir = cache_dir_for(graph_name);
        assert!(cache_dir.is_dir());
        drop(assets);
        assert!(!cache_dir.exists());
        std::env::remove_var("FUSILLI_CACHE_DIR");
    }
}
