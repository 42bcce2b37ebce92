//! Project file access for the flattener.
//!
//! Inclusion resolution is pure text transformation, but it has to read the
//! files it splices. `SourceTree` abstracts that read so the whole resolve
//! pipeline runs against an in-memory tree in tests and benchmarks, with
//! `FsTree` as the production implementation.

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Read-only access to the project's source files.
pub trait SourceTree {
    /// Read the file at `path` (raw bytes; decoding happens in the caller).
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Whether a file exists at `path`.
    fn exists(&self, path: &Path) -> bool;
}

// --- Implementation: Local Filesystem ---

/// `SourceTree` over the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsTree;

impl SourceTree for FsTree {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

// --- Implementation: In-Memory ---

/// An in-memory `SourceTree` backed by a path → contents map.
///
/// Lookup paths are normalized lexically, so `a/./b` and `x/../a/b` resolve
/// to the same entry without touching a filesystem.
#[derive(Debug, Default)]
pub struct MemoryTree {
    files: HashMap<PathBuf, Vec<u8>>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file. Returns `self` for fixture-building chains.
    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.files
            .insert(lexical_normalize(&path.into()), contents.into());
    }
}

impl SourceTree for MemoryTree {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .get(&lexical_normalize(path))
            .cloned()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("{}", path.display()))
            })
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(&lexical_normalize(path))
    }
}

/// Normalize a path lexically: drop `.` components and resolve `..` against
/// preceding components where possible. No filesystem access, no symlink
/// awareness — this exists so joined include paths compare equal regardless
/// of how they were built.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_tree_reads_inserted_files() {
        let tree = MemoryTree::new().with_file("proj/main.tex", "hello");
        assert_eq!(tree.read(Path::new("proj/main.tex")).unwrap(), b"hello");
        assert!(tree.exists(Path::new("proj/main.tex")));
        assert!(!tree.exists(Path::new("proj/other.tex")));
    }

    #[test]
    fn test_memory_tree_normalizes_lookups() {
        let tree = MemoryTree::new().with_file("proj/intro.tex", "x");
        assert!(tree.exists(Path::new("proj/./intro.tex")));
        assert!(tree.exists(Path::new("proj/sections/../intro.tex")));
    }

    #[test]
    fn test_lexical_normalize() {
        assert_eq!(
            lexical_normalize(Path::new("a/./b/../c")),
            PathBuf::from("a/c")
        );
        assert_eq!(
            lexical_normalize(Path::new("../up/file.tex")),
            PathBuf::from("../up/file.tex")
        );
        assert_eq!(lexical_normalize(Path::new("/abs/./x")), PathBuf::from("/abs/x"));
    }
}
