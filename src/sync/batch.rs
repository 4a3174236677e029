//! File batches handed to a synchronization run

use std::path::{Path, PathBuf};

/// Local directory every batch path is made relative to, and the name the
/// tree is published under on the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRoot {
    pub dir: PathBuf,
    pub name: String,
}

impl BatchRoot {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    /// Root named after its own final path component
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self { dir, name }
    }
}

/// Ordered set of absolute local files for one run.
///
/// Without a root no file can be mapped; each one is reported as unmapped
/// rather than failing the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileBatch {
    files: Vec<PathBuf>,
    root: Option<BatchRoot>,
}

impl FileBatch {
    pub fn new(files: Vec<PathBuf>, root: Option<BatchRoot>) -> Self {
        Self { files, root }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn root(&self) -> Option<&BatchRoot> {
        self.root.as_ref()
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.root.as_ref().map(|r| r.dir.as_path())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
