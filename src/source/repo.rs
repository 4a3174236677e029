//! Repository root discovery

use std::path::{Path, PathBuf};

/// Directory whose presence marks a repository root
pub const REPO_MARKER: &str = ".git";

/// Nearest ancestor directory of `file` that contains a `.git` directory.
///
/// The file's own path is never considered, only its ancestors.
pub fn find_repo_root(file: &Path) -> Option<PathBuf> {
    file.ancestors()
        .skip(1)
        .find(|dir| dir.join(REPO_MARKER).is_dir())
        .map(Path::to_path_buf)
}
