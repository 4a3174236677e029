//! Selection by local changes
//!
//! A [`ChangeSource`] exposes the working-tree change list together with the
//! readiness signals a trigger waits on before reading it. The git
//! implementation shells out to `git` in the repository directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::process::Command;
use tracing::debug;

use super::error::SourceError;

#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Whether the change view can be reached at all
    async fn is_available(&self) -> bool;

    /// Whether the change view is still refreshing
    async fn is_busy(&self) -> bool;

    /// Whether the change list itself can be read
    async fn has_change_list(&self) -> bool;

    /// Absolute paths of every changed file, possibly empty
    async fn changed_files(&self) -> Result<Vec<PathBuf>, SourceError>;

    /// Forget any cached view so the next trigger discovers it again
    fn reset(&self);
}

/// Working-tree changes of a git repository
pub struct GitChangeSource {
    start_dir: PathBuf,
    /// Cached `git rev-parse --show-toplevel`
    toplevel: Mutex<Option<PathBuf>>,
}

impl GitChangeSource {
    pub fn new(start_dir: impl Into<PathBuf>) -> Self {
        Self {
            start_dir: start_dir.into(),
            toplevel: Mutex::new(None),
        }
    }

    pub fn toplevel(&self) -> Option<PathBuf> {
        self.toplevel.lock().clone()
    }

    async fn resolve_toplevel(&self) -> Result<PathBuf, SourceError> {
        if let Some(dir) = self.toplevel() {
            return Ok(dir);
        }
        let out = run_git(&self.start_dir, &["rev-parse", "--show-toplevel"]).await?;
        let dir = PathBuf::from(String::from_utf8_lossy(&out).trim());
        debug!("Repository toplevel: {}", dir.display());
        *self.toplevel.lock() = Some(dir.clone());
        Ok(dir)
    }
}

#[async_trait]
impl ChangeSource for GitChangeSource {
    async fn is_available(&self) -> bool {
        match self.resolve_toplevel().await {
            Ok(_) => true,
            Err(e) => {
                debug!("Change source not available yet: {}", e);
                false
            }
        }
    }

    async fn is_busy(&self) -> bool {
        // A held index lock means another git command is rewriting the index
        self.toplevel()
            .is_some_and(|dir| dir.join(".git").join("index.lock").exists())
    }

    async fn has_change_list(&self) -> bool {
        match self.toplevel() {
            Some(dir) => run_git(&dir, &["rev-parse", "--git-dir"]).await.is_ok(),
            None => false,
        }
    }

    async fn changed_files(&self) -> Result<Vec<PathBuf>, SourceError> {
        let dir = self.toplevel().ok_or_else(|| {
            SourceError::Unavailable(format!("no repository at {}", self.start_dir.display()))
        })?;
        let out = run_git(
            &dir,
            &["status", "--porcelain=v1", "-z", "--untracked-files=all"],
        )
        .await?;

        Ok(parse_porcelain_z(&String::from_utf8_lossy(&out))
            .into_iter()
            .map(|rel| dir.join(rel))
            .collect())
    }

    fn reset(&self) {
        *self.toplevel.lock() = None;
    }
}

async fn run_git(dir: &Path, args: &[&str]) -> Result<Vec<u8>, SourceError> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .await?;

    if !output.status.success() {
        return Err(SourceError::Git {
            command: args.join(" "),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

/// Paths from `git status --porcelain=v1 -z` output.
///
/// Entries are `XY <path>` separated by NUL. Renames and copies carry their
/// source path as an extra field, which is dropped; the destination is kept.
pub fn parse_porcelain_z(output: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut fields = output.split('\0').filter(|f| !f.is_empty());

    while let Some(entry) = fields.next() {
        if entry.len() < 4 {
            continue;
        }
        let (status, path) = entry.split_at(3);
        paths.push(path.to_string());
        if status.starts_with('R') || status.starts_with('C') {
            fields.next();
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_entries() {
        let out = " M src/a.rs\0?? notes/new file.txt\0D  gone.txt\0";
        assert_eq!(
            parse_porcelain_z(out),
            vec!["src/a.rs", "notes/new file.txt", "gone.txt"]
        );
    }

    #[test]
    fn test_parse_rename_keeps_destination() {
        let out = "R  src/new.rs\0src/old.rs\0 M b.rs\0";
        assert_eq!(parse_porcelain_z(out), vec!["src/new.rs", "b.rs"]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_porcelain_z("").is_empty());
    }

    #[tokio::test]
    async fn test_outside_repository_is_unavailable() {
        let temp = tempfile::tempdir().unwrap();
        let source = GitChangeSource::new(temp.path().join("does-not-exist"));

        assert!(!source.is_available().await);
        assert!(!source.is_busy().await);
        assert!(!source.has_change_list().await);
        assert!(matches!(
            source.changed_files().await,
            Err(SourceError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_index_lock_means_busy() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join(".git")).unwrap();
        let source = GitChangeSource::new(temp.path());
        *source.toplevel.lock() = Some(temp.path().to_path_buf());

        assert!(!source.is_busy().await);
        std::fs::write(temp.path().join(".git/index.lock"), b"").unwrap();
        assert!(source.is_busy().await);

        source.reset();
        assert!(source.toplevel().is_none());
    }
}
