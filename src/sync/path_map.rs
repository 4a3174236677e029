//! Local-to-remote path mapping
//!
//! A file at `<base>/<rel>` lands at `<remote_root>/<subdir>/<project>/<rel>`
//! with `rel` converted to `/` separators. Pure and deterministic.

use std::path::Path;

use crate::sftp::path_utils::{join_remote_path, to_remote_separators};

/// Directory under the remote root that holds projects unless configured otherwise
pub const DEFAULT_REMOTE_SUBDIR: &str = "projects";

/// Where one local file goes on the remote host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub file_path: String,
    pub parent_dir: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("no local base directory for this batch")]
    NoBase,

    #[error("{path} is not under {base}")]
    NotUnderBase { path: String, base: String },

    #[error("remote path {0} has no parent directory")]
    NoParent(String),
}

/// Maps local paths under a batch base onto the remote project tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapper {
    remote_root: String,
    subdir: String,
}

impl PathMapper {
    pub fn new(remote_root: impl Into<String>, subdir: impl Into<String>) -> Self {
        Self {
            remote_root: remote_root.into(),
            subdir: subdir.into(),
        }
    }

    /// Map `local` (which must live under `base_dir`) for project `project`
    pub fn map(&self, local: &Path, base_dir: &Path, project: &str) -> Result<RemoteTarget, MapError> {
        let local_str = local.to_string_lossy();
        let base_str = base_dir.to_string_lossy();
        let base_trimmed = base_str.trim_end_matches(['/', '\\']);

        let not_under_base = || MapError::NotUnderBase {
            path: local_str.to_string(),
            base: base_str.to_string(),
        };

        let suffix = local_str
            .strip_prefix(base_trimmed)
            .ok_or_else(not_under_base)?;
        // The prefix has to end on a component boundary: /repo2/x is not under /repo
        if !suffix.starts_with(['/', '\\']) || suffix.trim_start_matches(['/', '\\']).is_empty() {
            return Err(not_under_base());
        }

        let mut project_root = self.remote_root.clone();
        if !self.subdir.is_empty() {
            project_root = join_remote_path(&project_root, &self.subdir);
        }
        project_root = join_remote_path(&project_root, project);

        let file_path = format!(
            "{}{}",
            project_root.trim_end_matches('/'),
            to_remote_separators(suffix)
        );

        match file_path.rfind('/') {
            Some(idx) if idx > 0 => Ok(RemoteTarget {
                parent_dir: file_path[..idx].to_string(),
                file_path,
            }),
            _ => Err(MapError::NoParent(file_path)),
        }
    }
}

/// Map with the default `projects` layout
pub fn map_remote_path(
    local: &Path,
    base_dir: &Path,
    remote_root: &str,
    project: &str,
) -> Result<RemoteTarget, MapError> {
    PathMapper::new(remote_root, DEFAULT_REMOTE_SUBDIR).map(local, base_dir, project)
}
