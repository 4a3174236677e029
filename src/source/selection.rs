//! Selection by explicit pick
//!
//! The user picks items of the active project. Each pick either resolves to
//! a local file or is not a project item at all.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::sync::{BatchRoot, FileBatch, OutputPane};

pub const NO_ACTIVE_PROJECT_MESSAGE: &str = "No active project.";

/// One picked item as the user named it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedItem {
    pub name: String,
    /// `None` when the item does not belong to the project
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub root: PathBuf,
    pub name: String,
}

pub trait ProjectSelection: Send + Sync {
    fn active_project(&self) -> Option<ProjectInfo>;

    fn selected_items(&self) -> Vec<SelectedItem>;
}

/// Selection given as a project directory and a list of file paths.
///
/// Relative paths are resolved against the project directory. Paths outside
/// the project directory are not project items.
#[derive(Debug, Clone)]
pub struct PathSelection {
    project: ProjectInfo,
    items: Vec<SelectedItem>,
}

impl PathSelection {
    pub fn new(project_dir: impl Into<PathBuf>, name: Option<String>, files: &[PathBuf]) -> Self {
        let root = project_dir.into();
        let name = name.unwrap_or_else(|| BatchRoot::from_dir(root.clone()).name);
        let items = files
            .iter()
            .map(|file| {
                let path = if file.is_absolute() {
                    file.clone()
                } else {
                    root.join(file)
                };
                SelectedItem {
                    name: file.display().to_string(),
                    path: path.starts_with(&root).then_some(path),
                }
            })
            .collect();

        Self {
            project: ProjectInfo { root, name },
            items,
        }
    }
}

impl ProjectSelection for PathSelection {
    fn active_project(&self) -> Option<ProjectInfo> {
        Some(self.project.clone())
    }

    fn selected_items(&self) -> Vec<SelectedItem> {
        self.items.clone()
    }
}

/// Turn the current selection into a batch rooted at the active project.
///
/// Items that cannot be synced are reported on `pane` and left out. Returns
/// `None` when there is no active project.
pub fn build_selected_batch(
    selection: &dyn ProjectSelection,
    pane: &dyn OutputPane,
) -> Option<FileBatch> {
    let Some(project) = selection.active_project() else {
        pane.write_line(NO_ACTIVE_PROJECT_MESSAGE);
        return None;
    };

    let mut files = Vec::new();
    for item in selection.selected_items() {
        match item.path {
            None => pane.write_line(&format!("Skip {} (not a project item)", item.name)),
            Some(path) if is_file(&path) => files.push(path),
            Some(_) => pane.write_line(&format!("Skip {} (file not exists)", item.name)),
        }
    }

    debug!(
        "Selected {} files of project {}",
        files.len(),
        project.name
    );
    Some(FileBatch::new(
        files,
        Some(BatchRoot::new(project.root, project.name)),
    ))
}

fn is_file(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_file())
}
