//! Selection sources
//!
//! Where a run's files come from: the working-tree changes of a repository,
//! or an explicit pick of project items.

pub mod changes;
pub mod error;
pub mod repo;
pub mod selection;

pub use changes::{parse_porcelain_z, ChangeSource, GitChangeSource};
pub use error::SourceError;
pub use repo::{find_repo_root, REPO_MARKER};
pub use selection::{
    build_selected_batch, PathSelection, ProjectInfo, ProjectSelection, SelectedItem,
    NO_ACTIVE_PROJECT_MESSAGE,
};
