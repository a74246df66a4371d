// to be called on startup and quit; saves the project so we can reload it later
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::pipeline::project::ProjectState;

const GRIDTTY_DIR: &str = ".gridtty";
const PROJECT_FILE: &str = "project.json";

// <project_dir>/.gridtty/project.json
pub fn project_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(GRIDTTY_DIR).join(PROJECT_FILE)
}

/// None when there is no file yet or it cannot be parsed.
pub fn load_project(project_dir: &Path) -> Option<ProjectState> {
    let path = project_file_path(project_dir);
    let data = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str::<ProjectState>(&data) {
        Ok(state) => {
            log::info!("loaded {}", path.display());
            Some(state.normalized())
        }
        Err(e) => {
            log::warn!("ignoring unreadable {}: {e}", path.display());
            None
        }
    }
}

// Save the project state to disk, making the files if they don't exist already
pub fn save_project(project_dir: &Path, state: &ProjectState) -> anyhow::Result<()> {
    let path = project_file_path(project_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    log::info!("saved {}", path.display());
    Ok(())
}
