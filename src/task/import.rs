#![forbid(unsafe_code)]

use std::path::Path;

use serde::Deserialize;

use crate::error::TodoError;
use crate::task::model::{NewTask, Priority};

const SUPPORTED_VERSION: &str = "1.0";

#[derive(Debug, Deserialize)]
struct TaskFile {
    version: String,
    #[serde(default)]
    defaults: Option<TaskFileDefaults>,
    tasks: Vec<TaskFileEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct TaskFileDefaults {
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskFileEntry {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default, alias = "due")]
    due_date: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

/// Parses a batch of new tasks from YAML (JSON is accepted as a YAML subset).
///
/// ```yaml
/// version: "1.0"
/// defaults:
///   category: home
/// tasks:
///   - title: Buy milk
///     priority: high
/// ```
pub fn parse_task_file(data: &str) -> Result<Vec<NewTask>, TodoError> {
    let file: TaskFile = serde_yaml::from_str(data)
        .map_err(|e| TodoError::Validation(format!("invalid task file: {e}")))?;

    if file.version.trim() != SUPPORTED_VERSION {
        return Err(TodoError::Validation(format!(
            "unsupported task file version: {} (expected {SUPPORTED_VERSION})",
            file.version
        )));
    }

    let defaults = file.defaults.unwrap_or_default();
    Ok(file
        .tasks
        .into_iter()
        .map(|e| NewTask {
            title: e.title,
            description: e.description,
            priority: e.priority.or(defaults.priority),
            due_date: e.due_date,
            category: e.category.or_else(|| defaults.category.clone()),
        })
        .collect())
}

pub fn load_task_file(path: &Path) -> Result<Vec<NewTask>, TodoError> {
    let data = std::fs::read_to_string(path).map_err(|source| TodoError::IoPath {
        path: path.to_path_buf(),
        source,
    })?;
    parse_task_file(&data)
}
