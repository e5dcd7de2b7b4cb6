//! Persistence of the single active task as a JSON record.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VerifaiError};
use crate::task::{Difficulty, Iteration, Task};

/// On-disk shape of a task. Iteration states are positional: `null` marks an
/// iteration that has not passed yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub prompt: String,
    pub rubric: Option<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub iteration_count: usize,
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub window_minutes: Option<u32>,
    pub restricting: bool,
    pub iteration_states: Vec<Option<String>>,
    #[serde(default)]
    pub has_baseline: bool,
}

impl From<&Task> for TaskRecord {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            prompt: task.prompt.clone(),
            rubric: task.rubric.clone(),
            difficulty: task.difficulty,
            iteration_count: task.iterations.len(),
            start_time: task.start_time,
            window_minutes: task.window_minutes,
            restricting: task.restricting,
            iteration_states: task.iterations.iter().map(|it| it.state.clone()).collect(),
            has_baseline: task.has_baseline,
        }
    }
}

impl TryFrom<TaskRecord> for Task {
    type Error = VerifaiError;

    fn try_from(record: TaskRecord) -> Result<Self> {
        if record.iteration_states.len() != record.iteration_count {
            return Err(VerifaiError::CorruptRecord(format!(
                "iteration_count is {} but {} states are stored",
                record.iteration_count,
                record.iteration_states.len()
            )));
        }
        if record.has_baseline && !matches!(record.iteration_states.first(), Some(Some(_))) {
            return Err(VerifaiError::CorruptRecord(
                "baseline flag set but iteration 0 is unresolved".into(),
            ));
        }

        let task = Task {
            id: record.id,
            prompt: record.prompt,
            rubric: record.rubric,
            difficulty: record.difficulty,
            iterations: record
                .iteration_states
                .into_iter()
                .map(|state| Iteration { state })
                .collect(),
            start_time: record.start_time,
            window_minutes: record.window_minutes,
            restricting: record.restricting,
            has_baseline: record.has_baseline,
        };

        if !task.has_resolved_prefix() {
            return Err(VerifaiError::CorruptRecord(
                "a resolved iteration follows an unresolved one".into(),
            ));
        }
        Ok(task)
    }
}

/// Replace `path` with `contents` via a sibling `.tmp` file and a rename, so
/// a crash mid-write never leaves a truncated file behind.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut file = File::create(&tmp_path)?;
    file.write_all(contents.as_bytes())?;
    if let Err(e) = file.sync_all() {
        tracing::warn!(path = %tmp_path.display(), error = %e, "failed to sync temp file");
    }
    drop(file);

    fs::rename(&tmp_path, path)
}

pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("task.json"),
        }
    }

    pub fn load(&self) -> Result<Option<Task>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        let record: TaskRecord = serde_json::from_str(&contents)?;
        Ok(Some(Task::try_from(record)?))
    }

    /// Like [`load`](Self::load), but a task whose iterations have all passed
    /// is deleted and reported as absent.
    pub fn load_active(&self) -> Result<Option<Task>> {
        match self.load()? {
            Some(task) if task.is_complete() => {
                tracing::info!(task = %task.id, "removing completed task");
                self.clear()?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    pub fn save(&self, task: &Task) -> Result<()> {
        let json = serde_json::to_string_pretty(&TaskRecord::from(task))?;
        write_atomic(&self.path, &json)?;
        Ok(())
    }

    /// Remove the stored record, readable or not.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
