//! On-device backend. Lists, tasks and the active list id live in JSON files under a data
//! directory. Everything is read once when the backend is opened and every change rewrites the
//! affected file atomically on the blocking thread pool.

use crate::domain::RecordId;
use crate::domain::list::driven_ports::{ActiveListMemory, ListReader, ListWriter};
use crate::domain::list::{NewList, TaskList};
use crate::domain::session::driven_ports::Identity;
use crate::domain::task::driven_ports::{TaskReader, TaskWriter};
use crate::domain::task::{NewTask, Priority, Task, TaskFilter, TaskUpdate};
use crate::external_connections::ExternalConnectivity;
use anyhow::{Context, Error};
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

const LISTS_FILE: &str = "taskflow-lists.json";
const TASKS_FILE: &str = "taskflow-tasks.json";
const ACTIVE_LIST_FILE: &str = "taskflow-active-list.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage write did not finish: {0}")]
    Interrupted(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredList {
    id: RecordId,
    name: String,
    color: String,
}

impl From<StoredList> for TaskList {
    fn from(value: StoredList) -> Self {
        TaskList {
            id: value.id,
            name: value.name,
            color: value.color,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTask {
    id: RecordId,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    is_completed: bool,
    #[serde(default)]
    priority: Priority,
    #[serde(default)]
    due_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    list_id: RecordId,
}

impl From<StoredTask> for Task {
    fn from(value: StoredTask) -> Self {
        Task {
            id: value.id,
            title: value.title,
            description: value.description,
            is_completed: value.is_completed,
            priority: value.priority,
            due_date: value.due_date,
            created_at: Some(value.created_at),
            updated_at: Some(value.updated_at),
            list_id: value.list_id,
        }
    }
}

#[derive(Default)]
struct LocalData {
    lists: Vec<StoredList>,
    tasks: Vec<StoredTask>,
    active_list: Option<RecordId>,
}

/// Driven adapter keeping everything in JSON files under one data directory
pub struct LocalBackend {
    root: PathBuf,
    data: Mutex<LocalData>,
}

impl LocalBackend {
    /// Opens the data directory, creating it if needed. Missing files count as empty.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            path: root.clone(),
            source,
        })?;

        let data = LocalData {
            lists: load_json(&root.join(LISTS_FILE))?.unwrap_or_default(),
            tasks: load_json(&root.join(TASKS_FILE))?.unwrap_or_default(),
            active_list: load_json::<Option<RecordId>>(&root.join(ACTIVE_LIST_FILE))?.flatten(),
        };
        debug!(
            "Opened local storage at {} with {} lists and {} tasks",
            root.display(),
            data.lists.len(),
            data.tasks.len()
        );

        Ok(LocalBackend {
            root,
            data: Mutex::new(data),
        })
    }

    /// Applies [change] to a copy of the lists, persists the copy and only then commits it
    async fn change_lists<T>(
        &self,
        change: impl FnOnce(&mut Vec<StoredList>) -> T,
    ) -> Result<T, StorageError> {
        let mut data = self.data.lock().await;
        let mut lists = data.lists.clone();
        let outcome = change(&mut lists);
        persist(self.root.join(LISTS_FILE), &lists).await?;
        data.lists = lists;

        Ok(outcome)
    }

    /// Applies [change] to a copy of the tasks, persists the copy and only then commits it
    async fn change_tasks<T>(
        &self,
        change: impl FnOnce(&mut Vec<StoredTask>) -> T,
    ) -> Result<T, StorageError> {
        let mut data = self.data.lock().await;
        let mut tasks = data.tasks.clone();
        let outcome = change(&mut tasks);
        persist(self.root.join(TASKS_FILE), &tasks).await?;
        data.tasks = tasks;

        Ok(outcome)
    }
}

fn generate_id() -> RecordId {
    RecordId::Text(Uuid::now_v7().to_string())
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StorageError::Io {
                path: path.to_owned(),
                source,
            });
        }
    };

    let parsed = serde_json::from_str(&raw).map_err(|source| StorageError::Json {
        path: path.to_owned(),
        source,
    })?;
    Ok(Some(parsed))
}

/// Serializes [data] and writes it to [path] from the blocking thread pool. Callers hold the
/// data lock until this returns, so writes to one file never overtake each other.
async fn persist<T: Serialize>(path: PathBuf, data: &T) -> Result<(), StorageError> {
    let json = serde_json::to_vec_pretty(data).map_err(|source| StorageError::Json {
        path: path.clone(),
        source,
    })?;

    tokio::task::spawn_blocking(move || write_atomic(&path, &json)).await?
}

fn write_atomic(path: &Path, json: &[u8]) -> Result<(), StorageError> {
    let io_err = |source: std::io::Error| StorageError::Io {
        path: path.to_owned(),
        source,
    };

    let temp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&temp_path).map_err(io_err)?;
        file.write_all(json).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
    }
    fs::rename(&temp_path, path).map_err(io_err)?;

    Ok(())
}

impl ListReader for LocalBackend {
    async fn all_lists(
        &self,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Vec<TaskList>, Error> {
        let data = self.data.lock().await;
        Ok(data.lists.iter().cloned().map(TaskList::from).collect())
    }
}

impl ListWriter for LocalBackend {
    async fn create_list(
        &self,
        new_list: &NewList,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<TaskList, Error> {
        let stored = StoredList {
            id: generate_id(),
            name: new_list.name.clone(),
            color: new_list.color.clone(),
        };
        self.change_lists(|lists| lists.push(stored.clone()))
            .await
            .context("saving a new task list")?;

        Ok(stored.into())
    }

    async fn delete_list(
        &self,
        list_id: &RecordId,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<(), Error> {
        self.change_lists(|lists| lists.retain(|list| &list.id != list_id))
            .await
            .with_context(|| format!("deleting task list {list_id}"))?;

        Ok(())
    }
}

impl ActiveListMemory for LocalBackend {
    async fn recall_active_list(
        &self,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Option<RecordId>, Error> {
        Ok(self.data.lock().await.active_list.clone())
    }

    async fn remember_active_list(
        &self,
        list_id: Option<&RecordId>,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut data = self.data.lock().await;
        persist(self.root.join(ACTIVE_LIST_FILE), &list_id)
            .await
            .context("saving the active task list")?;
        data.active_list = list_id.cloned();

        Ok(())
    }
}

impl TaskReader for LocalBackend {
    async fn tasks_for_list(
        &self,
        list_id: &RecordId,
        filter: TaskFilter,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Vec<Task>, Error> {
        let data = self.data.lock().await;
        Ok(data
            .tasks
            .iter()
            .rev()
            .filter(|task| &task.list_id == list_id)
            .cloned()
            .map(Task::from)
            .filter(|task| filter.matches(task))
            .collect())
    }
}

impl TaskWriter for LocalBackend {
    async fn create_task(
        &self,
        list_id: &RecordId,
        new_task: &NewTask,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Task, Error> {
        let now = Utc::now();
        let stored = StoredTask {
            id: generate_id(),
            title: new_task.title.clone(),
            description: new_task.description.clone(),
            is_completed: false,
            priority: new_task.priority,
            due_date: new_task.due_date,
            created_at: now,
            updated_at: now,
            list_id: list_id.clone(),
        };
        self.change_tasks(|tasks| tasks.push(stored.clone()))
            .await
            .with_context(|| format!("saving a new task in list {list_id}"))?;

        Ok(stored.into())
    }

    async fn update_task(
        &self,
        task_id: &RecordId,
        update: &TaskUpdate,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Task, Error> {
        let updated = self
            .change_tasks(|tasks| {
                let task = tasks.iter_mut().find(|task| &task.id == task_id)?;
                task.title = update.title.clone();
                task.description = update.description.clone();
                task.is_completed = update.is_completed;
                task.priority = update.priority;
                task.due_date = update.due_date;
                task.updated_at = Utc::now();
                Some(task.clone())
            })
            .await
            .with_context(|| format!("updating task {task_id}"))?
            .with_context(|| format!("task {task_id} is not stored locally"))?;

        Ok(updated.into())
    }

    async fn set_completed(
        &self,
        task_id: &RecordId,
        is_completed: bool,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let found = self
            .change_tasks(|tasks| {
                let task = tasks.iter_mut().find(|task| &task.id == task_id)?;
                task.is_completed = is_completed;
                task.updated_at = Utc::now();
                Some(())
            })
            .await
            .with_context(|| format!("updating completion of task {task_id}"))?;

        found.with_context(|| format!("task {task_id} is not stored locally"))
    }

    async fn delete_task(
        &self,
        task_id: &RecordId,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<(), Error> {
        self.change_tasks(|tasks| tasks.retain(|task| &task.id != task_id))
            .await
            .with_context(|| format!("deleting task {task_id}"))?;

        Ok(())
    }
}

/// Nobody signs in to on-device storage
impl Identity for LocalBackend {
    async fn is_authenticated(&self, _ext_cxn: &impl ExternalConnectivity) -> Result<bool, Error> {
        Ok(true)
    }

    async fn logout(&self, _ext_cxn: &impl ExternalConnectivity) -> Result<(), Error> {
        Ok(())
    }
}
