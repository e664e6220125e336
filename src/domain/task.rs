use crate::domain::{self, RecordId};
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use derive_more::Display;
use driven_ports::{TaskReader, TaskWriter};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use validator::{Validate, ValidationErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[display("low")]
    Low,
    #[default]
    #[display("medium")]
    Medium,
    #[display("high")]
    High,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: RecordId,
    pub title: String,
    pub description: String,
    pub is_completed: bool,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub list_id: RecordId,
}

/// Fields a user fills in when creating a task. New tasks always start out incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Default, Validate)]
pub struct NewTask {
    #[validate(length(min = 1))]
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
}

impl NewTask {
    /// A task with only a title; every other field takes its default.
    pub fn titled(title: impl Into<String>) -> NewTask {
        NewTask {
            title: title.into(),
            ..NewTask::default()
        }
    }

    fn normalized(self) -> NewTask {
        NewTask {
            title: self.title.trim().to_owned(),
            description: self.description.trim().to_owned(),
            ..self
        }
    }
}

/// Full-field replacement of a task's editable content
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct TaskUpdate {
    #[validate(length(min = 1))]
    pub title: String,
    pub description: String,
    pub is_completed: bool,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
}

impl TaskUpdate {
    fn normalized(self) -> TaskUpdate {
        TaskUpdate {
            title: self.title.trim().to_owned(),
            description: self.description.trim().to_owned(),
            ..self
        }
    }
}

impl From<&Task> for TaskUpdate {
    fn from(task: &Task) -> Self {
        TaskUpdate {
            title: task.title.clone(),
            description: task.description.clone(),
            is_completed: task.is_completed,
            priority: task.priority,
            due_date: task.due_date,
        }
    }
}

/// Which tasks of a list to show or fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl TaskFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Active => !task.is_completed,
            Self::Completed => task.is_completed,
        }
    }
}

pub mod driven_ports {
    use super::*;

    pub trait TaskReader {
        /// Fetches the tasks of a list matching [filter], most recently created first
        async fn tasks_for_list(
            &self,
            list_id: &RecordId,
            filter: TaskFilter,
            ext_cxn: &impl ExternalConnectivity,
        ) -> Result<Vec<Task>, anyhow::Error>;
    }

    pub trait TaskWriter {
        async fn create_task(
            &self,
            list_id: &RecordId,
            new_task: &NewTask,
            ext_cxn: &impl ExternalConnectivity,
        ) -> Result<Task, anyhow::Error>;

        async fn update_task(
            &self,
            task_id: &RecordId,
            update: &TaskUpdate,
            ext_cxn: &impl ExternalConnectivity,
        ) -> Result<Task, anyhow::Error>;

        async fn set_completed(
            &self,
            task_id: &RecordId,
            is_completed: bool,
            ext_cxn: &impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;

        /// Deleting a task that is already gone must succeed.
        async fn delete_task(
            &self,
            task_id: &RecordId,
            ext_cxn: &impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;
    }
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("input was invalid: {0}")]
    Invalid(#[from] ValidationErrors),
    #[error("no task list is active")]
    NoActiveList,
    #[error("task {0} does not exist")]
    DoesNotExist(RecordId),
    #[error(transparent)]
    PortError(#[from] anyhow::Error),
}

impl TaskError {
    /// Short message for the error banner. [fallback] describes the failed operation.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Invalid(validation_errors) => {
                domain::banner_message(Some(validation_errors), None, fallback)
            }
            Self::PortError(err) => domain::banner_message(None, Some(err), fallback),
            Self::NoActiveList | Self::DoesNotExist(_) => fallback.to_owned(),
        }
    }
}

/// Deletes every task in [task_ids], attempting all of them even when some fail. Returns how
/// many were deleted, or an error describing the failures once every attempt has finished.
pub(crate) async fn delete_tasks_best_effort(
    task_ids: &[RecordId],
    ext_cxn: &impl ExternalConnectivity,
    task_write: &impl TaskWriter,
) -> Result<usize, anyhow::Error> {
    let results = join_all(
        task_ids
            .iter()
            .map(|task_id| task_write.delete_task(task_id, ext_cxn)),
    )
    .await;

    let mut failures = Vec::new();
    for (task_id, result) in task_ids.iter().zip(results) {
        if let Err(err) = result {
            warn!("Failed to delete task {task_id}: {err:#}");
            failures.push(err);
        }
    }

    match failures.into_iter().next() {
        None => Ok(task_ids.len()),
        Some(first_failure) => Err(first_failure.context(format!(
            "deleting {} tasks did not fully succeed",
            task_ids.len()
        ))),
    }
}

#[derive(Default)]
struct TaskState {
    list_id: Option<RecordId>,
    tasks: Vec<Task>,
    generation: u64,
}

/// Identifies one in-flight fetch. Only the most recent fetch may write its results.
struct FetchTicket {
    generation: u64,
}

/// Holds the tasks of the active list. Mutations are applied locally first and then sent to the
/// backend. A failed removal is reconciled by fetching the list again, while a failed completion
/// toggle is reverted in place.
#[derive(Default)]
pub struct TaskStore {
    state: Mutex<TaskState>,
}

impl TaskStore {
    pub fn new() -> TaskStore {
        TaskStore::default()
    }

    pub fn active_list_id(&self) -> Option<RecordId> {
        self.state.lock().list_id.clone()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state.lock().tasks.clone()
    }

    pub fn filter_by(&self, filter: TaskFilter) -> Vec<Task> {
        self.state
            .lock()
            .tasks
            .iter()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect()
    }

    pub fn count_active(&self) -> usize {
        self.count_matching(TaskFilter::Active)
    }

    pub fn count_completed(&self) -> usize {
        self.count_matching(TaskFilter::Completed)
    }

    fn count_matching(&self, filter: TaskFilter) -> usize {
        self.state
            .lock()
            .tasks
            .iter()
            .filter(|task| filter.matches(task))
            .count()
    }

    /// Fetches the tasks of [list_id] and makes it the store's list. If another load starts
    /// before this one returns, the fetched tasks are returned but not applied.
    pub async fn load(
        &self,
        list_id: &RecordId,
        ext_cxn: &impl ExternalConnectivity,
        task_read: &impl TaskReader,
    ) -> Result<Vec<Task>, TaskError> {
        let ticket = self.begin_fetch(list_id);
        let fetched = task_read
            .tasks_for_list(list_id, TaskFilter::All, ext_cxn)
            .await
            .context("fetching the tasks of a list")?;

        self.finish_fetch(ticket, &fetched);
        Ok(fetched)
    }

    fn begin_fetch(&self, list_id: &RecordId) -> FetchTicket {
        let mut state = self.state.lock();
        state.generation += 1;
        if state.list_id.as_ref() != Some(list_id) {
            state.list_id = Some(list_id.clone());
            state.tasks.clear();
        }

        FetchTicket {
            generation: state.generation,
        }
    }

    fn finish_fetch(&self, ticket: FetchTicket, fetched: &[Task]) {
        let mut state = self.state.lock();
        if state.generation != ticket.generation {
            debug!(
                "Discarding stale task fetch (generation {} superseded by {})",
                ticket.generation, state.generation
            );
            return;
        }

        state.tasks = fetched.to_vec();
    }

    /// Re-fetches the current list after a failed mutation. Failures here are only logged.
    pub async fn reconcile(
        &self,
        ext_cxn: &impl ExternalConnectivity,
        task_read: &impl TaskReader,
    ) {
        let Some(list_id) = self.active_list_id() else {
            return;
        };

        if let Err(err) = self.load(&list_id, ext_cxn, task_read).await {
            error!("Error reloading tasks for list {list_id}: {err:#}");
        }
    }

    pub async fn add(
        &self,
        new_task: NewTask,
        ext_cxn: &impl ExternalConnectivity,
        task_write: &impl TaskWriter,
    ) -> Result<Task, TaskError> {
        let new_task = new_task.normalized();
        new_task.validate()?;
        let list_id = self.active_list_id().ok_or(TaskError::NoActiveList)?;

        let created = task_write
            .create_task(&list_id, &new_task, ext_cxn)
            .await
            .context("creating a task")?;
        info!("Created task {} in list {list_id}", created.id);

        let mut state = self.state.lock();
        if state.list_id.as_ref() == Some(&list_id) {
            state.tasks.insert(0, created.clone());
        }

        Ok(created)
    }

    pub async fn update(
        &self,
        task_id: &RecordId,
        update: TaskUpdate,
        ext_cxn: &impl ExternalConnectivity,
        task_write: &impl TaskWriter,
    ) -> Result<Task, TaskError> {
        let update = update.normalized();
        update.validate()?;

        let updated = task_write
            .update_task(task_id, &update, ext_cxn)
            .await
            .context("updating a task")?;

        let mut state = self.state.lock();
        if let Some(existing) = state.tasks.iter_mut().find(|task| &task.id == task_id) {
            *existing = updated.clone();
        }

        Ok(updated)
    }

    /// Optimistically sets the completion flag, reverting it if the backend rejects the change.
    pub async fn set_completed(
        &self,
        task_id: &RecordId,
        is_completed: bool,
        ext_cxn: &impl ExternalConnectivity,
        task_write: &impl TaskWriter,
    ) -> Result<(), TaskError> {
        let previous = self
            .replace_completion(task_id, is_completed)
            .ok_or_else(|| TaskError::DoesNotExist(task_id.clone()))?;

        let write_result = task_write
            .set_completed(task_id, is_completed, ext_cxn)
            .await;
        if let Err(err) = write_result {
            self.replace_completion(task_id, previous);
            return Err(TaskError::from(err.context("setting task completion")));
        }

        Ok(())
    }

    pub async fn toggle_completed(
        &self,
        task_id: &RecordId,
        ext_cxn: &impl ExternalConnectivity,
        task_write: &impl TaskWriter,
    ) -> Result<(), TaskError> {
        let current = self
            .state
            .lock()
            .tasks
            .iter()
            .find(|task| &task.id == task_id)
            .map(|task| task.is_completed)
            .ok_or_else(|| TaskError::DoesNotExist(task_id.clone()))?;

        self.set_completed(task_id, !current, ext_cxn, task_write)
            .await
    }

    /// Swaps the completion flag of a held task, returning the old value
    fn replace_completion(&self, task_id: &RecordId, is_completed: bool) -> Option<bool> {
        let mut state = self.state.lock();
        let task = state.tasks.iter_mut().find(|task| &task.id == task_id)?;

        Some(std::mem::replace(&mut task.is_completed, is_completed))
    }

    /// Optimistically removes a task. Removing a task that is already gone succeeds.
    pub async fn remove(
        &self,
        task_id: &RecordId,
        ext_cxn: &impl ExternalConnectivity,
        task_read: &impl TaskReader,
        task_write: &impl TaskWriter,
    ) -> Result<(), TaskError> {
        self.state.lock().tasks.retain(|task| &task.id != task_id);

        if let Err(err) = task_write.delete_task(task_id, ext_cxn).await {
            self.reconcile(ext_cxn, task_read).await;
            return Err(TaskError::from(err.context("deleting a task")));
        }

        Ok(())
    }

    /// Optimistically removes every completed task of [list_id], then deletes the completed
    /// records the backend knows about.
    pub async fn clear_completed(
        &self,
        list_id: &RecordId,
        ext_cxn: &impl ExternalConnectivity,
        task_read: &impl TaskReader,
        task_write: &impl TaskWriter,
    ) -> Result<usize, TaskError> {
        {
            let mut state = self.state.lock();
            if state.list_id.as_ref() == Some(list_id) {
                state.tasks.retain(|task| !task.is_completed);
            }
        }

        let cleared = async {
            let completed_ids: Vec<RecordId> = task_read
                .tasks_for_list(list_id, TaskFilter::Completed, ext_cxn)
                .await
                .context("fetching completed tasks")?
                .into_iter()
                .map(|task| task.id)
                .collect();

            delete_tasks_best_effort(&completed_ids, ext_cxn, task_write).await
        }
        .await;

        match cleared {
            Ok(count) => {
                info!("Cleared {count} completed tasks from list {list_id}");
                Ok(count)
            }
            Err(err) => {
                self.reconcile(ext_cxn, task_read).await;
                Err(TaskError::from(
                    err.context(format!("clearing completed tasks of list {list_id}")),
                ))
            }
        }
    }
}
