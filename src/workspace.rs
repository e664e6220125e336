use crate::config::AppConfig;
use crate::domain::RecordId;
use crate::domain::list::driven_ports::{ActiveListMemory, ListReader, ListWriter};
use crate::domain::list::{ListError, ListRemoval, ListStore, NewList, TaskList};
use crate::domain::session::driven_ports::Identity;
use crate::domain::session::{self, AuthError};
use crate::domain::task::driven_ports::{TaskReader, TaskWriter};
use crate::domain::task::{NewTask, Task, TaskError, TaskFilter, TaskStore, TaskUpdate};
use crate::external_connections::ExternalConnectivity;
use crate::persistence::local_driven_ports::StorageError;
use crate::persistence::{self, Backend};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{error, info};

const LOAD_LISTS_FAILED: &str = "Failed to load task lists. Please try again.";
const ADD_LIST_FAILED: &str = "Failed to create new list. Please try again.";
const SELECT_LIST_FAILED: &str = "Failed to switch lists. Please try again.";
const REMOVE_LIST_FAILED: &str = "Failed to delete list. Please try again.";
const LOAD_TASKS_FAILED: &str = "Failed to load tasks. Please try again.";
const ADD_TASK_FAILED: &str = "Failed to add task. Please try again.";
const UPDATE_TASK_FAILED: &str = "Failed to update task. Please try again.";
const TASK_STATUS_FAILED: &str = "Failed to update task status. Please try again.";
const REMOVE_TASK_FAILED: &str = "Failed to delete task. Please try again.";
const CLEAR_COMPLETED_FAILED: &str = "Failed to clear completed tasks. Please try again.";
const LOGOUT_FAILED: &str = "Failed to log out. Please try again.";

/// Everything a storage backend has to provide
pub trait Persistence:
    ListReader + ListWriter + ActiveListMemory + TaskReader + TaskWriter + Identity
{
}

impl<T> Persistence for T where
    T: ListReader + ListWriter + ActiveListMemory + TaskReader + TaskWriter + Identity
{
}

#[derive(Debug, Error)]
pub enum InitError {
    #[error("could not build the HTTP client: {0}")]
    Connectivity(#[from] reqwest::Error),
    #[error("could not open local storage: {0}")]
    Storage(#[from] StorageError),
}

/// The user's lists and the tasks of the active list, bound to one storage backend.
///
/// Failed operations are logged, their user-facing message is put in the error banner and the
/// error is handed back to the caller.
pub struct Workspace<C = persistence::ExternalConnectivity, B = Backend> {
    ext_cxn: C,
    backend: B,
    lists: ListStore,
    tasks: TaskStore,
    banner: Mutex<Option<String>>,
}

impl Workspace {
    /// Builds the connectivity and the backend picked by [config]. Nothing is fetched yet.
    pub fn init(config: &AppConfig) -> Result<Self, InitError> {
        let ext_cxn = persistence::ExternalConnectivity::new()?;
        let backend = Backend::from_config(&config.backend)?;
        info!("Workspace initialized");

        Ok(Workspace::new(ext_cxn, backend))
    }
}

impl<C: ExternalConnectivity, B: Persistence> Workspace<C, B> {
    pub fn new(ext_cxn: C, backend: B) -> Self {
        Workspace {
            ext_cxn,
            backend,
            lists: ListStore::new(),
            tasks: TaskStore::new(),
            banner: Mutex::new(None),
        }
    }

    pub fn dispose(self) {
        info!("Workspace disposed");
    }

    /// The message currently shown in the error banner
    pub fn error_message(&self) -> Option<String> {
        self.banner.lock().clone()
    }

    pub fn dismiss_error(&self) {
        *self.banner.lock() = None;
    }

    fn show_error(&self, message: String) {
        *self.banner.lock() = Some(message);
    }

    fn report_list_error(&self, err: &ListError, fallback: &str) {
        error!("{fallback} Cause: {err:#}");
        self.show_error(err.user_message(fallback));
    }

    fn report_task_error(&self, err: &TaskError, fallback: &str) {
        error!("{fallback} Cause: {err:#}");
        self.show_error(err.user_message(fallback));
    }

    pub fn lists(&self) -> Vec<TaskList> {
        self.lists.lists()
    }

    pub fn active_list(&self) -> Option<TaskList> {
        self.lists.active_list()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.tasks()
    }

    pub fn visible_tasks(&self, filter: TaskFilter) -> Vec<Task> {
        self.tasks.filter_by(filter)
    }

    pub fn count_active(&self) -> usize {
        self.tasks.count_active()
    }

    pub fn count_completed(&self) -> usize {
        self.tasks.count_completed()
    }

    /// Loads the tasks of the active list if the task store is still showing another one
    async fn follow_active_list(&self) {
        let Some(active) = self.lists.active_list_id() else {
            return;
        };
        if self.tasks.active_list_id().as_ref() == Some(&active) {
            return;
        }

        if let Err(err) = self.tasks.load(&active, &self.ext_cxn, &self.backend).await {
            self.report_task_error(&err, LOAD_TASKS_FAILED);
        }
    }

    pub async fn load_lists(&self) -> Result<Vec<TaskList>, ListError> {
        let loaded = self
            .lists
            .load(&self.ext_cxn, &self.backend, &self.backend, &self.backend)
            .await;
        match loaded {
            Ok(lists) => {
                self.follow_active_list().await;
                Ok(lists)
            }
            Err(err) => {
                self.report_list_error(&err, LOAD_LISTS_FAILED);
                Err(err)
            }
        }
    }

    pub async fn add_list(&self, new_list: NewList) -> Result<TaskList, ListError> {
        let added = self
            .lists
            .add(new_list, &self.ext_cxn, &self.backend, &self.backend)
            .await;
        self.after_list_change(added, ADD_LIST_FAILED).await
    }

    /// Adds a list with a generated name and color, like the "new list" button does
    pub async fn add_generated_list(&self) -> Result<TaskList, ListError> {
        let added = self
            .lists
            .add_generated(&self.ext_cxn, &self.backend, &self.backend)
            .await;
        self.after_list_change(added, ADD_LIST_FAILED).await
    }

    pub async fn select_list(&self, list_id: &RecordId) -> Result<(), ListError> {
        let selected = self
            .lists
            .set_active(list_id, &self.ext_cxn, &self.backend)
            .await;
        self.after_list_change(selected, SELECT_LIST_FAILED).await
    }

    pub async fn remove_list(&self, list_id: &RecordId) -> Result<ListRemoval, ListError> {
        let removed = self
            .lists
            .remove(
                list_id,
                &self.ext_cxn,
                &self.backend,
                &self.backend,
                &self.backend,
                &self.backend,
            )
            .await;
        if removed.is_err() && self.tasks.active_list_id().as_ref() == Some(list_id) {
            // Some of the list's tasks may already be gone
            self.tasks.reconcile(&self.ext_cxn, &self.backend).await;
        }
        self.after_list_change(removed, REMOVE_LIST_FAILED).await
    }

    async fn after_list_change<T>(
        &self,
        result: Result<T, ListError>,
        fallback: &str,
    ) -> Result<T, ListError> {
        match result {
            Ok(value) => {
                self.follow_active_list().await;
                Ok(value)
            }
            Err(err) => {
                self.report_list_error(&err, fallback);
                Err(err)
            }
        }
    }

    /// Re-fetches the tasks of the active list
    pub async fn load_tasks(&self) -> Result<Vec<Task>, TaskError> {
        let loaded = match self.lists.active_list_id() {
            Some(list_id) => self.tasks.load(&list_id, &self.ext_cxn, &self.backend).await,
            None => Err(TaskError::NoActiveList),
        };
        self.reported(loaded, LOAD_TASKS_FAILED)
    }

    pub async fn add_task(&self, new_task: NewTask) -> Result<Task, TaskError> {
        let added = self.tasks.add(new_task, &self.ext_cxn, &self.backend).await;
        self.reported(added, ADD_TASK_FAILED)
    }

    pub async fn update_task(
        &self,
        task_id: &RecordId,
        update: TaskUpdate,
    ) -> Result<Task, TaskError> {
        let updated = self
            .tasks
            .update(task_id, update, &self.ext_cxn, &self.backend)
            .await;
        self.reported(updated, UPDATE_TASK_FAILED)
    }

    pub async fn set_completed(
        &self,
        task_id: &RecordId,
        is_completed: bool,
    ) -> Result<(), TaskError> {
        let changed = self
            .tasks
            .set_completed(task_id, is_completed, &self.ext_cxn, &self.backend)
            .await;
        self.reported(changed, TASK_STATUS_FAILED)
    }

    pub async fn toggle_completed(&self, task_id: &RecordId) -> Result<(), TaskError> {
        let toggled = self
            .tasks
            .toggle_completed(task_id, &self.ext_cxn, &self.backend)
            .await;
        self.reported(toggled, TASK_STATUS_FAILED)
    }

    pub async fn remove_task(&self, task_id: &RecordId) -> Result<(), TaskError> {
        let removed = self
            .tasks
            .remove(task_id, &self.ext_cxn, &self.backend, &self.backend)
            .await;
        self.reported(removed, REMOVE_TASK_FAILED)
    }

    /// Deletes every completed task of the active list, returning how many were deleted
    pub async fn clear_completed(&self) -> Result<usize, TaskError> {
        let cleared = match self.tasks.active_list_id() {
            Some(list_id) => {
                self.tasks
                    .clear_completed(&list_id, &self.ext_cxn, &self.backend, &self.backend)
                    .await
            }
            None => Err(TaskError::NoActiveList),
        };
        self.reported(cleared, CLEAR_COMPLETED_FAILED)
    }

    fn reported<T>(&self, result: Result<T, TaskError>, fallback: &str) -> Result<T, TaskError> {
        if let Err(err) = &result {
            self.report_task_error(err, fallback);
        }
        result
    }

    pub async fn is_authenticated(&self) -> bool {
        session::check_auth(&self.ext_cxn, &self.backend).await
    }

    pub async fn logout(&self) -> Result<(), AuthError> {
        let result = session::logout(&self.ext_cxn, &self.backend).await;
        if let Err(err) = &result {
            error!("{LOGOUT_FAILED} Cause: {err:#}");
            self.show_error(LOGOUT_FAILED.to_owned());
        }
        result
    }
}
