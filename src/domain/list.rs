use crate::domain::task::driven_ports::{TaskReader, TaskWriter};
use crate::domain::task::{self, TaskFilter};
use crate::domain::{self, RecordId};
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use driven_ports::{ActiveListMemory, ListReader, ListWriter};
use parking_lot::Mutex;
use rand::Rng;
use thiserror::Error;
use tracing::{info, warn};
use validator::{Validate, ValidationErrors};

pub const DEFAULT_LIST_NAME: &str = "My Tasks";
pub const DEFAULT_LIST_COLOR: &str = "#6366f1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskList {
    pub id: RecordId,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct NewList {
    #[validate(length(min = 1))]
    pub name: String,
    pub color: String,
}

impl NewList {
    pub fn default_list() -> NewList {
        NewList {
            name: DEFAULT_LIST_NAME.to_owned(),
            color: DEFAULT_LIST_COLOR.to_owned(),
        }
    }

    /// A list named after its position with a randomly picked hue, used by the "new list" button
    pub fn generated(existing_lists: usize) -> NewList {
        let hue: f64 = rand::thread_rng().gen_range(0.0..360.0);
        NewList {
            name: format!("List {}", existing_lists + 1),
            color: format!("hsl({hue:.0}, 70%, 60%)"),
        }
    }
}

pub mod driven_ports {
    use super::*;

    pub trait ListReader {
        /// Fetches every list, oldest first
        async fn all_lists(
            &self,
            ext_cxn: &impl ExternalConnectivity,
        ) -> Result<Vec<TaskList>, anyhow::Error>;
    }

    pub trait ListWriter {
        async fn create_list(
            &self,
            new_list: &NewList,
            ext_cxn: &impl ExternalConnectivity,
        ) -> Result<TaskList, anyhow::Error>;

        async fn delete_list(
            &self,
            list_id: &RecordId,
            ext_cxn: &impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;
    }

    /// Remembers which list was active between runs. Backends without a place to keep it
    /// simply forget.
    pub trait ActiveListMemory {
        async fn recall_active_list(
            &self,
            ext_cxn: &impl ExternalConnectivity,
        ) -> Result<Option<RecordId>, anyhow::Error>;

        async fn remember_active_list(
            &self,
            list_id: Option<&RecordId>,
            ext_cxn: &impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;
    }
}

#[derive(Debug, Error)]
pub enum ListError {
    #[error("input was invalid: {0}")]
    Invalid(#[from] ValidationErrors),
    #[error("task list {0} does not exist")]
    DoesNotExist(RecordId),
    #[error(transparent)]
    PortError(#[from] anyhow::Error),
}

impl ListError {
    /// Short message for the error banner. [fallback] describes the failed operation.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Invalid(validation_errors) => {
                domain::banner_message(Some(validation_errors), None, fallback)
            }
            Self::PortError(err) => domain::banner_message(None, Some(err), fallback),
            Self::DoesNotExist(_) => fallback.to_owned(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ListRemoval {
    Removed,
    /// The list was the only one left, so nothing was deleted
    KeptLastList,
}

#[derive(Default)]
struct ListState {
    lists: Vec<TaskList>,
    active: Option<RecordId>,
    recalled: bool,
}

/// Holds the user's task lists and which one is active. There is always at least one list once
/// [ListStore::load] has succeeded.
#[derive(Default)]
pub struct ListStore {
    state: Mutex<ListState>,
    load_guard: tokio::sync::Mutex<()>,
}

impl ListStore {
    pub fn new() -> ListStore {
        ListStore::default()
    }

    pub fn lists(&self) -> Vec<TaskList> {
        self.state.lock().lists.clone()
    }

    pub fn active_list_id(&self) -> Option<RecordId> {
        self.state.lock().active.clone()
    }

    pub fn active_list(&self) -> Option<TaskList> {
        let state = self.state.lock();
        let active = state.active.as_ref()?;

        state.lists.iter().find(|list| &list.id == active).cloned()
    }

    /// Fetches all lists, creating the default list when there are none. Concurrent loads run one
    /// after the other so only one of them can create the default list.
    pub async fn load(
        &self,
        ext_cxn: &impl ExternalConnectivity,
        list_read: &impl ListReader,
        list_write: &impl ListWriter,
        memory: &impl ActiveListMemory,
    ) -> Result<Vec<TaskList>, ListError> {
        let _load_guard = self.load_guard.lock().await;

        let mut lists = list_read
            .all_lists(ext_cxn)
            .await
            .context("fetching task lists")?;
        if lists.is_empty() {
            info!("No task lists found, creating the default list");
            let default_list = list_write
                .create_list(&NewList::default_list(), ext_cxn)
                .await
                .context("creating the default task list")?;
            lists = vec![default_list];
        }

        let already_recalled = self.state.lock().recalled;
        let recalled = if already_recalled {
            None
        } else {
            memory
                .recall_active_list(ext_cxn)
                .await
                .unwrap_or_else(|err| {
                    warn!("Could not recall the active list: {err:#}");
                    None
                })
        };

        let changed_active = {
            let mut state = self.state.lock();
            state.lists = lists.clone();
            if !state.recalled {
                state.recalled = true;
                if state.active.is_none() {
                    state.active = recalled;
                }
            }

            let active_exists = state
                .active
                .as_ref()
                .is_some_and(|active| state.lists.iter().any(|list| &list.id == active));
            if active_exists {
                None
            } else {
                state.active = state.lists.first().map(|list| list.id.clone());
                Some(state.active.clone())
            }
        };

        if let Some(new_active) = changed_active {
            remember(new_active.as_ref(), ext_cxn, memory).await;
        }

        Ok(lists)
    }

    /// Creates a list and makes it the active one
    pub async fn add(
        &self,
        new_list: NewList,
        ext_cxn: &impl ExternalConnectivity,
        list_write: &impl ListWriter,
        memory: &impl ActiveListMemory,
    ) -> Result<TaskList, ListError> {
        let new_list = NewList {
            name: new_list.name.trim().to_owned(),
            ..new_list
        };
        new_list.validate()?;

        let created = list_write
            .create_list(&new_list, ext_cxn)
            .await
            .context("creating a task list")?;
        info!("Created task list {} ({})", created.id, created.name);

        {
            let mut state = self.state.lock();
            state.lists.push(created.clone());
            state.active = Some(created.id.clone());
        }
        remember(Some(&created.id), ext_cxn, memory).await;

        Ok(created)
    }

    pub async fn add_generated(
        &self,
        ext_cxn: &impl ExternalConnectivity,
        list_write: &impl ListWriter,
        memory: &impl ActiveListMemory,
    ) -> Result<TaskList, ListError> {
        let existing_lists = self.state.lock().lists.len();

        self.add(NewList::generated(existing_lists), ext_cxn, list_write, memory)
            .await
    }

    pub async fn set_active(
        &self,
        list_id: &RecordId,
        ext_cxn: &impl ExternalConnectivity,
        memory: &impl ActiveListMemory,
    ) -> Result<(), ListError> {
        {
            let mut state = self.state.lock();
            if !state.lists.iter().any(|list| &list.id == list_id) {
                return Err(ListError::DoesNotExist(list_id.clone()));
            }
            state.active = Some(list_id.clone());
        }
        remember(Some(list_id), ext_cxn, memory).await;

        Ok(())
    }

    /// Deletes a list along with all of its tasks. The task deletions are attempted in full
    /// before the list itself is touched; if any of them fail the list is kept.
    pub async fn remove(
        &self,
        list_id: &RecordId,
        ext_cxn: &impl ExternalConnectivity,
        list_write: &impl ListWriter,
        task_read: &impl TaskReader,
        task_write: &impl TaskWriter,
        memory: &impl ActiveListMemory,
    ) -> Result<ListRemoval, ListError> {
        {
            let state = self.state.lock();
            if state.lists.len() <= 1 {
                info!("Refusing to delete the last remaining task list");
                return Ok(ListRemoval::KeptLastList);
            }
            if !state.lists.iter().any(|list| &list.id == list_id) {
                return Err(ListError::DoesNotExist(list_id.clone()));
            }
        }

        let task_ids: Vec<RecordId> = task_read
            .tasks_for_list(list_id, TaskFilter::All, ext_cxn)
            .await
            .context("fetching the tasks of a list being deleted")?
            .into_iter()
            .map(|task| task.id)
            .collect();
        task::delete_tasks_best_effort(&task_ids, ext_cxn, task_write)
            .await
            .context("deleting the tasks of a list")?;
        list_write
            .delete_list(list_id, ext_cxn)
            .await
            .context("deleting a task list")?;
        info!(
            "Deleted task list {list_id} and its {} tasks",
            task_ids.len()
        );

        let changed_active = {
            let mut state = self.state.lock();
            state.lists.retain(|list| &list.id != list_id);
            if state.active.as_ref() == Some(list_id) {
                state.active = state.lists.first().map(|list| list.id.clone());
                Some(state.active.clone())
            } else {
                None
            }
        };
        if let Some(new_active) = changed_active {
            remember(new_active.as_ref(), ext_cxn, memory).await;
        }

        Ok(ListRemoval::Removed)
    }
}

/// Writes the active list through [memory]. Failing to remember it is not worth failing the
/// operation over.
async fn remember(
    list_id: Option<&RecordId>,
    ext_cxn: &impl ExternalConnectivity,
    memory: &impl ActiveListMemory,
) {
    if let Err(err) = memory.remember_active_list(list_id, ext_cxn).await {
        warn!("Could not save the active list: {err:#}");
    }
}
