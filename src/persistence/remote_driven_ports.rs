use crate::domain::RecordId;
use crate::domain::list::driven_ports::{ActiveListMemory, ListReader, ListWriter};
use crate::domain::list::{NewList, TaskList};
use crate::domain::session::driven_ports::Identity;
use crate::domain::task::driven_ports::{TaskReader, TaskWriter};
use crate::domain::task::{NewTask, Task, TaskFilter, TaskUpdate};
use crate::external_connections::ExternalConnectivity;
use crate::persistence::records::{
    LIST_COLLECTION, ListFields, ListRecord, TASK_COLLECTION, TaskFields, TaskRecord, fields,
};
use crate::persistence::remote_client::{Direction, FetchQuery, Filter, RemoteDataClient};
use anyhow::{Context, Error};

/// Driven adapter storing lists and tasks in the hosted backend's collections
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: RemoteDataClient,
}

impl RemoteBackend {
    pub fn new(client: RemoteDataClient) -> Self {
        RemoteBackend { client }
    }
}

impl ListReader for RemoteBackend {
    async fn all_lists(
        &self,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Vec<TaskList>, Error> {
        let query =
            FetchQuery::new(fields::LIST_FIELDS).order_by(fields::CREATED_ON, Direction::Asc);
        let records: Vec<ListRecord> = self
            .client
            .fetch_all(LIST_COLLECTION, query, ext_cxn)
            .await
            .context("fetching task lists")?;

        Ok(records.into_iter().map(TaskList::from).collect())
    }
}

impl ListWriter for RemoteBackend {
    async fn create_list(
        &self,
        new_list: &NewList,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<TaskList, Error> {
        let record: ListRecord = self
            .client
            .create_record(LIST_COLLECTION, &ListFields::from(new_list), ext_cxn)
            .await
            .context("creating a task list")?;

        Ok(record.into())
    }

    async fn delete_list(
        &self,
        list_id: &RecordId,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<(), Error> {
        self.client
            .delete_record(LIST_COLLECTION, list_id, ext_cxn)
            .await
            .with_context(|| format!("deleting task list {list_id}"))?;

        Ok(())
    }
}

/// The hosted backend has nowhere to keep the active list, so it is forgotten between runs
impl ActiveListMemory for RemoteBackend {
    async fn recall_active_list(
        &self,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Option<RecordId>, Error> {
        Ok(None)
    }

    async fn remember_active_list(
        &self,
        _list_id: Option<&RecordId>,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<(), Error> {
        Ok(())
    }
}

impl TaskReader for RemoteBackend {
    async fn tasks_for_list(
        &self,
        list_id: &RecordId,
        filter: TaskFilter,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Vec<Task>, Error> {
        let mut query = FetchQuery::new(fields::TASK_FIELDS)
            .filter(Filter::id_equals(fields::LIST, list_id))
            .order_by(fields::CREATED_ON, Direction::Desc);
        query = match filter {
            TaskFilter::All => query,
            // Records without a completion flag count as active
            TaskFilter::Active => query.filter(Filter::not_equals(fields::IS_COMPLETED, true)),
            TaskFilter::Completed => query.filter(Filter::equals(fields::IS_COMPLETED, true)),
        };

        let records: Vec<TaskRecord> = self
            .client
            .fetch_all(TASK_COLLECTION, query, ext_cxn)
            .await
            .with_context(|| format!("fetching tasks for list {list_id}"))?;

        Ok(records.into_iter().map(Task::from).collect())
    }
}

impl TaskWriter for RemoteBackend {
    async fn create_task(
        &self,
        list_id: &RecordId,
        new_task: &NewTask,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Task, Error> {
        let record: TaskRecord = self
            .client
            .create_record(
                TASK_COLLECTION,
                &TaskFields::for_new_task(list_id, new_task),
                ext_cxn,
            )
            .await
            .with_context(|| format!("creating a task in list {list_id}"))?;

        Ok(record.into())
    }

    async fn update_task(
        &self,
        task_id: &RecordId,
        update: &TaskUpdate,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Task, Error> {
        let record: TaskRecord = self
            .client
            .update_record(TASK_COLLECTION, task_id, &TaskFields::from(update), ext_cxn)
            .await
            .with_context(|| format!("updating task {task_id}"))?;

        Ok(record.into())
    }

    async fn set_completed(
        &self,
        task_id: &RecordId,
        is_completed: bool,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let _: TaskRecord = self
            .client
            .update_record(
                TASK_COLLECTION,
                task_id,
                &TaskFields::completion(is_completed),
                ext_cxn,
            )
            .await
            .with_context(|| format!("updating completion of task {task_id}"))?;

        Ok(())
    }

    async fn delete_task(
        &self,
        task_id: &RecordId,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<(), Error> {
        self.client
            .delete_record(TASK_COLLECTION, task_id, ext_cxn)
            .await
            .with_context(|| format!("deleting task {task_id}"))?;

        Ok(())
    }
}

impl Identity for RemoteBackend {
    async fn is_authenticated(&self, ext_cxn: &impl ExternalConnectivity) -> Result<bool, Error> {
        let authenticated = self
            .client
            .session_status(ext_cxn)
            .await
            .context("checking the session")?;

        Ok(authenticated)
    }

    async fn logout(&self, ext_cxn: &impl ExternalConnectivity) -> Result<(), Error> {
        self.client
            .end_session(ext_cxn)
            .await
            .context("ending the session")?;

        Ok(())
    }
}
