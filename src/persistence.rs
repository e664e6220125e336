pub mod local_driven_ports;
pub mod records;
pub mod remote_client;
pub mod remote_driven_ports;

use crate::config::BackendConfig;
use crate::domain::RecordId;
use crate::domain::list::driven_ports::{ActiveListMemory, ListReader, ListWriter};
use crate::domain::list::{NewList, TaskList};
use crate::domain::session::driven_ports::Identity;
use crate::domain::task::driven_ports::{TaskReader, TaskWriter};
use crate::domain::task::{NewTask, Task, TaskFilter, TaskUpdate};
use crate::external_connections;
use local_driven_ports::{LocalBackend, StorageError};
use remote_client::RemoteDataClient;
use remote_driven_ports::RemoteBackend;
use reqwest_middleware::ClientBuilder;
use reqwest_tracing::TracingMiddleware;

/// Data structure which owns clients for connecting to external systems.
/// Allows business logic to be agnostic of the external systems it communicates with
/// so driven adapters can easily be swapped out for other implementations
#[derive(Clone)]
pub struct ExternalConnectivity {
    http_client: reqwest_middleware::ClientWithMiddleware,
}

impl ExternalConnectivity {
    /// Builds an HTTP client whose requests are traced
    pub fn new() -> Result<Self, reqwest::Error> {
        let base_client = reqwest::Client::builder().use_rustls_tls().build()?;
        let http_client = ClientBuilder::new(base_client)
            .with(TracingMiddleware::default())
            .build();

        Ok(ExternalConnectivity { http_client })
    }
}

impl external_connections::ExternalConnectivity for ExternalConnectivity {
    fn http_client(&self) -> &reqwest_middleware::ClientWithMiddleware {
        &self.http_client
    }
}

/// The storage backend picked by configuration. Either variant serves every driven port.
pub enum Backend {
    Remote(RemoteBackend),
    Local(LocalBackend),
}

impl Backend {
    pub fn from_config(config: &BackendConfig) -> Result<Self, StorageError> {
        match config {
            BackendConfig::Remote {
                api_url,
                application_id,
                api_token,
            } => Ok(Backend::Remote(RemoteBackend::new(RemoteDataClient::new(
                api_url,
                application_id,
                api_token.clone(),
            )))),
            BackendConfig::Local { data_dir } => Ok(Backend::Local(LocalBackend::open(data_dir)?)),
        }
    }
}

impl ListReader for Backend {
    async fn all_lists(
        &self,
        ext_cxn: &impl external_connections::ExternalConnectivity,
    ) -> Result<Vec<TaskList>, anyhow::Error> {
        match self {
            Backend::Remote(remote) => remote.all_lists(ext_cxn).await,
            Backend::Local(local) => local.all_lists(ext_cxn).await,
        }
    }
}

impl ListWriter for Backend {
    async fn create_list(
        &self,
        new_list: &NewList,
        ext_cxn: &impl external_connections::ExternalConnectivity,
    ) -> Result<TaskList, anyhow::Error> {
        match self {
            Backend::Remote(remote) => remote.create_list(new_list, ext_cxn).await,
            Backend::Local(local) => local.create_list(new_list, ext_cxn).await,
        }
    }

    async fn delete_list(
        &self,
        list_id: &RecordId,
        ext_cxn: &impl external_connections::ExternalConnectivity,
    ) -> Result<(), anyhow::Error> {
        match self {
            Backend::Remote(remote) => remote.delete_list(list_id, ext_cxn).await,
            Backend::Local(local) => local.delete_list(list_id, ext_cxn).await,
        }
    }
}

impl ActiveListMemory for Backend {
    async fn recall_active_list(
        &self,
        ext_cxn: &impl external_connections::ExternalConnectivity,
    ) -> Result<Option<RecordId>, anyhow::Error> {
        match self {
            Backend::Remote(remote) => remote.recall_active_list(ext_cxn).await,
            Backend::Local(local) => local.recall_active_list(ext_cxn).await,
        }
    }

    async fn remember_active_list(
        &self,
        list_id: Option<&RecordId>,
        ext_cxn: &impl external_connections::ExternalConnectivity,
    ) -> Result<(), anyhow::Error> {
        match self {
            Backend::Remote(remote) => remote.remember_active_list(list_id, ext_cxn).await,
            Backend::Local(local) => local.remember_active_list(list_id, ext_cxn).await,
        }
    }
}

impl TaskReader for Backend {
    async fn tasks_for_list(
        &self,
        list_id: &RecordId,
        filter: TaskFilter,
        ext_cxn: &impl external_connections::ExternalConnectivity,
    ) -> Result<Vec<Task>, anyhow::Error> {
        match self {
            Backend::Remote(remote) => remote.tasks_for_list(list_id, filter, ext_cxn).await,
            Backend::Local(local) => local.tasks_for_list(list_id, filter, ext_cxn).await,
        }
    }
}

impl TaskWriter for Backend {
    async fn create_task(
        &self,
        list_id: &RecordId,
        new_task: &NewTask,
        ext_cxn: &impl external_connections::ExternalConnectivity,
    ) -> Result<Task, anyhow::Error> {
        match self {
            Backend::Remote(remote) => remote.create_task(list_id, new_task, ext_cxn).await,
            Backend::Local(local) => local.create_task(list_id, new_task, ext_cxn).await,
        }
    }

    async fn update_task(
        &self,
        task_id: &RecordId,
        update: &TaskUpdate,
        ext_cxn: &impl external_connections::ExternalConnectivity,
    ) -> Result<Task, anyhow::Error> {
        match self {
            Backend::Remote(remote) => remote.update_task(task_id, update, ext_cxn).await,
            Backend::Local(local) => local.update_task(task_id, update, ext_cxn).await,
        }
    }

    async fn set_completed(
        &self,
        task_id: &RecordId,
        is_completed: bool,
        ext_cxn: &impl external_connections::ExternalConnectivity,
    ) -> Result<(), anyhow::Error> {
        match self {
            Backend::Remote(remote) => remote.set_completed(task_id, is_completed, ext_cxn).await,
            Backend::Local(local) => local.set_completed(task_id, is_completed, ext_cxn).await,
        }
    }

    async fn delete_task(
        &self,
        task_id: &RecordId,
        ext_cxn: &impl external_connections::ExternalConnectivity,
    ) -> Result<(), anyhow::Error> {
        match self {
            Backend::Remote(remote) => remote.delete_task(task_id, ext_cxn).await,
            Backend::Local(local) => local.delete_task(task_id, ext_cxn).await,
        }
    }
}

impl Identity for Backend {
    async fn is_authenticated(
        &self,
        ext_cxn: &impl external_connections::ExternalConnectivity,
    ) -> Result<bool, anyhow::Error> {
        match self {
            Backend::Remote(remote) => remote.is_authenticated(ext_cxn).await,
            Backend::Local(local) => local.is_authenticated(ext_cxn).await,
        }
    }

    async fn logout(
        &self,
        ext_cxn: &impl external_connections::ExternalConnectivity,
    ) -> Result<(), anyhow::Error> {
        match self {
            Backend::Remote(remote) => remote.logout(ext_cxn).await,
            Backend::Local(local) => local.logout(ext_cxn).await,
        }
    }
}
