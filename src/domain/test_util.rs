use crate::domain::RecordId;
use crate::domain::list::driven_ports::{ActiveListMemory, ListReader, ListWriter};
use crate::domain::list::{NewList, TaskList};
use crate::domain::session::driven_ports::Identity;
use crate::domain::task::driven_ports::{TaskReader, TaskWriter};
use crate::domain::task::{NewTask, Priority, Task, TaskFilter, TaskUpdate};
use crate::external_connections::ExternalConnectivity;
use anyhow::anyhow;
use chrono::Utc;
use std::sync::RwLock;

/// Connectivity represents the "connected" state of a mocked driven port and provides
/// common behavior for returning an error if the port is configured to be in a disconnected state.
pub enum Connectivity {
    Connected,
    Disconnected,
}

impl Connectivity {
    /// Return an error if connectivity is in a "disconnected" state
    pub fn blow_up_if_disconnected(&self) -> Result<(), anyhow::Error> {
        match self {
            Self::Connected => Ok(()),
            Self::Disconnected => Err(anyhow!("could not connect to service!")),
        }
    }
}

/// FakeImplementation is a quick drop-in property that helps mock a function and capture
/// arguments the function is called with. It's useful for mocking async functions since
/// popular rust mocking tools don't work well with async functions on traits.
///
/// * [Args] represents the arguments passed to the function that should be captured on a call
/// * [Ret] represents the type of the function's return value
pub struct FakeImplementation<Args, Ret> {
    saved_arguments: Vec<Args>,
    return_value: Option<Ret>,
}

impl<Args, Ret> FakeImplementation<Args, Ret> {
    pub fn new() -> FakeImplementation<Args, Ret> {
        FakeImplementation {
            saved_arguments: Vec::new(),
            return_value: None,
        }
    }

    /// Saves arguments from a single invocation of the FakeImplementation
    pub fn save_arguments(&mut self, arguments: Args) {
        self.saved_arguments.push(arguments)
    }

    /// Returns the list of arguments passed on every call to this FakeImplementation
    pub fn calls(&self) -> &[Args] {
        self.saved_arguments.as_slice()
    }
}

impl<Args, Success> FakeImplementation<Args, anyhow::Result<Success>>
where
    Success: Clone,
{
    /// Set the result that should be returned when this FakeImplementation is invoked.
    /// [anyhow::Error] does not implement [Clone], so only the message is kept.
    pub fn set_returned_anyhow(&mut self, return_value: anyhow::Result<Success>) {
        match return_value {
            Ok(ok_result) => self.return_value = Some(Ok(ok_result)),
            Err(err) => self.return_value = Some(Err(anyhow!(format!("{}", err)))),
        }
    }

    /// Retrieve the result that should be returned when this FakeImplementation is invoked
    pub fn return_value_anyhow(&self) -> anyhow::Result<Success> {
        match self.return_value {
            None => panic!("Tried to return from a function where the value wasn't set!"),
            Some(Ok(ref ok_result)) => Ok(ok_result.clone()),
            Some(Err(ref err)) => Err(anyhow!(format!("{}", err))),
        }
    }
}

/// Backend double holding lists and tasks in memory. Reads and writes can be disconnected
/// independently, and individual task deletes can be made to fail.
pub struct InMemoryPersistence {
    pub lists: Vec<TaskList>,
    pub tasks: Vec<Task>,
    pub active_list: Option<RecordId>,
    pub reads: Connectivity,
    pub writes: Connectivity,
    pub failing_deletes: Vec<RecordId>,
    highest_id: i64,
}

impl InMemoryPersistence {
    pub fn new() -> InMemoryPersistence {
        InMemoryPersistence {
            lists: Vec::new(),
            tasks: Vec::new(),
            active_list: None,
            reads: Connectivity::Connected,
            writes: Connectivity::Connected,
            failing_deletes: Vec::new(),
            highest_id: 0,
        }
    }

    pub fn new_locked() -> RwLock<InMemoryPersistence> {
        RwLock::new(Self::new())
    }

    fn next_id(&mut self) -> RecordId {
        self.highest_id += 1;
        RecordId::Numeric(self.highest_id)
    }

    pub fn insert_list(&mut self, name: &str) -> RecordId {
        let id = self.next_id();
        self.lists.push(TaskList {
            id: id.clone(),
            name: name.to_owned(),
            color: crate::domain::list::DEFAULT_LIST_COLOR.to_owned(),
        });
        id
    }

    pub fn insert_task(&mut self, list_id: &RecordId, title: &str, is_completed: bool) -> RecordId {
        let id = self.next_id();
        let now = Utc::now();
        self.tasks.push(Task {
            id: id.clone(),
            title: title.to_owned(),
            description: String::new(),
            is_completed,
            priority: Priority::Medium,
            due_date: None,
            created_at: Some(now),
            updated_at: Some(now),
            list_id: list_id.clone(),
        });
        id
    }
}

impl ListReader for RwLock<InMemoryPersistence> {
    async fn all_lists(
        &self,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Vec<TaskList>, anyhow::Error> {
        let persistence = self.read().expect("persistence rw lock poisoned");
        persistence.reads.blow_up_if_disconnected()?;

        Ok(persistence.lists.clone())
    }
}

impl ListWriter for RwLock<InMemoryPersistence> {
    async fn create_list(
        &self,
        new_list: &NewList,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<TaskList, anyhow::Error> {
        let mut persistence = self.write().expect("persistence rw lock poisoned");
        persistence.writes.blow_up_if_disconnected()?;

        let id = persistence.next_id();
        let list = TaskList {
            id,
            name: new_list.name.clone(),
            color: new_list.color.clone(),
        };
        persistence.lists.push(list.clone());
        Ok(list)
    }

    async fn delete_list(
        &self,
        list_id: &RecordId,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<(), anyhow::Error> {
        let mut persistence = self.write().expect("persistence rw lock poisoned");
        persistence.writes.blow_up_if_disconnected()?;

        persistence.lists.retain(|list| &list.id != list_id);
        Ok(())
    }
}

impl ActiveListMemory for RwLock<InMemoryPersistence> {
    async fn recall_active_list(
        &self,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Option<RecordId>, anyhow::Error> {
        let persistence = self.read().expect("persistence rw lock poisoned");
        Ok(persistence.active_list.clone())
    }

    async fn remember_active_list(
        &self,
        list_id: Option<&RecordId>,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<(), anyhow::Error> {
        let mut persistence = self.write().expect("persistence rw lock poisoned");
        persistence.active_list = list_id.cloned();
        Ok(())
    }
}

impl TaskReader for RwLock<InMemoryPersistence> {
    async fn tasks_for_list(
        &self,
        list_id: &RecordId,
        filter: TaskFilter,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Vec<Task>, anyhow::Error> {
        let persistence = self.read().expect("persistence rw lock poisoned");
        persistence.reads.blow_up_if_disconnected()?;

        Ok(persistence
            .tasks
            .iter()
            .rev()
            .filter(|task| &task.list_id == list_id && filter.matches(task))
            .cloned()
            .collect())
    }
}

impl TaskWriter for RwLock<InMemoryPersistence> {
    async fn create_task(
        &self,
        list_id: &RecordId,
        new_task: &NewTask,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Task, anyhow::Error> {
        let mut persistence = self.write().expect("persistence rw lock poisoned");
        persistence.writes.blow_up_if_disconnected()?;

        let id = persistence.insert_task(list_id, &new_task.title, false);
        let task = persistence
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .expect("task was just inserted");
        task.description = new_task.description.clone();
        task.priority = new_task.priority;
        task.due_date = new_task.due_date;

        Ok(task.clone())
    }

    async fn update_task(
        &self,
        task_id: &RecordId,
        update: &TaskUpdate,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Task, anyhow::Error> {
        let mut persistence = self.write().expect("persistence rw lock poisoned");
        persistence.writes.blow_up_if_disconnected()?;

        let task = persistence
            .tasks
            .iter_mut()
            .find(|task| &task.id == task_id)
            .ok_or_else(|| anyhow!("task {task_id} not found"))?;
        task.title = update.title.clone();
        task.description = update.description.clone();
        task.is_completed = update.is_completed;
        task.priority = update.priority;
        task.due_date = update.due_date;
        task.updated_at = Some(Utc::now());

        Ok(task.clone())
    }

    async fn set_completed(
        &self,
        task_id: &RecordId,
        is_completed: bool,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<(), anyhow::Error> {
        let mut persistence = self.write().expect("persistence rw lock poisoned");
        persistence.writes.blow_up_if_disconnected()?;

        if let Some(task) = persistence.tasks.iter_mut().find(|task| &task.id == task_id) {
            task.is_completed = is_completed;
        }
        Ok(())
    }

    async fn delete_task(
        &self,
        task_id: &RecordId,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<(), anyhow::Error> {
        let mut persistence = self.write().expect("persistence rw lock poisoned");
        persistence.writes.blow_up_if_disconnected()?;
        if persistence.failing_deletes.contains(task_id) {
            return Err(anyhow!("backend refused to delete task {task_id}"));
        }

        persistence.tasks.retain(|task| &task.id != task_id);
        Ok(())
    }
}

impl Identity for RwLock<InMemoryPersistence> {
    async fn is_authenticated(
        &self,
        _ext_cxn: &impl ExternalConnectivity,
    ) -> Result<bool, anyhow::Error> {
        let persistence = self.read().expect("persistence rw lock poisoned");
        persistence.reads.blow_up_if_disconnected()?;

        Ok(true)
    }

    async fn logout(&self, _ext_cxn: &impl ExternalConnectivity) -> Result<(), anyhow::Error> {
        let persistence = self.read().expect("persistence rw lock poisoned");
        persistence.writes.blow_up_if_disconnected()
    }
}
