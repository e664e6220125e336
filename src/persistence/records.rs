//! Record shapes of the hosted backend's `task_list` and `task16` collections, and their
//! mapping to and from domain types. System columns are capitalized; custom columns keep the
//! names they were created with.

use crate::domain::RecordId;
use crate::domain::list::{DEFAULT_LIST_COLOR, NewList, TaskList};
use crate::domain::task::{NewTask, Priority, Task, TaskUpdate};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const LIST_COLLECTION: &str = "task_list";
pub const TASK_COLLECTION: &str = "task16";

pub mod fields {
    pub const ID: &str = "Id";
    pub const NAME: &str = "Name";
    pub const COLOR: &str = "color";
    pub const CREATED_ON: &str = "CreatedOn";
    pub const MODIFIED_ON: &str = "ModifiedOn";
    pub const IS_DELETED: &str = "IsDeleted";
    pub const TITLE: &str = "title";
    pub const DESCRIPTION: &str = "description";
    pub const IS_COMPLETED: &str = "isCompleted";
    pub const PRIORITY: &str = "priority";
    pub const DUE_DATE: &str = "dueDate";
    pub const LIST: &str = "list";

    pub const LIST_FIELDS: &[&str] = &[ID, NAME, COLOR];
    pub const TASK_FIELDS: &[&str] = &[
        ID,
        TITLE,
        DESCRIPTION,
        IS_COMPLETED,
        PRIORITY,
        DUE_DATE,
        CREATED_ON,
        MODIFIED_ON,
        LIST,
    ];
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListRecord {
    #[serde(rename = "Id")]
    pub id: RecordId,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

impl From<ListRecord> for TaskList {
    fn from(value: ListRecord) -> Self {
        TaskList {
            id: value.id,
            name: value.name,
            color: value
                .color
                .filter(|color| !color.is_empty())
                .unwrap_or_else(|| DEFAULT_LIST_COLOR.to_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListFields {
    #[serde(rename = "Name")]
    pub name: String,
    pub color: String,
}

impl From<&NewList> for ListFields {
    fn from(value: &NewList) -> Self {
        ListFields {
            name: value.name.clone(),
            color: value.color.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(rename = "Id")]
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "isCompleted", default)]
    pub is_completed: Option<bool>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(rename = "dueDate", default)]
    pub due_date: Option<NaiveDate>,
    #[serde(rename = "CreatedOn", default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(rename = "ModifiedOn", default)]
    pub modified_on: Option<DateTime<Utc>>,
    pub list: RecordId,
}

impl From<TaskRecord> for Task {
    fn from(value: TaskRecord) -> Self {
        Task {
            id: value.id,
            title: value.title,
            description: value.description.unwrap_or_default(),
            is_completed: value.is_completed.unwrap_or(false),
            priority: value.priority.unwrap_or_default(),
            due_date: value.due_date,
            created_at: value.created_on,
            updated_at: value.modified_on,
            list_id: value.list,
        }
    }
}

impl From<&Task> for TaskRecord {
    fn from(value: &Task) -> Self {
        TaskRecord {
            id: value.id.clone(),
            title: value.title.clone(),
            description: Some(value.description.clone()),
            is_completed: Some(value.is_completed),
            priority: Some(value.priority),
            due_date: value.due_date,
            created_on: value.created_at,
            modified_on: value.updated_at,
            list: value.list_id.clone(),
        }
    }
}

/// Writable columns of a task. Unset fields are left out of the request so the backend keeps
/// their stored values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "isCompleted", skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Outer `None` leaves the due date alone, `Some(None)` clears it
    #[serde(rename = "dueDate", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list: Option<RecordId>,
}

impl TaskFields {
    pub fn for_new_task(list_id: &RecordId, new_task: &NewTask) -> TaskFields {
        TaskFields {
            title: Some(new_task.title.clone()),
            description: Some(new_task.description.clone()),
            is_completed: Some(false),
            priority: Some(new_task.priority),
            due_date: Some(new_task.due_date),
            list: Some(list_id.clone()),
        }
    }

    pub fn completion(is_completed: bool) -> TaskFields {
        TaskFields {
            is_completed: Some(is_completed),
            ..TaskFields::default()
        }
    }
}

impl From<&TaskUpdate> for TaskFields {
    fn from(value: &TaskUpdate) -> Self {
        TaskFields {
            title: Some(value.title.clone()),
            description: Some(value.description.clone()),
            is_completed: Some(value.is_completed),
            priority: Some(value.priority),
            due_date: Some(value.due_date),
            list: None,
        }
    }
}
