use derive_more::Display;
use serde::{Deserialize, Serialize};
use validator::ValidationErrors;

pub mod list;
pub mod session;
pub mod task;

#[cfg(test)]
pub(crate) mod test_util;

/// Identifier assigned to a record by whichever backend stores it. The hosted backend hands out
/// integers while the local backend generates strings, so the domain treats both as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(untagged)]
pub enum RecordId {
    #[display("{_0}")]
    Numeric(i64),
    #[display("{_0}")]
    Text(String),
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Numeric(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// Builds the message shown in the error banner for a failed operation. Validation problems and
/// expired sessions get a specific message, everything else falls back to the operation's
/// generic one.
fn banner_message(
    invalid: Option<&ValidationErrors>,
    port_err: Option<&anyhow::Error>,
    fallback: &str,
) -> String {
    if let Some(validation_errors) = invalid {
        let fields: Vec<&str> = validation_errors.field_errors().keys().copied().collect();
        return match fields.as_slice() {
            ["title"] => "Task title cannot be empty.".to_owned(),
            ["name"] => "List name cannot be empty.".to_owned(),
            _ => "Submitted data was invalid.".to_owned(),
        };
    }

    if let Some(err) = port_err {
        let expired = err
            .chain()
            .any(|cause| cause.downcast_ref::<session::SessionExpired>().is_some());
        if expired {
            return "Your session has expired. Please log in again.".to_owned();
        }
    }

    fallback.to_owned()
}
