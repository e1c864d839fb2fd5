// Errors returned by task store operations

use crate::validate::FieldErrors;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    /// One or more input fields failed validation; nothing was changed
    #[error("{0}")]
    Invalid(#[from] FieldErrors),

    /// Position outside the current listing. A caller bug, not a user error.
    #[error("No task at position {position} (store holds {len})")]
    Index { position: usize, len: usize },

    #[error("No task matches {0:?}")]
    UnknownTask(String),

    #[error("Task reference {0:?} matches more than one task")]
    AmbiguousTask(String),

    /// The stored slot holds entries that could not be read as tasks, and
    /// rewriting it would drop them
    #[error("Slot {slot} holds {skipped} unreadable entries; refusing to overwrite it")]
    Unreadable { slot: String, skipped: usize },

    /// Reading or writing the backend failed
    #[error("Storage failure: {0:#}")]
    Storage(eyre::Report),
}

impl From<eyre::Report> for TaskError {
    fn from(report: eyre::Report) -> Self {
        TaskError::Storage(report)
    }
}

impl TaskError {
    /// The validation failures, when this is a validation error
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            TaskError::Invalid(errors) => Some(errors),
            _ => None,
        }
    }
}
