// Taskboard - validated task tracking with pluggable key-value persistence

pub mod backend;
pub mod config;
pub mod error;
pub mod file;
pub mod filter;
pub mod sqlite;
pub mod store;
pub mod task;
pub mod validate;

// Re-export main types for convenience
pub use backend::{Backend, MemoryBackend};
pub use config::{BackendKind, Config};
pub use error::TaskError;
pub use file::FileBackend;
pub use filter::{Query, View, filter_active, search};
pub use sqlite::SqliteBackend;
pub use store::{DEFAULT_SLOT, TaskStore};
pub use task::{Task, TaskId, TaskView};
pub use validate::{
    DeadlineRule, Field, FieldErrors, TaskInput, ValidationError, validate_deadline, validate_description,
    validate_title,
};
