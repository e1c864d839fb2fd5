// Task store: ordered task collection persisted through a key-value backend

use crate::backend::{Backend, validate_slot_name};
use crate::error::TaskError;
use crate::task::{Task, TaskId, TaskView};
use crate::validate::TaskInput;
use chrono::{DateTime, Utc};
use eyre::{Context, Result, eyre};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Slot used when none is configured
pub const DEFAULT_SLOT: &str = "tasks";

/// Shortest id prefix `locate` accepts
const MIN_ID_PREFIX: usize = 4;

/// Single source of truth for the task collection
///
/// Positions are indices into the current ordering and shift when an earlier
/// task is removed. Each task also has a stable [`TaskId`].
///
/// Every mutation reads the slot fresh, applies the change to that copy and
/// writes the whole collection back as one [`Backend::update`], so no other
/// writer can slip in between. Only then is the in-memory listing replaced.
/// A failed write changes nothing. Positions passed to a mutation refer to
/// the listing this store last showed; the task is found again by id in the
/// fresh copy, so a concurrent insert or removal cannot redirect the change.
///
/// A slot holding entries that cannot be read as tasks is read-only: every
/// mutation fails with [`TaskError::Unreadable`] rather than drop them.
pub struct TaskStore<B: Backend> {
    backend: B,
    slot: String,
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
}

impl<B: Backend> TaskStore<B> {
    /// Load the collection stored in `slot`
    ///
    /// An absent slot is an empty collection. Tasks stored without an id are
    /// given one, and the collection is written back so the ids stick,
    /// unless the slot also holds unreadable entries.
    pub fn open(backend: B, slot: &str) -> Result<Self, TaskError> {
        validate_slot_name(slot)?;

        let mut store = Self {
            backend,
            slot: slot.to_string(),
            tasks: Vec::new(),
            index: HashMap::new(),
        };

        let decoded = store.load()?;
        if decoded.skipped > 0 {
            warn!(slot, skipped = decoded.skipped, "Slot has unreadable entries, opening read-only");
            store.install(decoded.tasks);
        } else if decoded.missing_ids > 0 {
            info!(slot, count = decoded.missing_ids, "Assigning ids to stored tasks");
            store.transact(|_| Ok(()))?;
        } else {
            store.install(decoded.tasks);
        }

        info!(slot, count = store.tasks.len(), "Opened task store");
        Ok(store)
    }

    /// Give back the backend
    pub fn close(self) -> B {
        debug!(slot = %self.slot, "Closing task store");
        self.backend
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks in insertion order, without derived status
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, position: usize) -> Result<&Task, TaskError> {
        self.tasks.get(position).ok_or(TaskError::Index {
            position,
            len: self.tasks.len(),
        })
    }

    /// Current position of the task with `id`
    pub fn position_of(&self, id: &TaskId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Resolve a full id, a unique id prefix ("019a3c2f") or a position ("2")
    ///
    /// Id prefixes take precedence, since a prefix may consist of digits only.
    pub fn locate(&self, reference: &str) -> Result<usize, TaskError> {
        let reference = reference.trim();

        if let Ok(id) = reference.parse::<TaskId>() {
            return self
                .position_of(&id)
                .ok_or_else(|| TaskError::UnknownTask(reference.to_string()));
        }

        if reference.len() >= MIN_ID_PREFIX {
            let needle = reference.to_lowercase();
            let mut matches = self
                .tasks
                .iter()
                .enumerate()
                .filter(|(_, task)| task.id.to_string().starts_with(&needle))
                .map(|(position, _)| position);

            match (matches.next(), matches.next()) {
                (Some(position), None) => return Ok(position),
                (Some(_), Some(_)) => return Err(TaskError::AmbiguousTask(reference.to_string())),
                _ => {}
            }
        }

        match reference.parse::<usize>() {
            Ok(position) => {
                self.get(position)?;
                Ok(position)
            }
            Err(_) => Err(TaskError::UnknownTask(reference.to_string())),
        }
    }

    /// Re-read the slot, picking up writes made elsewhere
    pub fn reload(&mut self) -> Result<(), TaskError> {
        let decoded = self.load()?;
        self.install(decoded.tasks);
        Ok(())
    }

    /// All tasks annotated with overdue status as of now
    pub fn list(&self) -> Vec<TaskView> {
        self.list_at(Utc::now())
    }

    pub fn list_at(&self, now: DateTime<Utc>) -> Vec<TaskView> {
        self.tasks
            .iter()
            .enumerate()
            .map(|(position, task)| TaskView::new(position, task.clone(), now))
            .collect()
    }

    /// Append a validated task and return its position
    pub fn add(&mut self, input: TaskInput) -> Result<usize, TaskError> {
        let (title, description, deadline) = input.into_parts();
        let task = Task {
            title,
            description,
            deadline,
            completed: false,
            id: TaskId::new(),
        };
        let id = task.id;

        let position = self.transact(move |tasks| {
            tasks.push(task);
            Ok(tasks.len() - 1)
        })?;

        info!(slot = %self.slot, position, %id, "Added task");
        Ok(position)
    }

    /// Overwrite the task at `position` after re-validating every field
    pub fn update(&mut self, position: usize, title: &str, description: &str, deadline: &str) -> Result<(), TaskError> {
        self.update_at(position, title, description, deadline, Utc::now())
    }

    pub fn update_at(
        &mut self,
        position: usize,
        title: &str,
        description: &str,
        deadline: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TaskError> {
        let input = TaskInput::edit_at(title, description, deadline, now).inspect_err(|errors| {
            debug!(position, failed = errors.len(), "Edit rejected by validation");
        })?;
        let (title, description, deadline) = input.into_parts();

        let id = self.get(position)?.id;
        self.transact(move |tasks| {
            let position = position_in(tasks, &id)?;
            let task = &mut tasks[position];
            task.title = title;
            task.description = description;
            task.deadline = deadline;
            Ok(())
        })?;

        info!(slot = %self.slot, position, "Updated task");
        Ok(())
    }

    /// Flip completion and return the new state
    pub fn toggle_complete(&mut self, position: usize) -> Result<bool, TaskError> {
        let id = self.get(position)?.id;
        let completed = self.transact(|tasks| {
            let position = position_in(tasks, &id)?;
            let task = &mut tasks[position];
            task.completed = !task.completed;
            Ok(task.completed)
        })?;

        info!(slot = %self.slot, position, completed, "Toggled task");
        Ok(completed)
    }

    /// Delete the task at `position`; later tasks move down by one
    pub fn remove(&mut self, position: usize) -> Result<Task, TaskError> {
        let id = self.get(position)?.id;
        let removed = self.transact(|tasks| {
            let position = position_in(tasks, &id)?;
            Ok(tasks.remove(position))
        })?;

        info!(slot = %self.slot, position, id = %removed.id, "Removed task");
        Ok(removed)
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    /// Read, mutate a private copy and write it back in one backend update,
    /// then adopt the copy
    ///
    /// When `op` fails the slot is left untouched and its error returned.
    fn transact<T>(&mut self, op: impl FnOnce(&mut Vec<Task>) -> Result<T, TaskError>) -> Result<T, TaskError> {
        let slot = self.slot.clone();
        let mut op = Some(op);
        let mut outcome = None;

        self.backend.update(&slot, &mut |blob| {
            let op = op.take().ok_or_else(|| eyre!("Backend ran the update of slot {} twice", slot))?;
            match stage(&slot, blob.as_deref(), op) {
                Ok((out, tasks)) => {
                    let blob = encode(&tasks)?;
                    outcome = Some(Ok((out, tasks)));
                    Ok(Some(blob))
                }
                Err(e) => {
                    outcome = Some(Err(e));
                    Ok(None)
                }
            }
        })?;

        let (out, tasks) = outcome.ok_or_else(|| eyre!("Backend skipped the update of slot {}", self.slot))??;
        debug!(slot = %self.slot, count = tasks.len(), "Persisted tasks");
        self.install(tasks);
        Ok(out)
    }

    fn load(&self) -> Result<Decoded> {
        match self.backend.read(&self.slot)? {
            Some(blob) => decode(&blob).with_context(|| format!("Failed to load slot {}", self.slot)),
            None => Ok(Decoded::default()),
        }
    }

    fn install(&mut self, tasks: Vec<Task>) {
        self.index = tasks.iter().enumerate().map(|(position, task)| (task.id, position)).collect();
        self.tasks = tasks;
    }
}

/// Decode `blob` and apply `op` to the result
fn stage<T>(
    slot: &str,
    blob: Option<&str>,
    op: impl FnOnce(&mut Vec<Task>) -> Result<T, TaskError>,
) -> Result<(T, Vec<Task>), TaskError> {
    let decoded = match blob {
        Some(blob) => decode(blob).with_context(|| format!("Failed to load slot {}", slot))?,
        None => Decoded::default(),
    };
    if decoded.skipped > 0 {
        return Err(TaskError::Unreadable {
            slot: slot.to_string(),
            skipped: decoded.skipped,
        });
    }

    let mut tasks = decoded.tasks;
    let out = op(&mut tasks)?;
    Ok((out, tasks))
}

/// Where the task with `id` sits in a freshly read collection
fn position_in(tasks: &[Task], id: &TaskId) -> Result<usize, TaskError> {
    tasks
        .iter()
        .position(|task| task.id == *id)
        .ok_or_else(|| TaskError::UnknownTask(id.to_string()))
}

/// Result of reading a stored collection
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub tasks: Vec<Task>,
    /// Tasks that had no id (or a duplicate one) and were given a fresh id
    pub missing_ids: usize,
    /// Entries that could not be read as tasks and were dropped
    pub skipped: usize,
}

/// Serialize the whole collection as a JSON array
pub fn encode(tasks: &[Task]) -> Result<String> {
    serde_json::to_string(tasks).context("Failed to serialize tasks")
}

/// Parse a stored collection
///
/// `null` reads as empty. Fields set to `null` count as absent. Malformed
/// entries are skipped with a warning and counted; a value that is not an
/// array is an error.
pub fn decode(blob: &str) -> Result<Decoded> {
    let value: Value = serde_json::from_str(blob).context("Stored tasks are not valid JSON")?;

    let entries = match value {
        Value::Null => return Ok(Decoded::default()),
        Value::Array(entries) => entries,
        other => return Err(eyre!("Stored tasks must be a JSON array, found {}", json_kind(&other))),
    };

    let mut decoded = Decoded::default();
    let mut seen = HashSet::new();

    for (entry_num, mut entry) in entries.into_iter().enumerate() {
        if let Some(fields) = entry.as_object_mut() {
            fields.retain(|_, value| !value.is_null());
        }
        let has_id = entry.get("id").is_some();

        let mut task: Task = match serde_json::from_value(entry) {
            Ok(task) => task,
            Err(e) => {
                warn!(entry = entry_num, error = ?e, "Failed to parse stored task, skipping");
                decoded.skipped += 1;
                continue;
            }
        };

        if !has_id || !seen.insert(task.id) {
            task.id = TaskId::new();
            seen.insert(task.id);
            decoded.missing_ids += 1;
        }

        decoded.tasks.push(task);
    }

    Ok(decoded)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
