// Field validation for task input

use crate::task::parse_deadline;
use chrono::{DateTime, Utc};
use std::fmt;
use std::ops::RangeInclusive;
use thiserror::Error;

/// Allowed title length, in characters
pub const TITLE_LEN: RangeInclusive<usize> = 5..=25;

/// Allowed description length, in characters
pub const DESCRIPTION_LEN: RangeInclusive<usize> = 20..=100;

/// Input field a validation failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Description,
    Deadline,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Title => write!(f, "Title"),
            Field::Description => write!(f, "Description"),
            Field::Deadline => write!(f, "Deadline"),
        }
    }
}

/// A single rejected field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be between {min} and {max} characters.")]
    Length {
        field: Field,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("Please select a deadline.")]
    Missing,

    #[error("Deadline is not a valid date and time.")]
    MalformedDeadline(String),

    #[error("Deadline must be later than the current time.")]
    PastDeadline(DateTime<Utc>),
}

impl ValidationError {
    pub fn field(&self) -> Field {
        match self {
            ValidationError::Length { field, .. } => *field,
            ValidationError::Missing | ValidationError::MalformedDeadline(_) | ValidationError::PastDeadline(_) => {
                Field::Deadline
            }
        }
    }
}

/// Every field that failed a form-level check
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", summarize(.0))]
pub struct FieldErrors(Vec<ValidationError>);

impl FieldErrors {
    /// The failure for `field`, if it failed
    pub fn get(&self, field: Field) -> Option<&ValidationError> {
        self.0.iter().find(|e| e.field() == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn summarize(errors: &[ValidationError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(" ")
}

/// How strictly a deadline must lie in the future
///
/// Creating a task rejects a deadline equal to `now`; saving an edit accepts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineRule {
    Create,
    Edit,
}

pub fn validate_title(text: &str) -> Result<(), ValidationError> {
    validate_length(Field::Title, text, TITLE_LEN)
}

pub fn validate_description(text: &str) -> Result<(), ValidationError> {
    validate_length(Field::Description, text, DESCRIPTION_LEN)
}

/// Check a deadline against `now` and return the parsed timestamp
pub fn validate_deadline(text: &str, now: DateTime<Utc>, rule: DeadlineRule) -> Result<DateTime<Utc>, ValidationError> {
    if text.is_empty() {
        return Err(ValidationError::Missing);
    }

    let deadline = parse_deadline(text).ok_or_else(|| ValidationError::MalformedDeadline(text.to_string()))?;

    let rejected = match rule {
        DeadlineRule::Create => deadline <= now,
        DeadlineRule::Edit => deadline < now,
    };
    if rejected {
        return Err(ValidationError::PastDeadline(deadline));
    }

    Ok(deadline)
}

fn validate_length(field: Field, text: &str, range: RangeInclusive<usize>) -> Result<(), ValidationError> {
    let actual = text.chars().count();
    if range.contains(&actual) {
        Ok(())
    } else {
        Err(ValidationError::Length {
            field,
            min: *range.start(),
            max: *range.end(),
            actual,
        })
    }
}

/// A task candidate whose fields all passed validation
///
/// Only constructible through validation, so anything holding one may be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInput {
    title: String,
    description: String,
    deadline: String,
}

impl TaskInput {
    /// Validate a new task against the current time
    pub fn new(title: &str, description: &str, deadline: &str) -> Result<Self, FieldErrors> {
        Self::new_at(title, description, deadline, Utc::now(), DeadlineRule::Create)
    }

    /// Run all three validators, collecting every failure
    pub fn new_at(
        title: &str,
        description: &str,
        deadline: &str,
        now: DateTime<Utc>,
        rule: DeadlineRule,
    ) -> Result<Self, FieldErrors> {
        let errors: Vec<ValidationError> = [
            validate_title(title).err(),
            validate_description(description).err(),
            validate_deadline(deadline, now, rule).err(),
        ]
        .into_iter()
        .flatten()
        .collect();

        if !errors.is_empty() {
            return Err(FieldErrors(errors));
        }

        Ok(Self {
            title: title.to_string(),
            description: description.to_string(),
            deadline: deadline.to_string(),
        })
    }

    /// Validate an edit: title and description are trimmed first
    pub fn edit_at(title: &str, description: &str, deadline: &str, now: DateTime<Utc>) -> Result<Self, FieldErrors> {
        Self::new_at(title.trim(), description.trim(), deadline, now, DeadlineRule::Edit)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn deadline(&self) -> &str {
        &self.deadline
    }

    pub(crate) fn into_parts(self) -> (String, String, String) {
        (self.title, self.description, self.deadline)
    }
}
