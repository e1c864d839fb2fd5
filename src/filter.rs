// Query filtering over task listings

use crate::task::TaskView;
use chrono::{DateTime, Utc};
use std::fmt;

/// Tasks that are neither completed nor overdue at `now`, in listing order
pub fn filter_active(tasks: &[TaskView], now: DateTime<Utc>) -> Vec<TaskView> {
    tasks
        .iter()
        .filter(|view| !view.task.completed && !view.task.is_overdue(now))
        .cloned()
        .collect()
}

/// Case-insensitive substring match against each task's display text
///
/// An empty query matches every task.
pub fn search(tasks: &[TaskView], query: &str) -> Vec<TaskView> {
    let needle = query.to_lowercase();
    tasks
        .iter()
        .filter(|view| view.display_text().to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Which subset of the listing is shown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum View {
    #[default]
    All,
    Active,
}

impl View {
    pub fn toggle(self) -> Self {
        match self {
            View::All => View::Active,
            View::Active => View::All,
        }
    }

    /// Label for the control that switches away from this view
    pub fn label(self) -> &'static str {
        match self {
            View::All => "View Active Tasks",
            View::Active => "Show All Tasks",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::All => write!(f, "all"),
            View::Active => write!(f, "active"),
        }
    }
}

/// The filter state a presentation layer keeps between renders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    /// Subset to show
    pub view: View,
    /// Search text; blank means no search
    pub search: String,
}

impl Query {
    pub fn new(view: View, search: impl Into<String>) -> Self {
        Self {
            view,
            search: search.into(),
        }
    }

    /// Apply the view, then the search text
    pub fn apply(&self, tasks: &[TaskView], now: DateTime<Utc>) -> Vec<TaskView> {
        let shown = match self.view {
            View::All => tasks.to_vec(),
            View::Active => filter_active(tasks, now),
        };

        let needle = self.search.trim();
        if needle.is_empty() { shown } else { search(&shown, needle) }
    }
}
