#![forbid(unsafe_code)]

//! Derived task view: the visible subset of a task list for a given search
//! query and status filter, plus counts for the filter tabs.
//!
//! Everything here is pure. Callers recompute the view from the canonical
//! list whenever the list, the query, or the filter changes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::error::TodoError;
use crate::task::model::{Priority, Task};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    pub const TABS: [StatusFilter; 3] = [
        StatusFilter::All,
        StatusFilter::Active,
        StatusFilter::Completed,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Active => "active",
            StatusFilter::Completed => "completed",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            StatusFilter::All => "All",
            StatusFilter::Active => "Active",
            StatusFilter::Completed => "Completed",
        }
    }

    #[must_use]
    pub fn next(self) -> Self {
        match self {
            StatusFilter::All => StatusFilter::Active,
            StatusFilter::Active => StatusFilter::Completed,
            StatusFilter::Completed => StatusFilter::All,
        }
    }

    #[must_use]
    pub fn matches(self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => !task.completed,
            StatusFilter::Completed => task.completed,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusFilter {
    type Err = TodoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(StatusFilter::All),
            "active" | "open" | "todo" => Ok(StatusFilter::Active),
            "completed" | "done" => Ok(StatusFilter::Completed),
            other => Err(TodoError::Validation(format!(
                "invalid filter '{other}': expected all, active or completed"
            ))),
        }
    }
}

/// Tab counts. Always computed over the whole list, never the visible subset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TaskCounts {
    pub all: usize,
    pub active: usize,
    pub completed: usize,
}

impl TaskCounts {
    #[must_use]
    pub fn of(tasks: &[Task]) -> Self {
        let completed = tasks.iter().filter(|t| t.completed).count();
        Self {
            all: tasks.len(),
            active: tasks.len() - completed,
            completed,
        }
    }

    #[must_use]
    pub fn get(&self, filter: StatusFilter) -> usize {
        match filter {
            StatusFilter::All => self.all,
            StatusFilter::Active => self.active,
            StatusFilter::Completed => self.completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskView<'a> {
    pub visible: Vec<&'a Task>,
    pub counts: TaskCounts,
}

impl TaskView<'_> {
    /// The underlying list has no tasks at all.
    #[must_use]
    pub fn is_empty_list(&self) -> bool {
        self.counts.all == 0
    }

    /// Tasks exist, but the query and filter hide all of them.
    #[must_use]
    pub fn has_no_matches(&self) -> bool {
        self.counts.all > 0 && self.visible.is_empty()
    }
}

/// Case-insensitive substring match against title or description.
/// A blank query matches everything.
#[must_use]
pub fn matches_query(task: &Task, query: &str) -> bool {
    contains_needle(task, &query.trim().to_lowercase())
}

fn contains_needle(task: &Task, needle: &str) -> bool {
    needle.is_empty()
        || task.title.to_lowercase().contains(needle)
        || task.description.to_lowercase().contains(needle)
}

#[must_use]
pub fn filter_tasks<'a>(tasks: &'a [Task], query: &str, filter: StatusFilter) -> Vec<&'a Task> {
    let needle = query.trim().to_lowercase();
    tasks
        .iter()
        .filter(|t| contains_needle(t, &needle) && filter.matches(t))
        .collect()
}

#[must_use]
pub fn derive_view<'a>(tasks: &'a [Task], query: &str, filter: StatusFilter) -> TaskView<'a> {
    TaskView {
        visible: filter_tasks(tasks, query, filter),
        counts: TaskCounts::of(tasks),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PriorityBreakdown {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl PriorityBreakdown {
    #[must_use]
    pub fn get(&self, p: Priority) -> usize {
        match p {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub active: usize,
    pub overdue: usize,
    /// Rounded percentage, 0 for an empty list.
    pub completion_rate: u8,
    /// Open tasks only.
    pub by_priority: PriorityBreakdown,
}

impl TaskStats {
    #[must_use]
    pub fn compute(tasks: &[Task], today: Date) -> Self {
        let counts = TaskCounts::of(tasks);
        let mut by_priority = PriorityBreakdown::default();
        let mut overdue = 0;
        for t in tasks.iter().filter(|t| !t.completed) {
            match t.priority {
                Priority::High => by_priority.high += 1,
                Priority::Medium => by_priority.medium += 1,
                Priority::Low => by_priority.low += 1,
            }
            if t.is_overdue(today) {
                overdue += 1;
            }
        }
        Self {
            total: counts.all,
            completed: counts.completed,
            active: counts.active,
            overdue,
            completion_rate: completion_rate(counts.completed, counts.all),
            by_priority,
        }
    }
}

fn completion_rate(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    // Round half up in integer arithmetic.
    let pct = (completed * 200 + total) / (total * 2);
    u8::try_from(pct.min(100)).unwrap_or(100)
}
