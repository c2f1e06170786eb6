#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Date;
use time::macros::format_description;

use crate::error::TodoError;

pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;
pub const CATEGORY_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TodoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "l" => Ok(Priority::Low),
            "medium" | "med" | "m" => Ok(Priority::Medium),
            "high" | "h" => Ok(Priority::High),
            other => Err(TodoError::Validation(format!(
                "invalid priority '{other}': expected low, medium or high"
            ))),
        }
    }
}

/// A task as returned by the task API.
///
/// Fields added in later server revisions default when absent so older
/// servers keep working.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Task {
    /// Parsed due date, if present and well formed.
    #[must_use]
    pub fn due(&self) -> Option<Date> {
        self.due_date.as_deref().and_then(|s| parse_date(s).ok())
    }

    /// A due date counts from its first moment (midnight UTC), so an open
    /// task due `today` is already overdue.
    #[must_use]
    pub fn is_overdue(&self, today: Date) -> bool {
        !self.completed && self.due().is_some_and(|d| d <= today)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl NewTask {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Checks field limits and normalizes the due date to `YYYY-MM-DD`.
    pub fn validate(mut self) -> Result<Self, TodoError> {
        self.title = validate_title(&self.title)?;
        validate_description(&self.description)?;
        if let Some(cat) = self.category.take() {
            self.category = normalize_category(&cat)?;
        }
        if let Some(due) = self.due_date.take() {
            self.due_date = Some(normalize_due_date(&due)?);
        }
        Ok(self)
    }
}

/// Partial update. `None` fields are left untouched by the server;
/// `Some(None)` on `due_date` or `category` clears that field.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Option<String>>,
}

impl TaskUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.category.is_none()
    }

    pub fn validate(mut self) -> Result<Self, TodoError> {
        if self.is_empty() {
            return Err(TodoError::Validation("nothing to update".to_owned()));
        }
        if let Some(title) = self.title.take() {
            self.title = Some(validate_title(&title)?);
        }
        if let Some(desc) = self.description.as_deref() {
            validate_description(desc)?;
        }
        if let Some(Some(cat)) = &self.category {
            let normalized = normalize_category(cat)?;
            self.category = Some(normalized);
        }
        if let Some(Some(due)) = &self.due_date {
            let normalized = normalize_due_date(due)?;
            self.due_date = Some(Some(normalized));
        }
        Ok(self)
    }
}

fn validate_title(title: &str) -> Result<String, TodoError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TodoError::Validation("Title is required".to_owned()));
    }
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        return Err(TodoError::Validation(format!(
            "Title must be at most {TITLE_MAX_CHARS} characters"
        )));
    }
    Ok(trimmed.to_owned())
}

fn validate_description(desc: &str) -> Result<(), TodoError> {
    if desc.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(TodoError::Validation(format!(
            "Description must be at most {DESCRIPTION_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

fn normalize_category(cat: &str) -> Result<Option<String>, TodoError> {
    let trimmed = cat.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > CATEGORY_MAX_CHARS {
        return Err(TodoError::Validation(format!(
            "Category must be at most {CATEGORY_MAX_CHARS} characters"
        )));
    }
    Ok(Some(trimmed.to_owned()))
}

fn normalize_due_date(s: &str) -> Result<String, TodoError> {
    let date = parse_date(s)?;
    let fmt = format_description!("[year]-[month]-[day]");
    date.format(&fmt)
        .map_err(|e| TodoError::Validation(format!("invalid due date '{s}': {e}")))
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp (its date part is used).
pub fn parse_date(s: &str) -> Result<Date, TodoError> {
    let s = s.trim();
    let fmt = format_description!("[year]-[month]-[day]");
    if let Ok(d) = Date::parse(s, &fmt) {
        return Ok(d);
    }
    if let Ok(dt) =
        time::OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339)
    {
        return Ok(dt.date());
    }
    let head: String = s.chars().take(10).collect();
    Date::parse(&head, &fmt).map_err(|_| {
        TodoError::Validation(format!("invalid due date '{s}': expected YYYY-MM-DD"))
    })
}
