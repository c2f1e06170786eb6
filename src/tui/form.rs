#![forbid(unsafe_code)]

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use crate::error::TodoError;
use crate::task::model::{
    CATEGORY_MAX_CHARS, DESCRIPTION_MAX_CHARS, NewTask, Priority, TITLE_MAX_CHARS, Task,
    TaskUpdate,
};

const DUE_MAX_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Description,
    Priority,
    DueDate,
    Category,
}

impl Field {
    const ORDER: [Field; 5] = [
        Field::Title,
        Field::Description,
        Field::Priority,
        Field::DueDate,
        Field::Category,
    ];

    fn index(self) -> usize {
        Self::ORDER.iter().position(|f| *f == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ORDER[(self.index() + 1) % Self::ORDER.len()]
    }

    fn prev(self) -> Self {
        Self::ORDER[(self.index() + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }

    fn label(self) -> &'static str {
        match self {
            Field::Title => "Title",
            Field::Description => "Description",
            Field::Priority => "Priority",
            Field::DueDate => "Due (YYYY-MM-DD)",
            Field::Category => "Category",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormOutcome {
    Pending,
    Cancel,
    Submit,
}

/// Add/edit modal state. Lives only while the modal is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: String,
    pub category: String,
    pub focus: Field,
    pub error: Option<String>,
    pub busy: bool,
    original: Option<Task>,
}

impl TaskForm {
    #[must_use]
    pub fn create() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            priority: Priority::Medium,
            due_date: String::new(),
            category: String::new(),
            focus: Field::Title,
            error: None,
            busy: false,
            original: None,
        }
    }

    #[must_use]
    pub fn edit(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            due_date: task
                .due()
                .map(|d| d.to_string())
                .unwrap_or_default(),
            category: task.category.clone().unwrap_or_default(),
            original: Some(task.clone()),
            ..Self::create()
        }
    }

    /// Id of the task being edited, `None` when adding.
    #[must_use]
    pub fn editing(&self) -> Option<i64> {
        self.original.as_ref().map(|t| t.id)
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> FormOutcome {
        if self.busy {
            return FormOutcome::Pending;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return FormOutcome::Cancel,
            KeyCode::Enter => return FormOutcome::Submit,
            KeyCode::Char('s') if ctrl => return FormOutcome::Submit,
            KeyCode::Tab | KeyCode::Down => self.focus = self.focus.next(),
            KeyCode::BackTab | KeyCode::Up => self.focus = self.focus.prev(),
            KeyCode::Left if self.focus == Field::Priority => {
                self.priority = cycle_priority(self.priority, false);
            }
            KeyCode::Right | KeyCode::Char(' ') if self.focus == Field::Priority => {
                self.priority = cycle_priority(self.priority, true);
            }
            KeyCode::Backspace => {
                if let Some(buf) = self.focused_text_mut() {
                    buf.pop();
                }
            }
            KeyCode::Char(c) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => {
                let limit = self.focused_limit();
                if let Some(buf) = self.focused_text_mut()
                    && buf.chars().count() < limit
                {
                    buf.push(c);
                }
            }
            _ => {}
        }
        FormOutcome::Pending
    }

    fn focused_text_mut(&mut self) -> Option<&mut String> {
        match self.focus {
            Field::Title => Some(&mut self.title),
            Field::Description => Some(&mut self.description),
            Field::DueDate => Some(&mut self.due_date),
            Field::Category => Some(&mut self.category),
            Field::Priority => None,
        }
    }

    fn focused_limit(&self) -> usize {
        match self.focus {
            Field::Title => TITLE_MAX_CHARS,
            Field::Description => DESCRIPTION_MAX_CHARS,
            Field::DueDate => DUE_MAX_CHARS,
            Field::Category => CATEGORY_MAX_CHARS,
            Field::Priority => 0,
        }
    }

    pub fn to_new_task(&self) -> Result<NewTask, TodoError> {
        NewTask {
            title: self.title.clone(),
            description: self.description.clone(),
            priority: Some(self.priority),
            due_date: non_blank(&self.due_date),
            category: non_blank(&self.category),
        }
        .validate()
    }

    /// Only the fields that differ from the task being edited.
    pub fn to_update(&self) -> Result<TaskUpdate, TodoError> {
        let Some(orig) = self.original.as_ref() else {
            return Err(TodoError::Other("form is not editing a task".to_owned()));
        };

        let mut upd = TaskUpdate::default();
        if self.title.trim() != orig.title {
            upd.title = Some(self.title.clone());
        }
        if self.description != orig.description {
            upd.description = Some(self.description.clone());
        }
        if self.priority != orig.priority {
            upd.priority = Some(self.priority);
        }
        let orig_due = orig.due().map(|d| d.to_string());
        match (non_blank(&self.due_date), orig_due) {
            (None, Some(_)) => upd.due_date = Some(None),
            (Some(new), old) if Some(new.as_str()) != old.as_deref() => {
                upd.due_date = Some(Some(new));
            }
            _ => {}
        }
        let category = non_blank(&self.category);
        if category != orig.category {
            upd.category = Some(category);
        }

        if upd.is_empty() {
            return Err(TodoError::Validation("No changes to save".to_owned()));
        }
        upd.validate()
    }

    pub fn render(&self, f: &mut Frame<'_>, area: Rect) {
        f.render_widget(Clear, area);

        let title = if self.original.is_some() {
            "Edit Task"
        } else {
            "Add New Task"
        };

        let mut lines = Vec::new();
        if let Some(err) = &self.error {
            lines.push(Line::from(Span::styled(
                err.clone(),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(""));
        }
        for field in Field::ORDER {
            let focused = field == self.focus;
            let label_style = if focused {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().add_modifier(Modifier::BOLD)
            };
            let value = match field {
                Field::Title => self.title.clone(),
                Field::Description => self.description.clone(),
                Field::Priority => format!("< {} >", self.priority),
                Field::DueDate => self.due_date.clone(),
                Field::Category => self.category.clone(),
            };
            let cursor = if focused && field != Field::Priority {
                "▏"
            } else {
                ""
            };
            lines.push(Line::from(vec![
                Span::styled(format!("{:<18}", field.label()), label_style),
                Span::raw(value),
                Span::styled(cursor, Style::default().fg(Color::Cyan)),
            ]));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            if self.busy {
                "Saving..."
            } else {
                "Enter save • Tab next field • ←/→ priority • Esc cancel"
            },
            Style::default().fg(Color::DarkGray),
        )));

        let p = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: false });
        f.render_widget(p, area);
    }
}

fn cycle_priority(p: Priority, forward: bool) -> Priority {
    match (p, forward) {
        (Priority::Low, true) | (Priority::High, false) => Priority::Medium,
        (Priority::Medium, true) | (Priority::Low, false) => Priority::High,
        (Priority::High, true) | (Priority::Medium, false) => Priority::Low,
    }
}

fn non_blank(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_owned())
}
