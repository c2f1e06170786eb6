#![forbid(unsafe_code)]

use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Row, Table, TableState, Tabs, Wrap};

use crate::api::TaskApi;
use crate::config::UiConfig;
use crate::task::list::{ConfirmedDelete, TaskController};
use crate::task::model::{NewTask, Priority, Task, TaskUpdate};
use crate::task::view::{StatusFilter, TaskStats};
use crate::tui::form::{FormOutcome, TaskForm};
use crate::tui::toast::{ToastKind, Toasts};
use crate::tui::{self, TerminalGuard};

const EMPTY_LIST_MSG: &str = "No tasks yet. Press 'a' to add your first task.";
const NO_MATCH_MSG: &str = "No tasks match your search or filter.";
const DELETE_PROMPT: &str = "Are you sure you want to delete this task?";

/// Runs the dashboard until the user quits. The controller may be unloaded;
/// the first fetch happens here.
pub async fn run<A: TaskApi>(
    controller: TaskController<A>,
    ui: &UiConfig,
    user_label: &str,
) -> anyhow::Result<()> {
    let terminal = tui::init_terminal()?;
    let mut guard = TerminalGuard::new(terminal);

    let mut app = AppState::new(controller, ui, user_label);
    app.perform(Action::Load).await;

    loop {
        app.toasts.prune(Instant::now());
        {
            let Some(terminal) = guard.terminal.as_mut() else {
                anyhow::bail!("terminal unavailable");
            };
            terminal.draw(|f| draw(f, &mut app))?;
        }

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let action = app.handle_key(key);
        match action {
            Action::None => {}
            Action::Quit => break,
            action => {
                // Show the busy state before blocking on the request.
                if let Some(terminal) = guard.terminal.as_mut() {
                    terminal.draw(|f| draw(f, &mut app))?;
                }
                app.perform(action).await;
            }
        }
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    None,
    Quit,
    /// First fetch; no toast on success.
    Load,
    Reload,
    Toggle(i64),
    Delete(ConfirmedDelete),
    Create(NewTask),
    Update(i64, TaskUpdate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Searching,
    Form,
    ConfirmDelete(i64),
    Details,
}

#[allow(clippy::struct_excessive_bools)]
struct AppState<A> {
    controller: TaskController<A>,
    user_label: String,
    icons: bool,
    confirm_delete: bool,

    mode: Mode,
    query: String,
    filter: StatusFilter,
    table_state: TableState,
    form: Option<TaskForm>,

    show_stats: bool,
    busy: bool,
    load_error: Option<String>,
    toasts: Toasts,
}

impl<A: TaskApi> AppState<A> {
    fn new(controller: TaskController<A>, ui: &UiConfig, user_label: &str) -> Self {
        let mut table_state = TableState::default();
        table_state.select(Some(0));
        Self {
            controller,
            user_label: user_label.to_owned(),
            icons: ui.icons,
            confirm_delete: ui.confirm_delete,
            mode: Mode::Normal,
            query: String::new(),
            filter: ui.default_filter.parse().unwrap_or_default(),
            table_state,
            form: None,
            show_stats: ui.show_stats,
            busy: false,
            load_error: None,
            toasts: Toasts::new(Duration::from_secs(ui.toast_seconds.max(1))),
        }
    }

    fn visible_len(&self) -> usize {
        self.controller
            .list()
            .view(&self.query, self.filter)
            .visible
            .len()
    }

    fn selected_index(&self) -> usize {
        self.table_state.selected().unwrap_or(0)
    }

    fn selected_task(&self) -> Option<&Task> {
        let view = self.controller.list().view(&self.query, self.filter);
        view.visible.get(self.selected_index()).copied()
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_len();
        let idx = self.selected_index().min(len.saturating_sub(1));
        self.table_state.select(Some(idx));
    }

    fn move_selection(&mut self, delta: i64) {
        let len = self.visible_len();
        if len == 0 {
            return;
        }
        let cur = i64::try_from(self.selected_index()).unwrap_or(i64::MAX);
        let max = i64::try_from(len - 1).unwrap_or(i64::MAX);
        let next = usize::try_from((cur + delta).clamp(0, max)).unwrap_or(0);
        self.table_state.select(Some(next));
    }

    fn set_filter(&mut self, filter: StatusFilter) {
        self.filter = filter;
        self.clamp_selection();
    }

    fn handle_key(&mut self, key: KeyEvent) -> Action {
        if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c'))
        {
            return Action::Quit;
        }
        if self.busy {
            return Action::None;
        }

        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Searching => {
                match key.code {
                    KeyCode::Esc => {
                        self.query.clear();
                        self.mode = Mode::Normal;
                    }
                    KeyCode::Enter => self.mode = Mode::Normal,
                    KeyCode::Backspace => {
                        self.query.pop();
                    }
                    KeyCode::Char(c)
                        if !key.modifiers.contains(KeyModifiers::CONTROL)
                            && !key.modifiers.contains(KeyModifiers::ALT) =>
                    {
                        self.query.push(c);
                    }
                    _ => {}
                }
                self.clamp_selection();
                Action::None
            }
            Mode::Form => self.handle_form_key(key),
            Mode::ConfirmDelete(id) => match key.code {
                KeyCode::Char('y' | 'Y') => {
                    self.mode = Mode::Normal;
                    Action::Delete(ConfirmedDelete::new(id))
                }
                KeyCode::Char('n' | 'N' | 'q') | KeyCode::Esc => {
                    self.mode = Mode::Normal;
                    self.toasts.info("Delete cancelled");
                    Action::None
                }
                _ => Action::None,
            },
            Mode::Details => {
                if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q')) {
                    self.mode = Mode::Normal;
                }
                Action::None
            }
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return Action::Quit,
            KeyCode::Char('/') => self.mode = Mode::Searching,
            KeyCode::Tab => self.set_filter(self.filter.next()),
            KeyCode::Char('1') => self.set_filter(StatusFilter::All),
            KeyCode::Char('2') => self.set_filter(StatusFilter::Active),
            KeyCode::Char('3') => self.set_filter(StatusFilter::Completed),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::PageUp => self.move_selection(-10),
            KeyCode::PageDown => self.move_selection(10),
            KeyCode::Char('s') => self.show_stats = !self.show_stats,
            KeyCode::Char('r') => return Action::Reload,
            KeyCode::Char('a') => {
                self.form = Some(TaskForm::create());
                self.mode = Mode::Form;
            }
            KeyCode::Char('e') => {
                if let Some(form) = self.selected_task().map(TaskForm::edit) {
                    self.form = Some(form);
                    self.mode = Mode::Form;
                }
            }
            KeyCode::Char(' ') => {
                if let Some(task) = self.selected_task() {
                    return Action::Toggle(task.id);
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(id) = self.selected_task().map(|t| t.id) {
                    if !self.confirm_delete {
                        return Action::Delete(ConfirmedDelete::new(id));
                    }
                    self.mode = Mode::ConfirmDelete(id);
                }
            }
            KeyCode::Enter => {
                if self.selected_task().is_some() {
                    self.mode = Mode::Details;
                }
            }
            _ => {}
        }
        Action::None
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Action {
        let Some(form) = self.form.as_mut() else {
            self.mode = Mode::Normal;
            return Action::None;
        };
        match form.handle_key(key) {
            FormOutcome::Pending => Action::None,
            FormOutcome::Cancel => {
                self.form = None;
                self.mode = Mode::Normal;
                Action::None
            }
            FormOutcome::Submit => {
                let submitted = match form.editing() {
                    Some(id) => form.to_update().map(|u| Action::Update(id, u)),
                    None => form.to_new_task().map(Action::Create),
                };
                match submitted {
                    Ok(action) => {
                        form.error = None;
                        form.busy = true;
                        action
                    }
                    Err(e) => {
                        form.error = Some(e.user_message());
                        Action::None
                    }
                }
            }
        }
    }

    /// Awaits the request, then applies the outcome to the screen state.
    async fn perform(&mut self, action: Action) {
        self.busy = true;
        let outcome = match action {
            Action::None | Action::Quit => Ok(None),
            Action::Load => self.controller.load().await.map(|()| None),
            Action::Reload => self.controller.load().await.map(|()| {
                let n = self.controller.list().len();
                self.toasts.info(format!("Reloaded {n} task(s)"));
                None
            }),
            Action::Toggle(id) => self.controller.toggle(id).await.map(|t| {
                Some(if t.completed {
                    "Task marked as completed"
                } else {
                    "Task marked as active"
                })
            }),
            Action::Delete(confirmed) => self
                .controller
                .delete(confirmed)
                .await
                .map(|_| Some("Task deleted successfully")),
            Action::Create(new) => self
                .controller
                .create(new)
                .await
                .map(|_| Some("Task created successfully")),
            Action::Update(id, fields) => self
                .controller
                .update(id, fields)
                .await
                .map(|_| Some("Task updated successfully")),
        };
        self.busy = false;

        match outcome {
            Ok(message) => {
                self.load_error = None;
                if self.mode == Mode::Form {
                    self.form = None;
                    self.mode = Mode::Normal;
                }
                if let Some(message) = message {
                    self.toasts.success(message);
                }
            }
            Err(e) => {
                let message = e.user_message();
                tracing::warn!(error = %e, "dashboard action failed");
                if let Some(form) = self.form.as_mut() {
                    form.busy = false;
                    form.error = Some(message.clone());
                }
                if self.controller.list().revision() == 0 {
                    self.load_error = Some(message.clone());
                }
                self.toasts.error(message);
            }
        }
        self.clamp_selection();
    }
}

fn draw<A: TaskApi>(f: &mut Frame<'_>, app: &mut AppState<A>) {
    let area = f.area();
    let outer = Block::default()
        .title(format!("todui - {}", app.user_label))
        .borders(Borders::ALL);
    let inner = outer.inner(area);
    f.render_widget(outer, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(inner);

    draw_tabs(f, chunks[0], app);
    draw_search(f, chunks[1], app);

    if app.show_stats {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(chunks[2]);
        draw_tasks(f, cols[0], app);
        draw_stats(f, cols[1], app);
    } else {
        draw_tasks(f, chunks[2], app);
    }
    draw_footer(f, chunks[3], app);

    match app.mode {
        Mode::Form => {
            if let Some(form) = &app.form {
                form.render(f, tui::centered_rect(70, 60, area));
            }
        }
        Mode::ConfirmDelete(id) => draw_confirm(f, app, id),
        Mode::Details => draw_details(f, app),
        Mode::Normal | Mode::Searching => {}
    }

    draw_toasts(f, area, &app.toasts);
}

fn draw_tabs<A: TaskApi>(f: &mut Frame<'_>, area: Rect, app: &AppState<A>) {
    let counts = app.controller.list().view("", app.filter).counts;
    let titles: Vec<String> = StatusFilter::TABS
        .iter()
        .map(|t| format!("{} ({})", t.label(), counts.get(*t)))
        .collect();
    let selected = StatusFilter::TABS
        .iter()
        .position(|t| *t == app.filter)
        .unwrap_or(0);
    let tabs = Tabs::new(titles)
        .select(selected)
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )
        .divider(" ");
    f.render_widget(tabs, area);
}

fn draw_search<A: TaskApi>(f: &mut Frame<'_>, area: Rect, app: &AppState<A>) {
    let searching = app.mode == Mode::Searching;
    let (text, style) = if app.query.is_empty() && !searching {
        (
            "Search tasks... (press /)".to_owned(),
            Style::default().fg(Color::DarkGray),
        )
    } else {
        (
            format!("{}{}", app.query, if searching { "▏" } else { "" }),
            Style::default(),
        )
    };
    let border = if searching {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let p = Paragraph::new(Span::styled(text, style)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title("Search"),
    );
    f.render_widget(p, area);
}

fn draw_tasks<A: TaskApi>(f: &mut Frame<'_>, area: Rect, app: &mut AppState<A>) {
    let view = app.controller.list().view(&app.query, app.filter);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Tasks ({})", view.visible.len()));

    if view.visible.is_empty() {
        let msg = if let Some(err) = &app.load_error {
            format!("Could not load tasks: {err}")
        } else if view.is_empty_list() {
            EMPTY_LIST_MSG.to_owned()
        } else {
            NO_MATCH_MSG.to_owned()
        };
        let p = Paragraph::new(Span::styled(msg, Style::default().fg(Color::DarkGray)))
            .block(block)
            .wrap(Wrap { trim: true });
        f.render_widget(p, area);
        return;
    }

    let today = time::OffsetDateTime::now_utc().date();
    let rows: Vec<Row<'_>> = view
        .visible
        .iter()
        .map(|t| {
            let mark = match (app.icons, t.completed) {
                (true, true) => "✓",
                (true, false) => "○",
                (false, true) => "[x]",
                (false, false) => "[ ]",
            };
            let title_style = if t.completed {
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default()
            };
            let due = t.due().map(|d| d.to_string()).unwrap_or_default();
            let due_style = if t.is_overdue(today) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            Row::new(vec![
                Line::from(mark),
                Line::from(Span::styled(t.title.clone(), title_style)),
                Line::from(Span::styled(
                    t.priority.as_str(),
                    Style::default().fg(priority_color(t.priority)),
                )),
                Line::from(Span::styled(due, due_style)),
                Line::from(t.category.clone().unwrap_or_default()),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(3),
        Constraint::Percentage(50),
        Constraint::Length(8),
        Constraint::Length(12),
        Constraint::Percentage(20),
    ];
    let header = Row::new(vec!["", "TITLE", "PRIORITY", "DUE", "CATEGORY"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">");

    f.render_stateful_widget(table, area, &mut app.table_state);
}

fn priority_color(p: Priority) -> Color {
    match p {
        Priority::High => Color::Red,
        Priority::Medium => Color::Yellow,
        Priority::Low => Color::Green,
    }
}

fn draw_stats<A: TaskApi>(f: &mut Frame<'_>, area: Rect, app: &AppState<A>) {
    let today = time::OffsetDateTime::now_utc().date();
    let stats = TaskStats::compute(app.controller.list().tasks(), today);
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Total:     ", bold),
            Span::raw(stats.total.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Completed: ", bold),
            Span::raw(format!("{} ({}%)", stats.completed, stats.completion_rate)),
        ]),
        Line::from(vec![
            Span::styled("Active:    ", bold),
            Span::raw(stats.active.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Overdue:   ", bold),
            Span::styled(
                stats.overdue.to_string(),
                if stats.overdue > 0 {
                    Style::default().fg(Color::Red)
                } else {
                    Style::default()
                },
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled("Active by priority", bold)),
    ];
    for p in Priority::ALL {
        lines.push(Line::from(vec![
            Span::styled(
                format!("  {:<8}", p.as_str()),
                Style::default().fg(priority_color(p)),
            ),
            Span::raw(stats.by_priority.get(p).to_string()),
        ]));
    }

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Stats"));
    f.render_widget(p, area);
}

fn draw_footer<A: TaskApi>(f: &mut Frame<'_>, area: Rect, app: &AppState<A>) {
    let keys = match app.mode {
        _ if app.busy => "Working...",
        Mode::Normal => {
            "q quit • / search • Tab/1-3 filter • Space toggle • a add • e edit • d delete • s stats • r reload • Enter details"
        }
        Mode::Searching => "Type to filter • Enter keep • Esc clear",
        Mode::Form => "Enter save • Tab next field • Esc cancel",
        Mode::ConfirmDelete(_) => "y delete • n/Esc cancel",
        Mode::Details => "Enter/Esc close",
    };
    let p = Paragraph::new(Line::from(Span::styled(
        keys,
        Style::default().fg(Color::DarkGray),
    )))
    .wrap(Wrap { trim: true });
    f.render_widget(p, area);
}

fn draw_confirm<A: TaskApi>(f: &mut Frame<'_>, app: &AppState<A>, id: i64) {
    let title = app
        .controller
        .list()
        .get(id)
        .map(|t| t.title.clone())
        .unwrap_or_default();
    let popup = tui::centered_rect(50, 25, f.area());
    f.render_widget(Clear, popup);
    let lines = vec![
        Line::from(Span::styled(
            DELETE_PROMPT,
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(title),
        Line::from(""),
        Line::from(Span::styled(
            "y delete • n/Esc cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let p = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title("Delete Task"),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(p, popup);
}

fn draw_details<A: TaskApi>(f: &mut Frame<'_>, app: &AppState<A>) {
    let Some(t) = app.selected_task() else {
        return;
    };
    let popup = tui::centered_rect(80, 70, f.area());
    f.render_widget(Clear, popup);

    let none = || "-".to_owned();
    let lines = vec![
        Line::from(format!("Title: {}", t.title)),
        Line::from(format!(
            "Status: {}",
            if t.completed { "completed" } else { "active" }
        )),
        Line::from(format!("Priority: {}", t.priority)),
        Line::from(format!(
            "Due: {}",
            t.due().map_or_else(none, |d| d.to_string())
        )),
        Line::from(format!(
            "Category: {}",
            t.category.clone().unwrap_or_else(none)
        )),
        Line::from(format!("Created: {}", t.created_at)),
        Line::from(format!("Updated: {}", t.updated_at)),
        Line::from(""),
        Line::from(if t.description.is_empty() {
            "(no description)".to_owned()
        } else {
            t.description.clone()
        }),
        Line::from(""),
        Line::from("Press Enter to close."),
    ];
    let p = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Task #{}", t.id)),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(p, popup);
}

fn draw_toasts(f: &mut Frame<'_>, area: Rect, toasts: &Toasts) {
    let width = area.width.min(50);
    let mut y = area.y + 1;
    for toast in toasts.iter() {
        if y + 3 > area.y + area.height {
            break;
        }
        let rect = Rect::new(area.x + area.width - width, y, width, 3);
        let color = match toast.kind {
            ToastKind::Success => Color::Green,
            ToastKind::Error => Color::Red,
            ToastKind::Info => Color::Blue,
        };
        f.render_widget(Clear, rect);
        let p = Paragraph::new(toast.message.as_str()).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        );
        f.render_widget(p, rect);
        y += 3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::list::tests::{FakeApi, task};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    async fn app_with(tasks: Vec<Task>) -> AppState<FakeApi> {
        let controller = TaskController::new(FakeApi::with_tasks(tasks), "usr_1");
        let mut app = AppState::new(controller, &UiConfig::default(), "tester");
        app.perform(Action::Load).await;
        app
    }

    fn titles(app: &AppState<FakeApi>) -> Vec<String> {
        app.controller
            .list()
            .view(&app.query, app.filter)
            .visible
            .iter()
            .map(|t| t.title.clone())
            .collect()
    }

    #[tokio::test]
    async fn search_filters_live_and_esc_clears() {
        let mut app = app_with(vec![task(2, "Buy milk", false), task(1, "Walk dog", true)]).await;

        assert_eq!(app.handle_key(key(KeyCode::Char('/'))), Action::None);
        for c in "MILK".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        assert_eq!(titles(&app), vec!["Buy milk"]);

        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.mode, Mode::Normal);
        assert!(app.query.is_empty());
        assert_eq!(titles(&app).len(), 2);
    }

    #[tokio::test]
    async fn tab_keys_switch_filter_and_clamp_selection() {
        let mut app = app_with(vec![
            task(3, "a", false),
            task(2, "b", false),
            task(1, "c", true),
        ])
        .await;
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.selected_index(), 2);

        app.handle_key(key(KeyCode::Char('3')));
        assert_eq!(app.filter, StatusFilter::Completed);
        assert_eq!(app.selected_index(), 0);

        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.filter, StatusFilter::All);
    }

    #[tokio::test]
    async fn delete_requires_confirmation() {
        let mut app = app_with(vec![task(1, "a", false)]).await;

        assert_eq!(app.handle_key(key(KeyCode::Char('d'))), Action::None);
        assert_eq!(app.mode, Mode::ConfirmDelete(1));
        assert_eq!(app.handle_key(key(KeyCode::Char('n'))), Action::None);
        assert_eq!(app.controller.list().len(), 1);

        app.handle_key(key(KeyCode::Char('d')));
        let action = app.handle_key(key(KeyCode::Char('y')));
        assert_eq!(action, Action::Delete(ConfirmedDelete::new(1)));
        app.perform(action).await;
        assert!(app.controller.list().is_empty());
        let msgs: Vec<_> = app.toasts.iter().map(|t| t.message.clone()).collect();
        assert_eq!(msgs, vec!["Delete cancelled", "Task deleted successfully"]);
    }

    #[tokio::test]
    async fn reload_fetches_again_and_reports() {
        let mut app = app_with(vec![task(1, "a", false)]).await;
        assert!(app.toasts.is_empty());

        app.controller
            .api()
            .tasks
            .lock()
            .unwrap()
            .insert(0, task(2, "b", false));
        let action = app.handle_key(key(KeyCode::Char('r')));
        assert_eq!(action, Action::Reload);
        app.perform(action).await;

        assert_eq!(titles(&app), vec!["b", "a"]);
        let toast = app.toasts.iter().next().unwrap();
        assert_eq!(toast.kind, ToastKind::Info);
        assert_eq!(toast.message, "Reloaded 2 task(s)");
    }

    #[tokio::test]
    async fn space_toggles_selected_task() {
        let mut app = app_with(vec![task(7, "a", false)]).await;
        let action = app.handle_key(key(KeyCode::Char(' ')));
        assert_eq!(action, Action::Toggle(7));
        app.perform(action).await;
        assert!(app.controller.list().get(7).unwrap().completed);
    }

    #[tokio::test]
    async fn add_form_creates_and_closes() {
        let mut app = app_with(vec![task(1, "old", false)]).await;
        app.handle_key(key(KeyCode::Char('a')));
        assert_eq!(app.mode, Mode::Form);

        // Blank title stays in the form with an inline error.
        assert_eq!(app.handle_key(key(KeyCode::Enter)), Action::None);
        assert_eq!(
            app.form.as_ref().unwrap().error.as_deref(),
            Some("Title is required")
        );

        for c in "new".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        let action = app.handle_key(key(KeyCode::Enter));
        assert!(matches!(action, Action::Create(_)));
        app.perform(action).await;

        assert_eq!(app.mode, Mode::Normal);
        assert!(app.form.is_none());
        assert_eq!(titles(&app), vec!["new", "old"]);
    }

    #[tokio::test]
    async fn api_failure_keeps_form_open_and_list_unchanged() {
        let mut app = app_with(vec![task(1, "old", false)]).await;
        app.controller_api_fail("Failed to create task");

        app.handle_key(key(KeyCode::Char('a')));
        app.handle_key(key(KeyCode::Char('x')));
        let action = app.handle_key(key(KeyCode::Enter));
        app.perform(action).await;

        assert_eq!(app.mode, Mode::Form);
        let form = app.form.as_ref().unwrap();
        assert!(!form.busy);
        assert_eq!(form.error.as_deref(), Some("Failed to create task"));
        assert_eq!(titles(&app), vec!["old"]);
        assert!(
            app.toasts
                .iter()
                .any(|t| t.kind == ToastKind::Error && t.message == "Failed to create task")
        );
    }

    #[tokio::test]
    async fn quit_keys() {
        let mut app = app_with(vec![]).await;
        assert_eq!(app.handle_key(key(KeyCode::Char('q'))), Action::Quit);
        assert_eq!(
            app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Action::Quit
        );
    }

    impl AppState<FakeApi> {
        fn controller_api_fail(&self, msg: &str) {
            self.controller.api().fail(msg);
        }
    }
}
