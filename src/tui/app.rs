//! Main application logic for the terminal user interface.
//!
//! This module contains the `App` struct which manages the TUI state,
//! handles user input, renders the interface, and coordinates between
//! different screens (task list, detail, form, confirmation, help).
//!
//! The task list is never owned by the UI: it is re-read from the shared
//! cache whenever the cache's watch channel reports a change. Mutations run
//! as tokio tasks and report back through a channel of [`Notice`]s.

use std::io;
use std::time::Duration;

use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::cache::{QueryKey, QueryState, TaskCache};
use crate::display::{count_line, due_tone, format_due, matches_query, TaskStats};
use crate::error::ApiError;
use crate::mutation::MutationCoordinator;
use crate::task::{Task, TaskDraft, TaskId};
use crate::tui::{
    colors::{due_color, priority_color, DARK_GREEN, DARK_RED, GOLD, MUTED},
    enums::{AppState, InputMode, Notice},
    task_form::{TaskForm, DESCRIPTION_FIELD, DUE_FIELD, PRIORITY_FIELD, TIME_FIELD, TITLE_FIELD},
    utils::centered_rect,
};

/// Main application state for the terminal user interface.
pub struct App {
    state: AppState,
    cache: TaskCache,
    mutations: MutationCoordinator,
    tasks_rx: watch::Receiver<QueryState>,
    tasks: QueryState,
    task_list_state: TableState,
    filtered_tasks: Vec<TaskId>,
    selected_task: Option<TaskId>,
    editing: Option<TaskId>,
    task_form: TaskForm,
    input_mode: InputMode,
    status_message: String,
    status_is_error: bool,
    show_completed: bool,
    filter_text: String,
    filter_active: bool,
    confirm_action: Option<String>,
    notices_tx: mpsc::UnboundedSender<Notice>,
    notices_rx: mpsc::UnboundedReceiver<Notice>,
}

impl App {
    /// Create an App observing `cache` and mutating through `mutations`.
    pub fn new(cache: TaskCache, mutations: MutationCoordinator) -> Self {
        let tasks_rx = cache.subscribe(QueryKey::Tasks);
        let tasks = tasks_rx.borrow().clone();
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();
        let mut app = App {
            state: AppState::TaskList,
            cache,
            mutations,
            tasks_rx,
            tasks,
            task_list_state: TableState::default(),
            filtered_tasks: Vec::new(),
            selected_task: None,
            editing: None,
            task_form: TaskForm::new(),
            input_mode: InputMode::None,
            status_message: String::new(),
            status_is_error: false,
            show_completed: false,
            filter_text: String::new(),
            filter_active: false,
            confirm_action: None,
            notices_tx,
            notices_rx,
        };
        app.update_filtered_tasks();
        app
    }

    /// Refetch the task list in the background.
    pub fn request_refresh(&mut self) {
        let _refetch = self.cache.invalidate(QueryKey::Tasks);
    }

    /// Pull the latest cache state and mutation outcomes into the view.
    pub fn sync(&mut self) {
        if self.tasks_rx.has_changed().unwrap_or(false) {
            self.tasks = self.tasks_rx.borrow_and_update().clone();
            self.update_filtered_tasks();
        }
        while let Ok(notice) = self.notices_rx.try_recv() {
            self.set_status_message(notice.message().to_string(), notice.is_error());
        }
    }

    fn all_tasks(&self) -> &[Task] {
        self.tasks.tasks()
    }

    fn task(&self, id: TaskId) -> Option<&Task> {
        self.all_tasks().iter().find(|t| t.id == id)
    }

    /// Update the filtered task list based on completion and search filters,
    /// keeping the selection on the same task when it is still visible.
    fn update_filtered_tasks(&mut self) {
        let old_selected_id = self
            .task_list_state
            .selected()
            .and_then(|idx| self.filtered_tasks.get(idx))
            .copied();

        self.filtered_tasks = self
            .all_tasks()
            .iter()
            .filter(|t| self.show_completed || !t.is_completed)
            .filter(|t| matches_query(t, &self.filter_text))
            .map(|t| t.id)
            .collect();

        let restored = old_selected_id.and_then(|id| self.filtered_tasks.iter().position(|&t| t == id));
        let selection = match restored {
            Some(idx) => Some(idx),
            None if self.filtered_tasks.is_empty() => None,
            None => Some(
                self.task_list_state
                    .selected()
                    .unwrap_or(0)
                    .min(self.filtered_tasks.len() - 1),
            ),
        };
        self.task_list_state.select(selection);
    }

    fn highlighted_task(&self) -> Option<TaskId> {
        self.task_list_state
            .selected()
            .and_then(|idx| self.filtered_tasks.get(idx))
            .copied()
    }

    fn set_status_message(&mut self, msg: String, is_error: bool) {
        self.status_message = msg;
        self.status_is_error = is_error;
    }

    fn clear_status_message(&mut self) {
        self.status_message.clear();
        self.status_is_error = false;
    }

    /// Send `notice` back to the UI when `fut` finishes.
    fn spawn_mutation<F>(&self, fut: F)
    where
        F: std::future::Future<Output = Notice> + Send + 'static,
    {
        let tx = self.notices_tx.clone();
        tokio::spawn(async move {
            let notice = fut.await;
            let _ = tx.send(notice);
        });
    }

    /// Flip completion optimistically; the list shows the change as soon as
    /// the coordinator has written it to the cache.
    fn toggle_task(&mut self, id: TaskId) {
        let Some(task) = self.task(id) else {
            return;
        };
        let target = !task.is_completed;
        let title = task.title.clone();
        let mutations = self.mutations.clone();
        debug!(id, target, "toggle requested");
        self.spawn_mutation(async move {
            match mutations.toggle_completion(id, target).await {
                Ok(()) if target => Notice::Done(format!("Completed \"{title}\"")),
                Ok(()) => Notice::Done(format!("Reopened \"{title}\"")),
                Err(e) => Notice::Failed(format!("Could not update \"{title}\": {}", describe(&e))),
            }
        });
    }

    fn start_add(&mut self) {
        self.editing = None;
        self.task_form = TaskForm::new();
        self.state = AppState::AddTask;
        self.input_mode = InputMode::Text;
    }

    fn start_edit(&mut self, id: TaskId) {
        let Some(task) = self.task(id) else {
            return;
        };
        self.task_form = TaskForm::from_task(task, &Local);
        self.editing = Some(id);
        self.selected_task = Some(id);
        self.state = AppState::EditTask;
        self.input_mode = InputMode::Text;
    }

    fn start_delete(&mut self, id: TaskId) {
        let title = self.task(id).map(|t| t.title.clone()).unwrap_or_default();
        self.selected_task = Some(id);
        self.confirm_action = Some(format!("Delete task #{id} \"{title}\""));
        self.state = AppState::Confirm;
    }

    fn submit_form(&mut self) {
        let draft = match self.task_form.to_draft(&Local::now()) {
            Ok(draft) => draft,
            Err(e) => {
                self.set_status_message(capitalise(&e.to_string()), true);
                return;
            }
        };
        let mutations = self.mutations.clone();
        match self.editing {
            Some(id) => self.spawn_mutation(async move { save_edit(mutations, id, draft).await }),
            None => self.spawn_mutation(async move { save_new(mutations, draft).await }),
        }
        self.state = AppState::TaskList;
        self.input_mode = InputMode::None;
        self.set_status_message("Saving…".to_string(), false);
    }

    fn delete_selected_task(&mut self) {
        let Some(id) = self.selected_task else {
            return;
        };
        let mutations = self.mutations.clone();
        self.spawn_mutation(async move {
            match mutations.delete_task(id).await {
                Ok(()) => Notice::Done(format!("Deleted task #{id}")),
                Err(e) => Notice::Failed(format!("Could not delete task #{id}: {}", describe(&e))),
            }
        });
    }

    fn handle_task_list_input(&mut self, key: KeyCode, modifiers: KeyModifiers) -> bool {
        if self.filter_active {
            match key {
                KeyCode::Esc => {
                    self.filter_active = false;
                    self.filter_text.clear();
                    self.input_mode = InputMode::None;
                    self.update_filtered_tasks();
                    self.clear_status_message();
                }
                KeyCode::Enter => {
                    self.filter_active = false;
                    self.input_mode = InputMode::None;
                    if self.filter_text.is_empty() {
                        self.set_status_message("Filter cleared".to_string(), false);
                    } else {
                        self.set_status_message(
                            format!("Filter applied: '{}' ({} tasks)", self.filter_text, self.filtered_tasks.len()),
                            false,
                        );
                    }
                }
                KeyCode::Backspace => {
                    if self.filter_text.pop().is_some() {
                        self.update_filtered_tasks();
                    }
                }
                KeyCode::Char(c) => {
                    self.filter_text.push(c);
                    self.update_filtered_tasks();
                }
                _ => {}
            }
            return false;
        }

        match key {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Char('q') => return true,
            KeyCode::Esc => {
                if self.filter_text.is_empty() {
                    return true;
                }
                self.filter_text.clear();
                self.update_filtered_tasks();
                self.clear_status_message();
            }
            KeyCode::Up | KeyCode::Char('k') => {
                if let Some(selected) = self.task_list_state.selected() {
                    self.task_list_state.select(Some(selected.saturating_sub(1)));
                } else if !self.filtered_tasks.is_empty() {
                    self.task_list_state.select(Some(0));
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if let Some(selected) = self.task_list_state.selected() {
                    if selected + 1 < self.filtered_tasks.len() {
                        self.task_list_state.select(Some(selected + 1));
                    }
                } else if !self.filtered_tasks.is_empty() {
                    self.task_list_state.select(Some(0));
                }
            }
            KeyCode::Enter => {
                if let Some(id) = self.highlighted_task() {
                    self.selected_task = Some(id);
                    self.state = AppState::TaskDetail;
                }
            }
            KeyCode::Char(' ') | KeyCode::Char('c') => {
                if let Some(id) = self.highlighted_task() {
                    self.toggle_task(id);
                }
            }
            KeyCode::Char('a') => self.start_add(),
            KeyCode::Char('e') => {
                if let Some(id) = self.highlighted_task() {
                    self.start_edit(id);
                }
            }
            KeyCode::Char('d') => {
                if let Some(id) = self.highlighted_task() {
                    self.start_delete(id);
                }
            }
            KeyCode::Char('t') => {
                self.show_completed = !self.show_completed;
                self.update_filtered_tasks();
                let msg = if self.show_completed {
                    format!("Showing all tasks ({} total)", self.filtered_tasks.len())
                } else {
                    format!("Hiding completed tasks ({} visible)", self.filtered_tasks.len())
                };
                self.set_status_message(msg, false);
            }
            KeyCode::Char('/') => {
                self.filter_active = true;
                self.input_mode = InputMode::Text;
                self.set_status_message(
                    "Filter mode: Type to search title/description, Enter to apply, Esc to cancel".to_string(),
                    false,
                );
            }
            KeyCode::Char('h') | KeyCode::F(1) => self.state = AppState::Help,
            KeyCode::Char('r') => {
                self.request_refresh();
                self.set_status_message("Refreshing…".to_string(), false);
            }
            _ => {}
        }
        false
    }

    fn handle_detail_input(&mut self, key: KeyCode) -> bool {
        let Some(id) = self.selected_task else {
            self.state = AppState::TaskList;
            return false;
        };
        match key {
            KeyCode::Esc | KeyCode::Char('q') => self.state = AppState::TaskList,
            KeyCode::Char('e') => self.start_edit(id),
            KeyCode::Char('d') => self.start_delete(id),
            KeyCode::Char(' ') | KeyCode::Char('c') => self.toggle_task(id),
            _ => {}
        }
        false
    }

    fn handle_form_input(&mut self, key: KeyCode) -> bool {
        match key {
            KeyCode::Esc => {
                self.state = if self.editing.is_some() && self.selected_task.is_some() {
                    AppState::TaskDetail
                } else {
                    AppState::TaskList
                };
                self.input_mode = InputMode::None;
            }
            KeyCode::Tab | KeyCode::Down => self.task_form.next_field(),
            KeyCode::BackTab | KeyCode::Up => self.task_form.prev_field(),
            KeyCode::Left => self.task_form.handle_left_right(false),
            KeyCode::Right => self.task_form.handle_left_right(true),
            KeyCode::Backspace => self.task_form.handle_backspace(),
            KeyCode::Delete => self.task_form.handle_delete(),
            KeyCode::Enter => self.submit_form(),
            KeyCode::Char(c) => self.task_form.handle_char(c),
            _ => {}
        }
        false
    }

    fn handle_confirm_input(&mut self, key: KeyCode) -> bool {
        match key {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                if self.confirm_action.take().is_some() {
                    self.delete_selected_task();
                    self.set_status_message("Deleting…".to_string(), false);
                }
                self.state = AppState::TaskList;
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.state = AppState::TaskList;
                self.confirm_action = None;
            }
            _ => {}
        }
        false
    }

    fn handle_help_input(&mut self, key: KeyCode) -> bool {
        if matches!(key, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('h')) {
            self.state = AppState::TaskList;
        }
        false
    }

    /// Dispatch a key press to the current screen. Returns true to quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        if self.input_mode == InputMode::None {
            self.clear_status_message();
        }
        match self.state {
            AppState::TaskList => self.handle_task_list_input(key.code, key.modifiers),
            AppState::TaskDetail => self.handle_detail_input(key.code),
            AppState::AddTask | AppState::EditTask => self.handle_form_input(key.code),
            AppState::Help => self.handle_help_input(key.code),
            AppState::Confirm => self.handle_confirm_input(key.code),
        }
    }

    /// Poll for and handle keyboard events.
    ///
    /// Returns true if the application should quit.
    fn handle_input(&mut self) -> io::Result<bool> {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                return Ok(self.handle_key(key));
            }
        }
        Ok(false)
    }

    /// Render the stats header and the task table.
    fn render_task_list(&mut self, f: &mut Frame, area: Rect) {
        let now = Local::now();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        let stats = TaskStats::from_tasks(self.all_tasks());
        let header_text = Line::from(vec![
            Span::styled("TASKDECK", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(format!("Total {}", stats.total), Style::default().fg(Color::Cyan)),
            Span::raw("  "),
            Span::styled(format!("Completed {}", stats.completed), Style::default().fg(Color::Green)),
            Span::raw("  "),
            Span::styled(format!("Pending {}", stats.pending), Style::default().fg(GOLD)),
        ]);
        let header_block = Paragraph::new(header_text)
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center);
        f.render_widget(header_block, chunks[0]);

        let title = format!(
            "{} - Press 'h' for help",
            count_line(self.filtered_tasks.len())
        );
        let block = Block::default().borders(Borders::ALL).title(title);

        if self.filtered_tasks.is_empty() {
            let text = if self.tasks.is_loading() {
                "Loading tasks…"
            } else if self.all_tasks().is_empty() {
                "No tasks yet. Press 'a' to add one."
            } else {
                "No tasks match the current filter."
            };
            let empty = Paragraph::new(text)
                .style(Style::default().fg(MUTED))
                .alignment(Alignment::Center)
                .block(block);
            f.render_widget(empty, chunks[1]);
            return;
        }

        let header = Row::new(["", "Priority", "Due", "Title"].map(|h| {
            Cell::from(h).style(Style::default().add_modifier(Modifier::BOLD))
        }))
        .style(Style::default().bg(GOLD).fg(Color::Rgb(20, 20, 20)))
        .height(1);

        let rows: Vec<Row> = self
            .filtered_tasks
            .iter()
            .filter_map(|&id| self.task(id))
            .map(|task| {
                let title_style = if task.is_completed {
                    Style::default().fg(MUTED).add_modifier(Modifier::CROSSED_OUT)
                } else {
                    Style::default().fg(Color::White)
                };
                Row::new(vec![
                    Cell::from(if task.is_completed { "[x]" } else { "[ ]" }),
                    Cell::from(task.priority.label()).style(Style::default().fg(priority_color(task.priority))),
                    Cell::from(format_due(task.due_date, &now))
                        .style(Style::default().fg(due_color(due_tone(task, &now)))),
                    Cell::from(task.title.clone()).style(title_style),
                ])
            })
            .collect();

        let widths = [
            Constraint::Length(3),
            Constraint::Length(8),
            Constraint::Length(26),
            Constraint::Min(20),
        ];

        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .row_highlight_style(Style::default().bg(Color::Gray).fg(Color::Black))
            .highlight_symbol(">> ");

        f.render_stateful_widget(table, chunks[1], &mut self.task_list_state);
    }

    fn render_task_detail(&mut self, f: &mut Frame, area: Rect) {
        let Some(task) = self.selected_task.and_then(|id| self.task(id)) else {
            let gone = Paragraph::new("This task no longer exists.")
                .block(Block::default().borders(Borders::ALL).title("Task Details - [Esc] back"));
            f.render_widget(gone, area);
            return;
        };
        let now = Local::now();
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let stamp = |dt: chrono::DateTime<chrono::Utc>| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string();

        let text = vec![
            Line::from(vec![Span::styled("ID: ", bold), Span::raw(task.id.to_string())]),
            Line::from(vec![Span::styled("Title: ", bold), Span::raw(task.title.clone())]),
            Line::from(vec![
                Span::styled("Status: ", bold),
                if task.is_completed {
                    Span::styled("Completed", Style::default().fg(Color::Green))
                } else {
                    Span::styled("Pending", Style::default().fg(GOLD))
                },
            ]),
            Line::from(vec![
                Span::styled("Priority: ", bold),
                Span::styled(task.priority.label(), Style::default().fg(priority_color(task.priority))),
            ]),
            Line::from(vec![
                Span::styled("Due: ", bold),
                Span::styled(
                    format_due(task.due_date, &now),
                    Style::default().fg(due_color(due_tone(task, &now))),
                ),
            ]),
            Line::from(vec![Span::styled("Created: ", bold), Span::raw(stamp(task.created_at))]),
            Line::from(vec![
                Span::styled("Updated: ", bold),
                Span::raw(task.updated_at.map(stamp).unwrap_or_else(|| "-".into())),
            ]),
            Line::from(""),
            Line::from(vec![Span::styled("Description:", bold)]),
            Line::from(task.description_text().unwrap_or("-").to_string()),
        ];

        let paragraph = Paragraph::new(text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Task Details - [space] toggle, [e]dit, [d]elete, [Esc] back"),
            )
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    }

    fn render_task_form(&mut self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Title
                Constraint::Length(5), // Description
                Constraint::Length(3), // Priority
                Constraint::Length(3), // Due date
                Constraint::Length(3), // Time
                Constraint::Min(1),    // Instructions
            ])
            .split(area);

        let form = &self.task_form;
        let focus = |field: usize| {
            if form.current_field == field {
                Style::default().fg(GOLD)
            } else {
                Style::default()
            }
        };
        let input = |value: &str, title: &'static str, field: usize| {
            Paragraph::new(value.to_string()).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .border_style(focus(field)),
            )
        };

        f.render_widget(input(&form.title.value, "Title *", TITLE_FIELD), chunks[0]);
        f.render_widget(
            input(&form.description.value, "Description", DESCRIPTION_FIELD).wrap(Wrap { trim: false }),
            chunks[1],
        );
        let priority = form.selected_priority();
        let selector = Paragraph::new(Line::from(vec![
            Span::raw("< "),
            Span::styled(priority.label(), Style::default().fg(priority_color(priority))),
            Span::raw(" >"),
        ]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Priority (←/→)")
                .border_style(focus(PRIORITY_FIELD)),
        );
        f.render_widget(selector, chunks[2]);
        f.render_widget(
            input(&form.due.value, "Due (YYYY-MM-DD, today, tomorrow, friday, in Nd)", DUE_FIELD),
            chunks[3],
        );
        f.render_widget(input(&form.time.value, "Time (HH:MM, defaults to now)", TIME_FIELD), chunks[4]);

        let heading = if self.editing.is_some() { "Edit Task" } else { "Add Task" };
        let instructions = Paragraph::new("Tab/↑/↓ move between fields  Enter save  Esc cancel")
            .block(Block::default().borders(Borders::ALL).title(heading))
            .alignment(Alignment::Center);
        f.render_widget(instructions, chunks[5]);

        let cursor_field = match form.current_field {
            TITLE_FIELD => Some((&form.title, chunks[0])),
            DESCRIPTION_FIELD => Some((&form.description, chunks[1])),
            DUE_FIELD => Some((&form.due, chunks[3])),
            TIME_FIELD => Some((&form.time, chunks[4])),
            _ => None,
        };
        if let Some((field, rect)) = cursor_field {
            let x = rect.x + 1 + (field.cursor as u16).min(rect.width.saturating_sub(2));
            f.set_cursor_position((x, rect.y + 1));
        }
    }

    fn render_help(&mut self, f: &mut Frame, area: Rect) {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let help_text = vec![
            Line::from(vec![Span::styled("Taskdeck Help", bold)]),
            Line::from(""),
            Line::from(vec![Span::styled("Task List:", bold)]),
            Line::from("  ↑/↓, k/j      Navigate tasks"),
            Line::from("  Enter         View task details"),
            Line::from("  Space/c       Toggle completion"),
            Line::from("  a             Add new task"),
            Line::from("  e             Edit selected task"),
            Line::from("  d             Delete selected task"),
            Line::from("  t             Show/hide completed tasks"),
            Line::from("  /             Filter by title/description"),
            Line::from("  r             Refetch from the server"),
            Line::from("  h/F1          Show this help"),
            Line::from("  q/Esc/Ctrl+C  Quit"),
            Line::from(""),
            Line::from(vec![Span::styled("Form:", bold)]),
            Line::from("  Tab/↑/↓       Move between fields"),
            Line::from("  ←/→           Move cursor, change priority"),
            Line::from("  Enter         Save"),
            Line::from("  Esc           Cancel"),
            Line::from(""),
            Line::from(vec![Span::styled("Due Date Formats:", bold)]),
            Line::from("  YYYY-MM-DD    Specific date (e.g., 2025-12-25)"),
            Line::from("  today, tomorrow, yesterday"),
            Line::from("  friday, next monday"),
            Line::from("  in 3d, in 2w"),
        ];

        let paragraph = Paragraph::new(help_text)
            .block(Block::default().borders(Borders::ALL).title("Help - Esc to return"))
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    }

    fn render_confirm(&mut self, f: &mut Frame, area: Rect) {
        let block = Block::default()
            .title("Confirm Action")
            .borders(Borders::ALL)
            .style(Style::default().bg(DARK_RED));

        let area = centered_rect(50, 30, area);
        f.render_widget(Clear, area);

        let text = vec![
            Line::from(""),
            Line::from(vec![Span::styled(
                "Are you sure you want to:",
                Style::default().add_modifier(Modifier::BOLD),
            )]),
            Line::from(self.confirm_action.clone().unwrap_or_default()),
            Line::from(""),
            Line::from("This action cannot be undone."),
            Line::from(""),
            Line::from("Press 'y' to confirm, 'n' to cancel"),
        ];

        let paragraph = Paragraph::new(text)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    }

    fn status_text(&self) -> (String, bool) {
        if !self.status_message.is_empty() {
            return (self.status_message.clone(), self.status_is_error);
        }
        if self.filter_active {
            return (format!("Search: {} (Esc to clear, Enter to confirm)", self.filter_text), false);
        }
        if let Some(err) = &self.tasks.error {
            return (format!("Could not load tasks: {}", describe(err)), true);
        }
        let text = match self.state {
            AppState::TaskList if !self.filter_text.is_empty() => format!(
                "Tasks: {} (filtered by '{}') | Press 'h' for help",
                self.filtered_tasks.len(),
                self.filter_text
            ),
            AppState::TaskList if self.tasks.fetching && !self.tasks.is_loading() => "Syncing…".to_string(),
            AppState::TaskList => format!("Tasks: {} | Press 'h' for help", self.filtered_tasks.len()),
            AppState::TaskDetail => "Task Details".to_string(),
            AppState::AddTask => "Add New Task".to_string(),
            AppState::EditTask => "Edit Task".to_string(),
            AppState::Help => "Help".to_string(),
            AppState::Confirm => "Confirm Action".to_string(),
        };
        (text, false)
    }

    fn render_status_bar(&mut self, f: &mut Frame, area: Rect) {
        let (text, is_error) = self.status_text();
        let bg = if is_error { DARK_RED } else { DARK_GREEN };
        let status = Paragraph::new(text)
            .style(Style::default().bg(bg).fg(Color::White))
            .alignment(Alignment::Left);
        f.render_widget(status, area);
    }

    /// Main render function that dispatches to appropriate view renderers.
    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(f.area());

        match self.state {
            AppState::TaskList => self.render_task_list(f, chunks[0]),
            AppState::TaskDetail => self.render_task_detail(f, chunks[0]),
            AppState::AddTask | AppState::EditTask => self.render_task_form(f, chunks[0]),
            AppState::Help => self.render_help(f, chunks[0]),
            AppState::Confirm => {
                self.render_task_list(f, chunks[0]);
                self.render_confirm(f, chunks[0]);
            }
        }

        self.render_status_bar(f, chunks[1]);
    }

    /// Main event loop for the TUI application.
    ///
    /// Handles rendering and input processing until the user exits.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            self.sync();
            terminal.draw(|f| self.render(f))?;

            if self.handle_input()? {
                break;
            }
        }
        Ok(())
    }
}

async fn save_new(mutations: MutationCoordinator, draft: TaskDraft) -> Notice {
    match mutations.create_task(&draft).await {
        Ok(task) => Notice::Done(format!("Task created: {}", task.title)),
        Err(e) => Notice::Failed(format!("Could not create task: {}", describe(&e))),
    }
}

async fn save_edit(mutations: MutationCoordinator, id: TaskId, draft: TaskDraft) -> Notice {
    match mutations.update_task(id, &draft).await {
        Ok(_) => Notice::Done("Task updated".to_string()),
        Err(e) => Notice::Failed(format!("Could not update task #{id}: {}", describe(&e))),
    }
}

/// One-line description of an API failure for the status bar.
fn describe(err: &ApiError) -> String {
    err.messages().join("; ")
}

fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
