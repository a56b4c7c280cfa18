//! Presentation helpers shared by the CLI and the TUI.
//!
//! Everything that depends on "now" takes it as a parameter so callers can
//! pass the local clock and tests can pin a zone and instant.

use std::fmt::{Display, Write as _};

use chrono::{DateTime, Duration, Local, TimeZone, Utc};

use crate::fields::{DueFilter, Priority, SortKey, StatusFilter};
use crate::task::Task;

/// Number of tasks shown in the dashboard's recent list.
pub const RECENT_LIMIT: usize = 6;

/// Visual emphasis for a due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueTone {
    Muted,
    Overdue,
    Today,
}

/// Human-readable due date relative to `now`, in `now`'s zone.
pub fn format_due<Tz>(due: Option<DateTime<Utc>>, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let Some(due) = due else {
        return "No due date".to_string();
    };
    let due = due.with_timezone(&now.timezone());
    let today = now.date_naive();
    let time = due.format("%-I:%M %p").to_string();
    match due.date_naive() {
        d if d == today => time,
        d if d == today + Duration::days(1) => format!("Tomorrow at {time}"),
        d if d == today - Duration::days(1) => format!("Yesterday at {time}"),
        _ => format!("{} at {time}", due.format("%b %-d, %Y")),
    }
}

pub fn due_tone<Tz: TimeZone>(task: &Task, now: &DateTime<Tz>) -> DueTone {
    let Some(due) = task.due_date else {
        return DueTone::Muted;
    };
    if task.is_completed {
        return DueTone::Muted;
    }
    let local = due.with_timezone(&now.timezone());
    if local.date_naive() == now.date_naive() {
        DueTone::Today
    } else if due < now.with_timezone(&Utc) {
        DueTone::Overdue
    } else {
        DueTone::Muted
    }
}

/// Dashboard counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

impl TaskStats {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|t| t.is_completed).count();
        Self {
            total,
            completed,
            pending: total - completed,
        }
    }
}

/// The `limit` most recently created tasks, newest first.
pub fn recent_tasks(tasks: &[Task], limit: usize) -> Vec<&Task> {
    let mut recent: Vec<&Task> = tasks.iter().collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    recent.truncate(limit);
    recent
}

/// Case-insensitive match against title and description.
pub fn matches_query(task: &Task, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    task.title.to_lowercase().contains(&query)
        || task
            .description_text()
            .is_some_and(|d| d.to_lowercase().contains(&query))
}

/// Tasks passing the completion and due filters, in input order.
pub fn filter_tasks<'a, Tz: TimeZone>(
    tasks: &'a [Task],
    status: StatusFilter,
    due: Option<DueFilter>,
    now: &DateTime<Tz>,
) -> Vec<&'a Task> {
    let today = now.date_naive();
    let now_utc = now.with_timezone(&Utc);
    tasks
        .iter()
        .filter(|t| status.accepts(t.is_completed))
        .filter(|t| {
            let Some(filter) = due else {
                return true;
            };
            let local_day = t.due_date.map(|d| d.with_timezone(&now.timezone()).date_naive());
            match filter {
                DueFilter::Today => local_day == Some(today),
                DueFilter::Overdue => {
                    t.due_date.is_some_and(|d| d < now_utc) && local_day != Some(today)
                }
                DueFilter::None => t.due_date.is_none(),
            }
        })
        .collect()
}

pub fn sort_tasks(tasks: &mut [&Task], key: SortKey) {
    match key {
        SortKey::Created => tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id))),
        SortKey::Due => tasks.sort_by_key(|t| (t.due_date.is_none(), t.due_date, t.id)),
        SortKey::Priority => tasks.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id))),
        SortKey::Id => tasks.sort_by_key(|t| t.id),
    }
}

/// "N task(s) available".
pub fn count_line(count: usize) -> String {
    format!("{count} task(s) available")
}

pub fn priority_label(p: Priority) -> &'static str {
    p.label()
}

pub fn status_mark(is_completed: bool) -> &'static str {
    if is_completed {
        "[x]"
    } else {
        "[ ]"
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}

pub fn render_table<Tz>(tasks: &[&Task], now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if tasks.is_empty() {
        return "No tasks yet\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "{:<6} {:<4} {:<7} {:<28} {}", "ID", "Done", "Pri", "Due", "Title");
    for t in tasks {
        let _ = writeln!(
            out,
            "{:<6} {:<4} {:<7} {:<28} {}",
            t.id,
            status_mark(t.is_completed),
            priority_label(t.priority),
            truncate(&format_due(t.due_date, now), 28),
            t.title
        );
    }
    let _ = writeln!(out, "\n{}", count_line(tasks.len()));
    out
}

pub fn render_task<Tz>(task: &Task, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::new();
    let stamp = |dt: DateTime<Utc>| dt.with_timezone(&now.timezone()).format("%Y-%m-%d %H:%M").to_string();
    let _ = writeln!(out, "ID:           {}", task.id);
    let _ = writeln!(out, "Title:        {}", task.title);
    let _ = writeln!(out, "Status:       {}", if task.is_completed { "Completed" } else { "Pending" });
    let _ = writeln!(out, "Priority:     {}", priority_label(task.priority));
    let _ = writeln!(out, "Due:          {}", format_due(task.due_date, now));
    let _ = writeln!(out, "Created:      {}", stamp(task.created_at));
    let _ = writeln!(
        out,
        "Updated:      {}",
        task.updated_at.map(stamp).unwrap_or_else(|| "-".into())
    );
    let _ = writeln!(out, "Description:\n{}", task.description_text().unwrap_or("-"));
    out
}

pub fn render_stats(stats: &TaskStats) -> String {
    format!(
        "Total: {}   Completed: {}   Pending: {}\n",
        stats.total, stats.completed, stats.pending
    )
}

pub fn print_table(tasks: &[&Task]) {
    print!("{}", render_table(tasks, &Local::now()));
}

pub fn print_task(task: &Task) {
    print!("{}", render_task(task, &Local::now()));
}

pub fn print_stats(stats: &TaskStats) {
    print!("{}", render_stats(stats));
}
