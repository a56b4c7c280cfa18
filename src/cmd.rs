//! Command implementations for the CLI interface.
//!
//! Each handler loads what it needs through the shared [`AppContext`], runs
//! the operation against the task service and prints the outcome. Errors are
//! returned to `main`, which prints the chain and exits non-zero.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use clap::Subcommand;
use clap_complete::{generate, Shell};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use crate::auth::Credentials;
use crate::cache::QueryKey;
use crate::context::AppContext;
use crate::dates::{format_time_input, resolve_due_local};
use crate::display::{
    filter_tasks, print_stats, print_table, print_task, recent_tasks, sort_tasks, TaskStats, RECENT_LIMIT,
};
use crate::error::ApiError;
use crate::fields::{DueFilter, Priority, SortKey, StatusFilter};
use crate::task::{Task, TaskDraft, TaskId};

#[derive(Subcommand)]
pub enum Commands {
    /// Launch the interactive UI interface.
    Ui,

    /// Sign in and remember the session.
    Login {
        /// Account email. Prompted for when omitted.
        #[arg(long)]
        email: Option<String>,
    },

    /// Create an account, then sign in.
    Register {
        #[arg(long)]
        email: Option<String>,
    },

    /// Sign out and forget the saved session.
    Logout,

    /// Show the signed-in user.
    Whoami,

    /// Task counts and the most recently created tasks.
    Dashboard,

    /// List tasks with optional filters.
    List {
        /// Include completed tasks.
        #[arg(long, conflicts_with = "completed")]
        all: bool,
        /// Only completed tasks.
        #[arg(long)]
        completed: bool,
        /// Due filter: today | overdue | none.
        #[arg(long, value_enum)]
        due: Option<DueFilter>,
        /// Sort key.
        #[arg(long, value_enum, default_value_t = SortKey::Due)]
        sort: SortKey,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// View a single task by ID.
    View { id: TaskId },

    /// Add a new task.
    Add {
        /// Short title for the task.
        title: String,
        /// Optional longer description.
        #[arg(long)]
        desc: Option<String>,
        /// Priority: low | medium | high.
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        /// Due date: YYYY-MM-DD, "today", "tomorrow", "friday", "next monday" or "in Nd".
        #[arg(long)]
        due: Option<String>,
        /// Due time of day, HH:MM (defaults to the current time).
        #[arg(long, requires = "due")]
        time: Option<String>,
    },

    /// Update fields on a task.
    Edit {
        id: TaskId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "clear_desc")]
        desc: Option<String>,
        /// Remove the description.
        #[arg(long)]
        clear_desc: bool,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        #[arg(long, conflicts_with = "clear_due")]
        time: Option<String>,
        /// Clear due date.
        #[arg(long)]
        clear_due: bool,
    },

    /// Mark a task completed.
    Complete { id: TaskId },

    /// Mark a task pending again.
    Reopen { id: TaskId },

    /// Flip a task's completion state.
    Toggle { id: TaskId },

    /// Delete a task by ID.
    Delete {
        id: TaskId,
        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Launch the terminal user interface.
pub fn cmd_ui(ctx: &AppContext) -> Result<()> {
    crate::tui::run::run_tui(ctx).context("UI error")
}

pub async fn cmd_login(ctx: &AppContext, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(e) => e,
        None => prompt_line("Email: ")?,
    };
    let password = prompt_password("Password: ")?;
    let credentials = Credentials::new(email, password);
    credentials.validate_sign_in()?;
    sign_in(ctx, &credentials).await
}

pub async fn cmd_register(ctx: &AppContext, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(e) => e,
        None => prompt_line("Email: ")?,
    };
    let password = prompt_password("Password: ")?;
    let credentials = Credentials::new(email, password);
    credentials.validate_sign_up()?;
    if prompt_password("Confirm password: ")? != credentials.password {
        bail!("passwords do not match");
    }
    ctx.client
        .register(&credentials)
        .await
        .map_err(rejection_to_anyhow)?;
    println!("Account created for {}.", credentials.email);
    sign_in(ctx, &credentials).await
}

async fn sign_in(ctx: &AppContext, credentials: &Credentials) -> Result<()> {
    ctx.client.login(credentials).await.map_err(rejection_to_anyhow)?;
    if !ctx.persist_session()? {
        bail!("the server accepted the credentials but did not start a session");
    }
    println!("Signed in as {}.", credentials.email);
    Ok(())
}

pub async fn cmd_logout(ctx: &AppContext) -> Result<()> {
    match ctx.client.logout().await {
        Ok(()) | Err(ApiError::Unauthorized) => {}
        Err(e) => return Err(e).context("Failed to sign out"),
    }
    ctx.config.clear_session()?;
    println!("Signed out.");
    Ok(())
}

pub async fn cmd_whoami(ctx: &AppContext) -> Result<()> {
    match ctx.client.current_user().await? {
        Some(user) => {
            let note = if user.is_email_confirmed { "" } else { " (email not confirmed)" };
            println!("{}{} @ {}", user.email, note, ctx.client.base_url());
        }
        None => println!("Not signed in."),
    }
    Ok(())
}

pub async fn cmd_dashboard(ctx: &AppContext) -> Result<()> {
    let tasks = ctx.cache.load(QueryKey::Tasks).await?;
    print_stats(&TaskStats::from_tasks(&tasks));
    println!("\nRecent tasks:");
    print_table(&recent_tasks(&tasks, RECENT_LIMIT));
    Ok(())
}

pub async fn cmd_list(
    ctx: &AppContext,
    all: bool,
    completed: bool,
    due: Option<DueFilter>,
    sort: SortKey,
    limit: Option<usize>,
) -> Result<()> {
    let tasks = ctx.cache.load(QueryKey::Tasks).await?;
    let status = if all {
        StatusFilter::All
    } else if completed {
        StatusFilter::Completed
    } else {
        StatusFilter::Pending
    };
    let mut filtered = filter_tasks(&tasks, status, due, &Local::now());
    sort_tasks(&mut filtered, sort);
    if let Some(n) = limit {
        filtered.truncate(n);
    }
    print_table(&filtered);
    Ok(())
}

pub async fn cmd_view(ctx: &AppContext, id: TaskId) -> Result<()> {
    let task = find_task(ctx, id).await?;
    print_task(&task);
    Ok(())
}

pub async fn cmd_add(
    ctx: &AppContext,
    title: String,
    desc: Option<String>,
    priority: Priority,
    due: Option<String>,
    time: Option<String>,
) -> Result<()> {
    let due_date = resolve_due_local(due.as_deref().unwrap_or(""), time.as_deref().unwrap_or(""))?;
    let mut draft = TaskDraft::new(title)
        .with_description(desc)
        .with_priority(priority)
        .with_due_date(due_date);
    draft.validate()?;
    let task = ctx
        .mutations
        .create_task(&draft)
        .await
        .map_err(rejection_to_anyhow)?;
    println!("Added task {}: {}", task.id, task.title);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn cmd_edit(
    ctx: &AppContext,
    id: TaskId,
    title: Option<String>,
    desc: Option<String>,
    clear_desc: bool,
    priority: Option<Priority>,
    due: Option<String>,
    time: Option<String>,
    clear_due: bool,
) -> Result<()> {
    let task = find_task(ctx, id).await?;
    let mut draft = TaskDraft::from_task(&task);
    if let Some(t) = title {
        draft.title = t;
    }
    if clear_desc {
        draft = draft.with_description(None);
    } else if desc.is_some() {
        draft = draft.with_description(desc);
    }
    if let Some(p) = priority {
        draft = draft.with_priority(p);
    }
    if clear_due {
        draft = draft.with_due_date(None);
    } else if due.is_some() || time.is_some() {
        let (current_date, current_time) = local_due_parts(&task);
        let date = due.unwrap_or(current_date);
        let time = time.unwrap_or(current_time);
        draft = draft.with_due_date(resolve_due_local(&date, &time)?);
    }
    draft.validate()?;
    ctx.mutations
        .update_task(id, &draft)
        .await
        .map_err(rejection_to_anyhow)?;
    println!("Updated task {id}.");
    Ok(())
}

/// Existing due date split into local `YYYY-MM-DD` and `HH:MM` inputs.
fn local_due_parts(task: &Task) -> (String, String) {
    match task.due_date {
        Some(due) => {
            let local = due.with_timezone(&Local);
            (local.format("%Y-%m-%d").to_string(), format_time_input(local.time()))
        }
        None => (String::new(), String::new()),
    }
}

/// Set completion through the optimistic path. `None` flips the current state.
pub async fn cmd_set_completion(ctx: &AppContext, id: TaskId, target: Option<bool>) -> Result<()> {
    let target = match target {
        Some(t) => t,
        None => !find_task(ctx, id).await?.is_completed,
    };
    // Load first so the optimistic write has something to act on.
    ctx.cache.load(QueryKey::Tasks).await?;
    ctx.mutations.toggle_completion(id, target).await?;
    if target {
        println!("Marked {id} completed.");
    } else {
        println!("Reopened {id}.");
    }
    Ok(())
}

pub async fn cmd_delete(ctx: &AppContext, id: TaskId, yes: bool) -> Result<()> {
    let task = find_task(ctx, id).await?;
    if !yes && !confirm(&format!("Delete task {} \"{}\"?", task.id, task.title))? {
        println!("Cancelled.");
        return Ok(());
    }
    ctx.mutations.delete_task(id).await?;
    println!("Deleted.");
    Ok(())
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use clap::CommandFactory;
    use crate::cli::Cli;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut io::stdout());
}

async fn find_task(ctx: &AppContext, id: TaskId) -> Result<Task> {
    let tasks = ctx.cache.load(QueryKey::Tasks).await?;
    tasks
        .iter()
        .find(|t| t.id == id)
        .cloned()
        .ok_or_else(|| anyhow!(ApiError::NotFound { id }))
}

/// Server rejections print one line per field message.
fn rejection_to_anyhow(err: ApiError) -> anyhow::Error {
    match &err {
        ApiError::ServerRejection { .. } => anyhow!(err.messages().join("\n")),
        _ => anyhow!(err),
    }
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Read a password without echoing it when attached to a terminal.
fn prompt_password(label: &str) -> Result<String> {
    if !io::stdin().is_terminal() {
        return prompt_line(label);
    }
    print!("{label}");
    io::stdout().flush()?;
    enable_raw_mode()?;
    let result = read_hidden();
    disable_raw_mode()?;
    println!();
    result
}

fn read_hidden() -> Result<String> {
    let mut password = String::new();
    loop {
        if let Event::Key(KeyEvent { code, modifiers, kind, .. }) = event::read()? {
            if kind != KeyEventKind::Press {
                continue;
            }
            match code {
                KeyCode::Enter => return Ok(password),
                KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => bail!("interrupted"),
                KeyCode::Esc => bail!("interrupted"),
                KeyCode::Backspace => {
                    password.pop();
                }
                KeyCode::Char(c) => password.push(c),
                _ => {}
            }
        }
    }
}

fn confirm(question: &str) -> Result<bool> {
    let answer = prompt_line(&format!("{question} [y/N] "))?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
