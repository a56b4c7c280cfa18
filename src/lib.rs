//! # taskdeck - terminal client for a remote to-do service
//!
//! A command-line and terminal UI front end for a cookie-authenticated task
//! service. Tasks live on the server; this crate keeps a shared local cache
//! of them and applies completion toggles optimistically, so the list reacts
//! at once and is reconciled with the server after every change.
//!
//! ## Key Features
//!
//! - **Optimistic completion**: toggles show immediately, roll back exactly on
//!   failure and are always followed by a refetch
//! - **Shared cache**: one observable task list per query key, watched by the
//!   TUI and updated by every mutation
//! - **Multiple Interfaces**: scriptable CLI plus an interactive TUI
//! - **Natural due dates**: "tomorrow", "next friday", "in 3d", `YYYY-MM-DD`
//!
//! ## Quick Start
//!
//! ```bash
//! taskdeck login --email me@example.com
//! taskdeck add "Write report" --priority high --due friday --time 17:00
//! taskdeck list
//! taskdeck toggle 7
//! taskdeck ui
//! ```
//!
//! Settings and the session cookie are kept in `~/.taskdeck/`.

pub mod api;
pub mod auth;
pub mod cache;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod context;
pub mod dates;
pub mod display;
pub mod error;
pub mod fields;
pub mod mutation;
pub mod task;
pub mod tui {
    pub mod colors;
    pub mod app;
    pub mod enums;
    pub mod input;
    pub mod run;
    pub mod task_form;
    pub mod utils;
}

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{ApiClient, TaskApi};
pub use cache::{QueryKey, QueryState, TaskCache};
pub use error::{ApiError, ValidationError};
pub use mutation::MutationCoordinator;
pub use task::{Task, TaskDraft, TaskId};
