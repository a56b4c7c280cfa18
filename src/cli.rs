use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Terminal client for a remote to-do service.
/// The server defaults to http://localhost:5211; override with --api-url,
/// TASKDECK_API_URL or `api_url` in <data dir>/config.toml.
#[derive(Parser)]
#[command(name = "taskdeck", version, about = "Remote to-do list client")]
pub struct Cli {
    /// Base URL of the task service.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Directory holding config.toml, the session and logs (default ~/.taskdeck).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}
