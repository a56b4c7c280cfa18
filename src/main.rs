use std::env;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use taskdeck::cli::Cli;
use taskdeck::cmd::*;
use taskdeck::config::Config;
use taskdeck::context::AppContext;

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("Error: {err}");
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Completions need neither configuration nor a runtime.
    if let Commands::Completions { shell } = cli.command {
        cmd_completions(shell);
        return Ok(());
    }

    let config = Config::resolve(cli.data_dir, cli.api_url)?;
    let log_file = matches!(cli.command, Commands::Ui).then(|| config.log_path());
    init_tracing(cli.verbose, log_file.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Ui => {
            let _guard = runtime.enter();
            cmd_ui(&ctx)
        }
        command => runtime.block_on(dispatch(&ctx, command)),
    }
}

async fn dispatch(ctx: &AppContext, command: Commands) -> Result<()> {
    match command {
        Commands::Ui | Commands::Completions { .. } => unreachable!("handled before dispatch"),

        Commands::Login { email } => cmd_login(ctx, email).await,

        Commands::Register { email } => cmd_register(ctx, email).await,

        Commands::Logout => cmd_logout(ctx).await,

        Commands::Whoami => cmd_whoami(ctx).await,

        Commands::Dashboard => cmd_dashboard(ctx).await,

        Commands::List {
            all,
            completed,
            due,
            sort,
            limit,
        } => cmd_list(ctx, all, completed, due, sort, limit).await,

        Commands::View { id } => cmd_view(ctx, id).await,

        Commands::Add {
            title,
            desc,
            priority,
            due,
            time,
        } => cmd_add(ctx, title, desc, priority, due, time).await,

        Commands::Edit {
            id,
            title,
            desc,
            clear_desc,
            priority,
            due,
            time,
            clear_due,
        } => cmd_edit(ctx, id, title, desc, clear_desc, priority, due, time, clear_due).await,

        Commands::Complete { id } => cmd_set_completion(ctx, id, Some(true)).await,

        Commands::Reopen { id } => cmd_set_completion(ctx, id, Some(false)).await,

        Commands::Toggle { id } => cmd_set_completion(ctx, id, None).await,

        Commands::Delete { id, yes } => cmd_delete(ctx, id, yes).await,
    }
}

/// Logging goes to stderr, or to `log_file` while the TUI owns the screen.
fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_env("TASKDECK_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "taskdeck=debug"
        } else {
            "taskdeck=warn"
        })
    });

    let format = env::var("TASKDECK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        let layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
        match format.as_str() {
            "json" => registry.with(layer.json()).init(),
            _ => registry.with(layer.compact()).init(),
        }
        return Ok(());
    }

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr)).init();
        }
        _ => {
            registry.with(fmt::layer().compact().with_writer(std::io::stderr)).init();
        }
    }
    Ok(())
}
