use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use modkeeper::config::Paths;
use modkeeper::{App, Config};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "modkeeper")]
#[command(
    author,
    version,
    about = "Installs staged mod files into a game directory with conflict handling and rollback"
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Game to operate on (defaults to active_game from the config)
    #[arg(short, long)]
    game: Option<String>,

    /// Keep config and data under this directory instead of the XDG locations
    #[arg(long)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show where a mod's files would go and which files conflict
    Plan {
        /// Path to the mod manifest (JSON)
        manifest: PathBuf,
    },

    /// Install a mod from its manifest
    Install {
        /// Path to the mod manifest (JSON)
        manifest: PathBuf,

        /// Give every conflicting file to the new mod
        #[arg(long)]
        replace_all: bool,

        /// Leave every conflicting file with its current owner
        #[arg(long)]
        skip_all: bool,
    },

    /// Remove a mod's files and restore what it replaced
    Uninstall {
        /// Mod id as <kind>:<id>
        mod_id: String,
    },

    /// Show managed mods for the selected game
    Status,

    /// Show which mod owns a target-relative path
    Owner {
        /// Path relative to the game directory
        path: String,
    },
}

fn setup_logging(verbosity: u8, log_dir: &std::path::Path) -> Result<()> {
    let filter = match verbosity {
        0 => "modkeeper=info",
        1 => "modkeeper=debug",
        2 => "modkeeper=trace",
        _ => "trace",
    };

    std::fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    let log_file = log_dir.join("modkeeper.log");

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;

    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::sync::Arc::new(file));

    let stderr_layer = (verbosity > 0).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = match cli.root {
        Some(root) => Paths::rooted(root),
        None => Paths::new(),
    };
    setup_logging(cli.verbose, &paths.log_dir())?;

    // Load configuration
    let config = Config::load_with(paths).await?;

    // Initialize app
    let app = App::new(config, cli.game.as_deref()).await?;

    match cli.command {
        Commands::Plan { manifest } => app.cmd_plan(&manifest).await?,
        Commands::Install {
            manifest,
            replace_all,
            skip_all,
        } => app.cmd_install(&manifest, replace_all, skip_all).await?,
        Commands::Uninstall { mod_id } => app.cmd_uninstall(&mod_id).await?,
        Commands::Status => app.cmd_status().await?,
        Commands::Owner { path } => app.cmd_owner(&path).await?,
    }

    Ok(())
}
