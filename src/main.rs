use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workshopkit::{App, Config};

#[derive(Parser)]
#[command(name = "workshopkit")]
#[command(
    author,
    version = workshopkit::APP_VERSION,
    about = "Sort Steam Workshop mods into categories and build collections from them"
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage games
    Game {
        #[command(subcommand)]
        action: GameCommands,
    },

    /// Download the Workshop catalog of the active game and sort it by tag
    Fetch,

    /// List the categories of the active game
    Categories,

    /// Write CSV shards for categories
    Csv {
        /// Categories to export, e.g. 1,3 (prompted when omitted)
        #[arg(short, long)]
        categories: Option<String>,
        /// Export every category
        #[arg(long, conflicts_with = "categories")]
        all: bool,
        /// Delete existing shards instead of appending new mods
        #[arg(long)]
        overwrite: bool,
    },

    /// Create Steam collections from CSV shards
    Collections {
        /// Categories to process, e.g. 1,3 (prompted when omitted)
        #[arg(short, long)]
        categories: Option<String>,
        /// Process every category
        #[arg(long, conflicts_with = "categories")]
        all: bool,
        /// Processing mode: all, new, manual, failed (prompted when omitted)
        #[arg(short, long)]
        mode: Option<String>,
        /// Do not ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommands,
    },

    /// Delete all game data and reset settings
    Clear {
        /// Do not ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum GameCommands {
    /// List recently used games
    List,
    /// Select the active game by Steam App ID
    Select {
        app_id: u32,
        /// Game name, looked up on the Steam store when omitted
        #[arg(long)]
        name: Option<String>,
    },
    /// Show information about the active game
    Info,
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show current settings
    Show,
    /// Change a setting
    Set { key: String, value: String },
    /// Restore default settings
    Reset,
}

fn setup_logging(verbosity: u8, log_file: &Path) {
    let filter = match verbosity {
        0 => "workshopkit=info",
        1 => "workshopkit=debug",
        2 => "workshopkit=trace",
        _ => "trace",
    };

    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let file_layer = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .ok()
        .map(|file| {
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::sync::Arc::new(file))
        });

    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load().await?;
    setup_logging(cli.verbose, &config.log_file());

    // Initialize app
    let mut app = App::new(config).await?;

    match cli.command {
        Commands::Game { action } => match action {
            GameCommands::List => app.cmd_game_list().await?,
            GameCommands::Select { app_id, name } => {
                app.cmd_game_select(app_id, name.as_deref()).await?
            }
            GameCommands::Info => app.cmd_game_info().await?,
        },
        Commands::Fetch => app.cmd_fetch().await?,
        Commands::Categories => app.cmd_categories().await?,
        Commands::Csv {
            categories,
            all,
            overwrite,
        } => app.cmd_csv(categories.as_deref(), all, overwrite).await?,
        Commands::Collections {
            categories,
            all,
            mode,
            yes,
        } => {
            app.cmd_collections(categories.as_deref(), all, mode.as_deref(), yes)
                .await?
        }
        Commands::Settings { action } => match action {
            SettingsCommands::Show => app.cmd_settings_show().await?,
            SettingsCommands::Set { key, value } => app.cmd_settings_set(&key, &value).await?,
            SettingsCommands::Reset => app.cmd_settings_reset().await?,
        },
        Commands::Clear { yes } => app.cmd_clear(yes).await?,
    }

    Ok(())
}
