use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{ConfigLoader, CONFIG_ENV};

pub mod commands;

use self::commands::{CalendarArgs, MinRequiredArgs, PreviewArgs, TripArgs};

const LOG_FILE: &str = "tripline.log";

#[derive(Parser, Debug)]
#[command(
    name = "tripline",
    version,
    about = "Keyboard-first terminal trip planner"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over TRIPLINE_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive trip wizard (default)
    Tui(TripArgs),
    /// Print the month grids covering a trip, trip days marked
    Calendar(CalendarArgs),
    /// Print how many POIs a trip needs before it can be planned
    MinRequired(MinRequiredArgs),
    /// Print the day timelines of a saved /preview response
    Preview(PreviewArgs),
    /// Ask the backend for recommendations and print the cards
    Recommend(TripArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let command = cli.command.unwrap_or_else(|| Commands::Tui(TripArgs::default()));
    // The TUI owns the terminal, so its log lines go to a file instead of stderr.
    let log_file = matches!(command, Commands::Tui(_)).then(|| loader.paths().log_dir.join(LOG_FILE));
    init_tracing(&cli.log_level, log_file.as_deref())
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = Arc::new(loader.load_or_init()?);

    match command {
        Commands::Tui(args) => commands::run_tui(config, args),
        Commands::Calendar(args) => commands::print_calendar(args),
        Commands::MinRequired(args) => commands::print_min_required(args),
        Commands::Preview(args) => commands::print_preview(&config, args),
        Commands::Recommend(args) => commands::print_recommendations(&config, args),
    }
}

fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match log_file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
            None => {
                fmt()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
        Ok(())
    })
    .map(|_| ())
}
