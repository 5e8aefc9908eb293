//! # doc-compare CLI (`dcmp`)
//!
//! ## Usage
//!
//! ```bash
//! dcmp --config ./config/dcmp.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dcmp init` | Create the SQLite database and schema |
//! | `dcmp parse <file>` | Print extracted text and properties |
//! | `dcmp compare <left> <right>` | Text similarity and shared passages |
//! | `dcmp properties <left> <right>` | Compare file metadata |
//! | `dcmp analyze <left> <right>` | AI review of a text comparison |
//! | `dcmp settings show\|set\|reset` | Inspect or change settings |
//! | `dcmp history list\|delete\|clear` | Manage recent records |
//!
//! Log verbosity follows `RUST_LOG` (default `warn`); logs go to stderr.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use doc_compare::commands;
use doc_compare::config;
use doc_compare::migrate;
use doc_compare::recent::RecordMode;

/// doc-compare CLI: compare documents, check their metadata and keep a
/// short history of results.
///
/// A missing `--config` file is not an error; built-in defaults apply.
/// See `config/dcmp.example.toml` for every option.
#[derive(Parser)]
#[command(
    name = "dcmp",
    about = "Compare documents (TXT, DOCX, PDF, XLSX, PPTX) for shared passages and metadata differences",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/dcmp.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Extract text and properties from one file.
    Parse {
        file: PathBuf,

        /// Print the full parse result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Compare the text of two files.
    ///
    /// Uses the persisted settings (minimum duplicate words, threshold and
    /// ignore switches) and records the result in the file-compare history.
    Compare {
        left: PathBuf,
        right: PathBuf,

        /// Also send the result to the configured AI model.
        #[arg(long)]
        analyze: bool,

        /// Do not add the result to the history.
        #[arg(long)]
        no_record: bool,
    },

    /// Compare the metadata of two files.
    Properties {
        left: PathBuf,
        right: PathBuf,

        /// Do not add the result to the history.
        #[arg(long)]
        no_record: bool,
    },

    /// Compare two files and print only the AI analysis.
    Analyze { left: PathBuf, right: PathBuf },

    /// Show or change persisted settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Manage the recent-records history.
    History {
        #[command(subcommand)]
        action: HistoryAction,

        /// Which history list to operate on.
        #[arg(long, value_enum, default_value_t = HistoryMode::FileCompare, global = true)]
        mode: HistoryMode,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings as JSON (API key masked).
    Show,
    /// Set one field by its camelCase name, e.g. `minDuplicateWords 10`.
    Set { field: String, value: String },
    /// Restore and save the defaults.
    Reset,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List records, most recent first.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Delete one record by id.
    Delete { id: u64 },
    /// Remove every record in the list.
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum HistoryMode {
    FileCompare,
    PropertyCheck,
}

impl From<HistoryMode> for RecordMode {
    fn from(mode: HistoryMode) -> Self {
        match mode {
            HistoryMode::FileCompare => RecordMode::FileCompare,
            HistoryMode::PropertyCheck => RecordMode::PropertyCheck,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        tracing::debug!(path = %cli.config.display(), "config file not found, using defaults");
        config::Config::minimal()
    };

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Parse { file, json } => {
            commands::run_parse(&cfg, &file, json).await?;
        }
        Commands::Compare {
            left,
            right,
            analyze,
            no_record,
        } => {
            commands::run_compare(&cfg, &left, &right, analyze, !no_record).await?;
        }
        Commands::Properties {
            left,
            right,
            no_record,
        } => {
            commands::run_properties(&cfg, &left, &right, !no_record).await?;
        }
        Commands::Analyze { left, right } => {
            commands::run_analyze(&cfg, &left, &right).await?;
        }
        Commands::Settings { action } => match action {
            SettingsAction::Show => commands::run_settings_show(&cfg).await?,
            SettingsAction::Set { field, value } => {
                commands::run_settings_set(&cfg, &field, &value).await?
            }
            SettingsAction::Reset => commands::run_settings_reset(&cfg).await?,
        },
        Commands::History { action, mode } => {
            let mode = RecordMode::from(mode);
            match action {
                HistoryAction::List { json } => commands::run_history_list(&cfg, mode, json).await?,
                HistoryAction::Delete { id } => commands::run_history_delete(&cfg, mode, id).await?,
                HistoryAction::Clear => commands::run_history_clear(&cfg, mode).await?,
            }
        }
    }

    Ok(())
}
