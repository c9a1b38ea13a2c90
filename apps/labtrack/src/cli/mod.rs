//! # Labtrack CLI Module
//!
//! This module implements the CLI interface for Labtrack.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `labs` - List the catalog
//! - `lab` - Show one lab and its quiz
//! - `progress` - Show a learner's dashboard or one record
//! - `transition` - Apply a stage transition
//! - `certificate` - Check eligibility or issue a certificate
//! - `check-catalog` - Validate a catalog file
//! - `compact` - Compact the progress database

mod commands;

use crate::config::{Backend, FileConfig, Settings};
use clap::{Parser, Subcommand};
use labtrack_core::LabtrackError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Labtrack - lab progression and assessment engine
///
/// Tracks each learner's way through theory, quiz, exercise and
/// certificate for every lab in the catalog.
#[derive(Parser, Debug)]
#[command(name = "labtrack")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the progress database [default: labtrack.db]
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend [default: redb]
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Catalog TOML file [default: built-in catalog]
    #[arg(short = 'C', long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Configuration TOML file; flags override its values
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to [default: 127.0.0.1]
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to [default: 8080]
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the labs in the catalog
    Labs {
        /// Only labs in this category
        #[arg(long)]
        category: Option<String>,
    },

    /// Show one lab and its quiz questions
    Lab {
        /// Lab id
        id: String,
    },

    /// Show a learner's progress
    Progress {
        /// Learner id
        user: String,

        /// Show a single lab instead of the dashboard
        #[arg(short, long)]
        lab: Option<String>,
    },

    /// Apply a stage transition
    Transition {
        /// Learner id
        user: String,

        /// Lab id
        lab: String,

        /// view_theory, submit_quiz, complete_exercise or issue_certificate
        event: String,

        /// Selected choice per question, comma-separated (submit_quiz only)
        #[arg(short, long)]
        answers: Option<String>,
    },

    /// Check certificate eligibility, or issue the certificate
    Certificate {
        /// Learner id
        user: String,

        /// Lab id
        lab: String,

        /// Only report eligibility
        #[arg(long)]
        check: bool,
    },

    /// Validate a catalog file without starting anything
    CheckCatalog {
        /// Catalog TOML file
        file: PathBuf,
    },

    /// Compact the redb progress database (stop the server first)
    Compact,
}

impl Cli {
    /// Resolve settings from flags, the config file and defaults.
    pub fn settings(&self) -> Result<Settings, LabtrackError> {
        let (host, port) = match &self.command {
            Some(Commands::Server { host, port }) => (host.clone(), *port),
            _ => (None, None),
        };
        let flags = FileConfig {
            database: self.database.clone(),
            backend: self.backend,
            catalog: self.catalog.clone(),
            host,
            port,
        };
        Settings::resolve(flags, self.config.as_deref())
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), LabtrackError> {
    let json_mode = cli.json_mode;

    if let Some(Commands::CheckCatalog { file }) = &cli.command {
        return cmd_check_catalog(file, json_mode);
    }

    let settings = cli.settings()?;
    match cli.command {
        Some(Commands::Server { .. }) => cmd_server(&settings).await,
        Some(Commands::Labs { category }) => {
            cmd_labs(&settings, json_mode, category.as_deref())
        }
        Some(Commands::Lab { id }) => cmd_lab(&settings, json_mode, &id),
        Some(Commands::Progress { user, lab }) => {
            cmd_progress(&settings, json_mode, &user, lab.as_deref())
        }
        Some(Commands::Transition {
            user,
            lab,
            event,
            answers,
        }) => cmd_transition(
            &settings,
            json_mode,
            &user,
            &lab,
            &event,
            answers.as_deref(),
        ),
        Some(Commands::Certificate { user, lab, check }) => {
            cmd_certificate(&settings, json_mode, &user, &lab, check)
        }
        Some(Commands::CheckCatalog { file }) => cmd_check_catalog(&file, json_mode),
        Some(Commands::Compact) => cmd_compact(&settings, json_mode),
        None => {
            // No subcommand - list the catalog by default
            cmd_labs(&settings, json_mode, None)
        }
    }
}
