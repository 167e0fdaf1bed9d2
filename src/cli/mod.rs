//! Command-line interface for search-export
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and CLI overrides
//! - Building the export command from arguments
//! - The `version` and `config` subcommands

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use crate::config::{Config, LogLevel, PaginationStrategy};
use crate::error::{ExportError, Result};
use crate::model::{ExportCommand, TimeRange};
use crate::utils::fs::default_export_filename;

/// Bulk export of time-series search results
#[derive(Parser, Debug)]
#[command(
    name = "search-export",
    version,
    about = "Export search results in chunks",
    long_about = "Pages through a search backend by sort cursor and writes the matching
records of the given streams and time range to a JSON Lines or CSV file."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// JSON fixture of documents grouped by index
    #[arg(long, value_name = "FILE")]
    pub fixture: Option<PathBuf>,

    /// Stream to export (repeatable, or comma separated)
    #[arg(short = 's', long = "stream", value_name = "ID", value_delimiter = ',')]
    pub streams: Vec<String>,

    /// Start of the time range, inclusive (RFC 3339)
    #[arg(long, value_name = "TIME")]
    pub from: Option<String>,

    /// End of the time range, exclusive (RFC 3339)
    #[arg(long, value_name = "TIME")]
    pub to: Option<String>,

    /// Query string
    #[arg(short = 'q', long, value_name = "QUERY")]
    pub query: Option<String>,

    /// Fields to export, in order (comma separated)
    #[arg(short = 'f', long, value_name = "FIELDS", value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Records per chunk
    #[arg(long, value_name = "N")]
    pub chunk_size: Option<usize>,

    /// Maximum number of records (0 for unbounded)
    #[arg(short = 'n', long, value_name = "N")]
    pub limit: Option<u64>,

    /// IANA time zone for rendered timestamps
    #[arg(long = "time-zone", value_name = "ZONE")]
    pub time_zone: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Jsonl)]
    pub format: OutputFormat,

    /// Output file (defaults to export-<timestamp>.<format>)
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Pagination strategy
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (debug logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per line
    Jsonl,
    /// Comma separated values with a header row
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jsonl => "jsonl",
            OutputFormat::Csv => "csv",
        }
    }
}

/// Pagination strategies selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    SearchAfter,
    Scroll,
}

impl From<StrategyArg> for PaginationStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::SearchAfter => PaginationStrategy::SearchAfter,
            StrategyArg::Scroll => PaginationStrategy::Scroll,
        }
    }
}

/// Subcommands for search-export
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version,

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,
    },
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Parse the process arguments and load configuration
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Load configuration for already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        Self::apply_args_to_config(&mut config, &args);
        config.validate()?;
        Ok(Self { args, config })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.args.config_file.as_deref()
    }

    /// Whether to draw a progress bar
    pub fn show_progress(&self) -> bool {
        !self.args.no_progress && !self.args.verbose && !self.args.very_verbose
    }

    /// Output file path, defaulting to a timestamped name in the working directory
    pub fn output_path(&self) -> PathBuf {
        self.args
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(default_export_filename(self.args.format.extension())))
    }

    /// Build the export command from arguments and configured defaults
    pub fn build_command(&self) -> Result<ExportCommand> {
        let from = self
            .args
            .from
            .as_deref()
            .ok_or_else(|| ExportError::Validation("--from is required".to_string()))?;
        let to = self
            .args
            .to
            .as_deref()
            .ok_or_else(|| ExportError::Validation("--to is required".to_string()))?;

        let fields = if self.args.fields.is_empty() {
            &self.config.export.default_fields
        } else {
            &self.args.fields
        };

        let mut builder = ExportCommand::builder(TimeRange::parse(from, to)?)
            .streams(self.args.streams.iter().map(|s| s.trim()))
            .fields_in_order(fields.iter().map(|f| f.trim()))
            .chunk_size(
                self.args
                    .chunk_size
                    .unwrap_or(self.config.export.default_chunk_size),
            );

        if let Some(query) = &self.args.query {
            builder = builder.query_string(query.as_str());
        }
        if let Some(limit) = self.args.limit {
            builder = builder.limit(limit);
        }
        if let Some(zone) = &self.args.time_zone {
            builder = builder.time_zone_id(zone);
        }

        builder.build()
    }

    /// Apply CLI arguments to configuration
    ///
    /// Overrides configuration values with CLI arguments where provided
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        if let Some(fixture) = &args.fixture {
            config.backend.fixture = Some(fixture.clone());
        }
        if let Some(strategy) = args.strategy {
            config.export.strategy = strategy.into();
        }

        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else {
            config.logging.level
        };
    }

    /// Handle subcommands
    ///
    /// # Returns
    /// * `Result<bool>` - True if subcommand was handled, false to continue
    pub fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Some(Commands::Version) => {
                self.show_version();
                Ok(true)
            }
            Some(Commands::Config { show }) => {
                if *show {
                    self.show_config()?;
                } else {
                    println!("Configuration file: {}", self.get_config_path().display());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Show version information
    fn show_version(&self) {
        println!("search-export version {}", crate::version());
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        println!("Configuration file: {}", self.get_config_path().display());
        println!();
        println!("=== Effective Configuration ===");
        println!();
        println!("{}", self.config.to_toml_string()?);
        Ok(())
    }

    /// Get configuration file path (from args or default)
    fn get_config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_path)
    }
}
