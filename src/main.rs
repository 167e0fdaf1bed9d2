//! search-export command-line tool
//!
//! Exports the records of one or more streams within a time range to a
//! JSON Lines or CSV file, paging through the backend by sort cursor.
//!
//! # Usage
//!
//! ```bash
//! search-export --fixture messages.json -s stream-01,stream-02 \
//!     --from 2015-01-01T00:00:00Z --to 2015-01-02T00:00:00Z \
//!     -q "Ha Ho" --format csv -o out.csv
//! ```

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use search_export::backend::{JsonQueryTranslator, MemoryBackend, SearchAdapter};
use search_export::cli::{CliInterface, OutputFormat};
use search_export::error::{ConfigError, Result};
use search_export::export::{
    CsvWriter, ExportOrchestrator, FormatWriter, JsonLWriter, ProgressSink, ProgressTracker,
};
use search_export::model::ExportCommand;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Handle subcommands or run the export
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    if cli.handle_subcommand()? {
        return Ok(());
    }

    run_export(&cli).await
}

/// Build the pipeline from configuration and export to the output file
async fn run_export(cli: &CliInterface) -> Result<()> {
    let config = cli.config();
    let command = cli.build_command()?;

    let fixture = config.backend.fixture.as_deref().ok_or_else(|| ConfigError::InvalidValue {
        field: "backend.fixture".to_string(),
        value: "<unset>".to_string(),
    })?;
    let backend = Arc::new(
        MemoryBackend::from_fixture_file(fixture)?
            .with_fields(&config.export.timestamp_field, &config.export.streams_field),
    );
    let translator = Arc::new(JsonQueryTranslator::from_config(&config.export));
    let adapter = Arc::new(SearchAdapter::from_config(backend.clone(), translator, config));
    let orchestrator = ExportOrchestrator::from_config(backend, adapter, config);

    let output = cli.output_path();
    match cli.args().format {
        OutputFormat::Jsonl => {
            let writer = JsonLWriter::new(&output).await?;
            export_to(cli, &orchestrator, &command, writer, &output).await
        }
        OutputFormat::Csv => {
            let writer = CsvWriter::new(&output, command.fields_in_order().to_vec()).await?;
            export_to(cli, &orchestrator, &command, writer, &output).await
        }
    }
}

/// Run one export into `writer`, cancelling on Ctrl+C
async fn export_to<W: FormatWriter>(
    cli: &CliInterface,
    orchestrator: &ExportOrchestrator,
    command: &ExportCommand,
    writer: W,
    output: &Path,
) -> Result<()> {
    let cancel_token = CancellationToken::new();
    let cancel_token_clone = cancel_token.clone();
    let ctrl_c_handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => cancel_token_clone.cancel(),
            Err(err) => eprintln!("Failed to listen for Ctrl+C: {}", err),
        }
    });

    let tracker = ProgressTracker::new(command.limit(), cli.show_progress());
    let mut sink = ProgressSink::new(writer, tracker);
    let outcome = orchestrator
        .run_with_cancellation(command, &mut sink, cancel_token)
        .await;
    ctrl_c_handle.abort();

    // Delivered chunks stay in the file even when the export fails
    let mut writer = sink.finish();
    writer.finalize().await?;

    match outcome {
        Ok(result) => {
            let file_size = writer.file_size().await.unwrap_or(0);
            if result.cancelled {
                println!(
                    "Export cancelled: {} records written to {}",
                    result.documents_exported,
                    output.display()
                );
            } else {
                println!(
                    "Exported {} records in {} chunks to {} ({} bytes, {} ms)",
                    result.documents_exported,
                    result.chunks,
                    output.display(),
                    file_size,
                    result.elapsed_ms
                );
            }
            Ok(())
        }
        Err(failure) => {
            eprintln!(
                "{} records were written to {} before the export failed",
                failure.delivered,
                output.display()
            );
            Err(failure.error)
        }
    }
}

/// Initialize logging system based on verbosity level
///
/// `RUST_LOG` directives refine the level chosen by flags and configuration.
fn initialize_logging(cli: &CliInterface) {
    let level = if cli.args().very_verbose {
        Level::TRACE
    } else if cli.args().verbose {
        Level::DEBUG
    } else {
        cli.config().logging.level.to_tracing_level()
    };
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(log_filter(level, &directives))
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}

/// Filter from `RUST_LOG`-style directives, falling back to `level` when there are none
fn log_filter(level: Level, directives: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .parse_lossy(directives)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_defaults_to_level() {
        assert_eq!(log_filter(Level::DEBUG, "").to_string(), "debug");
    }

    #[test]
    fn test_log_filter_honours_directives() {
        assert_eq!(
            log_filter(Level::INFO, "search_export=trace").to_string(),
            "search_export=trace"
        );
    }
}
