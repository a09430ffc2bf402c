//! CLI binary entry point for quackpipe

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use quackpipe::cli::commands::move_data::{MoveArgs, handle_move};
#[cfg(feature = "cli")]
use quackpipe::cli::commands::plan::{PlanArgs, handle_plan};
#[cfg(feature = "cli")]
use quackpipe::cli::commands::query::{QueryArgs, handle_query};
#[cfg(feature = "cli")]
use quackpipe::cli::commands::validate::{ValidateArgs, handle_validate};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use tracing_subscriber::EnvFilter;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "quackpipe")]
#[command(about = "Attach databases, object stores and lakes to one DuckDB session")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $QUACKPIPE_CONFIG, then quackpipe.yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Check source names, kinds and lake roles without connecting
    Validate,
    /// Print the directives a session would execute
    Plan {
        /// Only these sources (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        sources: Vec<String>,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a SQL query with the configured sources attached
    Query {
        /// SQL query to execute
        sql: String,
        /// Only these sources (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        sources: Vec<String>,
        /// Output format: table, json, csv
        #[arg(short, long, default_value = "table")]
        format: String,
    },
    /// Write a query result into a writable source
    Move {
        /// Query producing the rows to write
        #[arg(short, long)]
        query: String,
        /// Destination source name
        #[arg(long = "to")]
        destination: String,
        /// Destination table (or object name for storage destinations)
        #[arg(short, long)]
        table: String,
        /// Write mode: replace, append
        #[arg(short, long, default_value = "replace")]
        mode: String,
        /// File format for storage destinations: parquet, csv, json
        #[arg(short, long, default_value = "parquet")]
        format: String,
        /// Sources to attach besides the destination (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        sources: Vec<String>,
    },
}

#[cfg(feature = "cli")]
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.config;
    let result = match cli.command {
        Commands::Validate => handle_validate(&ValidateArgs { config }),
        Commands::Plan { sources, json } => handle_plan(&PlanArgs {
            config,
            sources,
            json,
        }),
        Commands::Query {
            sql,
            sources,
            format,
        } => handle_query(&QueryArgs {
            sql,
            config,
            sources,
            format,
        }),
        Commands::Move {
            query,
            destination,
            table,
            mode,
            format,
            sources,
        } => handle_move(&MoveArgs {
            config,
            query,
            destination,
            table,
            mode,
            format,
            sources,
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
