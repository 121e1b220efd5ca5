//! lineage-ingest command line

mod commands;
mod error;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[derive(Parser)]
#[command(
    name = "lineage-ingest",
    version,
    about = "Load delimited files into a store and register their lineage"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest the input and register lineage
    ///
    /// The DuckDB file is locked while the run is open. A second process
    /// using the same store.database_path fails until the first one exits.
    Run {
        /// Pipeline configuration file (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Override the configured input file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Register lineage for the last completed load without reloading
    Register {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(long)]
        json: bool,
    },
    /// List recorded load runs
    Runs {
        #[arg(short, long)]
        config: PathBuf,

        /// Maximum number of runs to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Manage catalog classifications
    Classification {
        #[command(subcommand)]
        command: ClassificationCommands,
    },
}

#[derive(Subcommand)]
enum ClassificationCommands {
    /// Create a classification type in the catalog
    Create {
        #[arg(short, long)]
        config: PathBuf,

        /// Classification name
        #[arg(short, long)]
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "lineage_ingest=info",
        1 => "lineage_ingest=debug",
        _ => "lineage_ingest=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            config,
            input,
            json,
        } => commands::run::handle_run(&config, input, json),
        Commands::Register { config, json } => commands::register::handle_register(&config, json),
        Commands::Runs { config, limit } => commands::runs::handle_runs(&config, limit),
        Commands::Classification {
            command:
                ClassificationCommands::Create {
                    config,
                    name,
                    description,
                },
        } => commands::classification::handle_create(&config, &name, &description),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}
