//! Ingest CLI: feed a sampled dataset into the corpus.
//!
//! ```bash
//! reiz-ingest dataset.json --workers 4 --fast
//! ```
//!
//! Exit codes: 0 on clean completion, 1 on configuration errors, 2 on
//! an unrecoverable backend error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use reiz::backend::{recording::Recorder, Connection, ConnectionPool, HttpConnection};
use reiz::{Config, IngestOptions, Schema};

#[derive(Parser)]
#[command(name = "reiz-ingest", about = "Ingest a dataset of projects into the corpus")]
struct Args {
    /// Dataset file (JSON array of project records)
    dataset: PathBuf,

    /// Worker threads (default: cpus / 2 + 1)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Skip files above the fast-mode size threshold
    #[arg(long)]
    fast: bool,

    /// Stop after this many inserted files
    #[arg(long)]
    hard_limit: Option<usize>,

    /// At most this many files per project
    #[arg(long)]
    max_files_per_project: Option<usize>,

    /// Shuffle the dataset before ingesting
    #[arg(long)]
    random_order: bool,

    /// Record statements instead of talking to the backend
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    reiz::init_logging();
    let args = Args::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "configuration error");
            return ExitCode::from(1);
        }
    };
    let schema = match Schema::bootstrap() {
        Ok(schema) => schema,
        Err(error) => {
            tracing::error!(%error, "grammar error");
            return ExitCode::from(1);
        }
    };
    let dataset = match reiz::dataset::load(&args.dataset, args.random_order) {
        Ok(dataset) => dataset,
        Err(error) => {
            tracing::error!(%error, "could not load the dataset");
            return ExitCode::from(1);
        }
    };

    let mut options = IngestOptions::from_config(&config);
    options.workers = args.workers;
    options.fast_mode |= args.fast;
    if args.hard_limit.is_some() {
        options.hard_limit = args.hard_limit;
    }
    if args.max_files_per_project.is_some() {
        options.max_files_per_project = args.max_files_per_project;
    }

    let pool = if args.dry_run {
        let recorder = Recorder::new();
        ConnectionPool::new(
            Box::new(move || Ok(Box::new(recorder.connection()) as Box<dyn Connection>)),
            config.database.pool_size,
        )
    } else {
        let database = config.database.clone();
        ConnectionPool::new(
            Box::new(move || {
                HttpConnection::connect(&database)
                    .map(|connection| Box::new(connection) as Box<dyn Connection>)
            }),
            config.database.pool_size,
        )
    };

    match reiz::ingest(&schema, &pool, &config, dataset, &options) {
        Ok(statistics) => {
            tracing::info!(%statistics, "ingest finished");
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(%error, "ingest aborted");
            ExitCode::from(2)
        }
    }
}
