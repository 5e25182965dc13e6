//! One-shot query CLI.
//!
//! ```bash
//! reiz-query "Name(ctx=Load())" --limit 20
//! reiz-query --show-query "FunctionDef(body=[Assign(), Return()])"
//! reiz-query --stats
//! ```
//!
//! Always exits 0; failures are reported on stderr.

use std::process::ExitCode;

use clap::Parser;

use reiz::backend::HttpConnection;
use reiz::fetch;
use reiz::{Config, Schema};

#[derive(Parser)]
#[command(name = "reiz-query", about = "Run a structural query against the corpus")]
struct Args {
    /// Query source (the pattern to search for)
    query: Option<String>,

    #[arg(short, long)]
    limit: Option<u64>,

    #[arg(short, long)]
    offset: Option<u64>,

    /// Print the compiled backend query instead of running it
    #[arg(long)]
    show_query: bool,

    /// Print corpus statistics instead of running a query
    #[arg(long)]
    stats: bool,
}

fn main() -> ExitCode {
    reiz::init_logging();
    let args = Args::parse();

    if let Err(error) = run(&args) {
        eprintln!("error: {error}");
    }
    ExitCode::SUCCESS
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = Config::load()?;
    let schema = Schema::bootstrap()?;

    if args.stats {
        let mut connection = HttpConnection::connect(&config.database)?;
        for (base, count) in fetch::stats(&mut connection, &schema)? {
            println!("{base}: {count}");
        }
        return Ok(());
    }

    let Some(query) = &args.query else {
        anyhow::bail!("either a query or --stats is required");
    };
    let limit = args.limit.or(Some(config.query.default_limit));

    if args.show_query {
        println!("{}", fetch::prepare_query(query, &schema, limit, args.offset)?);
        return Ok(());
    }

    let mut connection = HttpConnection::connect(&config.database)?;
    let results = fetch::run_query(&mut connection, &schema, query, limit, args.offset)?;
    if results.is_empty() {
        println!("no results");
        return Ok(());
    }
    for result in results {
        println!(
            "{}:{}:{} - {}:{} ({})",
            result.filename,
            result.lineno,
            result.col_offset,
            result.end_lineno,
            result.end_col_offset,
            result.project.source_url,
        );
    }
    Ok(())
}
