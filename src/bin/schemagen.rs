//! Schema generation CLI: turn an ASDL grammar into the backend
//! migration document plus the companion field DB JSON.
//!
//! ```bash
//! schemagen Python.asdl corpus.schema fielddb.json
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use reiz::grammar::{self, Model};
use reiz::schema::{codegen, Schema};

#[derive(Parser)]
#[command(name = "schemagen", about = "Generate the corpus schema from an ASDL grammar")]
struct Args {
    /// ASDL grammar file
    input: PathBuf,
    /// Where to write the migration document
    output: PathBuf,
    /// Where to write the field DB JSON
    field_db: PathBuf,
}

fn main() -> anyhow::Result<()> {
    reiz::init_logging();
    let args = Args::parse();

    let source = std::fs::read_to_string(&args.input)
        .with_context(|| format!("could not read {}", args.input.display()))?;
    let model = Model::new(grammar::parse(&source)?)?;
    let schema = Schema::new(model);

    std::fs::write(&args.output, codegen::generate_schema(&schema))
        .with_context(|| format!("could not write {}", args.output.display()))?;
    std::fs::write(&args.field_db, codegen::generate_field_db(&schema))
        .with_context(|| format!("could not write {}", args.field_db.display()))?;

    tracing::info!(
        "schema written to {}, field DB to {}",
        args.output.display(),
        args.field_db.display()
    );
    Ok(())
}
