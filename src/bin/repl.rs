//! Interactive query REPL.
//!
//! Enter a query per line; `.ir` toggles printing the compiled backend
//! query, `.limit N` changes pagination, `.stats` prints corpus
//! counts, `.quit` exits.

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use reiz::backend::HttpConnection;
use reiz::fetch;
use reiz::{Config, Schema};

fn main() -> anyhow::Result<()> {
    reiz::init_logging();
    let config = Config::load()?;
    let schema = Schema::bootstrap()?;
    let mut connection = HttpConnection::connect(&config.database)?;

    println!("reiz query repl");
    println!("  .ir       toggle printing the compiled query");
    println!("  .limit N  set the result limit");
    println!("  .stats    print corpus statistics");
    println!("  .quit     exit\n");

    let mut editor = DefaultEditor::new()?;
    let mut show_ir = false;
    let mut limit = config.query.default_limit;

    loop {
        let line = match editor.readline("reiz> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(error) => return Err(error.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        match line {
            ".quit" | ".exit" => break,
            ".ir" => {
                show_ir = !show_ir;
                println!("compiled query printing {}", if show_ir { "on" } else { "off" });
                continue;
            }
            ".stats" => {
                match fetch::stats(&mut connection, &schema) {
                    Ok(counts) => {
                        for (base, count) in counts {
                            println!("{base}: {count}");
                        }
                    }
                    Err(error) => eprintln!("error: {error}"),
                }
                continue;
            }
            command if command.starts_with(".limit") => {
                match command.trim_start_matches(".limit").trim().parse() {
                    Ok(new_limit) => {
                        limit = new_limit;
                        println!("limit set to {limit}");
                    }
                    Err(_) => eprintln!("usage: .limit N"),
                }
                continue;
            }
            _ => {}
        }

        if show_ir {
            match fetch::prepare_query(line, &schema, Some(limit), None) {
                Ok(statement) => println!("{statement}\n"),
                Err(error) => {
                    eprintln!("error: {error}");
                    continue;
                }
            }
        }

        match fetch::run_query(&mut connection, &schema, line, Some(limit), None) {
            Ok(results) if results.is_empty() => println!("no results"),
            Ok(results) => {
                for result in results {
                    println!(
                        "{}:{}:{} - {}:{}",
                        result.filename,
                        result.lineno,
                        result.col_offset,
                        result.end_lineno,
                        result.end_col_offset,
                    );
                }
            }
            Err(error) => eprintln!("error: {error}"),
        }
    }
    Ok(())
}
