//! # ReizQL
//!
//! The structural query language. Its surface syntax is the target
//! language itself: a query is one call expression whose callee names
//! a grammar type, with matchers, list patterns, references and
//! builtins in argument position.
//!
//! [`parse_query`] folds the target-language parse tree into the query
//! grammar; [`compile`] lowers that grammar to IR. [`compile_query`]
//! chains the two.

use thiserror::Error;

use crate::ir::Ir;
use crate::schema::Schema;
use crate::tree::Span;

pub mod compiler;
pub mod grammar;
pub mod parser;

pub use compiler::compile;
pub use parser::parse_query;

/// Query frontend failures. Syntax errors come from the parser with an
/// inclusive position range; compiler errors carry the position of the
/// offending grammar node where one is known.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("syntax error: {message}{}", format_span(.span))]
    Syntax { message: String, span: Option<Span> },

    #[error("compiler error: {message}{}", format_span(.span))]
    Compiler { message: String, span: Option<Span> },
}

impl QueryError {
    pub fn syntax(message: impl Into<String>, span: Option<Span>) -> QueryError {
        QueryError::Syntax {
            message: message.into(),
            span,
        }
    }

    pub fn compiler(message: impl Into<String>, span: Option<Span>) -> QueryError {
        QueryError::Compiler {
            message: message.into(),
            span,
        }
    }
}

fn format_span(span: &Option<Span>) -> String {
    match span {
        Some(span) => format!(
            " (line {}, column {} to line {}, column {})",
            span.lineno, span.col_offset, span.end_lineno, span.end_col_offset
        ),
        None => String::new(),
    }
}

/// Parse and compile a query down to an unoptimized `SELECT` IR tree.
pub fn compile_query(source: &str, schema: &Schema) -> Result<Ir, QueryError> {
    let root = parse_query(source, schema)?;
    compile(&root, schema)
}
