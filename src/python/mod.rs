//! # Target-Language Frontend
//!
//! Parses source files with the third-party parser and lowers the
//! typed parse tree into the grammar-shaped [`Tree`] the transformer
//! and serializer operate on. The query frontend reuses the same
//! parser through [`parse_expression`].

use rustpython_parser::ast::{Located, Location};
use rustpython_parser::error::ParseError;
use rustpython_parser::parser;
use thiserror::Error;

use crate::tree::{Span, Tree};

pub mod lower;
pub mod repr;

pub use repr::{constant_repr, str_repr};

/// A failure to parse target-language source, with the parser's
/// inclusive position attached.
#[derive(Error, Debug)]
#[error("{message} (line {}, column {})", .span.lineno, .span.col_offset)]
pub struct SourceError {
    pub message: String,
    pub span: Span,
}

impl From<ParseError> for SourceError {
    fn from(error: ParseError) -> SourceError {
        let span = location_span(&error.location, None);
        SourceError {
            message: error.to_string(),
            span,
        }
    }
}

/// Convert the parser's 1-based columns into the 0-based offsets the
/// corpus stores.
pub(crate) fn location_span(start: &Location, end: Option<&Location>) -> Span {
    let end = end.unwrap_or(start);
    Span {
        lineno: start.row() as u32,
        col_offset: (start.column() as u32).saturating_sub(1),
        end_lineno: end.row() as u32,
        end_col_offset: (end.column() as u32).saturating_sub(1),
    }
}

pub(crate) fn span_of<T>(node: &Located<T>) -> Span {
    location_span(&node.location, node.end_location.as_ref())
}

/// Parse a whole source file into a grammar-shaped tree rooted at a
/// `Module` node.
pub fn parse_module(source: &str, path: &str) -> Result<Tree, SourceError> {
    let body = parser::parse_program(source, path)?;
    Ok(lower::lower_module(&body))
}

/// Parse a single expression (the query surface).
pub fn parse_expression(
    source: &str,
    path: &str,
) -> Result<rustpython_parser::ast::Expr, SourceError> {
    parser::parse_expression(source, path).map_err(SourceError::from)
}
