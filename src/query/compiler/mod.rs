//! # Query Compiler
//!
//! Lowers the query grammar to IR. [`codegen`] walks the grammar with
//! a [`State`] tower tracking the current match type and field; list
//! matchers allocate sequence bindings and switch path construction
//! into loop mode; references resolve through the shared [`Scope`].

mod codegen;
mod functions;
mod state;

pub use codegen::{codegen, compile};
pub use state::{Compiler, Flags, Pointer, Scope, State};
