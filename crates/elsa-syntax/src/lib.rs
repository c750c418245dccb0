#![deny(clippy::unwrap_used)]

//! A tolerant parser for the subset of Go that dependency wiring needs: package clause,
//! imports, top-level declarations, signatures, struct shapes and the call expressions
//! inside function bodies.

pub mod ast;
mod diagnostics;
mod lexer;
mod parser;
pub mod syntax;
mod type_string;

pub use ast::{
    Block, CallExpr, ChanDir, Decl, Expr, Field, FuncDecl, ImportSpec, SourceFile, SpannedName,
    TypeBody, TypeExpr, TypeSpec, ValueSpec,
};
pub use diagnostics::{
    Diagnostic, DiagnosticSeverity, FileDiagnostic, Position, Span, file_diagnostics_have_errors,
    render_diagnostics,
};
pub use lexer::{Token, TokenKind, lex, unquote};
pub use parser::parse_file;
pub use type_string::parse_type_string;

#[cfg(test)]
mod tests;
