mod decls;
mod exprs;
mod types;

use std::path::Path;

use crate::ast::{SourceFile, SpannedName};
use crate::diagnostics::{Diagnostic, FileDiagnostic, Span};
use crate::lexer::{Token, TokenKind, lex};

/// Parses one Go compilation unit. Never fails: unsupported constructs degrade to opaque
/// nodes and problems are reported as diagnostics.
pub fn parse_file(path: &Path, source: &str) -> (SourceFile, Vec<FileDiagnostic>) {
    let (tokens, lex_diags) = lex(source);
    let mut parser = Parser::new(source, tokens, path);
    let file = parser.parse_source_file();
    let mut diagnostics: Vec<FileDiagnostic> = lex_diags
        .into_iter()
        .map(|diagnostic| FileDiagnostic {
            path: parser.path.clone(),
            diagnostic,
        })
        .collect();
    diagnostics.append(&mut parser.diagnostics);
    (file, diagnostics)
}

const OPENERS: &[&str] = &["(", "[", "{"];
const CLOSERS: &[&str] = &[")", "]", "}"];

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    path: String,
    diagnostics: Vec<FileDiagnostic>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: Vec<Token>, path: &Path) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            path: path.display().to_string(),
            diagnostics: Vec::new(),
        }
    }

    fn emit_diag(&mut self, code: &str, message: impl Into<String>, span: Span) {
        self.diagnostics.push(FileDiagnostic {
            path: self.path.clone(),
            diagnostic: Diagnostic::error(code, message, span),
        });
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check_symbol(&self, symbol: &str) -> bool {
        self.peek().is_some_and(|tok| tok.is_symbol(symbol))
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|tok| tok.is_keyword(keyword))
    }

    fn check_kind(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|tok| tok.kind == kind)
    }

    fn consume_symbol(&mut self, symbol: &str) -> bool {
        if self.check_symbol(symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.check_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn consume_semicolons(&mut self) {
        while self.check_kind(TokenKind::Semicolon) {
            self.pos += 1;
        }
    }

    fn consume_ident(&mut self) -> Option<SpannedName> {
        let tok = self.peek()?;
        if tok.kind != TokenKind::Ident {
            return None;
        }
        let name = SpannedName {
            name: tok.text.clone(),
            span: tok.span,
        };
        self.pos += 1;
        Some(name)
    }

    fn expect_symbol(&mut self, symbol: &str, message: &str) -> bool {
        if self.consume_symbol(symbol) {
            return true;
        }
        let span = self.current_span();
        self.emit_diag("E0202", message, span);
        false
    }

    /// Ends a declaration or spec: a semicolon, or a closing bracket left for the caller.
    fn expect_terminator(&mut self) {
        match self.peek() {
            None => {}
            Some(tok) if tok.kind == TokenKind::Semicolon => self.pos += 1,
            Some(tok) if tok.kind == TokenKind::Symbol && CLOSERS.contains(&tok.text.as_str()) => {}
            Some(tok) => {
                let span = tok.span;
                self.emit_diag("E0203", "expected `;` or newline", span);
                self.skip_to_terminator();
            }
        }
    }

    fn current_span(&self) -> Span {
        self.peek()
            .or_else(|| self.tokens.last())
            .map(|tok| tok.span)
            .unwrap_or_default()
    }

    fn previous_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|index| self.tokens.get(index))
            .map(|tok| tok.span)
            .unwrap_or_default()
    }

    fn span_from(&self, start: usize) -> Span {
        let first = self
            .tokens
            .get(start)
            .map(|tok| tok.span)
            .unwrap_or_default();
        first.merge(self.previous_span())
    }

    /// Source text covered by `tokens[start..end]`, whitespace collapsed.
    fn text_between(&self, start: usize, end: usize) -> String {
        if start >= end || start >= self.tokens.len() {
            return String::new();
        }
        let end = end.min(self.tokens.len());
        let from = self.tokens[start].range.start;
        let to = self.tokens[start..end]
            .iter()
            .rev()
            .find(|tok| tok.kind != TokenKind::Semicolon || !tok.range.is_empty())
            .map(|tok| tok.range.end)
            .unwrap_or(from);
        self.source
            .get(from..to.max(from))
            .unwrap_or_default()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Index of the bracket closing the one at `open`, bounded by `limit`.
    fn matching(&self, open: usize, limit: usize) -> usize {
        let mut depth = 0usize;
        let mut index = open;
        while index < limit {
            let tok = &self.tokens[index];
            if tok.kind == TokenKind::Symbol {
                if OPENERS.contains(&tok.text.as_str()) {
                    depth += 1;
                } else if CLOSERS.contains(&tok.text.as_str()) {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return index;
                    }
                }
            }
            index += 1;
        }
        limit
    }

    /// Skips the bracketed group starting at the current token, returning its source text.
    fn skip_balanced(&mut self) -> String {
        let start = self.pos;
        let close = self.matching(start, self.tokens.len());
        self.pos = (close + 1).min(self.tokens.len());
        self.text_between(start, self.pos)
    }

    fn skip_to_terminator(&mut self) {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            if tok.kind == TokenKind::Semicolon && depth == 0 {
                self.pos += 1;
                return;
            }
            if tok.kind == TokenKind::Symbol {
                if OPENERS.contains(&tok.text.as_str()) {
                    depth += 1;
                } else if CLOSERS.contains(&tok.text.as_str()) {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
            }
            self.pos += 1;
        }
    }

    /// Skips to the next top-level declaration keyword.
    fn recover_to_decl(&mut self) {
        const TOP_LEVEL: &[&str] = &["func", "type", "var", "const", "import"];
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            if depth == 0 && tok.kind == TokenKind::Semicolon {
                self.pos += 1;
                if self
                    .peek()
                    .is_some_and(|next| next.kind == TokenKind::Keyword && TOP_LEVEL.contains(&next.text.as_str()))
                {
                    return;
                }
                continue;
            }
            if tok.kind == TokenKind::Symbol {
                if OPENERS.contains(&tok.text.as_str()) {
                    depth += 1;
                } else if CLOSERS.contains(&tok.text.as_str()) {
                    depth = depth.saturating_sub(1);
                }
            }
            self.pos += 1;
        }
    }
}
