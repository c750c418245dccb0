use crate::ast::{ChanDir, TypeExpr};
use crate::lexer::TokenKind;

use super::{CLOSERS, Parser};

impl Parser<'_> {
    pub(super) fn starts_type_at(&self, index: usize) -> bool {
        let Some(tok) = self.tokens.get(index) else {
            return false;
        };
        match tok.kind {
            TokenKind::Ident => true,
            TokenKind::Keyword => {
                matches!(tok.text.as_str(), "map" | "chan" | "func" | "interface" | "struct")
            }
            TokenKind::Symbol => matches!(tok.text.as_str(), "*" | "[" | "(" | "<-"),
            _ => false,
        }
    }

    pub(super) fn parse_type(&mut self) -> TypeExpr {
        let start = self.pos;
        let Some(tok) = self.peek() else {
            let span = self.current_span();
            self.emit_diag("E0204", "expected type", span);
            return TypeExpr::Opaque(String::new());
        };
        match (tok.kind, tok.text.as_str()) {
            (TokenKind::Ident, _) => self.parse_type_name(),
            (TokenKind::Symbol, "*") => {
                self.pos += 1;
                TypeExpr::Pointer(Box::new(self.parse_type()))
            }
            (TokenKind::Symbol, "(") => {
                self.pos += 1;
                let inner = self.parse_type();
                self.expect_symbol(")", "expected `)` after parenthesized type");
                inner
            }
            (TokenKind::Symbol, "[") => {
                if self.peek_nth(1).is_some_and(|next| next.is_symbol("]")) {
                    self.pos += 2;
                    return TypeExpr::Slice(Box::new(self.parse_type()));
                }
                let close = self.matching(self.pos, self.tokens.len());
                let len = self.text_between(self.pos + 1, close);
                self.pos = (close + 1).min(self.tokens.len());
                TypeExpr::Array {
                    len,
                    elem: Box::new(self.parse_type()),
                }
            }
            (TokenKind::Symbol, "<-") => {
                self.pos += 1;
                if !self.consume_keyword("chan") {
                    let span = self.current_span();
                    self.emit_diag("E0204", "expected `chan` after `<-`", span);
                }
                TypeExpr::Chan {
                    dir: ChanDir::Recv,
                    elem: Box::new(self.parse_type()),
                }
            }
            (TokenKind::Keyword, "chan") => {
                self.pos += 1;
                let dir = if self.consume_symbol("<-") {
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                TypeExpr::Chan {
                    dir,
                    elem: Box::new(self.parse_type()),
                }
            }
            (TokenKind::Keyword, "map") => {
                self.pos += 1;
                self.expect_symbol("[", "expected `[` after `map`");
                let key = self.parse_type();
                self.expect_symbol("]", "expected `]` after map key type");
                TypeExpr::Map {
                    key: Box::new(key),
                    value: Box::new(self.parse_type()),
                }
            }
            (TokenKind::Keyword, "func") => {
                self.pos += 1;
                if self.check_symbol("(") {
                    self.skip_balanced();
                }
                if self.check_symbol("(") {
                    self.skip_balanced();
                } else if self.starts_type_at(self.pos) && !self.check_symbol("[") {
                    self.parse_type();
                }
                TypeExpr::Opaque(self.text_between(start, self.pos))
            }
            (TokenKind::Keyword, "interface" | "struct") => {
                self.pos += 1;
                if self.check_symbol("{") {
                    self.skip_balanced();
                } else {
                    let span = self.current_span();
                    self.emit_diag("E0204", "expected `{`", span);
                }
                TypeExpr::Opaque(self.text_between(start, self.pos))
            }
            _ => {
                let span = tok.span;
                let stop = tok.kind == TokenKind::Semicolon
                    || tok.is_symbol(",")
                    || (tok.kind == TokenKind::Symbol && CLOSERS.contains(&tok.text.as_str()));
                self.emit_diag("E0204", "expected type", span);
                if !stop {
                    self.pos += 1;
                }
                TypeExpr::Opaque(String::new())
            }
        }
    }

    /// `Name`, `pkg.Name`, either optionally followed by type arguments.
    fn parse_type_name(&mut self) -> TypeExpr {
        let start = self.pos;
        let Some(first) = self.consume_ident() else {
            return TypeExpr::Opaque(String::new());
        };
        let named = if self.check_symbol(".")
            && self
                .peek_nth(1)
                .is_some_and(|tok| tok.kind == TokenKind::Ident)
        {
            self.pos += 1;
            let name = self.consume_ident().map(|name| name.name).unwrap_or_default();
            TypeExpr::Selector {
                qualifier: first.name,
                name,
            }
        } else {
            TypeExpr::Ident(first.name)
        };
        if self.check_symbol("[") && !self.peek_nth(1).is_some_and(|tok| tok.is_symbol("]")) {
            self.skip_balanced();
            return TypeExpr::Opaque(self.text_between(start, self.pos));
        }
        named
    }
}
