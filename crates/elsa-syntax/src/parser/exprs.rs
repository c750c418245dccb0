use crate::ast::{CallExpr, Expr, SpannedName};
use crate::lexer::TokenKind;

use super::{CLOSERS, OPENERS, Parser};

impl Parser<'_> {
    /// Every call expression starting in `tokens[start..end]`, outermost first. Calls nested
    /// inside another call stay reachable through its function and arguments.
    pub(super) fn collect_calls(&self, start: usize, end: usize) -> Vec<CallExpr> {
        let mut calls = Vec::new();
        let mut index = start;
        while index < end {
            let tok = &self.tokens[index];
            let after_dot = index > start && self.tokens[index - 1].is_symbol(".");
            if tok.kind != TokenKind::Ident || after_dot {
                index += 1;
                continue;
            }
            let (expr, next) = self.primary_at(index, end);
            calls.extend(calls_of(expr));
            index = next.max(index + 1);
        }
        calls
    }

    /// Splits `tokens[start..end]` on commas at bracket depth zero.
    pub(super) fn split_top_level(&self, start: usize, end: usize) -> Vec<(usize, usize)> {
        let mut parts = Vec::new();
        let mut depth = 0usize;
        let mut from = start;
        for index in start..end {
            let tok = &self.tokens[index];
            if tok.kind != TokenKind::Symbol {
                continue;
            }
            if OPENERS.contains(&tok.text.as_str()) {
                depth += 1;
            } else if CLOSERS.contains(&tok.text.as_str()) {
                depth = depth.saturating_sub(1);
            } else if depth == 0 && tok.text == "," {
                parts.push((from, index));
                from = index + 1;
            }
        }
        parts.push((from, end));
        parts
    }

    /// The expression spanning exactly `tokens[start..end]`, or `None` when the range is empty.
    pub(super) fn expr_range(&self, start: usize, end: usize) -> Option<Expr> {
        let (start, end) = self.trim_semicolons(start, end);
        if start >= end {
            return None;
        }
        let first = &self.tokens[start];
        if first.is_literal() && end == start + 1 {
            return Some(Expr::Literal {
                text: first.text.clone(),
                span: first.span,
            });
        }
        if first.kind == TokenKind::Ident {
            let (expr, next) = self.primary_at(start, end);
            if next == end {
                return Some(expr);
            }
        }
        Some(Expr::Other {
            text: self.text_between(start, end),
            calls: self.collect_calls(start, end),
            span: first.span.merge(self.tokens[end - 1].span),
        })
    }

    fn trim_semicolons(&self, mut start: usize, mut end: usize) -> (usize, usize) {
        while start < end && self.tokens[start].kind == TokenKind::Semicolon {
            start += 1;
        }
        while end > start && self.tokens[end - 1].kind == TokenKind::Semicolon {
            end -= 1;
        }
        (start, end)
    }

    /// Parses an operand starting at the identifier `tokens[index]` together with its
    /// selector, call, index and type-assertion suffixes. Returns the expression and the
    /// index just past it.
    fn primary_at(&self, index: usize, end: usize) -> (Expr, usize) {
        let first = &self.tokens[index];
        let mut expr = Expr::Ident(SpannedName {
            name: first.text.clone(),
            span: first.span,
        });
        let mut next = index + 1;
        while next < end {
            let tok = &self.tokens[next];
            if tok.is_symbol(".") {
                match self.tokens.get(next + 1) {
                    Some(name) if next + 1 < end && name.kind == TokenKind::Ident => {
                        expr = Expr::Selector {
                            span: expr.span().merge(name.span),
                            base: Box::new(expr),
                            name: SpannedName {
                                name: name.text.clone(),
                                span: name.span,
                            },
                        };
                        next += 2;
                    }
                    Some(open) if next + 1 < end && open.is_symbol("(") => {
                        let close = self.matching(next + 1, end);
                        expr = self.opaque_suffix(expr, index, next + 2, close, end);
                        next = close + 1;
                    }
                    _ => break,
                }
            } else if tok.is_symbol("(") {
                let close = self.matching(next, end);
                let args = self
                    .split_top_level(next + 1, close.min(end))
                    .into_iter()
                    .filter_map(|(from, to)| self.expr_range(from, to))
                    .collect();
                let close_span = self
                    .tokens
                    .get(close.min(end.saturating_sub(1)))
                    .map_or(tok.span, |tok| tok.span);
                expr = Expr::Call(CallExpr {
                    span: expr.span().merge(close_span),
                    func: Box::new(expr),
                    args,
                });
                next = close + 1;
            } else if tok.is_symbol("[") {
                let close = self.matching(next, end);
                expr = self.opaque_suffix(expr, index, next + 1, close, end);
                next = close + 1;
            } else {
                break;
            }
        }
        (expr, next.min(end))
    }

    /// Wraps `base` and a bracketed suffix whose contents are `tokens[inner..close]`.
    fn opaque_suffix(&self, base: Expr, start: usize, inner: usize, close: usize, end: usize) -> Expr {
        let stop = (close + 1).min(end);
        let mut calls = calls_of(base);
        calls.extend(self.collect_calls(inner, close.min(end)));
        Expr::Other {
            text: self.text_between(start, stop),
            calls,
            span: self.tokens[start].span.merge(self.tokens[stop - 1].span),
        }
    }
}

fn calls_of(expr: Expr) -> Vec<CallExpr> {
    match expr {
        Expr::Call(call) => vec![call],
        Expr::Other { calls, .. } => calls,
        Expr::Selector { base, .. } => calls_of(*base),
        Expr::Ident(_) | Expr::Literal { .. } => Vec::new(),
    }
}
