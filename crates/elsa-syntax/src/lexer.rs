use std::ops::Range;

use crate::diagnostics::{Diagnostic, Position, Span};
use crate::syntax::{
    SEMICOLON_KEYWORDS, SEMICOLON_SYMBOLS, SYMBOLS_1, SYMBOLS_2, SYMBOLS_3, is_keyword,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Keyword,
    Int,
    Float,
    Imaginary,
    Rune,
    String,
    RawString,
    Symbol,
    /// Either an explicit `;` or one inserted at a line end.
    Semicolon,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
    /// Byte range in the source; empty for inserted semicolons.
    pub range: Range<usize>,
}

impl Token {
    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Symbol && self.text == symbol
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == keyword
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Int
                | TokenKind::Float
                | TokenKind::Imaginary
                | TokenKind::Rune
                | TokenKind::String
                | TokenKind::RawString
        )
    }

    fn ends_statement(&self) -> bool {
        match self.kind {
            TokenKind::Ident => true,
            TokenKind::Keyword => SEMICOLON_KEYWORDS.contains(&self.text.as_str()),
            TokenKind::Symbol => SEMICOLON_SYMBOLS.contains(&self.text.as_str()),
            TokenKind::Semicolon => false,
            _ => self.is_literal(),
        }
    }
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

/// Tokenizes Go source, dropping comments and inserting semicolons at line ends.
pub fn lex(src: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut lexer = Lexer {
        src,
        pos: 0,
        line: 1,
        column: 1,
        tokens: Vec::new(),
        diagnostics: Vec::new(),
    };
    lexer.run();
    (lexer.tokens, lexer.diagnostics)
}

impl Lexer<'_> {
    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn insert_semicolon(&mut self) {
        let Some(last) = self.tokens.last() else {
            return;
        };
        if !last.ends_statement() {
            return;
        }
        let at = last.span.end;
        self.tokens.push(Token {
            kind: TokenKind::Semicolon,
            text: "\n".to_string(),
            span: Span { start: at, end: at },
            range: self.pos..self.pos,
        });
    }

    fn push(&mut self, kind: TokenKind, start_pos: usize, start: Position) {
        let end = Position {
            line: self.line,
            column: self.column.saturating_sub(1).max(1),
        };
        self.tokens.push(Token {
            kind,
            text: self.src[start_pos..self.pos].to_string(),
            span: Span { start, end },
            range: start_pos..self.pos,
        });
    }

    fn run(&mut self) {
        while let Some(ch) = self.peek() {
            let start_pos = self.pos;
            let start = self.position();
            match ch {
                '\n' => {
                    self.insert_semicolon();
                    self.bump();
                }
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' if self.peek_nth(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '/' if self.peek_nth(1) == Some('*') => self.block_comment(start),
                '"' => self.interpreted_string(start_pos, start),
                '`' => self.raw_string(start_pos, start),
                '\'' => self.rune(start_pos, start),
                c if c.is_ascii_digit() => self.number(start_pos, start),
                '.' if self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => {
                    self.number(start_pos, start)
                }
                c if c == '_' || c.is_alphabetic() => {
                    while self
                        .peek()
                        .is_some_and(|c| c == '_' || c.is_alphanumeric())
                    {
                        self.bump();
                    }
                    let kind = if is_keyword(&self.src[start_pos..self.pos]) {
                        TokenKind::Keyword
                    } else {
                        TokenKind::Ident
                    };
                    self.push(kind, start_pos, start);
                }
                _ => self.symbol(start_pos, start),
            }
        }
        self.insert_semicolon();
    }

    fn block_comment(&mut self, start: Position) {
        self.bump();
        self.bump();
        let mut spans_lines = false;
        loop {
            match self.peek() {
                None => {
                    self.diagnostics.push(Diagnostic::error(
                        "E0101",
                        "unterminated block comment",
                        Span {
                            start,
                            end: self.position(),
                        },
                    ));
                    return;
                }
                Some('*') if self.peek_nth(1) == Some('/') => {
                    self.bump();
                    self.bump();
                    break;
                }
                Some(c) => {
                    spans_lines |= c == '\n';
                    self.bump();
                }
            }
        }
        // A comment containing a newline acts like one.
        if spans_lines {
            self.insert_semicolon();
        }
    }

    fn interpreted_string(&mut self, start_pos: usize, start: Position) {
        self.quoted('"', "E0102", "unterminated string literal", start);
        self.push(TokenKind::String, start_pos, start);
    }

    fn rune(&mut self, start_pos: usize, start: Position) {
        self.quoted('\'', "E0103", "unterminated rune literal", start);
        self.push(TokenKind::Rune, start_pos, start);
    }

    fn quoted(&mut self, quote: char, code: &str, message: &str, start: Position) {
        self.bump();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    self.diagnostics.push(Diagnostic::error(
                        code,
                        message,
                        Span {
                            start,
                            end: self.position(),
                        },
                    ));
                    return;
                }
                Some('\\') => {
                    self.bump();
                    if self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                Some(c) => {
                    self.bump();
                    if c == quote {
                        return;
                    }
                }
            }
        }
    }

    fn raw_string(&mut self, start_pos: usize, start: Position) {
        self.bump();
        loop {
            match self.bump() {
                None => {
                    self.diagnostics.push(Diagnostic::error(
                        "E0104",
                        "unterminated raw string literal",
                        Span {
                            start,
                            end: self.position(),
                        },
                    ));
                    break;
                }
                Some('`') => break,
                Some(_) => {}
            }
        }
        self.push(TokenKind::RawString, start_pos, start);
    }

    fn number(&mut self, start_pos: usize, start: Position) {
        let hex = self.peek() == Some('0') && matches!(self.peek_nth(1), Some('x' | 'X'));
        let mut saw_dot = false;
        let mut saw_exponent = false;
        while let Some(c) = self.peek() {
            let is_exponent = if hex {
                matches!(c, 'p' | 'P')
            } else {
                matches!(c, 'e' | 'E')
            };
            if is_exponent {
                saw_exponent = true;
                self.bump();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.bump();
                }
            } else if c == '.' && !saw_dot && !saw_exponent {
                saw_dot = true;
                self.bump();
            } else if c == '_' || c.is_ascii_alphanumeric() {
                self.bump();
            } else {
                break;
            }
        }
        let text = &self.src[start_pos..self.pos];
        let kind = if text.ends_with('i') {
            TokenKind::Imaginary
        } else if saw_dot || saw_exponent {
            TokenKind::Float
        } else {
            TokenKind::Int
        };
        self.push(kind, start_pos, start);
    }

    fn symbol(&mut self, start_pos: usize, start: Position) {
        let chars: Vec<char> = self.src[self.pos..].chars().take(3).collect();
        let width = if chars.len() >= 3
            && SYMBOLS_3
                .iter()
                .any(|(sym, _)| sym[..] == chars[..3])
        {
            3
        } else if chars.len() >= 2
            && SYMBOLS_2
                .iter()
                .any(|(sym, _)| sym[..] == chars[..2])
        {
            2
        } else if SYMBOLS_1.contains(&chars[0]) {
            1
        } else {
            self.bump();
            self.diagnostics.push(Diagnostic::error(
                "E0105",
                format!("unexpected character `{}`", chars[0]),
                Span {
                    start,
                    end: start,
                },
            ));
            return;
        };
        for _ in 0..width {
            self.bump();
        }
        if width == 1 && chars[0] == ';' {
            self.push(TokenKind::Semicolon, start_pos, start);
        } else {
            self.push(TokenKind::Symbol, start_pos, start);
        }
    }
}

/// Returns the value of an interpreted or raw string literal token.
pub fn unquote(literal: &str) -> String {
    if let Some(raw) = literal
        .strip_prefix('`')
        .map(|rest| rest.strip_suffix('`').unwrap_or(rest))
    {
        return raw.replace('\r', "");
    }
    let inner = literal
        .strip_prefix('"')
        .map(|rest| rest.strip_suffix('"').unwrap_or(rest))
        .unwrap_or(literal);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
