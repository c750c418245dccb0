use crate::ast::{
    Block, Decl, Field, FuncDecl, ImportSpec, SourceFile, SpannedName, TypeBody, TypeExpr,
    TypeSpec, ValueSpec,
};
use crate::lexer::{TokenKind, unquote};

use super::Parser;

/// A parameter entry before Go's grouping rule has been applied.
enum ParamEntry {
    Bare(SpannedName),
    Named(SpannedName, TypeExpr, bool, crate::diagnostics::Span),
    Type(TypeExpr, bool, crate::diagnostics::Span),
}

impl Parser<'_> {
    pub(super) fn parse_source_file(&mut self) -> SourceFile {
        self.consume_semicolons();
        let package = if self.consume_keyword("package") {
            match self.consume_ident() {
                Some(name) => name,
                None => {
                    let span = self.current_span();
                    self.emit_diag("E0201", "expected package name", span);
                    SpannedName {
                        name: String::new(),
                        span,
                    }
                }
            }
        } else {
            let span = self.current_span();
            self.emit_diag("E0201", "expected `package` clause", span);
            SpannedName {
                name: String::new(),
                span,
            }
        };
        self.expect_terminator();

        let mut imports = Vec::new();
        let mut decls = Vec::new();
        loop {
            self.consume_semicolons();
            if self.at_end() {
                break;
            }
            if self.consume_keyword("import") {
                self.parse_grouped(|parser| {
                    if let Some(spec) = parser.parse_import_spec() {
                        imports.push(spec);
                    }
                });
                continue;
            }
            if self.check_keyword("func") {
                if let Some(func) = self.parse_func_decl() {
                    decls.push(Decl::Func(func));
                }
                continue;
            }
            if self.consume_keyword("type") {
                self.parse_grouped(|parser| {
                    if let Some(spec) = parser.parse_type_spec() {
                        decls.push(Decl::Type(spec));
                    }
                });
                continue;
            }
            if self.consume_keyword("var") {
                self.parse_grouped(|parser| {
                    if let Some(spec) = parser.parse_value_spec() {
                        decls.push(Decl::Var(spec));
                    }
                });
                continue;
            }
            if self.consume_keyword("const") {
                self.parse_grouped(|parser| {
                    if let Some(spec) = parser.parse_value_spec() {
                        decls.push(Decl::Const(spec));
                    }
                });
                continue;
            }
            let span = self.current_span();
            self.emit_diag("E0201", "expected declaration", span);
            self.recover_to_decl();
        }

        SourceFile {
            path: self.path.clone(),
            package,
            imports,
            decls,
        }
    }

    /// Runs `spec` once for a single spec, or per entry of a parenthesized group.
    fn parse_grouped(&mut self, mut spec: impl FnMut(&mut Self)) {
        if !self.consume_symbol("(") {
            spec(self);
            return;
        }
        loop {
            self.consume_semicolons();
            if self.at_end() {
                let span = self.current_span();
                self.emit_diag("E0202", "expected `)` to close declaration group", span);
                return;
            }
            if self.consume_symbol(")") {
                break;
            }
            let before = self.pos;
            spec(self);
            if self.pos == before {
                self.pos += 1;
            }
        }
        self.expect_terminator();
    }

    fn parse_import_spec(&mut self) -> Option<ImportSpec> {
        let start = self.pos;
        let name = match self.peek() {
            Some(tok) if tok.kind == TokenKind::Ident => self.consume_ident(),
            Some(tok) if tok.is_symbol(".") => {
                let name = SpannedName {
                    name: ".".to_string(),
                    span: tok.span,
                };
                self.pos += 1;
                Some(name)
            }
            _ => None,
        };
        let path = match self.peek() {
            Some(tok) if matches!(tok.kind, TokenKind::String | TokenKind::RawString) => {
                let path = unquote(&tok.text);
                self.pos += 1;
                path
            }
            _ => {
                let span = self.current_span();
                self.emit_diag("E0205", "expected import path", span);
                self.skip_to_terminator();
                return None;
            }
        };
        let span = self.span_from(start);
        self.expect_terminator();
        Some(ImportSpec { name, path, span })
    }

    fn parse_func_decl(&mut self) -> Option<FuncDecl> {
        let start = self.pos;
        self.consume_keyword("func");
        let receiver = if self.check_symbol("(") {
            self.parse_params().into_iter().next()
        } else {
            None
        };
        let Some(name) = self.consume_ident() else {
            let span = self.current_span();
            self.emit_diag("E0206", "expected function name", span);
            self.recover_to_decl();
            return None;
        };
        let type_params = if self.check_symbol("[") {
            Some(self.skip_balanced())
        } else {
            None
        };
        let params = if self.check_symbol("(") {
            self.parse_params()
        } else {
            let span = self.current_span();
            self.emit_diag("E0202", "expected `(` to open parameter list", span);
            self.recover_to_decl();
            return None;
        };
        let results = self.parse_results();
        let body = if self.check_symbol("{") {
            Some(self.parse_block())
        } else {
            None
        };
        let span = self.span_from(start);
        self.expect_terminator();
        Some(FuncDecl {
            name,
            receiver,
            type_params,
            params,
            results,
            body,
            span,
        })
    }

    pub(super) fn parse_results(&mut self) -> Vec<Field> {
        if self.check_symbol("(") {
            return self.parse_params();
        }
        if !self.starts_type_at(self.pos) {
            return Vec::new();
        }
        let start = self.pos;
        let ty = self.parse_type();
        vec![Field {
            names: Vec::new(),
            ty,
            tag: None,
            variadic: false,
            span: self.span_from(start),
        }]
    }

    fn parse_block(&mut self) -> Block {
        let open = self.pos;
        let close = self.matching(open, self.tokens.len());
        let calls = self.collect_calls(open + 1, close);
        self.pos = (close + 1).min(self.tokens.len());
        Block {
            calls,
            span: self.span_from(open),
        }
    }

    /// Parses `( ... )` as a parameter or result list, applying the grouping rule where
    /// bare identifiers take the type of the next named entry.
    pub(super) fn parse_params(&mut self) -> Vec<Field> {
        let mut entries = Vec::new();
        self.expect_symbol("(", "expected `(`");
        loop {
            self.consume_semicolons();
            if self.at_end() || self.consume_symbol(")") {
                break;
            }
            let before = self.pos;
            entries.push(self.parse_param_entry());
            self.consume_semicolons();
            if !self.consume_symbol(",") && !self.check_symbol(")") {
                let span = self.current_span();
                self.emit_diag("E0202", "expected `,` or `)` in parameter list", span);
                self.skip_to_terminator();
                break;
            }
            if self.pos == before {
                self.pos += 1;
            }
        }
        group_params(entries)
    }

    fn parse_param_entry(&mut self) -> ParamEntry {
        let start = self.pos;
        let ident_first = self.check_kind(TokenKind::Ident);
        if ident_first && self.ident_names_entry() {
            if let Some(name) = self.consume_ident() {
                let variadic = self.consume_symbol("...");
                let ty = self.parse_type();
                return ParamEntry::Named(name, ty, variadic, self.span_from(start));
            }
        }
        if ident_first
            && self
                .peek_nth(1)
                .is_none_or(|tok| tok.is_symbol(",") || tok.is_symbol(")"))
        {
            if let Some(name) = self.consume_ident() {
                return ParamEntry::Bare(name);
            }
        }
        let variadic = self.consume_symbol("...");
        let ty = self.parse_type();
        ParamEntry::Type(ty, variadic, self.span_from(start))
    }

    /// True when the identifier at the cursor is a name followed by its type.
    fn ident_names_entry(&self) -> bool {
        let Some(next) = self.peek_nth(1) else {
            return false;
        };
        if next.is_symbol(",") || next.is_symbol(")") || next.is_symbol(".") {
            return false;
        }
        if next.is_symbol("...") {
            return true;
        }
        if next.is_symbol("[") {
            return self.bracket_starts_type(self.pos + 1);
        }
        self.starts_type_at(self.pos + 1)
    }

    /// For `x[...]`, distinguishes an array or slice type after a name from a generic
    /// instantiation: the bracket begins a type when a type follows the closing `]`.
    fn bracket_starts_type(&self, open: usize) -> bool {
        let close = self.matching(open, self.tokens.len());
        self.starts_type_at(close + 1)
    }

    fn parse_type_spec(&mut self) -> Option<TypeSpec> {
        let start = self.pos;
        let Some(name) = self.consume_ident() else {
            let span = self.current_span();
            self.emit_diag("E0207", "expected type name", span);
            self.skip_to_terminator();
            return None;
        };
        let has_type_params = self.check_symbol("[")
            && self
                .peek_nth(1)
                .is_some_and(|tok| tok.kind == TokenKind::Ident)
            && self.peek_nth(2).is_some_and(|tok| !tok.is_symbol("]"));
        let type_params = if has_type_params {
            Some(self.skip_balanced())
        } else {
            None
        };
        let alias = self.consume_symbol("=");
        let body = if self.check_keyword("struct")
            && self.peek_nth(1).is_some_and(|tok| tok.is_symbol("{"))
        {
            self.pos += 1;
            TypeBody::Struct(self.parse_struct_fields())
        } else {
            TypeBody::Expr(self.parse_type())
        };
        let span = self.span_from(start);
        self.expect_terminator();
        Some(TypeSpec {
            name,
            type_params,
            alias,
            body,
            span,
        })
    }

    fn parse_struct_fields(&mut self) -> Vec<Field> {
        let mut fields = Vec::new();
        self.expect_symbol("{", "expected `{`");
        loop {
            self.consume_semicolons();
            if self.at_end() {
                let span = self.current_span();
                self.emit_diag("E0202", "expected `}` to close struct type", span);
                break;
            }
            if self.consume_symbol("}") {
                break;
            }
            let before = self.pos;
            if let Some(field) = self.parse_struct_field() {
                fields.push(field);
            }
            if self.pos == before {
                self.pos += 1;
            }
        }
        fields
    }

    fn parse_struct_field(&mut self) -> Option<Field> {
        let start = self.pos;
        let mut names = Vec::new();
        if self.check_kind(TokenKind::Ident) && !self.is_embedded_field() {
            while let Some(name) = self.consume_ident() {
                names.push(name);
                if !self.consume_symbol(",") {
                    break;
                }
            }
        }
        if !self.starts_type_at(self.pos) {
            let span = self.current_span();
            self.emit_diag("E0204", "expected field type", span);
            self.skip_to_terminator();
            return None;
        }
        let ty = self.parse_type();
        let tag = match self.peek() {
            Some(tok) if matches!(tok.kind, TokenKind::String | TokenKind::RawString) => {
                let tag = tok.text.clone();
                self.pos += 1;
                Some(tag)
            }
            _ => None,
        };
        let span = self.span_from(start);
        self.expect_terminator();
        Some(Field {
            names,
            ty,
            tag,
            variadic: false,
            span,
        })
    }

    fn is_embedded_field(&self) -> bool {
        let Some(next) = self.peek_nth(1) else {
            return true;
        };
        if next.kind == TokenKind::Semicolon
            || next.is_symbol(".")
            || next.is_symbol("}")
            || matches!(next.kind, TokenKind::String | TokenKind::RawString)
        {
            return true;
        }
        if next.is_symbol("[") {
            return !self.bracket_starts_type(self.pos + 1);
        }
        false
    }

    fn parse_value_spec(&mut self) -> Option<ValueSpec> {
        let start = self.pos;
        let mut names = Vec::new();
        while let Some(name) = self.consume_ident() {
            names.push(name);
            if !self.consume_symbol(",") {
                break;
            }
        }
        if names.is_empty() {
            let span = self.current_span();
            self.emit_diag("E0208", "expected identifier", span);
            self.skip_to_terminator();
            return None;
        }
        let ty = if self.starts_type_at(self.pos) {
            Some(self.parse_type())
        } else {
            None
        };
        let mut values = Vec::new();
        if self.consume_symbol("=") {
            let end = self.spec_end(self.pos);
            for (from, to) in self.split_top_level(self.pos, end) {
                if let Some(expr) = self.expr_range(from, to) {
                    values.push(expr);
                }
            }
            self.pos = end;
        }
        let span = self.span_from(start);
        self.expect_terminator();
        Some(ValueSpec {
            names,
            ty,
            values,
            span,
        })
    }

    /// First index at or after `from` that ends the current spec at bracket depth zero.
    fn spec_end(&self, from: usize) -> usize {
        let mut depth = 0usize;
        let mut index = from;
        while let Some(tok) = self.tokens.get(index) {
            match tok.kind {
                TokenKind::Semicolon if depth == 0 => return index,
                TokenKind::Symbol if super::OPENERS.contains(&tok.text.as_str()) => depth += 1,
                TokenKind::Symbol if super::CLOSERS.contains(&tok.text.as_str()) => {
                    if depth == 0 {
                        return index;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            index += 1;
        }
        index
    }
}

fn group_params(entries: Vec<ParamEntry>) -> Vec<Field> {
    let any_named = entries
        .iter()
        .any(|entry| matches!(entry, ParamEntry::Named(..)));
    let mut fields = Vec::new();
    if !any_named {
        for entry in entries {
            match entry {
                ParamEntry::Bare(name) => fields.push(Field {
                    names: Vec::new(),
                    ty: TypeExpr::Ident(name.name),
                    tag: None,
                    variadic: false,
                    span: name.span,
                }),
                ParamEntry::Type(ty, variadic, span) => fields.push(Field {
                    names: Vec::new(),
                    ty,
                    tag: None,
                    variadic,
                    span,
                }),
                ParamEntry::Named(..) => {}
            }
        }
        return fields;
    }

    let mut pending: Vec<SpannedName> = Vec::new();
    for entry in entries {
        match entry {
            ParamEntry::Bare(name) => pending.push(name),
            ParamEntry::Named(name, ty, variadic, span) => {
                let span = pending.first().map_or(span, |first| first.span.merge(span));
                let mut names = std::mem::take(&mut pending);
                names.push(name);
                fields.push(Field {
                    names,
                    ty,
                    tag: None,
                    variadic,
                    span,
                });
            }
            ParamEntry::Type(ty, variadic, span) => fields.push(Field {
                names: Vec::new(),
                ty,
                tag: None,
                variadic,
                span,
            }),
        }
    }
    // Trailing bare names without a type are malformed; keep them as types.
    for name in pending {
        fields.push(Field {
            names: Vec::new(),
            ty: TypeExpr::Ident(name.name),
            tag: None,
            variadic: false,
            span: name.span,
        });
    }
    fields
}
