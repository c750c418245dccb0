use std::path::Path;

use crate::{
    ChanDir, Expr, FileDiagnostic, SourceFile, TokenKind, TypeBody, TypeExpr, lex,
    parse_file, parse_type_string, unquote,
};

fn diag_codes(diags: &[FileDiagnostic]) -> Vec<String> {
    let mut codes: Vec<String> = diags.iter().map(|d| d.diagnostic.code.clone()).collect();
    codes.sort();
    codes
}

fn parse_ok(src: &str) -> SourceFile {
    let (file, diags) = parse_file(Path::new("test.go"), src);
    assert!(
        diags.is_empty(),
        "unexpected diagnostics: {:?}",
        diag_codes(&diags)
    );
    file
}

fn ident(name: &str) -> TypeExpr {
    TypeExpr::Ident(name.to_string())
}

#[test]
fn parses_wiring_function_with_imports() {
    let src = r#"//go:build elsabuild

package app

import (
	"github.com/acme/elsa"
	db "github.com/acme/storage/db"
)

func InitializeApp(cfg *Config) (*App, error) {
	elsa.Generate(AppSet, db.Set)
	return nil, nil
}
"#;
    let file = parse_ok(src);
    assert_eq!(file.package.name, "app");
    assert_eq!(file.imports.len(), 2);
    assert!(file.imports[0].name.is_none());
    assert_eq!(file.imports[0].path, "github.com/acme/elsa");
    assert_eq!(
        file.imports[1].name.as_ref().map(|n| n.name.as_str()),
        Some("db")
    );

    let func = file.functions().next().expect("function");
    assert_eq!(func.name.name, "InitializeApp");
    assert_eq!(func.params.len(), 1);
    assert_eq!(func.params[0].names[0].name, "cfg");
    assert_eq!(func.params[0].ty, TypeExpr::Pointer(Box::new(ident("Config"))));
    let results: Vec<&TypeExpr> = func.results.iter().map(|field| &field.ty).collect();
    assert_eq!(
        results,
        vec![&TypeExpr::Pointer(Box::new(ident("App"))), &ident("error")]
    );

    let body = func.body.as_ref().expect("body");
    assert_eq!(body.calls.len(), 1);
    let call = &body.calls[0];
    assert_eq!(call.func.as_qualified_name(), Some(("elsa", "Generate")));
    assert_eq!(call.args.len(), 2);
    assert!(matches!(&call.args[0], Expr::Ident(name) if name.name == "AppSet"));
    assert_eq!(call.args[1].as_qualified_name(), Some(("db", "Set")));
}

#[test]
fn groups_parameter_names_with_following_type() {
    let file = parse_ok("package p\n\nfunc New(a, b int, c *pkg.T, opts ...Option) {}\n");
    let func = file.functions().next().expect("function");
    assert_eq!(func.params.len(), 3);
    let names: Vec<&str> = func.params[0].names.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(func.params[0].ty, ident("int"));
    assert_eq!(
        func.params[1].ty,
        TypeExpr::Pointer(Box::new(TypeExpr::Selector {
            qualifier: "pkg".to_string(),
            name: "T".to_string(),
        }))
    );
    assert!(func.params[2].variadic);
    assert_eq!(func.params[2].ty, ident("Option"));
    assert!(func.body.as_ref().expect("body").calls.is_empty());
}

#[test]
fn unnamed_parameters_are_types() {
    let file = parse_ok("package p\n\nfunc New(int, string) error { return nil }\n");
    let func = file.functions().next().expect("function");
    let types: Vec<&TypeExpr> = func.params.iter().map(|field| &field.ty).collect();
    assert_eq!(types, vec![&ident("int"), &ident("string")]);
    assert!(func.params.iter().all(|field| field.names.is_empty()));
    assert_eq!(func.results.len(), 1);
}

#[test]
fn parses_struct_fields_with_tags_and_embedding() {
    let src = r#"package app

type App struct {
	DB     *db.Conn `json:"db"`
	Logger Logger
	http.Handler
	a, b int
}
"#;
    let file = parse_ok(src);
    let spec = file.type_specs().next().expect("type spec");
    assert_eq!(spec.name.name, "App");
    assert!(!spec.alias);
    let TypeBody::Struct(fields) = &spec.body else {
        panic!("expected struct body");
    };
    assert_eq!(fields.len(), 4);
    assert_eq!(fields[0].names[0].name, "DB");
    assert_eq!(fields[0].tag.as_deref(), Some("`json:\"db\"`"));
    assert_eq!(fields[1].ty, ident("Logger"));
    assert!(fields[2].names.is_empty());
    assert_eq!(
        fields[2].ty,
        TypeExpr::Selector {
            qualifier: "http".to_string(),
            name: "Handler".to_string(),
        }
    );
    assert_eq!(fields[3].names.len(), 2);
}

#[test]
fn parses_provider_set_variable() {
    let file = parse_ok("package p\n\nvar ProviderSet = elsa.Set(NewDB, NewServer)\n");
    let spec = file.var_specs().next().expect("var spec");
    assert_eq!(spec.names[0].name, "ProviderSet");
    assert!(spec.ty.is_none());
    let Some(Expr::Call(call)) = spec.values.first() else {
        panic!("expected call value");
    };
    assert_eq!(call.func.as_qualified_name(), Some(("elsa", "Set")));
    assert_eq!(call.args.len(), 2);
}

#[test]
fn keeps_type_parameters_opaque() {
    let file = parse_ok("package p\n\nfunc Map[T any](xs []T) []T { return xs }\n");
    let func = file.functions().next().expect("function");
    assert_eq!(func.type_params.as_deref(), Some("[T any]"));
    assert_eq!(func.params[0].ty, TypeExpr::Slice(Box::new(ident("T"))));
    assert_eq!(func.results[0].ty, TypeExpr::Slice(Box::new(ident("T"))));
}

#[test]
fn records_method_receivers() {
    let file = parse_ok("package p\n\nfunc (s *Server) Run() {}\n");
    let func = file.functions().next().expect("function");
    let receiver = func.receiver.as_ref().expect("receiver");
    assert_eq!(receiver.names[0].name, "s");
    assert_eq!(func.name.name, "Run");
}

#[test]
fn non_primary_arguments_become_opaque() {
    let file = parse_ok("package p\n\nfunc f() {\n\tg(x.(T), &App{}, h(c))\n}\n");
    let func = file.functions().next().expect("function");
    let calls = &func.body.as_ref().expect("body").calls;
    assert_eq!(calls.len(), 1);
    let args = &calls[0].args;
    assert!(matches!(&args[0], Expr::Other { text, .. } if text == "x.(T)"));
    assert!(matches!(&args[1], Expr::Other { text, .. } if text == "&App{}"));
    assert!(matches!(&args[2], Expr::Call(inner) if inner.args.len() == 1));
}

#[test]
fn recovers_at_next_declaration() {
    let src = "package p\n\nx := 1\n\nfunc Ok() {}\n";
    let (file, diags) = parse_file(Path::new("test.go"), src);
    assert_eq!(diag_codes(&diags), vec!["E0201".to_string()]);
    let names: Vec<&str> = file.functions().map(|f| f.name.name.as_str()).collect();
    assert_eq!(names, vec!["Ok"]);
}

#[test]
fn missing_package_clause_is_reported() {
    let (_, diags) = parse_file(Path::new("test.go"), "func F() {}\n");
    assert!(diag_codes(&diags).contains(&"E0201".to_string()));
}

#[test]
fn lexer_inserts_semicolons_at_line_ends() {
    let (tokens, diags) = lex("x := f()\ny");
    assert!(diags.is_empty());
    let kinds: Vec<TokenKind> = tokens.iter().map(|tok| tok.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Ident,
            TokenKind::Symbol,
            TokenKind::Ident,
            TokenKind::Symbol,
            TokenKind::Symbol,
            TokenKind::Semicolon,
            TokenKind::Ident,
            TokenKind::Semicolon,
        ]
    );
}

#[test]
fn lexer_reports_unterminated_string() {
    let (_, diags) = lex("x := \"abc\n");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].code, "E0102");
}

#[test]
fn unquotes_string_literals() {
    assert_eq!(unquote("\"a\\tb\""), "a\tb");
    assert_eq!(unquote("`raw`"), "raw");
}

#[test]
fn parses_type_checker_strings() {
    assert_eq!(
        parse_type_string("*github.com/acme/db.Conn"),
        TypeExpr::Pointer(Box::new(TypeExpr::Qualified {
            path: "github.com/acme/db".to_string(),
            name: "Conn".to_string(),
        }))
    );
    assert_eq!(
        parse_type_string("map[string][]int"),
        TypeExpr::Map {
            key: Box::new(ident("string")),
            value: Box::new(TypeExpr::Slice(Box::new(ident("int")))),
        }
    );
    assert_eq!(
        parse_type_string("<-chan error"),
        TypeExpr::Chan {
            dir: ChanDir::Recv,
            elem: Box::new(ident("error")),
        }
    );
    assert!(matches!(parse_type_string("func(int) error"), TypeExpr::Opaque(_)));
    assert_eq!(parse_type_string("error"), ident("error"));
}

#[test]
fn incomplete_type_strings_stay_opaque() {
    for text in ["*", "map[string]", "[]", "<-chan", "[4]", "map[]int"] {
        assert_eq!(
            parse_type_string(text),
            TypeExpr::Opaque(text.trim().to_string()),
            "{text:?}"
        );
    }
    assert_eq!(
        parse_type_string("**a.T"),
        TypeExpr::Pointer(Box::new(TypeExpr::Pointer(Box::new(TypeExpr::Qualified {
            path: "a".to_string(),
            name: "T".to_string(),
        }))))
    );
}

#[test]
fn renders_types_in_go_syntax() {
    let ty = TypeExpr::Map {
        key: Box::new(ident("string")),
        value: Box::new(TypeExpr::Chan {
            dir: ChanDir::Send,
            elem: Box::new(TypeExpr::Pointer(Box::new(ident("Job")))),
        }),
    };
    assert_eq!(ty.to_string(), "map[string]chan<- *Job");
}
