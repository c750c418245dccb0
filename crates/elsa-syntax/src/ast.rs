use std::fmt;

use serde::Serialize;

use crate::diagnostics::Span;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpannedName {
    pub name: String,
    pub span: Span,
}

/// One parsed compilation unit.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub package: SpannedName,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone)]
pub struct ImportSpec {
    /// Explicit name, including `_` and `.`.
    pub name: Option<SpannedName>,
    pub path: String,
    pub span: Span,
}

/// Grouped declarations are flattened: `var ( a = 1; b = 2 )` yields two `Var` entries.
#[derive(Debug, Clone)]
pub enum Decl {
    Func(FuncDecl),
    Type(TypeSpec),
    Var(ValueSpec),
    Const(ValueSpec),
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub name: SpannedName,
    pub receiver: Option<Field>,
    /// Source text of `[T any, ...]`, kept opaque.
    pub type_params: Option<String>,
    pub params: Vec<Field>,
    pub results: Vec<Field>,
    pub body: Option<Block>,
    pub span: Span,
}

/// A parameter, result or struct field. Embedded fields and unnamed parameters have no names.
#[derive(Debug, Clone)]
pub struct Field {
    pub names: Vec<SpannedName>,
    pub ty: TypeExpr,
    pub tag: Option<String>,
    pub variadic: bool,
    pub span: Span,
}

/// A function body. Statements are not modelled; the body keeps the call expressions that
/// appear in it, in source order, with nested calls reachable through their arguments.
#[derive(Debug, Clone)]
pub struct Block {
    pub calls: Vec<CallExpr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct CallExpr {
    pub func: Box<Expr>,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Ident(SpannedName),
    Selector {
        base: Box<Expr>,
        name: SpannedName,
        span: Span,
    },
    Call(CallExpr),
    Literal {
        text: String,
        span: Span,
    },
    /// Anything else, kept as its source text together with the calls found inside it.
    Other {
        text: String,
        calls: Vec<CallExpr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Ident(name) => name.span,
            Expr::Selector { span, .. }
            | Expr::Literal { span, .. }
            | Expr::Other { span, .. } => *span,
            Expr::Call(call) => call.span,
        }
    }

    /// `alias.Name` when the expression is a selector on a plain identifier.
    pub fn as_qualified_name(&self) -> Option<(&str, &str)> {
        match self {
            Expr::Selector { base, name, .. } => match base.as_ref() {
                Expr::Ident(qualifier) => Some((qualifier.name.as_str(), name.name.as_str())),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Ident(name) => f.write_str(&name.name),
            Expr::Selector { base, name, .. } => write!(f, "{base}.{}", name.name),
            Expr::Call(call) => {
                write!(f, "{}(", call.func)?;
                for (index, arg) in call.args.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Expr::Literal { text, .. } | Expr::Other { text, .. } => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub name: SpannedName,
    pub type_params: Option<String>,
    /// `type A = B`
    pub alias: bool,
    pub body: TypeBody,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeBody {
    Struct(Vec<Field>),
    Expr(TypeExpr),
}

#[derive(Debug, Clone)]
pub struct ValueSpec {
    pub names: Vec<SpannedName>,
    pub ty: Option<TypeExpr>,
    pub values: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

/// A type reference, as written in source or as printed by the type checker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// `Name`
    Ident(String),
    /// `alias.Name`
    Selector { qualifier: String, name: String },
    /// `github.com/acme/db.Name`, only produced from type-checker strings.
    Qualified { path: String, name: String },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array { len: String, elem: Box<TypeExpr> },
    Map { key: Box<TypeExpr>, value: Box<TypeExpr> },
    Chan { dir: ChanDir, elem: Box<TypeExpr> },
    /// Function, interface, struct literal and generic instantiation types.
    Opaque(String),
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Ident(name) => f.write_str(name),
            TypeExpr::Selector { qualifier, name } => write!(f, "{qualifier}.{name}"),
            TypeExpr::Qualified { path, name } => write!(f, "{path}.{name}"),
            TypeExpr::Pointer(inner) => write!(f, "*{inner}"),
            TypeExpr::Slice(elem) => write!(f, "[]{elem}"),
            TypeExpr::Array { len, elem } => write!(f, "[{len}]{elem}"),
            TypeExpr::Map { key, value } => write!(f, "map[{key}]{value}"),
            TypeExpr::Chan { dir, elem } => match dir {
                ChanDir::Both => write!(f, "chan {elem}"),
                ChanDir::Send => write!(f, "chan<- {elem}"),
                ChanDir::Recv => write!(f, "<-chan {elem}"),
            },
            TypeExpr::Opaque(text) => f.write_str(text),
        }
    }
}

impl SourceFile {
    pub fn functions(&self) -> impl Iterator<Item = &FuncDecl> {
        self.decls.iter().filter_map(|decl| match decl {
            Decl::Func(func) => Some(func),
            _ => None,
        })
    }

    pub fn type_specs(&self) -> impl Iterator<Item = &TypeSpec> {
        self.decls.iter().filter_map(|decl| match decl {
            Decl::Type(spec) => Some(spec),
            _ => None,
        })
    }

    pub fn var_specs(&self) -> impl Iterator<Item = &ValueSpec> {
        self.decls.iter().filter_map(|decl| match decl {
            Decl::Var(spec) => Some(spec),
            _ => None,
        })
    }
}
