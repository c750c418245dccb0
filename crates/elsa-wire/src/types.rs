use elsa_syntax::syntax::is_builtin_type;
use elsa_syntax::{ChanDir, TypeExpr};
use serde::Serialize;

use crate::imports::{ImportTable, derive_alias};

/// A normalized type reference. Two descriptors denote the same type when their
/// [`key`](TypeDescriptor::key)s are equal; `use_pointer` only drives adaptation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDescriptor {
    /// Import path of the declaring package; empty for builtins and composites.
    pub module_path: String,
    /// Bare name, or the canonical spelling of a composite type.
    pub type_name: String,
    pub use_pointer: bool,
    /// Qualifier the type was written with, or the derived one.
    pub alias: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param_name: Option<String>,
    #[serde(skip)]
    pub composite: Option<CompositeType>,
}

/// Structure behind a composite descriptor. Elements carry their own pointer flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositeType {
    /// A pointer value under the outermost pointer flag, as in `**T`. The inner
    /// descriptor always has `use_pointer` set.
    Pointer(Box<TypeDescriptor>),
    Slice(Box<TypeDescriptor>),
    Array {
        len: String,
        elem: Box<TypeDescriptor>,
    },
    Map {
        key: Box<TypeDescriptor>,
        value: Box<TypeDescriptor>,
    },
    Chan {
        dir: ChanDir,
        elem: Box<TypeDescriptor>,
    },
    Opaque(String),
}

/// Supplies the package qualifier used when rendering a type into generated code.
pub trait Qualifier {
    /// `None` renders the name unqualified.
    fn qualify(&mut self, module_path: &str) -> Option<String>;
}

impl TypeDescriptor {
    pub fn builtin(name: &str) -> Self {
        Self {
            module_path: String::new(),
            type_name: name.to_string(),
            use_pointer: false,
            alias: String::new(),
            param_name: None,
            composite: None,
        }
    }

    pub fn named(module_path: &str, type_name: &str, alias: &str) -> Self {
        Self {
            module_path: module_path.to_string(),
            type_name: type_name.to_string(),
            use_pointer: false,
            alias: alias.to_string(),
            param_name: None,
            composite: None,
        }
    }

    fn from_composite(composite: CompositeType) -> Self {
        let mut descriptor = Self::builtin("");
        descriptor.composite = Some(composite);
        descriptor.type_name = descriptor.canonical_value();
        descriptor
    }

    pub fn pointer(mut self) -> Self {
        if self.use_pointer {
            return Self::from_composite(CompositeType::Pointer(Box::new(self))).pointer();
        }
        self.use_pointer = true;
        self
    }

    pub fn with_param_name(mut self, name: impl Into<String>) -> Self {
        self.param_name = Some(name.into());
        self
    }

    /// Identity used for matching providers to bindings.
    pub fn key(&self) -> String {
        format!("{}.{}", self.module_path, self.type_name)
    }

    pub fn is_builtin(&self) -> bool {
        self.module_path.is_empty() && self.composite.is_none()
    }

    pub fn is_error(&self) -> bool {
        self.is_builtin() && !self.use_pointer && self.type_name == "error"
    }

    /// Fully qualified spelling in type-checker notation, pointer included.
    pub fn canonical(&self) -> String {
        let value = self.canonical_value();
        if self.use_pointer {
            format!("*{value}")
        } else {
            value
        }
    }

    fn canonical_value(&self) -> String {
        match &self.composite {
            Some(composite) => match composite {
                CompositeType::Pointer(inner) => inner.canonical(),
                CompositeType::Slice(elem) => format!("[]{}", elem.canonical()),
                CompositeType::Array { len, elem } => format!("[{len}]{}", elem.canonical()),
                CompositeType::Map { key, value } => {
                    format!("map[{}]{}", key.canonical(), value.canonical())
                }
                CompositeType::Chan { dir, elem } => chan_text(*dir, &elem.canonical()),
                CompositeType::Opaque(text) => text.clone(),
            },
            None if self.module_path.is_empty() => self.type_name.clone(),
            None => format!("{}.{}", self.module_path, self.type_name),
        }
    }

    /// Source spelling with qualifiers chosen by `qualifier`, pointer included.
    pub fn render(&self, qualifier: &mut dyn Qualifier) -> String {
        let value = self.render_value(qualifier);
        if self.use_pointer {
            format!("*{value}")
        } else {
            value
        }
    }

    /// Source spelling without the outermost pointer.
    pub fn render_value(&self, qualifier: &mut dyn Qualifier) -> String {
        match &self.composite {
            Some(composite) => match composite {
                CompositeType::Pointer(inner) => inner.render(qualifier),
                CompositeType::Slice(elem) => format!("[]{}", elem.render(qualifier)),
                CompositeType::Array { len, elem } => {
                    format!("[{len}]{}", elem.render(qualifier))
                }
                CompositeType::Map { key, value } => {
                    format!("map[{}]{}", key.render(qualifier), value.render(qualifier))
                }
                CompositeType::Chan { dir, elem } => chan_text(*dir, &elem.render(qualifier)),
                CompositeType::Opaque(text) => text.clone(),
            },
            None if self.module_path.is_empty() => self.type_name.clone(),
            None => match qualifier.qualify(&self.module_path) {
                Some(alias) => format!("{alias}.{}", self.type_name),
                None => self.type_name.clone(),
            },
        }
    }

    /// Every named descriptor reachable from this one, outermost first.
    pub fn named_parts(&self) -> Vec<&TypeDescriptor> {
        let mut out = Vec::new();
        self.collect_named(&mut out);
        out
    }

    fn collect_named<'a>(&'a self, out: &mut Vec<&'a TypeDescriptor>) {
        match &self.composite {
            None => {
                if !self.module_path.is_empty() {
                    out.push(self);
                }
            }
            Some(CompositeType::Pointer(inner))
            | Some(CompositeType::Slice(inner))
            | Some(CompositeType::Array { elem: inner, .. })
            | Some(CompositeType::Chan { elem: inner, .. }) => inner.collect_named(out),
            Some(CompositeType::Map { key, value }) => {
                key.collect_named(out);
                value.collect_named(out);
            }
            Some(CompositeType::Opaque(_)) => {}
        }
    }
}

fn chan_text(dir: ChanDir, elem: &str) -> String {
    match dir {
        ChanDir::Both => format!("chan {elem}"),
        ChanDir::Send => format!("chan<- {elem}"),
        ChanDir::Recv => format!("<-chan {elem}"),
    }
}

/// Resolves type expressions against one unit's imports. Unqualified names that are
/// neither builtins nor import aliases belong to `local_package`.
pub struct TypeResolver<'a> {
    imports: &'a ImportTable,
    local_package: &'a str,
}

impl<'a> TypeResolver<'a> {
    pub fn new(imports: &'a ImportTable, local_package: &'a str) -> Self {
        Self {
            imports,
            local_package,
        }
    }

    pub fn local_package(&self) -> &str {
        self.local_package
    }

    pub fn resolve(&self, expr: &TypeExpr) -> TypeDescriptor {
        match expr {
            TypeExpr::Ident(name) if is_builtin_type(name) => TypeDescriptor::builtin(name),
            TypeExpr::Ident(name) => match self.imports.path_of(name) {
                Some(path) => TypeDescriptor::named(path, name, name),
                None => TypeDescriptor::named(self.local_package, name, ""),
            },
            TypeExpr::Selector { qualifier, name } => match self.imports.path_of(qualifier) {
                Some(path) => TypeDescriptor::named(path, name, qualifier),
                None => TypeDescriptor::named(qualifier, name, qualifier),
            },
            TypeExpr::Qualified { path, name } => {
                if path == self.local_package {
                    return TypeDescriptor::named(path, name, "");
                }
                let alias = self
                    .imports
                    .alias_of(path)
                    .map_or_else(|| derive_alias(path), str::to_string);
                TypeDescriptor::named(path, name, &alias)
            }
            TypeExpr::Pointer(inner) => self.resolve(inner).pointer(),
            TypeExpr::Slice(elem) => {
                TypeDescriptor::from_composite(CompositeType::Slice(Box::new(self.resolve(elem))))
            }
            TypeExpr::Array { len, elem } => TypeDescriptor::from_composite(CompositeType::Array {
                len: len.clone(),
                elem: Box::new(self.resolve(elem)),
            }),
            TypeExpr::Map { key, value } => TypeDescriptor::from_composite(CompositeType::Map {
                key: Box::new(self.resolve(key)),
                value: Box::new(self.resolve(value)),
            }),
            TypeExpr::Chan { dir, elem } => TypeDescriptor::from_composite(CompositeType::Chan {
                dir: *dir,
                elem: Box::new(self.resolve(elem)),
            }),
            TypeExpr::Opaque(text) => {
                TypeDescriptor::from_composite(CompositeType::Opaque(text.clone()))
            }
        }
    }

    /// Resolves a type-checker string as returned by a signature loader.
    pub fn resolve_string(&self, text: &str) -> TypeDescriptor {
        self.resolve(&elsa_syntax::parse_type_string(text))
    }

    /// Resolves a variadic `...T` parameter, which has type `[]T`.
    pub fn resolve_variadic(&self, elem: &TypeExpr) -> TypeDescriptor {
        TypeDescriptor::from_composite(CompositeType::Slice(Box::new(self.resolve(elem))))
    }
}

#[cfg(test)]
mod tests {
    use elsa_syntax::{ImportSpec, Span, SpannedName};

    use super::*;
    use crate::imports::NoPackageNames;

    const LOCAL: &str = "example.com/app";

    fn table() -> ImportTable {
        let spec = ImportSpec {
            name: Some(SpannedName {
                name: "store".to_string(),
                span: Span::default(),
            }),
            path: "github.com/acme/db".to_string(),
            span: Span::default(),
        };
        ImportTable::build(&[spec], &NoPackageNames)
    }

    fn selector(qualifier: &str, name: &str) -> TypeExpr {
        TypeExpr::Selector {
            qualifier: qualifier.to_string(),
            name: name.to_string(),
        }
    }

    struct Aliases;

    impl Qualifier for Aliases {
        fn qualify(&mut self, module_path: &str) -> Option<String> {
            (module_path != LOCAL).then(|| derive_alias(module_path))
        }
    }

    #[test]
    fn source_and_loader_spellings_share_identity() {
        let imports = table();
        let resolver = TypeResolver::new(&imports, LOCAL);
        let from_source =
            resolver.resolve(&TypeExpr::Pointer(Box::new(selector("store", "Database"))));
        let from_loader = resolver.resolve_string("github.com/acme/db.Database");
        assert_eq!(from_source.key(), from_loader.key());
        assert!(from_source.use_pointer);
        assert!(!from_loader.use_pointer);
        assert_eq!(from_source.alias, "store");
        assert_eq!(from_loader.alias, "store");
    }

    #[test]
    fn local_names_are_qualified_with_the_unit_package() {
        let imports = table();
        let resolver = TypeResolver::new(&imports, LOCAL);
        let local = resolver.resolve(&TypeExpr::Ident("Config".to_string()));
        assert_eq!(local.key(), "example.com/app.Config");
        assert_eq!(local.key(), resolver.resolve_string("example.com/app.Config").key());
        let builtin = resolver.resolve(&TypeExpr::Ident("error".to_string()));
        assert!(builtin.is_error());
        assert_eq!(builtin.key(), ".error");
    }

    #[test]
    fn composites_are_identified_by_canonical_text() {
        let imports = table();
        let resolver = TypeResolver::new(&imports, LOCAL);
        let slice = resolver.resolve(&TypeExpr::Slice(Box::new(TypeExpr::Pointer(Box::new(
            selector("store", "Conn"),
        )))));
        assert_eq!(slice.type_name, "[]*github.com/acme/db.Conn");
        assert_eq!(slice.key(), resolver.resolve_string("[]*github.com/acme/db.Conn").key());
        assert_eq!(slice.render(&mut Aliases), "[]*db.Conn");
    }

    #[test]
    fn renders_local_types_unqualified() {
        let imports = table();
        let resolver = TypeResolver::new(&imports, LOCAL);
        let ty = resolver.resolve_string("*example.com/app.Service");
        assert_eq!(ty.render(&mut Aliases), "*Service");
        assert_eq!(ty.render_value(&mut Aliases), "Service");
    }
}
