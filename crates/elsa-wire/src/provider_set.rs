use std::fmt;
use std::path::{Path, PathBuf};

use elsa_syntax::{Expr, SourceFile, Span};
use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::WireError;
use crate::extract::Markers;
use crate::imports::ImportTable;
use crate::types::{TypeDescriptor, TypeResolver};

/// Parameter and result types of a function, in type-checker notation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    pub params: Vec<String>,
    pub results: Vec<String>,
}

/// Looks up the signature of a package-level function.
pub trait SignatureLoader: Send + Sync {
    fn load_signature(
        &self,
        module_root: &Path,
        package_path: &str,
        function_name: &str,
    ) -> Result<Signature, WireError>;
}

/// Memoizes successful lookups of another loader.
pub struct CachedSignatureLoader<L> {
    inner: L,
    cache: RwLock<FxHashMap<(PathBuf, String, String), Signature>>,
}

impl<L: SignatureLoader> CachedSignatureLoader<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }
}

impl<L: SignatureLoader> SignatureLoader for CachedSignatureLoader<L> {
    fn load_signature(
        &self,
        module_root: &Path,
        package_path: &str,
        function_name: &str,
    ) -> Result<Signature, WireError> {
        let key = (
            module_root.to_path_buf(),
            package_path.to_string(),
            function_name.to_string(),
        );
        if let Some(signature) = self.cache.read().get(&key) {
            return Ok(signature.clone());
        }
        let signature = self
            .inner
            .load_signature(module_root, package_path, function_name)?;
        self.cache.write().insert(key, signature.clone());
        Ok(signature)
    }
}

/// A provider reference as written in a set, before its signature is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderRef {
    pub function_name: String,
    /// Empty for providers declared in the unit's own package.
    pub package_alias: String,
    pub package_path: String,
}

impl fmt::Display for ProviderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.package_alias.is_empty() {
            f.write_str(&self.function_name)
        } else {
            write!(f, "{}.{}", self.package_alias, self.function_name)
        }
    }
}

/// A `var X = marker.Set(...)` declaration.
#[derive(Debug, Clone, Serialize)]
pub struct SetDecl {
    pub name: String,
    pub providers: Vec<ProviderRef>,
    #[serde(skip)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provider {
    pub function_name: String,
    pub package_alias: String,
    pub package_path: String,
    pub params: Vec<TypeDescriptor>,
    pub results: Vec<TypeDescriptor>,
}

impl Provider {
    pub fn is_local(&self) -> bool {
        self.package_alias.is_empty()
    }

    /// True when the last result is `error`.
    pub fn returns_error(&self) -> bool {
        self.results.last().is_some_and(TypeDescriptor::is_error)
    }

    /// Results that become bindings; a trailing `error` is checked instead.
    pub fn bound_results(&self) -> &[TypeDescriptor] {
        if self.returns_error() {
            &self.results[..self.results.len() - 1]
        } else {
            &self.results
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.package_alias.is_empty() {
            f.write_str(&self.function_name)
        } else {
            write!(f, "{}.{}", self.package_alias, self.function_name)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderSet {
    pub name: String,
    pub providers: Vec<Provider>,
}

/// Loaded sets of one unit, keyed by variable name in declaration order.
pub type ProviderSets = IndexMap<String, ProviderSet>;

/// Finds every set declaration in `file` and turns its arguments into provider
/// references. Bare identifiers refer to functions of the unit's own package.
pub fn find_set_declarations(
    file: &SourceFile,
    imports: &ImportTable,
    local_package: &str,
    markers: &Markers,
) -> Result<Vec<SetDecl>, WireError> {
    let mut decls = Vec::new();
    for spec in file.var_specs() {
        for (name, value) in spec.names.iter().zip(&spec.values) {
            let Expr::Call(call) = value else {
                continue;
            };
            if !markers.is_set(call) {
                continue;
            }
            let mut providers = Vec::new();
            for arg in &call.args {
                match arg {
                    Expr::Ident(function) => providers.push(ProviderRef {
                        function_name: function.name.clone(),
                        package_alias: String::new(),
                        package_path: local_package.to_string(),
                    }),
                    _ => match arg.as_qualified_name() {
                        Some((alias, function)) => {
                            let path = imports.path_of(alias).ok_or_else(|| {
                                WireError::UnknownAlias {
                                    set: name.name.clone(),
                                    alias: alias.to_string(),
                                }
                            })?;
                            providers.push(ProviderRef {
                                function_name: function.to_string(),
                                package_alias: alias.to_string(),
                                package_path: path.to_string(),
                            });
                        }
                        None => tracing::warn!(
                            set = %name.name,
                            argument = %arg,
                            "ignoring provider set argument that is not a function reference"
                        ),
                    },
                }
            }
            decls.push(SetDecl {
                name: name.name.clone(),
                providers,
                span: spec.span,
            });
        }
    }
    Ok(decls)
}

/// Loads the signatures of every provider in the sets accepted by `wanted`.
pub fn load_provider_sets(
    decls: &[SetDecl],
    resolver: &TypeResolver<'_>,
    module_root: &Path,
    loader: &dyn SignatureLoader,
    wanted: impl Fn(&str) -> bool,
) -> Result<ProviderSets, WireError> {
    let mut sets = ProviderSets::new();
    for decl in decls.iter().filter(|decl| wanted(&decl.name)) {
        let mut providers = Vec::with_capacity(decl.providers.len());
        for stub in &decl.providers {
            let signature =
                loader.load_signature(module_root, &stub.package_path, &stub.function_name)?;
            tracing::debug!(set = %decl.name, provider = %stub, "loaded provider signature");
            providers.push(Provider {
                function_name: stub.function_name.clone(),
                package_alias: stub.package_alias.clone(),
                package_path: stub.package_path.clone(),
                params: signature
                    .params
                    .iter()
                    .map(|ty| resolver.resolve_string(ty))
                    .collect(),
                results: signature
                    .results
                    .iter()
                    .map(|ty| resolver.resolve_string(ty))
                    .collect(),
            });
        }
        sets.insert(
            decl.name.clone(),
            ProviderSet {
                name: decl.name.clone(),
                providers,
            },
        );
    }
    Ok(sets)
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use elsa_syntax::parse_file;

    use super::*;
    use crate::imports::NoPackageNames;

    struct Counting {
        calls: AtomicUsize,
    }

    impl SignatureLoader for Counting {
        fn load_signature(
            &self,
            _module_root: &Path,
            package_path: &str,
            function_name: &str,
        ) -> Result<Signature, WireError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if function_name == "Missing" {
                return Err(WireError::SignatureLoad {
                    package: package_path.to_string(),
                    function: function_name.to_string(),
                    message: "function not found".to_string(),
                });
            }
            Ok(Signature {
                params: vec!["*github.com/acme/db.Database".to_string()],
                results: vec![format!("{package_path}.Repository"), "error".to_string()],
            })
        }
    }

    const SOURCE: &str = r#"package app

import (
	"github.com/acme/elsa"
	repo "github.com/acme/repository"
)

var RepoSet = elsa.Set(repo.NewRepository, NewLocal)

var Other, Plain = elsa.Set(Missing), 42
"#;

    #[test]
    fn parses_set_declarations() {
        let (file, diags) = parse_file(Path::new("wire.go"), SOURCE);
        assert!(diags.is_empty(), "{diags:?}");
        let imports = ImportTable::build(&file.imports, &NoPackageNames);
        let decls =
            find_set_declarations(&file, &imports, "example.com/app", &Markers::default())
                .expect("sets");
        let names: Vec<&str> = decls.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["RepoSet", "Other"]);
        assert_eq!(
            decls[0].providers,
            vec![
                ProviderRef {
                    function_name: "NewRepository".to_string(),
                    package_alias: "repo".to_string(),
                    package_path: "github.com/acme/repository".to_string(),
                },
                ProviderRef {
                    function_name: "NewLocal".to_string(),
                    package_alias: String::new(),
                    package_path: "example.com/app".to_string(),
                },
            ]
        );
    }

    #[test]
    fn unknown_alias_is_an_authoring_error() {
        let (file, _) = parse_file(
            Path::new("wire.go"),
            "package app\n\nimport \"github.com/acme/elsa\"\n\nvar S = elsa.Set(nope.New)\n",
        );
        let imports = ImportTable::build(&file.imports, &NoPackageNames);
        let err = find_set_declarations(&file, &imports, "example.com/app", &Markers::default())
            .expect_err("unknown alias");
        assert!(matches!(err, WireError::UnknownAlias { ref alias, .. } if alias == "nope"));
    }

    #[test]
    fn loads_only_wanted_sets_and_caches_signatures() {
        let (file, _) = parse_file(Path::new("wire.go"), SOURCE);
        let imports = ImportTable::build(&file.imports, &NoPackageNames);
        let resolver = TypeResolver::new(&imports, "example.com/app");
        let decls =
            find_set_declarations(&file, &imports, "example.com/app", &Markers::default())
                .expect("sets");
        let loader = CachedSignatureLoader::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let root = Path::new("/work");
        for _ in 0..2 {
            let sets = load_provider_sets(&decls, &resolver, root, &loader, |name| name == "RepoSet")
                .expect("load");
            assert_eq!(sets.len(), 1);
            let provider = &sets["RepoSet"].providers[0];
            assert_eq!(provider.params[0].key(), "github.com/acme/db.Database");
            assert!(provider.returns_error());
            assert_eq!(provider.bound_results().len(), 1);
            assert_eq!(provider.bound_results()[0].key(), "github.com/acme/repository.Repository");
        }
        assert_eq!(loader.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(loader.cached_len(), 2);

        let err = load_provider_sets(&decls, &resolver, root, &loader, |name| name == "Other")
            .expect_err("missing provider");
        assert_eq!(err.kind(), crate::error::ErrorKind::SignatureLoad);
    }
}
