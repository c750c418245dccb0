use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use elsa_syntax::{SourceFile, file_diagnostics_have_errors, parse_file};
use elsa_wire::{ImportTable, PackageNames, Signature, SignatureLoader, TypeResolver, WireError};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::discovery::has_build_tag;
use crate::module::{Requirement, read_module_path, read_requirements};
use crate::toolchain::GoEnv;

type Package = Arc<Vec<SourceFile>>;

/// Reads provider signatures straight from package sources. Packages are looked up in
/// the module, its `vendor` tree, the module cache entry of a required module and the
/// standard library, in that order. Parsed packages and `go.mod` contents are cached for
/// the whole run.
pub struct SourceSignatureLoader {
    build_tag: String,
    go: OnceLock<GoEnv>,
    module_paths: RwLock<FxHashMap<PathBuf, String>>,
    requirements: RwLock<FxHashMap<PathBuf, Arc<Vec<Requirement>>>>,
    packages: RwLock<FxHashMap<PathBuf, Package>>,
}

impl SourceSignatureLoader {
    /// Files carrying `build_tag` are excluded from packages, as the Go build does.
    pub fn new(build_tag: impl Into<String>) -> Self {
        Self {
            build_tag: build_tag.into(),
            go: OnceLock::new(),
            module_paths: RwLock::new(FxHashMap::default()),
            requirements: RwLock::new(FxHashMap::default()),
            packages: RwLock::new(FxHashMap::default()),
        }
    }

    /// Uses `go` instead of detecting the toolchain directories on first use.
    pub fn with_go_env(self, go: GoEnv) -> Self {
        let _ = self.go.set(go);
        self
    }

    fn go(&self) -> &GoEnv {
        self.go.get_or_init(GoEnv::detect)
    }

    pub fn module_path(&self, root: &Path) -> Result<String, crate::ElsaError> {
        if let Some(path) = self.module_paths.read().get(root) {
            return Ok(path.clone());
        }
        let path = read_module_path(root)?;
        self.module_paths
            .write()
            .insert(root.to_path_buf(), path.clone());
        Ok(path)
    }

    /// Package-name lookup for units of the module at `root`.
    pub fn package_names<'a>(&'a self, root: &'a Path) -> ModulePackageNames<'a> {
        ModulePackageNames { loader: self, root }
    }

    fn requirements(&self, root: &Path) -> Arc<Vec<Requirement>> {
        if let Some(requirements) = self.requirements.read().get(root) {
            return Arc::clone(requirements);
        }
        let requirements = match read_requirements(root) {
            Ok(requirements) => Arc::new(requirements),
            Err(err) => {
                tracing::warn!(root = %root.display(), error = %err, "cannot read requirements");
                Arc::new(Vec::new())
            }
        };
        self.requirements
            .write()
            .insert(root.to_path_buf(), Arc::clone(&requirements));
        requirements
    }

    /// Directory holding `package_path`.
    fn package_dir(&self, root: &Path, package_path: &str) -> Option<PathBuf> {
        let module = self.module_path(root).ok()?;
        if package_path == module {
            return Some(root.to_path_buf());
        }
        if let Some(rest) = package_path
            .strip_prefix(module.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
        {
            return Some(root.join(rest));
        }
        let vendored = root.join("vendor").join(package_path);
        if vendored.is_dir() {
            return Some(vendored);
        }
        let go = self.go();
        go.cached_package_dir(&self.requirements(root), package_path)
            .or_else(|| go.std_package_dir(package_path))
    }

    fn package(&self, root: &Path, dir: &Path) -> Result<Package, std::io::Error> {
        if let Some(package) = self.packages.read().get(dir) {
            return Ok(Arc::clone(package));
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| is_package_source(path))
            .collect();
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let source = fs::read_to_string(&path)?;
            if has_build_tag(&source, &self.build_tag) {
                continue;
            }
            let (file, diagnostics) = parse_file(&path, &source);
            if file_diagnostics_have_errors(&diagnostics) {
                if dir.starts_with(root) {
                    tracing::warn!(
                        path = %path.display(),
                        errors = diagnostics.len(),
                        "ignoring package file that does not parse"
                    );
                } else {
                    tracing::debug!(path = %path.display(), "ignoring package file that does not parse");
                }
                continue;
            }
            files.push(file);
        }
        let package = Arc::new(files);
        self.packages
            .write()
            .insert(dir.to_path_buf(), Arc::clone(&package));
        Ok(package)
    }
}

fn is_package_source(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".go") && !name.ends_with("_test.go"))
}

impl SignatureLoader for SourceSignatureLoader {
    fn load_signature(
        &self,
        module_root: &Path,
        package_path: &str,
        function_name: &str,
    ) -> Result<Signature, WireError> {
        let failure = |message: String| WireError::SignatureLoad {
            package: package_path.to_string(),
            function: function_name.to_string(),
            message,
        };
        let dir = self
            .package_dir(module_root, package_path)
            .ok_or_else(|| {
                failure(format!(
                    "package not found under {}, in the module cache or in GOROOT",
                    module_root.display()
                ))
            })?;
        let package = self
            .package(module_root, &dir)
            .map_err(|err| failure(format!("reading {}: {err}", dir.display())))?;

        let names = self.package_names(module_root);
        for file in package.iter() {
            let Some(func) = file
                .functions()
                .find(|func| func.receiver.is_none() && func.name.name == function_name)
            else {
                continue;
            };
            let imports = ImportTable::build(&file.imports, &names);
            let resolver = TypeResolver::new(&imports, package_path);

            let mut params = Vec::new();
            for field in &func.params {
                let ty = if field.variadic {
                    resolver.resolve_variadic(&field.ty)
                } else {
                    resolver.resolve(&field.ty)
                };
                for _ in 0..field.names.len().max(1) {
                    params.push(ty.canonical());
                }
            }
            let mut results = Vec::new();
            for field in &func.results {
                let ty = resolver.resolve(&field.ty).canonical();
                for _ in 0..field.names.len().max(1) {
                    results.push(ty.clone());
                }
            }
            return Ok(Signature { params, results });
        }
        Err(failure(format!("no function {function_name} in {}", dir.display())))
    }
}

/// Resolves package names by reading the `package` clause of sources in one module.
pub struct ModulePackageNames<'a> {
    loader: &'a SourceSignatureLoader,
    root: &'a Path,
}

impl PackageNames for ModulePackageNames<'_> {
    fn name_of(&self, package_path: &str) -> Option<String> {
        let dir = self.loader.package_dir(self.root, package_path)?;
        let package = self.loader.package(self.root, &dir).ok()?;
        package.first().map(|file| file.package.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ROOT_MARKER;

    fn module() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path();
        for (path, contents) in [
            (ROOT_MARKER, "module example.com/shop\n\ngo 1.22\n"),
            (
                "store/store.go",
                "package store\n\nimport (\n\t\"context\"\n\n\tdb \"example.com/shop/internal/database\"\n)\n\ntype Store struct{}\n\nfunc NewStore(ctx context.Context, conn *db.Conn, names ...string) (*Store, error) {\n\treturn &Store{}, nil\n}\n\nfunc (s *Store) NewStore() {}\n",
            ),
            (
                "store/wire.go",
                "//go:build elsabuild\n\npackage store\n\nfunc Hidden() int { return 0 }\n",
            ),
            (
                "internal/database/conn.go",
                "package database\n\ntype Conn struct{}\n\nfunc Open() (a, b *Conn) { return nil, nil }\n",
            ),
            (
                "vendor/github.com/acme/clock/clock.go",
                "package clockwork\n\ntype Clock interface{}\n",
            ),
        ] {
            let full = root.join(path);
            fs::create_dir_all(full.parent().expect("parent")).expect("mkdir");
            fs::write(full, contents).expect("write");
        }
        tmp
    }

    #[test]
    fn loads_signatures_in_type_checker_notation() {
        let tmp = module();
        let loader = SourceSignatureLoader::new("elsabuild").with_go_env(GoEnv::default());
        let signature = loader
            .load_signature(tmp.path(), "example.com/shop/store", "NewStore")
            .expect("signature");
        assert_eq!(
            signature.params,
            vec![
                "context.Context",
                "*example.com/shop/internal/database.Conn",
                "[]string"
            ]
        );
        assert_eq!(
            signature.results,
            vec!["*example.com/shop/store.Store", "error"]
        );

        let grouped = loader
            .load_signature(tmp.path(), "example.com/shop/internal/database", "Open")
            .expect("signature");
        assert_eq!(grouped.results.len(), 2);
    }

    #[test]
    fn tagged_files_and_missing_functions_are_not_found() {
        let tmp = module();
        let loader = SourceSignatureLoader::new("elsabuild").with_go_env(GoEnv::default());
        let err = loader
            .load_signature(tmp.path(), "example.com/shop/store", "Hidden")
            .expect_err("excluded by build tag");
        assert!(matches!(err, WireError::SignatureLoad { .. }));
        let err = loader
            .load_signature(tmp.path(), "github.com/unknown/pkg", "New")
            .expect_err("outside module");
        assert!(err.to_string().contains("package not found"));
    }

    #[test]
    fn packages_outside_the_module_come_from_the_toolchain() {
        let tmp = module();
        let cache = tempfile::tempdir().expect("tempdir");
        let goroot = tempfile::tempdir().expect("tempdir");
        fs::write(
            tmp.path().join(ROOT_MARKER),
            "module example.com/shop\n\ngo 1.22\n\nrequire github.com/Acme/log v1.4.0\n",
        )
        .expect("write");
        for (dir, path, contents) in [
            (
                cache.path(),
                "github.com/!acme/log@v1.4.0/sink/sink.go",
                "package sink\n\nimport \"io\"\n\ntype Sink struct{}\n\nfunc NewSink(w io.Writer) *Sink { return &Sink{} }\n",
            ),
            (
                goroot.path(),
                "src/net/http/server.go",
                "package http\n\ntype ServeMux struct{}\n\nfunc NewServeMux() *ServeMux { return &ServeMux{} }\n",
            ),
            (
                goroot.path(),
                "src/net/http/server_windows.go",
                "package http\n\nfunc broken( {\n",
            ),
        ] {
            let full = dir.join(path);
            fs::create_dir_all(full.parent().expect("parent")).expect("mkdir");
            fs::write(full, contents).expect("write");
        }
        let loader = SourceSignatureLoader::new("elsabuild").with_go_env(GoEnv {
            goroot: Some(goroot.path().to_path_buf()),
            mod_cache: Some(cache.path().to_path_buf()),
        });

        let sink = loader
            .load_signature(tmp.path(), "github.com/Acme/log/sink", "NewSink")
            .expect("cached module");
        assert_eq!(sink.params, vec!["io.Writer"]);
        assert_eq!(sink.results, vec!["*github.com/Acme/log/sink.Sink"]);

        let mux = loader
            .load_signature(tmp.path(), "net/http", "NewServeMux")
            .expect("standard library");
        assert_eq!(mux.results, vec!["*net/http.ServeMux"]);
        assert_eq!(
            loader.package_names(tmp.path()).name_of("net/http").as_deref(),
            Some("http")
        );
    }

    #[test]
    fn package_names_come_from_package_clauses() {
        let tmp = module();
        let loader = SourceSignatureLoader::new("elsabuild").with_go_env(GoEnv::default());
        let names = loader.package_names(tmp.path());
        assert_eq!(
            names.name_of("github.com/acme/clock").as_deref(),
            Some("clockwork")
        );
        assert_eq!(
            names.name_of("example.com/shop/internal/database").as_deref(),
            Some("database")
        );
        assert_eq!(names.name_of("net/http"), None);
    }
}
