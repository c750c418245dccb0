use std::path::{Path, PathBuf};

use elsa_syntax::SourceFile;
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::emit::{AliasAllocator, EmitContext, GeneratedFile, emit_unit};
use crate::error::WireError;
use crate::extract::{Markers, WiringFunction, extract_wiring_functions};
use crate::imports::{ImportTable, PackageNames};
use crate::provider_set::{SetDecl, SignatureLoader, find_set_declarations, load_provider_sets};
use crate::resolve::resolve_function;
use crate::types::TypeResolver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    pub markers: Markers,
    /// Build tag that opts a file into generation; the output is built with `!tag`.
    pub build_tag: String,
    pub output_file: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            markers: Markers::default(),
            build_tag: "elsabuild".to_string(),
            output_file: "elsa_gen.go".to_string(),
        }
    }
}

/// One parsed compilation unit and where it lives.
pub struct Unit<'a> {
    pub source: &'a SourceFile,
    pub path: &'a Path,
    pub module_root: &'a Path,
    /// Import path of the unit's own package.
    pub package_path: &'a str,
}

impl Unit<'_> {
    pub fn target_path(&self, options: &GenerateOptions) -> PathBuf {
        self.path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&options.output_file)
    }
}

/// Runs extraction, set loading, resolution and emission for one unit. Returns `None`
/// when the unit has no wiring function.
pub fn generate_unit(
    unit: &Unit<'_>,
    options: &GenerateOptions,
    loader: &dyn SignatureLoader,
    names: &dyn PackageNames,
) -> Result<Option<GeneratedFile>, WireError> {
    let imports = ImportTable::build(&unit.source.imports, names);
    let resolver = TypeResolver::new(&imports, unit.package_path);
    let functions = extract_wiring_functions(unit.source, &resolver, &options.markers);
    if functions.is_empty() {
        tracing::debug!(path = %unit.path.display(), "no wiring functions");
        return Ok(None);
    }
    let marker_path =
        imports
            .path_of(&options.markers.package)
            .ok_or_else(|| WireError::MarkerImportMissing {
                marker: options.markers.package.clone(),
            })?;

    let decls = find_set_declarations(
        unit.source,
        &imports,
        unit.package_path,
        &options.markers,
    )?;
    let referenced: FxHashSet<&str> = functions
        .iter()
        .flat_map(|func| func.referenced_sets.iter().map(String::as_str))
        .collect();
    let sets = load_provider_sets(&decls, &resolver, unit.module_root, loader, |name| {
        referenced.contains(name)
    })?;

    let mut aliases = AliasAllocator::new(unit.package_path);
    aliases.register(marker_path, &options.markers.package);
    for func in &functions {
        register_function(&mut aliases, func);
    }
    for set in sets.values() {
        for provider in &set.providers {
            if !provider.is_local() {
                aliases.register(&provider.package_path, &provider.package_alias);
            }
            for ty in provider.params.iter().chain(&provider.results) {
                aliases.register_type(ty);
            }
        }
    }

    let mut reserved: FxHashSet<String> = imports.aliases().map(str::to_string).collect();
    reserved.extend(aliases.aliases().map(str::to_string));
    reserved.insert(options.markers.package.clone());

    let mut resolved = Vec::with_capacity(functions.len());
    for func in functions {
        let plan = resolve_function(&func, &sets, &reserved)?;
        tracing::debug!(function = %func.name, steps = plan.steps.len(), "resolved wiring function");
        resolved.push((func, plan));
    }

    let ctx = EmitContext {
        target_path: unit.target_path(options),
        package_name: &unit.source.package.name,
        build_tag: &options.build_tag,
        markers: &options.markers,
        marker_path,
    };
    emit_unit(ctx, aliases, &resolved).map(Some)
}

fn register_function(aliases: &mut AliasAllocator, func: &WiringFunction) {
    for param in &func.params {
        aliases.register_type(&param.ty);
    }
    for result in &func.results {
        aliases.register_type(&result.ty);
        if let Some(aggregate) = &result.aggregate {
            for field in &aggregate.fields {
                aliases.register_type(&field.ty);
            }
        }
    }
}

/// What a unit declares, without loading any provider signatures.
#[derive(Debug, Clone, Serialize)]
pub struct UnitSummary {
    pub path: PathBuf,
    pub package: String,
    pub package_path: String,
    pub imports: Vec<(String, String)>,
    pub functions: Vec<WiringFunction>,
    pub sets: Vec<SetDecl>,
}

pub fn inspect_unit(
    unit: &Unit<'_>,
    options: &GenerateOptions,
    names: &dyn PackageNames,
) -> Result<UnitSummary, WireError> {
    let imports = ImportTable::build(&unit.source.imports, names);
    let resolver = TypeResolver::new(&imports, unit.package_path);
    let functions = extract_wiring_functions(unit.source, &resolver, &options.markers);
    let sets = find_set_declarations(unit.source, &imports, unit.package_path, &options.markers)?;
    Ok(UnitSummary {
        path: unit.path.to_path_buf(),
        package: unit.source.package.name.clone(),
        package_path: unit.package_path.to_string(),
        imports: imports
            .iter()
            .map(|(alias, path)| (alias.to_string(), path.to_string()))
            .collect(),
        functions,
        sets,
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use elsa_syntax::parse_file;
    use rustc_hash::FxHashMap;

    use super::*;
    use crate::imports::NoPackageNames;
    use crate::provider_set::Signature;

    #[derive(Default)]
    struct StaticLoader {
        signatures: FxHashMap<(String, String), Signature>,
    }

    impl StaticLoader {
        fn with(mut self, package: &str, function: &str, params: &[&str], results: &[&str]) -> Self {
            self.signatures.insert(
                (package.to_string(), function.to_string()),
                Signature {
                    params: params.iter().map(|p| p.to_string()).collect(),
                    results: results.iter().map(|r| r.to_string()).collect(),
                },
            );
            self
        }
    }

    impl SignatureLoader for StaticLoader {
        fn load_signature(
            &self,
            _module_root: &Path,
            package_path: &str,
            function_name: &str,
        ) -> Result<Signature, WireError> {
            self.signatures
                .get(&(package_path.to_string(), function_name.to_string()))
                .cloned()
                .ok_or_else(|| WireError::SignatureLoad {
                    package: package_path.to_string(),
                    function: function_name.to_string(),
                    message: "function not found".to_string(),
                })
        }
    }

    const HEADER: &str = r#"//go:build elsabuild

package app

import (
	"github.com/acme/elsa"
	"example.com/app/db"
	"example.com/app/repo"
)

var RepoSet = elsa.Set(repo.NewRepository)
"#;

    fn repository_loader() -> StaticLoader {
        StaticLoader::default().with(
            "example.com/app/repo",
            "NewRepository",
            &["example.com/app/db.Database"],
            &["example.com/app/repo.Repository"],
        )
    }

    fn generate(body: &str, loader: &StaticLoader) -> Result<Option<GeneratedFile>, WireError> {
        let source = format!("{HEADER}\n{body}");
        let (file, diags) = parse_file(Path::new("/work/app/wire.go"), &source);
        assert!(diags.is_empty(), "{diags:?}");
        let unit = Unit {
            source: &file,
            path: Path::new("/work/app/wire.go"),
            module_root: Path::new("/work"),
            package_path: "example.com/app",
        };
        generate_unit(&unit, &GenerateOptions::default(), loader, &NoPackageNames)
    }

    #[test]
    fn single_provider_plan_keeps_the_signature() {
        let file = generate(
            "func InitRepository(database *db.Database) repo.Repository {\n\telsa.Generate(RepoSet)\n\treturn nil\n}\n",
            &repository_loader(),
        )
        .expect("generate")
        .expect("file");
        assert_eq!(file.target_path, Path::new("/work/app/elsa_gen.go"));
        assert_eq!(
            file.functions,
            vec![
                "func InitRepository(database *db.Database) repo.Repository {\n\trepository := repo.NewRepository(*database)\n\telsa.Generate(repository)\n\treturn repository\n}"
                    .to_string()
            ]
        );
        let paths: Vec<&str> = file.imports.keys().map(String::as_str).collect();
        assert_eq!(
            paths,
            vec!["example.com/app/db", "example.com/app/repo", "github.com/acme/elsa"]
        );
    }

    #[test]
    fn aggregate_result_is_constructed_and_redeclared() {
        let file = generate(
            "type Service struct {\n\tRepo repo.Repository\n}\n\nfunc InitService(database *db.Database) Service {\n\telsa.Generate(RepoSet)\n\treturn Service{}\n}\n",
            &repository_loader(),
        )
        .expect("generate")
        .expect("file");
        assert_eq!(
            file.aggregate_declarations,
            vec!["type Service struct {\n\tRepo repo.Repository\n}".to_string()]
        );
        assert!(file.functions[0].contains("\treturn Service{Repo: repository}\n"));
    }

    #[test]
    fn unsatisfiable_provider_fails_the_unit() {
        let err = generate(
            "func InitRepository() repo.Repository {\n\telsa.Generate(RepoSet)\n\treturn nil\n}\n",
            &repository_loader(),
        )
        .expect_err("resolution error");
        assert!(matches!(err, WireError::UnresolvableProvider { ref provider, .. } if provider == "repo.NewRepository"));
    }

    #[test]
    fn units_without_wiring_functions_produce_nothing() {
        let result = generate("func Helper() {}\n", &repository_loader()).expect("generate");
        assert!(result.is_none());
    }

    #[test]
    fn missing_marker_import_is_reported() {
        let source = "package app\n\nfunc Init() {\n\telsa.Generate(Set)\n}\n";
        let (file, _) = parse_file(Path::new("/work/app/wire.go"), source);
        let unit = Unit {
            source: &file,
            path: Path::new("/work/app/wire.go"),
            module_root: Path::new("/work"),
            package_path: "example.com/app",
        };
        let err = generate_unit(
            &unit,
            &GenerateOptions::default(),
            &StaticLoader::default(),
            &NoPackageNames,
        )
        .expect_err("missing marker");
        assert!(matches!(err, WireError::MarkerImportMissing { .. }));
    }

    #[test]
    fn inspect_lists_functions_and_sets() {
        let source = format!(
            "{HEADER}\nfunc InitRepository(database *db.Database) repo.Repository {{\n\telsa.Generate(RepoSet)\n\treturn nil\n}}\n"
        );
        let (file, _) = parse_file(Path::new("/work/app/wire.go"), &source);
        let unit = Unit {
            source: &file,
            path: Path::new("/work/app/wire.go"),
            module_root: Path::new("/work"),
            package_path: "example.com/app",
        };
        let summary =
            inspect_unit(&unit, &GenerateOptions::default(), &NoPackageNames).expect("inspect");
        assert_eq!(summary.functions.len(), 1);
        assert_eq!(summary.sets.len(), 1);
        assert_eq!(summary.sets[0].providers[0].to_string(), "repo.NewRepository");
        assert_eq!(summary.imports.len(), 3);
    }
}
