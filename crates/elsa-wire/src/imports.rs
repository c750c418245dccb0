use elsa_syntax::ImportSpec;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;

/// Best-effort lookup of the name a package declares in its `package` clause.
pub trait PackageNames: Sync {
    fn name_of(&self, package_path: &str) -> Option<String>;
}

/// Lookup that never knows anything; every alias is derived from the path.
pub struct NoPackageNames;

impl PackageNames for NoPackageNames {
    fn name_of(&self, _package_path: &str) -> Option<String> {
        None
    }
}

/// Alias to import path mapping for one compilation unit, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ImportTable {
    entries: IndexMap<String, String>,
}

impl ImportTable {
    pub fn build(imports: &[ImportSpec], names: &dyn PackageNames) -> Self {
        let explicit: FxHashSet<&str> = imports
            .iter()
            .filter_map(|spec| spec.name.as_ref())
            .map(|name| name.name.as_str())
            .collect();

        let mut entries: IndexMap<String, String> = IndexMap::new();
        for spec in imports {
            match &spec.name {
                Some(name) if name.name == "_" || name.name == "." => continue,
                Some(name) => {
                    if let Some(existing) = entries.get(&name.name) {
                        tracing::warn!(
                            alias = %name.name,
                            kept = %existing,
                            ignored = %spec.path,
                            "duplicate import alias"
                        );
                        continue;
                    }
                    entries.insert(name.name.clone(), spec.path.clone());
                }
                None => {
                    let taken =
                        |alias: &str| explicit.contains(alias) || entries.contains_key(alias);
                    let alias = match names
                        .name_of(&spec.path)
                        .filter(|name| !name.is_empty() && name != "main")
                    {
                        Some(name) if !taken(&name) => name,
                        _ => {
                            let base = derive_alias(&spec.path);
                            let mut alias = base.clone();
                            let mut i = 2usize;
                            while taken(&alias) {
                                alias = format!("{base}{i}");
                                i += 1;
                            }
                            alias
                        }
                    };
                    entries.insert(alias, spec.path.clone());
                }
            }
        }
        Self { entries }
    }

    pub fn path_of(&self, alias: &str) -> Option<&str> {
        self.entries.get(alias).map(String::as_str)
    }

    /// First alias, in declaration order, bound to `path`.
    pub fn alias_of(&self, path: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, candidate)| candidate.as_str() == path)
            .map(|(alias, _)| alias.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(alias, path)| (alias.as_str(), path.as_str()))
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The package name Go tooling assumes for an import path: the last segment, skipping a
/// major-version suffix, without a `go-` prefix and cut at the first non-identifier rune.
pub fn derive_alias(path: &str) -> String {
    let mut segments = path.trim_end_matches('/').rsplit('/');
    let mut base = segments.next().unwrap_or_default();
    let is_major_version = base.len() > 1
        && base.starts_with('v')
        && base[1..].chars().all(|c| c.is_ascii_digit());
    if is_major_version {
        if let Some(parent) = segments.next() {
            base = parent;
        }
    }
    let base = base.strip_prefix("go-").unwrap_or(base);
    let cut = base
        .find(|c: char| !(c == '_' || c.is_alphanumeric()))
        .unwrap_or(base.len());
    let alias = &base[..cut];
    if alias.is_empty() || alias.starts_with(|c: char| c.is_ascii_digit()) {
        format!("pkg{alias}")
    } else {
        alias.to_string()
    }
}

#[cfg(test)]
mod tests {
    use elsa_syntax::{ImportSpec, Span, SpannedName};

    use super::*;

    fn import(name: Option<&str>, path: &str) -> ImportSpec {
        ImportSpec {
            name: name.map(|name| SpannedName {
                name: name.to_string(),
                span: Span::default(),
            }),
            path: path.to_string(),
            span: Span::default(),
        }
    }

    struct Fixed(&'static [(&'static str, &'static str)]);

    impl PackageNames for Fixed {
        fn name_of(&self, package_path: &str) -> Option<String> {
            self.0
                .iter()
                .find(|(path, _)| *path == package_path)
                .map(|(_, name)| name.to_string())
        }
    }

    #[test]
    fn derives_aliases_from_paths() {
        assert_eq!(derive_alias("github.com/acme/storage/db"), "db");
        assert_eq!(derive_alias("github.com/redis/go-redis/v9"), "redis");
        assert_eq!(derive_alias("gopkg.in/yaml.v3"), "yaml");
        assert_eq!(derive_alias("context"), "context");
        assert_eq!(derive_alias("example.com/foo-bar"), "foo");
    }

    #[test]
    fn explicit_aliases_win_over_derived_names() {
        let imports = vec![
            import(None, "github.com/acme/db"),
            import(Some("db"), "github.com/other/db"),
        ];
        let table = ImportTable::build(&imports, &NoPackageNames);
        assert_eq!(table.path_of("db"), Some("github.com/other/db"));
        assert_eq!(table.path_of("db2"), Some("github.com/acme/db"));
        let aliases: Vec<&str> = table.aliases().collect();
        assert_eq!(aliases, vec!["db2", "db"]);
    }

    #[test]
    fn uses_declared_package_name_when_free() {
        let imports = vec![import(None, "github.com/acme/go-kit/logging")];
        let table = ImportTable::build(&imports, &Fixed(&[("github.com/acme/go-kit/logging", "log")]));
        assert_eq!(table.path_of("log"), Some("github.com/acme/go-kit/logging"));
        assert_eq!(table.alias_of("github.com/acme/go-kit/logging"), Some("log"));
    }

    #[test]
    fn skips_blank_and_dot_imports() {
        let imports = vec![
            import(Some("_"), "github.com/lib/pq"),
            import(Some("."), "github.com/acme/dsl"),
        ];
        let table = ImportTable::build(&imports, &NoPackageNames);
        assert!(table.is_empty());
    }

    #[test]
    fn duplicate_explicit_alias_keeps_first() {
        let imports = vec![
            import(Some("store"), "github.com/acme/a"),
            import(Some("store"), "github.com/acme/b"),
        ];
        let table = ImportTable::build(&imports, &NoPackageNames);
        assert_eq!(table.len(), 1);
        assert_eq!(table.path_of("store"), Some("github.com/acme/a"));
    }
}
