use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::module::Requirement;

/// Where the Go toolchain keeps package sources outside the current module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoEnv {
    /// Standard library sources live under `goroot/src`.
    pub goroot: Option<PathBuf>,
    /// Downloaded modules, laid out as `<escaped path>@<escaped version>`.
    pub mod_cache: Option<PathBuf>,
}

impl GoEnv {
    /// Reads `GOROOT` and `GOMODCACHE` (or `GOPATH/pkg/mod`) from the environment and asks
    /// `go env` for whatever is unset. A missing `go` binary leaves the entry empty.
    pub fn detect() -> Self {
        let goroot = env_dir("GOROOT").or_else(|| go_env("GOROOT"));
        let mod_cache = env_dir("GOMODCACHE")
            .or_else(|| {
                env::var_os("GOPATH")
                    .and_then(|paths| env::split_paths(&paths).next())
                    .filter(|path| !path.as_os_str().is_empty())
                    .map(|path| path.join("pkg").join("mod"))
            })
            .or_else(|| go_env("GOMODCACHE"));
        let detected = Self { goroot, mod_cache };
        tracing::debug!(?detected, "located Go toolchain directories");
        detected
    }

    /// Directory of a standard library package.
    pub fn std_package_dir(&self, package_path: &str) -> Option<PathBuf> {
        let dir = self.goroot.as_ref()?.join("src").join(package_path);
        dir.is_dir().then_some(dir)
    }

    /// Directory of `package_path` inside the downloaded copy of the required module that
    /// owns it. The longest matching module path wins.
    pub fn cached_package_dir(
        &self,
        requirements: &[Requirement],
        package_path: &str,
    ) -> Option<PathBuf> {
        let cache = self.mod_cache.as_ref()?;
        let (requirement, rest) = requirements
            .iter()
            .filter_map(|req| module_suffix(package_path, &req.path).map(|rest| (req, rest)))
            .max_by_key(|(req, _)| req.path.len())?;
        let module_dir = cache.join(format!(
            "{}@{}",
            escape_path(&requirement.path),
            escape_path(&requirement.version)
        ));
        let dir = join_segments(&module_dir, rest);
        dir.is_dir().then_some(dir)
    }
}

/// The part of `package_path` below `module`, empty for the module's root package.
fn module_suffix<'a>(package_path: &'a str, module: &str) -> Option<&'a str> {
    let rest = package_path.strip_prefix(module)?;
    if rest.is_empty() {
        return Some(rest);
    }
    rest.strip_prefix('/')
}

fn join_segments(base: &Path, rest: &str) -> PathBuf {
    rest.split('/')
        .filter(|segment| !segment.is_empty())
        .fold(base.to_path_buf(), |dir, segment| dir.join(segment))
}

/// Module cache case encoding: every upper-case letter becomes `!` and its lower case.
pub fn escape_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        if ch.is_ascii_uppercase() {
            out.push('!');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn env_dir(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn go_env(key: &str) -> Option<PathBuf> {
    let output = Command::new("go").args(["env", key]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8(output.stdout).ok()?;
    let value = value.trim();
    (!value.is_empty()).then(|| PathBuf::from(value))
}
