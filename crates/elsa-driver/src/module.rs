use std::fs;
use std::path::{Path, PathBuf};

use crate::ElsaError;

/// File marking the root of a Go module.
pub const ROOT_MARKER: &str = "go.mod";

/// Walks upward from `start` (a file or a directory) to the nearest directory holding
/// a `go.mod`.
pub fn find_root(start: &Path) -> Result<PathBuf, ElsaError> {
    let begin = if start.is_file() {
        start.parent().unwrap_or(start)
    } else {
        start
    };
    begin
        .ancestors()
        .find(|dir| dir.join(ROOT_MARKER).is_file())
        .map(Path::to_path_buf)
        .ok_or_else(|| ElsaError::RootNotFound(start.to_path_buf()))
}

/// Reads the module path declared by the `module` directive of `root/go.mod`.
pub fn read_module_path(root: &Path) -> Result<String, ElsaError> {
    let path = root.join(ROOT_MARKER);
    let text = fs::read_to_string(&path)?;
    text.lines()
        .map(|line| line.split("//").next().unwrap_or_default().trim())
        .find_map(|line| line.strip_prefix("module"))
        .filter(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
        .map(|rest| rest.trim().trim_matches('"').to_string())
        .filter(|module| !module.is_empty())
        .ok_or_else(|| {
            ElsaError::Config(format!("{} has no module directive", path.display()))
        })
}

/// A `require` directive of `go.mod`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub path: String,
    pub version: String,
}

/// Reads the `require` directives of `root/go.mod`, both single-line and block form.
pub fn read_requirements(root: &Path) -> Result<Vec<Requirement>, ElsaError> {
    let text = fs::read_to_string(root.join(ROOT_MARKER))?;
    let mut requirements = Vec::new();
    let mut in_block = false;
    for line in text.lines() {
        let line = line.split("//").next().unwrap_or_default().trim();
        let entry = if in_block {
            if line == ")" {
                in_block = false;
                continue;
            }
            line
        } else if let Some(rest) = line.strip_prefix("require") {
            let rest = rest.trim();
            if rest == "(" {
                in_block = true;
                continue;
            }
            rest
        } else {
            continue;
        };
        let mut fields = entry.split_whitespace();
        if let (Some(path), Some(version)) = (fields.next(), fields.next()) {
            requirements.push(Requirement {
                path: path.trim_matches('"').to_string(),
                version: version.to_string(),
            });
        }
    }
    Ok(requirements)
}

/// Import path of the package in `dir`, which must lie inside the module at `root`.
pub fn package_import_path(
    root: &Path,
    module_path: &str,
    dir: &Path,
) -> Result<String, ElsaError> {
    let relative = dir.strip_prefix(root).map_err(|_| {
        ElsaError::InvalidPath(format!(
            "{} is outside module root {}",
            dir.display(),
            root.display()
        ))
    })?;
    let mut import_path = module_path.to_string();
    for component in relative.components() {
        let segment = component.as_os_str().to_str().ok_or_else(|| {
            ElsaError::InvalidPath(format!("{} is not valid UTF-8", dir.display()))
        })?;
        import_path.push('/');
        import_path.push_str(segment);
    }
    Ok(import_path)
}
