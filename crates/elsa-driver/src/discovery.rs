use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::GenerateConfig;

/// True when a build constraint above the package clause names `tag` without negating it.
pub fn has_build_tag(source: &str, tag: &str) -> bool {
    for line in source.lines() {
        let line = line.trim();
        if line.starts_with("package ") || line == "package" {
            break;
        }
        let constraint = line
            .strip_prefix("//go:build")
            .or_else(|| line.strip_prefix("// +build"));
        let Some(constraint) = constraint else {
            continue;
        };
        let mentions = constraint
            .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.' || c == '!'))
            .any(|word| word == tag);
        if mentions {
            return true;
        }
    }
    false
}

/// Every `.go` file under `root` that opts into generation, sorted by path. Unreadable
/// entries are logged and skipped.
pub fn discover(root: &Path, config: &GenerateConfig) -> Vec<PathBuf> {
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !is_excluded_dir(&entry.file_name().to_string_lossy(), config)
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_candidate(entry.path(), config) {
            continue;
        }
        match fs::read_to_string(entry.path()) {
            Ok(source) if has_build_tag(&source, &config.build_tag) => {
                files.push(entry.into_path());
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(path = %entry.path().display(), error = %err, "skipping unreadable file");
            }
        }
    }
    files.sort();
    files
}

fn is_excluded_dir(name: &str, config: &GenerateConfig) -> bool {
    name.starts_with('.') || config.exclude.iter().any(|excluded| excluded == name)
}

fn is_candidate(path: &Path, config: &GenerateConfig) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    name.ends_with(".go") && !name.ends_with("_test.go") && name != config.output_file
}
