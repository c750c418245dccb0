use std::path::Path;

use elsa_wire::{GenerateOptions, Markers};
use serde::Deserialize;

use crate::ElsaError;

/// Optional per-module configuration file, read from the module root.
pub const CONFIG_FILE: &str = "elsa.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub generate: GenerateConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateConfig {
    #[serde(default = "default_marker")]
    pub marker: String,
    #[serde(default = "default_build_tag")]
    pub build_tag: String,
    #[serde(default = "default_output_file")]
    pub output_file: String,
    /// Directory names skipped during discovery, at any depth.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            build_tag: default_build_tag(),
            output_file: default_output_file(),
            exclude: default_exclude(),
            jobs: default_jobs(),
        }
    }
}

impl GenerateConfig {
    pub fn options(&self) -> GenerateOptions {
        GenerateOptions {
            markers: Markers::new(self.marker.clone()),
            build_tag: self.build_tag.clone(),
            output_file: self.output_file.clone(),
        }
    }
}

fn default_marker() -> String {
    "elsa".to_string()
}

fn default_build_tag() -> String {
    "elsabuild".to_string()
}

fn default_output_file() -> String {
    "elsa_gen.go".to_string()
}

fn default_exclude() -> Vec<String> {
    vec!["vendor".to_string(), "testdata".to_string()]
}

fn default_jobs() -> usize {
    1
}

pub fn read_config(path: &Path) -> Result<Config, ElsaError> {
    let text = std::fs::read_to_string(path)?;
    toml::from_str(&text)
        .map_err(|err| ElsaError::Config(format!("failed to parse {}: {err}", path.display())))
}

/// Reads `root/elsa.toml`, or returns the defaults when there is none.
pub fn load_config(root: &Path) -> Result<Config, ElsaError> {
    let path = root.join(CONFIG_FILE);
    if path.is_file() {
        tracing::debug!(path = %path.display(), "reading configuration");
        read_config(&path)
    } else {
        Ok(Config::default())
    }
}
