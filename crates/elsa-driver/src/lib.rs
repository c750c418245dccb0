#![deny(clippy::unwrap_used)]

//! Filesystem side of elsa: finds opted-in compilation units under a directory, locates
//! their module, loads provider signatures from package sources (including the module
//! cache and the standard library) and writes the generated files.

mod config;
mod discovery;
mod generate;
mod inspect;
mod loader;
mod module;
mod toolchain;
mod write;

use std::path::PathBuf;

use elsa_wire::WireError;

pub use config::{CONFIG_FILE, Config, GenerateConfig, load_config, read_config};
pub use discovery::{discover, has_build_tag};
pub use generate::{GenerateReport, GenerateRequest, generate};
pub use inspect::{inspect, render_summary};
pub use loader::{ModulePackageNames, SourceSignatureLoader};
pub use module::{
    ROOT_MARKER, Requirement, find_root, package_import_path, read_module_path, read_requirements,
};
pub use toolchain::{GoEnv, escape_path};
pub use write::write_atomic;

#[derive(Debug, thiserror::Error)]
pub enum ElsaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("no go.mod found above {}", .0.display())]
    RootNotFound(PathBuf),
    #[error("Config error: {0}")]
    Config(String),
    #[error("{}: {source}", .path.display())]
    Wire {
        path: PathBuf,
        #[source]
        source: WireError,
    },
    #[error("{count} compilation unit(s) failed")]
    Failed { count: usize },
}
