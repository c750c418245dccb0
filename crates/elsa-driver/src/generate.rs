use std::fs;
use std::path::{Path, PathBuf};

use elsa_syntax::{SourceFile, file_diagnostics_have_errors, parse_file, render_diagnostics};
use elsa_wire::{CachedSignatureLoader, GenerateOptions, GeneratedFile, Unit, generate_unit};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::config::load_config;
use crate::discovery::discover;
use crate::loader::SourceSignatureLoader;
use crate::module::{find_root, package_import_path};
use crate::write::write_atomic;
use crate::ElsaError;

#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub dir: PathBuf,
    /// Overrides `jobs` from `elsa.toml`.
    pub jobs: Option<usize>,
    /// Overrides `output_file` from `elsa.toml`.
    pub output_file: Option<String>,
    /// Render everything but write nothing.
    pub dry_run: bool,
    /// Process every unit and report all failures instead of stopping at the first.
    pub keep_going: bool,
}

#[derive(Debug, Default)]
pub struct GenerateReport {
    /// Files produced, in discovery order.
    pub generated: Vec<GeneratedFile>,
    pub written: Vec<PathBuf>,
    /// Targets that already held the generated contents.
    pub unchanged: Vec<PathBuf>,
    /// Units that could not be read or parsed.
    pub skipped: Vec<PathBuf>,
}

impl GenerateReport {
    fn commit(
        &mut self,
        source: &Path,
        outcome: Outcome,
        dry_run: bool,
        targets: &mut FxHashMap<PathBuf, PathBuf>,
    ) -> Result<(), ElsaError> {
        let file = match outcome {
            Outcome::Generated(file) => file,
            Outcome::NoWiring => return Ok(()),
            Outcome::Skipped => {
                self.skipped.push(source.to_path_buf());
                return Ok(());
            }
        };
        if let Some(first) = targets.insert(file.target_path.clone(), source.to_path_buf()) {
            return Err(ElsaError::InvalidPath(format!(
                "{} and {} both generate {}",
                first.display(),
                source.display(),
                file.target_path.display()
            )));
        }
        if !dry_run {
            if write_atomic(&file.target_path, &file.render())? {
                tracing::info!(path = %file.target_path.display(), "wrote generated file");
                self.written.push(file.target_path.clone());
            } else {
                tracing::info!(path = %file.target_path.display(), "generated file is up to date");
                self.unchanged.push(file.target_path.clone());
            }
        }
        self.generated.push(file);
        Ok(())
    }
}

enum Outcome {
    Generated(GeneratedFile),
    NoWiring,
    Skipped,
}

/// A parsed unit together with the module it belongs to.
pub(crate) struct LoadedUnit {
    pub(crate) path: PathBuf,
    pub(crate) file: SourceFile,
    pub(crate) root: PathBuf,
    pub(crate) package_path: String,
}

impl LoadedUnit {
    pub(crate) fn unit(&self) -> Unit<'_> {
        Unit {
            source: &self.file,
            path: &self.path,
            module_root: &self.root,
            package_path: &self.package_path,
        }
    }
}

/// Reads and parses `path`. Units that cannot be read or parsed are logged and yield
/// `None`; a missing module root is an error.
pub(crate) fn load_unit(
    path: &Path,
    loader: &SourceSignatureLoader,
) -> Result<Option<LoadedUnit>, ElsaError> {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "skipping unreadable unit");
            return Ok(None);
        }
    };
    let (file, diagnostics) = parse_file(path, &source);
    if file_diagnostics_have_errors(&diagnostics) {
        tracing::warn!(
            path = %path.display(),
            "skipping unit that does not parse\n{}",
            render_diagnostics(&diagnostics, Some(&source), false)
        );
        return Ok(None);
    }
    let root = find_root(path)?;
    let module_path = loader.module_path(&root)?;
    let dir = path
        .parent()
        .ok_or_else(|| ElsaError::InvalidPath(format!("{} has no parent", path.display())))?;
    let package_path = package_import_path(&root, &module_path, dir)?;
    Ok(Some(LoadedUnit {
        path: path.to_path_buf(),
        file,
        root,
        package_path,
    }))
}

struct Session {
    options: GenerateOptions,
    loader: CachedSignatureLoader<SourceSignatureLoader>,
}

impl Session {
    fn process(&self, path: &Path) -> Result<Outcome, ElsaError> {
        let Some(loaded) = load_unit(path, self.loader.inner())? else {
            return Ok(Outcome::Skipped);
        };
        let names = self.loader.inner().package_names(&loaded.root);
        let generated = generate_unit(&loaded.unit(), &self.options, &self.loader, &names)
            .map_err(|source| ElsaError::Wire {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(match generated {
            Some(file) => Outcome::Generated(file),
            None => {
                tracing::debug!(path = %path.display(), "unit has no wiring functions");
                Outcome::NoWiring
            }
        })
    }
}

/// Generates the wiring files for every opted-in unit under `request.dir`.
///
/// With one job and without `keep_going` the run stops at the first failing unit and
/// leaves files written before it in place. Otherwise every unit is processed, each
/// failure is logged, and the run ends with [`ElsaError::Failed`].
pub fn generate(request: &GenerateRequest) -> Result<GenerateReport, ElsaError> {
    if !request.dir.is_dir() {
        return Err(ElsaError::InvalidPath(format!(
            "{} is not a directory",
            request.dir.display()
        )));
    }
    let dir = request.dir.canonicalize()?;
    let root = find_root(&dir)?;
    let mut settings = load_config(&root)?.generate;
    if let Some(output_file) = &request.output_file {
        settings.output_file = output_file.clone();
    }
    if let Some(jobs) = request.jobs {
        settings.jobs = jobs;
    }

    let files = discover(&dir, &settings);
    tracing::info!(dir = %dir.display(), units = files.len(), "discovered compilation units");

    let session = Session {
        options: settings.options(),
        loader: CachedSignatureLoader::new(SourceSignatureLoader::new(settings.build_tag.clone())),
    };
    let mut report = GenerateReport::default();
    let mut targets = FxHashMap::default();

    if settings.jobs <= 1 && !request.keep_going {
        for path in &files {
            let outcome = session.process(path)?;
            report.commit(path, outcome, request.dry_run, &mut targets)?;
        }
        return Ok(report);
    }

    let outcomes: Vec<Result<Outcome, ElsaError>> = if settings.jobs > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.jobs)
            .build()
            .map_err(|err| {
                ElsaError::Config(format!("cannot start {} workers: {err}", settings.jobs))
            })?;
        pool.install(|| files.par_iter().map(|path| session.process(path)).collect())
    } else {
        files.iter().map(|path| session.process(path)).collect()
    };

    let mut failures = 0usize;
    for (path, outcome) in files.iter().zip(outcomes) {
        let committed = outcome
            .and_then(|outcome| report.commit(path, outcome, request.dry_run, &mut targets));
        if let Err(err) = committed {
            tracing::error!("{err}");
            failures += 1;
        }
    }
    if failures > 0 {
        return Err(ElsaError::Failed { count: failures });
    }
    Ok(report)
}
