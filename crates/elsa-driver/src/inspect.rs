use std::path::Path;

use elsa_wire::{CompositeType, Qualifier, UnitSummary, WiringParam, derive_alias, inspect_unit};

use crate::config::load_config;
use crate::discovery::discover;
use crate::generate::load_unit;
use crate::loader::SourceSignatureLoader;
use crate::module::find_root;
use crate::ElsaError;

/// Lists the wiring functions and provider sets of every opted-in unit under `dir`
/// without loading any provider signature.
pub fn inspect(dir: &Path) -> Result<Vec<UnitSummary>, ElsaError> {
    let dir = dir.canonicalize()?;
    let root = find_root(&dir)?;
    let settings = load_config(&root)?.generate;
    let options = settings.options();
    let loader = SourceSignatureLoader::new(settings.build_tag.clone());

    let mut summaries = Vec::new();
    for path in discover(&dir, &settings) {
        let Some(loaded) = load_unit(&path, &loader)? else {
            continue;
        };
        let names = loader.package_names(&loaded.root);
        let summary =
            inspect_unit(&loaded.unit(), &options, &names).map_err(|source| ElsaError::Wire {
                path: path.clone(),
                source,
            })?;
        summaries.push(summary);
    }
    Ok(summaries)
}

/// Spells types with the aliases the unit imports them under.
struct UnitQualifier<'a> {
    summary: &'a UnitSummary,
}

impl Qualifier for UnitQualifier<'_> {
    fn qualify(&mut self, module_path: &str) -> Option<String> {
        if module_path == self.summary.package_path {
            return None;
        }
        let alias = self
            .summary
            .imports
            .iter()
            .find(|(_, path)| path == module_path)
            .map_or_else(|| derive_alias(module_path), |(alias, _)| alias.clone());
        Some(alias)
    }
}

/// Human-readable listing of one unit.
pub fn render_summary(summary: &UnitSummary) -> String {
    let mut qualifier = UnitQualifier { summary };
    let mut out = format!(
        "{} (package {}, {})\n",
        summary.path.display(),
        summary.package,
        summary.package_path
    );
    for func in &summary.functions {
        let mut params = Vec::with_capacity(func.params.len());
        for param in &func.params {
            params.push(render_param(param, &mut qualifier));
        }
        let mut results = Vec::with_capacity(func.results.len());
        for result in &func.results {
            results.push(result.ty.render(&mut qualifier));
        }
        let results = match results.as_slice() {
            [] => String::new(),
            [single] => format!(" {single}"),
            many => format!(" ({})", many.join(", ")),
        };
        out.push_str(&format!("  func {}({}){results}\n", func.name, params.join(", ")));
        out.push_str(&format!("    sets: {}\n", func.referenced_sets.join(", ")));
    }
    for set in &summary.sets {
        let providers: Vec<String> = set.providers.iter().map(ToString::to_string).collect();
        out.push_str(&format!("  set {} = {}\n", set.name, providers.join(", ")));
    }
    out
}

fn render_param(param: &WiringParam, qualifier: &mut UnitQualifier<'_>) -> String {
    let ty = match (&param.ty.composite, param.variadic) {
        (Some(CompositeType::Slice(elem)), true) => format!("...{}", elem.render(qualifier)),
        _ => param.ty.render(qualifier),
    };
    match param.ty.param_name.as_deref() {
        Some(name) => format!("{name} {ty}"),
        None => ty,
    }
}
