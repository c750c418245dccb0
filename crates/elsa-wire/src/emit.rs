use std::collections::BTreeMap;
use std::path::PathBuf;

use elsa_syntax::syntax::is_reserved_identifier;
use elsa_syntax::{file_diagnostics_have_errors, parse_file};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::error::WireError;
use crate::extract::{Aggregate, Markers, WiringFunction, WiringParam};
use crate::imports::derive_alias;
use crate::resolve::{Plan, ReturnValue, Step};
use crate::types::{CompositeType, Qualifier, TypeDescriptor};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportAlias {
    pub alias: String,
    /// The preferred alias was taken and a numeral was appended.
    pub collision_suffixed: bool,
}

/// Assigns each imported package path one alias, unique across a generated file.
#[derive(Debug, Clone)]
pub struct AliasAllocator {
    local_package: String,
    by_path: IndexMap<String, ImportAlias>,
    used: FxHashSet<String>,
}

impl AliasAllocator {
    pub fn new(local_package: impl Into<String>) -> Self {
        Self {
            local_package: local_package.into(),
            by_path: IndexMap::new(),
            used: FxHashSet::default(),
        }
    }

    pub fn register(&mut self, path: &str, preferred: &str) -> &ImportAlias {
        if !self.by_path.contains_key(path) {
            let base = if preferred.is_empty() {
                derive_alias(path)
            } else {
                preferred.to_string()
            };
            let mut alias = base.clone();
            let mut i = 2usize;
            while self.used.contains(&alias) || is_reserved_identifier(&alias) {
                alias = format!("{base}{i}");
                i += 1;
            }
            if alias != base {
                tracing::debug!(%path, %alias, "import alias collision");
            }
            self.used.insert(alias.clone());
            self.by_path.insert(
                path.to_string(),
                ImportAlias {
                    collision_suffixed: alias != base,
                    alias,
                },
            );
        }
        &self.by_path[path]
    }

    /// Registers every package a type refers to, skipping builtins and the local package.
    pub fn register_type(&mut self, ty: &TypeDescriptor) {
        for part in ty.named_parts() {
            if part.module_path != self.local_package {
                self.register(&part.module_path, &part.alias);
            }
        }
    }

    pub fn alias_for(&self, path: &str) -> Option<&str> {
        self.by_path.get(path).map(|entry| entry.alias.as_str())
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.by_path.values().map(|entry| entry.alias.as_str())
    }

    pub fn local_package(&self) -> &str {
        &self.local_package
    }
}

/// The source file produced for one compilation unit.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedFile {
    pub target_path: PathBuf,
    pub package_name: String,
    pub build_tag: String,
    /// Packages the generated code refers to, keyed by import path.
    pub imports: BTreeMap<String, ImportAlias>,
    pub aggregate_declarations: Vec<String>,
    pub functions: Vec<String>,
}

impl GeneratedFile {
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("// Code generated by elsa. DO NOT EDIT.\n\n");
        out.push_str(&format!("//go:build !{}\n\n", self.build_tag));
        out.push_str(&format!("package {}\n", self.package_name));

        if !self.imports.is_empty() {
            let (std, rest): (Vec<_>, Vec<_>) = self
                .imports
                .iter()
                .partition(|(path, _)| is_std_path(path));
            out.push_str("\nimport (\n");
            for (index, group) in [std, rest].iter().filter(|g| !g.is_empty()).enumerate() {
                if index > 0 {
                    out.push('\n');
                }
                for (path, alias) in group {
                    if last_segment(path) == alias.alias {
                        out.push_str(&format!("\t\"{path}\"\n"));
                    } else {
                        out.push_str(&format!("\t{} \"{path}\"\n", alias.alias));
                    }
                }
            }
            out.push_str(")\n");
        }

        for decl in self.aggregate_declarations.iter().chain(&self.functions) {
            out.push('\n');
            out.push_str(decl);
            out.push('\n');
        }
        out
    }
}

fn is_std_path(path: &str) -> bool {
    !path.split('/').next().unwrap_or_default().contains('.')
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Where and how a unit's generated file is written.
pub struct EmitContext<'a> {
    pub target_path: PathBuf,
    pub package_name: &'a str,
    pub build_tag: &'a str,
    pub markers: &'a Markers,
    pub marker_path: &'a str,
}

/// Renders resolved wiring functions into one generated file and checks that the
/// result parses.
pub fn emit_unit(
    ctx: EmitContext<'_>,
    aliases: AliasAllocator,
    functions: &[(WiringFunction, Plan)],
) -> Result<GeneratedFile, WireError> {
    let mut aggregates: IndexMap<&str, &Aggregate> = IndexMap::new();
    for (func, _) in functions {
        for result in &func.results {
            if let Some(aggregate) = &result.aggregate {
                aggregates.entry(aggregate.name.as_str()).or_insert(aggregate);
            }
        }
    }

    let mut emitter = Emitter {
        aliases,
        used: BTreeMap::new(),
        aggregate_names: aggregates.keys().map(|name| name.to_string()).collect(),
    };
    let marker_alias = emitter
        .qualify(ctx.marker_path)
        .unwrap_or_else(|| ctx.markers.package.clone());

    let aggregate_declarations = aggregates
        .values()
        .map(|aggregate| emitter.aggregate_declaration(aggregate))
        .collect();
    let rendered_functions = functions
        .iter()
        .map(|(func, plan)| emitter.function(func, plan, &marker_alias, &ctx.markers.generate))
        .collect();

    let file = GeneratedFile {
        target_path: ctx.target_path,
        package_name: ctx.package_name.to_string(),
        build_tag: ctx.build_tag.to_string(),
        imports: emitter.used,
        aggregate_declarations,
        functions: rendered_functions,
    };
    validate(&file)?;
    Ok(file)
}

fn validate(file: &GeneratedFile) -> Result<(), WireError> {
    let (_, diagnostics) = parse_file(&file.target_path, &file.render());
    if !file_diagnostics_have_errors(&diagnostics) {
        return Ok(());
    }
    let message = diagnostics
        .first()
        .map(|diag| diag.diagnostic.message.clone())
        .unwrap_or_default();
    Err(WireError::InvalidOutput {
        path: file.target_path.display().to_string(),
        message,
    })
}

struct Emitter {
    aliases: AliasAllocator,
    used: BTreeMap<String, ImportAlias>,
    aggregate_names: FxHashSet<String>,
}

impl Qualifier for Emitter {
    fn qualify(&mut self, module_path: &str) -> Option<String> {
        if module_path == self.aliases.local_package() {
            return None;
        }
        let entry = self.aliases.register(module_path, "").clone();
        let alias = entry.alias.clone();
        self.used.insert(module_path.to_string(), entry);
        Some(alias)
    }
}

impl Emitter {
    fn aggregate_declaration(&mut self, aggregate: &Aggregate) -> String {
        let mut rows: Vec<(String, String, Option<&str>)> = Vec::new();
        for field in &aggregate.fields {
            let ty = field.ty.render(self);
            let name = if field.embedded {
                String::new()
            } else {
                field.name.clone()
            };
            rows.push((name, ty, field.raw_tag.as_deref()));
        }
        let name_width = rows.iter().map(|(name, _, _)| name.len()).max().unwrap_or(0);
        let type_width = rows
            .iter()
            .filter(|(_, _, tag)| tag.is_some())
            .map(|(name, ty, _)| if name.is_empty() { 0 } else { ty.len() })
            .max()
            .unwrap_or(0);

        let mut out = format!("type {} struct {{\n", aggregate.name);
        for (name, ty, tag) in &rows {
            let mut line = String::from("\t");
            if !name.is_empty() {
                line.push_str(&format!("{name:<name_width$} "));
            }
            match tag {
                Some(tag) if !name.is_empty() => line.push_str(&format!("{ty:<type_width$} {tag}")),
                Some(tag) => line.push_str(&format!("{ty} {tag}")),
                None => line.push_str(ty),
            }
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out.push('}');
        out
    }

    fn function(
        &mut self,
        func: &WiringFunction,
        plan: &Plan,
        marker_alias: &str,
        generate: &str,
    ) -> String {
        let mut params = Vec::with_capacity(func.params.len());
        for (param, name) in func.params.iter().zip(&plan.param_names) {
            params.push(format!("{name} {}", self.param_type(param)));
        }
        let mut result_types = Vec::with_capacity(func.results.len());
        for result in &func.results {
            result_types.push(result.ty.render(self));
        }
        let results = match result_types.as_slice() {
            [] => String::new(),
            [single] => format!(" {single}"),
            many => format!(" ({})", many.join(", ")),
        };

        let mut out = format!("func {}({}){results} {{\n", func.name, params.join(", "));
        for step in &plan.steps {
            out.push_str(&self.step(step, func));
        }
        out.push_str(&format!(
            "\t{marker_alias}.{generate}({})\n",
            plan.generated_vars.join(", ")
        ));
        if !plan.returns.is_empty() {
            let values: Vec<String> = plan.returns.iter().map(return_value).collect();
            out.push_str(&format!("\treturn {}\n", values.join(", ")));
        }
        out.push('}');
        out
    }

    fn param_type(&mut self, param: &WiringParam) -> String {
        match (&param.ty.composite, param.variadic) {
            (Some(CompositeType::Slice(elem)), true) => format!("...{}", elem.render(self)),
            _ => param.ty.render(self),
        }
    }

    fn step(&mut self, step: &Step, func: &WiringFunction) -> String {
        let provider = &step.provider;
        let qualifier = if provider.is_local() || provider.package_path == self.aliases.local_package() {
            None
        } else {
            self.qualify(&provider.package_path)
        };
        let callee = match qualifier {
            Some(alias) => format!("{alias}.{}", provider.function_name),
            None => provider.function_name.clone(),
        };
        let args: Vec<String> = step.args.iter().map(|arg| arg.render()).collect();
        let call = format!("{callee}({})", args.join(", "));

        let mut out = if step.outputs.is_empty() {
            format!("\t{call}\n")
        } else {
            let op = if step.declares { ":=" } else { "=" };
            format!("\t{} {op} {call}\n", step.outputs.join(", "))
        };
        if provider.returns_error() {
            let mut values: Vec<String> = func
                .results
                .iter()
                .take(func.results.len().saturating_sub(1))
                .map(|result| self.zero_value(&result.ty))
                .collect();
            values.push("err".to_string());
            out.push_str("\tif err != nil {\n");
            out.push_str(&format!("\t\treturn {}\n", values.join(", ")));
            out.push_str("\t}\n");
        }
        out
    }

    fn zero_value(&mut self, ty: &TypeDescriptor) -> String {
        if ty.use_pointer {
            return "nil".to_string();
        }
        match &ty.composite {
            Some(CompositeType::Array { .. }) => format!("{}{{}}", ty.render_value(self)),
            Some(CompositeType::Opaque(text)) => {
                let nilable = ["func", "interface", "*", "[]", "map[", "chan", "<-chan"];
                if nilable.iter().any(|prefix| text.starts_with(prefix)) {
                    "nil".to_string()
                } else if text.starts_with("struct") {
                    format!("{text}{{}}")
                } else {
                    format!("*new({text})")
                }
            }
            Some(_) => "nil".to_string(),
            None if ty.is_builtin() => match ty.type_name.as_str() {
                "string" => "\"\"".to_string(),
                "bool" => "false".to_string(),
                "error" | "any" => "nil".to_string(),
                _ => "0".to_string(),
            },
            None if ty.module_path == self.aliases.local_package()
                && self.aggregate_names.contains(&ty.type_name) =>
            {
                format!("{}{{}}", ty.type_name)
            }
            None => format!("*new({})", ty.render_value(self)),
        }
    }
}

fn return_value(value: &ReturnValue) -> String {
    match value {
        ReturnValue::Binding(arg) => arg.render(),
        ReturnValue::NilError => "nil".to_string(),
        ReturnValue::Aggregate {
            type_name,
            address_of,
            fields,
        } => {
            let fields: Vec<String> = fields
                .iter()
                .map(|(name, arg)| format!("{name}: {}", arg.render()))
                .collect();
            let amp = if *address_of { "&" } else { "" };
            format!("{amp}{type_name}{{{}}}", fields.join(", "))
        }
    }
}
