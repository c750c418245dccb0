use elsa_syntax::{CallExpr, Expr, FuncDecl, SourceFile, Span, TypeBody, TypeExpr};
use serde::Serialize;

use crate::types::{TypeDescriptor, TypeResolver};

/// Names of the marker package and its two entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    /// Alias the marker package is imported under.
    pub package: String,
    pub generate: String,
    pub set: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self::new("elsa")
    }
}

impl Markers {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            generate: "Generate".to_string(),
            set: "Set".to_string(),
        }
    }

    pub(crate) fn is_generate(&self, call: &CallExpr) -> bool {
        call.func.as_qualified_name() == Some((self.package.as_str(), self.generate.as_str()))
    }

    pub(crate) fn is_set(&self, call: &CallExpr) -> bool {
        call.func.as_qualified_name() == Some((self.package.as_str(), self.set.as_str()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WiringParam {
    /// `param_name` is the declared name, if any.
    pub ty: TypeDescriptor,
    pub variadic: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateField {
    /// Field name; for embedded fields the type's bare name.
    pub name: String,
    pub ty: TypeDescriptor,
    pub raw_tag: Option<String>,
    pub embedded: bool,
}

/// A struct type declared in the wiring unit.
#[derive(Debug, Clone, Serialize)]
pub struct Aggregate {
    pub name: String,
    pub fields: Vec<AggregateField>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultDescriptor {
    pub ty: TypeDescriptor,
    pub aggregate: Option<Aggregate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WiringFunction {
    pub name: String,
    pub owner_package: String,
    pub params: Vec<WiringParam>,
    pub results: Vec<ResultDescriptor>,
    pub referenced_sets: Vec<String>,
    #[serde(skip)]
    pub span: Span,
}

impl WiringFunction {
    /// True when the last declared result is `error`.
    pub fn returns_error(&self) -> bool {
        self.results.last().is_some_and(|result| result.ty.is_error())
    }
}

/// Collects every plain function in `file` whose body calls the generate marker.
pub fn extract_wiring_functions(
    file: &SourceFile,
    resolver: &TypeResolver<'_>,
    markers: &Markers,
) -> Vec<WiringFunction> {
    file.functions()
        .filter(|func| func.receiver.is_none())
        .filter_map(|func| {
            let generate = find_call(func, |call| markers.is_generate(call))?;
            Some(WiringFunction {
                name: func.name.name.clone(),
                owner_package: file.package.name.clone(),
                params: extract_params(func, resolver),
                results: extract_results(file, func, resolver),
                referenced_sets: generate.args.iter().map(set_reference).collect(),
                span: func.span,
            })
        })
        .collect()
}

fn set_reference(arg: &Expr) -> String {
    match arg {
        Expr::Ident(name) => name.name.clone(),
        other => other.to_string(),
    }
}

fn extract_params(func: &FuncDecl, resolver: &TypeResolver<'_>) -> Vec<WiringParam> {
    let mut params = Vec::new();
    for field in &func.params {
        let ty = if field.variadic {
            resolver.resolve_variadic(&field.ty)
        } else {
            resolver.resolve(&field.ty)
        };
        if field.names.is_empty() {
            params.push(WiringParam {
                ty,
                variadic: field.variadic,
            });
            continue;
        }
        for name in &field.names {
            params.push(WiringParam {
                ty: ty.clone().with_param_name(&name.name),
                variadic: field.variadic,
            });
        }
    }
    params
}

fn extract_results(
    file: &SourceFile,
    func: &FuncDecl,
    resolver: &TypeResolver<'_>,
) -> Vec<ResultDescriptor> {
    let mut results = Vec::new();
    for field in &func.results {
        let ty = resolver.resolve(&field.ty);
        let aggregate = local_aggregate(file, &field.ty, resolver);
        // Named results share one type per group; each name is its own result.
        for _ in 0..field.names.len().max(1) {
            results.push(ResultDescriptor {
                ty: ty.clone(),
                aggregate: aggregate.clone(),
            });
        }
    }
    results
}

/// The struct declared in `file` that `ty` names, looking through one pointer.
fn local_aggregate(
    file: &SourceFile,
    ty: &TypeExpr,
    resolver: &TypeResolver<'_>,
) -> Option<Aggregate> {
    let name = match ty {
        TypeExpr::Ident(name) => name,
        TypeExpr::Pointer(inner) => match inner.as_ref() {
            TypeExpr::Ident(name) => name,
            _ => return None,
        },
        _ => return None,
    };
    let spec = file
        .type_specs()
        .find(|spec| spec.name.name == *name && !spec.alias && spec.type_params.is_none())?;
    let TypeBody::Struct(fields) = &spec.body else {
        return None;
    };
    let mut out = Vec::new();
    for field in fields {
        let ty = resolver.resolve(&field.ty);
        if field.names.is_empty() {
            out.push(AggregateField {
                name: embedded_name(&field.ty),
                ty,
                raw_tag: field.tag.clone(),
                embedded: true,
            });
            continue;
        }
        for field_name in &field.names {
            out.push(AggregateField {
                name: field_name.name.clone(),
                ty: ty.clone(),
                raw_tag: field.tag.clone(),
                embedded: false,
            });
        }
    }
    Some(Aggregate {
        name: name.clone(),
        fields: out,
    })
}

fn embedded_name(ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Ident(name) | TypeExpr::Selector { name, .. } => name.clone(),
        TypeExpr::Pointer(inner) => embedded_name(inner),
        other => other.to_string(),
    }
}

/// First call in the body, in source order, satisfying `pred`.
fn find_call<'a>(func: &'a FuncDecl, pred: impl Fn(&CallExpr) -> bool) -> Option<&'a CallExpr> {
    let body = func.body.as_ref()?;
    let mut stack: Vec<&CallExpr> = body.calls.iter().rev().collect();
    while let Some(call) = stack.pop() {
        if pred(call) {
            return Some(call);
        }
        let mut nested = Vec::new();
        collect_nested(&call.func, &mut nested);
        for arg in &call.args {
            collect_nested(arg, &mut nested);
        }
        stack.extend(nested.into_iter().rev());
    }
    None
}

fn collect_nested<'a>(expr: &'a Expr, out: &mut Vec<&'a CallExpr>) {
    match expr {
        Expr::Call(call) => out.push(call),
        Expr::Selector { base, .. } => collect_nested(base, out),
        Expr::Other { calls, .. } => out.extend(calls.iter()),
        Expr::Ident(_) | Expr::Literal { .. } => {}
    }
}
