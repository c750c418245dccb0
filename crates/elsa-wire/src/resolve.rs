use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::error::WireError;
use crate::extract::{WiringFunction, WiringParam};
use crate::names::{NameAllocator, binding_base_name};
use crate::provider_set::{Provider, ProviderSets};
use crate::types::TypeDescriptor;

/// How a bound value is passed where a type of the same identity is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Adaptation {
    Direct,
    AddressOf,
    Deref,
}

impl Adaptation {
    pub fn between(bound_pointer: bool, wanted_pointer: bool) -> Self {
        match (bound_pointer, wanted_pointer) {
            (false, true) => Adaptation::AddressOf,
            (true, false) => Adaptation::Deref,
            _ => Adaptation::Direct,
        }
    }

    pub fn apply(self, name: &str) -> String {
        match self {
            Adaptation::Direct => name.to_string(),
            Adaptation::AddressOf => format!("&{name}"),
            Adaptation::Deref => format!("*{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub key: String,
    pub name: String,
    pub use_pointer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Argument {
    pub name: String,
    pub adaptation: Adaptation,
}

impl Argument {
    fn to(binding: &Binding, wanted_pointer: bool) -> Self {
        Self {
            name: binding.name.clone(),
            adaptation: Adaptation::between(binding.use_pointer, wanted_pointer),
        }
    }

    pub fn render(&self) -> String {
        self.adaptation.apply(&self.name)
    }
}

/// One provider call in emission order.
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub provider: Provider,
    pub args: Vec<Argument>,
    /// Variables assigned from the call's results, `err` for a trailing error.
    pub outputs: Vec<String>,
    /// False when every output already exists and the call assigns with `=`.
    pub declares: bool,
}

#[derive(Debug, Clone, Serialize)]
pub enum ReturnValue {
    Binding(Argument),
    Aggregate {
        type_name: String,
        address_of: bool,
        fields: Vec<(String, Argument)>,
    },
    NilError,
}

/// Resolution result for one wiring function.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub function: String,
    /// Parameter names as emitted, aligned with the function's parameters.
    pub param_names: Vec<String>,
    pub steps: Vec<Step>,
    /// Every variable a step introduced, in order.
    pub generated_vars: Vec<String>,
    pub returns: Vec<ReturnValue>,
}

impl Plan {
    pub fn checks_errors(&self) -> bool {
        self.steps.iter().any(|step| step.provider.returns_error())
    }
}

/// Orders the providers of the sets `func` references so that each runs once all of its
/// inputs are bound. A provider is only eligible while none of its results is bound yet.
///
/// `reserved` holds identifiers the generated code must not shadow, such as package
/// aliases in scope.
pub fn resolve_function(
    func: &WiringFunction,
    sets: &ProviderSets,
    reserved: &FxHashSet<String>,
) -> Result<Plan, WireError> {
    check_duplicate_sources(func)?;

    // A constructor listed by several sets (or a set referenced twice) joins the pool once.
    let mut pool: Vec<&Provider> = Vec::new();
    let mut pooled: FxHashSet<(&str, &str)> = FxHashSet::default();
    for set_name in &func.referenced_sets {
        let set = sets.get(set_name).ok_or_else(|| WireError::UnknownSet {
            function: func.name.clone(),
            set: set_name.clone(),
        })?;
        for provider in &set.providers {
            if pooled.insert((provider.package_path.as_str(), provider.function_name.as_str())) {
                pool.push(provider);
            } else {
                tracing::debug!(
                    function = %func.name,
                    set = %set_name,
                    provider = %provider,
                    "provider already pooled"
                );
            }
        }
    }
    for provider in &pool {
        check_distinct_results(func, provider)?;
    }

    let error_checked = pool.iter().any(|provider| provider.returns_error());
    if error_checked && !func.returns_error() {
        if let Some(provider) = pool.iter().find(|provider| provider.returns_error()) {
            return Err(WireError::ErrorNotReturnable {
                function: func.name.clone(),
                provider: provider.to_string(),
            });
        }
    }

    let mut names = NameAllocator::new();
    for name in reserved {
        names.reserve(name.clone());
    }
    if error_checked {
        names.reserve("err");
    }

    let mut bindings: IndexMap<String, Binding> = IndexMap::new();
    let mut param_names = Vec::with_capacity(func.params.len());
    for param in &func.params {
        let name = names.allocate(&param_base_name(param));
        bindings.insert(
            param.ty.key(),
            Binding {
                key: param.ty.key(),
                name: name.clone(),
                use_pointer: param.ty.use_pointer,
            },
        );
        param_names.push(name);
    }

    let mut steps = Vec::new();
    let mut generated_vars = Vec::new();
    let mut err_declared = false;
    'fixed_point: while !pool.is_empty() {
        for index in 0..pool.len() {
            if !is_eligible(pool[index], &bindings) {
                continue;
            }
            let provider = pool.remove(index);
            let args = provider
                .params
                .iter()
                .filter_map(|param| {
                    bindings
                        .get(&param.key())
                        .map(|binding| Argument::to(binding, param.use_pointer))
                })
                .collect();
            let mut outputs = Vec::with_capacity(provider.results.len());
            let mut declares = false;
            for result in provider.bound_results() {
                let name = names.allocate(&binding_base_name(result));
                bindings.insert(
                    result.key(),
                    Binding {
                        key: result.key(),
                        name: name.clone(),
                        use_pointer: result.use_pointer,
                    },
                );
                generated_vars.push(name.clone());
                outputs.push(name);
                declares = true;
            }
            if provider.returns_error() {
                outputs.push("err".to_string());
                declares |= !err_declared;
                err_declared = true;
            }
            tracing::debug!(
                function = %func.name,
                provider = %provider,
                outputs = ?outputs,
                "resolved provider"
            );
            steps.push(Step {
                provider: provider.clone(),
                args,
                outputs,
                declares,
            });
            continue 'fixed_point;
        }
        return Err(unresolvable(func, pool[0], &bindings));
    }

    let returns = plan_returns(func, &bindings)?;
    Ok(Plan {
        function: func.name.clone(),
        param_names,
        steps,
        generated_vars,
        returns,
    })
}

fn check_duplicate_sources(func: &WiringFunction) -> Result<(), WireError> {
    let mut seen: IndexMap<String, &WiringParam> = IndexMap::new();
    for param in &func.params {
        let key = param.ty.key();
        if let Some(first) = seen.get(&key) {
            return Err(WireError::DuplicateSource {
                function: func.name.clone(),
                key,
                first: display_param(first),
                second: display_param(param),
            });
        }
        seen.insert(key, param);
    }
    Ok(())
}

/// A provider returning one identity twice would bind it twice.
fn check_distinct_results(func: &WiringFunction, provider: &Provider) -> Result<(), WireError> {
    let mut seen = FxHashSet::default();
    let conflicting: Vec<String> = provider
        .bound_results()
        .iter()
        .map(TypeDescriptor::key)
        .filter(|key| !seen.insert(key.clone()))
        .collect();
    if conflicting.is_empty() {
        return Ok(());
    }
    Err(WireError::UnresolvableProvider {
        function: func.name.clone(),
        provider: provider.to_string(),
        missing: Vec::new(),
        conflicting,
    })
}

fn display_param(param: &WiringParam) -> String {
    param
        .ty
        .param_name
        .clone()
        .unwrap_or_else(|| param.ty.canonical())
}

fn param_base_name(param: &WiringParam) -> String {
    match param.ty.param_name.as_deref() {
        Some(name) if !name.is_empty() && name != "_" => name.to_string(),
        _ => binding_base_name(&param.ty),
    }
}

fn is_eligible(provider: &Provider, bindings: &IndexMap<String, Binding>) -> bool {
    provider
        .params
        .iter()
        .all(|param| bindings.contains_key(&param.key()))
        && provider
            .bound_results()
            .iter()
            .all(|result| !bindings.contains_key(&result.key()))
}

fn unresolvable(
    func: &WiringFunction,
    provider: &Provider,
    bindings: &IndexMap<String, Binding>,
) -> WireError {
    let missing = provider
        .params
        .iter()
        .map(TypeDescriptor::key)
        .filter(|key| !bindings.contains_key(key))
        .collect();
    let conflicting = provider
        .bound_results()
        .iter()
        .map(TypeDescriptor::key)
        .filter(|key| bindings.contains_key(key))
        .collect();
    WireError::UnresolvableProvider {
        function: func.name.clone(),
        provider: provider.to_string(),
        missing,
        conflicting,
    }
}

fn plan_returns(
    func: &WiringFunction,
    bindings: &IndexMap<String, Binding>,
) -> Result<Vec<ReturnValue>, WireError> {
    let last = func.results.len().saturating_sub(1);
    let mut returns = Vec::with_capacity(func.results.len());
    for (index, result) in func.results.iter().enumerate() {
        if index == last && result.ty.is_error() {
            returns.push(ReturnValue::NilError);
            continue;
        }
        if let Some(aggregate) = &result.aggregate {
            let mut fields = Vec::with_capacity(aggregate.fields.len());
            for field in &aggregate.fields {
                let binding =
                    bindings
                        .get(&field.ty.key())
                        .ok_or_else(|| WireError::UnboundField {
                            function: func.name.clone(),
                            aggregate: aggregate.name.clone(),
                            field: field.name.clone(),
                            key: field.ty.key(),
                        })?;
                fields.push((
                    field.name.clone(),
                    Argument::to(binding, field.ty.use_pointer),
                ));
            }
            returns.push(ReturnValue::Aggregate {
                type_name: aggregate.name.clone(),
                address_of: result.ty.use_pointer,
                fields,
            });
            continue;
        }
        let binding = bindings
            .get(&result.ty.key())
            .ok_or_else(|| WireError::UnboundResult {
                function: func.name.clone(),
                key: result.ty.key(),
            })?;
        returns.push(ReturnValue::Binding(Argument::to(
            binding,
            result.ty.use_pointer,
        )));
    }
    Ok(returns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Aggregate, AggregateField, ResultDescriptor};
    use crate::provider_set::ProviderSet;

    const APP: &str = "example.com/app";

    fn local(name: &str) -> TypeDescriptor {
        TypeDescriptor::named(APP, name, "")
    }

    fn provider(name: &str, params: Vec<TypeDescriptor>, results: Vec<TypeDescriptor>) -> Provider {
        Provider {
            function_name: name.to_string(),
            package_alias: String::new(),
            package_path: APP.to_string(),
            params,
            results,
        }
    }

    fn sets(providers: Vec<Provider>) -> ProviderSets {
        let mut sets = ProviderSets::new();
        sets.insert(
            "AppSet".to_string(),
            ProviderSet {
                name: "AppSet".to_string(),
                providers,
            },
        );
        sets
    }

    fn param(name: &str, ty: TypeDescriptor) -> WiringParam {
        WiringParam {
            ty: ty.with_param_name(name),
            variadic: false,
        }
    }

    fn result(ty: TypeDescriptor) -> ResultDescriptor {
        ResultDescriptor {
            ty,
            aggregate: None,
        }
    }

    fn wiring(params: Vec<WiringParam>, results: Vec<ResultDescriptor>) -> WiringFunction {
        WiringFunction {
            name: "Init".to_string(),
            owner_package: "app".to_string(),
            params,
            results,
            referenced_sets: vec!["AppSet".to_string()],
            span: Default::default(),
        }
    }

    #[test]
    fn single_step_plan_returns_the_binding() {
        let func = wiring(
            vec![param("db", local("Database").pointer())],
            vec![result(local("Repository"))],
        );
        let sets = sets(vec![provider(
            "NewRepository",
            vec![local("Database")],
            vec![local("Repository")],
        )]);
        let plan = resolve_function(&func, &sets, &FxHashSet::default()).expect("plan");
        assert_eq!(plan.param_names, vec!["db"]);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].args[0].render(), "*db");
        assert_eq!(plan.steps[0].outputs, vec!["repository"]);
        assert_eq!(plan.generated_vars, vec!["repository"]);
        assert!(matches!(
            &plan.returns[0],
            ReturnValue::Binding(arg) if arg.render() == "repository"
        ));
    }

    #[test]
    fn aggregate_results_are_built_from_bindings() {
        let service = Aggregate {
            name: "Service".to_string(),
            fields: vec![AggregateField {
                name: "Repo".to_string(),
                ty: local("Repository"),
                raw_tag: None,
                embedded: false,
            }],
        };
        let func = wiring(
            vec![param("db", local("Database"))],
            vec![ResultDescriptor {
                ty: local("Service").pointer(),
                aggregate: Some(service),
            }],
        );
        let sets = sets(vec![provider(
            "NewRepository",
            vec![local("Database")],
            vec![local("Repository")],
        )]);
        let plan = resolve_function(&func, &sets, &FxHashSet::default()).expect("plan");
        let ReturnValue::Aggregate {
            type_name,
            address_of,
            fields,
        } = &plan.returns[0]
        else {
            panic!("expected aggregate return");
        };
        assert_eq!(type_name, "Service");
        assert!(*address_of);
        assert_eq!(fields[0].0, "Repo");
        assert_eq!(fields[0].1.render(), "repository");
    }

    #[test]
    fn resolves_out_of_declaration_order() {
        let func = wiring(vec![param("cfg", local("Config"))], vec![result(local("Server"))]);
        let sets = sets(vec![
            provider("NewServer", vec![local("Handler")], vec![local("Server")]),
            provider("NewHandler", vec![local("Config")], vec![local("Handler")]),
        ]);
        let plan = resolve_function(&func, &sets, &FxHashSet::default()).expect("plan");
        let order: Vec<&str> = plan
            .steps
            .iter()
            .map(|step| step.provider.function_name.as_str())
            .collect();
        assert_eq!(order, vec!["NewHandler", "NewServer"]);
    }

    #[test]
    fn missing_input_is_a_resolution_error() {
        let func = wiring(vec![], vec![result(local("Repository"))]);
        let sets = sets(vec![provider(
            "NewRepository",
            vec![local("Database")],
            vec![local("Repository")],
        )]);
        let err = resolve_function(&func, &sets, &FxHashSet::default()).expect_err("unresolvable");
        let WireError::UnresolvableProvider {
            provider, missing, ..
        } = err
        else {
            panic!("unexpected error {err:?}");
        };
        assert_eq!(provider, "NewRepository");
        assert_eq!(missing, vec!["example.com/app.Database"]);
    }

    #[test]
    fn second_producer_of_a_type_is_rejected() {
        let func = wiring(vec![], vec![result(local("Logger"))]);
        let sets = sets(vec![
            provider("NewLogger", vec![], vec![local("Logger")]),
            provider("NewOtherLogger", vec![], vec![local("Logger")]),
        ]);
        let err = resolve_function(&func, &sets, &FxHashSet::default()).expect_err("conflict");
        assert!(matches!(
            err,
            WireError::UnresolvableProvider { ref provider, ref conflicting, .. }
                if provider == "NewOtherLogger" && conflicting == &vec!["example.com/app.Logger".to_string()]
        ));
    }

    #[test]
    fn provider_shared_by_two_sets_runs_once() {
        let func = WiringFunction {
            referenced_sets: vec!["BaseSet".to_string(), "RepoSet".to_string()],
            ..wiring(vec![], vec![result(local("Repo"))])
        };
        let mut sets = ProviderSets::new();
        for (name, providers) in [
            (
                "BaseSet",
                vec![provider("NewLogger", vec![], vec![local("Logger")])],
            ),
            (
                "RepoSet",
                vec![
                    provider("NewLogger", vec![], vec![local("Logger")]),
                    provider("NewRepo", vec![local("Logger")], vec![local("Repo")]),
                ],
            ),
        ] {
            sets.insert(
                name.to_string(),
                ProviderSet {
                    name: name.to_string(),
                    providers,
                },
            );
        }
        let plan = resolve_function(&func, &sets, &FxHashSet::default()).expect("plan");
        let order: Vec<&str> = plan
            .steps
            .iter()
            .map(|step| step.provider.function_name.as_str())
            .collect();
        assert_eq!(order, vec!["NewLogger", "NewRepo"]);
        assert_eq!(plan.generated_vars, vec!["logger", "repo"]);
    }

    #[test]
    fn set_referenced_twice_is_pooled_once() {
        let func = WiringFunction {
            referenced_sets: vec!["AppSet".to_string(), "AppSet".to_string()],
            ..wiring(vec![], vec![result(local("Repo"))])
        };
        let sets = sets(vec![
            provider("NewLogger", vec![], vec![local("Logger")]),
            provider("NewRepo", vec![local("Logger")], vec![local("Repo")]),
        ]);
        let plan = resolve_function(&func, &sets, &FxHashSet::default()).expect("plan");
        assert_eq!(plan.steps.len(), 2);
        assert!(matches!(
            &plan.returns[0],
            ReturnValue::Binding(arg) if arg.render() == "repo"
        ));
    }

    #[test]
    fn provider_returning_one_type_twice_is_rejected() {
        let func = wiring(vec![], vec![result(local("Conn"))]);
        let sets = sets(vec![provider(
            "Pair",
            vec![],
            vec![local("Conn"), local("Conn")],
        )]);
        let err = resolve_function(&func, &sets, &FxHashSet::default()).expect_err("conflict");
        assert!(matches!(
            err,
            WireError::UnresolvableProvider { ref provider, ref missing, ref conflicting, .. }
                if provider == "Pair"
                    && missing.is_empty()
                    && conflicting == &vec!["example.com/app.Conn".to_string()]
        ));
    }

    #[test]
    fn cycles_terminate_with_an_error() {
        let func = wiring(vec![], vec![]);
        let sets = sets(vec![
            provider("NewA", vec![local("B")], vec![local("A")]),
            provider("NewB", vec![local("A")], vec![local("B")]),
        ]);
        let err = resolve_function(&func, &sets, &FxHashSet::default()).expect_err("cycle");
        assert!(matches!(err, WireError::UnresolvableProvider { ref provider, .. } if provider == "NewA"));
    }

    #[test]
    fn duplicate_parameter_types_fail_before_resolution() {
        let mut func = wiring(
            vec![param("a", local("Config")), param("b", local("Config").pointer())],
            vec![],
        );
        func.referenced_sets = vec!["Missing".to_string()];
        let err = resolve_function(&func, &ProviderSets::new(), &FxHashSet::default())
            .expect_err("duplicate");
        assert!(matches!(err, WireError::DuplicateSource { ref first, ref second, .. } if first == "a" && second == "b"));
    }

    #[test]
    fn unknown_set_is_reported() {
        let func = wiring(vec![], vec![]);
        let err = resolve_function(&func, &ProviderSets::new(), &FxHashSet::default())
            .expect_err("unknown set");
        assert!(matches!(err, WireError::UnknownSet { ref set, .. } if set == "AppSet"));
    }

    #[test]
    fn colliding_names_get_numeric_suffixes() {
        let other = |name: &str| TypeDescriptor::named("example.com/other", name, "other");
        let func = wiring(vec![], vec![]);
        let sets = sets(vec![
            provider("NewLogger", vec![], vec![local("Logger")]),
            provider("NewOtherLogger", vec![], vec![other("Logger")]),
            provider("NewThirdLogger", vec![], vec![TypeDescriptor::named("example.com/third", "Logger", "third")]),
        ]);
        let mut reserved = FxHashSet::default();
        reserved.insert("other".to_string());
        let plan = resolve_function(&func, &sets, &reserved).expect("plan");
        assert_eq!(plan.generated_vars, vec!["logger", "logger2", "logger3"]);
    }

    #[test]
    fn error_results_are_checked_not_bound() {
        let func = wiring(
            vec![],
            vec![result(local("Database")), result(TypeDescriptor::builtin("error"))],
        );
        let sets = sets(vec![
            provider(
                "OpenDatabase",
                vec![],
                vec![local("Database"), TypeDescriptor::builtin("error")],
            ),
            provider("Migrate", vec![local("Database")], vec![TypeDescriptor::builtin("error")]),
        ]);
        let plan = resolve_function(&func, &sets, &FxHashSet::default()).expect("plan");
        assert!(plan.checks_errors());
        assert_eq!(plan.steps[0].outputs, vec!["database", "err"]);
        assert!(plan.steps[0].declares);
        assert_eq!(plan.steps[1].outputs, vec!["err"]);
        assert!(!plan.steps[1].declares);
        assert!(matches!(plan.returns[1], ReturnValue::NilError));
    }

    #[test]
    fn error_provider_requires_error_result() {
        let func = wiring(vec![], vec![result(local("Database"))]);
        let sets = sets(vec![provider(
            "OpenDatabase",
            vec![],
            vec![local("Database"), TypeDescriptor::builtin("error")],
        )]);
        let err = resolve_function(&func, &sets, &FxHashSet::default()).expect_err("not returnable");
        assert!(matches!(err, WireError::ErrorNotReturnable { .. }));
    }

    #[test]
    fn unbound_result_is_reported() {
        let func = wiring(vec![], vec![result(local("Server"))]);
        let err = resolve_function(&func, &sets(vec![]), &FxHashSet::default())
            .expect_err("unbound");
        assert!(matches!(err, WireError::UnboundResult { ref key, .. } if key == "example.com/app.Server"));
    }

    #[test]
    fn unnamed_parameters_get_type_derived_names() {
        let func = wiring(
            vec![WiringParam {
                ty: local("Config"),
                variadic: false,
            }, param("_", local("Clock"))],
            vec![],
        );
        let plan = resolve_function(&func, &sets(vec![]), &FxHashSet::default()).expect("plan");
        assert_eq!(plan.param_names, vec!["config", "clock"]);
    }
}
