#![deny(clippy::unwrap_used)]

//! Dependency wiring for Go: turns wiring functions and provider sets found in one
//! compilation unit into a generated source file that calls the providers in order.

mod emit;
mod error;
mod extract;
mod imports;
mod names;
mod pipeline;
mod provider_set;
mod resolve;
mod types;

pub use emit::{AliasAllocator, EmitContext, GeneratedFile, ImportAlias, emit_unit};
pub use error::{ErrorKind, WireError};
pub use extract::{
    Aggregate, AggregateField, Markers, ResultDescriptor, WiringFunction, WiringParam,
    extract_wiring_functions,
};
pub use imports::{ImportTable, NoPackageNames, PackageNames, derive_alias};
pub use names::NameAllocator;
pub use pipeline::{GenerateOptions, Unit, UnitSummary, generate_unit, inspect_unit};
pub use provider_set::{
    CachedSignatureLoader, Provider, ProviderRef, ProviderSet, ProviderSets, SetDecl, Signature,
    SignatureLoader, find_set_declarations, load_provider_sets,
};
pub use resolve::{
    Adaptation, Argument, Binding, Plan, ReturnValue, Step, resolve_function,
};
pub use types::{CompositeType, Qualifier, TypeDescriptor, TypeResolver};
