use elsa_syntax::syntax::is_reserved_identifier;
use rustc_hash::FxHashSet;

use crate::types::{CompositeType, TypeDescriptor};

/// Hands out identifiers unique within one generated function.
#[derive(Debug, Clone, Default)]
pub struct NameAllocator {
    used: FxHashSet<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `name` as unavailable without handing it out.
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.used.insert(name.into());
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.used.contains(name) || is_reserved_identifier(name)
    }

    /// Returns `base` if free, otherwise `base2`, `base3`, ...
    pub fn allocate(&mut self, base: &str) -> String {
        let base = if base.is_empty() { "value" } else { base };
        let mut name = base.to_string();
        let mut i = 2usize;
        while self.is_taken(&name) {
            name = format!("{base}{i}");
            i += 1;
        }
        self.used.insert(name.clone());
        name
    }
}

/// Variable name a value of this type is bound to before collision handling.
pub(crate) fn binding_base_name(ty: &TypeDescriptor) -> String {
    match &ty.composite {
        Some(composite) => composite_base_name(composite),
        None => sanitize(&lower_first(&ty.type_name)),
    }
}

fn composite_base_name(composite: &CompositeType) -> String {
    match composite {
        CompositeType::Pointer(inner) => binding_base_name(inner),
        CompositeType::Slice(elem) | CompositeType::Array { elem, .. } => {
            format!("{}List", binding_base_name(elem))
        }
        CompositeType::Map { value, .. } => format!("{}Map", binding_base_name(value)),
        CompositeType::Chan { elem, .. } => format!("{}Chan", binding_base_name(elem)),
        CompositeType::Opaque(_) => "value".to_string(),
    }
}

pub(crate) fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| *c == '_' || c.is_alphanumeric())
        .collect();
    if cleaned.is_empty() || cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        "value".to_string()
    } else {
        cleaned
    }
}
