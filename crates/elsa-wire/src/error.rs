use serde::Serialize;

/// Coarse classification used by the driver to report failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The wiring source itself is malformed.
    Authoring,
    /// Providers could not be ordered into a complete plan.
    Resolution,
    /// A provider signature could not be loaded.
    SignatureLoad,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum WireError {
    #[error("{function}: parameters `{first}` and `{second}` have the same type {key}")]
    DuplicateSource {
        function: String,
        key: String,
        first: String,
        second: String,
    },
    #[error("{function}: unknown provider set `{set}`")]
    UnknownSet { function: String, set: String },
    #[error("provider set `{set}` refers to `{alias}`, which is not an imported package")]
    UnknownAlias { set: String, alias: String },
    #[error("the marker package `{marker}` is not imported")]
    MarkerImportMissing { marker: String },
    #[error("{function}: cannot resolve provider {provider}{}", describe_blockers(.missing, .conflicting))]
    UnresolvableProvider {
        function: String,
        provider: String,
        missing: Vec<String>,
        conflicting: Vec<String>,
    },
    #[error("{function}: no provider produces result type {key}")]
    UnboundResult { function: String, key: String },
    #[error("{function}: no provider produces field `{aggregate}.{field}` of type {key}")]
    UnboundField {
        function: String,
        aggregate: String,
        field: String,
        key: String,
    },
    #[error("{function}: provider {provider} returns an error, but {function} has no trailing error result")]
    ErrorNotReturnable { function: String, provider: String },
    #[error("failed to load signature of {package}.{function}: {message}")]
    SignatureLoad {
        package: String,
        function: String,
        message: String,
    },
    #[error("generated code for {path} does not parse: {message}")]
    InvalidOutput { path: String, message: String },
}

impl WireError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WireError::DuplicateSource { .. }
            | WireError::UnknownSet { .. }
            | WireError::UnknownAlias { .. }
            | WireError::MarkerImportMissing { .. }
            | WireError::ErrorNotReturnable { .. } => ErrorKind::Authoring,
            WireError::UnresolvableProvider { .. }
            | WireError::UnboundResult { .. }
            | WireError::UnboundField { .. }
            | WireError::InvalidOutput { .. } => ErrorKind::Resolution,
            WireError::SignatureLoad { .. } => ErrorKind::SignatureLoad,
        }
    }
}

fn describe_blockers(missing: &[String], conflicting: &[String]) -> String {
    let mut out = String::new();
    if !missing.is_empty() {
        out.push_str(&format!(": missing {}", missing.join(", ")));
    }
    if !conflicting.is_empty() {
        out.push_str(if missing.is_empty() { ": " } else { "; " });
        out.push_str(&format!("already provided {}", conflicting.join(", ")));
    }
    out
}
