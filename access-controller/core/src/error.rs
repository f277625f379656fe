pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while compiling and reconciling external access objects.
///
/// Configuration, invariant and compilation errors are scoped to a single
/// listener, ingress config or proxy scope; they are reported and the rest of
/// the pass continues. Backend errors abort the pass.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration for {scope}: {reason}")]
    Configuration { scope: String, reason: String },

    #[error("listener {listener} ingress config {ingress_config}: {reason}")]
    Invariant {
        listener: String,
        ingress_config: String,
        reason: String,
    },

    #[error("failed to compile {artifact} for scope {scope}")]
    Compilation {
        scope: String,
        artifact: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to {action} {kind} {namespace}/{name}")]
    Backend {
        action: &'static str,
        kind: &'static str,
        namespace: String,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("cluster resource is missing {0}")]
    InvalidResource(&'static str),
}

impl Error {
    pub fn configuration(scope: impl ToString, reason: impl ToString) -> Self {
        Self::Configuration {
            scope: scope.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invariant(
        listener: impl ToString,
        ingress_config: impl ToString,
        reason: impl ToString,
    ) -> Self {
        Self::Invariant {
            listener: listener.to_string(),
            ingress_config: ingress_config.to_string(),
            reason: reason.to_string(),
        }
    }

    /// A short label describing the class of error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::Invariant { .. } => "invariant",
            Self::Compilation { .. } => "compilation",
            Self::Backend { .. } => "backend",
            Self::InvalidResource(_) => "invalid_resource",
        }
    }

    /// Scoped errors are reported without aborting the pass.
    pub fn is_scoped(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::Invariant { .. } | Self::Compilation { .. }
        )
    }
}
