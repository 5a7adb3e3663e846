//! Error taxonomy for the reconciler and its collaborators, grounded on
//! the `thiserror`-based `Error` enum in `k8s/upgrade/src/error.rs`
//! (one variant per failure site, each wrapping a `source`), mapped onto
//! a kind table: Validation, Transient, Configuration, Conflict,
//! Incompatible, Fatal.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Kind: Validation. Terminal for the current generation; only a
    /// spec edit clears it.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// Kind: Transient. Retried via reconciler requeue, never via an
    /// inner loop.
    #[error("transient failure: {message}")]
    Transient { message: String },

    /// Kind: Configuration. Requeues at the medium interval and sets the
    /// `ConfigurationError` condition.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Kind: Conflict. Retried up to a small bounded count within one
    /// invocation before becoming transient.
    #[error("resource-version conflict on write")]
    Conflict { source: kube::Error },

    /// Kind: Incompatible. A major-version jump was attempted without a
    /// staged path; sets `UpgradeBlocked`, no retry.
    #[error("upgrade blocked: {message}")]
    Incompatible { message: String },

    /// Kind: Fatal. Conversion into the wrong hub type, or a panic
    /// caught at the reconciler boundary; sets `Failed`, no retry for
    /// this generation.
    #[error("fatal error: {message}")]
    Fatal { message: String },

    #[error("kubernetes api error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },
}

impl From<platform_helm::Error> for Error {
    fn from(source: platform_helm::Error) -> Self {
        Error::Transient {
            message: source.to_string(),
        }
    }
}

impl From<platform_values::Error> for Error {
    fn from(source: platform_values::Error) -> Self {
        Error::Configuration {
            message: source.to_string(),
        }
    }
}

impl Error {
    /// The machine-readable condition reason associated with this error's
    /// kind, or `None` for kinds that must not mutate the condition set
    /// (the Transient kind, to avoid flapping the condition set).
    pub fn condition_reason(&self) -> Option<&'static str> {
        match self {
            Error::Validation { .. } => Some("ValidationFailed"),
            Error::Transient { .. } => None,
            Error::Configuration { .. } => Some("ConfigurationError"),
            Error::Conflict { .. } => None,
            Error::Incompatible { .. } => Some("UpgradeBlocked"),
            Error::Fatal { .. } => Some("Failed"),
            Error::Kube { .. } => None,
        }
    }

    pub fn metric_kind(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "validation",
            Error::Transient { .. } => "transient",
            Error::Configuration { .. } => "configuration",
            Error::Conflict { .. } => "conflict",
            Error::Incompatible { .. } => "incompatible",
            Error::Fatal { .. } => "fatal",
            Error::Kube { .. } => "transient",
        }
    }
}
