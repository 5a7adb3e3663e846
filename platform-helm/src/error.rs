use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to execute helm: {source}")]
    HelmCommandNotExecutable { source: std::io::Error },

    #[error("helm command failed: {stderr}")]
    HelmCommandFailed { stderr: String },

    #[error("unsupported helm version: {0}, expected a v3.x client")]
    UnsupportedHelmVersion(String),

    #[error("could not split chart name '{chart_name}' on '{delimiter}' to recover its version")]
    HelmChartNameSplit { chart_name: String, delimiter: char },

    #[error("chart '{0}' not found")]
    HelmChartNotFound(String),

    #[error("unknown release status '{0}'")]
    UnknownReleaseStatus(String),

    #[error("invalid release revision '{0}'")]
    InvalidRevision(String),

    #[error("failed to create a temporary values file: {source}")]
    TempFile { source: std::io::Error },

    #[error("failed to serialize values to yaml: {source}")]
    SerializeValues { source: serde_yaml::Error },

    #[error("failed to deserialize helm output: {source}")]
    Deserialize { source: serde_json::Error },

    #[error("helm output was not valid utf-8: {source}")]
    Utf8 { source: std::string::FromUtf8Error },

    #[error("release '{0}' already exists")]
    AlreadyExists(String),

    #[error("release '{0}' not found")]
    NotFound(String),

    #[error("install of release '{name}' failed: {source}")]
    InstallFailed { name: String, source: Box<Error> },

    #[error("upgrade of release '{name}' failed: {source}")]
    UpgradeFailed { name: String, source: Box<Error> },

    #[error("rollback of release '{name}' failed: {source}")]
    RollbackFailed { name: String, source: Box<Error> },
}
