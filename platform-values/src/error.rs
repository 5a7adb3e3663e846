use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown component kind '{0}'")]
    UnknownComponent(String),

    #[error("failed to serialize component spec: {source}")]
    Serialize {
        #[from]
        source: serde_yaml::Error,
    },

    #[error("component '{kind}' is missing required field '{path}'")]
    MissingField { kind: &'static str, path: String },
}
