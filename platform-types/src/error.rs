use thiserror::Error;

/// Errors raised while parsing versions, converting schemas, or otherwise
/// manipulating platform types outside of a live cluster.
#[derive(Debug, Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Version string failed semver parsing.
    #[error("failed to parse version '{version}': {source}")]
    SemverParse {
        version: String,
        source: semver::Error,
    },

    /// `latest` was asked for a chart with no non-prerelease versions.
    #[error("chart '{chart}' has no stable version")]
    NoStableVersion { chart: String },

    /// Conversion was attempted into an object of the wrong kind.
    #[error("cannot convert into wrong hub type: expected '{expected}', got '{actual}'")]
    WrongHubType { expected: String, actual: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
