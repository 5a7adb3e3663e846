//! Hub/spoke CRD schema, the version registry and semver comparator, and
//! the schema converter for the observability platform operator.

pub mod constants;
pub mod convert;
pub mod error;
pub mod spec;
pub mod status;
pub mod version;

pub use error::{Error, Result};
