//! Helm orchestration client: shells out to the `helm` binary,
//! generalized from one hard-coded chart to an arbitrary chart
//! reference per call.

pub mod args;
pub mod client;
pub mod error;

pub use client::{HelmBackend, HelmClient, InstallOptions, Release, ReleaseStatus, UpgradeOptions};
pub use error::Error;
