//! Stateless wrapper over the cluster's release-storage convention (the
//! `helm` binary), grounded on
//! `operators/src/upgrade/helm/client.rs::HelmClient`, generalized to the
//! full install/upgrade/uninstall/get/rollback/render operation table.

use serde::Deserialize;
use serde_yaml::Value;
use std::{io::Write, time::Duration};
use tempfile::NamedTempFile;

use crate::args::HelmArgs;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReleaseStatus {
    Deployed,
    Failed,
    PendingInstall,
    PendingUpgrade,
    Uninstalling,
}

#[derive(Debug, Clone)]
pub struct Release {
    pub name: String,
    pub namespace: String,
    pub chart_version: String,
    pub status: ReleaseStatus,
    pub revision: u32,
    pub last_deployed: String,
    pub values: Value,
}

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    pub wait: bool,
    pub atomic: bool,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct UpgradeOptions {
    pub wait: bool,
    pub atomic: bool,
    pub timeout: Option<Duration>,
    pub reuse_values: bool,
    pub cleanup_on_fail: bool,
    pub max_history: Option<u32>,
}

/// Raw shape of one entry of `helm list -o json`.
#[derive(Debug, Clone, Deserialize)]
struct ReleaseElement {
    name: String,
    namespace: String,
    revision: String,
    updated: String,
    status: String,
    chart: String,
}

impl ReleaseElement {
    fn chart_version(&self) -> Result<String, Error> {
        let delimiter = '-';
        let (_, version) = self.chart.rsplit_once(delimiter).ok_or_else(|| {
            Error::HelmChartNameSplit {
                chart_name: self.chart.clone(),
                delimiter,
            }
        })?;
        Ok(version.to_string())
    }

    fn parsed_status(&self) -> Result<ReleaseStatus, Error> {
        match self.status.as_str() {
            "deployed" => Ok(ReleaseStatus::Deployed),
            "failed" => Ok(ReleaseStatus::Failed),
            "pending-install" => Ok(ReleaseStatus::PendingInstall),
            "pending-upgrade" => Ok(ReleaseStatus::PendingUpgrade),
            "uninstalling" => Ok(ReleaseStatus::Uninstalling),
            other => Err(Error::UnknownReleaseStatus(other.to_string())),
        }
    }
}

fn values_tempfile(values: &Value) -> Result<NamedTempFile, Error> {
    let mut file = NamedTempFile::new().map_err(|source| Error::TempFile { source })?;
    let rendered = serde_yaml::to_string(values).map_err(|source| Error::SerializeValues { source })?;
    file.write_all(rendered.as_bytes())
        .map_err(|source| Error::TempFile { source })?;
    Ok(file)
}

/// The operations a component manager needs from a release backend,
/// factored out so tests can substitute an in-memory fake for the real
/// `helm` binary.
pub trait HelmBackend {
    fn get(&self, name: &str, namespace: &str) -> Result<Option<Release>, Error>;

    fn install(
        &self,
        name: &str,
        namespace: &str,
        chart_ref: &str,
        version: &str,
        values: &Value,
        opts: InstallOptions,
    ) -> Result<Release, Error>;

    fn upgrade(
        &self,
        name: &str,
        namespace: &str,
        chart_ref: &str,
        version: &str,
        values: &Value,
        opts: UpgradeOptions,
    ) -> Result<Release, Error>;

    fn uninstall(&self, name: &str, namespace: &str) -> Result<(), Error>;

    fn rollback(&self, name: &str, namespace: &str, target_revision: u32) -> Result<(), Error>;

    fn render(&self, chart_ref: &str, version: &str, values: &Value) -> Result<String, Error>;
}

/// A stateless handle: every call re-derives its arguments, there is no
/// per-release session state kept between calls.
#[derive(Debug, Clone, Default)]
pub struct HelmClient;

impl HelmClient {
    /// Fails if `helm` is not on the PATH, or is not a v3 binary.
    pub fn new() -> Result<Self, Error> {
        let output = HelmArgs::version()?;
        let out_str = String::from_utf8_lossy(&output.stdout).into_owned();
        if !out_str.starts_with("v3.") {
            return Err(Error::UnsupportedHelmVersion(out_str));
        }
        Ok(Self)
    }

    /// `get` returning `Ok(None)` is the canonical "not installed" signal,
    /// distinct from an error.
    pub fn get(&self, name: &str, namespace: &str) -> Result<Option<Release>, Error> {
        let exact_match = format!("^{}$", name);
        let output = HelmArgs {
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }
        .ls(&exact_match)?;

        let elements: Vec<ReleaseElement> = serde_json::from_slice(&output.stdout)
            .map_err(|source| Error::Deserialize { source })?;

        let Some(element) = elements.into_iter().next() else {
            return Ok(None);
        };

        let values_output = HelmArgs {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }
        .get_values()?;
        let values: Value = serde_json::from_slice(&values_output.stdout)
            .map_err(|source| Error::Deserialize { source })?;

        Ok(Some(Release {
            name: element.name.clone(),
            namespace: element.namespace.clone(),
            chart_version: element.chart_version()?,
            status: element.parsed_status()?,
            revision: element
                .revision
                .parse()
                .map_err(|_| Error::InvalidRevision(element.revision.clone()))?,
            last_deployed: element.updated.clone(),
            values,
        }))
    }

    /// Atomic at the release level: on failure (including a `--wait`
    /// timeout) an atomic install rolls back to the pre-operation state,
    /// delegated entirely to helm's own `--atomic`/`--wait` flags.
    pub fn install(
        &self,
        name: &str,
        namespace: &str,
        chart_ref: &str,
        version: &str,
        values: &Value,
        opts: InstallOptions,
    ) -> Result<Release, Error> {
        if self.get(name, namespace)?.is_some() {
            return Err(Error::AlreadyExists(name.to_string()));
        }

        let values_file = values_tempfile(values)?;
        HelmArgs {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            chart_ref: Some(chart_ref.to_string()),
            version: Some(version.to_string()),
            values_file: Some(values_file.path().to_path_buf()),
            wait: opts.wait,
            atomic: opts.atomic,
            timeout: opts.timeout,
            ..Default::default()
        }
        .install()
        .map_err(|source| Error::InstallFailed {
            name: name.to_string(),
            source: Box::new(source),
        })?;

        self.get(name, namespace)?
            .ok_or_else(|| Error::InstallFailed {
                name: name.to_string(),
                source: Box::new(Error::HelmChartNotFound(name.to_string())),
            })
    }

    pub fn upgrade(
        &self,
        name: &str,
        namespace: &str,
        chart_ref: &str,
        version: &str,
        values: &Value,
        opts: UpgradeOptions,
    ) -> Result<Release, Error> {
        let values_file = values_tempfile(values)?;
        HelmArgs {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            chart_ref: Some(chart_ref.to_string()),
            version: Some(version.to_string()),
            values_file: Some(values_file.path().to_path_buf()),
            wait: opts.wait,
            atomic: opts.atomic,
            timeout: opts.timeout,
            reuse_values: opts.reuse_values,
            cleanup_on_fail: opts.cleanup_on_fail,
            max_history: opts.max_history,
        }
        .upgrade()
        .map_err(|source| Error::UpgradeFailed {
            name: name.to_string(),
            source: Box::new(source),
        })?;

        self.get(name, namespace)?
            .ok_or_else(|| Error::UpgradeFailed {
                name: name.to_string(),
                source: Box::new(Error::HelmChartNotFound(name.to_string())),
            })
    }

    pub fn uninstall(&self, name: &str, namespace: &str) -> Result<(), Error> {
        if self.get(name, namespace)?.is_none() {
            return Err(Error::NotFound(name.to_string()));
        }
        HelmArgs {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }
        .uninstall()?;
        Ok(())
    }

    pub fn rollback(&self, name: &str, namespace: &str, target_revision: u32) -> Result<(), Error> {
        HelmArgs {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            wait: true,
            ..Default::default()
        }
        .rollback(target_revision)
        .map_err(|source| Error::RollbackFailed {
            name: name.to_string(),
            source: Box::new(source),
        })?;
        Ok(())
    }

    /// Renders the chart's manifests without touching the cluster.
    pub fn render(&self, chart_ref: &str, version: &str, values: &Value) -> Result<String, Error> {
        let values_file = values_tempfile(values)?;
        let output = HelmArgs {
            name: Some("render".to_string()),
            chart_ref: Some(chart_ref.to_string()),
            version: Some(version.to_string()),
            values_file: Some(values_file.path().to_path_buf()),
            ..Default::default()
        }
        .template()?;
        String::from_utf8(output.stdout).map_err(|source| Error::Utf8 { source })
    }
}

impl HelmBackend for HelmClient {
    fn get(&self, name: &str, namespace: &str) -> Result<Option<Release>, Error> {
        HelmClient::get(self, name, namespace)
    }

    fn install(
        &self,
        name: &str,
        namespace: &str,
        chart_ref: &str,
        version: &str,
        values: &Value,
        opts: InstallOptions,
    ) -> Result<Release, Error> {
        HelmClient::install(self, name, namespace, chart_ref, version, values, opts)
    }

    fn upgrade(
        &self,
        name: &str,
        namespace: &str,
        chart_ref: &str,
        version: &str,
        values: &Value,
        opts: UpgradeOptions,
    ) -> Result<Release, Error> {
        HelmClient::upgrade(self, name, namespace, chart_ref, version, values, opts)
    }

    fn uninstall(&self, name: &str, namespace: &str) -> Result<(), Error> {
        HelmClient::uninstall(self, name, namespace)
    }

    fn rollback(&self, name: &str, namespace: &str, target_revision: u32) -> Result<(), Error> {
        HelmClient::rollback(self, name, namespace, target_revision)
    }

    fn render(&self, chart_ref: &str, version: &str, values: &Value) -> Result<String, Error> {
        HelmClient::render(self, chart_ref, version, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(chart: &str, status: &str, revision: &str) -> ReleaseElement {
        ReleaseElement {
            name: "obs-metrics".to_string(),
            namespace: "observability".to_string(),
            revision: revision.to_string(),
            updated: "2026-01-01T00:00:00Z".to_string(),
            status: status.to_string(),
            chart: chart.to_string(),
        }
    }

    #[test]
    fn chart_version_splits_on_last_dash() {
        let e = element("kube-prometheus-stack-58.2.1", "deployed", "3");
        assert_eq!(e.chart_version().unwrap(), "58.2.1");
    }

    #[test]
    fn chart_version_rejects_name_with_no_dash() {
        let e = element("prometheus", "deployed", "1");
        assert!(matches!(
            e.chart_version(),
            Err(Error::HelmChartNameSplit { .. })
        ));
    }

    #[test]
    fn parsed_status_covers_known_values() {
        assert!(matches!(
            element("c-1.0.0", "deployed", "1").parsed_status().unwrap(),
            ReleaseStatus::Deployed
        ));
        assert!(matches!(
            element("c-1.0.0", "pending-upgrade", "1")
                .parsed_status()
                .unwrap(),
            ReleaseStatus::PendingUpgrade
        ));
    }

    #[test]
    fn parsed_status_rejects_unknown_value() {
        assert!(matches!(
            element("c-1.0.0", "superseded", "1").parsed_status(),
            Err(Error::UnknownReleaseStatus(_))
        ));
    }

    #[test]
    fn values_tempfile_round_trips_through_yaml() {
        let values: Value = serde_yaml::from_str("replicas: 3\nimage:\n  tag: v1\n").unwrap();
        let file = values_tempfile(&values).unwrap();
        let contents = std::fs::read_to_string(file.path()).unwrap();
        let reparsed: Value = serde_yaml::from_str(&contents).unwrap();
        assert_eq!(reparsed, values);
    }
}
