//! Per-component manager. Grounded on
//! `phases::{init, updating}` per-component state tracking and
//! `controller/reconciler.rs`'s phase-driven dispatch, generalized from
//! one sentinel state machine to the four component kinds' converge
//! decision procedure.

use platform_helm::{HelmBackend, InstallOptions, UpgradeOptions};
use platform_types::constants::{chart_name, release_name};
use serde_yaml::Value;

use crate::error::Error;

const METRICS_CHART_REF: &str = "community-charts/kube-prometheus-stack";
const DASHBOARDS_CHART_REF: &str = "vendor-charts/grafana";
const LOGS_CHART_REF: &str = "vendor-charts/loki";
const TRACES_CHART_REF: &str = "vendor-charts/tempo";

fn chart_ref(component_key: &str) -> &'static str {
    match component_key {
        "metrics" => METRICS_CHART_REF,
        "dashboards" => DASHBOARDS_CHART_REF,
        "logs" => LOGS_CHART_REF,
        "traces" => TRACES_CHART_REF,
        other => panic!("unknown component key '{other}'"),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConvergeOutcome {
    Installed,
    Removed,
    UpToDate,
    Upgraded { hops: usize },
    InstallFailed(String),
    UpgradeFailed { completed_hops: usize, message: String },
    /// Uninstall can fail just as install/upgrade can; the manager needs
    /// to report that upward rather than silently drop a failed teardown.
    RemoveFailed(String),
}

/// One manager per component kind, holding its chart reference. The
/// manager itself is stateless; `converge` re-derives everything from
/// the current release and the caller-supplied desired state.
pub struct ComponentManager {
    component_key: &'static str,
}

impl ComponentManager {
    pub fn new(component_key: &'static str) -> Self {
        Self { component_key }
    }

    /// Installs, upgrades, removes, or leaves the release untouched,
    /// whichever the desired state against the current release calls for.
    pub fn converge(
        &self,
        helm: &dyn HelmBackend,
        platform_name: &str,
        namespace: &str,
        enabled: bool,
        target_version: &str,
        values: &Value,
    ) -> Result<ConvergeOutcome, Error> {
        let release_name = release_name(platform_name, self.component_key);
        let chart = chart_ref(self.component_key);

        let current = helm.get(&release_name, namespace).map_err(|source| Error::Transient {
            message: source.to_string(),
        })?;

        match (current, enabled) {
            (None, false) => Ok(ConvergeOutcome::UpToDate),

            (None, true) => {
                match helm.install(
                    &release_name,
                    namespace,
                    chart,
                    target_version,
                    values,
                    InstallOptions {
                        wait: true,
                        atomic: true,
                        timeout: Some(std::time::Duration::from_secs(300)),
                    },
                ) {
                    Ok(_) => Ok(ConvergeOutcome::Installed),
                    Err(source) => Ok(ConvergeOutcome::InstallFailed(source.to_string())),
                }
            }

            (Some(_), false) => match helm.uninstall(&release_name, namespace) {
                Ok(()) => Ok(ConvergeOutcome::Removed),
                Err(source) => Ok(ConvergeOutcome::RemoveFailed(source.to_string())),
            },

            (Some(release), true) => {
                let current_version = platform_types::version::parse(&release.chart_version)
                    .map_err(|source| Error::Validation {
                        message: source.to_string(),
                    })?;
                let target = platform_types::version::parse(target_version).map_err(|source| {
                    Error::Validation {
                        message: source.to_string(),
                    }
                })?;

                let path = platform_types::version::upgrade_path(&current_version, &target);
                let values_unchanged = &release.values == values;

                if path.is_empty() && values_unchanged {
                    return Ok(ConvergeOutcome::UpToDate);
                }

                let hops = if path.is_empty() { vec![target] } else { path };

                for (index, hop) in hops.iter().enumerate() {
                    let result = helm.upgrade(
                        &release_name,
                        namespace,
                        chart,
                        &hop.to_string(),
                        values,
                        UpgradeOptions {
                            wait: true,
                            atomic: true,
                            timeout: Some(std::time::Duration::from_secs(300)),
                            reuse_values: false,
                            cleanup_on_fail: true,
                            max_history: Some(10),
                        },
                    );
                    if let Err(source) = result {
                        return Ok(ConvergeOutcome::UpgradeFailed {
                            completed_hops: index,
                            message: source.to_string(),
                        });
                    }
                }
                Ok(ConvergeOutcome::Upgraded { hops: hops.len() })
            }
        }
    }
}

/// Release storage's chart name for the component, independent of the
/// chart repository (used by the status aggregator's display strings).
pub fn display_chart_name(component_key: &str) -> &'static str {
    chart_name(component_key).unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_ref_covers_every_component_key() {
        for key in platform_types::constants::COMPONENT_KEYS {
            let _ = chart_ref(key);
        }
    }

    #[test]
    #[should_panic]
    fn chart_ref_panics_on_unknown_key() {
        chart_ref("widgets");
    }
}
