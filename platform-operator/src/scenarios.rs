//! End-to-end scenario tests driving the per-component manager and the
//! teardown coordinator against an in-memory Helm double, the way the
//! own test modules favor direct struct construction over a
//! live cluster.

#![cfg(test)]

use std::collections::HashMap;
use std::sync::Mutex;

use platform_helm::{HelmBackend, InstallOptions, Release, ReleaseStatus, UpgradeOptions};
use serde_yaml::Value;

use crate::finalizer::teardown;
use crate::managers::ComponentManager;
use crate::managers::ConvergeOutcome;
use crate::status::aggregate_phase;
use platform_types::spec::common::ComponentSet;
use platform_types::status::{ComponentPhase, ComponentStatus};
use std::collections::BTreeMap;

#[derive(Default)]
struct FakeHelm {
    releases: Mutex<HashMap<(String, String), Release>>,
}

impl FakeHelm {
    fn with(self, name: &str, namespace: &str, chart_version: &str, values: Value) -> Self {
        self.releases.lock().unwrap().insert(
            (namespace.to_string(), name.to_string()),
            Release {
                name: name.to_string(),
                namespace: namespace.to_string(),
                chart_version: chart_version.to_string(),
                status: ReleaseStatus::Deployed,
                revision: 1,
                last_deployed: "2026-01-01T00:00:00Z".to_string(),
                values,
            },
        );
        self
    }
}

impl HelmBackend for FakeHelm {
    fn get(&self, name: &str, namespace: &str) -> Result<Option<Release>, platform_helm::Error> {
        Ok(self
            .releases
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    fn install(
        &self,
        name: &str,
        namespace: &str,
        _chart_ref: &str,
        version: &str,
        values: &Value,
        _opts: InstallOptions,
    ) -> Result<Release, platform_helm::Error> {
        let mut releases = self.releases.lock().unwrap();
        let key = (namespace.to_string(), name.to_string());
        if releases.contains_key(&key) {
            return Err(platform_helm::Error::AlreadyExists(name.to_string()));
        }
        let release = Release {
            name: name.to_string(),
            namespace: namespace.to_string(),
            chart_version: version.to_string(),
            status: ReleaseStatus::Deployed,
            revision: 1,
            last_deployed: "2026-01-01T00:00:00Z".to_string(),
            values: values.clone(),
        };
        releases.insert(key, release.clone());
        Ok(release)
    }

    fn upgrade(
        &self,
        name: &str,
        namespace: &str,
        _chart_ref: &str,
        version: &str,
        values: &Value,
        _opts: UpgradeOptions,
    ) -> Result<Release, platform_helm::Error> {
        let mut releases = self.releases.lock().unwrap();
        let key = (namespace.to_string(), name.to_string());
        let existing = releases
            .get(&key)
            .ok_or_else(|| platform_helm::Error::NotFound(name.to_string()))?;
        let release = Release {
            name: name.to_string(),
            namespace: namespace.to_string(),
            chart_version: version.to_string(),
            status: ReleaseStatus::Deployed,
            revision: existing.revision + 1,
            last_deployed: "2026-01-02T00:00:00Z".to_string(),
            values: values.clone(),
        };
        releases.insert(key, release.clone());
        Ok(release)
    }

    fn uninstall(&self, name: &str, namespace: &str) -> Result<(), platform_helm::Error> {
        let mut releases = self.releases.lock().unwrap();
        releases
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| platform_helm::Error::NotFound(name.to_string()))
    }

    fn rollback(&self, _name: &str, _namespace: &str, _target_revision: u32) -> Result<(), platform_helm::Error> {
        unimplemented!("not exercised by these scenarios")
    }

    fn render(&self, _chart_ref: &str, _version: &str, _values: &Value) -> Result<String, platform_helm::Error> {
        unimplemented!("not exercised by these scenarios")
    }
}

fn empty_values() -> Value {
    serde_yaml::from_str("replicas: 1\n").unwrap()
}

fn all_enabled() -> ComponentSet {
    ComponentSet {
        metrics: true,
        dashboards: true,
        logs: true,
        traces: true,
    }
}

/// Scenario 1: fresh create, all four components enabled.
#[test]
fn fresh_create_all_four_components_installs_and_reaches_ready() {
    let helm = FakeHelm::default();
    let namespace = "observability";
    let mut components: BTreeMap<String, ComponentStatus> = BTreeMap::new();

    for key in platform_types::constants::COMPONENT_KEYS {
        let manager = ComponentManager::new(key);
        let outcome = manager
            .converge(&helm, "p", namespace, true, "1.0.0", &empty_values())
            .unwrap();
        assert_eq!(outcome, ConvergeOutcome::Installed);
        components.insert(
            key.to_string(),
            ComponentStatus {
                phase: ComponentPhase::Ready,
                ..Default::default()
            },
        );
    }

    for key in platform_types::constants::COMPONENT_KEYS {
        let release_name = platform_types::constants::release_name("p", key);
        let release = helm.get(&release_name, namespace).unwrap().unwrap();
        assert_eq!(release.revision, 1);
        assert_eq!(release.status, ReleaseStatus::Deployed);
    }

    let phase = aggregate_phase(&all_enabled(), &components, 1, 1, false);
    assert_eq!(phase, platform_types::status::Phase::Ready);
}

/// Scenario 2: disabling a component uninstalls only that release.
#[test]
fn disabling_a_component_removes_only_that_release() {
    let helm = FakeHelm::default()
        .with("p-prometheus", "observability", "2.48.0", empty_values())
        .with("p-grafana", "observability", "7.0.0", empty_values())
        .with("p-loki", "observability", "5.0.0", empty_values())
        .with("p-tempo", "observability", "1.0.0", empty_values());

    let manager = ComponentManager::new("dashboards");
    let outcome = manager
        .converge(&helm, "p", "observability", false, "0.0.0", &empty_values())
        .unwrap();
    assert_eq!(outcome, ConvergeOutcome::Removed);

    assert!(helm.get("p-grafana", "observability").unwrap().is_none());
    for (key, name) in [("metrics", "p-prometheus"), ("logs", "p-loki"), ("traces", "p-tempo")] {
        let release = helm.get(name, "observability").unwrap().unwrap();
        assert_eq!(release.revision, 1, "{key} release should be untouched");
    }
}

/// Scenario 3: a major-version jump issues one upgrade call per crossed
/// major boundary, in ascending order.
#[test]
fn major_version_upgrade_issues_one_call_per_major_boundary() {
    let helm = FakeHelm::default().with("p-prometheus", "observability", "2.48.0", empty_values());

    let manager = ComponentManager::new("metrics");
    let outcome = manager
        .converge(&helm, "p", "observability", true, "4.0.0", &empty_values())
        .unwrap();

    assert_eq!(outcome, ConvergeOutcome::Upgraded { hops: 2 });
    let release = helm.get("p-prometheus", "observability").unwrap().unwrap();
    assert_eq!(release.chart_version, "4.0.0");
    assert_eq!(release.revision, 3);
}

/// Scenario 5: deletion tears down every release that still exists and
/// treats one missing out-of-band as a no-op.
#[test]
fn teardown_treats_missing_release_as_a_no_op() {
    let helm = FakeHelm::default()
        .with("p-prometheus", "observability", "2.48.0", empty_values())
        .with("p-grafana", "observability", "7.0.0", empty_values())
        .with("p-loki", "observability", "5.0.0", empty_values());
    // p-tempo was manually uninstalled out-of-band and is absent.

    let done = teardown(&helm, "p", "observability").unwrap();
    assert!(done);

    for name in ["p-prometheus", "p-grafana", "p-loki", "p-tempo"] {
        assert!(helm.get(name, "observability").unwrap().is_none());
    }
}
