//! Bidirectional conversion between the `v1alpha1` (spoke) and `v1` (hub)
//! schema versions.
//!
//! Grounded on `stackabletech-operator-rs`'s status/versioning module (the
//! closest pack example of real kube-rs annotation bookkeeping) and the
//! `ResourceExt` annotation usage across `k8s/upgrade`.

use kube::ResourceExt;

use crate::constants::{
    ANNOTATION_CONVERSION_HISTORY, ANNOTATION_CONVERTED_FROM, ANNOTATION_LOST_FIELDS,
};
use crate::spec::{v1, v1alpha1};

/// Merge (not overwrite) one of the core's reserved annotations onto
/// `annotations`, preserving whatever a prior conversion already recorded.
fn merge_annotation(
    annotations: &mut std::collections::BTreeMap<String, String>,
    key: &str,
    value: String,
) {
    annotations
        .entry(key.to_string())
        .and_modify(|existing| {
            if !existing.split(',').any(|v| v == value) {
                existing.push(',');
                existing.push_str(&value);
            }
        })
        .or_insert(value);
}

fn push_history(annotations: &mut std::collections::BTreeMap<String, String>, version: &str) {
    annotations
        .entry(ANNOTATION_CONVERSION_HISTORY.to_string())
        .and_modify(|existing| {
            existing.push_str(" -> ");
            existing.push_str(version);
        })
        .or_insert_with(|| version.to_string());
}

/// Total function: every field representable in both versions is copied;
/// the hub's additional optional fields are left at their defaults (never
/// materialized unless the source actually carried them, per the
/// nil-stays-nil / empty-stays-empty edge case).
pub fn to_hub(old: &v1alpha1::Platform) -> v1::Platform {
    let mut new = v1::Platform {
        metadata: old.metadata.clone(),
        spec: v1::PlatformSpec {
            enabled: old.spec.enabled.clone(),
            metrics: old.spec.metrics.as_ref().map(metrics_to_hub),
            dashboards: old.spec.dashboards.as_ref().map(dashboards_to_hub),
            logs: old.spec.logs.as_ref().map(logs_to_hub),
            traces: old.spec.traces.as_ref().map(traces_to_hub),
            global: old.spec.global.clone(),
            high_availability: old.spec.high_availability.clone(),
            backup: old.spec.backup.clone(),
            alerting: old.spec.alerting.clone(),
            security: None,
            image_pull_secrets: None,
            affinity: None,
            priority_class_name: None,
        },
        status: old.status.as_ref().map(status_to_hub),
    };

    let mut annotations = new.annotations().clone();
    merge_annotation(
        &mut annotations,
        ANNOTATION_CONVERTED_FROM,
        "v1alpha1".to_string(),
    );
    push_history(&mut annotations, "v1alpha1");
    push_history(&mut annotations, "v1");
    *new.annotations_mut() = annotations;
    new
}

fn metrics_to_hub(m: &v1alpha1::MetricsSpec) -> v1::MetricsSpec {
    v1::MetricsSpec {
        version: m.version.clone(),
        replicas: m.replicas,
        resources: m.resources.clone(),
        storage: m.storage.clone(),
        retention: m.retention.clone(),
        ingress: m.ingress.clone(),
        remote_write: m.remote_write.clone(),
        external_labels: Default::default(),
    }
}

fn dashboards_to_hub(d: &v1alpha1::DashboardsSpec) -> v1::DashboardsSpec {
    v1::DashboardsSpec {
        version: d.version.clone(),
        replicas: d.replicas,
        resources: d.resources.clone(),
        storage: d.storage.clone(),
        ingress: d.ingress.clone(),
        smtp: None,
        oauth: None,
    }
}

fn logs_to_hub(l: &v1alpha1::LogsSpec) -> v1::LogsSpec {
    v1::LogsSpec {
        version: l.version.clone(),
        replicas: l.replicas,
        resources: l.resources.clone(),
        storage: l.storage.clone(),
        retention: l.retention.clone(),
        ingress: l.ingress.clone(),
        object_store: l.object_store.clone(),
        query_timeout: None,
    }
}

fn traces_to_hub(t: &v1alpha1::TracesSpec) -> v1::TracesSpec {
    v1::TracesSpec {
        version: t.version.clone(),
        replicas: t.replicas,
        resources: t.resources.clone(),
        storage: t.storage.clone(),
        retention: t.retention.clone(),
        ingress: t.ingress.clone(),
        object_store: t.object_store.clone(),
        metrics_generator: None,
    }
}

fn status_to_hub(s: &crate::status::PlatformStatusV1alpha1) -> crate::status::PlatformStatusV1 {
    crate::status::PlatformStatusV1 {
        phase: s.phase.clone(),
        message: s.message.clone(),
        observed_generation: s.observed_generation,
        components: s.components.clone(),
        conditions: s.conditions.clone(),
        last_transition_time: s.last_transition_time.clone(),
        extended: None,
    }
}

/// Partial in information: fields present in `new` but absent from `old`
/// are not discarded silently — their dotted paths are joined into the
/// `conversion-lost-fields` annotation.
pub fn from_hub(new: &v1::Platform) -> v1alpha1::Platform {
    let mut lost_fields = Vec::new();

    let metrics = new.spec.metrics.as_ref().map(|m| {
        if !m.external_labels.is_empty() {
            lost_fields.push("spec.metrics.externalLabels".to_string());
        }
        metrics_from_hub(m)
    });
    let dashboards = new.spec.dashboards.as_ref().map(|d| {
        if d.smtp.is_some() {
            lost_fields.push("spec.dashboards.smtp".to_string());
        }
        if d.oauth.is_some() {
            lost_fields.push("spec.dashboards.oauth".to_string());
        }
        dashboards_from_hub(d)
    });
    let logs = new.spec.logs.as_ref().map(|l| {
        if l.query_timeout.is_some() {
            lost_fields.push("spec.logs.queryTimeout".to_string());
        }
        logs_from_hub(l)
    });
    let traces = new.spec.traces.as_ref().map(|t| {
        if t.metrics_generator.is_some() {
            lost_fields.push("spec.traces.metricsGenerator".to_string());
        }
        traces_from_hub(t)
    });

    if new.spec.security.is_some() {
        lost_fields.push("spec.security".to_string());
    }
    if new.spec.image_pull_secrets.is_some() {
        lost_fields.push("spec.imagePullSecrets".to_string());
    }
    if new.spec.affinity.is_some() {
        lost_fields.push("spec.affinity".to_string());
    }
    if new.spec.priority_class_name.is_some() {
        lost_fields.push("spec.priorityClassName".to_string());
    }

    let status = new.status.as_ref().map(|s| {
        if s.extended.is_some() {
            lost_fields.push("status.extended".to_string());
        }
        status_from_hub(s)
    });

    let mut old = v1alpha1::Platform {
        metadata: new.metadata.clone(),
        spec: v1alpha1::PlatformSpec {
            enabled: new.spec.enabled.clone(),
            metrics,
            dashboards,
            logs,
            traces,
            global: new.spec.global.clone(),
            high_availability: new.spec.high_availability.clone(),
            backup: new.spec.backup.clone(),
            alerting: new.spec.alerting.clone(),
        },
        status,
    };

    let mut annotations = old.annotations().clone();
    merge_annotation(&mut annotations, ANNOTATION_CONVERTED_FROM, "v1".to_string());
    push_history(&mut annotations, "v1");
    push_history(&mut annotations, "v1alpha1");
    if !lost_fields.is_empty() {
        merge_annotation(&mut annotations, ANNOTATION_LOST_FIELDS, lost_fields.join(","));
    }
    *old.annotations_mut() = annotations;
    old
}

fn metrics_from_hub(m: &v1::MetricsSpec) -> v1alpha1::MetricsSpec {
    v1alpha1::MetricsSpec {
        version: m.version.clone(),
        replicas: m.replicas,
        resources: m.resources.clone(),
        storage: m.storage.clone(),
        retention: m.retention.clone(),
        ingress: m.ingress.clone(),
        remote_write: m.remote_write.clone(),
    }
}

fn dashboards_from_hub(d: &v1::DashboardsSpec) -> v1alpha1::DashboardsSpec {
    v1alpha1::DashboardsSpec {
        version: d.version.clone(),
        replicas: d.replicas,
        resources: d.resources.clone(),
        storage: d.storage.clone(),
        ingress: d.ingress.clone(),
    }
}

fn logs_from_hub(l: &v1::LogsSpec) -> v1alpha1::LogsSpec {
    v1alpha1::LogsSpec {
        version: l.version.clone(),
        replicas: l.replicas,
        resources: l.resources.clone(),
        storage: l.storage.clone(),
        retention: l.retention.clone(),
        ingress: l.ingress.clone(),
        object_store: l.object_store.clone(),
    }
}

fn traces_from_hub(t: &v1::TracesSpec) -> v1alpha1::TracesSpec {
    v1alpha1::TracesSpec {
        version: t.version.clone(),
        replicas: t.replicas,
        resources: t.resources.clone(),
        storage: t.storage.clone(),
        retention: t.retention.clone(),
        ingress: t.ingress.clone(),
        object_store: t.object_store.clone(),
    }
}

fn status_from_hub(s: &crate::status::PlatformStatusV1) -> crate::status::PlatformStatusV1alpha1 {
    crate::status::PlatformStatusV1alpha1 {
        phase: s.phase.clone(),
        message: s.message.clone(),
        observed_generation: s.observed_generation,
        components: s.components.clone(),
        conditions: s.conditions.clone(),
        last_transition_time: s.last_transition_time.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::common::StorageSpec;

    fn sample_old() -> v1alpha1::Platform {
        let mut p = v1alpha1::Platform::new(
            "demo",
            v1alpha1::PlatformSpec {
                enabled: crate::spec::common::ComponentSet {
                    metrics: true,
                    dashboards: false,
                    logs: false,
                    traces: false,
                },
                metrics: Some(v1alpha1::MetricsSpec {
                    version: Some("v2.48.0".to_string()),
                    replicas: Some(1),
                    storage: Some(StorageSpec {
                        size: "50Gi".to_string(),
                        storage_class: None,
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        p.metadata.namespace = Some("default".to_string());
        p
    }

    #[test]
    fn round_trip_with_no_lossy_fields_is_lossless() {
        let old = sample_old();
        let new = to_hub(&old);
        assert_eq!(new.annotations().get(ANNOTATION_CONVERTED_FROM).unwrap(), "v1alpha1");

        let back = from_hub(&new);
        assert_eq!(back.spec, old.spec);
        assert_eq!(back.status, old.status);
        assert!(back.annotations().get(ANNOTATION_LOST_FIELDS).is_none());
    }

    #[test]
    fn downgrade_tracks_lossy_fields() {
        let mut new = to_hub(&sample_old());
        new.spec.metrics.as_mut().unwrap().external_labels =
            std::collections::BTreeMap::from([("region".to_string(), "eu".to_string())]);
        new.spec.security = Some(crate::spec::common::SecuritySpec {
            tls_enabled: true,
            min_tls_version: Some("1.3".to_string()),
        });

        let old = from_hub(&new);
        let lost = old.annotations().get(ANNOTATION_LOST_FIELDS).unwrap();
        assert!(lost.contains("spec.metrics.externalLabels"));
        assert!(lost.contains("spec.security"));
    }

    #[test]
    fn nil_subspecs_stay_nil() {
        let old = v1alpha1::Platform::new("demo", v1alpha1::PlatformSpec::default());
        let new = to_hub(&old);
        assert!(new.spec.metrics.is_none());
        assert!(new.spec.dashboards.is_none());
    }

    #[test]
    fn empty_collections_stay_empty_not_nil() {
        let mut old = v1alpha1::Platform::new("demo", v1alpha1::PlatformSpec::default());
        old.spec.alerting = Some(crate::spec::common::AlertingSpec {
            receivers: vec!["team-a".to_string()],
            routes: Vec::new(),
        });
        let new = to_hub(&old);
        let alerting = new.spec.alerting.unwrap();
        assert!(alerting.routes.is_empty());
        assert!(!alerting.receivers.is_empty());
    }
}
