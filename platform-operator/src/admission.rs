//! Admission defaulter and validator. The cross-field rules here (storage
//! shrink vs. a separately-supplied recorded size, TLS-enabled-implies-
//! secret) don't fit a per-field derive macro, so both the defaulter and
//! the validator are plain functions: the defaulter mutates in place, the
//! validator is a pure predicate.

use platform_types::spec::common::ResourceSpec;
use platform_types::spec::v1::PlatformSpec;

const ALLOWED_TLS_VERSIONS: [&str; 2] = ["1.2", "1.3"];

fn default_resources() -> ResourceSpec {
    ResourceSpec {
        cpu_request: Some("250m".to_string()),
        cpu_limit: Some("1".to_string()),
        memory_request: Some("512Mi".to_string()),
        memory_limit: Some("2Gi".to_string()),
    }
}

/// Mutates `spec` in place: absent retention takes the component default,
/// absent replica count becomes 1, absent resource requests/limits take
/// the component default, absent log level becomes `info`.
pub fn apply_defaults(spec: &mut PlatformSpec) {
    if spec.global.log_level.is_none() {
        spec.global.log_level = Some("info".to_string());
    }

    if let Some(metrics) = spec.metrics.as_mut() {
        if metrics.replicas.is_none() {
            metrics.replicas = Some(1);
        }
        if metrics.resources.is_none() {
            metrics.resources = Some(default_resources());
        }
        if metrics.retention.is_none() {
            metrics.retention = Some("15d".to_string());
        }
    }

    if let Some(dashboards) = spec.dashboards.as_mut() {
        if dashboards.replicas.is_none() {
            dashboards.replicas = Some(1);
        }
        if dashboards.resources.is_none() {
            dashboards.resources = Some(default_resources());
        }
    }

    if let Some(logs) = spec.logs.as_mut() {
        if logs.replicas.is_none() {
            logs.replicas = Some(1);
        }
        if logs.resources.is_none() {
            logs.resources = Some(default_resources());
        }
        if logs.retention.is_none() {
            logs.retention = Some("168h".to_string());
        }
    }

    if let Some(traces) = spec.traces.as_mut() {
        if traces.replicas.is_none() {
            traces.replicas = Some(1);
        }
        if traces.resources.is_none() {
            traces.resources = Some(default_resources());
        }
        if traces.retention.is_none() {
            traces.retention = Some("72h".to_string());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Binary/decimal SI suffixes recognized on Kubernetes resource
/// quantities, ordered longest-first so e.g. `Ki` matches before a bare
/// trailing digit check would.
const BINARY_SUFFIXES: [(&str, u64); 4] = [
    ("Ti", 1024u64.pow(4)),
    ("Gi", 1024u64.pow(3)),
    ("Mi", 1024u64.pow(2)),
    ("Ki", 1024),
];

/// Parses a Kubernetes-style resource quantity (`"50Gi"`, `"250m"`,
/// `"2"`) into a comparable integer scale. `m` (milli) quantities are
/// only meaningful for cpu, but parsing them here is harmless for sizes
/// that never carry the suffix.
fn parse_quantity(raw: &str) -> Option<u64> {
    for (suffix, scale) in BINARY_SUFFIXES {
        if let Some(number) = raw.strip_suffix(suffix) {
            let value: f64 = number.parse().ok()?;
            return Some((value * scale as f64) as u64);
        }
    }
    if let Some(number) = raw.strip_suffix('m') {
        let value: f64 = number.parse().ok()?;
        return Some(value as u64);
    }
    let value: f64 = raw.parse().ok()?;
    Some((value * 1000.0) as u64)
}

fn validate_resources(
    field_prefix: &str,
    resources: Option<&ResourceSpec>,
    errors: &mut Vec<ValidationError>,
) {
    let Some(resources) = resources else {
        return;
    };
    for (name, value) in [
        ("cpuRequest", &resources.cpu_request),
        ("cpuLimit", &resources.cpu_limit),
        ("memoryRequest", &resources.memory_request),
        ("memoryLimit", &resources.memory_limit),
    ] {
        if let Some(value) = value {
            if parse_quantity(value).is_none() {
                errors.push(ValidationError {
                    field: format!("{field_prefix}.{name}"),
                    message: format!("'{value}' is not a valid resource quantity"),
                });
            }
        }
    }
}

fn validate_storage_shrink(
    field_prefix: &str,
    size: Option<&str>,
    recorded_size: Option<&str>,
    errors: &mut Vec<ValidationError>,
) {
    let (Some(size), Some(recorded_size)) = (size, recorded_size) else {
        return;
    };
    match (parse_quantity(size), parse_quantity(recorded_size)) {
        (Some(requested), Some(recorded)) if requested < recorded => {
            errors.push(ValidationError {
                field: format!("{field_prefix}.storage.size"),
                message: format!(
                    "storage size {size} is smaller than the recorded release size {recorded_size} \
                     (invariant 5: storage size is never decreased)"
                ),
            });
        }
        _ => {}
    }
}

fn validate_version(
    field_prefix: &str,
    version: Option<&str>,
    enabled: bool,
    errors: &mut Vec<ValidationError>,
) {
    match version {
        None if enabled => errors.push(ValidationError {
            field: format!("{field_prefix}.version"),
            message: "enabled component has neither a version nor a default".to_string(),
        }),
        None => {}
        Some(version) if platform_types::version::parse(version).is_err() => {
            errors.push(ValidationError {
                field: format!("{field_prefix}.version"),
                message: format!("'{version}' does not parse as semver"),
            });
        }
        Some(_) => {}
    }
}

fn validate_replicas(field_prefix: &str, replicas: Option<i32>, errors: &mut Vec<ValidationError>) {
    if let Some(replicas) = replicas {
        if replicas < 0 {
            errors.push(ValidationError {
                field: format!("{field_prefix}.replicas"),
                message: format!("replica count {replicas} is negative"),
            });
        }
    }
}

fn validate_ingress(
    field_prefix: &str,
    ingress: Option<&platform_types::spec::common::IngressSpec>,
    errors: &mut Vec<ValidationError>,
) {
    let Some(ingress) = ingress else {
        return;
    };
    if ingress.enabled && ingress.tls_secret_name.is_none() && ingress.host.is_some() {
        errors.push(ValidationError {
            field: format!("{field_prefix}.ingress"),
            message: "ingress TLS requires a secret name".to_string(),
        });
    }
}

/// Recorded release storage sizes, keyed by component key, as currently
/// observed in the cluster — used to enforce invariant 5 without the
/// validator itself talking to the release backend.
#[derive(Debug, Clone, Default)]
pub struct RecordedStorageSizes {
    pub metrics: Option<String>,
    pub dashboards: Option<String>,
    pub logs: Option<String>,
    pub traces: Option<String>,
}

/// Pure predicate covering every rejection rule. Does not mutate `spec`.
pub fn validate(spec: &PlatformSpec, recorded: &RecordedStorageSizes) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(metrics) = &spec.metrics {
        validate_version("metrics", metrics.version.as_deref(), spec.enabled.metrics, &mut errors);
        validate_replicas("metrics", metrics.replicas, &mut errors);
        validate_resources("metrics", metrics.resources.as_ref(), &mut errors);
        validate_storage_shrink(
            "metrics",
            metrics.storage.as_ref().map(|s| s.size.as_str()),
            recorded.metrics.as_deref(),
            &mut errors,
        );
        validate_ingress("metrics", metrics.ingress.as_ref(), &mut errors);
    } else if spec.enabled.metrics {
        errors.push(ValidationError {
            field: "metrics".to_string(),
            message: "component is enabled but has no spec".to_string(),
        });
    }

    if let Some(dashboards) = &spec.dashboards {
        validate_version(
            "dashboards",
            dashboards.version.as_deref(),
            spec.enabled.dashboards,
            &mut errors,
        );
        validate_replicas("dashboards", dashboards.replicas, &mut errors);
        validate_resources("dashboards", dashboards.resources.as_ref(), &mut errors);
        validate_storage_shrink(
            "dashboards",
            dashboards.storage.as_ref().map(|s| s.size.as_str()),
            recorded.dashboards.as_deref(),
            &mut errors,
        );
        validate_ingress("dashboards", dashboards.ingress.as_ref(), &mut errors);
    } else if spec.enabled.dashboards {
        errors.push(ValidationError {
            field: "dashboards".to_string(),
            message: "component is enabled but has no spec".to_string(),
        });
    }

    if let Some(logs) = &spec.logs {
        validate_version("logs", logs.version.as_deref(), spec.enabled.logs, &mut errors);
        validate_replicas("logs", logs.replicas, &mut errors);
        validate_resources("logs", logs.resources.as_ref(), &mut errors);
        validate_storage_shrink(
            "logs",
            logs.storage.as_ref().map(|s| s.size.as_str()),
            recorded.logs.as_deref(),
            &mut errors,
        );
        validate_ingress("logs", logs.ingress.as_ref(), &mut errors);
    } else if spec.enabled.logs {
        errors.push(ValidationError {
            field: "logs".to_string(),
            message: "component is enabled but has no spec".to_string(),
        });
    }

    if let Some(traces) = &spec.traces {
        validate_version("traces", traces.version.as_deref(), spec.enabled.traces, &mut errors);
        validate_replicas("traces", traces.replicas, &mut errors);
        validate_resources("traces", traces.resources.as_ref(), &mut errors);
        validate_storage_shrink(
            "traces",
            traces.storage.as_ref().map(|s| s.size.as_str()),
            recorded.traces.as_deref(),
            &mut errors,
        );
        validate_ingress("traces", traces.ingress.as_ref(), &mut errors);
    } else if spec.enabled.traces {
        errors.push(ValidationError {
            field: "traces".to_string(),
            message: "component is enabled but has no spec".to_string(),
        });
    }

    if let Some(security) = &spec.security {
        if security.tls_enabled {
            match &security.min_tls_version {
                Some(v) if ALLOWED_TLS_VERSIONS.contains(&v.as_str()) => {}
                _ => errors.push(ValidationError {
                    field: "security.minTlsVersion".to_string(),
                    message: "TLS is enabled but min-version is not one of 1.2 or 1.3".to_string(),
                }),
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform_types::spec::common::{ComponentSet, IngressSpec, StorageSpec};
    use platform_types::spec::v1::MetricsSpec;

    #[test]
    fn defaults_fill_absent_fields_only() {
        let mut spec = PlatformSpec {
            enabled: ComponentSet {
                metrics: true,
                ..Default::default()
            },
            metrics: Some(MetricsSpec {
                replicas: Some(5),
                ..Default::default()
            }),
            ..Default::default()
        };
        apply_defaults(&mut spec);
        let metrics = spec.metrics.unwrap();
        assert_eq!(metrics.replicas, Some(5));
        assert_eq!(metrics.retention, Some("15d".to_string()));
        assert!(metrics.resources.is_some());
        assert_eq!(spec.global.log_level, Some("info".to_string()));
    }

    #[test]
    fn rejects_unparseable_version() {
        let spec = PlatformSpec {
            enabled: ComponentSet {
                metrics: true,
                ..Default::default()
            },
            metrics: Some(MetricsSpec {
                version: Some("not-a-version".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let errors = validate(&spec, &RecordedStorageSizes::default());
        assert!(errors.iter().any(|e| e.field == "metrics.version"));
    }

    #[test]
    fn rejects_storage_shrink() {
        let spec = PlatformSpec {
            enabled: ComponentSet {
                logs: true,
                ..Default::default()
            },
            logs: Some(platform_types::spec::v1::LogsSpec {
                storage: Some(StorageSpec {
                    size: "5Gi".to_string(),
                    storage_class: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let recorded = RecordedStorageSizes {
            logs: Some("10Gi".to_string()),
            ..Default::default()
        };
        let errors = validate(&spec, &recorded);
        assert!(errors.iter().any(|e| e.field == "logs.storage.size"));
    }

    #[test]
    fn accepts_storage_growth() {
        let spec = PlatformSpec {
            enabled: ComponentSet {
                logs: true,
                ..Default::default()
            },
            logs: Some(platform_types::spec::v1::LogsSpec {
                storage: Some(StorageSpec {
                    size: "20Gi".to_string(),
                    storage_class: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let recorded = RecordedStorageSizes {
            logs: Some("10Gi".to_string()),
            ..Default::default()
        };
        let errors = validate(&spec, &recorded);
        assert!(!errors.iter().any(|e| e.field == "logs.storage.size"));
    }

    #[test]
    fn rejects_negative_replicas() {
        let spec = PlatformSpec {
            enabled: ComponentSet {
                metrics: true,
                ..Default::default()
            },
            metrics: Some(MetricsSpec {
                replicas: Some(-1),
                ..Default::default()
            }),
            ..Default::default()
        };
        let errors = validate(&spec, &RecordedStorageSizes::default());
        assert!(errors.iter().any(|e| e.field == "metrics.replicas"));
    }

    #[test]
    fn rejects_enabled_without_version_or_default() {
        let spec = PlatformSpec {
            enabled: ComponentSet {
                traces: true,
                ..Default::default()
            },
            traces: Some(platform_types::spec::v1::TracesSpec::default()),
            ..Default::default()
        };
        let errors = validate(&spec, &RecordedStorageSizes::default());
        assert!(errors.iter().any(|e| e.field == "traces.version"));
    }

    #[test]
    fn rejects_bad_tls_version() {
        let spec = PlatformSpec {
            security: Some(platform_types::spec::common::SecuritySpec {
                tls_enabled: true,
                min_tls_version: Some("1.0".to_string()),
            }),
            ..Default::default()
        };
        let errors = validate(&spec, &RecordedStorageSizes::default());
        assert!(errors.iter().any(|e| e.field == "security.minTlsVersion"));
    }

    #[test]
    fn rejects_ingress_tls_without_secret() {
        let spec = PlatformSpec {
            enabled: ComponentSet {
                metrics: true,
                ..Default::default()
            },
            metrics: Some(MetricsSpec {
                version: Some("2.49.0".to_string()),
                ingress: Some(IngressSpec {
                    enabled: true,
                    host: Some("metrics.example.com".to_string()),
                    tls_secret_name: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let errors = validate(&spec, &RecordedStorageSizes::default());
        assert!(errors.iter().any(|e| e.field == "metrics.ingress"));
    }
}
