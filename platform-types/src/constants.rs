//! Naming conventions reserved by the core, mirroring
//! top-level `constants` crate.

/// The finalizer sentinel added on first reconcile and removed only once
/// teardown completes.
pub const FINALIZER: &str = "observability.platform.io/finalizer";

/// Reverse-DNS annotation prefix reserved by the core.
pub const ANNOTATION_PREFIX: &str = "observability.platform.io";

/// Records the version string of the immediate predecessor during
/// conversion.
pub const ANNOTATION_CONVERTED_FROM: &str = "observability.platform.io/converted-from";

/// Comma-joined dotted paths of fields dropped on downgrade.
pub const ANNOTATION_LOST_FIELDS: &str = "observability.platform.io/conversion-lost-fields";

/// Arrow-joined chain of versions traversed during conversion.
pub const ANNOTATION_CONVERSION_HISTORY: &str = "observability.platform.io/conversion-history";

/// Field manager name used on every status-subresource patch.
pub const FIELD_MANAGER: &str = "observability-platform-operator";

/// The four component kinds, in the deterministic order the reconciler
/// and the deletion coordinator must use.
pub const COMPONENT_KEYS: [&str; 4] = ["metrics", "dashboards", "logs", "traces"];

/// Reverse dependency order for teardown: traces depends on nothing,
/// dashboards depends on metrics/logs for datasources.
pub const TEARDOWN_ORDER: [&str; 4] = ["traces", "logs", "dashboards", "metrics"];

/// Stable, cluster-facing chart/release identifiers for each component
/// kind. These never leak user-facing strings.
pub fn chart_name(component_key: &str) -> Option<&'static str> {
    match component_key {
        "metrics" => Some("prometheus"),
        "dashboards" => Some("grafana"),
        "logs" => Some("loki"),
        "traces" => Some("tempo"),
        _ => None,
    }
}

/// The deterministic release name for a component of a platform.
pub fn release_name(platform_name: &str, component_key: &str) -> String {
    format!(
        "{platform_name}-{}",
        chart_name(component_key).unwrap_or(component_key)
    )
}
