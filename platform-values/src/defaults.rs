//! Per-component defaults: image repository/tag, replica count, service
//! type and port, resource requests/limits, storage size and mode,
//! retention, scrape/evaluation intervals.
//!
//! Grounded on `common/constants.rs`'s literal-constants style
//! (`TWO_DOT_FIVE`, `NODE_LABEL`, ...).

use serde_yaml::Value;

use crate::ComponentKind;

const METRICS_DEFAULTS: &str = r#"
image:
  repository: quay.io/prometheus/prometheus
  tag: v2.49.1
replicas: 1
service:
  type: ClusterIP
  port: 9090
resources:
  cpuRequest: 250m
  cpuLimit: "1"
  memoryRequest: 512Mi
  memoryLimit: 2Gi
storage:
  size: 50Gi
  storageClass: standard
retention: 15d
scrapeInterval: 30s
evaluationInterval: 30s
ingress:
  enabled: false
"#;

const DASHBOARDS_DEFAULTS: &str = r#"
image:
  repository: grafana/grafana
  tag: 10.2.3
replicas: 1
service:
  type: ClusterIP
  port: 3000
resources:
  cpuRequest: 100m
  cpuLimit: 500m
  memoryRequest: 256Mi
  memoryLimit: 512Mi
storage:
  size: 10Gi
  storageClass: standard
ingress:
  enabled: false
"#;

const LOGS_DEFAULTS: &str = r#"
image:
  repository: grafana/loki
  tag: 2.9.4
replicas: 1
service:
  type: ClusterIP
  port: 3100
resources:
  cpuRequest: 250m
  cpuLimit: "1"
  memoryRequest: 512Mi
  memoryLimit: 2Gi
storage:
  size: 100Gi
  storageClass: standard
retention: 168h
ingress:
  enabled: false
objectStore:
  enabled: false
"#;

const TRACES_DEFAULTS: &str = r#"
image:
  repository: grafana/tempo
  tag: 2.3.1
replicas: 1
service:
  type: ClusterIP
  port: 3200
resources:
  cpuRequest: 100m
  cpuLimit: 500m
  memoryRequest: 256Mi
  memoryLimit: 1Gi
storage:
  size: 20Gi
  storageClass: standard
retention: 72h
ingress:
  enabled: false
objectStore:
  enabled: false
"#;

pub fn for_kind(kind: ComponentKind) -> Value {
    let raw = match kind {
        ComponentKind::Metrics => METRICS_DEFAULTS,
        ComponentKind::Dashboards => DASHBOARDS_DEFAULTS,
        ComponentKind::Logs => LOGS_DEFAULTS,
        ComponentKind::Traces => TRACES_DEFAULTS,
    };
    serde_yaml::from_str(raw).expect("component defaults are valid YAML")
}
