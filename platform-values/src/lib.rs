//! Value builder: produces the nested value tree a chart expects
//! from the user-declared component spec, merging declared overrides over
//! built-in per-component defaults.

pub mod defaults;
pub mod error;
pub mod merge;

use serde::Serialize;
use serde_yaml::Value;
use std::str::FromStr;

pub use error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Metrics,
    Dashboards,
    Logs,
    Traces,
}

impl FromStr for ComponentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metrics" => Ok(ComponentKind::Metrics),
            "dashboards" => Ok(ComponentKind::Dashboards),
            "logs" => Ok(ComponentKind::Logs),
            "traces" => Ok(ComponentKind::Traces),
            other => Err(Error::UnknownComponent(other.to_string())),
        }
    }
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Metrics => "metrics",
            ComponentKind::Dashboards => "dashboards",
            ComponentKind::Logs => "logs",
            ComponentKind::Traces => "traces",
        }
    }
}

/// Build the rendered value tree for `kind` from the declared `spec`.
/// Any set field in the spec appears in the output; unset optional fields
/// take the built-in default.
pub fn build<S: Serialize>(kind: ComponentKind, spec: &S) -> Result<Value, Error> {
    let overlay = serde_yaml::to_value(spec).map_err(|source| Error::Serialize { source })?;
    let base = defaults::for_kind(kind);
    let mut merged = merge::merge(&base, &overlay);
    merge::gate_disabled_subtrees(&mut merged);
    Ok(merged)
}

/// Verify that required fields are present in a rendered value tree — the
/// last chance to catch a malformed value tree before the orchestration
/// layer ships it out.
pub fn validate(kind: ComponentKind, values: &Value) -> Result<(), Error> {
    let required: &[&[&str]] = &[
        &["image", "repository"],
        &["image", "tag"],
        &["replicas"],
        &["service", "port"],
        &["storage", "size"],
    ];

    for path in required {
        if lookup(values, path).is_none() {
            return Err(Error::MissingField {
                kind: kind.as_str(),
                path: path.join("."),
            });
        }
    }
    Ok(())
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for segment in path {
        current = current.as_mapping()?.get(Value::String(segment.to_string()))?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Spec {
        #[serde(skip_serializing_if = "Option::is_none")]
        replicas: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        retention: Option<String>,
    }

    #[test]
    fn unset_optional_fields_take_default() {
        let spec = Spec {
            replicas: None,
            retention: None,
        };
        let values = build(ComponentKind::Metrics, &spec).unwrap();
        assert_eq!(lookup(&values, &["replicas"]).unwrap(), &Value::from(1));
        assert_eq!(
            lookup(&values, &["retention"]).unwrap(),
            &Value::String("15d".to_string())
        );
    }

    #[test]
    fn set_fields_override_default() {
        let spec = Spec {
            replicas: Some(3),
            retention: Some("30d".to_string()),
        };
        let values = build(ComponentKind::Metrics, &spec).unwrap();
        assert_eq!(lookup(&values, &["replicas"]).unwrap(), &Value::from(3));
        assert_eq!(
            lookup(&values, &["retention"]).unwrap(),
            &Value::String("30d".to_string())
        );
    }

    #[test]
    fn unknown_component_is_rejected() {
        assert!(matches!(
            "widgets".parse::<ComponentKind>(),
            Err(Error::UnknownComponent(_))
        ));
    }

    #[test]
    fn validate_accepts_complete_defaults() {
        let values = defaults::for_kind(ComponentKind::Logs);
        assert!(validate(ComponentKind::Logs, &values).is_ok());
    }

    #[test]
    fn validate_rejects_missing_required_field() {
        let mut values = defaults::for_kind(ComponentKind::Traces);
        values.as_mapping_mut().unwrap().remove("storage");
        assert!(validate(ComponentKind::Traces, &values).is_err());
    }
}
