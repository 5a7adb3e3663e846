//! The declarative-overlay merge: scalars and sequences in the override
//! replace the base; maps are merged key-by-key. This is the one place
//! the value builder's semantics are defined — the data representation
//! (`serde_yaml::Value`) is an implementation detail.

use serde_yaml::Value;

pub fn merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, overlay_value) in overlay_map {
                match merged.get(key) {
                    Some(base_value) => {
                        merged.insert(key.clone(), merge(base_value, overlay_value));
                    }
                    None => {
                        merged.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
            Value::Mapping(merged)
        }
        // Scalars and sequences: the override replaces the base outright.
        (_, overlay_value) => overlay_value.clone(),
    }
}

/// Boolean enablement flags on sub-blocks gate whether the rest of that
/// sub-tree appears in the output: when a mapping carries `enabled: false`
/// every sibling key under it is dropped.
pub fn gate_disabled_subtrees(value: &mut Value) {
    if let Value::Mapping(map) = value {
        let disabled = matches!(map.get("enabled"), Some(Value::Bool(false)));
        if disabled {
            let enabled = map.get("enabled").cloned().unwrap();
            map.clear();
            map.insert(Value::String("enabled".to_string()), enabled);
            return;
        }
        for (_, v) in map.iter_mut() {
            gate_disabled_subtrees(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn scalars_replace() {
        let base = yaml("replicas: 1\nimage: foo:1.0");
        let overlay = yaml("replicas: 3");
        let merged = merge(&base, &overlay);
        assert_eq!(merged, yaml("replicas: 3\nimage: foo:1.0"));
    }

    #[test]
    fn sequences_replace_not_append() {
        let base = yaml("tags:\n  - a\n  - b");
        let overlay = yaml("tags:\n  - c");
        assert_eq!(merge(&base, &overlay), yaml("tags:\n  - c"));
    }

    #[test]
    fn maps_merge_key_by_key() {
        let base = yaml("resources:\n  cpu: 100m\n  memory: 128Mi");
        let overlay = yaml("resources:\n  cpu: 500m");
        assert_eq!(
            merge(&base, &overlay),
            yaml("resources:\n  cpu: 500m\n  memory: 128Mi")
        );
    }

    #[test]
    fn disabled_subtree_drops_siblings() {
        let mut value = yaml("ingress:\n  enabled: false\n  host: example.com\n  tlsSecretName: x");
        gate_disabled_subtrees(&mut value);
        assert_eq!(value, yaml("ingress:\n  enabled: false"));
    }

    #[test]
    fn enabled_subtree_keeps_siblings() {
        let mut value = yaml("ingress:\n  enabled: true\n  host: example.com");
        gate_disabled_subtrees(&mut value);
        assert_eq!(value, yaml("ingress:\n  enabled: true\n  host: example.com"));
    }
}
