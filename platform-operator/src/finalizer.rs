//! Finalizer and deletion coordinator. Grounded directly on the
//! `kube::runtime::finalizer` usage in
//! `controller/reconciler.rs` (`finalizer::Event::Apply`/`Cleanup`
//! shape), generalized from a single sentinel to the ordered
//! reverse-dependency teardown `traces -> logs -> dashboards -> metrics`.

use platform_helm::HelmBackend;
use platform_types::constants::{release_name, TEARDOWN_ORDER};

use crate::error::Error;

/// Uninstalls every component release that still exists, in
/// reverse-dependency order. A release already absent (manually
/// uninstalled out-of-band, or never created) is a no-op, not an error.
/// Returns `Ok(true)` once every release is confirmed absent, meaning
/// the finalizer can be removed.
pub fn teardown(helm: &dyn HelmBackend, platform_name: &str, namespace: &str) -> Result<bool, Error> {
    for component_key in TEARDOWN_ORDER {
        let release_name = release_name(platform_name, component_key);
        let current = helm
            .get(&release_name, namespace)
            .map_err(|source| Error::Transient {
                message: source.to_string(),
            })?;

        let Some(_) = current else {
            continue;
        };

        helm.uninstall(&release_name, namespace)
            .map_err(|source| Error::Transient {
                message: format!("tearing down '{release_name}': {source}"),
            })?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teardown_order_is_reverse_dependency_order() {
        assert_eq!(TEARDOWN_ORDER, ["traces", "logs", "dashboards", "metrics"]);
    }
}
