//! Version parsing, ordering, and upgrade-path computation for the four
//! component charts.
//!
//! Grounded on `k8s/crd/v0.rs`'s semver validation regex and
//! `k8s/upgrade/src/bin/upgrade-job/upgrade/path.rs` version parsing: a
//! leading `v` is stripped before handing the string to `semver::Version`.

use once_cell::sync::Lazy;
use semver::Version;
use std::{
    collections::HashMap,
    sync::RwLock,
};

use crate::error::{Error, Result};

/// Parse a version string, stripping a leading `v` if present.
pub fn parse(raw: &str) -> Result<Version> {
    let trimmed = raw.strip_prefix('v').unwrap_or(raw);
    Version::parse(trimmed).map_err(|source| Error::SemverParse {
        version: raw.to_string(),
        source,
    })
}

/// Total ordering between two versions, build metadata ignored (as
/// `semver::Version`'s `Ord` already does) and pre-release sorting below
/// its corresponding release (also already `semver::Version`'s behavior).
pub fn compare(a: &Version, b: &Version) -> std::cmp::Ordering {
    a.cmp(b)
}

/// True iff `a` and `b` share a major version — a same-major upgrade/
/// downgrade is compatible and needs no staged path.
pub fn compatible(current: &Version, target: &Version) -> bool {
    current.major == target.major
}

/// The ordered list of intermediate targets the orchestration layer must
/// reach in sequence to go from `current` to `target`.
///
/// - identical versions: empty path.
/// - downgrade (`current > target`): a single direct step to `target`.
/// - compatible upgrade (same major): a single direct step to `target`.
/// - incompatible upgrade (major boundary crossed): one hop per major
///   boundary in `(current.major, target.major]`, each hop landing on
///   `M.0.0` except the final hop, which lands on `target` itself.
pub fn upgrade_path(current: &Version, target: &Version) -> Vec<Version> {
    if compare(current, target) == std::cmp::Ordering::Equal {
        return Vec::new();
    }
    if compare(current, target) == std::cmp::Ordering::Greater {
        return vec![target.clone()];
    }
    if compatible(current, target) {
        return vec![target.clone()];
    }

    let mut path = Vec::new();
    let mut major = current.major + 1;
    while major < target.major {
        path.push(Version::new(major, 0, 0));
        major += 1;
    }
    path.push(target.clone());
    path
}

/// Process-wide, read-mostly index of known chart versions, refreshed on a
/// timer with a single-writer lock so readers never block on the refresh.
pub static REGISTRY: Lazy<VersionRegistry> = Lazy::new(VersionRegistry::default);

#[derive(Default)]
pub struct VersionRegistry {
    known: RwLock<HashMap<String, Vec<Version>>>,
}

impl VersionRegistry {
    /// Replace the known-versions set for a chart. Called by the periodic
    /// chart-repository-index refresh and by explicit-refresh requests.
    pub fn refresh(&self, chart: &str, versions: Vec<Version>) {
        self.known
            .write()
            .expect("version registry lock poisoned")
            .insert(chart.to_string(), versions);
    }

    /// The maximum known version for `chart`, excluding pre-releases.
    pub fn latest(&self, chart: &str) -> Result<Version> {
        let known = self.known.read().expect("version registry lock poisoned");
        known
            .get(chart)
            .into_iter()
            .flatten()
            .filter(|v| v.pre.is_empty())
            .max()
            .cloned()
            .ok_or_else(|| Error::NoStableVersion {
                chart: chart.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        parse(s).unwrap()
    }

    #[test]
    fn strips_leading_v() {
        assert_eq!(v("v1.2.3"), Version::new(1, 2, 3));
        assert_eq!(v("1.2.3"), Version::new(1, 2, 3));
    }

    #[test]
    fn identical_versions_have_empty_path() {
        assert!(upgrade_path(&v("1.2.3"), &v("1.2.3")).is_empty());
    }

    #[test]
    fn direct_patch_upgrade() {
        assert_eq!(upgrade_path(&v("0.0.1"), &v("0.0.2")), vec![v("0.0.2")]);
    }

    #[test]
    fn direct_major_upgrade_single_major_boundary() {
        assert_eq!(upgrade_path(&v("1.9.9"), &v("2.0.0")), vec![v("2.0.0")]);
    }

    #[test]
    fn multi_hop_major_upgrade() {
        assert_eq!(
            upgrade_path(&v("1.0.0"), &v("4.0.0")),
            vec![v("2.0.0"), v("3.0.0"), v("4.0.0")]
        );
    }

    #[test]
    fn multi_hop_from_nonzero_patch_within_major() {
        // current already in major 2: only the remaining boundaries are crossed.
        assert_eq!(
            upgrade_path(&v("2.48.0"), &v("4.0.0")),
            vec![v("3.0.0"), v("4.0.0")]
        );
    }

    #[test]
    fn downgrade_is_a_single_direct_step() {
        assert_eq!(upgrade_path(&v("2.0.0"), &v("1.5.0")), vec![v("1.5.0")]);
    }

    #[test]
    fn latest_excludes_prereleases() {
        let registry = VersionRegistry::default();
        registry.refresh(
            "prometheus",
            vec![v("2.48.0"), v("2.49.0"), v("3.0.0-alpha.1")],
        );
        assert_eq!(registry.latest("prometheus").unwrap(), v("2.49.0"));
    }

    #[test]
    fn latest_fails_when_only_prereleases_known() {
        let registry = VersionRegistry::default();
        registry.refresh("tempo", vec![v("2.0.0-alpha.1")]);
        assert!(registry.latest("tempo").is_err());
    }
}
