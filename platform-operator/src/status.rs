//! Status aggregator. Grounded on
//! `ComponentsState::convert_into_hash` aggregation shape and
//! `UpgradeCondition` append-only condition list, generalized to a
//! phase-precedence table and the three append-only conditions
//! `Progressing`/`Available`/`ReconcileSucceeded`.

use platform_types::spec::common::ComponentSet;
use platform_types::status::{Condition, ConditionStatus, ComponentPhase, ComponentStatus, Phase};
use std::collections::BTreeMap;

/// Pure function from per-component status plus generation bookkeeping
/// to the aggregate phase. Precedence, highest first: Terminating,
/// Failed, Pending, Installing, Upgrading, Ready, Unknown.
pub fn aggregate_phase(
    enabled: &ComponentSet,
    components: &BTreeMap<String, ComponentStatus>,
    observed_generation: i64,
    generation: i64,
    deleting: bool,
) -> Phase {
    if deleting {
        return Phase::Terminating;
    }

    let enabled_keys = enabled.enabled_in_order();

    let any_enabled_failed = enabled_keys
        .iter()
        .any(|key| matches!(components.get(*key), Some(c) if c.phase == ComponentPhase::Failed));
    if any_enabled_failed {
        return Phase::Failed;
    }

    if observed_generation == 0 {
        return Phase::Pending;
    }

    let any_installing = components
        .values()
        .any(|c| c.phase == ComponentPhase::Installing);
    if any_installing {
        return Phase::Installing;
    }

    let any_upgrading = components
        .values()
        .any(|c| c.phase == ComponentPhase::Upgrading);
    if any_upgrading {
        return Phase::Upgrading;
    }

    let all_enabled_ready = enabled_keys
        .iter()
        .all(|key| matches!(components.get(*key), Some(c) if c.phase == ComponentPhase::Ready));
    if all_enabled_ready && observed_generation == generation {
        return Phase::Ready;
    }

    Phase::Unknown
}

fn upsert_condition(
    conditions: &mut Vec<Condition>,
    type_: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
    now: &str,
) {
    match conditions.iter_mut().find(|c| c.type_ == type_) {
        Some(existing) => {
            if existing.status != status {
                existing.last_transition_time = now.to_string();
            }
            existing.status = status;
            existing.reason = reason.to_string();
            existing.message = message.to_string();
        }
        None => conditions.push(Condition {
            type_: type_.to_string(),
            status,
            reason: reason.to_string(),
            message: message.to_string(),
            last_transition_time: now.to_string(),
        }),
    }
}

/// Patches the `ReconcileSucceeded` condition with a terminal error's
/// machine-readable reason and message, alongside the phase-driven
/// conditions `upsert_conditions` already maintains.
pub fn set_error_condition(conditions: &mut Vec<Condition>, reason: &str, message: &str, now: &str) {
    upsert_condition(
        conditions,
        "ReconcileSucceeded",
        ConditionStatus::False,
        reason,
        message,
        now,
    );
}

/// Updates the append-only condition list in place for the given phase.
/// Transition times only move when a condition's status actually flips.
pub fn upsert_conditions(conditions: &mut Vec<Condition>, phase: &Phase, now: &str) {
    let (progressing, available, succeeded) = match phase {
        Phase::Installing | Phase::Upgrading => (ConditionStatus::True, ConditionStatus::False, ConditionStatus::Unknown),
        Phase::Ready => (ConditionStatus::False, ConditionStatus::True, ConditionStatus::True),
        Phase::Failed => (ConditionStatus::False, ConditionStatus::False, ConditionStatus::False),
        Phase::Terminating => (ConditionStatus::True, ConditionStatus::False, ConditionStatus::Unknown),
        Phase::Pending | Phase::Unknown => (ConditionStatus::Unknown, ConditionStatus::Unknown, ConditionStatus::Unknown),
    };

    upsert_condition(
        conditions,
        "Progressing",
        progressing,
        "PhaseObserved",
        &format!("phase is {phase}"),
        now,
    );
    upsert_condition(
        conditions,
        "Available",
        available,
        "PhaseObserved",
        &format!("phase is {phase}"),
        now,
    );
    upsert_condition(
        conditions,
        "ReconcileSucceeded",
        succeeded,
        "PhaseObserved",
        &format!("phase is {phase}"),
        now,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(phase: ComponentPhase) -> ComponentStatus {
        ComponentStatus {
            phase,
            ..Default::default()
        }
    }

    fn all_enabled() -> ComponentSet {
        ComponentSet {
            metrics: true,
            dashboards: true,
            logs: true,
            traces: true,
        }
    }

    #[test]
    fn deleting_overrides_everything() {
        let mut components = BTreeMap::new();
        components.insert("metrics".to_string(), component(ComponentPhase::Ready));
        assert_eq!(
            aggregate_phase(&all_enabled(), &components, 3, 3, true),
            Phase::Terminating
        );
    }

    #[test]
    fn zero_observed_generation_is_pending() {
        let components = BTreeMap::new();
        assert_eq!(
            aggregate_phase(&all_enabled(), &components, 0, 1, false),
            Phase::Pending
        );
    }

    #[test]
    fn any_failed_enabled_component_is_failed() {
        let mut components = BTreeMap::new();
        components.insert("metrics".to_string(), component(ComponentPhase::Failed));
        components.insert("dashboards".to_string(), component(ComponentPhase::Ready));
        components.insert("logs".to_string(), component(ComponentPhase::Ready));
        components.insert("traces".to_string(), component(ComponentPhase::Ready));
        assert_eq!(
            aggregate_phase(&all_enabled(), &components, 1, 1, false),
            Phase::Failed
        );
    }

    #[test]
    fn all_ready_and_generation_match_is_ready() {
        let mut components = BTreeMap::new();
        for key in ["metrics", "dashboards", "logs", "traces"] {
            components.insert(key.to_string(), component(ComponentPhase::Ready));
        }
        assert_eq!(
            aggregate_phase(&all_enabled(), &components, 2, 2, false),
            Phase::Ready
        );
    }

    #[test]
    fn ready_components_but_stale_generation_is_unknown() {
        let mut components = BTreeMap::new();
        for key in ["metrics", "dashboards", "logs", "traces"] {
            components.insert(key.to_string(), component(ComponentPhase::Ready));
        }
        assert_eq!(
            aggregate_phase(&all_enabled(), &components, 1, 2, false),
            Phase::Unknown
        );
    }

    #[test]
    fn installing_takes_precedence_over_ready_siblings() {
        let mut components = BTreeMap::new();
        components.insert("metrics".to_string(), component(ComponentPhase::Installing));
        components.insert("dashboards".to_string(), component(ComponentPhase::Ready));
        components.insert("logs".to_string(), component(ComponentPhase::Ready));
        components.insert("traces".to_string(), component(ComponentPhase::Ready));
        assert_eq!(
            aggregate_phase(&all_enabled(), &components, 1, 1, false),
            Phase::Installing
        );
    }

    #[test]
    fn conditions_keep_transition_time_on_repeated_same_status() {
        let mut conditions = Vec::new();
        upsert_conditions(&mut conditions, &Phase::Ready, "t0");
        upsert_conditions(&mut conditions, &Phase::Ready, "t1");
        let available = conditions.iter().find(|c| c.type_ == "Available").unwrap();
        assert_eq!(available.last_transition_time, "t0");
    }

    #[test]
    fn conditions_update_transition_time_on_flip() {
        let mut conditions = Vec::new();
        upsert_conditions(&mut conditions, &Phase::Installing, "t0");
        upsert_conditions(&mut conditions, &Phase::Ready, "t1");
        let available = conditions.iter().find(|c| c.type_ == "Available").unwrap();
        assert_eq!(available.last_transition_time, "t1");
    }

    #[test]
    fn set_error_condition_carries_the_reason_and_message() {
        let mut conditions = Vec::new();
        upsert_conditions(&mut conditions, &Phase::Ready, "t0");
        set_error_condition(&mut conditions, "ConfigurationError", "bad chart reference", "t1");
        let succeeded = conditions.iter().find(|c| c.type_ == "ReconcileSucceeded").unwrap();
        assert_eq!(succeeded.status, ConditionStatus::False);
        assert_eq!(succeeded.reason, "ConfigurationError");
        assert_eq!(succeeded.message, "bad chart reference");
    }
}
