//! Property tests for scenario invariants.
//!
//! Uses proptest to verify:
//! 1. Replace and migrate always require a new target; add and remove never do
//! 2. Directives are never merged: one record per target per directive
//! 3. Automation settings are last-write-wins
//! 4. Projection days always include day 0 and stay sorted

use proptest::prelude::*;
use semver::Version;
use vmtplan_core::domain::{AutomationSetting, EntityAction, PlanType};
use vmtplan_core::scenario::{Scenario, ScenarioError, SettingValue};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_action() -> impl Strategy<Value = EntityAction> {
    prop::sample::select(EntityAction::ALL.to_vec())
}

fn arb_targets() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{2,6}-[0-9]{1,3}", 1..5)
}

fn arb_projection() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0u32..365, 1..4)
}

fn arb_flag_setting() -> impl Strategy<Value = AutomationSetting> {
    prop::sample::select(
        AutomationSetting::ALL
            .iter()
            .copied()
            .filter(|s| !s.is_numeric())
            .collect::<Vec<_>>(),
    )
}

fn scenario() -> Scenario {
    Scenario::new(Some("prop".into()), PlanType::Custom)
}

// ── 1. New-target requirement ────────────────────────────────────────

proptest! {
    #[test]
    fn new_target_required_only_for_replace_and_migrate(
        action in arb_action(),
        targets in arb_targets(),
        projection in arb_projection(),
    ) {
        let mut s = scenario();
        let result = s.change_entity(action, targets, &projection, Some(1), None);
        match action {
            EntityAction::Replace | EntityAction::Migrate => {
                prop_assert_eq!(result, Err(ScenarioError::MissingDestination { action }));
                prop_assert!(s.changes().is_empty());
            }
            EntityAction::Add | EntityAction::Remove => {
                prop_assert!(result.is_ok());
                prop_assert_eq!(s.changes().len(), 1);
            }
        }
    }
}

// ── 2. No merging ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn one_record_per_target_per_directive(
        directives in prop::collection::vec((arb_action(), arb_targets(), arb_projection()), 1..8),
    ) {
        let mut s = scenario();
        let mut expected = 0;
        for (action, targets, projection) in &directives {
            expected += targets.len();
            s.change_entity(*action, targets.clone(), projection, Some(1), Some("dest-1"))
                .unwrap();
        }
        let dto = s.to_dto(Some(&Version::new(8, 0, 0))).unwrap();
        prop_assert_eq!(dto.topology_changes.len(), expected);
        prop_assert_eq!(s.changes().len(), directives.len());
    }
}

// ── 3. Last write wins ───────────────────────────────────────────────

proptest! {
    #[test]
    fn last_automation_write_wins(
        setting in arb_flag_setting(),
        values in prop::collection::vec(any::<bool>(), 1..10),
    ) {
        let mut s = scenario();
        for v in &values {
            s.change_automation_setting(setting, *v).unwrap();
        }
        let last = *values.last().unwrap();
        prop_assert_eq!(s.automation_setting(setting), Some(SettingValue::Flag(last)));
        prop_assert_eq!(s.automation_settings().len(), 1);
    }
}

// ── 4. Projection days ───────────────────────────────────────────────

proptest! {
    #[test]
    fn projection_days_sorted_with_zero(
        projections in prop::collection::vec(arb_projection(), 0..6),
    ) {
        let mut s = scenario();
        for p in &projections {
            s.change_entity(EntityAction::Add, ["vm-1"], p, Some(1), None).unwrap();
        }
        let days = s.projection_days();
        prop_assert_eq!(days.first().copied(), Some(0));
        prop_assert!(days.windows(2).all(|w| w[0] < w[1]));
        for p in &projections {
            for d in p {
                prop_assert!(days.contains(d));
            }
        }
    }
}
