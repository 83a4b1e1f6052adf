//! Legacy method names kept for callers of the older planner API.
//!
//! Each shim forwards to the canonical method and logs a warning; none of
//! them carries behavior of its own.

use super::{Scenario, ScenarioError};
use crate::domain::{AutomationSetting, EntityAction};

fn warn_deprecated(name: &str, replacement: &str) {
    tracing::warn!("{name} is deprecated, use {replacement} instead");
}

fn periods_or_today(periods: Option<&[u32]>) -> &[u32] {
    periods.unwrap_or(&[0])
}

impl Scenario {
    /// Add `count` copies of an entity.
    #[deprecated(since = "0.1.0", note = "use `change_entity(EntityAction::Add, ..)`")]
    pub fn add_entity(
        &mut self,
        id: &str,
        count: u32,
        periods: Option<&[u32]>,
    ) -> Result<(), ScenarioError> {
        warn_deprecated("add_entity", "change_entity");
        self.change_entity(
            EntityAction::Add,
            [id],
            periods_or_today(periods),
            Some(count),
            None,
        )
    }

    /// Add `count` copies of a template.
    #[deprecated(since = "0.1.0", note = "use `change_entity(EntityAction::Add, ..)`")]
    pub fn add_template(
        &mut self,
        id: &str,
        count: u32,
        periods: Option<&[u32]>,
    ) -> Result<(), ScenarioError> {
        warn_deprecated("add_template", "change_entity");
        self.change_entity(
            EntityAction::Add,
            [id],
            periods_or_today(periods),
            Some(count),
            None,
        )
    }

    #[deprecated(since = "0.1.0", note = "use `change_entity(EntityAction::Remove, ..)`")]
    pub fn delete_entity(&mut self, id: &str, periods: Option<&[u32]>) -> Result<(), ScenarioError> {
        warn_deprecated("delete_entity", "change_entity");
        self.change_entity(
            EntityAction::Remove,
            [id],
            periods_or_today(periods),
            None,
            None,
        )
    }

    #[deprecated(since = "0.1.0", note = "use `change_entity(EntityAction::Replace, ..)`")]
    pub fn replace_entity(
        &mut self,
        id: &str,
        replacement_id: &str,
        count: u32,
        periods: Option<&[u32]>,
    ) -> Result<(), ScenarioError> {
        warn_deprecated("replace_entity", "change_entity");
        self.change_entity(
            EntityAction::Replace,
            [id],
            periods_or_today(periods),
            Some(count),
            Some(replacement_id),
        )
    }

    #[deprecated(since = "0.1.0", note = "use `change_entity(EntityAction::Migrate, ..)`")]
    pub fn migrate_entity(
        &mut self,
        id: &str,
        destination_id: &str,
        period: u32,
    ) -> Result<(), ScenarioError> {
        warn_deprecated("migrate_entity", "change_entity");
        self.change_entity(
            EntityAction::Migrate,
            [id],
            &[period],
            None,
            Some(destination_id),
        )
    }

    /// Set the desired state center and/or diameter.
    #[deprecated(since = "0.1.0", note = "use `change_automation_setting`")]
    pub fn set_desired_state(
        &mut self,
        center: Option<f64>,
        diameter: Option<f64>,
    ) -> Result<(), ScenarioError> {
        warn_deprecated("set_desired_state", "change_automation_setting");
        if let Some(center) = center {
            self.change_automation_setting(AutomationSetting::UtilTarget, center)?;
        }
        if let Some(diameter) = diameter {
            self.change_automation_setting(AutomationSetting::TargetBand, diameter)?;
        }
        Ok(())
    }

    #[deprecated(since = "0.1.0", note = "use `change_max_utilization`")]
    pub fn set_max_utilization(
        &mut self,
        value: u32,
        ids: &[&str],
        periods: Option<&[u32]>,
    ) -> Result<(), ScenarioError> {
        warn_deprecated("set_max_utilization", "change_max_utilization");
        let day = periods_or_today(periods).first().copied().unwrap_or(0);
        self.change_max_utilization(ids.iter().copied(), value, day)
    }

    #[deprecated(since = "0.1.0", note = "use `change_max_utilization`")]
    pub fn set_utilization(&mut self, value: u32, ids: &[&str]) -> Result<(), ScenarioError> {
        warn_deprecated("set_utilization", "change_max_utilization");
        self.change_max_utilization(ids.iter().copied(), value, 0)
    }

    #[deprecated(since = "0.1.0", note = "use `change_utilization`")]
    pub fn set_used(&mut self, value: u32, ids: &[&str]) -> Result<(), ScenarioError> {
        warn_deprecated("set_used", "change_utilization");
        self.change_utilization(ids.iter().copied(), value, 0)
    }
}

#[cfg(test)]
#[allow(deprecated)]
mod tests {
    use super::*;
    use crate::domain::PlanType;
    use semver::Version;

    fn dto_json(s: &Scenario) -> serde_json::Value {
        let dto = s.to_dto(Some(&Version::new(8, 0, 0))).unwrap();
        serde_json::to_value(dto).unwrap()
    }

    fn named() -> Scenario {
        Scenario::new(Some("compat".into()), PlanType::Custom)
    }

    #[test]
    fn add_entity_matches_change_entity() {
        let mut legacy = named();
        legacy.add_entity("vm-1", 3, Some(&[0, 30])).unwrap();

        let mut canonical = named();
        canonical
            .change_entity(EntityAction::Add, ["vm-1"], &[0, 30], Some(3), None)
            .unwrap();

        assert_eq!(dto_json(&legacy), dto_json(&canonical));
    }

    #[test]
    fn replace_and_migrate_shims_carry_destination() {
        let mut s = named();
        s.replace_entity("host-1", "tmpl-9", 1, None).unwrap();
        s.migrate_entity("vm-4", "cluster-2", 15).unwrap();
        let changes = s.changes();
        assert_eq!(changes[0].new_target.as_deref(), Some("tmpl-9"));
        assert_eq!(changes[0].projection, vec![0]);
        assert_eq!(changes[1].new_target.as_deref(), Some("cluster-2"));
        assert_eq!(changes[1].projection, vec![15]);
    }

    #[test]
    fn delete_entity_defaults_to_today() {
        let mut s = named();
        s.delete_entity("vm-7", None).unwrap();
        assert_eq!(s.changes()[0].action, EntityAction::Remove);
        assert_eq!(s.changes()[0].projection, vec![0]);
    }

    #[test]
    fn desired_state_shim_sets_both_numbers() {
        let mut s = named();
        s.set_desired_state(Some(70.0), Some(10.0)).unwrap();
        assert_eq!(
            s.automation_setting(AutomationSetting::UtilTarget)
                .and_then(|v| v.as_number()),
            Some(70.0)
        );
        assert_eq!(
            s.automation_setting(AutomationSetting::TargetBand)
                .and_then(|v| v.as_number()),
            Some(10.0)
        );
    }

    #[test]
    fn utilization_shims_forward() {
        let mut s = named();
        s.set_utilization(90, &["vm-1"]).unwrap();
        s.set_max_utilization(75, &["vm-2"], Some(&[30])).unwrap();
        s.set_used(20, &["vm-3"]).unwrap();
        let max: Vec<_> = s.max_utilization().map(|u| (u.target.as_str(), u.percent, u.projection)).collect();
        assert_eq!(max, vec![("vm-1", 90, 0), ("vm-2", 75, 30)]);
        assert_eq!(s.utilization().count(), 1);
    }
}
