//! Scenario model: an in-memory builder for plan scenario requests.
//!
//! A [`Scenario`] accumulates entity changes and setting overrides and maps
//! them to the server's request body on demand. Nothing here touches the
//! network; invalid input is rejected with a [`ScenarioError`] as soon as it
//! is given.
//!
//! Ordering rules:
//! - entity-change directives keep insertion order and are never merged
//! - automation settings are last-write-wins per setting
//! - per-target load settings (max utilization, utilization, peak baseline,
//!   constraint removal) are last-write-wins per target

mod compat;
pub mod directive;
pub mod dto;
pub mod error;
pub mod settings;

use chrono::{DateTime, Utc};
use semver::Version;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{AutomationSetting, CloudOs, ConstraintCommodity, EntityAction, PlanType};
use crate::version::flavor_for;

pub use directive::EntityChange;
pub use dto::ScenarioDto;
pub use error::ScenarioError;
pub use settings::{
    epoch_to_datetime, ConstraintRemoval, OsMapping, OsProfileValue, RelievePressure,
    SettingValue, UtilizationChange,
};

const MATCH_TO_SOURCE: &str = "matchToSource";

/// Market-creation query parameters derived from the scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketParams {
    pub ignore_constraints: bool,
}

/// A plan scenario under construction.
#[derive(Debug, Clone)]
pub struct Scenario {
    name: String,
    plan_type: PlanType,
    scope: Vec<String>,
    changes: Vec<EntityChange>,
    automation: BTreeMap<AutomationSetting, SettingValue>,
    projection: BTreeSet<u32>,
    add_history: Option<bool>,
    historical_baseline: Option<DateTime<Utc>>,
    peak_baselines: BTreeMap<String, DateTime<Utc>>,
    max_utilization: BTreeMap<String, UtilizationChange>,
    utilization: BTreeMap<String, UtilizationChange>,
    constraint_removals: BTreeMap<String, ConstraintRemoval>,
    ignore_constraints: bool,
    os_profile: BTreeMap<String, OsProfileValue>,
    relieve_pressure: Vec<RelievePressure>,
    version: Option<Version>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new(None, PlanType::Custom)
    }
}

impl Scenario {
    /// Create an empty scenario. Without a name, one is generated from the
    /// current local time (`CUSTOM_20240131_142501`).
    pub fn new(name: Option<String>, plan_type: PlanType) -> Self {
        let name = name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(generate_name);
        Self {
            name,
            plan_type,
            scope: Vec::new(),
            changes: Vec::new(),
            automation: BTreeMap::new(),
            projection: BTreeSet::from([0]),
            add_history: None,
            historical_baseline: None,
            peak_baselines: BTreeMap::new(),
            max_utilization: BTreeMap::new(),
            utilization: BTreeMap::new(),
            constraint_removals: BTreeMap::new(),
            ignore_constraints: false,
            os_profile: BTreeMap::new(),
            relieve_pressure: Vec::new(),
            version: None,
        }
    }

    /// Convenience constructor with an initial scope.
    pub fn with_scope<I, S>(name: Option<String>, plan_type: PlanType, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut scenario = Self::new(name, plan_type);
        scenario.set_scope(scope, false);
        scenario
    }

    // ── Accessors ─────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn plan_type(&self) -> PlanType {
        self.plan_type
    }

    pub fn set_plan_type(&mut self, plan_type: PlanType) {
        self.plan_type = plan_type;
    }

    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    pub fn changes(&self) -> &[EntityChange] {
        &self.changes
    }

    pub fn automation_settings(&self) -> &BTreeMap<AutomationSetting, SettingValue> {
        &self.automation
    }

    pub fn automation_setting(&self, setting: AutomationSetting) -> Option<SettingValue> {
        self.automation.get(&setting).copied()
    }

    /// Every projection day referenced by a change, always including day 0, ascending.
    pub fn projection_days(&self) -> Vec<u32> {
        self.projection.iter().copied().collect()
    }

    pub fn add_history(&self) -> Option<bool> {
        self.add_history
    }

    pub fn historical_baseline(&self) -> Option<&DateTime<Utc>> {
        self.historical_baseline.as_ref()
    }

    pub fn peak_baselines(&self) -> impl Iterator<Item = (&String, &DateTime<Utc>)> {
        self.peak_baselines.iter()
    }

    pub fn max_utilization(&self) -> impl Iterator<Item = &UtilizationChange> {
        self.max_utilization.values()
    }

    pub fn utilization(&self) -> impl Iterator<Item = &UtilizationChange> {
        self.utilization.values()
    }

    pub fn constraint_removals(&self) -> impl Iterator<Item = &ConstraintRemoval> {
        self.constraint_removals.values()
    }

    pub fn os_profile(&self) -> &BTreeMap<String, OsProfileValue> {
        &self.os_profile
    }

    pub fn relieve_pressure_changes(&self) -> &[RelievePressure] {
        &self.relieve_pressure
    }

    /// Server version the DTO is built for, if pinned.
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = Some(version);
    }

    pub fn market_params(&self) -> MarketParams {
        MarketParams {
            ignore_constraints: self.ignore_constraints,
        }
    }

    // ── Scope ─────────────────────────────────────────────────────────

    /// Replace the scope, or extend it when `append` is true. An empty list clears it.
    pub fn set_scope<I, S>(&mut self, targets: I, append: bool)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = targets.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            self.scope.clear();
        } else if append {
            self.scope.extend(ids);
        } else {
            self.scope = ids;
        }
    }

    // ── Entity changes ────────────────────────────────────────────────

    /// Add, remove, replace, or migrate entities.
    ///
    /// `new_target` is the template for replace and the destination for
    /// migrate; it is required for both and ignored otherwise. `count`
    /// defaults to 1. Add changes apply at every projection day given; the
    /// other actions take effect on the first one.
    pub fn change_entity<I, S>(
        &mut self,
        action: EntityAction,
        targets: I,
        projection: &[u32],
        count: Option<u32>,
        new_target: Option<&str>,
    ) -> Result<(), ScenarioError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let change = EntityChange::new(
            action,
            targets.into_iter().map(Into::into).collect(),
            projection.to_vec(),
            count,
            new_target.map(str::to_string),
        )?;
        self.push_change(change);
        Ok(())
    }

    /// Append an already validated directive.
    pub fn push_change(&mut self, change: EntityChange) {
        self.projection.extend(change.projection.iter().copied());
        tracing::debug!(
            action = %change.action,
            targets = change.targets.len(),
            "scenario entity change added"
        );
        self.changes.push(change);
    }

    // ── Settings ──────────────────────────────────────────────────────

    /// Set an automation setting, replacing any earlier value for it.
    pub fn change_automation_setting(
        &mut self,
        setting: AutomationSetting,
        value: impl Into<SettingValue>,
    ) -> Result<(), ScenarioError> {
        let value = value.into().check(setting)?;
        self.automation.insert(setting, value);
        Ok(())
    }

    /// Add VMs based on the previous month's history.
    pub fn add_historical(&mut self, value: bool) {
        self.add_history = Some(value);
    }

    /// Alias for [`Scenario::add_historical`].
    pub fn add_hist(&mut self, value: bool) {
        self.add_historical(value);
    }

    /// Count reserved VMs as workload.
    pub fn include_reserved(&mut self, value: bool) {
        self.automation
            .insert(AutomationSetting::IncludeReservations, SettingValue::Flag(value));
    }

    /// Base used and peak utilization on historical data at `epoch`
    /// (seconds or milliseconds since the Unix epoch).
    pub fn set_historical_baseline(&mut self, epoch: i64) -> Result<(), ScenarioError> {
        self.historical_baseline = Some(epoch_to_datetime(epoch)?);
        Ok(())
    }

    /// Alias for [`Scenario::set_historical_baseline`].
    pub fn set_hist_baseline(&mut self, epoch: i64) -> Result<(), ScenarioError> {
        self.set_historical_baseline(epoch)
    }

    /// Load a peak baseline from history for each target cluster.
    pub fn set_peak_baseline<I, S>(&mut self, targets: I, epoch: i64) -> Result<(), ScenarioError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ts = epoch_to_datetime(epoch)?;
        for target in targets {
            self.peak_baselines.insert(target.into(), ts);
        }
        Ok(())
    }

    /// Cap the share of commodity capacity the targets may consume.
    pub fn change_max_utilization<I, S>(
        &mut self,
        targets: I,
        percent: u32,
        projection: u32,
    ) -> Result<(), ScenarioError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        check_percent(percent)?;
        for target in targets {
            let target = target.into();
            self.max_utilization.insert(
                target.clone(),
                UtilizationChange {
                    target,
                    percent,
                    projection,
                },
            );
        }
        Ok(())
    }

    /// Change the load of the targets by a percentage.
    pub fn change_utilization<I, S>(
        &mut self,
        targets: I,
        percent: u32,
        projection: u32,
    ) -> Result<(), ScenarioError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        check_percent(percent)?;
        for target in targets {
            let target = target.into();
            self.utilization.insert(
                target.clone(),
                UtilizationChange {
                    target,
                    percent,
                    projection,
                },
            );
        }
        Ok(())
    }

    /// Lift placement constraints.
    ///
    /// With targets and a commodity, that constraint is removed for each
    /// target. With neither, every constraint in the market is ignored. Any
    /// other combination is a no-op.
    pub fn remove_constraints<I, S>(
        &mut self,
        targets: I,
        commodity: Option<ConstraintCommodity>,
        projection: u32,
    ) where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets: Vec<String> = targets.into_iter().map(Into::into).collect();
        match (targets.is_empty(), commodity) {
            (false, Some(commodity)) => {
                for target in targets {
                    self.constraint_removals.insert(
                        target.clone(),
                        ConstraintRemoval {
                            target,
                            commodity,
                            projection,
                        },
                    );
                }
            }
            (true, None) => self.ignore_constraints = true,
            _ => tracing::debug!("remove_constraints needs both targets and a commodity, ignored"),
        }
    }

    /// Migrate hot clusters to cold clusters. Both groups are appended to the scope.
    pub fn relieve_pressure<I, J, S, T>(
        &mut self,
        sources: I,
        destinations: J,
        projection: u32,
    ) -> Result<(), ScenarioError>
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        let sources: Vec<String> = sources.into_iter().map(Into::into).collect();
        let destinations: Vec<String> = destinations.into_iter().map(Into::into).collect();
        if sources.is_empty() || destinations.is_empty() {
            return Err(ScenarioError::EmptyPressureGroups);
        }
        self.set_scope(sources.clone(), true);
        self.set_scope(destinations.clone(), true);
        self.relieve_pressure.push(RelievePressure {
            sources,
            destinations,
            projection,
        });
        Ok(())
    }

    // ── Cloud OS migration profile ────────────────────────────────────

    /// Keep the source OS on migrated workloads.
    pub fn cloud_os_match_source(&mut self, match_source: bool) {
        self.os_profile
            .insert(MATCH_TO_SOURCE.into(), OsProfileValue::Flag(match_source));
    }

    /// Choose unlicensed (or licensed) images for every OS.
    pub fn cloud_os_unlicensed(&mut self, unlicensed: bool) {
        for os in CloudOs::ALL {
            self.os_profile
                .insert(os.license_key().into(), OsProfileValue::Flag(unlicensed));
        }
    }

    /// Map one source OS to a target OS.
    pub fn cloud_os_map(&mut self, source: CloudOs, target: CloudOs, unlicensed: Option<bool>) {
        self.os_profile
            .insert(source.target_os_key().into(), OsProfileValue::Os(target));
        if let Some(flag) = unlicensed {
            self.os_profile
                .insert(source.license_key().into(), OsProfileValue::Flag(flag));
        }
    }

    /// Replace source matching with an explicit mapping table.
    pub fn cloud_os_custom(&mut self, mappings: &[OsMapping]) {
        self.cloud_os_match_source(false);
        for m in mappings {
            self.cloud_os_map(m.source, m.target, m.unlicensed);
        }
    }

    // ── Serialization ─────────────────────────────────────────────────

    /// Build the request body for a server version. Falls back to the
    /// pinned version when `version` is `None`.
    pub fn to_dto(&self, version: Option<&Version>) -> Result<ScenarioDto, ScenarioError> {
        let version = version
            .or(self.version.as_ref())
            .ok_or(ScenarioError::MissingVersion)?;
        let flavor = flavor_for(version)?;
        Ok(dto::build(self, flavor))
    }

    /// Pretty JSON of [`Scenario::to_dto`].
    pub fn to_json(&self, version: Option<&Version>) -> Result<String, ScenarioError> {
        let dto = self.to_dto(version)?;
        serde_json::to_string_pretty(&dto).map_err(|e| ScenarioError::Serialize(e.to_string()))
    }
}

fn check_percent(percent: u32) -> Result<(), ScenarioError> {
    if percent > 100 {
        return Err(ScenarioError::UtilizationOutOfRange(percent));
    }
    Ok(())
}

fn generate_name() -> String {
    format!("CUSTOM_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"))
}
