//! Scenario request DTO (`ScenarioApiDTO`) and the mapping from [`Scenario`].
//!
//! Field names follow the API's camelCase JSON. Empty sections are omitted so
//! the request only carries what the caller actually changed.

use serde::{Deserialize, Serialize};

use super::error::ScenarioError;
use super::settings::{format_timestamp, OsProfileValue, SettingValue};
use super::Scenario;
use crate::domain::{AutomationSetting, EntityAction, PlanType};
use crate::version::DtoFlavor;

/// `{"uuid": ...}` reference to a remote object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRef {
    pub uuid: String,
}

impl ApiRef {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self { uuid: uuid.into() }
    }
}

/// Scope entry. Some 7.21 builds also require display and class names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeEntry {
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

/// Full scenario submission body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDto {
    pub display_name: String,
    #[serde(rename = "type")]
    pub plan_type: PlanType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope: Vec<ScopeEntry>,
    pub projection_days: Vec<u32>,
    #[serde(default, skip_serializing_if = "ConfigChanges::is_empty")]
    pub config_changes: ConfigChanges,
    #[serde(default, skip_serializing_if = "LoadChanges::is_empty")]
    pub load_changes: LoadChanges,
    #[serde(default, skip_serializing_if = "TimebasedTopologyChanges::is_empty")]
    pub timebased_topology_changes: TimebasedTopologyChanges,
    #[serde(default, skip_serializing_if = "TopologyChanges::is_empty")]
    pub topology_changes: TopologyChanges,
}

impl ScenarioDto {
    /// BLAKE3 hash of the canonical JSON body. Identical scenarios hash identically.
    pub fn fingerprint(&self) -> Result<String, ScenarioError> {
        let mut hasher = blake3::Hasher::new();
        serde_json::to_writer(&mut hasher, self)
            .map_err(|e| ScenarioError::Serialize(e.to_string()))?;
        Ok(hasher.finalize().to_hex().to_string())
    }
}

/// Wire value of an automation setting: boolean (classic), number (desired
/// state), or `ENABLED`/`DISABLED` (XL).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationSettingDto {
    pub uuid: String,
    pub value: WireValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsMigrationSettingDto {
    pub uuid: String,
    pub value: OsProfileValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintRemovalDto {
    pub projection_day: u32,
    pub constraint_type: String,
    pub target: ApiRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigChanges {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub automation_setting_list: Vec<AutomationSettingDto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub os_migration_settings_list: Vec<OsMigrationSettingDto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_constraint_list: Vec<ConstraintRemovalDto>,
}

impl ConfigChanges {
    pub fn is_empty(&self) -> bool {
        self.automation_setting_list.is_empty()
            && self.os_migration_settings_list.is_empty()
            && self.remove_constraint_list.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakBaselineDto {
    pub date: String,
    pub target: ApiRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxUtilizationDto {
    pub max_percentage: u32,
    pub projection_day: u32,
    pub target: ApiRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationDto {
    pub percentage: u32,
    pub projection_day: u32,
    pub target: ApiRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub peak_baseline_list: Vec<PeakBaselineDto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub max_utilization_list: Vec<MaxUtilizationDto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub utilization_list: Vec<UtilizationDto>,
}

impl LoadChanges {
    pub fn is_empty(&self) -> bool {
        self.baseline_date.is_none()
            && self.peak_baseline_list.is_empty()
            && self.max_utilization_list.is_empty()
            && self.utilization_list.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimebasedTopologyChanges {
    #[serde(
        rename = "addHistoryVMs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub add_history_vms: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_reservation: Option<bool>,
}

impl TimebasedTopologyChanges {
    pub fn is_empty(&self) -> bool {
        self.add_history_vms.is_none() && self.include_reservation.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChange {
    pub count: u32,
    pub projection_days: Vec<u32>,
    pub target: ApiRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveChange {
    pub projection_day: u32,
    pub target: ApiRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceChange {
    pub projection_day: u32,
    pub target: ApiRef,
    pub template: ApiRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateChange {
    pub projection_day: u32,
    pub source: ApiRef,
    pub destination: ApiRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelievePressureChange {
    pub projection_day: u32,
    pub sources: Vec<ApiRef>,
    pub destinations: Vec<ApiRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyChanges {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_list: Vec<AddChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_list: Vec<RemoveChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replace_list: Vec<ReplaceChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub migrate_list: Vec<MigrateChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relieve_pressure_list: Vec<RelievePressureChange>,
}

impl TopologyChanges {
    pub fn is_empty(&self) -> bool {
        self.add_list.is_empty()
            && self.remove_list.is_empty()
            && self.replace_list.is_empty()
            && self.migrate_list.is_empty()
            && self.relieve_pressure_list.is_empty()
    }

    /// Total number of entity-change records across all lists.
    pub fn len(&self) -> usize {
        self.add_list.len()
            + self.remove_list.len()
            + self.replace_list.len()
            + self.migrate_list.len()
            + self.relieve_pressure_list.len()
    }
}

fn automation_entry(
    setting: AutomationSetting,
    value: SettingValue,
    flavor: DtoFlavor,
) -> Option<AutomationSettingDto> {
    match value {
        SettingValue::Number(n) => Some(AutomationSettingDto {
            uuid: setting.code().to_string(),
            value: WireValue::Number(n),
            entity_type: None,
        }),
        SettingValue::Flag(enabled) => {
            let entity_type = setting.entity_type()?.to_string();
            let entry = match flavor {
                DtoFlavor::Classic => AutomationSettingDto {
                    uuid: setting.code().to_string(),
                    value: WireValue::Flag(enabled),
                    entity_type: Some(entity_type),
                },
                DtoFlavor::Xl => AutomationSettingDto {
                    uuid: setting.action_name()?.to_string(),
                    value: WireValue::Text(if enabled { "ENABLED" } else { "DISABLED" }.into()),
                    entity_type: Some(entity_type),
                },
            };
            Some(entry)
        }
    }
}

fn topology_changes(scenario: &Scenario) -> TopologyChanges {
    let mut topo = TopologyChanges::default();

    for change in scenario.changes() {
        for target in &change.targets {
            match change.action {
                EntityAction::Add => topo.add_list.push(AddChange {
                    count: change.count,
                    projection_days: change.projection.clone(),
                    target: ApiRef::new(target),
                }),
                EntityAction::Remove => topo.remove_list.push(RemoveChange {
                    projection_day: change.first_day(),
                    target: ApiRef::new(target),
                }),
                EntityAction::Replace => {
                    // validated at construction
                    if let Some(template) = &change.new_target {
                        topo.replace_list.push(ReplaceChange {
                            projection_day: change.first_day(),
                            target: ApiRef::new(target),
                            template: ApiRef::new(template),
                        });
                    }
                }
                EntityAction::Migrate => {
                    if let Some(destination) = &change.new_target {
                        topo.migrate_list.push(MigrateChange {
                            projection_day: change.first_day(),
                            source: ApiRef::new(target),
                            destination: ApiRef::new(destination),
                        });
                    }
                }
            }
        }
    }

    for relieve in scenario.relieve_pressure_changes() {
        topo.relieve_pressure_list.push(RelievePressureChange {
            projection_day: relieve.projection,
            sources: relieve.sources.iter().map(ApiRef::new).collect(),
            destinations: relieve.destinations.iter().map(ApiRef::new).collect(),
        });
    }

    topo
}

/// Map a scenario to the request body for the given flavor.
pub(crate) fn build(scenario: &Scenario, flavor: DtoFlavor) -> ScenarioDto {
    let mut config = ConfigChanges::default();
    let mut timebased = TimebasedTopologyChanges {
        add_history_vms: scenario.add_history(),
        include_reservation: None,
    };

    for (&setting, &value) in scenario.automation_settings() {
        if setting == AutomationSetting::IncludeReservations {
            timebased.include_reservation = value.as_flag();
            continue;
        }
        if let Some(entry) = automation_entry(setting, value, flavor) {
            config.automation_setting_list.push(entry);
        }
    }

    for (key, value) in scenario.os_profile() {
        config.os_migration_settings_list.push(OsMigrationSettingDto {
            uuid: key.clone(),
            value: *value,
        });
    }

    for removal in scenario.constraint_removals() {
        config.remove_constraint_list.push(ConstraintRemovalDto {
            projection_day: removal.projection,
            constraint_type: removal.commodity.as_str().to_string(),
            target: ApiRef::new(&removal.target),
        });
    }

    let load = LoadChanges {
        baseline_date: scenario.historical_baseline().map(format_timestamp),
        peak_baseline_list: scenario
            .peak_baselines()
            .map(|(target, ts)| PeakBaselineDto {
                date: format_timestamp(ts),
                target: ApiRef::new(target),
            })
            .collect(),
        max_utilization_list: scenario
            .max_utilization()
            .map(|u| MaxUtilizationDto {
                max_percentage: u.percent,
                projection_day: u.projection,
                target: ApiRef::new(&u.target),
            })
            .collect(),
        utilization_list: scenario
            .utilization()
            .map(|u| UtilizationDto {
                percentage: u.percent,
                projection_day: u.projection,
                target: ApiRef::new(&u.target),
            })
            .collect(),
    };

    ScenarioDto {
        display_name: scenario.name().to_string(),
        plan_type: scenario.plan_type(),
        scope: scenario
            .scope()
            .iter()
            .map(|uuid| ScopeEntry {
                uuid: uuid.clone(),
                display_name: None,
                class_name: None,
            })
            .collect(),
        projection_days: scenario.projection_days(),
        config_changes: config,
        load_changes: load,
        timebased_topology_changes: timebased,
        topology_changes: topology_changes(scenario),
    }
}
