//! Remote plan service trait, response types, and structured errors.
//!
//! The `PlanService` trait abstracts the Turbonomic REST API so the plan
//! lifecycle can be driven against the real client or a scripted fake.

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{MarketId, MarketState, ScenarioId};
use crate::scenario::{MarketParams, ScenarioDto};

/// Errors originating from the remote service or the transport to it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error("network unreachable: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("HTTP {status} from {path}: {message}")]
    Http {
        status: u16,
        path: String,
        message: String,
    },

    #[error("unexpected response from {path}: {message}")]
    Decode { path: String, message: String },
}

/// Scenario as acknowledged by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioInfo {
    pub uuid: String,
    #[serde(default)]
    pub display_name: String,
}

impl ScenarioInfo {
    pub fn id(&self) -> ScenarioId {
        ScenarioId::new(&self.uuid)
    }
}

/// Market summary (`MarketApiDTO`), trimmed to what the planner reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketInfo {
    pub uuid: String,
    #[serde(default)]
    pub display_name: String,
    pub state: MarketState,
    #[serde(default)]
    pub unplaced_entities: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_complete_date: Option<String>,
}

impl MarketInfo {
    pub fn id(&self) -> MarketId {
        MarketId::new(&self.uuid)
    }
}

/// Entity details used to decorate scope entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityInfo {
    pub uuid: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub class_name: String,
}

/// Min/max/avg/total aggregate attached to a statistic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatValues {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub avg: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
}

/// One statistic within a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatRecord {
    pub name: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub values: Option<StatValues>,
    #[serde(default)]
    pub capacity: Option<StatValues>,
    #[serde(default)]
    pub related_entity_type: Option<String>,
}

/// Result statistics for one period of a plan market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatSnapshot {
    #[serde(default)]
    pub date: Option<String>,
    /// `CURRENT`, `PROJECTED`, or `PLAN` on most servers.
    #[serde(default)]
    pub epoch: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub statistics: Vec<StatRecord>,
}

/// Remote plan service.
///
/// Implementations handle transport and authentication; callers only see
/// typed requests and responses.
pub trait PlanService: Send + Sync {
    /// Server release, used to pick the scenario DTO flavor.
    fn server_version(&self) -> Result<Version, ServiceError>;

    /// Login name of the authenticated user.
    fn current_user(&self) -> Result<String, ServiceError>;

    /// Look up an entity or group by UUID.
    fn entity(&self, uuid: &str) -> Result<EntityInfo, ServiceError>;

    /// Create a scenario from a request body.
    fn create_scenario(&self, dto: &ScenarioDto) -> Result<ScenarioInfo, ServiceError>;

    /// Apply a scenario to `base_market`, creating and starting a plan market.
    fn create_plan_market(
        &self,
        base_market: &str,
        scenario: &ScenarioId,
        market_name: &str,
        params: &MarketParams,
    ) -> Result<MarketInfo, ServiceError>;

    /// Current market summary, including state. Has no side effects.
    fn market(&self, market: &MarketId) -> Result<MarketInfo, ServiceError>;

    /// Per-period result statistics for a market.
    fn market_stats(&self, market: &MarketId) -> Result<Vec<StatSnapshot>, ServiceError>;

    /// Ask the server to stop a running market.
    fn stop_market(&self, market: &MarketId) -> Result<(), ServiceError>;

    fn delete_market(&self, market: &MarketId) -> Result<(), ServiceError>;

    fn delete_scenario(&self, scenario: &ScenarioId) -> Result<(), ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_info_parses_api_payload() {
        let json = r#"{
            "uuid": "_abc",
            "displayName": "CUSTOM_admin_1700000000",
            "className": "Market",
            "state": "SUCCEEDED",
            "unplacedEntities": true,
            "runDate": "2023-11-14T22:13:20-05:00",
            "runCompleteDate": "2023-11-14T22:19:02-05:00"
        }"#;
        let m: MarketInfo = serde_json::from_str(json).unwrap();
        assert_eq!(m.id(), MarketId::new("_abc"));
        assert_eq!(m.state, MarketState::Succeeded);
        assert!(m.unplaced_entities);
        assert_eq!(m.run_date.as_deref(), Some("2023-11-14T22:13:20-05:00"));
    }

    #[test]
    fn market_info_tolerates_missing_optional_fields() {
        let m: MarketInfo = serde_json::from_str(r#"{"uuid":"m1","state":"COPYING"}"#).unwrap();
        assert_eq!(m.state, MarketState::Copying);
        assert!(!m.unplaced_entities);
        assert!(m.run_complete_date.is_none());
    }

    #[test]
    fn stat_snapshot_parses_nested_values() {
        let json = r#"[{
            "date": "2023-11-14T00:00:00Z",
            "epoch": "PLAN",
            "statistics": [
                {"name": "numHosts", "value": 12.0, "values": {"min": 12, "max": 12, "avg": 12, "total": 12}},
                {"name": "CPU", "units": "MHz", "capacity": {"total": 96000.0}}
            ]
        }]"#;
        let stats: Vec<StatSnapshot> = serde_json::from_str(json).unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].epoch.as_deref(), Some("PLAN"));
        assert_eq!(stats[0].statistics[0].value, Some(12.0));
        assert_eq!(
            stats[0].statistics[1].capacity.as_ref().and_then(|c| c.total),
            Some(96000.0)
        );
    }
}
