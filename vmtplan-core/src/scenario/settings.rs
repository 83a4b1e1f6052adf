//! Setting values and the per-target load/constraint entries a scenario carries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ScenarioError;
use crate::domain::{AutomationSetting, CloudOs, ConstraintCommodity};

/// Value assigned to an automation setting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Flag(bool),
    Number(f64),
}

impl SettingValue {
    pub fn as_flag(self) -> Option<bool> {
        match self {
            SettingValue::Flag(b) => Some(b),
            SettingValue::Number(_) => None,
        }
    }

    pub fn as_number(self) -> Option<f64> {
        match self {
            SettingValue::Number(n) => Some(n),
            SettingValue::Flag(_) => None,
        }
    }

    /// Check the value kind against what the setting accepts.
    pub(crate) fn check(self, setting: AutomationSetting) -> Result<Self, ScenarioError> {
        match (setting.is_numeric(), self) {
            (true, SettingValue::Number(_)) | (false, SettingValue::Flag(_)) => Ok(self),
            (true, _) => Err(ScenarioError::SettingValueType {
                setting,
                expected: "numeric",
            }),
            (false, _) => Err(ScenarioError::SettingValueType {
                setting,
                expected: "boolean",
            }),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(b: bool) -> Self {
        SettingValue::Flag(b)
    }
}

impl From<f64> for SettingValue {
    fn from(n: f64) -> Self {
        SettingValue::Number(n)
    }
}

impl From<u32> for SettingValue {
    fn from(n: u32) -> Self {
        SettingValue::Number(f64::from(n))
    }
}

/// Utilization override for one target (max utilization or current load).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtilizationChange {
    pub target: String,
    pub percent: u32,
    pub projection: u32,
}

/// Constraint lifted for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintRemoval {
    pub target: String,
    pub commodity: ConstraintCommodity,
    pub projection: u32,
}

/// Hot-to-cold cluster migration used by alleviate-pressure plans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelievePressure {
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    pub projection: u32,
}

/// Value stored under a cloud OS migration profile key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OsProfileValue {
    Flag(bool),
    Os(CloudOs),
}

/// Custom OS mapping entry for `cloud_os_custom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsMapping {
    pub source: CloudOs,
    pub target: CloudOs,
    #[serde(default)]
    pub unlicensed: Option<bool>,
}

/// Largest value accepted as epoch seconds (year 2286); anything above is read as milliseconds.
const MAX_EPOCH_SECONDS: i64 = 9_999_999_999;

/// Convert an epoch value in seconds or milliseconds to a UTC timestamp.
pub fn epoch_to_datetime(value: i64) -> Result<DateTime<Utc>, ScenarioError> {
    let parsed = if value.abs() > MAX_EPOCH_SECONDS {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    };
    parsed.ok_or(ScenarioError::InvalidTimestamp(value))
}

/// ISO-8601 UTC rendering used by the API (`2021-03-01T00:00:00Z`).
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
