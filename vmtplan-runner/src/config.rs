//! TOML plan files.
//!
//! A plan file describes the connection, the scenario, and how to wait for
//! it. Every section except `[plan]` is optional:
//!
//! ```toml
//! [connection]
//! host = "turbo.example.com"
//! username = "administrator"
//! password_env = "TURBO_PASSWORD"
//!
//! [plan]
//! name = "Add web tier"
//! type = "ADD_WORKLOAD"
//! scope = ["cluster-1"]
//!
//! [polling]
//! interval_secs = 0      # 0 = dynamic
//! max_wait_mins = 120    # 0 = unbounded
//!
//! [[changes]]
//! action = "add"
//! targets = ["vm-template-web"]
//! count = 10
//! projection = [0, 30]
//!
//! [settings]
//! provision_pm = true
//! util_target = 70
//! ```

use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use vmtplan_core::api::ConnectionSettings;
use vmtplan_core::domain::{AutomationSetting, CloudOs, ConstraintCommodity, EntityAction, PlanType};
use vmtplan_core::scenario::{OsMapping, Scenario, ScenarioError, SettingValue};
use vmtplan_core::version::parse_version_info;

use crate::logging::LoggingConfig;
use crate::poll::{PollInterval, PollPolicy};
use crate::presets::Preset;

const DEFAULT_PASSWORD_ENV: &str = "TURBO_PASSWORD";

/// Errors loading or applying a plan file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid plan file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid scenario: {0}")]
    Scenario(#[from] ScenarioError),

    #[error("invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("plan file has no [connection] section")]
    MissingConnection,

    #[error("environment variable {0} is not set")]
    MissingEnv(String),
}

/// `[connection]`: where the server is and how to log in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    pub host: String,
    pub username: String,
    /// Name of the environment variable holding the password.
    #[serde(default = "default_password_env")]
    pub password_env: String,
    #[serde(default)]
    pub verify_tls: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_password_env() -> String {
    DEFAULT_PASSWORD_ENV.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// `[plan]`: scenario identity and where it runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanSection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub plan_type: PlanType,
    #[serde(default)]
    pub scope: Vec<String>,
    /// Start from a named preset; explicit sections are applied on top.
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub base_market: Option<String>,
    #[serde(default)]
    pub market_name: Option<String>,
    /// Pin the request layout to a server version instead of asking the server.
    #[serde(default)]
    pub version: Option<String>,
}

/// `[polling]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollingConfig {
    /// Seconds between state queries, 0 = dynamic.
    pub interval_secs: u64,
    /// Maximum wait in minutes, 0 = unbounded.
    pub max_wait_mins: u64,
    /// Fail when the market is still `CREATED` after this many polls.
    pub stall_polls: Option<u32>,
}

/// One `[[changes]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeConfig {
    pub action: EntityAction,
    pub targets: Vec<String>,
    #[serde(default = "default_projection")]
    pub projection: Vec<u32>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub new_target: Option<String>,
}

fn default_projection() -> Vec<u32> {
    vec![0]
}

/// Utilization override for a set of targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UtilizationConfig {
    pub targets: Vec<String>,
    pub percent: u32,
    #[serde(default)]
    pub projection: u32,
}

/// Peak baseline for a set of clusters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeakBaselineConfig {
    pub targets: Vec<String>,
    pub epoch: i64,
}

/// `[load]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    pub add_historical: Option<bool>,
    pub include_reserved: Option<bool>,
    /// Seconds or milliseconds since the Unix epoch.
    pub historical_baseline: Option<i64>,
    pub peak_baseline: Vec<PeakBaselineConfig>,
    pub max_utilization: Vec<UtilizationConfig>,
    pub utilization: Vec<UtilizationConfig>,
}

/// One `[[constraints.remove]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConstraintConfig {
    pub targets: Vec<String>,
    pub commodity: ConstraintCommodity,
    #[serde(default)]
    pub projection: u32,
}

/// `[constraints]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConstraintsConfig {
    /// Ignore every placement constraint in the plan market.
    pub ignore_all: bool,
    pub remove: Vec<ConstraintConfig>,
}

/// `[cloud_os]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CloudOsConfig {
    pub match_source: Option<bool>,
    pub unlicensed: Option<bool>,
    pub custom: Vec<OsMapping>,
}

/// One `[[relieve_pressure]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelievePressureConfig {
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    #[serde(default)]
    pub projection: u32,
}

/// A complete plan file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanFile {
    #[serde(default)]
    pub connection: Option<ConnectionConfig>,
    #[serde(default)]
    pub plan: PlanSection,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub changes: Vec<ChangeConfig>,
    #[serde(default)]
    pub settings: BTreeMap<AutomationSetting, SettingValue>,
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub constraints: ConstraintsConfig,
    #[serde(default)]
    pub cloud_os: Option<CloudOsConfig>,
    #[serde(default)]
    pub relieve_pressure: Vec<RelievePressureConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PlanFile {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Pinned server version, if the file names one.
    pub fn version(&self) -> Result<Option<Version>, ConfigError> {
        self.plan
            .version
            .as_deref()
            .map(|v| {
                parse_version_info(v).ok_or_else(|| ConfigError::Invalid {
                    field: "plan.version",
                    message: format!("no version number in {v:?}"),
                })
            })
            .transpose()
    }

    /// Build the scenario described by the file.
    ///
    /// A preset, when named, is the starting point; every other section is
    /// applied on top of it in file order.
    pub fn to_scenario(&self) -> Result<Scenario, ConfigError> {
        let plan = &self.plan;
        let mut scenario = match plan.preset.as_deref() {
            Some(name) => {
                let preset = Preset::from_name(name).ok_or_else(|| ConfigError::Invalid {
                    field: "plan.preset",
                    message: format!("unknown preset {name:?}"),
                })?;
                preset.scenario(plan.scope.iter().cloned())
            }
            None => Scenario::with_scope(plan.name.clone(), plan.plan_type, plan.scope.iter().cloned()),
        };
        if let Some(name) = &plan.name {
            scenario.set_name(name.clone());
        }
        if plan.preset.is_some() && plan.plan_type != PlanType::default() {
            scenario.set_plan_type(plan.plan_type);
        }
        if let Some(version) = self.version()? {
            scenario.set_version(version);
        }

        for change in &self.changes {
            scenario.change_entity(
                change.action,
                change.targets.iter().cloned(),
                &change.projection,
                change.count,
                change.new_target.as_deref(),
            )?;
        }

        for (&setting, &value) in &self.settings {
            scenario.change_automation_setting(setting, value)?;
        }

        self.apply_load(&mut scenario)?;

        if self.constraints.ignore_all {
            scenario.remove_constraints(Vec::<String>::new(), None, 0);
        }
        for c in &self.constraints.remove {
            scenario.remove_constraints(c.targets.iter().cloned(), Some(c.commodity), c.projection);
        }

        if let Some(os) = &self.cloud_os {
            if !os.custom.is_empty() {
                scenario.cloud_os_custom(&os.custom);
            }
            if let Some(flag) = os.match_source {
                scenario.cloud_os_match_source(flag);
            }
            if let Some(flag) = os.unlicensed {
                scenario.cloud_os_unlicensed(flag);
            }
        }

        for r in &self.relieve_pressure {
            scenario.relieve_pressure(
                r.sources.iter().cloned(),
                r.destinations.iter().cloned(),
                r.projection,
            )?;
        }

        Ok(scenario)
    }

    fn apply_load(&self, scenario: &mut Scenario) -> Result<(), ConfigError> {
        let load = &self.load;
        if let Some(flag) = load.add_historical {
            scenario.add_historical(flag);
        }
        if let Some(flag) = load.include_reserved {
            scenario.include_reserved(flag);
        }
        if let Some(epoch) = load.historical_baseline {
            scenario.set_historical_baseline(epoch)?;
        }
        for p in &load.peak_baseline {
            scenario.set_peak_baseline(p.targets.iter().cloned(), p.epoch)?;
        }
        for u in &load.max_utilization {
            scenario.change_max_utilization(u.targets.iter().cloned(), u.percent, u.projection)?;
        }
        for u in &load.utilization {
            scenario.change_utilization(u.targets.iter().cloned(), u.percent, u.projection)?;
        }
        Ok(())
    }

    pub fn poll_policy(&self) -> PollPolicy {
        let p = &self.polling;
        PollPolicy {
            interval: PollInterval::from_secs(p.interval_secs),
            max_wait: (p.max_wait_mins > 0).then(|| Duration::from_secs(p.max_wait_mins.saturating_mul(60))),
            stall_polls: p.stall_polls.filter(|n| *n > 0),
            ..PollPolicy::default()
        }
    }

    /// Connection settings, reading the password from the process environment.
    pub fn connection_settings(&self) -> Result<ConnectionSettings, ConfigError> {
        self.connection_settings_with(|name| std::env::var(name).ok())
    }

    /// Connection settings with an explicit environment lookup.
    pub fn connection_settings_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<ConnectionSettings, ConfigError> {
        let conn = self
            .connection
            .as_ref()
            .ok_or(ConfigError::MissingConnection)?;
        if conn.host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "connection.host",
                message: "must not be empty".into(),
            });
        }
        let password =
            env(&conn.password_env).ok_or_else(|| ConfigError::MissingEnv(conn.password_env.clone()))?;
        let mut settings = ConnectionSettings::new(&conn.host, &conn.username, password);
        settings.verify_tls = conn.verify_tls;
        settings.timeout = Duration::from_secs(conn.timeout_secs);
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_a_default_custom_plan() {
        let file = PlanFile::from_toml("").unwrap();
        assert_eq!(file.plan.plan_type, PlanType::Custom);
        let scenario = file.to_scenario().unwrap();
        assert!(scenario.changes().is_empty());
        assert!(scenario.name().starts_with("CUSTOM_"));
    }

    #[test]
    fn polling_zero_means_dynamic_and_unbounded() {
        let file = PlanFile::from_toml("[polling]\ninterval_secs = 0\nmax_wait_mins = 0").unwrap();
        let policy = file.poll_policy();
        assert_eq!(policy.interval, PollInterval::Dynamic);
        assert_eq!(policy.max_wait, None);

        let file = PlanFile::from_toml("[polling]\ninterval_secs = 15\nmax_wait_mins = 90\nstall_polls = 3")
            .unwrap();
        let policy = file.poll_policy();
        assert_eq!(policy.interval, PollInterval::Fixed(Duration::from_secs(15)));
        assert_eq!(policy.max_wait, Some(Duration::from_secs(5400)));
        assert_eq!(policy.stall_polls, Some(3));
    }

    #[test]
    fn huge_max_wait_saturates() {
        let file = PlanFile::from_toml("[polling]\nmax_wait_mins = 9223372036854775807").unwrap();
        assert_eq!(file.poll_policy().max_wait, Some(Duration::from_secs(u64::MAX)));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = PlanFile::from_toml("[plan]\nnmae = \"typo\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn bad_version_pin_is_reported() {
        let file = PlanFile::from_toml("[plan]\nversion = \"latest\"").unwrap();
        assert!(matches!(
            file.to_scenario(),
            Err(ConfigError::Invalid {
                field: "plan.version",
                ..
            })
        ));
    }

    #[test]
    fn password_comes_from_named_variable() {
        let file = PlanFile::from_toml(
            "[connection]\nhost = \"turbo\"\nusername = \"admin\"\npassword_env = \"MY_PW\"",
        )
        .unwrap();
        let settings = file
            .connection_settings_with(|name| (name == "MY_PW").then(|| "s3cret".to_string()))
            .unwrap();
        assert_eq!(settings.password, "s3cret");
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert!(!settings.verify_tls);

        let err = file.connection_settings_with(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(name) if name == "MY_PW"));
    }

    #[test]
    fn missing_connection_section() {
        let file = PlanFile::default();
        assert!(matches!(
            file.connection_settings_with(|_| Some("x".into())),
            Err(ConfigError::MissingConnection)
        ));
    }

    #[test]
    fn cloud_os_section_maps_to_profile() {
        let file = PlanFile::from_toml(
            r#"
[plan]
type = "CLOUD_MIGRATION"

[cloud_os]
unlicensed = true

[[cloud_os.custom]]
source = "RHEL"
target = "LINUX"
"#,
        )
        .unwrap();
        let s = file.to_scenario().unwrap();
        assert_eq!(s.plan_type(), PlanType::CloudMigration);
        let profile = s.os_profile();
        assert!(profile.contains_key("rhelTargetOs"));
        assert_eq!(profile.len(), 1 + 1 + CloudOs::ALL.len());
    }
}
