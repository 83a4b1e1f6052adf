//! Enumerations mirrored from the Turbonomic plan API.
//!
//! Wire values are the strings the API uses; the Rust names follow the
//! meaning, not the wire spelling.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Automation toggles the remote analysis honours during a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationSetting {
    /// Provision new datastores.
    ProvisionDs,
    /// Provision new hosts.
    ProvisionPm,
    /// Resize VMs.
    Resize,
    /// Suspend datastores.
    SuspendDs,
    /// Suspend hosts.
    SuspendPm,
    /// Desired state center (performance vs. efficiency).
    UtilTarget,
    /// Desired state diameter (width of the acceptable band).
    TargetBand,
    /// Count reserved VMs as workload.
    IncludeReservations,
}

impl AutomationSetting {
    pub const ALL: [AutomationSetting; 8] = [
        AutomationSetting::ProvisionDs,
        AutomationSetting::ProvisionPm,
        AutomationSetting::Resize,
        AutomationSetting::SuspendDs,
        AutomationSetting::SuspendPm,
        AutomationSetting::UtilTarget,
        AutomationSetting::TargetBand,
        AutomationSetting::IncludeReservations,
    ];

    /// Setting code used by pre-XL servers.
    pub fn code(self) -> &'static str {
        match self {
            AutomationSetting::ProvisionDs => "provisionDS",
            AutomationSetting::ProvisionPm => "provisionPM",
            AutomationSetting::Resize => "resize",
            AutomationSetting::SuspendDs => "suspendDS",
            AutomationSetting::SuspendPm => "suspendPM",
            AutomationSetting::UtilTarget => "utilTarget",
            AutomationSetting::TargetBand => "targetBand",
            AutomationSetting::IncludeReservations => "includeReservation",
        }
    }

    /// Action name used by XL servers (7.21+), for the entity-action toggles.
    pub fn action_name(self) -> Option<&'static str> {
        match self {
            AutomationSetting::ProvisionDs | AutomationSetting::ProvisionPm => Some("provision"),
            AutomationSetting::SuspendDs | AutomationSetting::SuspendPm => Some("suspend"),
            AutomationSetting::Resize => Some("resize"),
            _ => None,
        }
    }

    /// Entity type the toggle applies to, if any.
    pub fn entity_type(self) -> Option<&'static str> {
        match self {
            AutomationSetting::ProvisionPm | AutomationSetting::SuspendPm => {
                Some("PhysicalMachine")
            }
            AutomationSetting::ProvisionDs | AutomationSetting::SuspendDs => Some("Storage"),
            AutomationSetting::Resize => Some("VirtualMachine"),
            _ => None,
        }
    }

    /// Desired-state settings take a number; every other setting is a flag.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            AutomationSetting::UtilTarget | AutomationSetting::TargetBand
        )
    }
}

impl fmt::Display for AutomationSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Change applied to an entity in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityAction {
    Add,
    Migrate,
    Remove,
    Replace,
}

impl EntityAction {
    pub const ALL: [EntityAction; 4] = [
        EntityAction::Add,
        EntityAction::Migrate,
        EntityAction::Remove,
        EntityAction::Replace,
    ];

    /// Replace needs a template, migrate needs a destination.
    pub fn requires_destination(self) -> bool {
        matches!(self, EntityAction::Replace | EntityAction::Migrate)
    }

    /// Actions for which a zero count is meaningless.
    pub fn requires_count(self) -> bool {
        matches!(self, EntityAction::Add | EntityAction::Replace)
    }
}

impl fmt::Display for EntityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityAction::Add => "add",
            EntityAction::Migrate => "migrate",
            EntityAction::Remove => "remove",
            EntityAction::Replace => "replace",
        };
        f.write_str(s)
    }
}

/// Plan scenario type. Selects the wizard-equivalent validation on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanType {
    /// Increase workload.
    AddWorkload,
    /// Move workload from a hot cluster to a cold cluster.
    AlleviatePressure,
    CloudMigration,
    #[default]
    Custom,
    DecommissionHost,
    OptimizeCloud,
    OptimizeOnprem,
    /// Future workload change.
    Projection,
    ReconfigureHardware,
    WorkloadMigration,
}

impl PlanType {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanType::AddWorkload => "ADD_WORKLOAD",
            PlanType::AlleviatePressure => "ALLEVIATE_PRESSURE",
            PlanType::CloudMigration => "CLOUD_MIGRATION",
            PlanType::Custom => "CUSTOM",
            PlanType::DecommissionHost => "DECOMMISSION_HOST",
            PlanType::OptimizeCloud => "OPTIMIZE_CLOUD",
            PlanType::OptimizeOnprem => "OPTIMIZE_ONPREM",
            PlanType::Projection => "PROJECTION",
            PlanType::ReconfigureHardware => "RECONFIGURE_HARDWARE",
            PlanType::WorkloadMigration => "WORKLOAD_MIGRATION",
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a remote market as reported by the server.
///
/// Unrecognized strings are kept verbatim in `Unknown` and treated as
/// non-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MarketState {
    /// Plan scope is being copied.
    Copying,
    Created,
    Deleting,
    ReadyToStart,
    Running,
    Stopped,
    Succeeded,
    /// Stopped manually by a user.
    UserStopped,
    Failed,
    Unknown(String),
}

impl MarketState {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "COPYING" => MarketState::Copying,
            "CREATED" => MarketState::Created,
            "DELETING" => MarketState::Deleting,
            "READY_TO_START" => MarketState::ReadyToStart,
            "RUNNING" => MarketState::Running,
            "STOPPED" => MarketState::Stopped,
            "SUCCEEDED" => MarketState::Succeeded,
            "USER_STOPPED" => MarketState::UserStopped,
            "FAILED" => MarketState::Failed,
            _ => MarketState::Unknown(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MarketState::Copying => "COPYING",
            MarketState::Created => "CREATED",
            MarketState::Deleting => "DELETING",
            MarketState::ReadyToStart => "READY_TO_START",
            MarketState::Running => "RUNNING",
            MarketState::Stopped => "STOPPED",
            MarketState::Succeeded => "SUCCEEDED",
            MarketState::UserStopped => "USER_STOPPED",
            MarketState::Failed => "FAILED",
            MarketState::Unknown(s) => s,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MarketState::Succeeded)
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            MarketState::Stopped | MarketState::UserStopped | MarketState::Failed
        )
    }

    pub fn is_terminal(&self) -> bool {
        self.is_success() || self.is_failure()
    }
}

impl From<String> for MarketState {
    fn from(s: String) -> Self {
        MarketState::parse(&s)
    }
}

impl From<MarketState> for String {
    fn from(state: MarketState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for MarketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operating systems known to the cloud migration profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloudOs {
    Linux,
    Rhel,
    #[serde(alias = "SUSE")]
    Sles,
    Windows,
}

impl CloudOs {
    pub const ALL: [CloudOs; 4] = [CloudOs::Linux, CloudOs::Rhel, CloudOs::Sles, CloudOs::Windows];

    pub fn as_str(self) -> &'static str {
        match self {
            CloudOs::Linux => "LINUX",
            CloudOs::Rhel => "RHEL",
            CloudOs::Sles => "SLES",
            CloudOs::Windows => "WINDOWS",
        }
    }

    /// Profile key selecting the target OS for migrated workloads of this OS.
    pub fn target_os_key(self) -> &'static str {
        match self {
            CloudOs::Linux => "linuxTargetOs",
            CloudOs::Rhel => "rhelTargetOs",
            CloudOs::Sles => "slesTargetOs",
            CloudOs::Windows => "windowsTargetOs",
        }
    }

    /// Profile key for bring-your-own-license of this OS.
    pub fn license_key(self) -> &'static str {
        match self {
            CloudOs::Linux => "linuxByol",
            CloudOs::Rhel => "rhelByol",
            CloudOs::Sles => "slesByol",
            CloudOs::Windows => "windowsByol",
        }
    }
}

/// Commodities whose placement constraints can be lifted in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintCommodity {
    Cluster,
    Network,
    StorageCluster,
    Datacenter,
}

impl ConstraintCommodity {
    pub fn as_str(self) -> &'static str {
        match self {
            ConstraintCommodity::Cluster => "ClusterCommodity",
            ConstraintCommodity::Network => "NetworkCommodity",
            ConstraintCommodity::StorageCluster => "StorageClusterCommodity",
            ConstraintCommodity::Datacenter => "DataCenterCommodity",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_state_parses_known_names() {
        assert_eq!(MarketState::parse("SUCCEEDED"), MarketState::Succeeded);
        assert_eq!(MarketState::parse("ready_to_start"), MarketState::ReadyToStart);
        assert_eq!(MarketState::parse("USER_STOPPED"), MarketState::UserStopped);
    }

    #[test]
    fn unknown_market_state_is_not_terminal() {
        let state = MarketState::parse("INITIAL_PLACEMENT");
        assert_eq!(state, MarketState::Unknown("INITIAL_PLACEMENT".into()));
        assert!(!state.is_terminal());
        assert_eq!(state.as_str(), "INITIAL_PLACEMENT");
    }

    #[test]
    fn terminal_classification() {
        assert!(MarketState::Succeeded.is_success());
        for s in [MarketState::Stopped, MarketState::UserStopped, MarketState::Failed] {
            assert!(s.is_failure(), "{s} should be a failure");
        }
        for s in [
            MarketState::Copying,
            MarketState::Created,
            MarketState::Deleting,
            MarketState::ReadyToStart,
            MarketState::Running,
        ] {
            assert!(!s.is_terminal(), "{s} should not be terminal");
        }
    }

    #[test]
    fn market_state_serde_uses_wire_names() {
        let json = serde_json::to_string(&MarketState::ReadyToStart).unwrap();
        assert_eq!(json, "\"READY_TO_START\"");
        let back: MarketState = serde_json::from_str("\"RUNNING\"").unwrap();
        assert_eq!(back, MarketState::Running);
    }

    #[test]
    fn destination_and_count_requirements() {
        assert!(EntityAction::Replace.requires_destination());
        assert!(EntityAction::Migrate.requires_destination());
        assert!(!EntityAction::Add.requires_destination());
        assert!(!EntityAction::Remove.requires_destination());
        assert!(EntityAction::Add.requires_count());
        assert!(EntityAction::Replace.requires_count());
        assert!(!EntityAction::Remove.requires_count());
    }

    #[test]
    fn xl_action_names() {
        assert_eq!(AutomationSetting::ProvisionPm.action_name(), Some("provision"));
        assert_eq!(AutomationSetting::SuspendDs.action_name(), Some("suspend"));
        assert_eq!(AutomationSetting::UtilTarget.action_name(), None);
        assert!(AutomationSetting::TargetBand.is_numeric());
        assert!(!AutomationSetting::Resize.is_numeric());
    }

    #[test]
    fn plan_type_wire_value() {
        let json = serde_json::to_string(&PlanType::DecommissionHost).unwrap();
        assert_eq!(json, "\"DECOMMISSION_HOST\"");
        assert_eq!(PlanType::default(), PlanType::Custom);
    }
}
