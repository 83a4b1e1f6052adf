//! Named scenario presets.

use std::fmt;

use vmtplan_core::domain::{AutomationSetting, PlanType};
use vmtplan_core::scenario::Scenario;

/// Ready-made scenarios for common plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// On-prem optimization with provisioning, suspension, and resize all
    /// disabled. The result shows how the current workload balances on the
    /// current hardware, which is what headroom reports are built from.
    Balance,
}

impl Preset {
    pub const ALL: [Preset; 1] = [Preset::Balance];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Balance => "balance",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    /// Build the preset scenario over `scope`.
    pub fn scenario<I, S>(self, scope: I) -> Scenario
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self {
            Preset::Balance => {
                let mut scenario = Scenario::with_scope(None, PlanType::OptimizeOnprem, scope);
                for setting in [
                    AutomationSetting::ProvisionDs,
                    AutomationSetting::SuspendDs,
                    AutomationSetting::ProvisionPm,
                    AutomationSetting::SuspendPm,
                    AutomationSetting::Resize,
                ] {
                    // boolean settings always accept a flag
                    if let Err(e) = scenario.change_automation_setting(setting, false) {
                        tracing::warn!(%setting, error = %e, "preset setting rejected");
                    }
                }
                scenario
            }
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
