use thiserror::Error;

use crate::domain::{AutomationSetting, EntityAction};

/// Configuration errors raised while building or mapping a scenario.
///
/// All of these surface before any network call is made.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScenarioError {
    #[error("{action} requires a destination or template id (new_target)")]
    MissingDestination { action: EntityAction },

    #[error("{action} requires a positive count")]
    ZeroCount { action: EntityAction },

    #[error("{action} change has no targets")]
    NoTargets { action: EntityAction },

    #[error("projection list must not be empty")]
    EmptyProjection,

    #[error("setting '{setting}' expects a {expected} value")]
    SettingValueType {
        setting: AutomationSetting,
        expected: &'static str,
    },

    #[error("utilization must be between 0 and 100, got {0}")]
    UtilizationOutOfRange(u32),

    #[error("invalid baseline timestamp: {0}")]
    InvalidTimestamp(i64),

    #[error("relieve pressure needs at least one source and one destination")]
    EmptyPressureGroups,

    #[error("no scenario mapping for server version {0} (6.1.0 or later required)")]
    UnsupportedVersion(String),

    #[error("scenario has no server version; pin one or submit through a plan")]
    MissingVersion,

    #[error("failed to serialize scenario request: {0}")]
    Serialize(String),
}
