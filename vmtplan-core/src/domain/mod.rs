//! Domain types shared by the scenario model, the service client, and the runner.

pub mod enums;
pub mod ids;

pub use enums::{
    AutomationSetting, CloudOs, ConstraintCommodity, EntityAction, MarketState, PlanType,
};
pub use ids::{MarketId, ScenarioId};
