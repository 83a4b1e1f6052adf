//! Remote plan service: the trait the runner drives and its HTTP implementation.

pub mod client;
pub mod service;

pub use client::{ConnectionSettings, TurboClient};
pub use service::{
    EntityInfo, MarketInfo, PlanService, ScenarioInfo, ServiceError, StatRecord, StatSnapshot,
    StatValues,
};
