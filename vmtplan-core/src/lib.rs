//! vmtplan core: scenario model, request mapping, and the remote plan service.
//!
//! This crate contains everything that does not depend on how a plan is run:
//! - Domain enums and ids (plan types, automation settings, market states)
//! - The in-memory scenario builder and its validation rules
//! - Version-dependent mapping of a scenario to the request body
//! - The `PlanService` trait and the blocking Turbonomic client

pub mod api;
pub mod domain;
pub mod scenario;
pub mod version;

pub use api::{PlanService, ServiceError};
pub use domain::{MarketId, MarketState, PlanType, ScenarioId};
pub use scenario::{Scenario, ScenarioError};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types handed to a worker thread are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<scenario::Scenario>();
        require_sync::<scenario::Scenario>();
        require_send::<scenario::ScenarioDto>();
        require_sync::<scenario::ScenarioDto>();
        require_send::<scenario::EntityChange>();
        require_sync::<scenario::EntityChange>();

        require_send::<domain::MarketId>();
        require_sync::<domain::MarketId>();
        require_send::<domain::ScenarioId>();
        require_sync::<domain::ScenarioId>();
        require_send::<domain::MarketState>();
        require_sync::<domain::MarketState>();

        require_send::<api::MarketInfo>();
        require_sync::<api::MarketInfo>();
        require_send::<api::StatSnapshot>();
        require_sync::<api::StatSnapshot>();
        require_send::<api::TurboClient>();
        require_sync::<api::TurboClient>();
    }

    /// The service trait must stay object safe; the runner holds it as `&dyn`.
    #[test]
    fn plan_service_is_object_safe() {
        fn _takes_dyn(service: &dyn api::PlanService) -> Result<String, ServiceError> {
            service.current_user()
        }
    }
}
