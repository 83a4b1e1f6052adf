//! Progress callbacks for a running plan.

use std::time::Duration;

use vmtplan_core::domain::{MarketId, MarketState, ScenarioId};
use vmtplan_core::scenario::Scenario;

use crate::plan::PlanState;

/// Observer notified as a plan moves through its lifecycle.
pub trait PlanProgress: Send + Sync {
    /// Called by [`Plan::run`](crate::Plan::run) before anything is sent.
    fn before_run(&self, _scenario: &Scenario) {}

    /// Called once the scenario is accepted and the plan market exists.
    fn on_submitted(&self, scenario: &ScenarioId, market: &MarketId, market_name: &str);

    /// Called after every successful market state query.
    fn on_poll(&self, market: &MarketId, state: &MarketState, elapsed: Duration);

    /// Called when the plan reaches a terminal state.
    fn on_finished(&self, market: &MarketId, state: PlanState, elapsed: Duration);

    /// Called by [`Plan::run`](crate::Plan::run) once it returns, whatever
    /// the outcome. `market` is `None` when submission failed.
    fn after_run(&self, _market: Option<&MarketId>, _state: PlanState) {}
}

/// Emits progress as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl PlanProgress for TracingProgress {
    fn before_run(&self, scenario: &Scenario) {
        tracing::debug!(scenario = scenario.name(), "plan run starting");
    }

    fn on_submitted(&self, scenario: &ScenarioId, market: &MarketId, market_name: &str) {
        tracing::info!(%scenario, %market, market_name, "plan submitted");
    }

    fn on_poll(&self, market: &MarketId, state: &MarketState, elapsed: Duration) {
        tracing::debug!(%market, %state, elapsed_secs = elapsed.as_secs(), "plan polled");
    }

    fn on_finished(&self, market: &MarketId, state: PlanState, elapsed: Duration) {
        tracing::info!(%market, %state, elapsed_secs = elapsed.as_secs(), "plan finished");
    }
}

/// Simple progress reporter that prints to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutProgress;

impl PlanProgress for StdoutProgress {
    fn on_submitted(&self, scenario: &ScenarioId, market: &MarketId, market_name: &str) {
        println!("Submitted {market_name} (market {market}, scenario {scenario})");
    }

    fn on_poll(&self, _market: &MarketId, state: &MarketState, elapsed: Duration) {
        println!("  [{:>5}s] {state}", elapsed.as_secs());
    }

    fn on_finished(&self, market: &MarketId, state: PlanState, elapsed: Duration) {
        println!("Plan {market} {state} after {}s", elapsed.as_secs());
    }
}
