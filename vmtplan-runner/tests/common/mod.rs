//! Shared test fixtures: a scripted in-memory plan service and a recording observer.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use semver::Version;
use vmtplan_core::api::{
    EntityInfo, MarketInfo, PlanService, ScenarioInfo, ServiceError, StatRecord, StatSnapshot,
};
use vmtplan_core::domain::{MarketId, MarketState, PlanType, ScenarioId};
use vmtplan_core::scenario::{MarketParams, Scenario, ScenarioDto};
use vmtplan_runner::{PlanProgress, PlanState};

pub const MARKET_ID: &str = "market-1";
pub const SCENARIO_ID: &str = "scenario-1";
pub const RUN_DATE: &str = "2024-01-31T10:15:00+0000";
pub const RUN_COMPLETE_DATE: &str = "2024-01-31T10:20:30+0000";

/// One scripted answer to a market state query.
#[derive(Debug, Clone)]
pub enum Step {
    State(MarketState),
    Fail(ServiceError),
}

/// Plan service that answers market queries from a script.
///
/// Once the script runs out, the last state is repeated. After `stop_market`
/// every query answers `USER_STOPPED`.
pub struct FakeService {
    version: Version,
    user: String,
    script: Mutex<VecDeque<Step>>,
    last: Mutex<MarketState>,
    stopped: Mutex<bool>,
    fail_scenario: Option<ServiceError>,
    calls: Mutex<Vec<&'static str>>,
    submitted: Mutex<Vec<ScenarioDto>>,
    market_requests: Mutex<Vec<(String, String, MarketParams)>>,
}

impl FakeService {
    pub fn new() -> Self {
        Self {
            version: Version::new(8, 2, 0),
            user: "administrator".into(),
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(MarketState::Running),
            stopped: Mutex::new(false),
            fail_scenario: None,
            calls: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            market_requests: Mutex::new(Vec::new()),
        }
    }

    /// Script market states by their API names.
    pub fn with_states(self, states: &[&str]) -> Self {
        let steps = states
            .iter()
            .map(|s| Step::State(MarketState::parse(s)))
            .collect();
        self.with_steps(steps)
    }

    pub fn with_steps(self, steps: Vec<Step>) -> Self {
        *self.script.lock().unwrap() = steps.into();
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn failing_scenario_creation(mut self, error: ServiceError) -> Self {
        self.fail_scenario = Some(error);
        self
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    /// Number of calls to one operation.
    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn market_queries(&self) -> usize {
        self.count("market")
    }

    pub fn submitted(&self) -> Vec<ScenarioDto> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn market_requests(&self) -> Vec<(String, String, MarketParams)> {
        self.market_requests.lock().unwrap().clone()
    }

    fn next_state(&self) -> Result<MarketState, ServiceError> {
        if *self.stopped.lock().unwrap() {
            return Ok(MarketState::UserStopped);
        }
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::State(state)) => {
                *self.last.lock().unwrap() = state.clone();
                Ok(state)
            }
            Some(Step::Fail(err)) => Err(err),
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }
}

impl PlanService for FakeService {
    fn server_version(&self) -> Result<Version, ServiceError> {
        self.record("server_version");
        Ok(self.version.clone())
    }

    fn current_user(&self) -> Result<String, ServiceError> {
        self.record("current_user");
        Ok(self.user.clone())
    }

    fn entity(&self, uuid: &str) -> Result<EntityInfo, ServiceError> {
        self.record("entity");
        Ok(EntityInfo {
            uuid: uuid.to_string(),
            display_name: format!("name-{uuid}"),
            class_name: "Cluster".into(),
        })
    }

    fn create_scenario(&self, dto: &ScenarioDto) -> Result<ScenarioInfo, ServiceError> {
        self.record("create_scenario");
        if let Some(err) = &self.fail_scenario {
            return Err(err.clone());
        }
        self.submitted.lock().unwrap().push(dto.clone());
        Ok(ScenarioInfo {
            uuid: SCENARIO_ID.into(),
            display_name: dto.display_name.clone(),
        })
    }

    fn create_plan_market(
        &self,
        base_market: &str,
        _scenario: &ScenarioId,
        market_name: &str,
        params: &MarketParams,
    ) -> Result<MarketInfo, ServiceError> {
        self.record("create_plan_market");
        self.market_requests.lock().unwrap().push((
            base_market.to_string(),
            market_name.to_string(),
            params.clone(),
        ));
        Ok(MarketInfo {
            uuid: MARKET_ID.into(),
            display_name: market_name.to_string(),
            state: MarketState::ReadyToStart,
            unplaced_entities: false,
            run_date: None,
            run_complete_date: None,
        })
    }

    fn market(&self, market: &MarketId) -> Result<MarketInfo, ServiceError> {
        self.record("market");
        let state = self.next_state()?;
        let done = state.is_terminal();
        Ok(MarketInfo {
            uuid: market.to_string(),
            display_name: "CUSTOM_administrator_1706695200".into(),
            state,
            unplaced_entities: done,
            run_date: Some(RUN_DATE.into()),
            run_complete_date: done.then(|| RUN_COMPLETE_DATE.into()),
        })
    }

    fn market_stats(&self, _market: &MarketId) -> Result<Vec<StatSnapshot>, ServiceError> {
        self.record("market_stats");
        Ok(vec![StatSnapshot {
            date: Some("2024-01-31T00:00:00Z".into()),
            epoch: Some("PLAN".into()),
            display_name: None,
            statistics: vec![StatRecord {
                name: "numHosts".into(),
                value: Some(12.0),
                units: None,
                values: None,
                capacity: None,
                related_entity_type: None,
            }],
        }])
    }

    fn stop_market(&self, _market: &MarketId) -> Result<(), ServiceError> {
        self.record("stop_market");
        *self.stopped.lock().unwrap() = true;
        Ok(())
    }

    fn delete_market(&self, _market: &MarketId) -> Result<(), ServiceError> {
        self.record("delete_market");
        Ok(())
    }

    fn delete_scenario(&self, _scenario: &ScenarioId) -> Result<(), ServiceError> {
        self.record("delete_scenario");
        Ok(())
    }
}

/// Observer that records every callback as a short string.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl PlanProgress for RecordingProgress {
    fn before_run(&self, scenario: &Scenario) {
        self.events.lock().unwrap().push(format!("before {}", scenario.name()));
    }

    fn on_submitted(&self, _scenario: &ScenarioId, market: &MarketId, _market_name: &str) {
        self.events.lock().unwrap().push(format!("submitted {market}"));
    }

    fn on_poll(&self, _market: &MarketId, state: &MarketState, _elapsed: Duration) {
        self.events.lock().unwrap().push(format!("poll {state}"));
    }

    fn on_finished(&self, _market: &MarketId, state: PlanState, _elapsed: Duration) {
        self.events.lock().unwrap().push(format!("finished {state}"));
    }

    fn after_run(&self, market: Option<&MarketId>, state: PlanState) {
        let market = market.map(|m| m.to_string()).unwrap_or_else(|| "-".into());
        self.events.lock().unwrap().push(format!("after {market} {state}"));
    }
}

/// A small add-workload scenario with a one-cluster scope.
pub fn scenario() -> Scenario {
    let mut s = Scenario::with_scope(Some("test plan".into()), PlanType::AddWorkload, ["cluster-1"]);
    s.change_entity(
        vmtplan_core::domain::EntityAction::Add,
        ["vm-template-1"],
        &[0],
        Some(3),
        None,
    )
    .unwrap();
    s
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}
