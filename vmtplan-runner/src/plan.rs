//! Plan lifecycle controller.
//!
//! A [`Plan`] binds a [`Scenario`] to a remote [`PlanService`] and walks it
//! through `Created -> Running -> Succeeded | Failed | TimedOut`:
//! - `start()` submits the scenario and creates the plan market
//! - `poll()` queries the market once and classifies its state
//! - `wait()` polls until a terminal state, pausing per the [`PollPolicy`]
//! - `run()` is `start()` followed by `wait()`
//!
//! Remote failures are reported, never retried. A plan that runs past its
//! maximum wait is marked timed out locally; the remote market is left as is.

use chrono::{DateTime, FixedOffset};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;

use vmtplan_core::api::{MarketInfo, PlanService, ServiceError, StatSnapshot};
use vmtplan_core::domain::{MarketId, MarketState, ScenarioId};
use vmtplan_core::scenario::{Scenario, ScenarioError};
use vmtplan_core::version::needs_scope_details;

use crate::poll::{Clock, PollPolicy, SystemClock};
use crate::progress::PlanProgress;

/// Market every plan is derived from unless told otherwise.
pub const DEFAULT_BASE_MARKET: &str = "Market";

/// Markets owned by the server. They can be planned on, never deleted.
pub const SYSTEM_MARKETS: [&str; 2] = ["Market", "Market_Default"];

/// Timestamp layout of `runDate` and `runCompleteDate`.
const SERVER_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

static SYSTEM_CLOCK: SystemClock = SystemClock;

/// Local lifecycle state of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanState {
    Created,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl PlanState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PlanState::Succeeded | PlanState::Failed | PlanState::TimedOut
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanState::Created => "CREATED",
            PlanState::Running => "RUNNING",
            PlanState::Succeeded => "SUCCEEDED",
            PlanState::Failed => "FAILED",
            PlanState::TimedOut => "TIMED_OUT",
        }
    }
}

impl fmt::Display for PlanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from the plan controller.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid scenario: {0}")]
    Config(#[from] ScenarioError),

    #[error("plan submission failed: {0}")]
    Submission(#[source] ServiceError),

    #[error("market query failed: {0}")]
    Remote(#[source] ServiceError),

    #[error("plan {market} ended in state {state}")]
    RunFailed { market: MarketId, state: MarketState },

    #[error("plan {market} still {state} after {waited:?}")]
    TimedOut {
        market: MarketId,
        state: MarketState,
        waited: Duration,
    },

    #[error("plan already started (state {0})")]
    AlreadyRunning(PlanState),

    #[error("plan has not been submitted")]
    NotSubmitted,

    #[error("no results available, plan is {0}")]
    NoResults(PlanState),

    #[error("refusing to delete system market {0}")]
    SystemMarket(String),
}

/// A scenario bound to a remote service, plus everything learned while running it.
pub struct Plan<'a> {
    service: &'a dyn PlanService,
    clock: &'a dyn Clock,
    progress: Option<&'a dyn PlanProgress>,
    scenario: Scenario,
    policy: PollPolicy,
    base_market: String,
    market_name: Option<String>,

    state: PlanState,
    remote_state: Option<MarketState>,
    scenario_id: Option<ScenarioId>,
    market_id: Option<MarketId>,
    started_at: Option<Instant>,
    deadline: Option<Instant>,
    duration: Option<Duration>,
    created_polls: u32,
    unplaced_entities: Option<bool>,
    server_started: Option<DateTime<FixedOffset>>,
    server_finished: Option<DateTime<FixedOffset>>,
    stats: Option<Vec<StatSnapshot>>,
}

impl<'a> Plan<'a> {
    /// New plan on the default base market, polled dynamically with no maximum wait.
    pub fn new(service: &'a dyn PlanService, scenario: Scenario) -> Self {
        Self {
            service,
            clock: &SYSTEM_CLOCK,
            progress: None,
            scenario,
            policy: PollPolicy::default(),
            base_market: DEFAULT_BASE_MARKET.to_string(),
            market_name: None,
            state: PlanState::Created,
            remote_state: None,
            scenario_id: None,
            market_id: None,
            started_at: None,
            deadline: None,
            duration: None,
            created_polls: 0,
            unplaced_entities: None,
            server_started: None,
            server_finished: None,
            stats: None,
        }
    }

    /// Track a market that was started elsewhere. The plan begins in
    /// `Running` and has no deadline.
    pub fn attach(
        service: &'a dyn PlanService,
        market: MarketId,
        scenario: Option<ScenarioId>,
    ) -> Self {
        let mut plan = Self::new(service, Scenario::default());
        plan.state = PlanState::Running;
        plan.started_at = Some(plan.clock.now());
        plan.market_id = Some(market);
        plan.scenario_id = scenario;
        plan
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.started_at = self.started_at.map(|_| clock.now());
        self.clock = clock;
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn PlanProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Plan on top of another market (plan-on-plan) instead of the live one.
    pub fn on_market(mut self, base_market: impl Into<String>) -> Self {
        self.base_market = base_market.into();
        self
    }

    /// Override the generated `CUSTOM_<user>_<epoch>` market name.
    pub fn with_market_name(mut self, name: impl Into<String>) -> Self {
        self.market_name = Some(name.into());
        self
    }

    // ── Accessors ─────────────────────────────────────────────────────

    pub fn state(&self) -> PlanState {
        self.state
    }

    /// Last market state seen on the server.
    pub fn remote_state(&self) -> Option<&MarketState> {
        self.remote_state.as_ref()
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn base_market(&self) -> &str {
        &self.base_market
    }

    pub fn market_id(&self) -> Option<&MarketId> {
        self.market_id.as_ref()
    }

    pub fn market_name(&self) -> Option<&str> {
        self.market_name.as_deref()
    }

    pub fn scenario_id(&self) -> Option<&ScenarioId> {
        self.scenario_id.as_ref()
    }

    /// Local wall time from submission to the terminal state.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Run time reported by the server, when it sent both dates.
    pub fn server_duration(&self) -> Option<Duration> {
        let (start, end) = (self.server_started?, self.server_finished?);
        (end - start).to_std().ok()
    }

    pub fn server_started(&self) -> Option<&DateTime<FixedOffset>> {
        self.server_started.as_ref()
    }

    pub fn server_finished(&self) -> Option<&DateTime<FixedOffset>> {
        self.server_finished.as_ref()
    }

    /// Whether the analysis left entities unplaced. Known once the plan finishes.
    pub fn unplaced_entities(&self) -> Option<bool> {
        self.unplaced_entities
    }

    /// Whether this plan's market is one of the server's own markets.
    pub fn is_system(&self) -> bool {
        let id = self.market_id.as_ref().map(MarketId::as_str);
        let name = self.market_name.as_deref();
        SYSTEM_MARKETS
            .iter()
            .any(|m| Some(*m) == id || Some(*m) == name)
    }

    // ── Lifecycle ─────────────────────────────────────────────────────

    /// Submit and block until the plan finishes.
    ///
    /// The observer's [`PlanProgress::before_run`] and
    /// [`PlanProgress::after_run`] hooks bracket the whole run, including
    /// runs that fail to submit.
    pub fn run(&mut self) -> Result<PlanState, PlanError> {
        if self.state != PlanState::Created {
            return Err(PlanError::AlreadyRunning(self.state));
        }
        if let Some(p) = self.progress {
            p.before_run(&self.scenario);
        }
        let outcome = self.start().and_then(|_| self.wait());
        if let Some(p) = self.progress {
            p.after_run(self.market_id.as_ref(), self.state);
        }
        outcome
    }

    /// Submit the scenario and create the plan market without waiting.
    pub fn start(&mut self) -> Result<MarketId, PlanError> {
        if self.state != PlanState::Created {
            return Err(PlanError::AlreadyRunning(self.state));
        }

        let version = match self.scenario.version() {
            Some(v) => v.clone(),
            None => self
                .service
                .server_version()
                .map_err(PlanError::Submission)?,
        };
        let mut dto = self.scenario.to_dto(Some(&version))?;

        if needs_scope_details(&version) {
            for entry in &mut dto.scope {
                let info = self
                    .service
                    .entity(&entry.uuid)
                    .map_err(PlanError::Submission)?;
                entry.display_name = Some(info.display_name);
                entry.class_name = Some(info.class_name);
            }
        }

        let market_name = match &self.market_name {
            Some(name) => name.clone(),
            None => {
                let user = self
                    .service
                    .current_user()
                    .map_err(PlanError::Submission)?;
                default_market_name(&user, chrono::Utc::now().timestamp())
            }
        };

        let fingerprint = dto.fingerprint()?;
        tracing::debug!(
            scenario = self.scenario.name(),
            %version,
            %fingerprint,
            "submitting scenario"
        );
        let scenario = self
            .service
            .create_scenario(&dto)
            .map_err(PlanError::Submission)?;
        let scenario_id = scenario.id();
        self.scenario_id = Some(scenario_id.clone());

        let market = self
            .service
            .create_plan_market(
                &self.base_market,
                &scenario_id,
                &market_name,
                &self.scenario.market_params(),
            )
            .map_err(|e| {
                tracing::warn!(%scenario_id, "scenario created but plan market was not");
                PlanError::Submission(e)
            })?;

        let market_id = market.id();
        let now = self.clock.now();
        self.state = PlanState::Running;
        self.started_at = Some(now);
        // a wait too long to represent has no deadline
        self.deadline = self.policy.max_wait.and_then(|w| now.checked_add(w));
        self.remote_state = Some(market.state.clone());
        self.market_id = Some(market_id.clone());
        self.market_name = Some(if market.display_name.is_empty() {
            market_name
        } else {
            market.display_name
        });

        if let Some(p) = self.progress {
            p.on_submitted(&scenario_id, &market_id, self.market_name.as_deref().unwrap_or(""));
        }
        tracing::info!(market = %market_id, "plan started");
        Ok(market_id)
    }

    /// Query the market once and update the local state.
    ///
    /// A terminal plan returns its cached state without any remote call, as
    /// does a plan that was never started.
    pub fn poll(&mut self) -> Result<PlanState, PlanError> {
        if self.state.is_terminal() || self.state == PlanState::Created {
            return Ok(self.state);
        }
        let market_id = self.market_id.clone().ok_or(PlanError::NotSubmitted)?;
        let info = self.service.market(&market_id).map_err(PlanError::Remote)?;
        Ok(self.observe(&market_id, info))
    }

    /// Poll until the plan is terminal.
    ///
    /// Returns `Ok(Succeeded)`, or the matching error for a failed or timed
    /// out plan. Sleeps never run past the deadline.
    pub fn wait(&mut self) -> Result<PlanState, PlanError> {
        loop {
            match self.poll()? {
                PlanState::Running => {}
                PlanState::Created => return Err(PlanError::NotSubmitted),
                terminal => return self.outcome(terminal),
            }

            let mut pause = self.policy.next_wait(self.elapsed());
            if let Some(deadline) = self.deadline {
                pause = pause.min(deadline.saturating_duration_since(self.clock.now()));
            }
            self.clock.sleep(pause);
        }
    }

    /// Result statistics. Only available once the plan has succeeded.
    pub fn stats(&mut self) -> Result<&[StatSnapshot], PlanError> {
        if self.state != PlanState::Succeeded {
            return Err(PlanError::NoResults(self.state));
        }
        let market_id = self.market_id.clone().ok_or(PlanError::NotSubmitted)?;
        if self.stats.is_none() {
            let stats = self
                .service
                .market_stats(&market_id)
                .map_err(PlanError::Remote)?;
            self.stats = Some(stats);
        }
        Ok(self.stats.as_deref().unwrap_or_default())
    }

    /// Ask the server to stop the market and wait for it to wind down.
    ///
    /// A plan that already succeeded or failed is left alone. A timed-out
    /// plan can still be stopped; it keeps its `TimedOut` state.
    pub fn stop(&mut self) -> Result<PlanState, PlanError> {
        if matches!(self.state, PlanState::Succeeded | PlanState::Failed) {
            return Ok(self.state);
        }
        let market_id = self.market_id.clone().ok_or(PlanError::NotSubmitted)?;
        self.service
            .stop_market(&market_id)
            .map_err(PlanError::Remote)?;
        tracing::info!(market = %market_id, "stop requested");

        let stop_deadline = self.clock.now() + self.policy.stop_timeout;
        loop {
            let info = self.service.market(&market_id).map_err(PlanError::Remote)?;
            let state = info.state.clone();
            if state.is_terminal() {
                if self.state == PlanState::TimedOut {
                    self.remote_state = Some(state);
                    self.sync_server_data(&info);
                } else {
                    self.observe(&market_id, info);
                }
                return Ok(self.state);
            }
            let remaining = stop_deadline.saturating_duration_since(self.clock.now());
            if remaining.is_zero() {
                return Err(PlanError::TimedOut {
                    market: market_id,
                    state,
                    waited: self.policy.stop_timeout,
                });
            }
            self.clock.sleep(self.policy.stop_interval.min(remaining));
        }
    }

    /// Remove the plan market, and its scenario when `include_scenario` is set.
    pub fn delete(&mut self, include_scenario: bool) -> Result<(), PlanError> {
        if self.is_system() {
            let name = self
                .market_id
                .as_ref()
                .map(|m| m.to_string())
                .or_else(|| self.market_name.clone())
                .unwrap_or_default();
            return Err(PlanError::SystemMarket(name));
        }
        let market_id = self.market_id.clone().ok_or(PlanError::NotSubmitted)?;
        self.service
            .delete_market(&market_id)
            .map_err(PlanError::Remote)?;
        if include_scenario {
            if let Some(scenario_id) = &self.scenario_id {
                self.service
                    .delete_scenario(scenario_id)
                    .map_err(PlanError::Remote)?;
            }
        }
        tracing::info!(market = %market_id, include_scenario, "plan deleted");
        self.market_id = None;
        self.stats = None;
        Ok(())
    }

    // ── Internals ─────────────────────────────────────────────────────

    fn elapsed(&self) -> Duration {
        self.started_at
            .map(|t| self.clock.now().saturating_duration_since(t))
            .unwrap_or_default()
    }

    fn observe(&mut self, market_id: &MarketId, info: MarketInfo) -> PlanState {
        let state = info.state.clone();
        let elapsed = self.elapsed();
        if let Some(p) = self.progress {
            p.on_poll(market_id, &state, elapsed);
        }

        if state == MarketState::Created {
            self.created_polls += 1;
        } else {
            self.created_polls = 0;
        }
        let stalled = state == MarketState::Created
            && self
                .policy
                .stall_polls
                .is_some_and(|limit| limit > 0 && self.created_polls >= limit);
        let expired = self
            .deadline
            .is_some_and(|deadline| self.clock.now() >= deadline);

        let next = if state.is_success() {
            PlanState::Succeeded
        } else if state.is_failure() {
            PlanState::Failed
        } else if stalled {
            tracing::warn!(market = %market_id, polls = self.created_polls, "market never left CREATED");
            PlanState::Failed
        } else if expired {
            tracing::warn!(market = %market_id, %state, "maximum wait exceeded, market left running");
            PlanState::TimedOut
        } else {
            PlanState::Running
        };

        self.remote_state = Some(state);
        if next.is_terminal() {
            self.state = next;
            self.duration = Some(elapsed);
            self.sync_server_data(&info);
            if let Some(p) = self.progress {
                p.on_finished(market_id, next, elapsed);
            }
        }
        next
    }

    fn sync_server_data(&mut self, info: &MarketInfo) {
        self.unplaced_entities = Some(info.unplaced_entities);
        self.server_started = info.run_date.as_deref().and_then(parse_server_date);
        self.server_finished = info
            .run_complete_date
            .as_deref()
            .and_then(parse_server_date);
    }

    fn outcome(&self, state: PlanState) -> Result<PlanState, PlanError> {
        let market = self.market_id.clone().ok_or(PlanError::NotSubmitted)?;
        let remote = self
            .remote_state
            .clone()
            .unwrap_or_else(|| MarketState::Unknown(String::new()));
        match state {
            PlanState::Failed => Err(PlanError::RunFailed {
                market,
                state: remote,
            }),
            PlanState::TimedOut => Err(PlanError::TimedOut {
                market,
                state: remote,
                waited: self.duration.unwrap_or_default(),
            }),
            other => Ok(other),
        }
    }
}

/// `CUSTOM_<user>_<unix seconds>`.
pub fn default_market_name(user: &str, epoch_secs: i64) -> String {
    format!("CUSTOM_{user}_{epoch_secs}")
}

fn parse_server_date(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(s, SERVER_DATE_FORMAT).ok()
}
