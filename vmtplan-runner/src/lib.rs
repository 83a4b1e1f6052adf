//! vmtplan runner: drives scenarios through the remote plan lifecycle.
//!
//! This crate builds on `vmtplan-core` to provide:
//! - The plan controller (`start`, `poll`, `wait`, `run`, `stop`, `delete`)
//! - Polling policy and the clock it waits on
//! - Progress observers
//! - TOML plan files and named presets
//! - Result export to JSON and CSV
//! - Logging setup

pub mod config;
pub mod export;
pub mod logging;
pub mod plan;
pub mod poll;
pub mod presets;
pub mod progress;

pub use config::{ConfigError, PlanFile};
pub use export::{export_json, export_stats_csv, load_results, save_results, PlanReport};
pub use logging::{LogFormat, LoggingConfig};
pub use plan::{Plan, PlanError, PlanState};
pub use poll::{Clock, ManualClock, PollInterval, PollPolicy, SystemClock};
pub use presets::Preset;
pub use progress::{PlanProgress, StdoutProgress, TracingProgress};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn plan_types_are_send_sync() {
        assert_send::<PlanState>();
        assert_sync::<PlanState>();
        assert_send::<PlanError>();
        assert_sync::<PlanError>();
        assert_send::<Plan<'static>>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<PlanFile>();
        assert_sync::<PlanFile>();
        assert_send::<PollPolicy>();
        assert_sync::<PollPolicy>();
        assert_send::<LoggingConfig>();
        assert_sync::<LoggingConfig>();
    }

    #[test]
    fn report_is_send_sync() {
        assert_send::<PlanReport>();
        assert_sync::<PlanReport>();
    }

    #[test]
    fn clocks_are_send_sync() {
        assert_send::<ManualClock>();
        assert_sync::<ManualClock>();
        assert_send::<SystemClock>();
        assert_sync::<SystemClock>();
    }
}
