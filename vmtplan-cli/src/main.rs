//! vmtplan CLI: build scenarios, run plans, and manage plan markets.
//!
//! Commands:
//! - `dto` prints the scenario request body for a server version
//! - `run` submits a plan, waits for it, and saves the results
//! - `state` queries one plan market
//! - `stats` prints the statistics of a finished plan
//! - `stop` stops a running plan market
//! - `delete` removes a plan market and optionally its scenario

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use semver::Version;
use std::path::{Path, PathBuf};
use vmtplan_core::api::TurboClient;
use vmtplan_core::domain::{MarketId, ScenarioId};
use vmtplan_core::version::parse_version_info;
use vmtplan_runner::{
    export_stats_csv, save_results, Plan, PlanFile, PlanReport, PlanState, Preset,
    StdoutProgress,
};

#[derive(Parser)]
#[command(
    name = "vmtplan",
    about = "vmtplan: build and run Turbonomic what-if plans"
)]
struct Cli {
    /// Log level, overrides the plan file's [logging] level. RUST_LOG wins over both.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the scenario request body without contacting a server.
    Dto {
        /// Path to a TOML plan file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Named preset: balance.
        #[arg(long)]
        preset: Option<String>,

        /// Scope UUIDs (replace the file's scope).
        #[arg(long, num_args = 1..)]
        scope: Vec<String>,

        /// Server version to encode for, e.g. 8.2.1. Defaults to the file's pinned version.
        #[arg(long)]
        server_version: Option<String>,
    },
    /// Submit a plan, wait for it to finish, and save the results.
    Run {
        /// Path to a TOML plan file with a [connection] section.
        #[arg(long)]
        config: PathBuf,

        /// Start from a named preset (balance); the file's sections apply on top.
        #[arg(long)]
        preset: Option<String>,

        /// Scope UUIDs (replace the file's scope).
        #[arg(long, num_args = 1..)]
        scope: Vec<String>,

        /// Seconds between state queries, 0 = dynamic.
        #[arg(long)]
        interval: Option<u64>,

        /// Give up after this many minutes, 0 = wait forever.
        #[arg(long)]
        max_wait_mins: Option<u64>,

        /// Output directory for the report and statistics.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Delete the plan market and scenario once results are saved.
        #[arg(long, default_value_t = false)]
        cleanup: bool,
    },
    /// Show the state of a plan market.
    State {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        market: String,
    },
    /// Print the statistics of a finished plan as JSON, or CSV with --csv.
    Stats {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        market: String,

        #[arg(long, default_value_t = false)]
        csv: bool,
    },
    /// Stop a running plan market.
    Stop {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        market: String,
    },
    /// Delete a plan market. System markets are refused.
    Delete {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        market: String,

        /// Scenario to delete along with the market.
        #[arg(long)]
        scenario: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = cli.log_level;

    match cli.command {
        Commands::Dto {
            config,
            preset,
            scope,
            server_version,
        } => {
            let file = load_plan_file(config.as_deref(), preset, scope)?;
            init_logging(&file, log_level.as_deref());
            run_dto(&file, server_version.as_deref())
        }
        Commands::Run {
            config,
            preset,
            scope,
            interval,
            max_wait_mins,
            output_dir,
            cleanup,
        } => {
            let mut file = load_plan_file(Some(&config), preset, scope)?;
            if let Some(secs) = interval {
                file.polling.interval_secs = secs;
            }
            if let Some(mins) = max_wait_mins {
                file.polling.max_wait_mins = mins;
            }
            init_logging(&file, log_level.as_deref());
            run_plan(&file, &output_dir, cleanup)
        }
        Commands::State { config, market } => {
            let file = load_plan_file(Some(&config), None, Vec::new())?;
            init_logging(&file, log_level.as_deref());
            run_state(&file, &market)
        }
        Commands::Stats {
            config,
            market,
            csv,
        } => {
            let file = load_plan_file(Some(&config), None, Vec::new())?;
            init_logging(&file, log_level.as_deref());
            run_stats(&file, &market, csv)
        }
        Commands::Stop { config, market } => {
            let file = load_plan_file(Some(&config), None, Vec::new())?;
            init_logging(&file, log_level.as_deref());
            run_stop(&file, &market)
        }
        Commands::Delete {
            config,
            market,
            scenario,
        } => {
            let file = load_plan_file(Some(&config), None, Vec::new())?;
            init_logging(&file, log_level.as_deref());
            run_delete(&file, &market, scenario)
        }
    }
}

/// Load the plan file (or start empty) and apply command-line overrides.
fn load_plan_file(
    path: Option<&Path>,
    preset: Option<String>,
    scope: Vec<String>,
) -> Result<PlanFile> {
    let mut file = match path {
        Some(path) => PlanFile::from_file(path)?,
        None => PlanFile::default(),
    };

    if let Some(name) = preset {
        if Preset::from_name(&name).is_none() {
            let valid: Vec<&str> = Preset::ALL.iter().map(|p| p.name()).collect();
            bail!("unknown preset '{name}'. Valid: {}", valid.join(", "));
        }
        file.plan.preset = Some(name);
    }
    if !scope.is_empty() {
        file.plan.scope = scope;
    }
    if path.is_none() && file.plan.preset.is_none() {
        bail!("one of --config or --preset is required");
    }
    Ok(file)
}

fn init_logging(file: &PlanFile, level: Option<&str>) {
    let mut logging = file.logging.clone();
    if let Some(level) = level {
        logging.level = level.to_string();
    }
    logging.init();
}

fn connect(file: &PlanFile) -> Result<TurboClient> {
    let settings = file.connection_settings()?;
    let client = TurboClient::connect(&settings)
        .with_context(|| format!("failed to log in to {}", settings.host))?;
    tracing::info!(api = client.base_url(), "connected");
    Ok(client)
}

fn run_dto(file: &PlanFile, server_version: Option<&str>) -> Result<()> {
    let scenario = file.to_scenario()?;
    let version: Option<Version> = server_version
        .map(|v| parse_version_info(v).with_context(|| format!("no version number in '{v}'")))
        .transpose()?;
    if version.is_none() && scenario.version().is_none() {
        bail!("no server version: pass --server-version or pin [plan] version in the file");
    }
    println!("{}", scenario.to_json(version.as_ref())?);
    Ok(())
}

fn run_plan(file: &PlanFile, output_dir: &Path, cleanup: bool) -> Result<()> {
    let scenario = file.to_scenario()?;
    let client = connect(file)?;
    let progress = StdoutProgress;

    let mut plan = Plan::new(&client, scenario)
        .with_policy(file.poll_policy())
        .with_progress(&progress);
    if let Some(base) = &file.plan.base_market {
        plan = plan.on_market(base.clone());
    }
    if let Some(name) = &file.plan.market_name {
        plan = plan.with_market_name(name.clone());
    }

    let outcome = plan.run();
    if plan.state() == PlanState::Created {
        // nothing reached the server, so there is nothing to report
        return outcome.map(|_| ()).map_err(Into::into);
    }

    let mut report = PlanReport::from_plan(&plan);
    if plan.state() == PlanState::Succeeded {
        report = report.with_stats(plan.stats()?.to_vec());
    }
    print_summary(&report);

    let run_dir = save_results(&report, output_dir)?;
    println!("Results saved to: {}", run_dir.display());

    if cleanup && plan.state() != PlanState::TimedOut {
        plan.delete(true)?;
        println!("Plan market and scenario deleted");
    }

    outcome.map(|_| ())?;
    Ok(())
}

fn print_summary(report: &PlanReport) {
    println!();
    println!("=== Plan Result ===");
    println!("Scenario:   {}", report.scenario_name);
    if let Some(name) = &report.market_name {
        println!("Market:     {name}");
    }
    if let Some(id) = &report.market_id {
        println!("Market ID:  {id}");
    }
    println!(
        "State:      {} (server: {})",
        report.state,
        report.remote_state.as_deref().unwrap_or("-")
    );
    if let Some(secs) = report.duration_secs {
        println!("Waited:     {secs:.0}s");
    }
    if let Some(secs) = report.server_duration_secs {
        println!("Run time:   {secs:.0}s");
    }
    if let Some(unplaced) = report.unplaced_entities {
        println!("Unplaced:   {}", if unplaced { "yes" } else { "no" });
    }
    let records: usize = report.stats.iter().map(|s| s.statistics.len()).sum();
    println!("Statistics: {records} records in {} snapshots", report.stats.len());
}

fn run_state(file: &PlanFile, market: &str) -> Result<()> {
    let client = connect(file)?;
    let mut plan = Plan::attach(&client, MarketId::new(market), None);
    let state = plan.poll()?;
    println!(
        "{market}: {state} (server: {})",
        plan.remote_state().map(|s| s.to_string()).unwrap_or_default()
    );
    if let Some(duration) = plan.server_duration() {
        println!("Run time: {}s", duration.as_secs());
    }
    Ok(())
}

fn run_stats(file: &PlanFile, market: &str, csv: bool) -> Result<()> {
    let client = connect(file)?;
    let mut plan = Plan::attach(&client, MarketId::new(market), None);
    plan.poll()?;
    let stats = plan.stats()?;
    if csv {
        print!("{}", export_stats_csv(stats)?);
    } else {
        println!("{}", serde_json::to_string_pretty(stats)?);
    }
    Ok(())
}

fn run_stop(file: &PlanFile, market: &str) -> Result<()> {
    let client = connect(file)?;
    let mut plan = Plan::attach(&client, MarketId::new(market), None).with_policy(file.poll_policy());
    let state = plan.stop()?;
    println!(
        "{market}: {state} (server: {})",
        plan.remote_state().map(|s| s.to_string()).unwrap_or_default()
    );
    Ok(())
}

fn run_delete(file: &PlanFile, market: &str, scenario: Option<String>) -> Result<()> {
    let client = connect(file)?;
    let include_scenario = scenario.is_some();
    let mut plan = Plan::attach(&client, MarketId::new(market), scenario.map(ScenarioId::new));
    plan.delete(include_scenario)?;
    if include_scenario {
        println!("Deleted market {market} and its scenario");
    } else {
        println!("Deleted market {market}");
    }
    Ok(())
}
