//! Results export: JSON report and flattened statistics CSV.
//!
//! A [`PlanReport`] captures what is known about a finished plan plus its
//! statistics. Persisted reports carry a `schema_version`; newer versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use vmtplan_core::api::{StatSnapshot, StatValues};

use crate::plan::{Plan, PlanState};

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Summary of one plan run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub scenario_name: String,
    pub scenario_id: Option<String>,
    pub market_id: Option<String>,
    pub market_name: Option<String>,
    pub state: String,
    pub remote_state: Option<String>,
    pub duration_secs: Option<f64>,
    pub server_duration_secs: Option<f64>,
    pub unplaced_entities: Option<bool>,
    #[serde(default)]
    pub stats: Vec<StatSnapshot>,
}

impl PlanReport {
    /// Snapshot a plan. Statistics are attached separately since only a
    /// succeeded plan has them.
    pub fn from_plan(plan: &Plan<'_>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            scenario_name: plan.scenario().name().to_string(),
            scenario_id: plan.scenario_id().map(|s| s.to_string()),
            market_id: plan.market_id().map(|m| m.to_string()),
            market_name: plan.market_name().map(str::to_string),
            state: plan.state().to_string(),
            remote_state: plan.remote_state().map(|s| s.to_string()),
            duration_secs: plan.duration().map(|d| d.as_secs_f64()),
            server_duration_secs: plan.server_duration().map(|d| d.as_secs_f64()),
            unplaced_entities: plan.unplaced_entities(),
            stats: Vec::new(),
        }
    }

    pub fn with_stats(mut self, stats: Vec<StatSnapshot>) -> Self {
        self.stats = stats;
        self
    }

    pub fn succeeded(&self) -> bool {
        self.state == PlanState::Succeeded.as_str()
    }
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &PlanReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize PlanReport to JSON")
}

/// Deserialize a report, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<PlanReport> {
    let report: PlanReport =
        serde_json::from_str(json).context("failed to deserialize PlanReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x}")).unwrap_or_default()
}

fn agg(v: Option<&StatValues>, pick: fn(&StatValues) -> Option<f64>) -> String {
    opt(v.and_then(pick))
}

/// One row per statistic per period.
///
/// Columns: epoch, date, name, value, units, min, max, avg, total,
/// capacity_total, related_entity_type
pub fn export_stats_csv(stats: &[StatSnapshot]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "epoch",
        "date",
        "name",
        "value",
        "units",
        "min",
        "max",
        "avg",
        "total",
        "capacity_total",
        "related_entity_type",
    ])?;

    for snapshot in stats {
        let epoch = snapshot.epoch.as_deref().unwrap_or("");
        let date = snapshot.date.as_deref().unwrap_or("");
        for s in &snapshot.statistics {
            let values = s.values.as_ref();
            let value = opt(s.value);
            let min = agg(values, |v| v.min);
            let max = agg(values, |v| v.max);
            let avg = agg(values, |v| v.avg);
            let total = agg(values, |v| v.total);
            let capacity = agg(s.capacity.as_ref(), |v| v.total);
            wtr.write_record([
                epoch,
                date,
                s.name.as_str(),
                value.as_str(),
                s.units.as_deref().unwrap_or(""),
                min.as_str(),
                max.as_str(),
                avg.as_str(),
                total.as_str(),
                capacity.as_str(),
                s.related_entity_type.as_deref().unwrap_or(""),
            ])?;
        }
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Result bundle ──────────────────────────────────────────────────

/// Write `report.json` and `stats.csv` under `{output_dir}/{market}_{timestamp}/`.
///
/// Returns the path to the created directory.
pub fn save_results(report: &PlanReport, output_dir: &Path) -> Result<PathBuf> {
    let label = report
        .market_name
        .as_deref()
        .or(report.market_id.as_deref())
        .unwrap_or(&report.scenario_name);
    let dirname = format!(
        "{}_{}",
        sanitize(label),
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create results dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(report)?)?;
    std::fs::write(run_dir.join("stats.csv"), export_stats_csv(&report.stats)?)?;

    Ok(run_dir)
}

/// Load a report from a results directory.
pub fn load_results(dir: &Path) -> Result<PlanReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmtplan_core::api::StatRecord;

    fn sample_stats() -> Vec<StatSnapshot> {
        vec![StatSnapshot {
            date: Some("2024-01-31T00:00:00Z".into()),
            epoch: Some("PLAN".into()),
            display_name: None,
            statistics: vec![
                StatRecord {
                    name: "numHosts".into(),
                    value: Some(12.0),
                    units: None,
                    values: Some(StatValues {
                        min: Some(12.0),
                        max: Some(12.0),
                        avg: Some(12.0),
                        total: Some(12.0),
                    }),
                    capacity: None,
                    related_entity_type: Some("PhysicalMachine".into()),
                },
                StatRecord {
                    name: "CPU".into(),
                    value: None,
                    units: Some("MHz".into()),
                    values: None,
                    capacity: Some(StatValues {
                        total: Some(96000.0),
                        ..StatValues::default()
                    }),
                    related_entity_type: None,
                },
            ],
        }]
    }

    fn sample_report() -> PlanReport {
        PlanReport {
            schema_version: SCHEMA_VERSION,
            scenario_name: "CUSTOM_20240131_101500".into(),
            scenario_id: Some("s-1".into()),
            market_id: Some("m-1".into()),
            market_name: Some("CUSTOM_admin_1706695200".into()),
            state: "SUCCEEDED".into(),
            remote_state: Some("SUCCEEDED".into()),
            duration_secs: Some(342.0),
            server_duration_secs: Some(330.0),
            unplaced_entities: Some(false),
            stats: sample_stats(),
        }
    }

    #[test]
    fn csv_has_one_row_per_statistic() {
        let csv = export_stats_csv(&sample_stats()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("epoch,date,name,value"));
        assert_eq!(
            lines[1],
            "PLAN,2024-01-31T00:00:00Z,numHosts,12,,12,12,12,12,,PhysicalMachine"
        );
        assert_eq!(lines[2], "PLAN,2024-01-31T00:00:00Z,CPU,,MHz,,,,,96000,");
    }

    #[test]
    fn json_report_reloads() {
        let report = sample_report();
        let back = import_json(&export_json(&report).unwrap()).unwrap();
        assert_eq!(back, report);
        assert!(back.succeeded());
    }

    #[test]
    fn newer_schema_is_rejected() {
        let mut report = sample_report();
        report.schema_version = SCHEMA_VERSION + 1;
        let json = export_json(&report).unwrap();
        assert!(import_json(&json).is_err());
    }

    #[test]
    fn save_and_load_results() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample_report();
        let run_dir = save_results(&report, dir.path()).unwrap();
        assert!(run_dir.join("stats.csv").exists());
        assert!(run_dir
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("CUSTOM_admin_1706695200_"));
        assert_eq!(load_results(&run_dir).unwrap(), report);
    }

    #[test]
    fn labels_are_made_path_safe() {
        assert_eq!(sanitize("plan/a b:c"), "plan_a_b_c");
    }
}
