//! cgm-cohort: seed synthetic CGM patients for the TIDE dashboard and check
//! the counts it shows.
//!
//! Usage:
//!   cgm-cohort --scenario scenario4 plan
//!   cgm-cohort --scenario scenario1 --scale-down seed
//!   cgm-cohort --scenario scenario1 verify --observed counts.json
//!   cgm-cohort --scenario scenario1 cleanup

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;

use cgm_cohort::cohort::{
    CategorizationVerifier, EvaluationContext, Scenario, SettlePolicy, StaticDashboard,
};
use cgm_cohort::commands::{self, seed, verify, RunOptions};
use cgm_cohort::config::{self, ScenarioConfig};
use cgm_cohort::models::AggregationAnchor;
use cgm_cohort::tidepool::{InMemoryPatientStore, PatientStore, TidepoolClient};

/// Synthetic CGM cohorts for dashboard categorization tests
#[derive(Parser, Debug)]
#[command(name = "cgm-cohort", version)]
#[command(about = "Generate CGM patient cohorts and verify TIDE dashboard bucket counts")]
struct Cli {
    /// Scenario: offset, scenario1, scenario3, scenario4
    #[arg(long, global = true, default_value = "scenario1")]
    scenario: Scenario,

    /// Scale every count by 0.1, rounding half up
    #[arg(long, global = true, env = "SCALE_DOWN_DATASET", value_parser = parse_flag, default_value = "false")]
    scale_down: bool,

    /// Minutes between seeding and dashboard evaluation
    #[arg(long, global = true, default_value_t = 0)]
    elapsed_minutes: u32,

    /// Where aggregation windows end: last_upload or now
    #[arg(long, global = true, default_value = "last_upload")]
    anchor: AggregationAnchor,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate offline and print the expectation matrix
    Plan {
        /// Write the JSON report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete the tag's patients, then create the scenario
    Seed {
        /// Use an in-memory store instead of Tidepool
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete every patient under the scenario's tag
    Cleanup {
        #[arg(long)]
        dry_run: bool,
    },

    /// Check recorded dashboard counts against the expectations
    Verify {
        /// JSON array of {recency, period, counts} observations
        #[arg(long)]
        observed: PathBuf,

        /// Only check this period (id, label or "Summarizing ... of data" banner)
        #[arg(long)]
        period: Option<String>,

        /// Wait before sampling, in milliseconds. Defaults to
        /// WAIT_SUMMARY_CALCULATION_FINISH when the environment is complete, else 0
        #[arg(long)]
        settle_ms: Option<u64>,
    },
}

fn parse_flag(raw: &str) -> Result<bool, String> {
    Ok(raw.trim().eq_ignore_ascii_case("true"))
}

fn print_json<T: Serialize>(value: &T, output: Option<&PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    match output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

fn store(dry_run: bool) -> Result<Box<dyn PatientStore>> {
    if dry_run {
        return Ok(Box::new(InMemoryPatientStore::new()));
    }
    let client = TidepoolClient::new(config::DEFAULT_HTTP_TIMEOUT_SECS)
        .context("Failed to create HTTP client")?;
    Ok(Box::new(client))
}

fn scenario_config(options: &RunOptions, dry_run: bool) -> Result<ScenarioConfig> {
    let scenario = options.scenario;
    match ScenarioConfig::from_env(scenario.tag_key()) {
        Ok(config) => Ok(config),
        Err(e) if dry_run => {
            tracing::info!(error = %e, "No Tidepool environment, dry run uses the planning tag");
            Ok(commands::dry_run_config(options.scale_down))
        }
        Err(e) => Err(e).with_context(|| format!("Incomplete environment for {scenario}")),
    }
}

fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    cgm_cohort::init_tracing();

    let cli = Cli::parse();
    let options = RunOptions {
        scenario: cli.scenario,
        scale_down: cli.scale_down,
        ctx: EvaluationContext {
            elapsed_minutes: cli.elapsed_minutes,
            anchor: cli.anchor,
        },
    };

    match cli.command {
        Commands::Plan { output } => {
            let report = commands::plan(&options, Utc::now())?;
            print_json(&report, output.as_ref())?;
        }
        Commands::Seed { dry_run } => {
            let config = scenario_config(&options, dry_run)?;
            let store = store(dry_run)?;
            let outcome = seed::seed(store.as_ref(), &config, &options, Utc::now())?;
            print_json(&outcome, None)?;
        }
        Commands::Cleanup { dry_run } => {
            let config = scenario_config(&options, dry_run)?;
            let store = store(dry_run)?;
            let deleted = seed::cleanup(store.as_ref(), &config)?;
            println!("Deleted {deleted} patients under tag {}", config.tag_id);
        }
        Commands::Verify {
            observed,
            period,
            settle_ms,
        } => {
            let dashboard = StaticDashboard::from_file(&observed)
                .with_context(|| format!("Failed to load observations: {}", observed.display()))?;
            let ledger = options.ledger(
                commands::PLAN_CLINIC_ID,
                commands::PLAN_TAG_ID,
                Utc::now(),
            )?;
            let matrix = ledger.expectation_matrix(&options.ctx);

            let mut checks = options.plan().checks;
            if let Some(text) = period {
                let wanted = verify::parse_period(&text)?;
                checks.retain(|(_, p)| *p == wanted);
            }

            let env_config = ScenarioConfig::from_env(options.scenario.tag_key());
            let (policy, click_wait) = match (settle_ms, env_config) {
                (Some(ms), _) => (SettlePolicy::Fixed(Duration::from_millis(ms)), Duration::ZERO),
                (None, Ok(config)) => (config.settle_policy(), config.dashboard_click_wait),
                (None, Err(_)) => (SettlePolicy::Fixed(Duration::ZERO), Duration::ZERO),
            };
            let verifier = CategorizationVerifier::new(policy);
            let results =
                verify::verify_checks(&dashboard, &verifier, &matrix, &checks, click_wait)?;
            print_json(&results, None)?;
        }
    }

    Ok(())
}
