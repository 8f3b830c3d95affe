//! steward: runs quality tasks from a YAML workspace.
//!
//! Subcommands:
//! - `run` starts the schedule coordinator until Ctrl-C
//! - `execute` runs one task manually and prints the execution
//! - `evaluate` runs the rule engine over a single JSON record
//! - `next` prints the next firing time of a schedule

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use steward_core::config::{load_dotenv, Config};
use steward_core::{calculate_next_execution, Record, ScheduleConfig, ScheduleType};
use steward_execution::{JsonLinesScanner, TableScanner, TaskExecutionService, TaskStore, Workspace};
use steward_scheduler::{InMemoryLeaseTable, ScheduleCoordinator};

// ── CLI ─────────────────────────────────────────────────────────────

/// Data quality task runner.
#[derive(Parser, Debug)]
#[command(name = "steward", version, about)]
struct Cli {
    /// YAML workspace with templates, tasks, bindings and inline tables.
    #[arg(long, env = "STEWARD_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Root of `<schema>/<table>.jsonl` files, used when the workspace has no inline tables.
    #[arg(long, env = "STEWARD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the coordinator and run scheduled tasks until Ctrl-C.
    Run,

    /// Run one task now and print the execution as JSON.
    Execute {
        task_id: String,
    },

    /// Evaluate one record against a task's bindings.
    Evaluate {
        #[arg(long)]
        task: String,

        #[arg(long, value_enum, default_value_t = Mode::Quality)]
        mode: Mode,

        /// The record as a JSON object.
        #[arg(long)]
        record: String,
    },

    /// Print the next execution time of a schedule.
    Next {
        #[arg(long = "type")]
        schedule_type: ScheduleType,

        #[arg(long)]
        cron: Option<String>,

        /// Interval in seconds.
        #[arg(long)]
        interval: Option<i64>,

        /// RFC 3339 time of a `once` schedule.
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        /// Reference time (RFC 3339), defaults to now.
        #[arg(long)]
        from: Option<DateTime<Utc>>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    Quality,
    Masking,
    Cleansing,
}

// ── Main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(path) = cli.workspace.clone() {
        config.storage.workspace = path;
    }
    if let Some(dir) = cli.data_dir.clone() {
        config.storage.data_dir = dir;
    }

    match cli.command {
        Command::Next {
            schedule_type,
            cron,
            interval,
            at,
            from,
        } => {
            let schedule = ScheduleConfig {
                schedule_type,
                cron_expression: cron,
                interval_seconds: interval,
                scheduled_time: at,
            };
            let next = calculate_next_execution(&schedule, from.unwrap_or_else(Utc::now))
                .context("failed to calculate next execution")?;
            match next {
                Some(at) => println!("{}", at.to_rfc3339()),
                None => println!("none"),
            }
            return Ok(());
        }
        Command::Run => {
            config.log_summary();
            let (coordinator, _executor) = build(&config).await?;
            coordinator.start().await?;
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for ctrl-c")?;
            info!("shutdown requested");
            coordinator.stop().await?;
        }
        Command::Execute { task_id } => {
            let (coordinator, _executor) = build(&config).await?;
            match coordinator.trigger_now(&task_id).await? {
                Some(execution) => println!("{}", serde_json::to_string_pretty(&execution)?),
                None => bail!("task '{}' was skipped (disabled or already running)", task_id),
            }
        }
        Command::Evaluate { task, mode, record } => {
            let record: Record =
                serde_json::from_str(&record).context("--record must be a JSON object")?;
            let (_coordinator, executor) = build(&config).await?;
            let bindings = executor
                .task_store()
                .enabled_bindings(&task)
                .await
                .with_context(|| format!("failed to load bindings of task '{}'", task))?;
            let templates = executor.load_templates(&bindings).await?;
            let engine = executor.engine();
            let outcome = match mode {
                Mode::Quality => engine.evaluate_quality(&record, &bindings, &templates),
                Mode::Masking => engine.evaluate_masking(&record, &bindings, &templates),
                Mode::Cleansing => engine.evaluate_cleansing(&record, &bindings, &templates),
            };
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}

/// Load the workspace into memory stores and wire the coordinator.
async fn build(config: &Config) -> anyhow::Result<(ScheduleCoordinator, Arc<TaskExecutionService>)> {
    let path = &config.storage.workspace;
    let workspace = Workspace::load(path)
        .with_context(|| format!("failed to load workspace {}", path.display()))?;
    let inline_tables = !workspace.tables.is_empty();
    let stores = workspace
        .into_stores()
        .await
        .context("workspace rejected")?;

    let scanner: Arc<dyn TableScanner> = if inline_tables {
        stores.tables.clone()
    } else {
        info!(data_dir = %config.storage.data_dir.display(), "reading tables from json lines");
        Arc::new(JsonLinesScanner::new(config.storage.data_dir.clone()))
    };

    let executor = Arc::new(TaskExecutionService::new(
        stores.tasks.clone(),
        stores.templates.clone(),
        scanner,
    ));
    let leases = InMemoryLeaseTable::new();
    let coordinator =
        ScheduleCoordinator::builder(config.scheduler.clone(), stores.tasks, executor.clone())
            .lock(Arc::new(leases.handle(config.scheduler.instance_id.clone())))
            .build();
    Ok((coordinator, executor))
}
