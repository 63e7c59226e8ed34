use anyhow::{Context, Result};
use cirun::{
    action::ActionRegistry,
    cli::{
        commands::{HistoryCommand, ListCommand, RunCommand, ValidateCommand},
        output::*,
        Cli, Command,
    },
    core::{
        config::{timeout_from_minutes, PipelineConfig},
        TriggerEvent,
    },
    execution::{Dispatch, ExecutionEngine},
    persistence::{create_summary, ExecutionStatus, InMemoryPersistence, PersistenceBackend, RunSummary},
    report::{LiveReporter, Reporter},
    runner::{LocalProvisioner, ProvisionerConfig},
};
#[cfg(feature = "sqlite")]
use cirun::persistence::SqliteExecutionStore;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Logs go to stderr next to the progress display; stdout carries results
    let default_filter = if cli.verbose { "cirun=debug" } else { "cirun=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let exit_code = match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipelines(cmd)?,
        Command::List(cmd) => list_pipelines(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

async fn open_store() -> Result<Arc<dyn PersistenceBackend>> {
    #[cfg(feature = "sqlite")]
    {
        Ok(Arc::new(SqliteExecutionStore::with_default_path().await?))
    }
    #[cfg(not(feature = "sqlite"))]
    {
        Ok(Arc::new(InMemoryPersistence::new()))
    }
}

async fn run_pipeline(cmd: &RunCommand) -> Result<i32> {
    let definitions = cmd
        .files
        .iter()
        .map(PipelineConfig::from_file)
        .collect::<Result<Vec<_>>>()
        .context("Failed to load pipeline config")?;
    let event = TriggerEvent::new(cmd.event, &cmd.branch);

    let mut provisioner_config = ProvisionerConfig::new()
        .with_working_dir(&cmd.working_dir)
        .with_max_concurrent_runs(cmd.max_runs);
    if let Some(duration) = cmd.timeout_minutes.and_then(timeout_from_minutes) {
        provisioner_config = provisioner_config.with_max_run_duration(duration);
    }

    let mut engine = ExecutionEngine::new(
        LocalProvisioner::new(provisioner_config),
        ActionRegistry::with_builtins(),
    )
    .with_variables(cmd.variables.iter().cloned().collect());

    let live = if cmd.json {
        LiveReporter::hidden()
    } else {
        LiveReporter::new()
    };
    engine.add_event_handler(live.handler());

    let store: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        open_store().await?
    };

    // Ctrl-C tears the runner down; the running step fails as cancelled
    let mut interrupt = None;
    let dispatched = engine
        .dispatch_with(&definitions, &event, |lease| {
            let abort = lease.abort_handle();
            interrupt = Some(tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, aborting run");
                    abort.abort();
                }
            }));
        })
        .await;
    if let Some(watcher) = interrupt {
        watcher.abort();
    }

    let reporter = Reporter::new().with_max_output_lines(cmd.output_lines);
    let report = match &dispatched {
        Ok(dispatch) => {
            if let Some(result) = dispatch.result() {
                let summary = create_summary(result);
                if let Err(e) = store.save_run(&summary).await {
                    warn!("Failed to save run to history: {:#}", e);
                } else if !cmd.no_history {
                    info!("Run {} saved to history", summary.run_id);
                }
            }
            reporter.report(dispatch)
        }
        Err(e) => reporter.report_provision_error(e),
    };

    if cmd.json {
        let result = match &dispatched {
            Ok(Dispatch::Completed(result)) => serde_json::to_value(result)?,
            Ok(Dispatch::Ignored { event }) => serde_json::json!({ "ignored": event }),
            Err(e) => serde_json::json!({ "provision_error": e.to_string() }),
        };
        let data = serde_json::json!({ "exit_code": report.exit_code, "result": result });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{}", report.summary);
    }

    Ok(report.exit_code)
}

fn validate_pipelines(cmd: &ValidateCommand) -> Result<i32> {
    let registry = ActionRegistry::with_builtins();
    let mut exit_code = 0;

    for file in &cmd.files {
        println!("{}Validating {}...", INFO, style(file.display()).dim());

        match PipelineConfig::from_file(file) {
            Ok(config) => {
                println!("{}Pipeline configuration is valid!", CHECK);
                println!("  Name: {}", style(&config.name).bold());
                if let Some(push) = &config.on.push {
                    println!("  On push: {}", style(join(&push.branches)).cyan());
                }
                if let Some(pr) = &config.on.pull_request {
                    println!("  On pull_request: {}", style(join(&pr.branches)).cyan());
                }
                println!("  Steps: {}", style(config.steps.len()).cyan());
                for (index, step) in config.steps.iter().enumerate() {
                    let action = step.uses.as_deref().unwrap_or("run");
                    println!("    {}. {} {}", index + 1, step.name, style(format!("[{}]", action)).dim());
                    if !registry.contains(action) {
                        println!("       {}{}", WARN, style(format!("unknown action '{}'", action)).yellow());
                        exit_code = 1;
                    }
                }
                println!("  Variables: {}", style(config.env_as_string_map().len()).cyan());

                if cmd.json {
                    let json = serde_json::to_string_pretty(&config)?;
                    println!("\n{}", json);
                }
            }
            Err(e) => {
                println!("{}Validation failed:", CROSS);
                println!("  {}", style(format!("{:#}", e)).red());
                exit_code = 1;
            }
        }
    }

    Ok(exit_code)
}

fn join<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items.into_iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

async fn list_pipelines(cmd: &ListCommand) -> Result<i32> {
    if cmd.actions {
        let registry = ActionRegistry::with_builtins();
        if cmd.json {
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "actions": registry.names() }))?);
        } else {
            println!("{}Builtin actions:", INFO);
            for name in registry.names() {
                println!("  {}", style(name).bold());
            }
        }
        return Ok(0);
    }

    let store = open_store().await?;
    let pipelines = store.list_pipelines().await?;

    if pipelines.is_empty() {
        println!("{}No pipelines found in history", INFO);
        return Ok(0);
    }

    let mut json_data = Vec::new();
    if !cmd.json {
        println!("{}Pipelines in history:", INFO);
    }

    for pipeline_name in &pipelines {
        let runs = store.list_runs(pipeline_name).await?;
        let succeeded = runs.iter().filter(|r| r.status == ExecutionStatus::Completed).count();
        let failed = runs.iter().filter(|r| r.status == ExecutionStatus::Failed).count();

        if cmd.json {
            json_data.push(serde_json::json!({
                "name": pipeline_name,
                "run_count": runs.len(),
                "succeeded": succeeded,
                "failed": failed,
            }));
        } else if cmd.with_counts {
            println!(
                "  {} ({} runs: {} succeeded, {} failed)",
                style(pipeline_name).bold(),
                style(runs.len()).cyan(),
                style(succeeded).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(pipeline_name).bold());
        }
    }

    if cmd.json {
        let data = serde_json::json!({ "pipelines": json_data });
        println!("{}", serde_json::to_string_pretty(&data)?);
    }

    Ok(0)
}

async fn show_history(cmd: &HistoryCommand) -> Result<i32> {
    let store = open_store().await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) => print_run_details(&summary, cmd.verbose || cmd.json)?,
            None => println!("{}Run not found", WARN),
        }
        return Ok(0);
    }

    let runs = match &cmd.pipeline {
        Some(pipeline_name) => {
            let mut runs = store.list_runs(pipeline_name).await?;
            runs.truncate(cmd.limit);
            runs
        }
        None => store.recent_runs(cmd.limit).await?,
    };

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(0);
    }

    if runs.is_empty() {
        println!("{}No runs found", INFO);
        return Ok(0);
    }

    println!("{}Run history (showing latest {}):", ROCKET, cmd.limit);
    for summary in &runs {
        println!("  {}", format_run_summary(summary));
    }

    Ok(0)
}

fn print_run_details(summary: &RunSummary, verbose: bool) -> Result<()> {
    println!("{}Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    if let Some(trigger) = &summary.trigger {
        println!("  Trigger: {}", trigger);
    }
    println!("  Status: {}", format_status(summary.status));
    if let (Some(number), Some(name)) = (summary.failed_step, &summary.failed_step_name) {
        println!("  Failed step: {} ({})", number, style(name).red());
    }
    if let Some(error) = &summary.error {
        println!("  Error: {}", style(error).dim());
    }
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Progress: {} ({}/{})",
        style(format!("{:.0}%", summary.progress() * 100.0)).cyan(),
        summary.completed_steps,
        summary.total_steps
    );

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}
