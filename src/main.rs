use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use kaizen::collab::Collaborators;
use kaizen::config::Config;
use kaizen::daemon::RecoveryAction;
use kaizen::pipeline::Orchestrator;
use kaizen::storage::LoopOutcome;

fn setup_logging(to_stderr: bool) -> Result<()> {
    if to_stderr {
        env_logger::Builder::from_default_env()
            .target(env_logger::Target::Stderr)
            .init();
        return Ok(());
    }

    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kaizen")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("kaizen.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn open_orchestrator(config: &Config) -> Result<Orchestrator> {
    let collab = Collaborators::from_config(config).context("Failed to build collaborators")?;
    Orchestrator::new(config, collab).context("Failed to open workspace")
}

/// Open the workspace for a command that owns the loop slot
///
/// Only these commands reset a record left `running`; every other command
/// reads state as-is, since a live server may be mid-loop.
fn open_loop_owner(config: &Config) -> Result<Orchestrator> {
    let orchestrator = open_orchestrator(config)?;
    match orchestrator.recover().context("Failed to recover status record")? {
        RecoveryAction::Clean => {}
        RecoveryAction::Reset { loop_id, ordinal } => {
            println!(
                "{}",
                format!("Recovered interrupted loop {} (#{})", loop_id, ordinal).yellow()
            );
        }
    }
    Ok(orchestrator)
}

async fn run_application(cli: &Cli, mut config: Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Serve { port, interval } => {
            if let Some(port) = port {
                config.server.port = *port;
            }
            if let Some(interval) = interval {
                config.schedule.loop_interval_secs = *interval;
            }
            handle_serve(&config).await
        }
        Commands::RunLoop => handle_run_loop(&config).await,
        Commands::Strategize => handle_strategize(&config).await,
        Commands::Escalate { reason } => handle_escalate(reason, &config).await,
        Commands::Status => handle_status(&config),
        Commands::Failures => handle_failures(&config),
        Commands::Retain => handle_retain(&config),
    }
}

async fn handle_serve(config: &Config) -> Result<()> {
    let orchestrator = Arc::new(open_loop_owner(config)?);
    println!(
        "{}",
        format!("Serving on {}:{}", config.server.bind, config.server.port).cyan()
    );
    kaizen::server::serve(orchestrator, config).await.context("Server failed")?;
    Ok(())
}

async fn handle_run_loop(config: &Config) -> Result<()> {
    let orchestrator = open_loop_owner(config)?;
    let Some(summary) = orchestrator.run_once().await.context("Failed to start loop")? else {
        println!("{}", "Loop already running.".yellow());
        return Ok(());
    };

    match &summary.outcome {
        LoopOutcome::Completed => println!(
            "{}",
            format!(
                "Loop {} (#{}) completed: {} executed, {} skipped",
                summary.run.id, summary.run.ordinal, summary.executed, summary.skipped
            )
            .green()
        ),
        LoopOutcome::Failed { stage, message } => println!(
            "{}",
            format!("Loop {} failed at {}: {}", summary.run.id, stage, message).red()
        ),
        other => println!("Loop {} ended: {:?}", summary.run.id, other),
    }

    if let Some(handle) = summary.escalation {
        println!("{}", "Waiting for self-repair...".cyan());
        match handle.await {
            Ok(Some(diagnosis)) => println!("{}", diagnosis.diagnosis),
            Ok(None) => println!("{}", "Self-repair failed, see log".yellow()),
            Err(e) => println!("{}", format!("Self-repair task aborted: {}", e).yellow()),
        }
    }
    Ok(())
}

async fn handle_strategize(config: &Config) -> Result<()> {
    let orchestrator = open_orchestrator(config)?;
    let mission = orchestrator.strategize().await.context("Strategist failed")?;
    println!("{}", "Strategist run complete.".green());
    println!("{}", mission);
    Ok(())
}

async fn handle_escalate(reason: &str, config: &Config) -> Result<()> {
    let orchestrator = open_orchestrator(config)?;
    let diagnosis = orchestrator.escalate(reason).await.context("System agent failed")?;
    println!("{}", serde_json::to_string_pretty(&diagnosis)?);
    Ok(())
}

fn handle_status(config: &Config) -> Result<()> {
    let orchestrator = open_orchestrator(config)?;
    let status = orchestrator.status()?;
    let label = if status.is_running() {
        "running".yellow()
    } else {
        "idle".green()
    };
    println!("Status:       {}", label);
    if let Some(started) = status.start_time.filter(|_| status.is_running()) {
        println!("Started at:   {} ms", started);
    }
    println!("Loop counter: {}", status.ordinal);
    if let Some(id) = status.loop_id {
        println!("Current loop: {}", id);
    }
    if let Some(id) = status.last_loop_id {
        println!("Last loop:    {}", id);
    }

    let ledger = orchestrator.ledger_summary()?;
    println!("Retained:     {} loops, {} unsuccessful", ledger.total, ledger.unsuccessful);
    for (stage, count) in ledger.failed_by_stage {
        println!("  {}", format!("failed at {}: {}", stage, count).red());
    }
    Ok(())
}

fn handle_failures(config: &Config) -> Result<()> {
    let orchestrator = open_orchestrator(config)?;
    println!("{}", orchestrator.failure_summary()?);
    Ok(())
}

fn handle_retain(config: &Config) -> Result<()> {
    let orchestrator = open_orchestrator(config)?;
    let report = orchestrator.apply_retention()?;
    println!(
        "{}",
        format!(
            "Purged {} by ordinal, {} over the file cap, {} dashboard pages; dropped {} ledger entries",
            report.purged, report.cleanup.artifacts_purged, report.cleanup.pages_purged, report.compacted
        )
        .green()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging first
    setup_logging(cli.stderr_log).context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, config).await.context("Application failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaizen::daemon::LoopStateManager;
    use kaizen::storage::Workspace;
    use tempfile::TempDir;

    fn workspace_config(temp: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.data_dir = temp.path().join("data");
        config.storage.site_dir = temp.path().join("site");
        config
    }

    fn error_logs(config: &Config) -> usize {
        let dir = Workspace::from_config(&config.storage).artifacts_dir();
        fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_name().to_string_lossy().ends_with("_error.log"))
                    .count()
            })
            .unwrap_or(0)
    }

    #[test]
    fn test_read_commands_leave_live_loop_alone() {
        let temp = TempDir::new().unwrap();
        let config = workspace_config(&temp);
        let status_path = Workspace::from_config(&config.storage).status_path();

        // another process is mid-loop
        let live = LoopStateManager::open(&status_path);
        let run = live.try_begin().unwrap().unwrap();
        let before = fs::read_to_string(&status_path).unwrap();

        handle_status(&config).unwrap();
        handle_failures(&config).unwrap();

        assert_eq!(fs::read_to_string(&status_path).unwrap(), before);
        assert_eq!(error_logs(&config), 0);

        let reader = open_orchestrator(&config).unwrap();
        let status = reader.status().unwrap();
        assert!(status.is_running());
        assert_eq!(status.loop_id, Some(run.id));
    }

    #[test]
    fn test_loop_owner_resets_stale_record() {
        let temp = TempDir::new().unwrap();
        let config = workspace_config(&temp);
        let status_path = Workspace::from_config(&config.storage).status_path();
        LoopStateManager::open(&status_path).try_begin().unwrap().unwrap();

        let owner = open_loop_owner(&config).unwrap();

        assert!(!owner.status().unwrap().is_running());
        assert_eq!(error_logs(&config), 1);
    }
}
