use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dispatchr::classifier;
use dispatchr::controller::{Controller, ControllerConfig};
use dispatchr::domain::{OrchestrationOutcome, OrchestrationStatus};
use dispatchr::executor::Executor;
use dispatchr::planner;
use dispatchr::registry::Registry;
use dispatchr::test_run::{CommandTestRun, parse_json};
use dispatchr::worker::ProcessInvoker;

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::Config;

fn setup_logging(level: &str) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dispatchr")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("dispatchr.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn load_registry(config: &Config) -> Result<Registry> {
    let registry = match &config.registry {
        Some(path) => Registry::from_yaml_file(path)
            .with_context(|| format!("Failed to load registry from {}", path.display()))?,
        None => Registry::builtin().context("Built-in registry is invalid")?,
    };
    registry.warn_hazards();
    Ok(registry)
}

async fn run_application(cli: &Cli, config: Config) -> Result<bool> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run {
            max_cycles,
            max_concurrency,
            report,
        } => handle_run_command(config, *max_cycles, *max_concurrency, report.as_deref()).await,
        Commands::Classify { file } => handle_classify_command(file, &config).map(|_| true),
        Commands::Domains => handle_domains_command(&config).map(|_| true),
    }
}

async fn handle_run_command(
    mut config: Config,
    max_cycles: Option<u32>,
    max_concurrency: Option<usize>,
    report: Option<&Path>,
) -> Result<bool> {
    if let Some(n) = max_cycles {
        config.engine.max_cycles = n;
    }
    if let Some(n) = max_concurrency {
        config.engine.max_concurrency = n;
    }
    config.validate().context("Invalid run options")?;

    let registry = Arc::new(load_registry(&config)?);
    let invoker = Arc::new(ProcessInvoker::new(config.worker.clone(), registry.clone()));
    let executor = Executor::new(invoker, config.worker.timeout());
    let test_run = CommandTestRun::new(config.test_run.clone());

    let mut controller_config = ControllerConfig::new(config.engine.clone()).with_planner(config.planner.clone());
    if let Some(path) = report {
        controller_config = controller_config.with_report_path(path);
    }

    println!(
        "{} up to {} cycle(s), {} specialist(s) at a time",
        "Dispatching:".cyan(),
        config.engine.max_cycles,
        config.engine.max_concurrency
    );

    let mut controller = Controller::new(controller_config, registry, test_run, executor);
    let outcome = controller.run().await.context("Orchestration failed")?;
    print_outcome(&outcome);

    Ok(outcome.is_done())
}

fn print_outcome(outcome: &OrchestrationOutcome) {
    for report in &outcome.history {
        println!(
            "{} {}: {} failure(s), {} unclassified, {} task(s), {} directive(s), {} remaining",
            "Cycle".bold(),
            report.cycle_index,
            report.input_count(),
            report.unclassified.len(),
            report.task_results.len(),
            report.directives.len(),
            report.remaining_failure_count
        );
        for result in &report.task_results {
            let status = if result.success {
                "ok".green()
            } else if result.timed_out {
                "timed out".red()
            } else {
                "failed".red()
            };
            println!("  {:<20} {} ({:?})", result.domain.as_str(), status, result.duration);
        }
        for failure in &report.unclassified {
            println!("  {} {}: {}", "unclassified".yellow(), failure.record.test_name, failure.record.error_message);
        }
        for directive in &report.directives {
            println!("  {} {}", "coordinate".magenta(), directive.concern);
        }
    }

    match outcome.status {
        OrchestrationStatus::Done => println!("{} after {} cycle(s)", "Done".green().bold(), outcome.cycles()),
        OrchestrationStatus::FailedMaxCycles => println!(
            "{} after {} cycle(s)",
            "Failures remain".red().bold(),
            outcome.cycles()
        ),
    }
}

fn handle_classify_command(file: &Path, config: &Config) -> Result<()> {
    info!("Classifying failures from {}", file.display());
    let content = fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let records = parse_json(&content).ok_or_else(|| eyre!("{} is not a JSON failure list", file.display()))?;

    let registry = load_registry(config)?;
    let classification = classifier::classify(&records, &registry, config.engine.min_confidence);
    let tasks = planner::plan(&classification, &config.planner);

    for task in &tasks {
        println!(
            "{} {} [{}] {} failure(s), est. {:?}",
            "Task:".green(),
            task.domain.as_str().bold(),
            task.priority,
            task.failure_count(),
            task.estimated_duration
        );
        for failure in &task.failures {
            println!("    {:.2} {}", failure.confidence, failure.evidence());
        }
    }
    for failure in &classification.unclassified {
        println!("{} {}", "Unclassified:".yellow(), failure.evidence());
    }
    println!(
        "{} failure(s), {} task(s), serial estimate {:?}",
        classification.total(),
        tasks.len(),
        planner::total_estimate(&tasks)
    );
    Ok(())
}

fn handle_domains_command(config: &Config) -> Result<()> {
    let registry = load_registry(config)?;

    for (rank, signature) in registry.iter().enumerate() {
        let sig = &signature.signature;
        println!(
            "{:>2}. {} ({:?}, {}) -> {}",
            rank + 1,
            sig.id.as_str().bold(),
            sig.category,
            sig.default_priority,
            sig.resource_location
        );
        println!("    {} [{} rule(s)]", sig.description, sig.rules.len());
        if !sig.coordination_partners.is_empty() {
            let partners: Vec<&str> = sig.coordination_partners.iter().map(|p| p.as_str()).collect();
            println!("    partners: {}", partners.join(", "));
        }
    }

    for overlap in registry.location_overlaps() {
        println!(
            "{} {} ({}) overlaps {} ({})",
            "Warning:".yellow(),
            overlap.first,
            overlap.first_location,
            overlap.second,
            overlap.second_location
        );
    }
    for (from, to) in registry.one_sided_partnerships() {
        println!(
            "{} {} lists {} as a partner but not the reverse",
            "Warning:".yellow(),
            from,
            to
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    let level = if cli.is_verbose() {
        "debug".to_string()
    } else {
        config.log_level.clone().unwrap_or_else(|| "info".to_string())
    };
    setup_logging(&level).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    let clean = run_application(&cli, config).await.context("Application failed")?;
    if !clean {
        std::process::exit(1);
    }

    Ok(())
}
