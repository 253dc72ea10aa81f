//! toolguard CLI entry point
//!
//! Runs scripted tools through the configured resilience policy.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use toolguard::cli::{Cli, Command, OutputFormat, get_log_path};
use toolguard::config::Config;
use toolguard::resilience::CircuitState;
use toolguard::simulate::{self, Scenario, SimulationReport};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("toolguard")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("toolguard.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration before logging so the config file can set the level
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;
    debug!(?config, "main: config loaded");

    match cli.command {
        Some(Command::Simulate {
            fail,
            kind,
            calls,
            concurrent,
            retry_after_ms,
            delay_ms,
            max_attempts,
            initial_delay_ms,
            timeout_ms,
            format,
        }) => {
            let mut config = config;
            if let Some(n) = max_attempts {
                config.resilience.retry.max_attempts = n;
            }
            if let Some(ms) = initial_delay_ms {
                config.resilience.retry.initial_delay_ms = ms;
            }
            if timeout_ms.is_some() {
                config.resilience.timeout_ms = timeout_ms;
            }

            let scenario = Scenario {
                failures: fail,
                kind: kind.into(),
                retry_after: retry_after_ms.map(Duration::from_millis),
                latency: delay_ms.map(Duration::from_millis),
                calls,
                concurrent,
            };
            cmd_simulate(&config, &scenario, format).await
        }
        Some(Command::Config) => cmd_config(&config),
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Run a simulation and print the report
async fn cmd_simulate(config: &Config, scenario: &Scenario, format: OutputFormat) -> Result<()> {
    config.validate()?;
    let report = simulate::run(scenario, config.resilience.clone())
        .await
        .context("Failed to build executor")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &SimulationReport) {
    for exec in &report.executions {
        if exec.ok {
            let value = exec.value.as_ref().map(|v| v.to_string()).unwrap_or_default();
            println!("{} call {}: {}", "✓".green(), exec.call, value);
        } else if exec.circuit_rejected {
            let error = exec.error.as_deref().unwrap_or("rejected");
            println!("{} call {}: {}", "⊘".yellow(), exec.call, error.yellow());
        } else {
            let error = exec.error.as_deref().unwrap_or("failed");
            println!("{} call {}: {}", "✗".red(), exec.call, error.red());
        }
    }

    let state = match report.circuit_state {
        CircuitState::Closed => report.circuit_state.to_string().green(),
        CircuitState::HalfOpen => report.circuit_state.to_string().yellow(),
        CircuitState::Open => report.circuit_state.to_string().red(),
    };
    println!();
    println!("Tool invocations: {}", report.tool_calls.to_string().cyan());
    println!(
        "Circuit: {} (failures: {}, successes: {})",
        state, report.failure_count, report.success_count
    );
    println!("Elapsed: {}ms", report.elapsed_ms.to_string().dimmed());
    println!("Log: {}", get_log_path().display().to_string().dimmed());
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}
