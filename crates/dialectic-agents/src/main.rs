//! `dialectic`: run one problem through the Believer / Logician /
//! Contrarian traces and the necessity arbiter against an
//! OpenAI-compatible endpoint.
//!
//! # Usage
//!
//! ```bash
//! dialectic "A host accidentally opens door 2 ..."
//! dialectic --file problem.txt --json --report run.json
//! echo "..." | DIALECTIC_BASE_URL=http://gpu-01:8000/v1 dialectic --show-traces
//! ```

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dialectic::{DialecticalOrchestrator, Problem, RetryingPort, RunReport, TraceScheduling};
use dialectic_agents::{check_endpoint, AgentsConfig, OpenAiCompatPort};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Problem statement. Read from --file or stdin when omitted.
    problem: Option<String>,

    /// Read the problem statement from a file
    #[arg(long, conflicts_with = "problem")]
    file: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Endpoint base URL (overrides DIALECTIC_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Model name (overrides DIALECTIC_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Run the three traces one after another instead of concurrently
    #[arg(long, default_value_t = false)]
    sequential: bool,

    /// Print the full run report as JSON instead of the verdict
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Also write the JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Print every trace before the verdict
    #[arg(long, default_value_t = false)]
    show_traces: bool,
}

fn read_problem(args: &Args) -> Result<String> {
    if let Some(text) = &args.problem {
        return Ok(text.clone());
    }
    if let Some(path) = &args.file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read problem file {}", path.display()));
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read problem from stdin")?;
    Ok(buf)
}

fn print_report(report: &RunReport, show_traces: bool) {
    if show_traces {
        for trace in &report.traces {
            println!(
                "=== Trace {} ({}) [{}] ===",
                trace.role.ordinal(),
                trace.role.label(),
                trace.status
            );
            match (&trace.output, &trace.failure) {
                (Some(output), _) => println!("{}", output.trim_end()),
                (None, Some(failure)) => println!("<{failure}>"),
                (None, None) => println!("<no output>"),
            }
            println!();
        }
    }

    match &report.outcome {
        Ok(verdict) => {
            let endorsed = verdict.endorsed_role().map_or("None", |r| r.label());
            println!("Endorsed: {endorsed}");
            println!("Answer:   {}", verdict.answer());
            println!();
            println!("{}", verdict.justification());
        }
        Err(e) => {
            if let Some(raw) = e.raw_output() {
                eprintln!("--- arbiter output ---\n{raw}\n----------------------");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = AgentsConfig::load(args.config.as_deref())?;
    if let Some(url) = &args.base_url {
        config.endpoint.base_url = url.clone();
    }
    if let Some(model) = &args.model {
        config.endpoint.model = model.clone();
    }
    if args.sequential {
        config.dialectic.scheduling = TraceScheduling::Sequential;
    }
    config.validate().context("Invalid configuration")?;

    let problem = Problem::new(read_problem(&args)?)?;

    if !check_endpoint(&config.endpoint.base_url).await {
        warn!(url = %config.endpoint.base_url, "Endpoint did not answer /models, trying anyway");
    }

    let port = RetryingPort::new(OpenAiCompatPort::new(&config.endpoint)?, config.retry.clone());
    let model = port.inner().model().to_string();
    let max_retries = port.policy().max_retries;
    let orchestrator = DialecticalOrchestrator::new(Arc::new(port), config.dialectic.clone())?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    info!(
        url = %config.endpoint.base_url,
        model = %model,
        max_retries,
        scheduling = ?orchestrator.config().scheduling,
        "Dialectic run starting"
    );
    let report = orchestrator.run_with_cancel(&problem, cancel).await;
    info!("{}", report.summary_line());

    if let Some(path) = &args.report {
        std::fs::write(path, report.to_json()?)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
    }

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print_report(&report, args.show_traces);
    }

    report.into_result()?;
    Ok(())
}
