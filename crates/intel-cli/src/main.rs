use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use intel_core::{sample_batch_text, validate};
use intel_session::{BatchOutcome, SessionController, SessionEvent, SimulationConfig};
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "intel-cli")]
#[command(about = "Profile Intel Extractor: simulated profile extraction (no real scraping)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the web UI.
    Serve {
        #[arg(long, env = "INTEL_WEB_PORT", default_value_t = 8000)]
        port: u16,
    },
    /// Run one batch in the terminal.
    Extract {
        /// Read identifiers from a file instead of stdin.
        #[arg(long, conflicts_with = "sample")]
        file: Option<PathBuf>,
        /// Use the built-in ten-profile example batch.
        #[arg(long)]
        sample: bool,
        /// Print records as JSON.
        #[arg(long)]
        json: bool,
        /// Skip the artificial delays.
        #[arg(long)]
        fast: bool,
    },
    /// Check a batch without running it.
    Validate {
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print the example batch.
    Sample,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| {
            std::env::var("INTEL_LOG_LEVEL")
                .ok()
                .and_then(|level| EnvFilter::try_new(level).ok())
        })
        .unwrap_or_else(|| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_input(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading identifiers from stdin")?;
            Ok(buf)
        }
    }
}

/// Writes progress lines until the batch finishes. Lagging skips ahead instead of stopping.
async fn print_events(mut events: Receiver<SessionEvent>, mut out: impl Write) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "progress printer lagged behind the session");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        let _ = match event {
            SessionEvent::Progress(p) if !p.current_target.is_empty() => writeln!(
                out,
                "[{}/{}] {:>3}% {}",
                p.completed_count,
                p.total_count,
                p.percent(),
                p.current_target
            ),
            SessionEvent::Notification(n) => writeln!(out, "{}: {}", n.title, n.description),
            SessionEvent::BatchCompleted { .. } | SessionEvent::BatchFailed { .. } => break,
            SessionEvent::Progress(_) => Ok(()),
        };
    }
}

async fn extract(raw: String, json: bool, fast: bool) -> Result<()> {
    let mut config = SimulationConfig::from_env()?;
    if fast {
        config = SimulationConfig {
            rng_seed: config.rng_seed,
            event_capacity: config.event_capacity,
            notification_limit: config.notification_limit,
            ..SimulationConfig::instant()
        };
    }
    info!(fast, json, "running extraction from the terminal");
    let controller = SessionController::new(config);

    let printer = tokio::spawn(print_events(controller.subscribe(), std::io::stderr()));

    let outcome = controller.run_batch(&raw).await?;
    let _ = printer.await;

    match outcome {
        BatchOutcome::Completed(summary) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                for record in &summary.records {
                    println!(
                        "{:<24} {:<26} {}",
                        record.display_name,
                        record.title,
                        record.skills.join(", ")
                    );
                }
            }
            Ok(())
        }
        BatchOutcome::Failed { batch_id, message } => {
            warn!(%batch_id, %message, "extraction failed");
            anyhow::bail!("batch {batch_id} failed: {message}")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        intel_web::serve_from_env().await?;
        return Ok(());
    };

    match command {
        Commands::Serve { port } => {
            let config = SimulationConfig::from_env()?;
            intel_web::serve(config, port).await?;
        }
        Commands::Extract {
            file,
            sample,
            json,
            fast,
        } => {
            let raw = if sample {
                sample_batch_text()
            } else {
                read_input(file.as_ref())?
            };
            extract(raw, json, fast).await?;
        }
        Commands::Validate { file } => {
            let raw = read_input(file.as_ref())?;
            let identifiers = validate(&raw)?;
            println!("{} valid identifiers", identifiers.len());
            for identifier in identifiers {
                println!("{}  ->  {}", identifier, identifier.display_name());
            }
        }
        Commands::Sample => println!("{}", sample_batch_text()),
    }

    Ok(())
}
