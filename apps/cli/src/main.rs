use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use lervi_core::{FileStore, IdentityManager, Scheduler, TelemetryConfig};
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

mod replay;

use replay::{ReplayReport, load_replay, replay};

#[derive(Parser)]
#[command(name = "lervi")]
#[command(about = "Replay storefront telemetry against a collector and manage the visitor identity")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a JSON-lines event log through the telemetry engine
    Replay {
        /// Tenant (hotel) slug the events belong to
        #[arg(short, long)]
        tenant: String,

        /// Collector base URL. Defaults to LERVI_COLLECTOR_URL or the local backend.
        #[arg(short, long)]
        collector: Option<String>,

        /// Pause between events, in milliseconds
        #[arg(long, default_value_t = 0)]
        pace_ms: u64,

        /// File with one `{"event": ..., "metadata": {...}}` object per line
        input: PathBuf,
    },
    /// Print the persisted session id
    Session,
    /// Set or clear the authenticated guest id
    Guest {
        #[command(subcommand)]
        action: GuestAction,
    },
}

#[derive(Subcommand)]
enum GuestAction {
    /// Remember the guest that just authenticated
    Set { id: String },
    /// Forget the current guest
    Clear,
}

fn identity() -> IdentityManager {
    match FileStore::default_location() {
        Some(store) => IdentityManager::new(Arc::new(store)),
        None => {
            warn!("No data directory on this platform, identity will not persist");
            IdentityManager::detached()
        }
    }
}

fn print_report(report: &ReplayReport) {
    println!("{}", style("─".repeat(60)).dim());
    println!(
        "{} {} tracked, {} skipped",
        style("✓").green().bold(),
        report.tracked,
        style(report.skipped).yellow()
    );
    println!(
        "{} {} delivered in {} batch(es)",
        style("✓").green().bold(),
        report.delivered,
        report.batches
    );
    if report.requeued > 0 || report.pending > 0 {
        println!(
            "{} {} requeued, {} still buffered, {} dropped",
            style("!").red().bold(),
            report.requeued,
            report.pending,
            report.dropped
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Replay {
            tenant,
            collector,
            pace_ms,
            input,
        } => {
            let mut config = TelemetryConfig::from_env();
            if let Some(url) = collector {
                config.collector_url = url;
            }

            println!(
                "\n{}  {}\n",
                style("lervi").cyan().bold(),
                style(format!("replaying into {}", config.collector_url)).dim()
            );

            let scheduler = Scheduler::builder(config).identity(identity()).build()?;
            let lines = load_replay(&input).await?;
            let report = replay(
                &scheduler,
                &tenant,
                &lines,
                Duration::from_millis(pace_ms),
            )
            .await?;
            print_report(&report);
        }
        Command::Session => {
            println!("{}", identity().session_id());
        }
        Command::Guest { action } => {
            let identity = identity();
            match action {
                GuestAction::Set { id } => {
                    identity.set_guest_id(&id);
                    println!("{} guest set to {}", style("✓").green().bold(), style(id).cyan());
                }
                GuestAction::Clear => {
                    identity.set_guest_id("");
                    println!("{} guest cleared", style("✓").green().bold());
                }
            }
        }
    }

    Ok(())
}
