mod display;

use std::net::SocketAddr;
use std::time::Duration;

use blockwatch_core::{
    environment_summary, CheckReport, Config, CycleOutcome, Delivery, LivenessStub, Monitor,
    RunMode,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use display::{Palette, Spinner};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blockwatch")]
#[command(about = "Periodic domain block checks reported to Telegram")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the check loop and the liveness listener (default)
    Run {
        /// Wait one interval before the first cycle
        #[arg(long)]
        no_initial_run: bool,
        /// Seconds between cycles (overrides CHECK_INTERVAL_SECS)
        #[arg(long)]
        interval: Option<u64>,
        /// Do not bind the liveness listener
        #[arg(long)]
        no_listener: bool,
    },
    /// Run a single cycle and exit
    Once {
        /// Print the report instead of sending it
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the effective configuration with secrets hidden
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            no_initial_run,
            interval,
            no_listener,
        }) => run(Config::from_env()?, no_initial_run, interval, !no_listener).await,
        None => run(Config::from_env()?, false, None, true).await,
        Some(Commands::Once { dry_run }) => once(Config::from_env()?, dry_run).await,
        Some(Commands::Config) => {
            show_config();
            Ok(())
        }
    }
}

async fn run(
    mut config: Config,
    no_initial_run: bool,
    interval: Option<u64>,
    listener: bool,
) -> anyhow::Result<()> {
    if no_initial_run {
        config.schedule.run_on_startup = false;
    }
    if let Some(secs) = interval {
        config.schedule.interval = Duration::from_secs(secs.max(1));
    }

    if listener {
        let stub = LivenessStub::bind(SocketAddr::from(([0, 0, 0, 0], config.port))).await?;
        tokio::spawn(stub.serve());
    }

    let monitor = Monitor::from_config(&config)?;

    tokio::select! {
        _ = monitor.run_forever() => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Interrupted, shutting down");
        }
    }

    Ok(())
}

async fn once(config: Config, dry_run: bool) -> anyhow::Result<()> {
    let monitor = Monitor::from_config(&config)?;

    if dry_run {
        let result = {
            let _spinner = Spinner::new("Checking domains...");
            monitor.check_once().await
        };

        match result {
            Ok(Some(report)) => print_report(&report),
            Ok(None) => println!("{} Domain list is empty", "!".caution()),
            Err((stage, e)) => {
                eprintln!("{} {} failed: {}", "Error:".danger(), stage, e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    match monitor.run_cycle(RunMode::FirstRun).await {
        CycleOutcome::Reported { report, delivery } => {
            print_report(&report);
            match delivery {
                Delivery::Sent => println!("{} Report sent", "✓".ok()),
                Delivery::Skipped => {
                    println!("{} Telegram not configured, report not sent", "!".caution())
                }
                Delivery::Failed(reason) => {
                    eprintln!("{} Report not delivered: {}", "Error:".danger(), reason);
                    std::process::exit(1);
                }
            }
        }
        CycleOutcome::Skipped => println!("{} Domain list is empty", "!".caution()),
        CycleOutcome::Failed { stage, error } => {
            eprintln!("{} {} failed: {}", "Error:".danger(), stage, error);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_report(report: &CheckReport) {
    let headline = if report.blocked_count > 0 {
        report.headline.danger().bold()
    } else {
        report.headline.ok().bold()
    };

    println!("{}\n", headline);
    for line in report.table.lines() {
        if line.starts_with('+') {
            println!("{}", line.muted());
        } else {
            println!("{}", line);
        }
    }
}

/// Print the effective configuration, or the raw settings and the reason they
/// do not load.
fn show_config() {
    match Config::from_env() {
        Ok(config) => print_settings(config.redacted()),
        Err(e) => {
            print_settings(environment_summary(|key| std::env::var(key).ok()));
            eprintln!("\n{} {}", "Error:".danger(), e);
            std::process::exit(1);
        }
    }
}

fn print_settings(settings: Vec<(&'static str, String)>) {
    for (key, value) in settings {
        println!("{:<22} {}", key.key(), value);
    }
}
