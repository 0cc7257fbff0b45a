use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use log::{debug, error, info, Level};
use serde::Serialize;

use fanout::broadcast::{
    Broadcaster, DeliveryStats, FnSubscriber, LogSubscriber, MetricsSubscriber, SubscriberMetrics,
};
use fanout::{cli, logging};

/// Output of `--stats`
#[derive(Debug, Serialize)]
struct StatsOutput {
    subscribers: usize,
    delivery: DeliveryStats,
    metrics: SubscriberMetrics,
}

fn main() {
    if let Err(e) = run() {
        error!("Error: {:#}", e);
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = cli::parse_args();
    cli::validate_args(&args)?;

    if args.no_color {
        colored::control::set_override(false);
    }

    let config_manager = cli::load_configuration(&args)?;
    let log_config = cli::configure_logging(&args, &config_manager)?;
    logging::init_logger(log_config)?;

    if let Some(path) = config_manager.config_file_path() {
        debug!("Using configuration file: {}", path.display());
    }

    let broadcaster_config = cli::configure_broadcaster(&args, &config_manager)?;
    info!(
        "Starting broadcaster ({:?} dispatch, {} observers)",
        broadcaster_config.dispatch, args.subscribers
    );
    let broadcaster: Broadcaster = Broadcaster::with_config(broadcaster_config);

    // The broadcaster only holds weak references; these bindings keep the subscribers alive
    let observers: Vec<_> = (1..=args.subscribers)
        .map(|index| {
            let name = format!("Observer{}", index);
            let label = name.clone();
            FnSubscriber::arc(name, move |message: &str| -> anyhow::Result<()> {
                println!("{}: {}", label, message);
                Ok(())
            })
        })
        .collect();
    for observer in &observers {
        broadcaster.register(observer);
    }

    let metrics = Arc::new(MetricsSubscriber::new("metrics"));
    let audit = Arc::new(LogSubscriber::new("audit").with_level(Level::Debug));
    broadcaster.register(&metrics);
    broadcaster.register(&audit);

    debug!("Registered subscribers: {:?}", broadcaster.subscriber_names());

    let mut failed_rounds = 0;
    for message in &args.messages {
        let report = broadcaster.notify(message.as_str());
        if !report.is_complete() {
            failed_rounds += 1;
            for failure in &report.failures {
                eprintln!("{} {}", "delivery failed:".yellow(), failure);
            }
        }
    }

    if args.stats {
        let output = StatsOutput {
            subscribers: broadcaster.len(),
            delivery: broadcaster.stats(),
            metrics: metrics.snapshot(),
        };
        let json = serde_json::to_string_pretty(&output).context("Failed to serialize statistics")?;
        println!("{}", json);
    }

    if failed_rounds > 0 {
        return Err(anyhow::anyhow!(
            "{} of {} notifications were not delivered to every subscriber",
            failed_rounds,
            args.messages.len()
        ));
    }

    info!("Broadcast {} message(s)", args.messages.len());
    Ok(())
}
