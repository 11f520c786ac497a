//! relive-bridge — connects an injection agent's ZeroMQ feed to a reload bus.
//!
//! Subcommands:
//! - `listen`  subscribe to agent events and log each dispatch report
//! - `publish` announce reloaded classes, as an agent would

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::Notify;
use tracing::{info, warn};

use relive_bridge::{
    run_bridge, topics, AgentPublisher, AgentSubscriber, BridgeConfig, BridgeMessage,
};
use relive_bus::{normalize, EventBus, LocalBus};
use relive_core::RawNotification;
use relive_router::ReloadRouter;

// ── CLI ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "relive-bridge", version, about)]
struct Cli {
    /// Path to relive.toml config file.
    #[arg(long, env = "RELIVE_CONFIG", default_value = "relive.toml")]
    config: String,

    /// Override the agent endpoint from the config file.
    #[arg(long)]
    endpoint: Option<String>,

    /// Override the topic from the config file.
    #[arg(long)]
    topic: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subscribe to agent events and log each reload.
    Listen,

    /// Publish a class-reloaded event.
    Publish {
        /// Reloaded class names, in order; routers act on the first.
        #[arg(long = "class", required = true)]
        classes: Vec<String>,

        /// Time to let subscribers connect before sending, in milliseconds.
        #[arg(long, default_value_t = 300)]
        settle_ms: u64,
    },
}

fn load_config(cli: &Cli) -> BridgeConfig {
    let mut config = match BridgeConfig::from_file(&cli.config) {
        Ok(cfg) => {
            info!(path = %cli.config, "loaded bridge config");
            cfg
        }
        Err(e) => {
            warn!(error = %e, path = %cli.config, "failed to load config, using defaults");
            BridgeConfig::default()
        }
    };
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(topic) = &cli.topic {
        config.topic = topic.clone();
    }
    config
}

async fn listen(config: BridgeConfig) -> anyhow::Result<()> {
    let subscriber = AgentSubscriber::connect(&config.endpoint).await?;
    subscriber.subscribe(&config.topic).await?;

    let bus = LocalBus::new();
    let router = ReloadRouter::new(config.router.clone());
    bus.subscribe(
        &config.router.notification_name,
        Arc::new(move |notification: &RawNotification| {
            let event = normalize(notification);
            let Some(class) = event.resolved_class().cloned() else {
                warn!("agent event carried no class");
                return;
            };
            let report = router.dispatch(&event);
            info!(
                class = %class,
                generation = report.generation,
                evaluated = report.evaluated,
                invoked = report.invoked_count(),
                failed = report.failures.len(),
                "class reloaded"
            );
        }),
    );

    let shutdown = Arc::new(Notify::new());
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.notify_one();
        }
    });

    let forwarded = run_bridge(
        &subscriber,
        &bus,
        &config.router.notification_name,
        shutdown,
    )
    .await?;
    info!(forwarded, "relive-bridge exited cleanly");
    Ok(())
}

async fn publish(config: BridgeConfig, classes: Vec<String>, settle_ms: u64) -> anyhow::Result<()> {
    let publisher = AgentPublisher::bind(&config.endpoint).await?;
    tokio::time::sleep(Duration::from_millis(settle_ms)).await;

    let topic = if config.topic.is_empty() {
        topics::CLASS_RELOADED.to_string()
    } else {
        config.topic
    };
    let message = BridgeMessage::class_reloaded(classes)?.with_topic(topic);
    publisher.publish(&message).await?;
    info!(correlation_id = %message.correlation_id, "published reload event");
    Ok(())
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli);
    config.validate()?;

    match cli.command {
        Command::Listen => listen(config).await,
        Command::Publish {
            classes,
            settle_ms,
        } => publish(config, classes, settle_ms).await,
    }
}
