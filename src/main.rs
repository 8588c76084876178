use clap::Parser;
use lanpulse::{ClockMode, DiscoveryConfig, NeighborRecord, Node};
use std::path::PathBuf;
use std::time::Duration;
use tokio::{signal, time};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
struct Args {
    #[arg(long, help = "Path to a TOML configuration file")]
    config: Option<PathBuf>,
    #[arg(long, help = "UDP port used for announcements")]
    broadcast_port: Option<u16>,
    /// Seconds between announcements
    #[arg(long)]
    announce_interval: Option<f64>,
    #[arg(long, help = "Sightings after discovery before a neighbor is dropped")]
    eviction_threshold: Option<u32>,
    #[arg(long, help = "Probe connect and read timeout, in milliseconds")]
    probe_timeout_ms: Option<u64>,
    #[arg(long, value_enum)]
    clock: Option<ClockMode>,
    #[arg(
        long,
        default_value = "5",
        help = "Neighbor table display interval, in seconds"
    )]
    display_interval: u64,
    /// Print neighbor snapshots as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn discovery_config(&self) -> Result<DiscoveryConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => DiscoveryConfig::load(path)?,
            None => DiscoveryConfig::default(),
        };
        if let Some(port) = self.broadcast_port {
            config.broadcast_port = port;
        }
        if let Some(interval) = self.announce_interval {
            config.announce_interval_secs = interval;
        }
        if let Some(threshold) = self.eviction_threshold {
            config.eviction_threshold = threshold;
        }
        if let Some(timeout) = self.probe_timeout_ms {
            config.probe_timeout_ms = timeout;
        }
        if let Some(clock) = self.clock {
            config.clock = clock;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();
    let config = args.discovery_config()?;

    let version = env!("CARGO_PKG_VERSION");
    let build = option_env!("GIT_COMMIT_HASH").unwrap_or("unknown");

    let node = match Node::bind(config.clone()).await {
        Ok(node) => node,
        Err(e) => {
            error!("Startup failed: {}", e);
            return Err(e.into());
        }
    };

    info!("{}", "*".repeat(50));
    info!("lanpulse {} ({})", version, build);
    info!("NODE IDENTITY: {}", node.identity());
    info!("Broadcast port {}, clock {:?}", config.broadcast_port, config.clock);
    info!("To terminate use: CTRL+C");
    info!("{}", "*".repeat(50));

    let handle = node.start()?;

    let mut display = time::interval(Duration::from_secs(args.display_interval.max(1)));
    loop {
        tokio::select! {
            _ = display.tick() => {
                let snapshot = handle.snapshot();
                if args.json {
                    match serde_json::to_string(&snapshot) {
                        Ok(json) => info!("{}", json),
                        Err(e) => error!("Failed to serialize neighbor table: {}", e),
                    }
                } else {
                    log_table(&snapshot);
                }
            }
            result = signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                break;
            }
        }
    }

    handle.stop().await;
    Ok(())
}

fn log_table(snapshot: &[NeighborRecord]) {
    info!("{} neighbor(s)", snapshot.len());
    for record in snapshot {
        let delay = record
            .estimated_delay_secs
            .map(|d| format!("{:.6} sec", d))
            .unwrap_or_else(|| "pending".to_string());
        info!(
            "  {} at {}:{}  delay: {}  liveness: {}",
            record.identity, record.address, record.probe_port, delay, record.liveness
        );
    }
}
