//! OpenFlow controller binary.
//!
//! Accepts switch connections over TCP, runs the session core and the
//! built-in keepalive and port status helpers, and periodically logs routing
//! counters.

use clap::Parser;
use ofp_session::{
    listen_tcp, run_echo_responder, run_port_status_updater, Connection, Network, Subscriptions,
};
use ofp_wire::MessageType;
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod logging;

use config::ControllerConfig;
use logging::ControllerLogFormatter;

/// Capacity of the channels feeding the built-in helpers
const HELPER_QUEUE_DEPTH: usize = 256;

/// OpenFlow 1.0 controller
#[derive(Parser, Debug)]
#[command(name = "ofp-controller", version, about = "OpenFlow 1.0 controller session core")]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Listen address for switch connections, e.g. 0.0.0.0:6653
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Router wait budget per recipient, e.g. 100ms
    #[arg(long)]
    delivery_budget: Option<humantime::Duration>,

    /// Handshake timeout, e.g. 10s
    #[arg(long)]
    handshake_timeout: Option<humantime::Duration>,

    /// Routing counter log interval, e.g. 30s (0s disables)
    #[arg(long)]
    stats_interval: Option<humantime::Duration>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn apply(&self, config: &mut ControllerConfig) {
        if let Some(listen) = self.listen {
            config.listen_addr = listen;
        }
        if let Some(budget) = self.delivery_budget {
            config.delivery_budget = budget.into();
        }
        if let Some(timeout) = self.handshake_timeout {
            config.handshake_timeout = timeout.into();
        }
        if let Some(interval) = self.stats_interval {
            config.stats_interval = interval.into();
        }
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("info")
        .add_directive(format!("ofp_controller={}", args.log_level).parse()?)
        .add_directive(format!("ofp_session={}", args.log_level).parse()?)
        .add_directive(format!("ofp_wire={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(true)
        .event_format(ControllerLogFormatter::new("ofp"))
        .init();

    info!("Starting OpenFlow controller v{}", env!("CARGO_PKG_VERSION"));

    let mut config = ControllerConfig::load_from_file(&args.config)?;
    args.apply(&mut config);

    let mut subscriptions = Subscriptions::new();
    let echo_requests = config
        .echo_responder
        .then(|| subscriptions.subscribe(MessageType::EchoRequest, HELPER_QUEUE_DEPTH));
    let port_updates = config
        .port_status_updater
        .then(|| subscriptions.subscribe(MessageType::PortStatus, HELPER_QUEUE_DEPTH));

    let network = Arc::new(Network::new(config.network_config(), subscriptions));

    if let Some(requests) = echo_requests {
        tokio::spawn(run_echo_responder(network.clone(), requests));
    }
    if let Some(updates) = port_updates {
        tokio::spawn(run_port_status_updater(network.clone(), updates));
    }
    if !config.stats_interval.is_zero() {
        tokio::spawn(report_stats(network.clone(), config.stats_interval));
    }

    let listener = listen_tcp(config.listen_addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to listen on {}: {}", config.listen_addr, e)
    })?;
    info!("Listening for switches on {}", config.listen_addr);

    tokio::select! {
        result = accept_loop(listener, network.clone()) => {
            if let Err(e) = result {
                warn!("Accept loop ended: {}", e);
            }
        }
        result = tokio::signal::ctrl_c() => {
            result.map_err(|e| anyhow::anyhow!("Failed to install Ctrl-C handler: {}", e))?;
            info!("Received Ctrl-C, shutting down");
        }
    }

    network.shutdown().await;
    info!("Controller stopped");
    Ok(())
}

async fn accept_loop(listener: TcpListener, network: Arc<Network>) -> anyhow::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        let network = network.clone();

        tokio::spawn(async move {
            let conn = match Connection::from_tcp(stream) {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Failed to set up connection from {}: {}", addr, e);
                    return;
                }
            };
            debug!("Accepted connection from {}", addr);
            network.accept(conn).await;
        });
    }
}

async fn report_stats(network: Arc<Network>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;

    loop {
        interval.tick().await;
        let stats = network.router_stats();
        let switches = network.len().await;
        info!(
            component = "stats",
            switches,
            replies = stats.replies,
            fanout = stats.fanout_delivered,
            dropped_timeout = stats.dropped_timeout,
            dropped_closed = stats.dropped_closed,
            orphaned = stats.orphaned_replies,
            unrouted = stats.unrouted,
            "Routing counters"
        );
    }
}
