//! Configuration handling for the controller service.
//!
//! Values are layered: built-in defaults, then the shared YAML config file,
//! then `OFP_*` environment variables. Command-line flags are applied on top
//! by `main`.

use anyhow::Result;
use ofp_session::NetworkConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Controller service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Address switches connect to
    pub listen_addr: SocketAddr,
    /// Router wait budget per recipient
    pub delivery_budget: Duration,
    /// Bound on the HELLO/FEATURES exchange
    pub handshake_timeout: Duration,
    /// Outbound queue capacity per switch
    pub outbound_queue_depth: usize,
    /// How often router counters are logged; zero disables
    pub stats_interval: Duration,
    /// Answer switch echo requests
    pub echo_responder: bool,
    /// Apply PORT_STATUS notifications to port tables
    pub port_status_updater: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        let network = NetworkConfig::default();
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 6653)),
            delivery_budget: network.delivery_budget,
            handshake_timeout: network.handshake_timeout,
            outbound_queue_depth: network.outbound_queue_depth,
            stats_interval: Duration::from_secs(30),
            echo_responder: true,
            port_status_updater: true,
        }
    }
}

/// Root configuration structure (matches the YAML structure)
#[derive(Debug, Deserialize)]
struct RootConfig {
    services: Option<ServicesConfig>,
}

#[derive(Debug, Deserialize)]
struct ServicesConfig {
    controller: Option<ServiceConfig>,
}

#[derive(Debug, Deserialize)]
struct ServiceConfig {
    args: Option<Vec<String>>,
    config: Option<HashMap<String, String>>,
}

impl ControllerConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config = Self::default();

        match std::fs::read_to_string(&config_path) {
            Ok(content) => match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root_config) => {
                    config.apply_root_config(root_config);
                    info!("Loaded configuration from {:?}", config_path.as_ref());
                }
                Err(e) => warn!(
                    "Failed to parse config file {:?}, using defaults: {}",
                    config_path.as_ref(),
                    e
                ),
            },
            Err(_) => warn!(
                "Config file {:?} not found, using defaults",
                config_path.as_ref()
            ),
        }

        config.apply_environment_overrides();

        info!(
            "Final controller configuration: listen={}, delivery_budget={:?}, handshake_timeout={:?}, queue_depth={}",
            config.listen_addr,
            config.delivery_budget,
            config.handshake_timeout,
            config.outbound_queue_depth
        );

        Ok(config)
    }

    /// Settings for the session core
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            delivery_budget: self.delivery_budget,
            handshake_timeout: self.handshake_timeout,
            outbound_queue_depth: self.outbound_queue_depth.max(1),
        }
    }

    fn apply_root_config(&mut self, root_config: RootConfig) {
        if let Some(service) = root_config.services.and_then(|s| s.controller) {
            self.apply_service_config(service);
        }
    }

    fn apply_service_config(&mut self, service_config: ServiceConfig) {
        if let Some(args) = service_config.args {
            for arg in args {
                if let Some(value) = arg.strip_prefix("--listen=") {
                    self.set("listen_addr", value);
                }
            }
        }

        if let Some(config_map) = service_config.config {
            for (key, value) in config_map {
                match key.strip_prefix("services.controller.") {
                    Some(name) => {
                        self.set(name, &value);
                    }
                    None => warn!("Ignoring configuration key {}", key),
                }
            }
        }
    }

    fn apply_environment_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        const OVERRIDES: &[(&str, &str)] = &[
            ("OFP_LISTEN_ADDR", "listen_addr"),
            ("OFP_DELIVERY_BUDGET", "delivery_budget"),
            ("OFP_HANDSHAKE_TIMEOUT", "handshake_timeout"),
            ("OFP_OUTBOUND_QUEUE_DEPTH", "outbound_queue_depth"),
            ("OFP_STATS_INTERVAL", "stats_interval"),
        ];

        for (var, name) in OVERRIDES {
            if let Some(value) = lookup(var) {
                if self.set(name, &value) {
                    info!("{} overridden by environment: {}", name, value);
                }
            }
        }
    }

    /// Set one named value; malformed values are logged and ignored
    fn set(&mut self, name: &str, value: &str) -> bool {
        let applied = match name {
            "listen_addr" => value.parse::<SocketAddr>().map(|v| self.listen_addr = v).is_ok(),
            "delivery_budget" => parse_duration(value).map(|v| self.delivery_budget = v).is_some(),
            "handshake_timeout" => parse_duration(value)
                .map(|v| self.handshake_timeout = v)
                .is_some(),
            "outbound_queue_depth" => value
                .parse::<usize>()
                .ok()
                .filter(|&depth| depth > 0)
                .map(|v| self.outbound_queue_depth = v)
                .is_some(),
            "stats_interval" => parse_duration(value).map(|v| self.stats_interval = v).is_some(),
            "echo_responder" => value.parse::<bool>().map(|v| self.echo_responder = v).is_ok(),
            "port_status_updater" => value.parse::<bool>().map(|v| self.port_status_updater = v).is_ok(),
            _ => {
                warn!("Unknown configuration key {}", name);
                return false;
            }
        };

        if !applied {
            warn!("Invalid value {:?} for {}, keeping {}", value, name, self.describe(name));
        }
        applied
    }

    fn describe(&self, name: &str) -> String {
        match name {
            "listen_addr" => self.listen_addr.to_string(),
            "delivery_budget" => humantime::format_duration(self.delivery_budget).to_string(),
            "handshake_timeout" => humantime::format_duration(self.handshake_timeout).to_string(),
            "outbound_queue_depth" => self.outbound_queue_depth.to_string(),
            "stats_interval" => humantime::format_duration(self.stats_interval).to_string(),
            "echo_responder" => self.echo_responder.to_string(),
            "port_status_updater" => self.port_status_updater.to_string(),
            _ => String::new(),
        }
    }
}

fn parse_duration(value: &str) -> Option<Duration> {
    humantime::parse_duration(value.trim()).ok()
}
