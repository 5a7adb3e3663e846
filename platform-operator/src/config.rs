//! CLI surface and process-wide config singleton, grounded on the
//! `UpgradeOperatorConfig`/`CliArgs` shape in
//! `operators/src/upgrade/config.rs` (`clap::Parser` derive, a single
//! `once_cell::sync::OnceCell` initialized once at startup).

use clap::Parser;
use once_cell::sync::OnceCell;
use std::time::Duration;

static CONFIG: OnceCell<OperatorConfig> = OnceCell::new();

/// Operator process startup flags (not the end-user CLI).
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct CliArgs {
    /// Listener address for the metrics endpoint.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub metrics_addr: String,

    /// Listener address for the health endpoint.
    #[arg(long, default_value = "0.0.0.0:8081")]
    pub health_addr: String,

    /// Listener port for the admission/conversion webhook server.
    #[arg(long, default_value_t = 9443)]
    pub webhook_port: u16,

    /// Enable HA leader-election coordination.
    #[arg(long, default_value_t = false)]
    pub leader_elect: bool,

    /// Namespace where the leader-election coordination record lives.
    #[arg(long, default_value = "observability-platform-system")]
    pub leader_election_namespace: String,

    /// Reconcile long-interval ceiling, e.g. "60s".
    #[arg(long, default_value = "60s", value_parser = humantime::parse_duration)]
    pub sync_period: Duration,

    /// One of debug, info, warn, error.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl CliArgs {
    pub fn args() -> Self {
        CliArgs::parse()
    }
}

pub struct OperatorConfig {
    args: CliArgs,
}

impl OperatorConfig {
    /// Initializes the process-wide config. Called once from `main`.
    pub fn initialize(args: CliArgs) {
        CONFIG.get_or_init(|| Self { args });
    }

    pub fn get() -> &'static OperatorConfig {
        CONFIG.get().expect("operator config is not initialized")
    }

    pub fn sync_period(&self) -> Duration {
        self.args.sync_period
    }

    pub fn leader_election_namespace(&self) -> &str {
        &self.args.leader_election_namespace
    }

    pub fn webhook_port(&self) -> u16 {
        self.args.webhook_port
    }

    pub fn metrics_addr(&self) -> &str {
        &self.args.metrics_addr
    }

    pub fn health_addr(&self) -> &str {
        &self.args.health_addr
    }

    pub fn log_level(&self) -> &str {
        &self.args.log_level
    }
}

/// The three-tier requeue intervals, derived from a single `sync-period`
/// flag rather than three independently configurable durations.
pub struct RequeueIntervals {
    pub short: Duration,
    pub medium: Duration,
    pub long: Duration,
}

impl RequeueIntervals {
    pub fn from_sync_period(sync_period: Duration) -> Self {
        Self {
            short: Duration::from_secs(5),
            medium: Duration::from_secs(30),
            long: sync_period,
        }
    }
}
