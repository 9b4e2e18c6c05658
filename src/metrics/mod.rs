// metrics/mod.rs
use ::metrics::counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

pub const COMMANDS_TOTAL: &str = "gateway_commands_total";
pub const STATUS_REQUESTS_TOTAL: &str = "gateway_status_requests_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Executed,
    NoMatch,
    Rejected,
}

impl CommandOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandOutcome::Executed => "executed",
            CommandOutcome::NoMatch => "no_match",
            CommandOutcome::Rejected => "rejected",
        }
    }
}

/// Installs the global recorder and serves `/metrics` on `port`.
pub fn setup_metrics(port: u16) -> Result<(), BuildError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()
}

pub fn record_command(outcome: CommandOutcome) {
    counter!(COMMANDS_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

pub fn record_status_request() {
    counter!(STATUS_REQUESTS_TOTAL).increment(1);
}
