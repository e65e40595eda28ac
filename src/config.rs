use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;

use crate::device_client::DEFAULT_DEVICE_PORT;
use crate::device_schema::HardwareVariant;

/// TP-Link Wi-Fi Smart Plug Prometheus exporter
#[derive(Debug, Clone, Parser)]
#[command(version)]
pub struct ExporterConfig {
    /// Target IP Address
    #[arg(short, long, value_name = "ip", env = "HS110_TARGET", value_parser = parse_target_ip)]
    pub target: Ipv4Addr,

    /// Interval in seconds between checking measures
    #[arg(
        short,
        long,
        value_name = "seconds",
        env = "HS110_FREQUENCY",
        default_value_t = 1,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub frequency: u64,

    /// Port for listening
    #[arg(short, long, value_name = "port", env = "HS110_LISTEN_PORT", default_value_t = 8110)]
    pub port: u16,

    /// Port the smart plug answers on
    #[arg(long, value_name = "port", env = "HS110_DEVICE_PORT", default_value_t = DEFAULT_DEVICE_PORT)]
    pub device_port: u16,

    /// Hardware version assumed until the plug answers (h1 or h2)
    #[arg(long, value_name = "version", env = "HS110_HARDWARE", default_value_t = HardwareVariant::Variant2)]
    pub hardware: HardwareVariant,
}

impl ExporterConfig {
    pub fn device_addr(&self) -> SocketAddr {
        SocketAddr::from((self.target, self.device_port))
    }

    pub fn metrics_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.frequency)
    }
}

/// Accepts an IPv4 literal, ignoring surrounding whitespace.
pub fn parse_target_ip(value: &str) -> Result<Ipv4Addr, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("Invalid IP Address {}", value.trim()))
}
