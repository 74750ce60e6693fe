//! Command-line argument parsing

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[clap(name = "wifi-provisioner", version, author)]
#[clap(about = "Scan for WiFi networks and provision a peripheral over BLE")]
pub struct CliArgs {
    /// Print machine readable JSON lines instead of log output
    #[clap(long, global = true)]
    pub json: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List nearby networks via wpa_supplicant
    Scan(ScanArgs),

    /// Send WiFi credentials to a peripheral
    Provision(ProvisionArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Wireless network interface name
    #[clap(short, long, default_value = "wlan0")]
    pub interface: String,
}

#[derive(Args, Debug, Clone)]
pub struct ProvisionArgs {
    /// Peripheral address (e.g. AA:BB:CC:DD:EE:FF)
    #[clap(short, long)]
    pub device: String,

    /// Network SSID to provision
    #[clap(short, long)]
    pub ssid: String,

    /// Network passphrase, omit for open networks
    #[clap(short, long, default_value = "")]
    pub password: String,

    /// Connect timeout in milliseconds
    #[clap(long, default_value = "5000")]
    pub connect_timeout_ms: u64,

    /// Handshake timeout in milliseconds
    #[clap(long, default_value = "3000")]
    pub handshake_timeout_ms: u64,

    /// Credential write timeout in milliseconds
    #[clap(long, default_value = "5000")]
    pub write_timeout_ms: u64,

    /// Acknowledgment timeout in milliseconds
    #[clap(long, default_value = "5000")]
    pub ack_timeout_ms: u64,

    /// Retries after connect or handshake timeouts
    #[clap(long, default_value = "2")]
    pub max_retries: u32,

    /// Base retry delay in milliseconds, multiplied by the attempt number
    #[clap(long, default_value = "1000")]
    pub retry_delay_ms: u64,

    /// Talk to a simulated peripheral instead of the radio
    #[clap(long)]
    pub simulate: bool,
}
