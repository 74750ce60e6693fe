//! WiFi Provisioner - Main Entry Point

use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wifi_provisioner::{
    backend::WifiCtrlBackend,
    config::{CliArgs, Command, ProvisionArgs, ProvisioningSettings, ScanArgs},
    core::{
        coordinator::SessionCoordinator, progress::ProgressObserver, scanner::ScanService,
        types::DeviceHandle,
    },
    transport::{SimulatedPeripheral, Transport},
    Outcome, ProgressEvent,
};

/// Prints progress either as JSON lines or as log output
struct ConsoleReporter {
    json: bool,
}

impl ProgressObserver for ConsoleReporter {
    fn on_progress(&self, event: &ProgressEvent) {
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!("Failed to serialize progress event: {}", e),
            }
            return;
        }

        match event {
            ProgressEvent::StateChanged { attempt, state } => {
                info!(attempt, ?state, "Provisioning progress")
            }
            ProgressEvent::RetryScheduled { attempt, delay } => {
                info!(attempt, ?delay, "Retry scheduled")
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wifi_provisioner=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    match args.command {
        Command::Scan(scan) => run_scan(scan, args.json).await,
        Command::Provision(provision) => {
            info!(
                device = %provision.device,
                ssid = %provision.ssid,
                simulate = provision.simulate,
                "Starting WiFi provisioning"
            );

            if provision.simulate {
                Ok(run_provision(SimulatedPeripheral::new(), &provision, args.json).await)
            } else {
                run_ble_provision(&provision, args.json).await
            }
        }
    }
}

#[cfg(feature = "bluez")]
async fn run_ble_provision(
    args: &ProvisionArgs,
    json: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let transport = wifi_provisioner::transport::ble::BluerTransport::new().await?;
    Ok(run_provision(transport, args, json).await)
}

#[cfg(not(feature = "bluez"))]
async fn run_ble_provision(
    _args: &ProvisionArgs,
    _json: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    error!("Built without BLE support, rerun with --simulate or enable the bluez feature");
    Err("BLE support not compiled in".into())
}

async fn run_scan(args: ScanArgs, json: bool) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let backend = Arc::new(WifiCtrlBackend::new(args.interface.clone()).await?);
    info!("Scan backend initialized for interface: {}", args.interface);

    let networks = ScanService::new(backend).scan().await?;

    if json {
        println!("{}", serde_json::to_string(&networks)?);
    } else if networks.is_empty() {
        println!("No networks found.");
    } else {
        for network in &networks {
            println!(
                "{:<32}  {:>4} dBm  ch {:<3}  {}",
                network.ssid, network.rssi, network.channel, network.mac
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_provision<T: Transport>(transport: T, args: &ProvisionArgs, json: bool) -> ExitCode {
    let coordinator = Arc::new(SessionCoordinator::new(
        transport,
        DeviceHandle::new(args.device.as_str()),
        ProvisioningSettings::from(args),
    ));
    coordinator.subscribe(Arc::new(ConsoleReporter { json })).await;

    let interrupt = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received SIGINT (Ctrl+C), cancelling");
                    coordinator.cancel();
                }
                Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
            }
        })
    };

    let outcome = coordinator.provision(&args.ssid, &args.password).await;
    interrupt.abort();

    if json {
        match serde_json::to_string(&outcome) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("Failed to serialize outcome: {}", e),
        }
    }

    match outcome {
        Outcome::Success => {
            info!(ssid = %args.ssid, "Credentials accepted by peripheral");
            ExitCode::SUCCESS
        }
        Outcome::Failure(reason) => {
            error!(?reason, "Provisioning failed: {}", reason);
            ExitCode::FAILURE
        }
    }
}
