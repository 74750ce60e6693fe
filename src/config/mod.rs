//! Configuration module

pub mod cli;
pub mod settings;

pub use cli::{CliArgs, Command, ProvisionArgs, ScanArgs};
pub use settings::{ProvisioningSettings, Timeouts};
