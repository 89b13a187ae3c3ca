//! usbh-enum
//!
//! Watches the USB host controller and reports the configuration descriptor
//! of every device that is plugged in.

use anyhow::{Context, Result};
use clap::Parser;
use common::setup_logging;
use descriptor::RawConfiguration;
use host::config::{HostConfig, OutputFormat};
use host::usb::{DescriptorSink, HostController, JsonSink, LoggingSink, RusbHost, UsbHost};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "usbh-enum")]
#[command(
    author,
    version,
    about = "USB host enumeration - dump the descriptors of attached devices"
)]
#[command(long_about = "
Registers with the USB host controller, opens every device that is attached
and reports its active configuration descriptor.

EXAMPLES:
    # Dump every attached and newly plugged device
    usbh-enum

    # Emit one JSON document per device on stdout
    usbh-enum --format json

    # Only report devices plugged in from now on, stop after a minute
    usbh-enum --no-enumerate --duration 60

CONFIGURATION:
    The configuration file is looked up in the following order:
    1. Path specified with --config
    2. ~/.config/usbh-enum/host.toml
    3. /etc/usbh-enum/host.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Output format for enumerated configurations
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Exit after this many seconds
    #[arg(short, long, value_name = "SECS")]
    duration: Option<u64>,

    /// Ignore devices that are already attached at startup
    #[arg(long)]
    no_enumerate: bool,
}

/// Sink selected by the output format
enum Output {
    Text(LoggingSink),
    Json(JsonSink),
}

impl Output {
    fn new(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => Output::Text(LoggingSink),
            OutputFormat::Json => Output::Json(JsonSink::stdout()),
        }
    }
}

impl DescriptorSink for Output {
    fn on_configuration(&mut self, config: &RawConfiguration<'_>) {
        match self {
            Output::Text(sink) => sink.on_configuration(config),
            Output::Json(sink) => sink.on_configuration(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = HostConfig::default();
        let path = args.config.unwrap_or_else(HostConfig::default_path);
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(ref path) = args.config {
        HostConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        HostConfig::load_or_default()
    };

    // Command line overrides
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if args.no_enumerate {
        config.client.enumerate_attached = false;
    }
    if let Some(level) = args.log_level {
        config.host.log_level = level;
    }
    config.validate().context("Invalid configuration")?;

    setup_logging(&config.host.log_level).context("Failed to setup logging")?;

    info!("usbh-enum v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", config.host.log_level);

    let mut usb = UsbHost::setup(
        RusbHost::new(),
        &config.host_settings(),
        Output::new(config.output.format),
    )
    .context("Failed to set up USB host")?;

    let result = run(
        &mut usb,
        config.pump.poll_interval(),
        args.duration.map(Duration::from_secs),
    )
    .await;

    info!("Shutting down USB host...");
    usb.shutdown().context("Failed to shut down USB host")?;

    result
}

/// Pump the host until Ctrl+C or the run duration elapses
async fn run<H, S>(
    usb: &mut UsbHost<H, S>,
    poll_interval: Duration,
    duration: Option<Duration>,
) -> Result<()>
where
    H: HostController,
    S: DescriptorSink,
{
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    info!("Press Ctrl+C to stop");

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                match result {
                    Ok(()) => info!("Received Ctrl+C, shutting down gracefully..."),
                    Err(e) => error!("Error waiting for Ctrl+C: {}", e),
                }
                break;
            }
            _ = &mut deadline => {
                info!("Run duration elapsed");
                break;
            }
            _ = ticker.tick() => {
                usb.pump();
            }
        }
    }

    Ok(())
}
