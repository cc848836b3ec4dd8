//! Dry run of the logger against simulated converters.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use daq_adc::usb1608g::Model;
use daqlog::config::{Config, Mcp3424Config, Usb1608gConfig};
use daqlog::logger::{Logger, Mcp3424Source, Usb1608gSource};
use daqlog::sim::{SimulatedMcp3424, SimulatedUsb1608g};
use tracing::info;

#[derive(Parser)]
#[command(name = "daqlog", about = "Log converter voltages from simulated devices")]
struct Cli {
    /// Logger configuration (TOML). Without it one MCP3424 and one USB-1608G are simulated.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rounds to log; overrides the configuration.
    #[arg(long)]
    iterations: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config {
            mcp3424: vec![Mcp3424Config::default()],
            usb1608g: Some(Usb1608gConfig {
                differential: true,
                ranges: vec![10, 5, 2, 1],
                ..Usb1608gConfig::default()
            }),
            ..Config::default()
        },
    };

    daqlog::init_tracing(&config.logger.log_level);

    let mut logger = Logger::new();

    for device in &config.mcp3424 {
        let max_volts = device.full_scale_volts / f64::from(device.pga);
        let inputs = [0.1, 0.35, 0.6, 0.85].map(|fraction| fraction * max_volts);
        let sim = SimulatedMcp3424::new(device.address, device.full_scale_volts)
            .with_inputs(inputs)
            .with_conversion_polls(2);

        logger.add(Mcp3424Source::from_config(sim, device)?);
    }

    if let Some(usb) = &config.usb1608g {
        let levels: Vec<f64> = (0..usb.ranges.len())
            .map(|channel| 0.25 * channel as f64 - 0.5)
            .collect();
        let sim = SimulatedUsb1608g::new(Model::Usb1608G).with_levels(levels);

        logger.add(Usb1608gSource::open(sim, Model::Usb1608G, usb)?);
    }

    info!(sources = logger.len(), "starting dry run");

    let iterations = cli.iterations.or(config.logger.iterations);
    let rounds = logger.run(iterations, config.logger.interval())?;

    info!(rounds, "dry run finished");

    Ok(())
}
