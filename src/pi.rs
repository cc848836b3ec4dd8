//! The logger on a Raspberry Pi, reading MCP3424s through `/dev/i2c-N`.

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use daqlog::config::Config;
use daqlog::logger::{Logger, Mcp3424Source};
use rppal::i2c::I2c;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "daqlog-pi", about = "Log MCP3424 voltages over the Raspberry Pi I2C buses")]
struct Cli {
    /// Logger configuration (TOML).
    #[arg(long)]
    config: PathBuf,

    /// Rounds to log; overrides the configuration.
    #[arg(long)]
    iterations: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    daqlog::init_tracing(&config.logger.log_level);

    if config.usb1608g.is_some() {
        warn!("no USB transport on this build, ignoring [usb1608g]");
    }

    let mut logger = Logger::new();

    for device in &config.mcp3424 {
        let i2c = I2c::with_bus(device.bus)
            .with_context(|| format!("opening /dev/i2c-{}", device.bus))?;

        logger.add(Mcp3424Source::from_config(i2c, device)?);
    }

    ensure!(!logger.is_empty(), "no [[mcp3424]] devices configured");

    let iterations = cli.iterations.or(config.logger.iterations);
    let rounds = logger.run(iterations, config.logger.interval())?;

    info!(rounds, "logging finished");

    Ok(())
}
