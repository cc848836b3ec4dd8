//! Logger configuration, read from a TOML file.
//!
//! ```toml
//! [logger]
//! interval_ms = 1000
//! iterations = 10
//! log_level = "info"
//!
//! [[mcp3424]]
//! bus = 1
//! address = 0x68
//! resolution = 18
//! pga = 1
//! mode = "one-shot"
//! differential = false
//! full_scale_volts = 2.048
//! poll = { max_attempts = 100, interval_ms = 5 }
//!
//! [usb1608g]
//! differential = true
//! ranges = [10, 10, 5, 1]
//! sample_count = 100
//! sample_rate = 1000.0
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use daq_adc::mcp3424::{ConversionMode, Gain, PollPolicy, Resolution};
use daq_adc::usb1608g::Range;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub logger: LoggerConfig,
    pub mcp3424: Vec<Mcp3424Config>,
    pub usb1608g: Option<Usb1608gConfig>,
}

impl Config {
    /// Reads and validates the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (index, device) in self.mcp3424.iter().enumerate() {
            device
                .validate()
                .with_context(|| format!("mcp3424[{index}]"))?;
        }

        if let Some(usb) = &self.usb1608g {
            usb.validate().context("usb1608g")?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggerConfig {
    /// Pause between logging rounds.
    pub interval_ms: u64,
    /// Rounds to run; `None` runs until interrupted.
    pub iterations: Option<u64>,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl LoggerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            iterations: None,
            log_level: "info".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    #[default]
    OneShot,
    Continuous,
}

impl From<Mode> for ConversionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::OneShot => Self::OneShot,
            Mode::Continuous => Self::Continuous,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollConfig {
    pub max_attempts: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub interval_ms: Option<u64>,
}

impl From<PollConfig> for PollPolicy {
    fn from(poll: PollConfig) -> Self {
        Self {
            max_attempts: poll.max_attempts,
            timeout: poll.timeout_ms.map(Duration::from_millis),
            interval: poll.interval_ms.map(Duration::from_millis),
        }
    }
}

/// One MCP3424 on an I2C bus.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Mcp3424Config {
    /// Linux I2C bus number (`/dev/i2c-N`).
    pub bus: u8,
    pub address: u16,
    /// Bit depth: 12, 14, 16 or 18.
    pub resolution: u8,
    /// Gain factor: 1, 2, 4 or 8.
    pub pga: u8,
    pub mode: Mode,
    /// Report `ch1 - ch2` and `ch3 - ch4` instead of four channels.
    pub differential: bool,
    /// Input voltage that maps to the positive full-scale code at unity gain.
    pub full_scale_volts: f64,
    pub poll: PollConfig,
}

impl Mcp3424Config {
    pub fn resolution(&self) -> Result<Resolution> {
        match Resolution::from_bits(self.resolution) {
            Some(resolution) => Ok(resolution),
            None => bail!(
                "resolution must be 12, 14, 16 or 18 bits, got {}",
                self.resolution
            ),
        }
    }

    pub fn gain(&self) -> Result<Gain> {
        match Gain::from_factor(self.pga) {
            Some(gain) => Ok(gain),
            None => bail!("pga must be 1, 2, 4 or 8, got {}", self.pga),
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll.into()
    }

    pub fn validate(&self) -> Result<()> {
        self.resolution()?;
        self.gain()?;

        if self.address > 0x7F {
            bail!("address {:#x} does not fit in 7 bits", self.address);
        }
        if !self.full_scale_volts.is_finite() || self.full_scale_volts <= 0.0 {
            bail!(
                "full_scale_volts must be positive and finite, got {}",
                self.full_scale_volts
            );
        }

        Ok(())
    }
}

impl Default for Mcp3424Config {
    fn default() -> Self {
        Self {
            bus: 1,
            address: 0x68,
            resolution: 12,
            pga: 1,
            mode: Mode::OneShot,
            differential: false,
            full_scale_volts: 2.048,
            poll: PollConfig::default(),
        }
    }
}

/// The USB-1608G scan.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Usb1608gConfig {
    pub differential: bool,
    /// Full-scale volts per channel: 10, 5, 2 or 1.
    pub ranges: Vec<u8>,
    /// Samples per channel per read.
    pub sample_count: usize,
    /// Hz.
    pub sample_rate: f64,
}

impl Usb1608gConfig {
    /// Channel ranges in scan order. Unknown values fall back to ±10 V.
    pub fn ranges(&self) -> Vec<Range> {
        self.ranges
            .iter()
            .enumerate()
            .map(|(channel, &volts)| {
                Range::from_volts(volts).unwrap_or_else(|| {
                    warn!(channel, volts, "unknown range, using ±10 V");
                    Range::Bipolar10V
                })
            })
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.ranges.is_empty() {
            bail!("at least one channel range is required");
        }
        if self.sample_count == 0 {
            bail!("sample_count must be greater than 0");
        }
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            bail!(
                "sample_rate must be positive and finite, got {}",
                self.sample_rate
            );
        }

        Ok(())
    }
}

impl Default for Usb1608gConfig {
    fn default() -> Self {
        Self {
            differential: false,
            ranges: vec![10],
            sample_count: 100,
            sample_rate: 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.logger.interval(), Duration::from_secs(1));
    }

    #[test]
    fn loads_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [logger]
            interval_ms = 250
            iterations = 3
            log_level = "debug"

            [[mcp3424]]
            address = 0x6A
            resolution = 18
            pga = 4
            mode = "continuous"
            differential = true
            poll = {{ max_attempts = 10, interval_ms = 2 }}

            [[mcp3424]]
            bus = 0

            [usb1608g]
            differential = true
            ranges = [10, 5, 2, 1]
            sample_count = 50
            sample_rate = 500.0
            "#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.logger.iterations, Some(3));
        assert_eq!(config.logger.log_level, "debug");

        let first = &config.mcp3424[0];
        assert_eq!(first.address, 0x6A);
        assert_eq!(first.resolution().unwrap(), Resolution::Bits18);
        assert_eq!(first.gain().unwrap(), Gain::X4);
        assert_eq!(ConversionMode::from(first.mode), ConversionMode::Continuous);
        assert_eq!(
            first.poll_policy(),
            PollPolicy::attempts(10).with_interval(Duration::from_millis(2))
        );

        assert_eq!(config.mcp3424[1].bus, 0);
        assert_eq!(config.mcp3424[1].poll_policy(), PollPolicy::unbounded());

        let usb = config.usb1608g.unwrap();
        assert_eq!(
            usb.ranges(),
            [
                Range::Bipolar10V,
                Range::Bipolar5V,
                Range::Bipolar2V,
                Range::Bipolar1V
            ]
        );
    }

    #[test]
    fn rejects_bad_resolution_and_gain() {
        let error = Config::parse("[[mcp3424]]\nresolution = 10").unwrap_err();
        assert!(format!("{error:#}").contains("12, 14, 16 or 18"));

        let error = Config::parse("[[mcp3424]]\npga = 3").unwrap_err();
        assert!(format!("{error:#}").contains("pga"));

        assert!(Config::parse("[[mcp3424]]\naddress = 0x80").is_err());
    }

    #[test]
    fn unknown_range_falls_back_to_10v() {
        let config = Config::parse("[usb1608g]\nranges = [3, 1]").unwrap();
        assert_eq!(
            config.usb1608g.unwrap().ranges(),
            [Range::Bipolar10V, Range::Bipolar1V]
        );
    }

    #[test]
    fn rejects_empty_scan() {
        assert!(Config::parse("[usb1608g]\nranges = []").is_err());
        assert!(Config::parse("[usb1608g]\nsample_count = 0").is_err());
        assert!(Config::parse("[usb1608g]\nsample_rate = -1.0").is_err());
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        let error = Config::load(&path).unwrap_err();
        assert!(error.to_string().contains("missing.toml"));
    }
}
