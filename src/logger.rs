//! The acquisition loop: every round samples each configured converter once and logs
//! one event per channel.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use daq_adc::mcp3424::{Channel, I2cBus, Mcp3424};
use daq_adc::usb1608g::{Model, ScanTransport, Usb1608g};
use daq_adc::{Classify, Severity, SharedDevice};
use tracing::{debug, info, warn};

use crate::config::{Mcp3424Config, Usb1608gConfig};
use crate::scaling::{channel_names, combine, Scale};

/// Something that produces one voltage per channel each round.
pub trait Source {
    fn name(&self) -> &str;

    fn channel_names(&self) -> Vec<String>;

    fn sample(&mut self) -> Result<Vec<f64>>;
}

/// The four inputs of an MCP3424, optionally paired into two differential values.
pub struct Mcp3424Source<BUS> {
    name: String,
    device: SharedDevice<Mcp3424<BUS>>,
    scale: Scale,
    differential: bool,
}

impl<BUS: I2cBus> Mcp3424Source<BUS> {
    pub fn new(
        name: impl Into<String>,
        device: SharedDevice<Mcp3424<BUS>>,
        scale: Scale,
        differential: bool,
    ) -> Self {
        Self {
            name: name.into(),
            device,
            scale,
            differential,
        }
    }

    /// Builds and configures a driver for the device `config` describes on `bus`.
    pub fn from_config(bus: BUS, config: &Mcp3424Config) -> Result<Self> {
        let resolution = config.resolution()?;
        let pga = config.gain()?;

        let mut adc = Mcp3424::new(bus, config.address, resolution);
        adc.set_pga(pga);
        adc.set_conversion_mode(config.mode.into());
        adc.set_poll_policy(config.poll_policy());

        let name = format!("mcp3424 {}:{:#04x}", config.bus, config.address);

        info!(
            source = %name,
            bits = resolution.bits(),
            pga = pga.factor(),
            differential = config.differential,
            "MCP3424 configured"
        );

        Ok(Self::new(
            name,
            SharedDevice::new(adc),
            Scale::new(resolution, pga, config.full_scale_volts),
            config.differential,
        ))
    }

    /// A handle to the driver shared with this source.
    pub fn device(&self) -> SharedDevice<Mcp3424<BUS>> {
        self.device.clone()
    }
}

impl<BUS: I2cBus> Source for Mcp3424Source<BUS> {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel_names(&self) -> Vec<String> {
        channel_names(self.differential)
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    fn sample(&mut self) -> Result<Vec<f64>> {
        let mut values = [f64::NAN; 4];
        let mut adc = self.device.lock();

        for (value, channel) in values.iter_mut().zip(Channel::all()) {
            match adc.read_raw(channel) {
                Ok(raw) => *value = self.scale.volts(raw),
                Err(error) if error.severity() == Severity::Warning => {
                    warn!(source = %self.name, ?channel, %error, "reading skipped");
                }
                Err(error) => bail!("{channel:?}: {error}"),
            }
        }

        Ok(combine(values, self.differential))
    }
}

/// A USB-1608G scan, reported as the mean of each channel over the scan.
pub struct Usb1608gSource<T: ScanTransport> {
    name: String,
    device: SharedDevice<Usb1608g<T>>,
    sample_rate: f64,
    channels: usize,
    volts: Vec<f64>,
}

impl<T: ScanTransport> Usb1608gSource<T> {
    /// Opens a session on `transport` and configures the scan `config` describes.
    pub fn open(transport: T, model: Model, config: &Usb1608gConfig) -> Result<Self> {
        let mut daq =
            Usb1608g::open(transport, model).map_err(|error| anyhow!("{model}: {error}"))?;

        let ranges = config.ranges();
        daq.configure(config.differential, &ranges, config.sample_count)
            .map_err(|error| anyhow!("{model}: {error}"))?;

        let volts = vec![0.0; daq.raw().len()];

        Ok(Self {
            name: model.to_string(),
            device: SharedDevice::new(daq),
            sample_rate: config.sample_rate,
            channels: ranges.len(),
            volts,
        })
    }

    pub fn device(&self) -> SharedDevice<Usb1608g<T>> {
        self.device.clone()
    }
}

impl<T: ScanTransport> Source for Usb1608gSource<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn channel_names(&self) -> Vec<String> {
        (0..self.channels).map(|i| format!("AI{i}")).collect()
    }

    fn sample(&mut self) -> Result<Vec<f64>> {
        let report = self
            .device
            .lock()
            .read(self.sample_rate, &mut self.volts)
            .map_err(|error| anyhow!("{error}"))?;

        if report.is_short() {
            warn!(
                source = %self.name,
                bytes_read = report.bytes_read,
                bytes_expected = report.bytes_expected,
                "averaging a partial scan"
            );
        }

        let received = &self.volts[..report.values];

        let means = (0..self.channels)
            .map(|channel| {
                let (sum, n) = received
                    .iter()
                    .skip(channel)
                    .step_by(self.channels)
                    .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));

                if n == 0 {
                    f64::NAN
                } else {
                    sum / n as f64
                }
            })
            .collect();

        Ok(means)
    }
}

/// One channel value from one round.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub source: String,
    pub channel: String,
    pub volts: f64,
}

#[derive(Default)]
pub struct Logger {
    sources: Vec<Box<dyn Source>>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source: impl Source + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Samples every source once, in the order they were added.
    pub fn round(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();

        for source in &mut self.sources {
            let values = source
                .sample()
                .with_context(|| format!("sampling {}", source.name()))?;

            for (channel, volts) in source.channel_names().into_iter().zip(values) {
                records.push(Record {
                    source: source.name().to_string(),
                    channel,
                    volts,
                });
            }
        }

        Ok(records)
    }

    /// Runs rounds `interval` apart, forever or for `iterations` rounds, logging every
    /// record. Stops at the first fatal error. Returns the number of completed rounds.
    pub fn run(&mut self, iterations: Option<u64>, interval: Duration) -> Result<u64> {
        let mut completed = 0;

        while iterations.map_or(true, |limit| completed < limit) {
            if completed > 0 {
                std::thread::sleep(interval);
            }

            for record in self.round()? {
                info!(
                    source = %record.source,
                    channel = %record.channel,
                    volts = record.volts,
                    "reading"
                );
            }

            completed += 1;
            debug!(round = completed, "round complete");
        }

        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PollConfig;
    use crate::sim::{SimulatedMcp3424, SimulatedUsb1608g};
    use daq_adc::mcp3424::Resolution;

    fn mcp_config(differential: bool) -> Mcp3424Config {
        Mcp3424Config {
            resolution: 16,
            pga: 2,
            differential,
            full_scale_volts: 2.0,
            ..Mcp3424Config::default()
        }
    }

    fn mcp_sim() -> SimulatedMcp3424 {
        SimulatedMcp3424::new(0x68, 2.0)
            .with_inputs([0.5, 0.25, 0.75, 1.0])
            .with_conversion_polls(1)
    }

    #[test]
    fn mcp3424_single_ended_round() {
        let mut source = Mcp3424Source::from_config(mcp_sim(), &mcp_config(false)).unwrap();

        assert_eq!(source.channel_names(), ["Ch1", "Ch2", "Ch3", "Ch4"]);
        assert_eq!(source.sample().unwrap(), [0.5, 0.25, 0.75, 1.0]);
    }

    #[test]
    fn mcp3424_differential_round() {
        let mut source = Mcp3424Source::from_config(mcp_sim(), &mcp_config(true)).unwrap();

        assert_eq!(source.channel_names(), ["Ch1-2", "Ch3-4"]);
        assert_eq!(source.sample().unwrap(), [0.25, -0.25]);
    }

    #[test]
    fn mcp3424_timeouts_are_skipped() {
        let config = Mcp3424Config {
            poll: PollConfig {
                max_attempts: Some(2),
                ..PollConfig::default()
            },
            ..mcp_config(false)
        };
        let sim = mcp_sim().with_conversion_polls(5);
        let mut source = Mcp3424Source::from_config(sim, &config).unwrap();

        let values = source.sample().unwrap();
        assert_eq!(values.len(), 4);
        assert!(values.iter().all(|v| v.is_nan()));
        assert!(!source.device().lock().status().is_ok());
    }

    #[test]
    fn mcp3424_missing_device_is_fatal() {
        let config = Mcp3424Config {
            address: 0x6C,
            ..mcp_config(false)
        };
        let mut source = Mcp3424Source::from_config(mcp_sim(), &config).unwrap();

        let error = source.sample().unwrap_err();
        assert!(error.to_string().contains("0x6c"));
    }

    #[test]
    fn shared_handle_reads_from_another_thread() {
        let source = Mcp3424Source::from_config(mcp_sim(), &mcp_config(false)).unwrap();
        let device = source.device();

        let raw = std::thread::spawn(move || device.lock().read_raw(Channel::CH4))
            .join()
            .unwrap();

        // Positive full scale at 16 bits.
        assert_eq!(raw, Ok(32_768));
        assert_eq!(
            source.device().lock().config().resolution(),
            Resolution::Bits16
        );
    }

    #[test]
    fn usb1608g_channel_means() {
        let config = Usb1608gConfig {
            ranges: vec![10, 1],
            sample_count: 20,
            ..Usb1608gConfig::default()
        };
        let sim = SimulatedUsb1608g::new(Model::Usb1608G).with_levels([2.5, -0.5]);
        let mut source = Usb1608gSource::open(sim, Model::Usb1608G, &config).unwrap();

        assert_eq!(source.channel_names(), ["AI0", "AI1"]);
        assert_eq!(source.sample().unwrap(), [2.5, -0.5]);
    }

    #[test]
    fn logger_runs_rounds_over_all_sources() {
        let mut logger = Logger::new();
        logger.add(Mcp3424Source::from_config(mcp_sim(), &mcp_config(true)).unwrap());
        logger.add(
            Usb1608gSource::open(
                SimulatedUsb1608g::new(Model::Usb1608GX).with_levels([2.5]),
                Model::Usb1608GX,
                &Usb1608gConfig::default(),
            )
            .unwrap(),
        );
        assert_eq!(logger.len(), 2);

        let records = logger.round().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].source, "mcp3424 1:0x68");
        assert_eq!(records[0].channel, "Ch1-2");
        assert_eq!(records[2].source, "USB-1608GX");
        assert_eq!(records[2].volts, 2.5);

        assert_eq!(logger.run(Some(3), Duration::ZERO).unwrap(), 3);
    }

    #[test]
    fn logger_stops_on_fatal_error() {
        let config = Mcp3424Config {
            address: 0x69,
            ..mcp_config(false)
        };
        let mut logger = Logger::new();
        logger.add(Mcp3424Source::from_config(mcp_sim(), &config).unwrap());

        let error = logger.run(Some(5), Duration::ZERO).unwrap_err();
        assert!(format!("{error:#}").contains("sampling mcp3424 1:0x69"));
    }
}
