//! Driver for the Microchip MCP3424 four-channel delta-sigma ADC.
//!
//! Every read re-selects the device address, writes the configuration byte for the
//! requested channel and polls the 4-byte output register until the ready flag clears.

use core::fmt::Debug;

use tracing::{debug, trace};

use crate::error::{Classify, ErrorKind, Status};

mod bus;
mod poll;
mod register;

pub use bus::{HalBus, HalBusError, I2cBus};
pub use poll::PollPolicy;
pub use register::{Channel, ConfigRegister, ConversionMode, Gain, Resolution};

/// Length of a conversion reply: up to three data bytes plus the configuration echo.
const REPLY_LEN: usize = 4;

/// Errors from an MCP3424 acquisition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error<E: Debug> {
    /// The bus refused to address the device.
    #[error("select address {address:#04x}: {error:?}")]
    Select { address: u16, error: E },
    /// Writing the configuration byte failed.
    #[error("write: {0:?}")]
    Write(E),
    /// Reading the output register failed.
    #[error("read: {0:?}")]
    Read(E),
    /// The configuration byte was not accepted.
    #[error("failed to write config byte")]
    ShortWrite,
    /// A poll returned fewer than 4 bytes.
    #[error("failed to read 4 byte reading, got {actual}")]
    ShortRead { actual: usize },
    /// The poll policy ran out before the conversion completed.
    #[error("conversion not ready after {attempts} polls")]
    NotReady { attempts: u32 },
}

impl<E: Debug> Classify for Error<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Select { .. } | Self::Write(_) | Self::Read(_) => ErrorKind::Io,
            Self::ShortWrite | Self::ShortRead { .. } => ErrorKind::PartialIo,
            Self::NotReady { .. } => ErrorKind::Timeout,
        }
    }
}

/// MCP3424 driver
pub struct Mcp3424<BUS> {
    bus: BUS,
    address: u16,
    config: ConfigRegister,
    poll: PollPolicy,
    status: Status,
}

impl<BUS: I2cBus> Mcp3424<BUS> {
    /// Creates a driver for the device at `address`.
    ///
    /// The device starts out on channel 1 in one-shot mode with unity gain. Nothing is
    /// sent on the bus until the first read.
    pub fn new(bus: BUS, address: u16, resolution: Resolution) -> Self {
        Self {
            bus,
            address,
            config: ConfigRegister::new(
                Channel::CH1,
                ConversionMode::OneShot,
                Gain::X1,
                resolution,
            ),
            poll: PollPolicy::default(),
            status: Status::default(),
        }
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    /// The in-memory copy of the configuration register.
    pub fn config(&self) -> ConfigRegister {
        self.config
    }

    pub fn set_conversion_mode(&mut self, mode: ConversionMode) {
        self.config.set_conversion_mode(mode);
    }

    pub fn set_pga(&mut self, pga: Gain) {
        self.config.set_pga(pga);
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.config.set_resolution(resolution);
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    pub fn set_poll_policy(&mut self, policy: PollPolicy) {
        self.poll = policy;
    }

    /// Details of the most recent failed read.
    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn clear_status(&mut self) {
        self.status.clear();
    }

    /// Destroys the driver and returns the bus.
    pub fn free(self) -> BUS {
        self.bus
    }

    /// Converts `channel` and returns the raw code, masked to the current resolution.
    ///
    /// In one-shot mode this triggers a new conversion. Blocks until the device reports
    /// the result ready, within the limits of the [`PollPolicy`].
    pub fn read_raw(&mut self, channel: Channel) -> Result<u32, Error<BUS::Error>> {
        let result = self.acquire(channel);
        self.status.track(result)
    }

    fn acquire(&mut self, channel: Channel) -> Result<u32, Error<BUS::Error>> {
        let address = self.address;
        self.bus
            .select(address)
            .map_err(|error| Error::Select { address, error })?;

        // Always rewritten: the device may have been reconfigured behind our back.
        self.config.set_channel(channel);

        if self.config.conversion_mode() == ConversionMode::OneShot {
            self.config.arm_start();
        }

        let written = self.bus.write(&[self.config.to_byte()]);
        self.config.clear_start();

        if written.map_err(Error::Write)? == 0 {
            return Err(Error::ShortWrite);
        }

        debug!(
            address,
            channel = ?channel,
            config = self.config.to_byte(),
            "MCP3424 conversion requested"
        );

        let reply = self.wait_for_conversion()?;

        Ok(self.config.resolution().decode(&reply))
    }

    fn wait_for_conversion(&mut self) -> Result<[u8; REPLY_LEN], Error<BUS::Error>> {
        let resolution = self.config.resolution();
        let mut state = self.poll.start();
        let mut reply = [0; REPLY_LEN];

        loop {
            let received = self.bus.read(&mut reply).map_err(Error::Read)?;
            state.record_attempt();

            if received < REPLY_LEN {
                return Err(Error::ShortRead { actual: received });
            }

            if resolution.is_ready(&reply) {
                trace!(attempts = state.attempts(), reply = ?reply, "MCP3424 reply ready");
                return Ok(reply);
            }

            if !state.wait_for_next() {
                return Err(Error::NotReady {
                    attempts: state.attempts(),
                });
            }
        }
    }
}
