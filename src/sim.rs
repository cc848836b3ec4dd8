//! Simulated converters for dry runs and tests.
//!
//! Both simulators speak the transport traits of `daq-adc`, so the real drivers run
//! against them unchanged.

use daq_adc::mcp3424::{Channel, ConfigRegister, I2cBus, Resolution};
use daq_adc::usb1608g::{
    CalibrationSource, CalibrationTable, Coefficients, Model, Range, ScanEntry, ScanRequest,
    ScanTransport, ANALOG_IN_ADDRESS, ANALOG_OUT_ADDRESS, ANALOG_OUT_CHANNELS,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    #[error("no device at address {0:#04x}")]
    NoDevice(u16),
    #[error("no target address selected")]
    NoAddress,
    #[error("nothing stored at {0:#06x}")]
    Unmapped(u16),
    #[error("no scan running")]
    NotRunning,
}

const BUSY: u8 = 0x80;

/// An MCP3424 with fixed input voltages.
///
/// Each configuration write starts a conversion that reports busy for a fixed number
/// of polls before the result appears.
#[derive(Debug, Clone)]
pub struct SimulatedMcp3424 {
    address: u16,
    selected: Option<u16>,
    inputs: [f64; 4],
    full_scale_volts: f64,
    conversion_polls: u32,
    pending: u32,
    config: ConfigRegister,
}

impl SimulatedMcp3424 {
    pub fn new(address: u16, full_scale_volts: f64) -> Self {
        Self {
            address,
            selected: None,
            inputs: [0.0; 4],
            full_scale_volts,
            conversion_polls: 0,
            pending: 0,
            config: ConfigRegister::default(),
        }
    }

    /// Number of busy replies after each trigger.
    pub fn with_conversion_polls(mut self, polls: u32) -> Self {
        self.conversion_polls = polls;
        self
    }

    pub fn with_inputs(mut self, inputs: [f64; 4]) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn set_input(&mut self, channel: Channel, volts: f64) {
        self.inputs[channel as usize] = volts;
    }

    /// The last configuration byte written, without the start bit.
    pub fn config(&self) -> ConfigRegister {
        self.config
    }

    fn code(&self) -> u32 {
        let resolution = self.config.resolution();
        let max_volts = self.full_scale_volts / f64::from(self.config.pga().factor());
        let volts = self.inputs[self.config.channel() as usize];
        let code = (volts / max_volts * f64::from(resolution.full_scale_code())).round();

        code.clamp(0.0, f64::from(resolution.max_code())) as u32
    }

    fn reply(&self) -> [u8; 4] {
        let code = self.code();
        let mut echo = self.config.to_byte();
        if self.pending > 0 {
            echo |= BUSY;
        }

        match self.config.resolution() {
            Resolution::Bits18 => [
                (code >> 16) as u8 & 0x03,
                (code >> 8) as u8,
                code as u8,
                echo,
            ],
            _ => [(code >> 8) as u8, code as u8, echo, echo],
        }
    }

    fn check_selected(&self) -> Result<(), SimError> {
        match self.selected {
            Some(_) => Ok(()),
            None => Err(SimError::NoAddress),
        }
    }
}

impl I2cBus for SimulatedMcp3424 {
    type Error = SimError;

    fn select(&mut self, address: u16) -> Result<(), SimError> {
        if address != self.address {
            return Err(SimError::NoDevice(address));
        }
        self.selected = Some(address);
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, SimError> {
        self.check_selected()?;

        let Some(&byte) = bytes.first() else {
            return Ok(0);
        };

        self.config = ConfigRegister::from_byte(byte & !BUSY);
        self.pending = self.conversion_polls;

        Ok(bytes.len())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, SimError> {
        self.check_selected()?;

        let reply = self.reply();
        self.pending = self.pending.saturating_sub(1);

        let n = buffer.len().min(reply.len());
        buffer[..n].copy_from_slice(&reply[..n]);
        Ok(n)
    }
}

/// A USB-1608G whose channels sit at fixed voltages.
#[derive(Debug, Clone)]
pub struct SimulatedUsb1608g {
    model: Model,
    calibration: CalibrationTable,
    levels: Vec<f64>,
    entries: Vec<ScanEntry>,
    running: Option<ScanRequest>,
}

impl SimulatedUsb1608g {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            calibration: CalibrationTable::identity(),
            levels: Vec::new(),
            entries: Vec::new(),
            running: None,
        }
    }

    /// Factory calibration stored in the simulated memory. Raw codes are skewed so
    /// that applying the table recovers the input level.
    pub fn with_calibration(mut self, calibration: CalibrationTable) -> Self {
        self.calibration = calibration;
        self
    }

    /// Input voltage of each channel, by channel number.
    pub fn with_levels(mut self, levels: impl Into<Vec<f64>>) -> Self {
        self.levels = levels.into();
        self
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    fn raw(&self, entry: &ScanEntry) -> u16 {
        let volts = self.levels.get(entry.channel as usize).copied().unwrap_or(0.0);
        let range = entry.range;
        let ideal = volts * 32768.0 / range.full_scale() + 32768.0;
        let coefficients = self.calibration.analog_in(range);
        let raw = (ideal - f64::from(coefficients.offset)) / f64::from(coefficients.slope);

        raw.round().clamp(0.0, f64::from(u16::MAX)) as u16
    }

    fn memory(&self, address: u16) -> Option<Vec<u8>> {
        let pairs: Vec<_> = match address {
            ANALOG_IN_ADDRESS => Range::all()
                .map(|range| self.calibration.analog_in(range))
                .collect(),
            ANALOG_OUT_ADDRESS if self.model.has_analog_output() => (0..ANALOG_OUT_CHANNELS)
                .map(|channel| {
                    self.calibration
                        .analog_out(channel)
                        .unwrap_or(Coefficients::IDENTITY)
                })
                .collect(),
            _ => return None,
        };

        Some(
            pairs
                .iter()
                .flat_map(|pair| {
                    let mut bytes = pair.slope.to_le_bytes().to_vec();
                    bytes.extend(pair.offset.to_le_bytes());
                    bytes
                })
                .collect(),
        )
    }
}

impl CalibrationSource for SimulatedUsb1608g {
    type Error = SimError;

    fn read_memory(&mut self, address: u16, buffer: &mut [u8]) -> Result<usize, SimError> {
        let bytes = self.memory(address).ok_or(SimError::Unmapped(address))?;
        let n = buffer.len().min(bytes.len());
        buffer[..n].copy_from_slice(&bytes[..n]);
        Ok(n)
    }
}

impl ScanTransport for SimulatedUsb1608g {
    fn configure_scan(&mut self, entries: &[ScanEntry]) -> Result<(), SimError> {
        self.entries = entries.to_vec();
        Ok(())
    }

    fn start_scan(&mut self, request: &ScanRequest) -> Result<(), SimError> {
        self.running = Some(*request);
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), SimError> {
        self.running = None;
        Ok(())
    }

    fn clear_fifo(&mut self) -> Result<(), SimError> {
        Ok(())
    }

    fn read_scan(&mut self, buffer: &mut [u16]) -> Result<usize, SimError> {
        let request = self.running.ok_or(SimError::NotRunning)?;

        let available = request.count as usize * self.entries.len();
        let words = buffer.len().min(available);

        for (index, word) in buffer[..words].iter_mut().enumerate() {
            *word = self.raw(&self.entries[index % self.entries.len()]);
        }

        Ok(2 * words)
    }
}
