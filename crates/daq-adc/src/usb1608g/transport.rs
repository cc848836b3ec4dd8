use core::fmt::Debug;

use super::scan::ScanEntry;

/// Reads the device's non-volatile memory, where the factory calibration lives.
pub trait CalibrationSource {
    type Error: Debug;

    /// Reads `buffer.len()` bytes starting at `address` and returns how many arrived.
    fn read_memory(&mut self, address: u16, buffer: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Parameters of an analog input scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanRequest {
    /// Samples per channel; 0 means continuous.
    pub count: u32,
    /// Samples per trigger in retrigger mode.
    pub retrigger_count: u32,
    /// Pacer frequency in Hz.
    pub frequency: f64,
    /// Trigger option bits; 0 free-runs.
    pub options: u8,
}

impl ScanRequest {
    /// A free-running scan of `count` samples per channel.
    pub fn free_run(count: u32, frequency: f64) -> Self {
        Self {
            count,
            retrigger_count: 0,
            frequency,
            options: 0,
        }
    }
}

/// Analog input commands of the USB-1608G.
///
/// Implementations own the USB handle and do the control/bulk framing; the session
/// sequences these commands.
pub trait ScanTransport: CalibrationSource {
    /// Loads the scan list.
    fn configure_scan(&mut self, entries: &[ScanEntry]) -> Result<(), Self::Error>;

    fn start_scan(&mut self, request: &ScanRequest) -> Result<(), Self::Error>;

    fn stop_scan(&mut self) -> Result<(), Self::Error>;

    /// Discards any samples left in the device FIFO.
    fn clear_fifo(&mut self) -> Result<(), Self::Error>;

    /// Reads interleaved samples into `buffer` and returns the number of bytes received.
    fn read_scan(&mut self, buffer: &mut [u16]) -> Result<usize, Self::Error>;
}
