//! Driver for the Measurement Computing USB-1608G multi-channel ADC family.
//!
//! A [`Usb1608g`] session reads the factory calibration when it opens, keeps the scan
//! list and raw sample buffer configured by [`Usb1608g::configure`], and turns each
//! [`Usb1608g::read`] into calibrated voltages. Closing the session, explicitly or by
//! dropping it, stops the scan and clears the device FIFO.

use core::fmt::Debug;

use tracing::{debug, info, warn};

use crate::error::{Classify, ErrorKind, Status};

mod calibration;
mod model;
mod scan;
mod transport;

pub use calibration::{
    CalibrationError, CalibrationTable, Coefficients, ANALOG_IN_ADDRESS, ANALOG_OUT_ADDRESS,
    ANALOG_OUT_CHANNELS,
};
pub use model::{Model, VENDOR_ID};
pub use scan::{InputMode, Range, ScanConfiguration, ScanEntry, ScanError, LAST_CHANNEL};
pub use transport::{CalibrationSource, ScanRequest, ScanTransport};

/// Errors from a USB-1608G session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error<E: Debug> {
    /// A device command failed.
    #[error("{operation}: {error:?}")]
    Transport { operation: &'static str, error: E },
    #[error("{0}")]
    Calibration(CalibrationError<E>),
    #[error("{0}")]
    Scan(#[from] ScanError),
    /// `read` was called before `configure`.
    #[error("no memory for buffer; configure the scan first")]
    NotConfigured,
    /// The output slice does not match the raw buffer.
    #[error("output holds {actual} values, scan produces {expected}")]
    OutputLength { expected: usize, actual: usize },
    /// The raw transfer came back short. Reported through [`Status`] only.
    #[error("n bytes read = {actual}, should be {expected}")]
    ShortScan { expected: usize, actual: usize },
}

impl<E: Debug> Classify for Error<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } | Self::Calibration(CalibrationError::Read { .. }) => {
                ErrorKind::Io
            }
            Self::Calibration(CalibrationError::Short { .. }) | Self::ShortScan { .. } => {
                ErrorKind::PartialIo
            }
            Self::Calibration(CalibrationError::NotFinite { .. }) => ErrorKind::InvalidState,
            Self::Scan(_) | Self::NotConfigured | Self::OutputLength { .. } => ErrorKind::Usage,
        }
    }
}

impl<E: Debug> From<CalibrationError<E>> for Error<E> {
    fn from(error: CalibrationError<E>) -> Self {
        Self::Calibration(error)
    }
}

fn io<E: Debug>(operation: &'static str) -> impl FnOnce(E) -> Error<E> {
    move |error| Error::Transport { operation, error }
}

/// Outcome of a [`Usb1608g::read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadReport {
    /// Bytes a complete scan delivers.
    pub bytes_expected: usize,
    /// Bytes the device actually delivered.
    pub bytes_read: usize,
    /// Output values written; the rest of the output slice is untouched.
    pub values: usize,
}

impl ReadReport {
    pub fn is_short(&self) -> bool {
        self.bytes_read < self.bytes_expected
    }
}

/// An open USB-1608G.
pub struct Usb1608g<T: ScanTransport> {
    transport: T,
    model: Model,
    calibration: CalibrationTable,
    scan: Option<ScanConfiguration>,
    buffer: Vec<u16>,
    status: Status,
    open: bool,
}

impl<T: ScanTransport> Usb1608g<T> {
    /// Opens a session, reading the factory calibration from the device.
    pub fn open(mut transport: T, model: Model) -> Result<Self, Error<T::Error>> {
        let calibration = CalibrationTable::load(&mut transport, model.has_analog_output())?;
        Ok(Self::with_calibration(transport, model, calibration))
    }

    /// Opens a session with an already known calibration table.
    pub fn with_calibration(transport: T, model: Model, calibration: CalibrationTable) -> Self {
        info!(model = %model, "USB-1608G session opened");

        Self {
            transport,
            model,
            calibration,
            scan: None,
            buffer: Vec::new(),
            status: Status::default(),
            open: true,
        }
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn calibration(&self) -> &CalibrationTable {
        &self.calibration
    }

    /// The active scan, if [`configure`](Self::configure) has succeeded.
    pub fn scan(&self) -> Option<&ScanConfiguration> {
        self.scan.as_ref()
    }

    /// Raw codes of the most recent read, interleaved by channel within each sample.
    pub fn raw(&self) -> &[u16] {
        &self.buffer
    }

    /// Details of the most recent failure or short transfer.
    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn clear_status(&mut self) {
        self.status.clear();
    }

    /// Sets up a scan of channels `0..ranges.len()`, channel `i` in `ranges[i]`, for
    /// `sample_count` samples per channel, and sends the scan list to the device.
    ///
    /// The raw buffer is reallocated to fit the new scan.
    pub fn configure(
        &mut self,
        differential: bool,
        ranges: &[Range],
        sample_count: usize,
    ) -> Result<(), Error<T::Error>> {
        let result = self.apply_configuration(differential, ranges, sample_count);
        self.status.track(result)
    }

    fn apply_configuration(
        &mut self,
        differential: bool,
        ranges: &[Range],
        sample_count: usize,
    ) -> Result<(), Error<T::Error>> {
        let mode = if differential {
            InputMode::Differential
        } else {
            InputMode::SingleEnded
        };

        let scan = ScanConfiguration::new(mode, ranges, sample_count)?;

        self.transport
            .configure_scan(scan.entries())
            .map_err(io("configure scan"))?;

        // Release the previous buffer before allocating its replacement.
        drop(core::mem::take(&mut self.buffer));
        self.buffer = vec![0; scan.word_count()];

        debug!(
            mode = ?mode,
            channels = scan.channel_count(),
            samples = sample_count,
            bytes = scan.byte_count(),
            "USB-1608G scan configured"
        );

        self.scan = Some(scan);

        Ok(())
    }

    /// Acquires one scan at `sample_rate` Hz and writes calibrated voltages to `volts`.
    ///
    /// `volts` must be as long as the raw buffer (`channels * samples`). A short raw
    /// transfer still converts every complete word received; the shortfall is logged,
    /// recorded in [`status`](Self::status) and shown in the returned report.
    pub fn read(
        &mut self,
        sample_rate: f64,
        volts: &mut [f64],
    ) -> Result<ReadReport, Error<T::Error>> {
        let result = self.acquire(sample_rate, volts);
        self.status.track(result)
    }

    /// Like [`read`](Self::read), returning a freshly allocated voltage vector.
    pub fn read_volts(
        &mut self,
        sample_rate: f64,
    ) -> Result<(Vec<f64>, ReadReport), Error<T::Error>> {
        let mut volts = vec![0.0; self.buffer.len()];
        let report = self.read(sample_rate, &mut volts)?;
        Ok((volts, report))
    }

    fn acquire(
        &mut self,
        sample_rate: f64,
        volts: &mut [f64],
    ) -> Result<ReadReport, Error<T::Error>> {
        let scan = self.scan.as_ref().ok_or(Error::NotConfigured)?;

        if volts.len() != self.buffer.len() {
            return Err(Error::OutputLength {
                expected: self.buffer.len(),
                actual: volts.len(),
            });
        }

        let request = ScanRequest::free_run(scan.sample_count() as u32, sample_rate);

        self.transport.stop_scan().map_err(io("stop scan"))?;
        self.transport.clear_fifo().map_err(io("clear fifo"))?;
        self.transport.start_scan(&request).map_err(io("start scan"))?;

        let bytes_read = self
            .transport
            .read_scan(&mut self.buffer)
            .map_err(io("read scan"))?;

        self.transport.stop_scan().map_err(io("stop scan"))?;
        self.transport.clear_fifo().map_err(io("clear fifo"))?;

        let bytes_expected = scan.byte_count();

        // Only whole words that actually arrived are converted.
        let words = (bytes_read / 2).min(self.buffer.len());

        if bytes_read < bytes_expected {
            warn!(bytes_read, bytes_expected, "short USB-1608G scan read");
            self.status.record(&Error::<T::Error>::ShortScan {
                expected: bytes_expected,
                actual: bytes_read,
            });
        }

        let channels = scan.channel_count();

        let received = self.buffer[..words].iter().zip(volts.iter_mut());

        for (index, (&raw, out)) in received.enumerate() {
            let range = scan.range(index % channels).unwrap_or_default();
            *out = self.calibration.volts(range, raw);
        }

        debug!(bytes_read, values = words, "USB-1608G scan converted");

        Ok(ReadReport {
            bytes_expected,
            bytes_read,
            values: words,
        })
    }

    /// Stops the scan, clears the FIFO and releases the session.
    pub fn close(mut self) -> Result<(), Error<T::Error>> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), Error<T::Error>> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.buffer = Vec::new();

        self.transport.stop_scan().map_err(io("stop scan"))?;
        self.transport.clear_fifo().map_err(io("clear fifo"))?;

        info!(model = %self.model, "USB-1608G session closed");

        Ok(())
    }
}

impl<T: ScanTransport> Drop for Usb1608g<T> {
    fn drop(&mut self) {
        if let Err(error) = self.shutdown() {
            warn!(%error, "USB-1608G teardown failed");
        }
    }
}
