//! Factory calibration of the USB-1608G.
//!
//! The device stores one `(slope, offset)` pair of little-endian `f32`s per input gain,
//! and on analog output models one pair per output channel. A raw code is corrected as
//! `raw * slope + offset` before the range formula is applied.

use tracing::debug;

use super::scan::Range;
use super::transport::CalibrationSource;

/// Start of the analog input coefficients in device memory.
pub const ANALOG_IN_ADDRESS: u16 = 0x7000;
/// Start of the analog output coefficients in device memory.
pub const ANALOG_OUT_ADDRESS: u16 = 0x7020;
/// Number of analog output channels on models that have them.
pub const ANALOG_OUT_CHANNELS: usize = 2;

const PAIR_LEN: usize = 8;

/// A linear correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub slope: f32,
    pub offset: f32,
}

impl Coefficients {
    pub const IDENTITY: Self = Self {
        slope: 1.0,
        offset: 0.0,
    };

    pub fn new(slope: f32, offset: f32) -> Self {
        Self { slope, offset }
    }

    fn from_le_bytes(bytes: &[u8]) -> Self {
        Self {
            slope: f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            offset: f32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }

    fn is_finite(&self) -> bool {
        self.slope.is_finite() && self.offset.is_finite()
    }

    /// `raw * slope + offset`, unrounded.
    pub fn apply(&self, raw: f64) -> f64 {
        raw * f64::from(self.slope) + f64::from(self.offset)
    }

    /// Corrects a raw code, rounding half to even and saturating to 16 bits.
    pub fn correct(&self, raw: u16) -> u16 {
        to_code(self.apply(f64::from(raw)))
    }
}

fn to_code(value: f64) -> u16 {
    value.round_ties_even().clamp(0.0, f64::from(u16::MAX)) as u16
}

/// Why a calibration table could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalibrationError<E: core::fmt::Debug> {
    #[error("calibration read at {address:#06x}: {error:?}")]
    Read { address: u16, error: E },
    #[error("calibration read at {address:#06x} returned {actual} of {expected} bytes")]
    Short {
        address: u16,
        expected: usize,
        actual: usize,
    },
    #[error("calibration entry {index} at {address:#06x} is not a finite number")]
    NotFinite { address: u16, index: usize },
}

/// Per-gain input corrections and, where present, per-channel output corrections.
///
/// Read once when a session opens and never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTable {
    analog_in: [Coefficients; Range::COUNT],
    analog_out: Option<[Coefficients; ANALOG_OUT_CHANNELS]>,
}

impl CalibrationTable {
    pub fn new(
        analog_in: [Coefficients; Range::COUNT],
        analog_out: Option<[Coefficients; ANALOG_OUT_CHANNELS]>,
    ) -> Self {
        Self {
            analog_in,
            analog_out,
        }
    }

    /// A table that leaves raw codes unchanged.
    pub fn identity() -> Self {
        Self::new([Coefficients::IDENTITY; Range::COUNT], None)
    }

    /// Reads the factory coefficients. Output coefficients are only read if
    /// `analog_outputs` is set.
    pub fn load<S: CalibrationSource + ?Sized>(
        source: &mut S,
        analog_outputs: bool,
    ) -> Result<Self, CalibrationError<S::Error>> {
        let analog_in: [Coefficients; Range::COUNT] =
            read_pairs(&mut *source, ANALOG_IN_ADDRESS)?;

        let analog_out: Option<[Coefficients; ANALOG_OUT_CHANNELS]> = if analog_outputs {
            Some(read_pairs(&mut *source, ANALOG_OUT_ADDRESS)?)
        } else {
            None
        };

        let table = Self::new(analog_in, analog_out);

        for (range, coefficients) in Range::all().zip(table.analog_in) {
            debug!(
                gain = range.code(),
                slope = coefficients.slope,
                offset = coefficients.offset,
                "analog input calibration"
            );
        }

        Ok(table)
    }

    /// Coefficients for a gain code.
    pub fn analog_in(&self, range: Range) -> Coefficients {
        self.analog_in[range.code() as usize]
    }

    /// Coefficients for an output channel, if the model has analog outputs.
    pub fn analog_out(&self, channel: usize) -> Option<Coefficients> {
        self.analog_out?.get(channel).copied()
    }

    /// Corrected code for `raw` sampled in `range`.
    pub fn correct(&self, range: Range, raw: u16) -> u16 {
        self.analog_in(range).correct(raw)
    }

    /// Calibrated voltage for `raw` sampled in `range`.
    pub fn volts(&self, range: Range, raw: u16) -> f64 {
        range.volts(self.correct(range, raw))
    }

    /// DAC code that drives output `channel` to `volts` on its ±10 V range.
    pub fn volts_to_code(&self, channel: usize, volts: f64) -> Option<u16> {
        let coefficients = self.analog_out(channel)?;
        let ideal = volts * 32768.0 / 10.0 + 32768.0;
        Some(to_code(coefficients.apply(ideal)))
    }
}

fn read_pairs<S: CalibrationSource + ?Sized, const N: usize>(
    source: &mut S,
    address: u16,
) -> Result<[Coefficients; N], CalibrationError<S::Error>> {
    let mut bytes = vec![0; N * PAIR_LEN];

    let actual = source
        .read_memory(address, &mut bytes)
        .map_err(|error| CalibrationError::Read { address, error })?;

    if actual < bytes.len() {
        return Err(CalibrationError::Short {
            address,
            expected: bytes.len(),
            actual,
        });
    }

    let mut pairs = [Coefficients::IDENTITY; N];

    let chunks = bytes.chunks_exact(PAIR_LEN);

    for (index, (pair, chunk)) in pairs.iter_mut().zip(chunks).enumerate() {
        *pair = Coefficients::from_le_bytes(chunk);

        if !pair.is_finite() {
            return Err(CalibrationError::NotFinite { address, index });
        }
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Memory {
        base: u16,
        bytes: Vec<u8>,
        truncate: Option<usize>,
    }

    impl Memory {
        fn with_pairs(base: u16, pairs: &[(f32, f32)]) -> Self {
            let bytes = pairs
                .iter()
                .flat_map(|(slope, offset)| {
                    slope
                        .to_le_bytes()
                        .into_iter()
                        .chain(offset.to_le_bytes())
                })
                .collect();
            Self {
                base,
                bytes,
                truncate: None,
            }
        }
    }

    impl CalibrationSource for Memory {
        type Error = ();

        fn read_memory(&mut self, address: u16, buffer: &mut [u8]) -> Result<usize, ()> {
            let start = usize::from(address.checked_sub(self.base).ok_or(())?);
            let available = self.bytes.len().saturating_sub(start);
            let n = buffer
                .len()
                .min(available)
                .min(self.truncate.unwrap_or(usize::MAX));
            buffer[..n].copy_from_slice(&self.bytes[start..start + n]);
            Ok(n)
        }
    }

    const PAIRS: [(f32, f32); 4] = [(1.0, 0.0), (1.5, -2.0), (0.5, 10.0), (1.0, 3.0)];

    #[test]
    fn loads_input_pairs_in_gain_order() {
        let mut memory = Memory::with_pairs(ANALOG_IN_ADDRESS, &PAIRS);
        let table = CalibrationTable::load(&mut memory, false).unwrap();

        assert_eq!(table.analog_in(Range::Bipolar5V), Coefficients::new(1.5, -2.0));
        assert_eq!(table.analog_in(Range::Bipolar1V), Coefficients::new(1.0, 3.0));
        assert_eq!(table.analog_out(0), None);
        assert_eq!(table.volts_to_code(0, 0.0), None);
    }

    #[test]
    fn loads_output_pairs_when_present() {
        let mut pairs = PAIRS.to_vec();
        pairs.extend([(2.0, 1.0), (1.0, -1.0)]);
        let mut memory = Memory::with_pairs(ANALOG_IN_ADDRESS, &pairs);

        let table = CalibrationTable::load(&mut memory, true).unwrap();

        assert_eq!(table.analog_out(0), Some(Coefficients::new(2.0, 1.0)));
        assert_eq!(table.analog_out(1), Some(Coefficients::new(1.0, -1.0)));
        assert_eq!(table.analog_out(2), None);
        assert_eq!(table.volts_to_code(1, 0.0), Some(32767));
        assert_eq!(table.volts_to_code(0, 10.0), Some(u16::MAX));
    }

    #[test]
    fn short_and_garbage_tables_are_rejected() {
        let mut memory = Memory::with_pairs(ANALOG_IN_ADDRESS, &PAIRS);
        memory.truncate = Some(20);
        assert_eq!(
            CalibrationTable::load(&mut memory, false),
            Err(CalibrationError::Short {
                address: ANALOG_IN_ADDRESS,
                expected: 32,
                actual: 20
            })
        );

        // Erased memory reads back as NaN.
        let mut memory = Memory {
            base: ANALOG_IN_ADDRESS,
            bytes: vec![0xFF; 32],
            truncate: None,
        };
        assert_eq!(
            CalibrationTable::load(&mut memory, false),
            Err(CalibrationError::NotFinite {
                address: ANALOG_IN_ADDRESS,
                index: 0
            })
        );
    }

    #[test]
    fn correction_is_linear_and_monotonic() {
        let coefficients = Coefficients::new(1.001, -12.5);

        let mut previous = 0;
        for raw in (0..=u16::MAX).step_by(97) {
            let corrected = coefficients.correct(raw);
            assert!(corrected >= previous);
            assert_eq!(corrected, to_code(f64::from(raw) * 1.001f32 as f64 - 12.5));
            previous = corrected;
        }
    }

    #[test]
    fn identical_coefficients_give_identical_results() {
        let coefficients = Coefficients::new(0.9987, 4.25);
        let table = CalibrationTable::new([coefficients; Range::COUNT], None);

        for raw in [0, 1, 1000, 32768, 50000, u16::MAX] {
            assert_eq!(
                table.correct(Range::Bipolar10V, raw),
                table.correct(Range::Bipolar2V, raw)
            );
        }
    }

    #[test]
    fn rounds_half_to_even_and_saturates() {
        assert_eq!(Coefficients::new(1.0, 0.5).correct(2), 2);
        assert_eq!(Coefficients::new(1.0, 0.5).correct(3), 4);
        assert_eq!(Coefficients::new(1.0, -100.0).correct(10), 0);
        assert_eq!(Coefficients::new(2.0, 0.0).correct(40000), u16::MAX);
    }

    #[test]
    fn identity_volts() {
        let table = CalibrationTable::identity();
        assert_eq!(table.volts(Range::Bipolar10V, 0x8000), 0.0);
        assert_eq!(table.volts(Range::Bipolar1V, 0), -1.0);
    }
}
