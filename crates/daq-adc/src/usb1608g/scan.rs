//! Scan list construction for the USB-1608G.

/// Set on the mode byte of the final scan list entry.
pub const LAST_CHANNEL: u8 = 0x80;

/// Input wiring of the scanned channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InputMode {
    SingleEnded = 0,
    Differential = 1,
}

impl InputMode {
    /// Number of scan list entries available in this mode.
    pub fn capacity(self) -> usize {
        match self {
            Self::SingleEnded => 8,
            Self::Differential => 16,
        }
    }
}

/// Bipolar input range. The discriminant is the device's gain code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Range {
    /// ±10 V
    #[default]
    Bipolar10V = 0,
    /// ±5 V
    Bipolar5V = 1,
    /// ±2 V
    Bipolar2V = 2,
    /// ±1 V
    Bipolar1V = 3,
}

impl Range {
    /// Number of gain codes, and so of calibration entries.
    pub const COUNT: usize = 4;

    /// Iterate over all ranges.
    pub fn all() -> impl Iterator<Item = Self> {
        [
            Self::Bipolar10V,
            Self::Bipolar5V,
            Self::Bipolar2V,
            Self::Bipolar1V,
        ]
        .into_iter()
    }

    /// Parses a full-scale voltage of 10, 5, 2 or 1.
    pub fn from_volts(volts: u8) -> Option<Self> {
        match volts {
            10 => Some(Self::Bipolar10V),
            5 => Some(Self::Bipolar5V),
            2 => Some(Self::Bipolar2V),
            1 => Some(Self::Bipolar1V),
            _ => None,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::all().find(|range| range.code() == code)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Positive full-scale voltage; the range spans `-full_scale..full_scale`.
    pub fn full_scale(self) -> f64 {
        match self {
            Self::Bipolar10V => 10.0,
            Self::Bipolar5V => 5.0,
            Self::Bipolar2V => 2.0,
            Self::Bipolar1V => 1.0,
        }
    }

    /// Maps an unsigned 16-bit code onto the symmetric range.
    ///
    /// Code `0x8000` is 0 V, `0` is negative full scale and `0xFFFF` is one LSB below
    /// positive full scale.
    pub fn volts(self, code: u16) -> f64 {
        (f64::from(code) - 32768.0) * self.full_scale() / 32768.0
    }
}

/// One entry of the scan list as sent to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanEntry {
    pub channel: u8,
    pub mode: InputMode,
    pub range: Range,
    /// `true` for the final entry of the list.
    pub last: bool,
}

impl ScanEntry {
    /// Wire layout: `[mode, range, channel]`, with [`LAST_CHANNEL`] OR'd into the mode.
    pub fn to_bytes(self) -> [u8; 3] {
        let mut mode = self.mode as u8;
        if self.last {
            mode |= LAST_CHANNEL;
        }
        [mode, self.range.code(), self.channel]
    }
}

/// Why a scan could not be configured.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("no channels requested")]
    NoChannels,
    #[error("{requested} channels requested, {mode:?} mode allows {capacity}")]
    TooManyChannels {
        mode: InputMode,
        requested: usize,
        capacity: usize,
    },
    #[error("sample count must be between 1 and {}", u32::MAX)]
    SampleCount(usize),
}

/// The ordered scan list plus the number of samples to take per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfiguration {
    mode: InputMode,
    entries: Vec<ScanEntry>,
    sample_count: usize,
}

impl ScanConfiguration {
    /// Scans channels `0..ranges.len()` in order, channel `i` using `ranges[i]`.
    pub fn new(mode: InputMode, ranges: &[Range], sample_count: usize) -> Result<Self, ScanError> {
        if ranges.is_empty() {
            return Err(ScanError::NoChannels);
        }

        if ranges.len() > mode.capacity() {
            return Err(ScanError::TooManyChannels {
                mode,
                requested: ranges.len(),
                capacity: mode.capacity(),
            });
        }

        if sample_count == 0 || u32::try_from(sample_count).is_err() {
            return Err(ScanError::SampleCount(sample_count));
        }

        let last = ranges.len() - 1;
        let entries = ranges
            .iter()
            .enumerate()
            .map(|(index, &range)| ScanEntry {
                channel: index as u8,
                mode,
                range,
                last: index == last,
            })
            .collect();

        Ok(Self {
            mode,
            entries,
            sample_count,
        })
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn entries(&self) -> &[ScanEntry] {
        &self.entries
    }

    pub fn channel_count(&self) -> usize {
        self.entries.len()
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Range of the channel at position `index` in the scan.
    pub fn range(&self, index: usize) -> Option<Range> {
        self.entries.get(index).map(|entry| entry.range)
    }

    /// Number of 16-bit words in a complete scan.
    pub fn word_count(&self) -> usize {
        self.channel_count() * self.sample_count
    }

    /// Number of bytes in a complete scan.
    pub fn byte_count(&self) -> usize {
        2 * self.word_count()
    }

    /// The scan list in wire order.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.entries.iter().flat_map(|entry| entry.to_bytes()).collect()
    }
}
