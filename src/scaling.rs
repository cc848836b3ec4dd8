//! Raw MCP3424 codes to volts.

use daq_adc::mcp3424::{Gain, Resolution};

/// Linear map from `0..2^(bits-1)` onto `0..full_scale/pga` volts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    resolution: Resolution,
    pga: Gain,
    full_scale_volts: f64,
}

impl Scale {
    pub fn new(resolution: Resolution, pga: Gain, full_scale_volts: f64) -> Self {
        Self {
            resolution,
            pga,
            full_scale_volts,
        }
    }

    /// Volts at the positive full-scale code.
    pub fn max_volts(&self) -> f64 {
        self.full_scale_volts / f64::from(self.pga.factor())
    }

    pub fn volts(&self, raw: u32) -> f64 {
        f64::from(raw) / f64::from(self.resolution.full_scale_code()) * self.max_volts()
    }
}

/// Combines four channel readings into the reported values: `[ch1-ch2, ch3-ch4]` when
/// `differential`, otherwise all four unchanged.
pub fn combine(values: [f64; 4], differential: bool) -> Vec<f64> {
    if differential {
        vec![values[0] - values[1], values[2] - values[3]]
    } else {
        values.to_vec()
    }
}

/// Names matching the output of [`combine`].
pub fn channel_names(differential: bool) -> &'static [&'static str] {
    if differential {
        &["Ch1-2", "Ch3-4"]
    } else {
        &["Ch1", "Ch2", "Ch3", "Ch4"]
    }
}
