//! The MCP3424 configuration register.
//!
//! ```text
//!   7     6   5    4     3   2    1   0
//! [RDY] [ C1 C0 ] [O/C] [S1 S0] [G1 G0]
//! ```
//!
//! `RDY` is written as 1 to start a one-shot conversion and read back as 0 once the
//! output register holds a fresh result.

const START: u8 = 0b1000_0000;
const CHANNEL_MASK: u8 = 0b0110_0000;
const CHANNEL_SHIFT: u8 = 5;
const MODE_MASK: u8 = 0b0001_0000;
const MODE_SHIFT: u8 = 4;
const RESOLUTION_MASK: u8 = 0b0000_1100;
const RESOLUTION_SHIFT: u8 = 2;
const GAIN_MASK: u8 = 0b0000_0011;

/// Input channel of the MCP3424.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Channel {
    CH1 = 0,
    CH2 = 1,
    CH3 = 2,
    CH4 = 3,
}

impl Channel {
    /// Iterate over all channels.
    pub fn all() -> impl Iterator<Item = Self> {
        [Self::CH1, Self::CH2, Self::CH3, Self::CH4].into_iter()
    }

    fn from_field(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::CH1,
            1 => Self::CH2,
            2 => Self::CH3,
            _ => Self::CH4,
        }
    }
}

/// Whether conversions are triggered per read or free-running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ConversionMode {
    /// Each conversion is started explicitly; the device idles in between.
    #[default]
    OneShot = 0,
    /// The device converts back to back.
    Continuous = 1,
}

impl ConversionMode {
    fn from_field(bits: u8) -> Self {
        if bits & 1 == 0 {
            Self::OneShot
        } else {
            Self::Continuous
        }
    }
}

/// Programmable gain amplifier setting.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Gain {
    #[default]
    X1 = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
}

impl Gain {
    /// Iterate over all gains.
    pub fn all() -> impl Iterator<Item = Self> {
        [Self::X1, Self::X2, Self::X4, Self::X8].into_iter()
    }

    /// Parses a gain factor of 1, 2, 4 or 8.
    pub fn from_factor(factor: u8) -> Option<Self> {
        match factor {
            1 => Some(Self::X1),
            2 => Some(Self::X2),
            4 => Some(Self::X4),
            8 => Some(Self::X8),
            _ => None,
        }
    }

    pub fn factor(self) -> u8 {
        1 << self as u8
    }

    fn from_field(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::X1,
            1 => Self::X2,
            2 => Self::X4,
            _ => Self::X8,
        }
    }
}

/// Sample rate / resolution selection.
///
/// Besides the conversion time this decides how the 4-byte reply is laid out: 18-bit
/// results take three data bytes and push the configuration echo to byte 3, every other
/// resolution uses two data bytes with the echo in byte 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Resolution {
    /// 12 bits, 240 samples per second.
    Bits12 = 0,
    /// 14 bits, 60 samples per second.
    Bits14 = 1,
    /// 16 bits, 15 samples per second.
    Bits16 = 2,
    /// 18 bits, 3.75 samples per second.
    Bits18 = 3,
}

impl Resolution {
    /// Iterate over all resolutions.
    pub fn all() -> impl Iterator<Item = Self> {
        [Self::Bits12, Self::Bits14, Self::Bits16, Self::Bits18].into_iter()
    }

    /// Parses a bit depth of 12, 14, 16 or 18.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            12 => Some(Self::Bits12),
            14 => Some(Self::Bits14),
            16 => Some(Self::Bits16),
            18 => Some(Self::Bits18),
            _ => None,
        }
    }

    /// Width of a decoded sample in bits.
    pub fn bits(self) -> u8 {
        12 + 2 * self as u8
    }

    /// Largest raw code this resolution can produce.
    pub fn max_code(self) -> u32 {
        (1 << self.bits()) - 1
    }

    /// Code corresponding to a positive full-scale input (`2^(bits - 1)`).
    pub fn full_scale_code(self) -> u32 {
        1 << (self.bits() - 1)
    }

    /// Index of the reply byte that echoes the configuration, including `RDY`.
    pub fn ready_byte(self) -> usize {
        match self {
            Self::Bits18 => 3,
            Self::Bits12 | Self::Bits14 | Self::Bits16 => 2,
        }
    }

    /// `true` once `RDY` in the configuration echo has dropped to 0.
    pub fn is_ready(self, reply: &[u8; 4]) -> bool {
        reply[self.ready_byte()] & START == 0
    }

    /// Extracts the raw code from a reply, discarding the undefined upper bits.
    pub fn decode(self, reply: &[u8; 4]) -> u32 {
        let [b0, b1, b2, _] = reply.map(u32::from);

        let raw = match self {
            Self::Bits12 => ((b0 & 0x0F) << 8) | b1,
            Self::Bits14 => ((b0 & 0x3F) << 8) | b1,
            Self::Bits16 => (b0 << 8) | b1,
            Self::Bits18 => ((b0 & 0x03) << 16) | (b1 << 8) | b2,
        };

        raw & self.max_code()
    }

    fn from_field(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Bits12,
            1 => Self::Bits14,
            2 => Self::Bits16,
            _ => Self::Bits18,
        }
    }
}

/// The packed configuration byte.
///
/// Each setter rewrites only its own field. The start bit is internal to the driver: it
/// is raised just before a one-shot trigger is written and dropped right after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigRegister(u8);

impl ConfigRegister {
    pub fn new(
        channel: Channel,
        mode: ConversionMode,
        pga: Gain,
        resolution: Resolution,
    ) -> Self {
        let mut register = Self(0);
        register.set_channel(channel);
        register.set_conversion_mode(mode);
        register.set_pga(pga);
        register.set_resolution(resolution);
        register
    }

    /// Parses a configuration byte, as echoed back in a conversion reply.
    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// The byte as written to the device.
    pub fn to_byte(self) -> u8 {
        self.0
    }

    pub fn channel(self) -> Channel {
        Channel::from_field((self.0 & CHANNEL_MASK) >> CHANNEL_SHIFT)
    }

    pub fn conversion_mode(self) -> ConversionMode {
        ConversionMode::from_field((self.0 & MODE_MASK) >> MODE_SHIFT)
    }

    pub fn pga(self) -> Gain {
        Gain::from_field(self.0 & GAIN_MASK)
    }

    pub fn resolution(self) -> Resolution {
        Resolution::from_field((self.0 & RESOLUTION_MASK) >> RESOLUTION_SHIFT)
    }

    /// `true` while a one-shot trigger is armed but not yet written.
    pub fn start_pending(self) -> bool {
        self.0 & START != 0
    }

    pub fn set_channel(&mut self, channel: Channel) {
        self.write_field(CHANNEL_MASK, (channel as u8) << CHANNEL_SHIFT);
    }

    pub fn set_conversion_mode(&mut self, mode: ConversionMode) {
        self.write_field(MODE_MASK, (mode as u8) << MODE_SHIFT);
    }

    pub fn set_pga(&mut self, pga: Gain) {
        self.write_field(GAIN_MASK, pga as u8);
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.write_field(RESOLUTION_MASK, (resolution as u8) << RESOLUTION_SHIFT);
    }

    pub(crate) fn arm_start(&mut self) {
        self.0 |= START;
    }

    pub(crate) fn clear_start(&mut self) {
        self.0 &= !START;
    }

    fn write_field(&mut self, mask: u8, value: u8) {
        self.0 = (self.0 & !mask) | (value & mask);
    }
}

impl Default for ConfigRegister {
    fn default() -> Self {
        Self::new(
            Channel::CH1,
            ConversionMode::OneShot,
            Gain::X1,
            Resolution::Bits12,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODES: [ConversionMode; 2] = [ConversionMode::OneShot, ConversionMode::Continuous];

    fn every_register() -> impl Iterator<Item = ConfigRegister> {
        Channel::all().flat_map(|channel| {
            MODES.into_iter().flat_map(move |mode| {
                Gain::all().flat_map(move |pga| {
                    Resolution::all()
                        .map(move |resolution| ConfigRegister::new(channel, mode, pga, resolution))
                })
            })
        })
    }

    #[test]
    fn packs_fields_into_documented_bits() {
        let register = ConfigRegister::new(
            Channel::CH3,
            ConversionMode::Continuous,
            Gain::X4,
            Resolution::Bits18,
        );
        assert_eq!(register.to_byte(), 0b0101_1110);
        assert!(!register.start_pending());
    }

    #[test]
    fn setters_leave_other_fields_alone() {
        assert_eq!(every_register().count(), 4 * 2 * 4 * 4);

        for original in every_register() {
            for channel in Channel::all() {
                let mut register = original;
                register.set_channel(channel);
                assert_eq!(register.channel(), channel);
                assert_eq!(register.conversion_mode(), original.conversion_mode());
                assert_eq!(register.pga(), original.pga());
                assert_eq!(register.resolution(), original.resolution());
            }

            for mode in MODES {
                let mut register = original;
                register.set_conversion_mode(mode);
                assert_eq!(register.channel(), original.channel());
                assert_eq!(register.conversion_mode(), mode);
                assert_eq!(register.pga(), original.pga());
                assert_eq!(register.resolution(), original.resolution());
            }

            for pga in Gain::all() {
                let mut register = original;
                register.set_pga(pga);
                assert_eq!(register.channel(), original.channel());
                assert_eq!(register.conversion_mode(), original.conversion_mode());
                assert_eq!(register.pga(), pga);
                assert_eq!(register.resolution(), original.resolution());
            }

            for resolution in Resolution::all() {
                let mut register = original;
                register.set_resolution(resolution);
                assert_eq!(register.channel(), original.channel());
                assert_eq!(register.conversion_mode(), original.conversion_mode());
                assert_eq!(register.pga(), original.pga());
                assert_eq!(register.resolution(), resolution);
            }
        }
    }

    #[test]
    fn start_bit_does_not_disturb_fields() {
        for original in every_register() {
            let mut register = original;
            register.arm_start();
            assert!(register.start_pending());
            assert_eq!(register.to_byte(), original.to_byte() | 0x80);
            register.clear_start();
            assert_eq!(register, original);
            assert_eq!(ConfigRegister::from_byte(original.to_byte()), original);
        }
    }

    #[test]
    fn decodes_each_resolution() {
        let reply = [0xFF, 0xAB, 0xCD, 0x00];
        assert_eq!(Resolution::Bits12.decode(&reply), 0x0FAB);
        assert_eq!(Resolution::Bits14.decode(&reply), 0x3FAB);
        assert_eq!(Resolution::Bits16.decode(&reply), 0xFFAB);
        assert_eq!(Resolution::Bits18.decode(&reply), 0x3ABCD);

        assert_eq!(Resolution::Bits18.decode(&[0x01, 0x23, 0x45, 0x00]), 74565);

        for resolution in Resolution::all() {
            assert!(resolution.decode(&[0xFF; 4]) <= resolution.max_code());
            assert_eq!(resolution.decode(&[0xFF; 4]), resolution.max_code());
        }
    }

    #[test]
    fn ready_flag_position_follows_resolution() {
        let busy_in_byte_2 = [0x00, 0x00, 0x80, 0x00];
        let busy_in_byte_3 = [0x00, 0x00, 0x00, 0x80];

        for resolution in [Resolution::Bits12, Resolution::Bits14, Resolution::Bits16] {
            assert!(!resolution.is_ready(&busy_in_byte_2));
            assert!(resolution.is_ready(&busy_in_byte_3));
        }

        assert!(Resolution::Bits18.is_ready(&busy_in_byte_2));
        assert!(!Resolution::Bits18.is_ready(&busy_in_byte_3));
    }

    #[test]
    fn parses_bit_depths_and_gains() {
        assert_eq!(Resolution::from_bits(16), Some(Resolution::Bits16));
        assert_eq!(Resolution::from_bits(10), None);
        assert_eq!(Resolution::Bits18.full_scale_code(), 131_072);
        assert_eq!(Resolution::Bits12.full_scale_code(), 2048);

        assert_eq!(Gain::from_factor(8), Some(Gain::X8));
        assert_eq!(Gain::from_factor(3), None);
        assert_eq!(Gain::X4.factor(), 4);
    }
}
