use core::fmt;

/// Measurement Computing's USB vendor ID.
pub const VENDOR_ID: u16 = 0x09DB;

/// Members of the USB-1608G family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    Usb1608G,
    Usb1608GX,
    /// The GX with two analog outputs.
    Usb1608GX2AO,
}

impl Model {
    /// Identifies a model from its USB product ID, including pre-2014 firmware IDs.
    pub fn from_product_id(product_id: u16) -> Option<Self> {
        match product_id {
            0x0134 | 0x0110 => Some(Self::Usb1608G),
            0x0135 | 0x0111 => Some(Self::Usb1608GX),
            0x0136 | 0x0112 => Some(Self::Usb1608GX2AO),
            _ => None,
        }
    }

    /// Current product ID of the model.
    pub fn product_id(self) -> u16 {
        match self {
            Self::Usb1608G => 0x0134,
            Self::Usb1608GX => 0x0135,
            Self::Usb1608GX2AO => 0x0136,
        }
    }

    pub fn has_analog_output(self) -> bool {
        matches!(self, Self::Usb1608GX2AO)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usb1608G => write!(f, "USB-1608G"),
            Self::Usb1608GX => write!(f, "USB-1608GX"),
            Self::Usb1608GX2AO => write!(f, "USB-1608GX_2AO"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_ids_map_to_same_model() {
        assert_eq!(Model::from_product_id(0x0112), Some(Model::Usb1608GX2AO));
        assert_eq!(Model::from_product_id(0x0136), Some(Model::Usb1608GX2AO));
        assert_eq!(Model::from_product_id(0x0110), Some(Model::Usb1608G));
        assert_eq!(Model::from_product_id(0x0001), None);
        assert_eq!(Model::Usb1608GX.product_id(), 0x0135);
        assert!(!Model::Usb1608GX.has_analog_output());
    }
}
