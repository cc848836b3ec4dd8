//! Byte-level access to an addressable bus.

use core::fmt::Debug;

use embedded_hal::i2c::{I2c, SevenBitAddress};

/// An addressable bus where the number of bytes moved by each transfer is observable.
///
/// This mirrors a Linux `i2c-dev` file descriptor: the target address is selected once,
/// then plain reads and writes go to that target. Returning a count lets the driver tell
/// a short transfer apart from a failed one.
pub trait I2cBus {
    type Error: Debug;

    /// Directs subsequent transfers to `address`.
    fn select(&mut self, address: u16) -> Result<(), Self::Error>;

    /// Writes `bytes` and returns how many were accepted.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, Self::Error>;

    /// Fills `buffer` from the device and returns how many bytes were received.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error>;
}

impl<B: I2cBus + ?Sized> I2cBus for &mut B {
    type Error = B::Error;

    fn select(&mut self, address: u16) -> Result<(), Self::Error> {
        B::select(self, address)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, Self::Error> {
        B::write(self, bytes)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        B::read(self, buffer)
    }
}

#[cfg(feature = "rppal")]
impl I2cBus for rppal::i2c::I2c {
    type Error = rppal::i2c::Error;

    fn select(&mut self, address: u16) -> Result<(), Self::Error> {
        rppal::i2c::I2c::set_slave_address(self, address)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, Self::Error> {
        rppal::i2c::I2c::write(self, bytes)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        rppal::i2c::I2c::read(self, buffer)
    }
}

/// Error from [`HalBus`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HalBusError<E: Debug> {
    #[error("address {0:#x} does not fit in 7 bits")]
    Address(u16),
    #[error("no target address selected")]
    NoAddress,
    #[error("i2c transfer failed: {0:?}")]
    Bus(E),
}

/// Adapts any `embedded-hal` I2C bus to [`I2cBus`].
///
/// `embedded-hal` transfers either complete in full or fail, so successful writes and
/// reads always report the full length.
pub struct HalBus<I2C> {
    i2c: I2C,
    address: Option<SevenBitAddress>,
}

impl<I2C: I2c> HalBus<I2C> {
    pub fn new(i2c: I2C) -> Self {
        i2c.into()
    }

    /// Destroys the adapter and returns the underlying bus.
    pub fn free(self) -> I2C {
        self.i2c
    }

    fn target(&self) -> Result<SevenBitAddress, HalBusError<I2C::Error>> {
        self.address.ok_or(HalBusError::NoAddress)
    }
}

impl<I2C: I2c> From<I2C> for HalBus<I2C> {
    fn from(i2c: I2C) -> Self {
        Self { i2c, address: None }
    }
}

impl<I2C: I2c> I2cBus for HalBus<I2C> {
    type Error = HalBusError<I2C::Error>;

    fn select(&mut self, address: u16) -> Result<(), Self::Error> {
        let address = u8::try_from(address)
            .ok()
            .filter(|address| *address <= 0x7F)
            .ok_or(HalBusError::Address(address))?;

        self.address = Some(address);

        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, Self::Error> {
        let address = self.target()?;
        self.i2c.write(address, bytes).map_err(HalBusError::Bus)?;
        Ok(bytes.len())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        let address = self.target()?;
        self.i2c.read(address, buffer).map_err(HalBusError::Bus)?;
        Ok(buffer.len())
    }
}
