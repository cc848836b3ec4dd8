//! Acquisition and calibration drivers for two analog-to-digital converter families:
//!
//! - [`mcp3424`]: the Microchip MCP3424 delta-sigma converter on an addressable I2C bus.
//! - [`usb1608g`]: the Measurement Computing USB-1608G successive-approximation
//!   converters reached through a bulk-transfer command protocol.
//!
//! Both drivers own their transport exclusively and mutate device state in place, so
//! every acquisition call takes `&mut self`. Use [`SharedDevice`] when a handle has to
//! be reached from more than one thread.

#![forbid(unsafe_code)]

pub mod error;
mod shared;

#[cfg(feature = "mcp3424")]
pub mod mcp3424;

#[cfg(feature = "usb1608g")]
pub mod usb1608g;

pub use error::{Classify, ErrorKind, Fault, Severity, Status};
pub use shared::SharedDevice;
